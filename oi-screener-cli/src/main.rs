use oi_screener::{
    BinanceFuturesClient, CoinGeckoClient, FileSnapshotStore, ScreenReport, Screener,
    ScreenerConfig,
};
use std::{error::Error, fs};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialise INFO Tracing log subscriber
    init_logging();

    let config = ScreenerConfig::from_env()?;
    info!(
        top_n = config.top_n,
        quote = %config.quote,
        concurrency = config.concurrency,
        cache = %config.cache_path.display(),
        "starting open interest screen"
    );

    let exchange = BinanceFuturesClient::new(&config.binance_url)?;
    let markets = CoinGeckoClient::new(&config.coingecko_url)?
        .with_vs_currency(config.vs_currency.clone())
        .with_api_key(config.coingecko_api_key.clone());
    let store = FileSnapshotStore::new(config.cache_path.clone());
    let output_path = config.output_path.clone();

    let report = Screener::new(exchange, markets, store, config).run().await?;

    print_report(&report);

    if let Some(path) = output_path {
        fs::write(&path, serde_json::to_vec_pretty(&report)?)?;
        info!(path = %path.display(), records = report.records.len(), "wrote screen report");
    }

    Ok(())
}

fn print_report(report: &ScreenReport) {
    println!(
        "\nOpen interest / market cap screen @ {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{:<16} {:>14} {:>12} {:>12} {:>18}",
        "SYMBOL", "OI/MCAP", "1H CHG %", "24H CHG %", "24H QUOTE VOL"
    );

    for record in report.ranked_by_ratio() {
        println!(
            "{:<16} {:>14.6} {:>12.3} {:>12.3} {:>18.0}",
            record.symbol,
            record.ratio,
            record.change * 100.0,
            record.price_change_percent,
            record.quote_volume
        );
    }

    println!();
    println!(
        "corr(ratio, 1h change):  {}",
        format_correlation(report.ratio_change_correlation)
    );
    println!(
        "corr(ratio, 24h change): {}",
        format_correlation(report.ratio_price_change_correlation)
    );
}

fn format_correlation(correlation: Option<f64>) -> String {
    correlation
        .map(|value| format!("{value:+.3}"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn init_logging() {
    tracing_subscriber::fmt()
        // Filter messages based on the INFO
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        // Install this Tracing subscriber as global default
        .init()
}
