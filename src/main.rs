mod anomaly;
mod dataset;
mod extract;
mod features;
mod fusion;
mod navigate;
mod paginate;
mod score;
mod scrape;
mod selectors;
mod session;
mod text_score;
mod trust;
mod wait;

use std::path::Path;
use std::process::ExitCode;

use dotenv::dotenv;

use crate::wait::CancelToken;

fn usage() {
    eprintln!("Usage:");
    eprintln!("  fraudlens scrape <page-url>");
    eprintln!("  fraudlens score <dataset.json> [--retrain]");
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("scrape") => {
            let Some(url) = args.get(2) else {
                usage();
                return ExitCode::from(1);
            };
            let cancel = CancelToken::new();
            let ctrlc = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling scrape");
                    ctrlc.cancel();
                }
            });
            match scrape::scrape_page(url, &cancel).await {
                Ok(path) => {
                    println!("dataset saved to {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!("scrape failed: {:#}", e);
                    ExitCode::from(1)
                }
            }
        }
        Some("score") => {
            let Some(input) = args.get(2) else {
                usage();
                return ExitCode::from(1);
            };
            let retrain = args.iter().any(|a| a == "--retrain");
            match score::run(Path::new(input), retrain) {
                Ok(path) => {
                    println!("predictions saved to {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!("scoring failed: {:#}", e);
                    ExitCode::from(1)
                }
            }
        }
        _ => {
            usage();
            ExitCode::from(1)
        }
    }
}
