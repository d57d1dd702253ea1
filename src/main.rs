use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use quotawatch::{app, logging, Args};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init();

    match app::run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
