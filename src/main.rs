use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use steel2yolo::{Args, CorpusBuilder, Error};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.to_corpus_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    info!(
        "Starting {:?} build from {} into {}...",
        config.mode,
        config.input_dir.display(),
        config.output_dir.display()
    );

    match CorpusBuilder::new(config).and_then(|builder| builder.run()) {
        Ok(stats) if stats.processed == 0 => {
            error!("No items were processed.");
            ExitCode::FAILURE
        }
        Ok(_) => {
            info!("Dataset preparation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e @ Error::Configuration(_)) => {
            error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("Failed to build dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
