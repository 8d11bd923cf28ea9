use env_logger::Env;
use log::{error, info};
use plate_batch::batch::{self, BatchRunner};
use plate_batch::client::RecognitionClient;
use plate_batch::config::{RunConfig, RunMode};
use plate_batch::extractor::RetryingExtractor;
use plate_batch::writer::ResultWriter;
use std::process;

fn run() -> Result<(), failure::Error> {
    let config = RunConfig::from_env()?;
    let client = RecognitionClient::new(&config.recognizer)?;
    let extractor = RetryingExtractor::new(client, config.retry);
    let mut runner = BatchRunner::new(extractor, config.recognizer.params.clone());
    let writer = ResultWriter::new(&config.excel_dir, &config.json_dir);

    match &config.mode {
        RunMode::All => {
            info!("Processing all images in {}", config.image_dir.display());
            let (batch, _) = batch::process_all_images(&mut runner, &config.image_dir, &writer)?;
            info!("Processed {} images", batch.len());
        }
        RunMode::Random(count) => {
            info!("Processing {} random images", count);
            let (batch, _) = batch::process_random_images(
                &mut runner,
                *count,
                &config.image_dir,
                &writer,
                &mut rand::thread_rng(),
            )?;
            info!("Processed {} images", batch.len());
        }
        RunMode::Single(path) => {
            info!("Testing single image {}", path.display());
            batch::test_single_image(&mut runner, path, &config.test_dir)?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting plate-batch");
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
    info!("Exiting main");
}
