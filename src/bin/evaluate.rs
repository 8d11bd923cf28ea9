use env_logger::Env;
use log::{error, info};
use plate_batch::config::EvaluationConfig;
use plate_batch::report::{score, summary_lines, write_report};
use std::process;

fn run() -> Result<(), failure::Error> {
    let config = EvaluationConfig::from_env()?;
    let report = score(&config)?;
    println!("Summary of matches:");
    for line in summary_lines(&report) {
        println!("{}", line);
    }
    let path = write_report(&report, &config.output_dir)?;
    info!("Evaluation written to {}", path.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting evaluation");
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
