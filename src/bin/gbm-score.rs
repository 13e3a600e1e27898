//! Score a CSV file with an exported model and print predictions as CSV.
//!
//! Usage: `gbm-score <model.zip|model.h2o> <data.csv>`

use std::path::{Path, PathBuf};

use gbmtrain::export::load_model;
use gbmtrain::frame::Frame;
use gbmtrain::{logging, pipeline, scoring};

fn main() {
    if let Err(err) = logging::init("gbm-score") {
        logging::init_stderr_only();
        eprintln!("Logging to file disabled: {err}");
    }
    let code = match parse_args(std::env::args().skip(1).collect()) {
        Ok((model_path, data_path)) => match run(&model_path, &data_path) {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!("{err}");
                1
            }
        },
        Err(err) => {
            tracing::error!("{err}");
            pipeline::EXIT_CONFIG_ERROR
        }
    };
    logging::shutdown();
    std::process::exit(code);
}

fn parse_args(args: Vec<String>) -> Result<(PathBuf, PathBuf), String> {
    match args.as_slice() {
        [model, data] => Ok((PathBuf::from(model), PathBuf::from(data))),
        _ => Err("Usage: gbm-score <model.zip|model.h2o> <data.csv>".to_string()),
    }
}

fn run(model_path: &Path, data_path: &Path) -> Result<(), String> {
    let model = load_model(model_path).map_err(|err| err.to_string())?;
    tracing::info!(
        "Loaded {} ({}, {} trees) from {}",
        model.name(),
        model.category,
        model.trees.len(),
        model_path.display()
    );
    let frame = Frame::from_csv_path(data_path).map_err(|err| err.to_string())?;
    tracing::info!("{}", frame);

    let stdout = std::io::stdout();
    let absent = scoring::write_predictions(&model, &frame, stdout.lock())
        .map_err(|err| format!("Failed to write predictions: {err}"))?;
    if !absent.is_empty() {
        tracing::warn!(
            "Predictors missing from {} were scored as missing: {}",
            data_path.display(),
            absent.join(", ")
        );
    }
    Ok(())
}
