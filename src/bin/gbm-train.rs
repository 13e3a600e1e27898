//! Train a model on the `Target` response and export it.
//!
//! Usage: `gbm-train [dataset | dataset ntrees max_depth run_label]`

use gbmtrain::config::ProfileKind;
use gbmtrain::{logging, pipeline};

fn main() {
    if let Err(err) = logging::init("gbm-train") {
        logging::init_stderr_only();
        eprintln!("Logging to file disabled: {err}");
    }
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = pipeline::run_tool(ProfileKind::Target, &args);
    logging::shutdown();
    std::process::exit(code);
}
