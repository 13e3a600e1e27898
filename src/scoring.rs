//! Batch scoring of a frame with a trained model.

use std::io::Write;

use crate::frame::Frame;
use crate::ml::gbm::{GbmModel, ModelCategory};

/// Write one prediction row per frame row as CSV.
///
/// Regression models produce a `predict` column. Binomial models produce the
/// predicted level followed by the probability of each response level, named
/// `p0` and `p1`. Returns the predictor names missing from `frame`; they are
/// scored as missing values.
pub fn write_predictions<W: Write>(
    model: &GbmModel,
    frame: &Frame,
    writer: W,
) -> Result<Vec<String>, csv::Error> {
    let (rows, absent) = model.encode_frame(frame);
    let mut out = csv::Writer::from_writer(writer);
    match model.category {
        ModelCategory::Regression => {
            out.write_record(["predict"])?;
            for row in &rows {
                out.write_record([model.predict(row).to_string()])?;
            }
        }
        ModelCategory::Binomial => {
            out.write_record(["predict", "p0", "p1"])?;
            for row in &rows {
                let p1 = model.predict(row);
                let label = model.predict_label(row).unwrap_or_default();
                out.write_record([label.to_string(), (1.0 - p1).to_string(), p1.to_string()])?;
            }
        }
    }
    out.flush()?;
    Ok(absent)
}
