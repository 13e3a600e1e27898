//! Portable scoring artifact: a zip holding a manifest and the model.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::ml::gbm::{GbmModel, ModelCategory};

use super::{ExportError, write_atomic};

const MANIFEST_ENTRY: &str = "manifest.json";
const MODEL_ENTRY: &str = "model.json";
const PORTABLE_FORMAT: &str = "gbmtrain-portable";
const PORTABLE_FORMAT_VERSION: u32 = 1;

/// Summary stored next to the model so tools can inspect an artifact cheaply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableManifest {
    pub format: String,
    pub format_version: u32,
    pub model_id: String,
    pub category: ModelCategory,
    pub n_trees: usize,
    pub predictors: Vec<String>,
    pub response_column: String,
}

impl PortableManifest {
    fn for_model(model: &GbmModel) -> Self {
        Self {
            format: PORTABLE_FORMAT.to_string(),
            format_version: PORTABLE_FORMAT_VERSION,
            model_id: model.name().to_string(),
            category: model.category,
            n_trees: model.trees.len(),
            predictors: model.predictors.clone(),
            response_column: model.parameters.response_column.clone(),
        }
    }
}

/// Write the portable zip to `path`.
pub fn write_portable(path: &Path, model: &GbmModel) -> Result<(), ExportError> {
    let manifest = serde_json::to_vec_pretty(&PortableManifest::for_model(model)).map_err(
        |source| ExportError::Encode {
            what: "portable manifest",
            source,
        },
    )?;
    let model_json = serde_json::to_vec(model).map_err(|source| ExportError::Encode {
        what: "portable model",
        source,
    })?;
    write_atomic(path, |file| {
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in [(MANIFEST_ENTRY, &manifest), (MODEL_ENTRY, &model_json)] {
            zip.start_file(name, options).map_err(std::io::Error::other)?;
            zip.write_all(data)?;
        }
        zip.finish().map_err(std::io::Error::other)?;
        Ok(())
    })
}

/// Load and validate a model from a portable zip.
pub fn load_portable(path: &Path) -> Result<GbmModel, ExportError> {
    let invalid = |reason: String| ExportError::Invalid {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|err| invalid(format!("not a zip archive: {err}")))?;

    let manifest: PortableManifest = read_json_entry(&mut archive, MANIFEST_ENTRY).map_err(invalid)?;
    if manifest.format != PORTABLE_FORMAT || manifest.format_version != PORTABLE_FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported format {} v{}",
            manifest.format, manifest.format_version
        )));
    }
    let model: GbmModel = read_json_entry(&mut archive, MODEL_ENTRY).map_err(invalid)?;
    model.validate().map_err(invalid)?;
    if model.name() != manifest.model_id || model.trees.len() != manifest.n_trees {
        return Err(invalid("manifest does not describe the packed model".to_string()));
    }
    Ok(model)
}

fn read_json_entry<T, R>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<T, String>
where
    T: serde::de::DeserializeOwned,
    R: Read + std::io::Seek,
{
    let mut entry = archive
        .by_name(name)
        .map_err(|err| format!("missing {name}: {err}"))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|err| format!("failed to read {name}: {err}"))?;
    serde_json::from_slice(&bytes).map_err(|err| format!("invalid {name}: {err}"))
}
