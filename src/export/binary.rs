//! Single-file binary model container.
//!
//! Layout (little-endian):
//! `magic[8] | version u32 | payload_len u64 | sha256[32] | payload`.
//! The payload is the JSON-encoded model.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::ml::gbm::GbmModel;

use super::{ExportError, write_atomic};

const BINARY_MAGIC: &[u8; 8] = b"GBMBIN01";
const BINARY_VERSION: u32 = 1;
const CHECKSUM_LEN: usize = 32;
const HEADER_LEN: usize = 8 + 4 + 8 + CHECKSUM_LEN;
/// Upper bound on payload size accepted when reading.
const MAX_PAYLOAD_LEN: u64 = 1 << 32;

/// Write a model container to `path`.
pub fn write_binary(path: &Path, model: &GbmModel) -> Result<(), ExportError> {
    let payload = serde_json::to_vec(model).map_err(|source| ExportError::Encode {
        what: "binary model payload",
        source,
    })?;
    let checksum: [u8; CHECKSUM_LEN] = Sha256::digest(&payload).into();
    write_atomic(path, |file| {
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(BINARY_MAGIC);
        header.extend_from_slice(&BINARY_VERSION.to_le_bytes());
        header.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        header.extend_from_slice(&checksum);
        file.write_all(&header)?;
        file.write_all(&payload)?;
        Ok(())
    })
}

/// Read and verify a model container.
pub fn load_binary(path: &Path) -> Result<GbmModel, ExportError> {
    let invalid = |reason: String| ExportError::Invalid {
        path: path.to_path_buf(),
        reason,
    };
    let read_error = |source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_error)?;
    let file_len = file.metadata().map_err(read_error)?.len();

    let mut header = [0u8; HEADER_LEN];
    file.read_exact(&mut header)
        .map_err(|err| invalid(format!("truncated header: {err}")))?;
    if &header[..8] != BINARY_MAGIC {
        return Err(invalid("bad magic".to_string()));
    }
    let version = u32::from_le_bytes(header[8..12].try_into().unwrap_or_default());
    if version != BINARY_VERSION {
        return Err(invalid(format!(
            "unsupported version {version} (expected {BINARY_VERSION})"
        )));
    }
    let payload_len = u64::from_le_bytes(header[12..20].try_into().unwrap_or_default());
    if payload_len > MAX_PAYLOAD_LEN || HEADER_LEN as u64 + payload_len != file_len {
        return Err(invalid(format!(
            "payload length {payload_len} does not match file length {file_len}"
        )));
    }
    let expected_checksum = &header[20..HEADER_LEN];

    let mut payload = vec![0u8; payload_len as usize];
    file.read_exact(&mut payload).map_err(read_error)?;
    let checksum: [u8; CHECKSUM_LEN] = Sha256::digest(&payload).into();
    if checksum.as_slice() != expected_checksum {
        return Err(invalid("checksum mismatch".to_string()));
    }
    let model: GbmModel = serde_json::from_slice(&payload)
        .map_err(|err| invalid(format!("undecodable payload: {err}")))?;
    model.validate().map_err(invalid)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::tiny_model;
    use std::io::{Seek, SeekFrom};
    use tempfile::tempdir;

    #[test]
    fn container_round_trips_predictions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.h2o");
        let model = tiny_model();
        write_binary(&path, &model).unwrap();
        let loaded = load_binary(&path).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.h2o");
        write_binary(&path, &tiny_model()).unwrap();
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(HEADER_LEN as u64 + 2)).unwrap();
        file.write_all(b"#").unwrap();
        drop(file);
        let err = load_binary(&path).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.h2o");
        write_binary(&path, &tiny_model()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
        assert!(matches!(load_binary(&path), Err(ExportError::Invalid { .. })));
    }

    #[test]
    fn foreign_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.h2o");
        std::fs::write(&path, vec![0u8; HEADER_LEN + 4]).unwrap();
        let err = load_binary(&path).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }
}
