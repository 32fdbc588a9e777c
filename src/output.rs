//! Reading and writing dataset documents.

use std::{fs, io::ErrorKind, path::Path};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::DatasetError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io { path: path.to_owned(), source }
}

/// Pretty-printed UTF-8 JSON. The document is serialized in full before the
/// file is touched and lands through a rename, so a failed run never leaves
/// a truncated file behind.
pub fn write_json<T: Serialize>(path: &Path, document: &T) -> Result<(), DatasetError> {
    let mut bytes = serde_json::to_vec_pretty(document)
        .map_err(|source| DatasetError::Json { path: path.to_owned(), source })?;
    bytes.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, &bytes).map_err(io_error(&staging))?;
    fs::rename(&staging, path).map_err(io_error(path))?;
    tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DatasetError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(path)(err)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| DatasetError::Json { path: path.to_owned(), source })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn writes_pretty_json_and_reads_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/geo/out.json");
        let document = BTreeMap::from([("name", "Općina Žepče")]);

        write_json(&path, &document).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"name\": \"Općina Žepče\"\n}\n");
        assert!(!path.with_extension("json.tmp").exists());

        let read: Option<BTreeMap<String, String>> = read_json(&path).unwrap();
        assert_eq!(read.unwrap()["name"], "Općina Žepče");
    }

    #[test]
    fn absent_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let read: Option<serde_json::Value> = read_json(&dir.path().join("missing.json")).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Json { .. }));
    }
}
