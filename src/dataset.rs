//! Corpus loading.
//!
//! A dataset is a directory of `*.json` files, each an object whose `values`
//! array holds the documents (the layout of MISP galaxy cluster files).
//! Files are read in name order and unreadable files are skipped.

use crate::Document;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Load at most `max_documents` documents from `dir`
pub fn load_dataset(dir: &Path, max_documents: usize) -> Result<Vec<Document>> {
    info!("Loading dataset from directory: {}", dir.display());

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read dataset directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
        .collect();
    files.sort();

    let mut documents = Vec::new();
    for path in &files {
        if documents.len() >= max_documents {
            break;
        }
        match load_file(path) {
            Ok(values) => {
                debug!("Loaded {} documents from {}", values.len(), path.display());
                documents.extend(values);
            }
            Err(e) => warn!("Error loading {}: {:#}", path.display(), e),
        }
    }

    documents.truncate(max_documents);
    info!(
        "Loaded {} documents from {} files",
        documents.len(),
        files.len()
    );
    Ok(documents)
}

/// Documents in the `values` array of one file; entries that are not
/// objects are ignored
fn load_file(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    let mut root: Value = serde_json::from_str(&content)?;

    let values = match root.get_mut("values").map(Value::take) {
        Some(Value::Array(values)) => values,
        _ => anyhow::bail!("missing 'values' array"),
    };

    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(document) => Some(document),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: Value) {
        std::fs::write(dir.path().join(name), value.to_string()).unwrap();
    }

    #[test]
    fn test_load_dataset_in_file_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.json", json!({"values": [{"value": "b1"}]}));
        write(&dir, "a.json", json!({"values": [{"value": "a1"}, {"value": "a2"}, 3]}));
        write(&dir, "notes.txt", json!({"values": [{"value": "ignored"}]}));

        let docs = load_dataset(dir.path(), 100).unwrap();
        let values: Vec<&Value> = docs.iter().map(|d| &d["value"]).collect();

        assert_eq!(values, vec![&json!("a1"), &json!("a2"), &json!("b1")]);
    }

    #[test]
    fn test_load_dataset_truncates() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.json", json!({"values": [{"n": 1}, {"n": 2}, {"n": 3}]}));

        let docs = load_dataset(dir.path(), 2).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["n"], json!(2));
    }

    #[test]
    fn test_malformed_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        write(&dir, "novalues.json", json!({"name": "x"}));
        write(&dir, "ok.json", json!({"values": [{"n": 1}]}));

        let docs = load_dataset(dir.path(), 10).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(load_dataset(Path::new("/definitely/not/here"), 10).is_err());
    }
}
