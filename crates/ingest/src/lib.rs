pub mod reader;
pub mod sources;

pub use reader::FileReader;
pub use sources::SourceWeights;

use anyhow::Result;
use extract::{Document, FlatSchema};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// A document read from disk, resolved to its variant exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedDocument {
    pub doc_id: String,
    pub file_name: String,
    pub path: PathBuf,
    /// Source inferred against the weight table, if any matched.
    pub source: Option<String>,
    pub document: Document,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct LoadOutcome {
    pub documents: Vec<LoadedDocument>,
    pub skipped: Vec<SkippedFile>,
}

pub struct LoadOptions<'a> {
    pub schema: &'a FlatSchema,
    pub weights: &'a SourceWeights,
    /// Admission limit on the number of documents (0 = unlimited).
    pub max_documents: usize,
}

/// Splits a parsed file into its document values: a top-level array, a
/// combined file with a `records` array, or a single object.
fn unpack(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj)
            if obj.get("records").is_some_and(Value::is_array)
                && !obj.contains_key("entities") =>
        {
            match obj.remove("records") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}

fn resolve_file(path: &Path, value: Value, options: &LoadOptions<'_>, outcome: &mut LoadOutcome) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let path_str = path.to_string_lossy().to_string();

    let items = unpack(value);
    let multiple = items.len() > 1;

    for (i, item) in items.into_iter().enumerate() {
        let label = if multiple {
            format!("{file_name}#{i}")
        } else {
            file_name.clone()
        };

        match Document::resolve(&item, options.schema) {
            Some(document) => {
                let source = options.weights.infer_source(path, &item);
                let id_seed = if multiple {
                    format!("{path_str}#{i}")
                } else {
                    path_str.clone()
                };
                outcome.documents.push(LoadedDocument {
                    doc_id: generate_doc_id(&id_seed),
                    file_name: label,
                    path: path.to_path_buf(),
                    source,
                    document,
                });
            }
            None => {
                warn!(file = %label, "Skipped document (unrecognized format)");
                outcome.skipped.push(SkippedFile {
                    file: label,
                    reason: "unrecognized format".to_string(),
                });
            }
        }
    }
}

/// Loads documents from a JSON file or a directory of JSON files.
///
/// Unreadable or malformed files are skipped with a warning; only a missing
/// input path is an error.
pub async fn load_documents(input: &Path, options: &LoadOptions<'_>) -> Result<LoadOutcome> {
    if !tokio::fs::try_exists(input).await.unwrap_or(false) {
        anyhow::bail!("Input path does not exist: {:?}", input);
    }

    let files: Vec<(PathBuf, Result<Value>)> = if input.is_dir() {
        FileReader::read_directory(input).await
    } else {
        vec![(input.to_path_buf(), FileReader::read_json(input).await)]
    };

    let mut outcome = LoadOutcome::default();
    for (path, content) in files {
        match content {
            Ok(value) => resolve_file(&path, value, options, &mut outcome),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to read document");
                outcome.skipped.push(SkippedFile {
                    file: path.to_string_lossy().to_string(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    if options.max_documents > 0 && outcome.documents.len() > options.max_documents {
        info!(
            limit = options.max_documents,
            loaded = outcome.documents.len(),
            "Limiting documents for memory management"
        );
        outcome.documents.truncate(options.max_documents);
    }

    info!(
        documents = outcome.documents.len(),
        skipped = outcome.skipped.len(),
        "Loaded documents"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_is_stable() {
        let a = generate_doc_id("data/wikipedia_cancer.json");
        let b = generate_doc_id("data/wikipedia_cancer.json");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, generate_doc_id("data/medlineplus_cancer.json"));
    }

    #[tokio::test]
    async fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("wikipedia_acme.json"),
            r#"{"entities": [{"id": "acme", "name": "Acme", "type": "company"}], "relationships": []}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("records.json"),
            r#"{"records": [{"disease_name": "Flu", "symptoms": ["fever"]}, {"nope": true}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.json"), "{").unwrap();

        let weights = SourceWeights::new().with_weight("wikipedia", 0.7);
        let schema = FlatSchema::default();
        let options = LoadOptions {
            schema: &schema,
            weights: &weights,
            max_documents: 0,
        };

        let outcome = load_documents(dir.path(), &options).await.unwrap();

        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.documents[0].file_name, "records.json#0");
        assert_eq!(outcome.documents[0].document.kind(), "flat");
        assert_eq!(outcome.documents[1].source.as_deref(), Some("wikipedia"));
    }

    #[tokio::test]
    async fn test_max_documents_and_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.json");
        std::fs::write(
            &path,
            r#"[{"name": "A"}, {"name": "B"}, {"name": "C"}]"#,
        )
        .unwrap();

        let weights = SourceWeights::new();
        let schema = FlatSchema::default();
        let options = LoadOptions {
            schema: &schema,
            weights: &weights,
            max_documents: 2,
        };

        let outcome = load_documents(&path, &options).await.unwrap();
        assert_eq!(outcome.documents.len(), 2);

        assert!(load_documents(&dir.path().join("missing"), &options).await.is_err());
    }
}
