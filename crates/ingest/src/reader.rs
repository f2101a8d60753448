use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub struct FileReader;

impl FileReader {
    pub async fn read_json(path: &Path) -> Result<Value> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension {
            "json" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                let value = serde_json::from_str(&content)
                    .context(format!("Invalid JSON in file: {:?}", path))?;
                Ok(value)
            }
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    /// All `.json` files under `dir`, sorted by path.
    pub fn list_json_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        files
    }

    /// Reads every JSON file under `dir`. Per-file failures are returned
    /// alongside the successes rather than aborting the scan.
    pub async fn read_directory(dir: &Path) -> Vec<(PathBuf, Result<Value>)> {
        let mut files = Vec::new();

        for path in Self::list_json_files(dir) {
            let content = Self::read_json(&path).await;
            files.push((path, content));
        }

        files
    }
}
