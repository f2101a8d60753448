use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(default)]
    weight: Option<Value>,
}

/// Per-source reliability multipliers, keyed by lowercased source name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceWeights {
    weights: BTreeMap<String, f64>,
}

impl SourceWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weight(mut self, source: &str, weight: f64) -> Self {
        self.weights.insert(source.to_lowercase(), weight);
        self
    }

    /// Parses `{"source": {"enabled": bool, "weight": number}}`. Entries
    /// without a numeric weight are ignored.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, Value> =
            serde_json::from_str(text).context("Source weights must be a JSON object")?;

        let mut weights = BTreeMap::new();
        for (name, cfg) in raw {
            let Ok(entry) = serde_json::from_value::<SourceEntry>(cfg) else {
                continue;
            };
            if let Some(w) = entry.weight.as_ref().and_then(Value::as_f64) {
                weights.insert(name.to_lowercase(), w);
            }
        }
        Ok(Self { weights })
    }

    /// Loads the weight table; a missing or unreadable file disables
    /// weighting instead of failing the run.
    pub async fn load(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(_) => {
                info!(path = %path.display(), "No source weight config; skipping source weighting");
                return Self::default();
            }
        };

        match Self::from_json(&text) {
            Ok(weights) => {
                info!(path = %path.display(), sources = weights.len(), "Loaded source weights");
                weights
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read source weights");
                Self::default()
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<f64> {
        self.weights.get(&source.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Guesses which configured source produced a document.
    ///
    /// Explicit `source`/`source_name`/`source_id` fields (top level, then
    /// under `meta`) win over file-name heuristics such as
    /// `wikipedia_foo.json` or `foo_wikipedia.json`.
    pub fn infer_source(&self, file: &Path, data: &Value) -> Option<String> {
        if self.weights.is_empty() {
            return None;
        }

        const KEYS: [&str; 3] = ["source", "source_name", "source_id"];
        let top = KEYS.iter().filter_map(|k| data.get(*k).and_then(Value::as_str));
        let meta = KEYS.iter().filter_map(|k| {
            data.get("meta")
                .and_then(|m| m.get(*k))
                .and_then(Value::as_str)
        });
        for candidate in top.chain(meta) {
            let key = candidate.to_lowercase();
            if self.weights.contains_key(&key) {
                return Some(key);
            }
        }

        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.weights
            .keys()
            .find(|k| {
                stem == **k
                    || stem.starts_with(&format!("{k}_"))
                    || stem.ends_with(&format!("_{k}"))
                    || stem.contains(&format!("_{k}_"))
            })
            .cloned()
    }
}
