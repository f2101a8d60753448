use analytics::LinkPredictionMode;
use anyhow::{Context, Result};
use extract::{FUZZY_CUTOFF, FlatSchema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: OperationMode,
    pub merge: MergeConfig,
    pub build: BuildConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // Sampled betweenness, basic link prediction, no validation
    #[default]
    Balanced,  // Exact betweenness, improved link prediction, validation
    Thorough,  // Balanced with a larger candidate budget
}

impl FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            other => Err(format!("unknown mode '{other}' (expected fast, balanced or thorough)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergeConfig {
    pub fuzzy_cutoff: f64,
    /// JSON table `{source: {enabled, weight}}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_weights: Option<PathBuf>,
    /// Directory of `.obo` files or JSON term dictionaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ontology_dir: Option<PathBuf>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fuzzy_cutoff: FUZZY_CUTOFF,
            source_weights: None,
            ontology_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    pub flat_schema: FlatSchema,
    /// Directory holding `nodes.ini` and `edges.ini`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_config_dir: Option<PathBuf>,
    /// Keep only the first N documents (0 = all).
    pub max_documents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkPredictionConfig {
    pub mode: LinkPredictionMode,
    pub limit: usize,
}

impl Default for LinkPredictionConfig {
    fn default() -> Self {
        Self {
            mode: LinkPredictionMode::Improved,
            limit: analytics::link_prediction::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Betweenness source sample (0 = exact).
    pub betweenness_sample: usize,
    pub random_state: u64,
    pub link_prediction: LinkPredictionConfig,
    pub holdout_fraction: f64,
    pub holdout_seed: u64,
    pub validation: bool,
    pub isolate_preview: usize,
    /// Traversal seed labels.
    pub seeds: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            betweenness_sample: 0,
            random_state: 42,
            link_prediction: LinkPredictionConfig::default(),
            holdout_fraction: eval::node_property::DEFAULT_HOLDOUT_FRACTION,
            holdout_seed: eval::node_property::DEFAULT_HOLDOUT_SEED,
            validation: true,
            isolate_preview: analytics::ISOLATE_PREVIEW,
            seeds: Vec::new(),
        }
    }
}

const THOROUGH_LINK_LIMIT: usize = 10_000;
const FAST_BETWEENNESS_SAMPLE: usize = 100;

impl PipelineConfig {
    pub fn for_mode(mode: OperationMode) -> Self {
        let mut config = Self {
            mode,
            ..Self::default()
        };
        match mode {
            OperationMode::Fast => {
                config.analysis.betweenness_sample = FAST_BETWEENNESS_SAMPLE;
                config.analysis.link_prediction.mode = LinkPredictionMode::Basic;
                config.analysis.validation = false;
            }
            OperationMode::Balanced => {}
            OperationMode::Thorough => {
                config.analysis.link_prediction.limit = THOROUGH_LINK_LIMIT;
            }
        }
        config
    }

    /// Parses TOML over the preset of its `mode` (or `mode_override`), so a
    /// file only needs the fields it changes.
    pub fn from_toml_str(text: &str, mode_override: Option<OperationMode>) -> Result<Self> {
        let mut overlay: toml::Table = toml::from_str(text).context("Invalid pipeline config")?;

        let file_mode = match overlay.remove("mode") {
            Some(value) => Some(
                value
                    .try_into::<OperationMode>()
                    .context("Invalid `mode` in pipeline config")?,
            ),
            None => None,
        };
        let mode = mode_override.or(file_mode).unwrap_or_default();

        let mut merged = match toml::Value::try_from(Self::for_mode(mode))
            .context("Failed to serialize config preset")?
        {
            toml::Value::Table(table) => table,
            _ => toml::Table::new(),
        };
        merge_tables(&mut merged, overlay);

        toml::Value::Table(merged)
            .try_into::<Self>()
            .context("Invalid pipeline config")
    }

    /// Reads the config file when given; otherwise the preset for
    /// `mode_override` (or the default mode).
    pub async fn load(path: Option<&Path>, mode_override: Option<OperationMode>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                Self::from_toml_str(&text, mode_override)
            }
            None => Ok(Self::for_mode(mode_override.unwrap_or_default())),
        }
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
