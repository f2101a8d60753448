use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;
use tracing::{info, warn};

use crate::normalizer::{OntologyTerm, TermDictionary};

static SYNONYM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^synonym:\s*"((?:[^"\\]|\\.)*)""#).expect("synonym pattern is valid")
});

/// Parses the `[Term]` stanzas of an OBO file. Each term's name and every
/// synonym map to the term.
pub fn parse_obo(text: &str) -> TermDictionary {
    let mut dict = TermDictionary::new();

    let mut in_term = false;
    let mut id: Option<String> = None;
    let mut name: Option<String> = None;
    let mut synonyms: Vec<String> = Vec::new();

    let mut flush = |id: &mut Option<String>, name: &mut Option<String>, synonyms: &mut Vec<String>| {
        if let (Some(term_id), Some(term_name)) = (id.take(), name.take()) {
            let term = OntologyTerm {
                id: term_id,
                name: term_name.clone(),
            };
            dict.insert(&term_name, term.clone());
            for label in synonyms.drain(..) {
                dict.insert(&label, term.clone());
            }
        }
        synonyms.clear();
    };

    for raw in text.lines() {
        let line = raw.trim();
        if line.starts_with('[') {
            flush(&mut id, &mut name, &mut synonyms);
            in_term = line == "[Term]";
            continue;
        }
        if !in_term {
            continue;
        }

        if let Some(rest) = line.strip_prefix("id:") {
            id = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("name:") {
            name = Some(rest.trim().to_string());
        } else if let Some(caps) = SYNONYM.captures(line) {
            synonyms.push(caps[1].replace("\\\"", "\""));
        }
    }
    flush(&mut id, &mut name, &mut synonyms);

    dict
}

/// Parses a JSON dictionary of the form `{label: {id, name}}`.
pub fn parse_json_dictionary(text: &str) -> Result<TermDictionary> {
    let raw: BTreeMap<String, OntologyTerm> =
        serde_json::from_str(text).context("Ontology dictionary must map labels to {id, name}")?;

    let mut dict = TermDictionary::new();
    for (label, term) in raw {
        dict.insert(&label, term);
    }
    Ok(dict)
}

/// Loads every `.obo` and `.json` dictionary in `dir`.
///
/// A file that fails to load is skipped; a missing directory yields an empty
/// dictionary, which disables normalization.
pub async fn load_ontology_dir(dir: &Path) -> Result<TermDictionary> {
    let mut dict = TermDictionary::new();

    if !fs::try_exists(dir).await.unwrap_or(false) {
        info!(dir = %dir.display(), "No ontology directory; skipping normalization");
        return Ok(dict);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list ontology directory: {:?}", dir))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let loaded = match extension {
            "obo" => fs::read_to_string(&path)
                .await
                .map(|text| parse_obo(&text))
                .map_err(anyhow::Error::from),
            "json" => match fs::read_to_string(&path).await {
                Ok(text) => parse_json_dictionary(&text),
                Err(e) => Err(e.into()),
            },
            "owl" => {
                warn!(file = %path.display(), "OWL ontologies are not supported; skipping");
                continue;
            }
            _ => continue,
        };

        match loaded {
            Ok(terms) => {
                info!(file = %path.display(), terms = terms.len(), "Loaded ontology");
                dict.extend(terms);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Failed to load ontology"),
        }
    }

    info!(terms = dict.len(), "Ontology dictionary ready");
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBO: &str = r#"format-version: 1.2

[Term]
id: DOID:1612
name: breast cancer
synonym: "mammary cancer" EXACT []
synonym: "malignant tumor of \"breast\"" RELATED []

[Typedef]
id: part_of
name: part of

[Term]
id: DOID:1324
name: lung cancer
"#;

    #[test]
    fn test_parse_obo() {
        let dict = parse_obo(OBO);

        assert_eq!(dict.len(), 4);
        assert_eq!(dict.get("mammary cancer").map(|t| t.id.as_str()), Some("DOID:1612"));
        assert_eq!(
            dict.get("malignant tumor of \"breast\"").map(|t| t.name.as_str()),
            Some("breast cancer")
        );
        assert!(dict.get("part of").is_none());
        assert_eq!(dict.get("lung cancer").map(|t| t.id.as_str()), Some("DOID:1324"));
    }

    #[tokio::test]
    async fn test_load_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("disease.obo"), OBO).unwrap();
        std::fs::write(
            dir.path().join("extra.json"),
            r#"{"Hololive": {"id": "agency:1", "name": "Hololive Production"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("thing.owl"), "<rdf/>").unwrap();

        let dict = load_ontology_dir(dir.path()).await.unwrap();
        assert_eq!(dict.len(), 5);
        assert_eq!(
            dict.get("hololive").map(|t| t.name.as_str()),
            Some("Hololive Production")
        );
    }

    #[tokio::test]
    async fn test_missing_dir_is_empty() {
        let dict = load_ontology_dir(Path::new("/definitely/not/here")).await.unwrap();
        assert!(dict.is_empty());
    }
}
