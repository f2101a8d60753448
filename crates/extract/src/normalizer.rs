use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum similarity (0-100) for a term to be mapped onto an ontology label.
pub const FUZZY_CUTOFF: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub id: String,
    pub name: String,
}

/// Lowercased label -> canonical ontology term.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    terms: BTreeMap<String, OntologyTerm>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, term: OntologyTerm) {
        let key = label.trim().to_lowercase();
        if !key.is_empty() {
            self.terms.insert(key, term);
        }
    }

    pub fn extend(&mut self, other: TermDictionary) {
        self.terms.extend(other.terms);
    }

    pub fn get(&self, label: &str) -> Option<&OntologyTerm> {
        self.terms.get(label)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OntologyTerm)> {
        self.terms.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub matched: bool,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub normalized: String,
}

impl MatchInfo {
    fn unmatched(term: &str, score: f64) -> Self {
        Self {
            matched: false,
            score,
            id: None,
            normalized: term.to_string(),
        }
    }
}

fn sorted_tokens(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Token-order-insensitive similarity in [0, 100].
pub fn token_sort_similarity(a: &str, b: &str) -> f64 {
    let score = strsim::normalized_levenshtein(&sorted_tokens(a), &sorted_tokens(b)) * 100.0;
    (score * 100.0).round() / 100.0
}

/// Maps `term` onto the best-scoring dictionary label.
///
/// Returns the canonical name when the score reaches `cutoff`, otherwise the
/// original term. An empty dictionary or blank term is a pass-through.
pub fn normalize_term(term: &str, dictionary: &TermDictionary, cutoff: f64) -> (String, MatchInfo) {
    if term.trim().is_empty() || dictionary.is_empty() {
        return (term.to_string(), MatchInfo::unmatched(term, 0.0));
    }

    let lowered = term.trim().to_lowercase();
    let best = match dictionary.get(&lowered) {
        Some(entry) => Some((entry, 100.0)),
        None => {
            let mut best: Option<(&OntologyTerm, f64)> = None;
            for (label, entry) in dictionary.iter() {
                let score = token_sort_similarity(&lowered, label);
                // first label wins ties
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((entry, score));
                }
            }
            best
        }
    };

    match best {
        Some((entry, score)) if score >= cutoff => (
            entry.name.clone(),
            MatchInfo {
                matched: true,
                score,
                id: Some(entry.id.clone()),
                normalized: entry.name.clone(),
            },
        ),
        Some((_, score)) => (term.to_string(), MatchInfo::unmatched(term, score)),
        None => (term.to_string(), MatchInfo::unmatched(term, 0.0)),
    }
}

/// Optional ontology normalization, chosen once at startup.
pub trait TermMatcher: Send + Sync {
    fn normalize(&self, term: &str) -> (String, MatchInfo);

    /// Whether this matcher can change values at all.
    fn is_active(&self) -> bool;
}

pub struct FuzzyTermMatcher {
    dictionary: TermDictionary,
    cutoff: f64,
}

impl FuzzyTermMatcher {
    pub fn new(dictionary: TermDictionary, cutoff: f64) -> Self {
        Self { dictionary, cutoff }
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }
}

impl TermMatcher for FuzzyTermMatcher {
    fn normalize(&self, term: &str) -> (String, MatchInfo) {
        normalize_term(term, &self.dictionary, self.cutoff)
    }

    fn is_active(&self) -> bool {
        !self.dictionary.is_empty()
    }
}

/// Pass-through matcher used when no ontology is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMatcher;

impl TermMatcher for NoopMatcher {
    fn normalize(&self, term: &str) -> (String, MatchInfo) {
        (term.to_string(), MatchInfo::unmatched(term, 0.0))
    }

    fn is_active(&self) -> bool {
        false
    }
}

pub fn matcher_for(dictionary: Option<TermDictionary>, cutoff: f64) -> Box<dyn TermMatcher> {
    match dictionary {
        Some(dict) if !dict.is_empty() => Box::new(FuzzyTermMatcher::new(dict, cutoff)),
        _ => {
            tracing::info!("No ontology terms available; normalization disabled");
            Box::new(NoopMatcher)
        }
    }
}
