pub mod keys;
pub mod normalizer;
pub mod ontology;
pub mod schema;

pub use keys::{normalize_label, slugify};
pub use normalizer::{
    FUZZY_CUTOFF, FuzzyTermMatcher, MatchInfo, NoopMatcher, OntologyTerm, TermDictionary,
    TermMatcher, matcher_for, normalize_term,
};
pub use ontology::load_ontology_dir;
pub use schema::{
    Document, Entity, FlatField, FlatRecord, FlatSchema, GraphDocument, Relationship,
    RelationshipKey, ValueConfidence, ValueWeight,
};
