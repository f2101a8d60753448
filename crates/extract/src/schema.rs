use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::keys::slugify;

/// A value extracted for an attribute or property, with the extractor's
/// confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueConfidence {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ValueConfidence {
    pub fn new(value: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            value: value.into(),
            confidence,
        }
    }
}

// Extractors emit either `{"value": .., "confidence": ..}` or a bare scalar.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Full {
        #[serde(default)]
        value: Value,
        #[serde(default)]
        confidence: Value,
    },
    Scalar(Value),
}

impl<'de> Deserialize<'de> for ValueConfidence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let payload = match RawPayload::deserialize(deserializer)? {
            RawPayload::Full { value, confidence } => ValueConfidence {
                value: value_to_string(&value),
                confidence: confidence_from_value(&confidence),
            },
            RawPayload::Scalar(value) => ValueConfidence {
                value: value_to_string(&value),
                confidence: None,
            },
        };
        Ok(payload)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Reads a finite number that may be given as a numeric string.
pub fn number_from_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// Reads a confidence, clamped into [0, 1]. Non-finite input counts as absent.
pub fn confidence_from_value(value: &Value) -> Option<f64> {
    number_from_value(value).map(|c| c.clamp(0.0, 1.0))
}

fn lenient_confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(confidence_from_value))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, ValueConfidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub relation: String,
    #[serde(
        default,
        deserialize_with = "lenient_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub properties: BTreeMap<String, ValueConfidence>,
}

/// Identity of a relationship for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    pub source: String,
    pub relation: String,
    pub target: String,
}

impl std::fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}->{}", self.source, self.relation, self.target)
    }
}

impl Relationship {
    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            source: self.source.clone(),
            relation: self.relation.clone(),
            target: self.target.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl GraphDocument {
    /// Fills ids from names and drops entities/relationships that cannot be
    /// identified at all.
    fn with_defaults(mut self) -> Self {
        self.entities.retain_mut(|entity| {
            if entity.id.trim().is_empty() {
                entity.id = slugify(&entity.name);
            }
            if entity.name.trim().is_empty() {
                entity.name = entity.id.clone();
            }
            !entity.id.is_empty()
        });
        self.relationships.retain(|rel| {
            !rel.source.trim().is_empty() && !rel.target.trim().is_empty()
        });
        self
    }
}

/// One list-valued field of the legacy flat schema and how it maps into the
/// graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatField {
    pub field: String,
    pub node_type: String,
    pub relation: String,
}

impl FlatField {
    fn new(field: &str, node_type: &str, relation: &str) -> Self {
        Self {
            field: field.to_string(),
            node_type: node_type.to_string(),
            relation: relation.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatSchema {
    pub subject_field: String,
    pub subject_type: String,
    pub list_fields: Vec<FlatField>,
}

impl Default for FlatSchema {
    fn default() -> Self {
        Self {
            subject_field: "disease_name".to_string(),
            subject_type: "disease".to_string(),
            list_fields: vec![
                FlatField::new("symptoms", "symptom", "has_symptom"),
                FlatField::new("treatments", "treatment", "treated_with"),
                FlatField::new("related_genes", "gene", "associated_gene"),
                FlatField::new("diagnosis", "diagnosis", "has_diagnosis"),
                FlatField::new("causes", "cause", "has_cause"),
                FlatField::new("risk_factors", "risk_factor", "has_risk_factor"),
                FlatField::new("subtypes", "subtype", "has_subtype"),
            ],
        }
    }
}

impl FlatSchema {
    pub fn field(&self, name: &str) -> Option<&FlatField> {
        self.list_fields.iter().find(|f| f.field == name)
    }
}

/// Edge weight computed by the merger for one value of a list field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueWeight {
    pub value: String,
    pub weight: f64,
    #[serde(default)]
    pub frequency: usize,
}

/// A legacy record: one subject with list-valued fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_reliability: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edge_weights: BTreeMap<String, Vec<ValueWeight>>,
}

impl FlatRecord {
    /// Reads a flat record out of raw JSON using the configured schema.
    /// Returns `None` when the subject field is missing or blank.
    pub fn from_value(value: &Value, schema: &FlatSchema) -> Option<Self> {
        let obj = value.as_object()?;
        let subject = obj.get(&schema.subject_field)?.as_str()?.trim();
        if subject.is_empty() {
            return None;
        }

        let mut fields = BTreeMap::new();
        for list_field in &schema.list_fields {
            let values: Vec<String> = match obj.get(&list_field.field) {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
                _ => continue,
            };
            if !values.is_empty() {
                fields.insert(list_field.field.clone(), values);
            }
        }

        let source_reliability = ["_source_reliability", "source_reliability"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_object))
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| number_from_value(v).map(|c| (k.clone(), c)))
                    .collect()
            })
            .unwrap_or_default();

        let edge_weights = obj
            .get("_edge_weights")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Some(Self {
            subject: subject.to_string(),
            confidence: obj.get("confidence").and_then(confidence_from_value),
            fields,
            source_reliability,
            edge_weights,
        })
    }

    pub fn weight_of(&self, field: &str, value: &str) -> Option<f64> {
        self.edge_weights
            .get(field)?
            .iter()
            .find(|w| w.value == value)
            .map(|w| w.weight)
    }
}

/// The unit the merger consumes, resolved once at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Document {
    Graph(GraphDocument),
    Flat(FlatRecord),
}

impl Document {
    /// Resolves raw JSON into a document variant.
    ///
    /// Order: graph-document (`entities` or `relationships` present), legacy
    /// flat record (subject field present), single entity (object with a
    /// `name`). Anything else is `None`.
    pub fn resolve(value: &Value, schema: &FlatSchema) -> Option<Document> {
        let obj = value.as_object()?;

        if obj.contains_key("entities") || obj.contains_key("relationships") {
            let doc: GraphDocument = serde_json::from_value(value.clone()).ok()?;
            return Some(Document::Graph(doc.with_defaults()));
        }

        if let Some(record) = FlatRecord::from_value(value, schema) {
            return Some(Document::Flat(record));
        }

        if obj.get("name").and_then(Value::as_str).is_some() {
            let entity: Entity = serde_json::from_value(value.clone()).ok()?;
            let doc = GraphDocument {
                entities: vec![entity],
                relationships: Vec::new(),
            }
            .with_defaults();
            if doc.entities.is_empty() {
                return None;
            }
            return Some(Document::Graph(doc));
        }

        None
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Document::Graph(_) => "graph",
            Document::Flat(_) => "flat",
        }
    }
}
