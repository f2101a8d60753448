use extract::{FlatRecord, MatchInfo, ValueWeight, normalize_label};
use std::collections::{BTreeMap, HashMap};

use crate::confidence::round4;

/// Match strength factor for one list value.
///
/// An inactive matcher counts every value as exact.
pub fn match_strength(info: Option<&MatchInfo>, matcher_active: bool) -> f64 {
    let Some(info) = info.filter(|_| matcher_active) else {
        return 1.0;
    };
    if info.score >= 100.0 {
        1.0
    } else if info.matched {
        0.7
    } else if info.score >= 70.0 {
        0.5
    } else {
        0.4
    }
}

/// `w = ln(1 + f) * C * M * S`
pub fn value_weight(frequency: usize, confidence: f64, strength: f64, reliability: f64) -> f64 {
    round4((1.0 + frequency as f64).ln() * confidence * strength * reliability)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[derive(Debug)]
struct ValueStats {
    value: String,
    frequency: usize,
    best: Option<MatchInfo>,
}

#[derive(Debug)]
struct Topic {
    subject: String,
    confidence: Option<f64>,
    reliabilities: Vec<f64>,
    source_reliability: BTreeMap<String, f64>,
    fields: BTreeMap<String, Vec<ValueStats>>,
}

impl Topic {
    fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            confidence: None,
            reliabilities: Vec::new(),
            source_reliability: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    fn finish(self, matcher_active: bool) -> FlatRecord {
        let confidence = self.confidence.unwrap_or(1.0);
        let reliability = mean(self.reliabilities.iter().copied()).unwrap_or(1.0);

        let mut fields = BTreeMap::new();
        let mut edge_weights = BTreeMap::new();
        for (field, values) in self.fields {
            let weights: Vec<ValueWeight> = values
                .iter()
                .map(|v| ValueWeight {
                    value: v.value.clone(),
                    weight: value_weight(
                        v.frequency,
                        confidence,
                        match_strength(v.best.as_ref(), matcher_active),
                        reliability,
                    ),
                    frequency: v.frequency,
                })
                .collect();
            fields.insert(field.clone(), values.into_iter().map(|v| v.value).collect());
            edge_weights.insert(field, weights);
        }

        FlatRecord {
            subject: self.subject,
            confidence: self.confidence,
            fields,
            source_reliability: self.source_reliability,
            edge_weights,
        }
    }
}

/// Groups flat records by subject and weights each list value.
#[derive(Debug, Default)]
pub struct FlatAccumulator {
    topics: Vec<Topic>,
    index: HashMap<String, usize>,
}

impl FlatAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `infos` holds the match info per field, aligned with the record's
    /// (already normalized) value lists.
    pub fn absorb(&mut self, record: FlatRecord, infos: &BTreeMap<String, Vec<MatchInfo>>) {
        let key = normalize_label(&record.subject);
        let idx = *self.index.entry(key).or_insert_with(|| {
            self.topics.push(Topic::new(&record.subject));
            self.topics.len() - 1
        });
        let topic = &mut self.topics[idx];

        if let Some(c) = record.confidence {
            topic.confidence = Some(topic.confidence.map_or(c, |old: f64| old.max(c)));
        }
        if let Some(m) = mean(record.source_reliability.values().copied()) {
            topic.reliabilities.push(m);
        }
        topic.source_reliability.extend(record.source_reliability);

        for (field, values) in record.fields {
            let field_infos = infos.get(&field);
            let slot = topic.fields.entry(field).or_default();
            let mut seen_here: Vec<usize> = Vec::new();

            for (i, value) in values.into_iter().enumerate() {
                let info = field_infos.and_then(|infos| infos.get(i));
                let pos = match slot.iter().position(|v| v.value == value) {
                    Some(pos) => pos,
                    None => {
                        slot.push(ValueStats {
                            value,
                            frequency: 0,
                            best: None,
                        });
                        slot.len() - 1
                    }
                };

                let stats = &mut slot[pos];
                if let Some(info) = info {
                    let better = stats.best.as_ref().is_none_or(|b| info.score > b.score);
                    if better {
                        stats.best = Some(info.clone());
                    }
                }
                if !seen_here.contains(&pos) {
                    seen_here.push(pos);
                    stats.frequency += 1;
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn finish(self, matcher_active: bool) -> Vec<FlatRecord> {
        self.topics
            .into_iter()
            .map(|t| t.finish(matcher_active))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, symptoms: &[&str], reliability: &[(&str, f64)]) -> FlatRecord {
        FlatRecord {
            subject: subject.to_string(),
            confidence: None,
            fields: BTreeMap::from([(
                "symptoms".to_string(),
                symptoms.iter().map(|s| s.to_string()).collect(),
            )]),
            source_reliability: reliability
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            edge_weights: BTreeMap::new(),
        }
    }

    fn info(matched: bool, score: f64) -> MatchInfo {
        MatchInfo {
            matched,
            score,
            id: None,
            normalized: String::new(),
        }
    }

    #[test]
    fn test_match_strength_bands() {
        assert_eq!(match_strength(Some(&info(true, 100.0)), true), 1.0);
        assert_eq!(match_strength(Some(&info(true, 90.0)), true), 0.7);
        assert_eq!(match_strength(Some(&info(false, 75.0)), true), 0.5);
        assert_eq!(match_strength(Some(&info(false, 10.0)), true), 0.4);
        assert_eq!(match_strength(Some(&info(false, 10.0)), false), 1.0);
        assert_eq!(match_strength(None, true), 1.0);
    }

    #[test]
    fn test_topics_grouped_and_weighted() {
        let mut acc = FlatAccumulator::new();
        let none = BTreeMap::new();
        acc.absorb(record("Flu", &["fever", "cough", "fever"], &[("a.json", 1.0)]), &none);
        acc.absorb(record(" flu ", &["fever"], &[("b.json", 0.5)]), &none);
        acc.absorb(record("Cold", &["sneezing"], &[]), &none);

        let merged = acc.finish(false);
        assert_eq!(merged.len(), 2);

        let flu = &merged[0];
        assert_eq!(flu.subject, "Flu");
        assert_eq!(flu.fields["symptoms"], vec!["fever", "cough"]);

        let weights = &flu.edge_weights["symptoms"];
        assert_eq!(weights[0].frequency, 2);
        // ln(3) * 1.0 * 1.0 * 0.75
        assert_eq!(weights[0].weight, round4(3f64.ln() * 0.75));
        assert_eq!(weights[1].frequency, 1);
        assert_eq!(weights[1].weight, round4(2f64.ln() * 0.75));

        let cold = &merged[1];
        assert_eq!(cold.edge_weights["symptoms"][0].weight, round4(2f64.ln()));
    }

    #[test]
    fn test_match_info_lowers_weight() {
        let mut acc = FlatAccumulator::new();
        let infos = BTreeMap::from([("symptoms".to_string(), vec![info(false, 20.0)])]);
        let mut rec = record("Flu", &["odd thing"], &[]);
        rec.confidence = Some(0.5);
        acc.absorb(rec, &infos);

        let merged = acc.finish(true);
        assert_eq!(
            merged[0].edge_weights["symptoms"][0].weight,
            round4(2f64.ln() * 0.5 * 0.4)
        );
    }
}
