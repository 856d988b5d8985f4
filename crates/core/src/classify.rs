use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::intent::{ClassificationResult, Intent};
use crate::domain::message::NormalizedMessage;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Confidence assigned when no intent scores above zero.
    pub baseline_confidence: f64,
    /// Additive bonus when a keyword match falls within the early-token window,
    /// a signal the intent is the primary subject of the message.
    pub early_token_bonus: f64,
    /// Number of leading tokens considered "early".
    pub early_token_window: usize,
    /// Multiplier applied to the matched-weight fraction before clamping.
    /// Calibrated so a single strong hit in a ten-keyword set clears the
    /// default escalation threshold.
    pub score_scale: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            baseline_confidence: 0.3,
            early_token_bonus: 0.1,
            early_token_window: 4,
            score_scale: 8.0,
        }
    }
}

/// One intent's keyword-weight row in the classification table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub intent: Intent,
    pub priority: u32,
    pub keywords: BTreeMap<String, f64>,
}

/// Static, versioned keyword table driving classification.
///
/// Loading this structure is a configuration concern; the built-in default is
/// the shipped v1 table. Entries are kept in priority order, which doubles as
/// the documented tie-break order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeywordTable {
    pub version: u32,
    pub entries: Vec<KeywordEntry>,
}

#[derive(Debug, Error)]
pub enum KeywordTableError {
    #[error("could not parse keyword table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("keyword table validation failed: {0}")]
    Validation(String),
}

impl KeywordTable {
    pub fn builtin() -> Self {
        fn entry(intent: Intent, priority: u32, keywords: &[&str]) -> KeywordEntry {
            KeywordEntry {
                intent,
                priority,
                keywords: keywords.iter().map(|keyword| (keyword.to_string(), 1.0)).collect(),
            }
        }

        Self {
            version: 1,
            entries: vec![
                entry(
                    Intent::OrderInquiry,
                    10,
                    &[
                        "order",
                        "delivery",
                        "shipping",
                        "track",
                        "status",
                        "when will",
                        "where is my",
                        "shipped",
                        "delivered",
                        "package",
                    ],
                ),
                entry(
                    Intent::AccountInfo,
                    20,
                    &[
                        "account",
                        "profile",
                        "login",
                        "password",
                        "username",
                        "email",
                        "update",
                        "change",
                        "personal information",
                    ],
                ),
                entry(
                    Intent::ProductInfo,
                    30,
                    &[
                        "product",
                        "item",
                        "specification",
                        "feature",
                        "price",
                        "cost",
                        "available",
                        "in stock",
                        "details",
                        "description",
                    ],
                ),
                entry(
                    Intent::Billing,
                    40,
                    &[
                        "bill",
                        "payment",
                        "charge",
                        "invoice",
                        "refund",
                        "money",
                        "credit card",
                        "subscription",
                        "plan",
                    ],
                ),
                entry(
                    Intent::TechnicalSupport,
                    50,
                    &[
                        "not working",
                        "error",
                        "bug",
                        "issue",
                        "problem",
                        "broken",
                        "support",
                        "technical",
                        "fix",
                        "troubleshoot",
                    ],
                ),
            ],
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, KeywordTableError> {
        let mut table: KeywordTable = toml::from_str(raw)?;
        table.entries.sort_by_key(|entry| entry.priority);
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), KeywordTableError> {
        if self.entries.is_empty() {
            return Err(KeywordTableError::Validation("table has no entries".to_string()));
        }

        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.intent) {
                return Err(KeywordTableError::Validation(format!(
                    "duplicate entry for intent `{}`",
                    entry.intent
                )));
            }
            if entry.keywords.is_empty() {
                return Err(KeywordTableError::Validation(format!(
                    "intent `{}` has an empty keyword set",
                    entry.intent
                )));
            }
            if entry.keywords.values().any(|weight| *weight <= 0.0) {
                return Err(KeywordTableError::Validation(format!(
                    "intent `{}` has a non-positive keyword weight",
                    entry.intent
                )));
            }
        }
        Ok(())
    }
}

/// Phrases that short-circuit classification straight to `escalate`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscalationLexicon {
    pub phrases: Vec<String>,
}

impl Default for EscalationLexicon {
    fn default() -> Self {
        Self {
            phrases: [
                "speak to a human",
                "talk to a human",
                "speak to a manager",
                "talk to a manager",
                "manager",
                "supervisor",
                "human agent",
                "real person",
                "escalate",
                "complaint",
                "lawsuit",
                "legal",
            ]
            .iter()
            .map(|phrase| phrase.to_string())
            .collect(),
        }
    }
}

impl EscalationLexicon {
    fn matches(&self, cleaned_text: &str) -> BTreeSet<String> {
        self.phrases
            .iter()
            .filter(|phrase| cleaned_text.contains(phrase.as_str()))
            .cloned()
            .collect()
    }
}

/// Rule-driven intent classifier. Pure, synchronous, and deterministic:
/// identical normalized text always produces the same result.
#[derive(Clone, Debug)]
pub struct IntentClassifier {
    config: ClassifierConfig,
    table: KeywordTable,
    escalation: EscalationLexicon,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default(), KeywordTable::builtin(), EscalationLexicon::default())
    }
}

impl IntentClassifier {
    pub fn new(
        config: ClassifierConfig,
        table: KeywordTable,
        escalation: EscalationLexicon,
    ) -> Self {
        Self { config, table, escalation }
    }

    pub fn classify(&self, msg: &NormalizedMessage) -> ClassificationResult {
        let cleaned_text = msg.cleaned_text.as_str();
        if cleaned_text.is_empty() {
            return ClassificationResult::baseline(self.config.baseline_confidence);
        }

        // Escalation phrases override everything else.
        let escalation_hits = self.escalation.matches(cleaned_text);
        if !escalation_hits.is_empty() {
            return ClassificationResult {
                intent: Intent::Escalate,
                confidence: 1.0,
                matched_keywords: escalation_hits,
            };
        }

        let early_window = early_window(cleaned_text, self.config.early_token_window);
        let mut best: Option<(Intent, f64, BTreeSet<String>)> = None;

        for entry in &self.table.entries {
            let total_weight: f64 = entry.keywords.values().sum();
            let mut matched_weight = 0.0;
            let mut matched = BTreeSet::new();
            let mut early_match = false;

            for (keyword, weight) in &entry.keywords {
                if cleaned_text.contains(keyword.as_str()) {
                    matched_weight += weight;
                    early_match = early_match || early_window.contains(keyword.as_str());
                    matched.insert(keyword.clone());
                }
            }

            if matched.is_empty() {
                continue;
            }

            let mut score = (matched_weight / total_weight) * self.config.score_scale;
            if early_match {
                score += self.config.early_token_bonus;
            }

            // Strictly-greater keeps the earlier (higher-priority) entry on ties.
            let replace = best.as_ref().map(|(_, best_score, _)| score > *best_score).unwrap_or(true);
            if replace {
                best = Some((entry.intent, score, matched));
            }
        }

        match best {
            Some((intent, score, matched_keywords)) => ClassificationResult {
                intent,
                confidence: score.clamp(0.0, 1.0),
                matched_keywords,
            },
            None => ClassificationResult::baseline(self.config.baseline_confidence),
        }
    }

    /// Cheap first-hit scan used only to derive the cache-fingerprint bucket.
    /// Deliberately avoids full scoring so a cache hit skips classification.
    pub fn coarse_bucket(&self, cleaned_text: &str) -> Intent {
        if !self.escalation.matches(cleaned_text).is_empty() {
            return Intent::Escalate;
        }
        for entry in &self.table.entries {
            if entry.keywords.keys().any(|keyword| cleaned_text.contains(keyword.as_str())) {
                return entry.intent;
            }
        }
        Intent::General
    }

    pub fn baseline_confidence(&self) -> f64 {
        self.config.baseline_confidence
    }
}

fn early_window(cleaned_text: &str, window: usize) -> String {
    cleaned_text.split_whitespace().take(window).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{ClassifierConfig, EscalationLexicon, IntentClassifier, KeywordTable};
    use crate::domain::intent::Intent;
    use crate::normalize::Normalizer;

    fn classify(text: &str) -> crate::domain::intent::ClassificationResult {
        let normalizer = Normalizer::default();
        let classifier = IntentClassifier::default();
        classifier.classify(&normalizer.normalize(text))
    }

    #[test]
    fn order_wording_classifies_as_order_inquiry() {
        let result = classify("I need help with my order #12345");
        assert_eq!(result.intent, Intent::OrderInquiry);
        assert!(result.confidence > 0.3, "confidence {} should beat baseline", result.confidence);
        assert!(result.matched_keywords.contains("order"));
    }

    #[test]
    fn escalation_phrases_short_circuit_to_full_confidence() {
        let result = classify("let me speak to a manager now");
        assert_eq!(result.intent, Intent::Escalate);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn unmatched_text_falls_back_to_general_baseline() {
        let result = classify("the weather is lovely today");
        assert_eq!(result.intent, Intent::General);
        assert_eq!(result.confidence, 0.3);
        assert!(result.matched_keywords.is_empty());
    }

    #[test]
    fn empty_text_falls_back_to_general_baseline() {
        let result = classify("");
        assert_eq!(result.intent, Intent::General);
        assert_eq!(result.confidence, 0.3);
    }

    #[test]
    fn classification_is_deterministic() {
        let first = classify("my payment failed with an error");
        let second = classify("my payment failed with an error");
        assert_eq!(first, second);
    }

    #[test]
    fn confidence_stays_within_unit_interval() {
        let inputs = [
            "order order delivery shipping track status shipped delivered package",
            "bill payment charge invoice refund money plan subscription",
            "hello there",
            "",
        ];
        for input in inputs {
            let result = classify(input);
            assert!(
                (0.0..=1.0).contains(&result.confidence),
                "confidence {} out of range for `{input}`",
                result.confidence
            );
            assert!(Intent::ALL.contains(&result.intent));
        }
    }

    #[test]
    fn early_tokens_earn_a_primary_subject_bonus() {
        let normalizer = Normalizer::default();
        let classifier = IntentClassifier::default();

        let leading = classifier.classify(&normalizer.normalize("order question for you please"));
        let trailing =
            classifier.classify(&normalizer.normalize("a question for you about an order"));

        assert_eq!(leading.intent, Intent::OrderInquiry);
        assert_eq!(trailing.intent, Intent::OrderInquiry);
        assert!(leading.confidence > trailing.confidence);
    }

    #[test]
    fn exact_ties_resolve_to_the_higher_priority_entry() {
        let table = KeywordTable::from_toml_str(
            r#"
            version = 2

            [[entries]]
            intent = "billing"
            priority = 20
            [entries.keywords]
            "invoice" = 1.0
            "statement" = 1.0

            [[entries]]
            intent = "account_info"
            priority = 10
            [entries.keywords]
            "invoice" = 1.0
            "statement" = 1.0
            "#,
        )
        .expect("table parses");
        let classifier =
            IntentClassifier::new(ClassifierConfig::default(), table, EscalationLexicon::default());

        let normalizer = Normalizer::default();
        let result = classifier.classify(&normalizer.normalize("about that invoice"));
        assert_eq!(result.intent, Intent::AccountInfo, "lower priority value sorts first and wins");
    }

    #[test]
    fn coarse_bucket_matches_first_hit_without_scoring() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.coarse_bucket("where is my package"), Intent::OrderInquiry);
        assert_eq!(classifier.coarse_bucket("i want a refund"), Intent::Billing);
        assert_eq!(classifier.coarse_bucket("speak to a manager"), Intent::Escalate);
        assert_eq!(classifier.coarse_bucket("good morning"), Intent::General);
    }

    #[test]
    fn builtin_table_passes_validation() {
        KeywordTable::builtin().validate().expect("builtin table is valid");
    }

    #[test]
    fn table_rejects_duplicate_intents() {
        let raw = r#"
            version = 1

            [[entries]]
            intent = "billing"
            priority = 10
            [entries.keywords]
            "invoice" = 1.0

            [[entries]]
            intent = "billing"
            priority = 20
            [entries.keywords]
            "refund" = 1.0
        "#;
        assert!(KeywordTable::from_toml_str(raw).is_err());
    }
}
