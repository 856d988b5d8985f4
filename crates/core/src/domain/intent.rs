use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The closed set of intents the engine can assign to a message.
///
/// Variant order is the tie-break priority: when two intents score exactly the
/// same, the one listed earlier wins. This ordering is part of the contract,
/// not an accident of the enum layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OrderInquiry,
    AccountInfo,
    ProductInfo,
    Billing,
    TechnicalSupport,
    General,
    Escalate,
}

impl Intent {
    /// All intents in tie-break priority order.
    pub const ALL: [Intent; 7] = [
        Intent::OrderInquiry,
        Intent::AccountInfo,
        Intent::ProductInfo,
        Intent::Billing,
        Intent::TechnicalSupport,
        Intent::General,
        Intent::Escalate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderInquiry => "order_inquiry",
            Self::AccountInfo => "account_info",
            Self::ProductInfo => "product_info",
            Self::Billing => "billing",
            Self::TechnicalSupport => "technical_support",
            Self::General => "general",
            Self::Escalate => "escalate",
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown intent `{value}`"))
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for a single normalized message.
///
/// Deterministic for identical input: same text always yields the same intent,
/// confidence, and matched keyword set.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub confidence: f64,
    pub matched_keywords: BTreeSet<String>,
}

impl ClassificationResult {
    pub fn baseline(confidence: f64) -> Self {
        Self { intent: Intent::General, confidence, matched_keywords: BTreeSet::new() }
    }
}
