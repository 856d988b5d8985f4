use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier the CRM collaborator can resolve a customer by.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum CustomerIdentifier {
    Email(String),
    CustomerId(String),
}

impl CustomerIdentifier {
    pub fn value(&self) -> &str {
        match self {
            Self::Email(value) | Self::CustomerId(value) => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrmContact {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrmOrder {
    pub order_number: String,
    pub status: String,
    pub order_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrmCase {
    pub case_number: String,
    pub subject: String,
    pub status: String,
}

/// Snapshot of CRM knowledge about one customer, as returned by the
/// collaborator. Every field is optional enrichment; the engine composes a
/// valid reply without any of it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub contact: Option<CrmContact>,
    #[serde(default)]
    pub recent_orders: Vec<CrmOrder>,
    #[serde(default)]
    pub open_cases: Vec<CrmCase>,
    #[serde(default)]
    pub customer_tier: Option<String>,
    #[serde(default)]
    pub total_orders: u32,
}

impl CustomerSummary {
    /// Find a recent order whose number contains the given fragment, the way
    /// customers quote partial order numbers back at support.
    pub fn matching_order(&self, fragment: &str) -> Option<&CrmOrder> {
        if fragment.is_empty() {
            return None;
        }
        self.recent_orders.iter().find(|order| order.order_number.contains(fragment))
    }
}
