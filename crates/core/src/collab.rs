use async_trait::async_trait;
use thiserror::Error;

use crate::domain::customer::{CustomerIdentifier, CustomerSummary};
use crate::domain::history::TurnRecord;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("crm request failed: {0}")]
    Request(String),
    #[error("crm returned an unusable payload: {0}")]
    Payload(String),
    #[error("crm integration is not configured")]
    NotConfigured,
}

/// Remote customer-relationship lookup. Failures are non-fatal to the engine:
/// a turn degrades to a reply without CRM enrichment.
#[async_trait]
pub trait CrmConnector: Send + Sync {
    async fn fetch_customer(
        &self,
        identifier: &CustomerIdentifier,
    ) -> Result<Option<CustomerSummary>, CrmError>;
}

/// CRM stand-in for tests and deployments without an integration. Always
/// resolves to "customer unknown".
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCrmConnector;

#[async_trait]
impl CrmConnector for NoopCrmConnector {
    async fn fetch_customer(
        &self,
        _identifier: &CustomerIdentifier,
    ) -> Result<Option<CustomerSummary>, CrmError> {
        Ok(None)
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history append failed: {0}")]
    Append(String),
    #[error("history query failed: {0}")]
    Query(String),
}

/// Append-only chat-history log. The engine fires appends and never awaits
/// them before producing a decision; failures are logged by the caller.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, record: TurnRecord) -> Result<(), HistoryError>;
}
