pub mod cache;
pub mod classify;
pub mod collab;
pub mod config;
pub mod context_store;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod escalation;
pub mod normalize;
pub mod respond;

pub use cache::{fingerprint, CacheEntry, CacheError, InMemoryResponseCache, ResponseCache};
pub use classify::{
    ClassifierConfig, EscalationLexicon, IntentClassifier, KeywordEntry, KeywordTable,
    KeywordTableError,
};
pub use collab::{CrmConnector, CrmError, HistoryError, HistorySink, NoopCrmConnector};
pub use config::{
    AppConfig, ConfigError, ConfigOverrides, CrmConfig, DatabaseConfig, EngineConfig,
    LoadOptions, LogFormat, LoggingConfig, ServerConfig, SlackConfig, WhatsAppConfig,
};
pub use context_store::{ContextError, ContextMutator, ContextStore, InMemoryContextStore};
pub use domain::context::ConversationContext;
pub use domain::customer::{CrmCase, CrmContact, CrmOrder, CustomerIdentifier, CustomerSummary};
pub use domain::decision::Decision;
pub use domain::history::{HistoryEntry, TurnRecord, TurnRole};
pub use domain::intent::{ClassificationResult, Intent};
pub use domain::message::{Channel, EntityKind, Message, NormalizedMessage};
pub use engine::{DecisionEngine, EngineSettings};
pub use errors::InterfaceError;
pub use escalation::{EscalationConfig, EscalationPolicy, EscalationReason};
pub use normalize::{Normalizer, NormalizerConfig};
