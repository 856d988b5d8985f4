//! Turn orchestration: normalize, consult the response cache, classify, apply
//! escalation policy, enrich from CRM, compose a reply, and record the turn.
//!
//! The engine is infallible per turn. Collaborator failures (cache, context
//! store, CRM, history) degrade the decision instead of failing it: a cache
//! error reads as a miss, a CRM error or timeout drops enrichment, a history
//! error is logged and forgotten.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::cache::{fingerprint, CacheEntry, ResponseCache};
use crate::classify::IntentClassifier;
use crate::collab::{CrmConnector, HistorySink};
use crate::config::EngineConfig;
use crate::context_store::ContextStore;
use crate::domain::context::{ConversationContext, CUSTOMER_ID_SLOT, ORDER_NUMBER_SLOT};
use crate::domain::customer::{CustomerIdentifier, CustomerSummary};
use crate::domain::decision::Decision;
use crate::domain::history::TurnRecord;
use crate::domain::intent::{ClassificationResult, Intent};
use crate::domain::message::{EntityKind, Message, NormalizedMessage};
use crate::escalation::EscalationPolicy;
use crate::normalize::Normalizer;
use crate::respond;

/// Phrases marking a query as personal to the asking user. Personalized turns
/// bypass the shared response cache in both directions.
const PERSONALIZED_PHRASES: [&str; 5] =
    ["my order", "my account", "my profile", "my payment", "tracking number"];

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub response_cache_ttl: Duration,
    pub crm_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { response_cache_ttl: Duration::from_secs(3600), crm_timeout: Duration::from_millis(1500) }
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            response_cache_ttl: Duration::from_secs(config.response_cache_ttl_secs),
            crm_timeout: Duration::from_millis(config.crm_timeout_ms),
        }
    }
}

pub struct DecisionEngine {
    normalizer: Normalizer,
    classifier: IntentClassifier,
    policy: EscalationPolicy,
    cache: Arc<dyn ResponseCache>,
    contexts: Arc<dyn ContextStore>,
    crm: Option<Arc<dyn CrmConnector>>,
    history: Option<Arc<dyn HistorySink>>,
    settings: EngineSettings,
    // Serializes turns per user so interleaved requests from one user cannot
    // race the context read-modify-write cycle. Distinct users never contend.
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DecisionEngine {
    pub fn new(
        normalizer: Normalizer,
        classifier: IntentClassifier,
        policy: EscalationPolicy,
        cache: Arc<dyn ResponseCache>,
        contexts: Arc<dyn ContextStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            policy,
            cache,
            contexts,
            crm: None,
            history: None,
            settings,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Fully in-memory engine with default tuning. Used by the CLI and tests.
    pub fn in_memory() -> Self {
        Self::new(
            Normalizer::default(),
            IntentClassifier::default(),
            EscalationPolicy::default(),
            Arc::new(crate::cache::InMemoryResponseCache::default()),
            Arc::new(crate::context_store::InMemoryContextStore::default()),
            EngineSettings::default(),
        )
    }

    pub fn with_crm(mut self, crm: Arc<dyn CrmConnector>) -> Self {
        self.crm = Some(crm);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    /// Decide one inbound turn. Never fails; every error path degrades to a
    /// valid `Decision`.
    pub async fn handle(&self, message: &Message) -> Decision {
        let started = Instant::now();
        let session_id =
            message.session_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

        let turn_lock = self.turn_lock(&message.user_id).await;
        let _turn_guard = turn_lock.lock().await;

        let normalized = self.normalizer.normalize(&message.text);
        let decision = if normalized.is_empty() {
            self.clarification_turn(message, session_id, started).await
        } else {
            self.classified_turn(message, &normalized, session_id, started).await
        };

        tracing::info!(
            event_name = "engine.decision",
            user_id = %message.user_id,
            channel = %message.channel.as_str(),
            intent = %decision.intent,
            confidence = decision.confidence,
            requires_escalation = decision.requires_escalation,
            response_time_ms = decision.response_time_ms,
            "turn decided"
        );
        self.append_history(message, &decision);
        decision
    }

    async fn clarification_turn(
        &self,
        message: &Message,
        session_id: String,
        started: Instant,
    ) -> Decision {
        // An empty turn still counts against the conversation.
        let _ = self.record_context(message, Intent::General, None).await;
        Decision {
            response: respond::clarification_response(),
            intent: Intent::General,
            confidence: self.classifier.baseline_confidence(),
            requires_escalation: false,
            session_id,
            response_time_ms: elapsed_ms(started),
        }
    }

    async fn classified_turn(
        &self,
        message: &Message,
        normalized: &NormalizedMessage,
        session_id: String,
        started: Instant,
    ) -> Decision {
        let bucket = self.classifier.coarse_bucket(&normalized.cleaned_text);
        let key = fingerprint(&normalized.cleaned_text, bucket);
        let personalized = is_personalized(normalized);

        if !personalized {
            if let Some(entry) = self.cache_lookup(&key).await {
                let _ = self.record_context(message, entry.intent, normalized.into()).await;
                return Decision {
                    response: entry.response,
                    intent: entry.intent,
                    confidence: entry.confidence,
                    requires_escalation: false,
                    session_id,
                    response_time_ms: elapsed_ms(started),
                };
            }
        }

        let result = self.classifier.classify(normalized);
        let context = self.record_context(message, result.intent, normalized.into()).await;
        let escalation = self.policy.should_escalate(&result, &context, context.turn_count());

        if let Some(reason) = escalation {
            tracing::info!(
                event_name = "engine.escalated",
                user_id = %message.user_id,
                reason = reason.as_str(),
                "turn escalated to a human agent"
            );
            return Decision {
                response: respond::escalation_response(&message.user_id),
                intent: result.intent,
                confidence: result.confidence,
                requires_escalation: true,
                session_id,
                response_time_ms: elapsed_ms(started),
            };
        }

        let customer = self.fetch_customer(&result, normalized, &context).await;
        let response = respond::compose(result.intent, normalized, customer.as_ref(), &context);

        if !personalized {
            if let Err(error) = self
                .cache
                .put(&key, &response, result.intent, result.confidence, self.settings.response_cache_ttl)
                .await
            {
                warn!(event_name = "engine.cache_put_failed", %error, "response not cached");
            }
        }

        Decision {
            response,
            intent: result.intent,
            confidence: result.confidence,
            requires_escalation: false,
            session_id,
            response_time_ms: elapsed_ms(started),
        }
    }

    async fn cache_lookup(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!(event_name = "engine.cache_get_failed", %error, "treating as cache miss");
                None
            }
        }
    }

    /// Record the turn into the user's context, carrying forward any entities
    /// worth remembering. A context-store failure degrades to a one-turn local
    /// context so policy evaluation stays well defined.
    async fn record_context(
        &self,
        message: &Message,
        intent: Intent,
        normalized: Option<&NormalizedMessage>,
    ) -> ConversationContext {
        let now = Utc::now();
        let order_number =
            normalized.and_then(|n| n.first(EntityKind::OrderNumber)).map(str::to_string);
        let topic = intent.as_str().to_string();

        let outcome = self
            .contexts
            .update(
                &message.user_id,
                Box::new(move |context| {
                    context.record_turn(intent, now);
                    context.open_topic = Some(topic);
                    if let Some(order_number) = order_number {
                        context.set_slot(ORDER_NUMBER_SLOT, order_number);
                    }
                }),
            )
            .await;

        match outcome {
            Ok(context) => context,
            Err(error) => {
                warn!(event_name = "engine.context_failed", %error, "using one-turn context");
                let mut fallback = ConversationContext::empty(message.user_id.clone());
                fallback.record_turn(intent, now);
                fallback
            }
        }
    }

    /// CRM enrichment for intents that benefit from it, bounded by the
    /// configured timeout. Absent connector, missing identifier, errors, and
    /// timeouts all resolve to "customer unknown".
    async fn fetch_customer(
        &self,
        result: &ClassificationResult,
        normalized: &NormalizedMessage,
        context: &ConversationContext,
    ) -> Option<CustomerSummary> {
        let crm = self.crm.as_ref()?;
        if !crm_eligible(result.intent) {
            return None;
        }
        let identifier = customer_identifier(normalized, context)?;

        match tokio::time::timeout(self.settings.crm_timeout, crm.fetch_customer(&identifier)).await
        {
            Ok(Ok(summary)) => summary,
            Ok(Err(error)) => {
                warn!(event_name = "engine.crm_failed", %error, "continuing without CRM data");
                None
            }
            Err(_) => {
                warn!(
                    event_name = "engine.crm_timeout",
                    timeout_ms = self.settings.crm_timeout.as_millis() as u64,
                    "continuing without CRM data"
                );
                None
            }
        }
    }

    fn append_history(&self, message: &Message, decision: &Decision) {
        let Some(history) = self.history.as_ref() else {
            return;
        };
        let record = TurnRecord {
            user_id: message.user_id.clone(),
            session_id: decision.session_id.clone(),
            channel: message.channel,
            message: message.text.clone(),
            decision: decision.clone(),
            metadata: message.metadata.clone(),
            timestamp: Utc::now(),
        };
        let history = Arc::clone(history);
        // Fire and forget: persistence never delays or fails a decision.
        tokio::spawn(async move {
            if let Err(error) = history.append(record).await {
                warn!(event_name = "engine.history_failed", %error, "turn not persisted");
            }
        });
    }

    async fn turn_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        // A strong count of 1 means no turn holds that user's lock, so the
        // entry can go; the next turn for that user recreates it.
        locks.retain(|held_user, lock| held_user == user_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn crm_eligible(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::OrderInquiry | Intent::AccountInfo | Intent::Billing | Intent::TechnicalSupport
    )
}

fn customer_identifier(
    normalized: &NormalizedMessage,
    context: &ConversationContext,
) -> Option<CustomerIdentifier> {
    if let Some(email) = normalized.first(EntityKind::Email) {
        return Some(CustomerIdentifier::Email(email.to_string()));
    }
    context.slot(CUSTOMER_ID_SLOT).map(|id| CustomerIdentifier::CustomerId(id.to_string()))
}

fn is_personalized(normalized: &NormalizedMessage) -> bool {
    if normalized.has(EntityKind::Email) || normalized.has(EntityKind::OrderNumber) {
        return true;
    }
    PERSONALIZED_PHRASES.iter().any(|phrase| normalized.cleaned_text.contains(phrase))
}
