use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::domain::context::ConversationContext;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context backend unavailable: {0}")]
    Unavailable(String),
}

/// Mutation applied to a user's context under per-key exclusivity.
pub type ContextMutator = Box<dyn FnOnce(&mut ConversationContext) + Send>;

/// Per-user conversation state capability. Reads of an idle-expired entry
/// behave as if it never existed; mutations for one user are serialized
/// relative to themselves, and users never block each other.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<ConversationContext, ContextError>;

    /// Read-modify-write for one user. Returns the post-mutation context.
    async fn update(
        &self,
        user_id: &str,
        mutator: ContextMutator,
    ) -> Result<ConversationContext, ContextError>;
}

/// In-memory context store with lazy idle-TTL expiry. Each user owns a mutex
/// slot so a user's read-modify-write cycles never interleave; the outer map
/// lock is held only long enough to find or create the slot.
pub struct InMemoryContextStore {
    idle_ttl: Duration,
    slots: RwLock<HashMap<String, Arc<Mutex<ConversationContext>>>>,
}

impl InMemoryContextStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self { idle_ttl, slots: RwLock::new(HashMap::new()) }
    }

    async fn slot(&self, user_id: &str) -> Arc<Mutex<ConversationContext>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(user_id) {
                return Arc::clone(slot);
            }
        }

        let mut slots = self.slots.write().await;
        sweep_idle(&mut slots, self.idle_cutoff());
        Arc::clone(
            slots
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ConversationContext::empty(user_id)))),
        )
    }

    fn idle_cutoff(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.idle_ttl).unwrap_or_else(|_| chrono::Duration::minutes(30))
    }

    fn expire_if_idle(&self, context: &mut ConversationContext) {
        if Utc::now() - context.updated_at > self.idle_cutoff() {
            *context = ConversationContext::empty(context.user_id.clone());
        }
    }
}

/// Drops slots whose context idled past the TTL and that no in-flight turn
/// still references, so the map stays bounded by the set of users active
/// within one TTL window. Runs under the write lock when a new slot is made.
fn sweep_idle(
    slots: &mut HashMap<String, Arc<Mutex<ConversationContext>>>,
    cutoff: chrono::Duration,
) {
    let now = Utc::now();
    slots.retain(|_, slot| {
        if Arc::strong_count(slot) > 1 {
            return true;
        }
        match slot.try_lock() {
            Ok(context) => now - context.updated_at <= cutoff,
            Err(_) => true,
        }
    });
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(1800))
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get(&self, user_id: &str) -> Result<ConversationContext, ContextError> {
        let slot = self.slot(user_id).await;
        let mut context = slot.lock().await;
        self.expire_if_idle(&mut context);
        Ok(context.clone())
    }

    async fn update(
        &self,
        user_id: &str,
        mutator: ContextMutator,
    ) -> Result<ConversationContext, ContextError> {
        let slot = self.slot(user_id).await;
        let mut context = slot.lock().await;
        self.expire_if_idle(&mut context);
        mutator(&mut context);
        context.updated_at = Utc::now();
        Ok(context.clone())
    }
}
