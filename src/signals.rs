// Model signals - receivers reacting to save and delete events on models

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::{
    error::{AppError, AppResult},
    models::{Like, ModelKind, Page, User},
    orm::Orm,
};

/// Lifecycle events a receiver can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    PreSave,
    PostSave,
    PreDelete,
    PostDelete,
}

/// The model value a signal is sent for.
///
/// On post-delete the row is already gone from storage; the instance is the
/// last in-memory copy.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    User(User),
    Page(Page),
    Like(Like),
}

impl Instance {
    pub fn sender(&self) -> ModelKind {
        match self {
            Instance::User(_) => ModelKind::User,
            Instance::Page(_) => ModelKind::Page,
            Instance::Like(_) => ModelKind::Like,
        }
    }

    pub fn pk(&self) -> i64 {
        match self {
            Instance::User(user) => user.id,
            Instance::Page(page) => page.user,
            Instance::Like(like) => like.page_in,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalContext {
    pub signal: Signal,
    pub instance: Instance,
    /// Set on save signals: whether the row is new
    pub created: Option<bool>,
}

impl SignalContext {
    pub fn save(signal: Signal, instance: Instance, created: bool) -> Self {
        Self {
            signal,
            instance,
            created: Some(created),
        }
    }

    pub fn delete(signal: Signal, instance: Instance) -> Self {
        Self {
            signal,
            instance,
            created: None,
        }
    }

    pub fn sender(&self) -> ModelKind {
        self.instance.sender()
    }
}

/// Trait for implementing signal receivers
#[async_trait]
pub trait Receiver: Send + Sync {
    /// Handle one event. `conn` is the connection of the write's
    /// transaction; follow-up writes go through the ORM's `*_in` methods on
    /// it so they commit or roll back together with the write.
    async fn receive(
        &self,
        orm: &Orm,
        conn: &mut SqliteConnection,
        ctx: &SignalContext,
    ) -> AppResult<()>;

    fn name(&self) -> &str;

    fn signals(&self) -> Vec<Signal>;
}

/// Receivers keyed by sender model, kept in connection order
#[derive(Default)]
pub struct SignalRegistry {
    receivers: HashMap<ModelKind, Vec<Box<dyn Receiver>>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, sender: ModelKind, receiver: Box<dyn Receiver>) {
        self.receivers.entry(sender).or_default().push(receiver);
    }

    /// Names of the receivers that would run for this sender and signal
    pub fn receivers_for(&self, sender: ModelKind, signal: Signal) -> Vec<&str> {
        self.receivers
            .get(&sender)
            .map(|receivers| {
                receivers
                    .iter()
                    .filter(|r| r.signals().contains(&signal))
                    .map(|r| r.name())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Run every matching receiver; the first failure stops the dispatch
    pub async fn send(
        &self,
        orm: &Orm,
        conn: &mut SqliteConnection,
        ctx: &SignalContext,
    ) -> AppResult<()> {
        if let Some(receivers) = self.receivers.get(&ctx.sender()) {
            for receiver in receivers {
                if receiver.signals().contains(&ctx.signal) {
                    receiver.receive(orm, conn, ctx).await.map_err(|e| {
                        AppError::SignalError(format!(
                            "Receiver '{}' failed: {}",
                            receiver.name(),
                            e
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// Deleting a profile page removes the account that owned it
pub struct DeleteRelatedUser;

#[async_trait]
impl Receiver for DeleteRelatedUser {
    async fn receive(
        &self,
        orm: &Orm,
        conn: &mut SqliteConnection,
        ctx: &SignalContext,
    ) -> AppResult<()> {
        let Instance::Page(page) = &ctx.instance else {
            return Ok(());
        };
        info!(page = page.user, "page post_delete");

        if !orm.delete_user_in(conn, page.user).await? {
            debug!(user = page.user, "user already deleted");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "delete_related_user"
    }

    fn signals(&self) -> Vec<Signal> {
        vec![Signal::PostDelete]
    }
}

/// Structured log line for every write
pub struct AuditLog;

#[async_trait]
impl Receiver for AuditLog {
    async fn receive(
        &self,
        _orm: &Orm,
        _conn: &mut SqliteConnection,
        ctx: &SignalContext,
    ) -> AppResult<()> {
        info!(
            signal = ?ctx.signal,
            sender = %ctx.sender(),
            pk = ctx.instance.pk(),
            created = ?ctx.created,
            "model event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "audit_log"
    }

    fn signals(&self) -> Vec<Signal> {
        vec![Signal::PostSave, Signal::PostDelete]
    }
}

pub fn default_signal_registry() -> SignalRegistry {
    let mut registry = SignalRegistry::new();

    for sender in [ModelKind::User, ModelKind::Page, ModelKind::Like] {
        registry.connect(sender, Box::new(AuditLog));
    }
    registry.connect(ModelKind::Page, Box::new(DeleteRelatedUser));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::NewUser;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct Counting {
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Receiver for Counting {
        async fn receive(
            &self,
            _orm: &Orm,
            _conn: &mut SqliteConnection,
            _ctx: &SignalContext,
        ) -> AppResult<()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn signals(&self) -> Vec<Signal> {
            vec![Signal::PostSave]
        }
    }

    struct Failing;

    #[async_trait]
    impl Receiver for Failing {
        async fn receive(
            &self,
            _orm: &Orm,
            _conn: &mut SqliteConnection,
            _ctx: &SignalContext,
        ) -> AppResult<()> {
            Err(AppError::Internal("boom".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn signals(&self) -> Vec<Signal> {
            vec![Signal::PreSave]
        }
    }

    #[test]
    fn default_registry_wires_cascade_on_page_only() {
        let registry = default_signal_registry();
        assert_eq!(
            registry.receivers_for(ModelKind::Page, Signal::PostDelete),
            vec!["audit_log", "delete_related_user"]
        );
        assert_eq!(
            registry.receivers_for(ModelKind::Like, Signal::PostDelete),
            vec!["audit_log"]
        );
        assert!(registry.receivers_for(ModelKind::User, Signal::PreDelete).is_empty());
    }

    #[tokio::test]
    async fn receivers_only_see_their_sender_and_signal() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = SignalRegistry::new();
        registry.connect(ModelKind::User, Box::new(Counting { hits: hits.clone() }));

        let orm = Orm::new(Database::new_in_memory().await.unwrap(), registry);
        let user = orm.create_user(NewUser::new("ada", "pw")).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        orm.delete_user(user.id).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_pre_save_aborts_the_write() {
        let mut registry = SignalRegistry::new();
        registry.connect(ModelKind::User, Box::new(Failing));

        let orm = Orm::new(Database::new_in_memory().await.unwrap(), registry);
        match orm.create_user(NewUser::new("ada", "pw")).await {
            Err(AppError::SignalError(msg)) => assert!(msg.contains("failing")),
            other => panic!("expected signal error, got {:?}", other),
        }
        assert!(orm.list_users().await.unwrap().is_empty());
    }
}
