// Stored models: accounts, profile pages and the like counters extending them

pub mod like;
pub mod page;
pub mod user;

pub use like::{Like, LikeUpdate, NewLike};
pub use page::{NewPage, Page, PageUpdate};
pub use user::{NewUser, User};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{error::AppResult, orm::Orm, schema::ModelSchema};

/// Kind of model, used to key signal receivers and admin registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    User,
    Page,
    Like,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::User => "user",
            ModelKind::Page => "page",
            ModelKind::Like => "like",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence surface every model exposes to the admin
#[async_trait]
pub trait Model: ModelSchema + Serialize + Sized + Send + Sync + 'static {
    const KIND: ModelKind;

    fn pk(&self) -> i64;

    /// Field names that can be shown in list views
    fn display_fields() -> Vec<String>;

    async fn fetch_all(orm: &Orm) -> AppResult<Vec<Self>>;

    async fn fetch(orm: &Orm, pk: i64) -> AppResult<Option<Self>>;

    /// Delete through the ORM so lifecycle signals fire
    async fn remove(orm: &Orm, pk: i64) -> AppResult<bool>;

    fn field_value(&self, field: &str) -> Option<Value> {
        serde_json::to_value(self).ok()?.get(field).cloned()
    }
}
