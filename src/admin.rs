// Admin registrations - which models are browsable and which columns their
// list views show

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::{Like, Model, ModelKind, Page},
    orm::Orm,
};

/// Rendered list view of one model
#[derive(Debug, Clone, Serialize)]
pub struct ChangeList {
    pub model: ModelKind,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Type-erased admin registration
#[async_trait]
pub trait AdminEntry: Send + Sync {
    fn model(&self) -> ModelKind;

    fn list_display(&self) -> &[String];

    async fn changelist(&self, orm: &Orm) -> AppResult<ChangeList>;

    async fn detail(&self, orm: &Orm, pk: i64) -> AppResult<Value>;

    async fn delete(&self, orm: &Orm, pk: i64) -> AppResult<bool>;
}

pub struct ModelAdmin<M: Model> {
    list_display: Vec<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ModelAdmin<M> {
    /// Every column must be a displayable field of `M`. An empty list shows
    /// the primary key only.
    pub fn new(list_display: &[&str]) -> AppResult<Self> {
        let available = M::display_fields();
        let list_display: Vec<String> = if list_display.is_empty() {
            available.iter().take(1).cloned().collect()
        } else {
            list_display.iter().map(|s| s.to_string()).collect()
        };

        for column in &list_display {
            if !available.contains(column) {
                return Err(AppError::ConfigurationError(format!(
                    "list_display refers to '{}', which is not a field of {}",
                    column,
                    M::KIND
                )));
            }
        }

        Ok(Self {
            list_display,
            _model: PhantomData,
        })
    }

    fn row(&self, instance: &M) -> Vec<Value> {
        self.list_display
            .iter()
            .map(|field| instance.field_value(field).unwrap_or(Value::Null))
            .collect()
    }
}

#[async_trait]
impl<M: Model> AdminEntry for ModelAdmin<M> {
    fn model(&self) -> ModelKind {
        M::KIND
    }

    fn list_display(&self) -> &[String] {
        &self.list_display
    }

    async fn changelist(&self, orm: &Orm) -> AppResult<ChangeList> {
        let instances = M::fetch_all(orm).await?;
        Ok(ChangeList {
            model: M::KIND,
            columns: self.list_display.clone(),
            rows: instances.iter().map(|i| self.row(i)).collect(),
        })
    }

    async fn detail(&self, orm: &Orm, pk: i64) -> AppResult<Value> {
        let instance = M::fetch(orm, pk)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", M::KIND, pk)))?;
        serde_json::to_value(&instance)
            .map_err(|e| AppError::Internal(format!("Failed to render {} {}: {}", M::KIND, pk, e)))
    }

    async fn delete(&self, orm: &Orm, pk: i64) -> AppResult<bool> {
        M::remove(orm, pk).await
    }
}

#[derive(Default)]
pub struct AdminSite {
    entries: Vec<Box<dyn AdminEntry>>,
}

impl AdminSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model can be registered once
    pub fn register<A: AdminEntry + 'static>(&mut self, admin: A) -> AppResult<()> {
        let model = admin.model();
        if self.entries.iter().any(|e| e.model() == model) {
            return Err(AppError::ConfigurationError(format!(
                "The model {} is already registered",
                model
            )));
        }
        info!(%model, columns = ?admin.list_display(), "registered admin");
        self.entries.push(Box::new(admin));
        Ok(())
    }

    pub fn registered_models(&self) -> Vec<ModelKind> {
        self.entries.iter().map(|e| e.model()).collect()
    }

    pub fn entry(&self, model: &str) -> AppResult<&dyn AdminEntry> {
        self.entries
            .iter()
            .find(|e| e.model().as_str() == model)
            .map(|e| e.as_ref())
            .ok_or_else(|| AppError::NotFound(format!("Model {} is not registered", model)))
    }

    pub async fn changelist(&self, orm: &Orm, model: &str) -> AppResult<ChangeList> {
        self.entry(model)?.changelist(orm).await
    }

    pub async fn detail(&self, orm: &Orm, model: &str, pk: i64) -> AppResult<Value> {
        self.entry(model)?.detail(orm, pk).await
    }

    pub async fn delete(&self, orm: &Orm, model: &str, pk: i64) -> AppResult<bool> {
        self.entry(model)?.delete(orm, pk).await
    }
}

pub fn default_admin_site() -> AppResult<AdminSite> {
    let mut site = AdminSite::new();
    site.register(ModelAdmin::<Page>::new(&[
        "page_name",
        "page_info",
        "date",
        "user",
    ])?)?;
    site.register(ModelAdmin::<Like>::new(&[
        "page_in",
        "page_name",
        "page_info",
        "date",
        "user",
        "likes",
    ])?)?;
    Ok(site)
}
