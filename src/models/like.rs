use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{Model, ModelKind, NewPage, Page, PageUpdate};
use crate::{
    error::AppResult,
    orm::Orm,
    schema::{self, FieldDefault, FieldDefinition, FieldType, ModelSchema},
};

/// Like counter extending a page; `page_in` is the shared key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Like {
    pub page_in: i64,
    #[serde(flatten)]
    pub page: Page,
    pub likes: i64,
}

/// Creates the parent page row together with the like row
#[derive(Debug, Clone, Deserialize)]
pub struct NewLike {
    #[serde(flatten)]
    pub page: NewPage,
    #[serde(default)]
    pub likes: i64,
}

impl NewLike {
    pub fn validate(&self) -> AppResult<()> {
        self.page.validate()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LikeUpdate {
    #[serde(flatten)]
    pub page: PageUpdate,
    pub likes: Option<i64>,
}

impl Like {
    /// Expects the joined columns of `likes` and `pages`
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            page_in: row.get("page_in"),
            page: Page::from_row(row),
            likes: row.get("likes"),
        }
    }
}

impl ModelSchema for Like {
    fn table() -> &'static str {
        "likes"
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::one_to_one("page_in", "pages", "user").parent_link(),
            FieldDefinition::new("likes", FieldType::Int64).default_value(FieldDefault::Int64(0)),
        ]
    }
}

#[async_trait]
impl Model for Like {
    const KIND: ModelKind = ModelKind::Like;

    fn pk(&self) -> i64 {
        self.page_in
    }

    /// Own columns plus every inherited page column
    fn display_fields() -> Vec<String> {
        schema::inherited_field_names::<Self, Page>()
    }

    async fn fetch_all(orm: &Orm) -> AppResult<Vec<Self>> {
        orm.list_likes().await
    }

    async fn fetch(orm: &Orm, pk: i64) -> AppResult<Option<Self>> {
        orm.find_like(pk).await
    }

    async fn remove(orm: &Orm, pk: i64) -> AppResult<bool> {
        orm.delete_like(pk).await
    }
}
