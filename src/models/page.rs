use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{Model, ModelKind};
use crate::{
    error::AppResult,
    orm::Orm,
    schema::{self, FieldDefinition, FieldType, ModelSchema},
};

/// Profile page owned by exactly one user; the user id is its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub user: i64,
    pub page_name: String,
    pub page_info: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPage {
    pub user: i64,
    pub page_name: String,
    pub page_info: String,
    pub date: NaiveDate,
}

impl NewPage {
    pub fn validate(&self) -> AppResult<()> {
        schema::validate_value::<Page>("page_name", &self.page_name)?;
        schema::validate_value::<Page>("page_info", &self.page_info)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageUpdate {
    pub page_name: Option<String>,
    pub page_info: Option<String>,
    pub date: Option<NaiveDate>,
}

impl PageUpdate {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.page_name {
            schema::validate_value::<Page>("page_name", name)?;
        }
        if let Some(info) = &self.page_info {
            schema::validate_value::<Page>("page_info", info)?;
        }
        Ok(())
    }

    pub fn apply(self, page: &mut Page) {
        if let Some(name) = self.page_name {
            page.page_name = name;
        }
        if let Some(info) = self.page_info {
            page.page_info = info;
        }
        if let Some(date) = self.date {
            page.date = date;
        }
    }
}

impl Page {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            user: row.get("user"),
            page_name: row.get("page_name"),
            page_info: row.get("page_info"),
            date: row.get("date"),
        }
    }
}

impl From<NewPage> for Page {
    fn from(new: NewPage) -> Self {
        Self {
            user: new.user,
            page_name: new.page_name,
            page_info: new.page_info,
            date: new.date,
        }
    }
}

impl ModelSchema for Page {
    fn table() -> &'static str {
        "pages"
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::one_to_one("user", "users", "id"),
            FieldDefinition::new("page_name", FieldType::String).max_length(100),
            FieldDefinition::new("page_info", FieldType::String).max_length(200),
            FieldDefinition::new("date", FieldType::Date),
        ]
    }
}

#[async_trait]
impl Model for Page {
    const KIND: ModelKind = ModelKind::Page;

    fn pk(&self) -> i64 {
        self.user
    }

    fn display_fields() -> Vec<String> {
        schema::field_names::<Self>()
    }

    async fn fetch_all(orm: &Orm) -> AppResult<Vec<Self>> {
        orm.list_pages().await
    }

    async fn fetch(orm: &Orm, pk: i64) -> AppResult<Option<Self>> {
        orm.find_page(pk).await
    }

    async fn remove(orm: &Orm, pk: i64) -> AppResult<bool> {
        orm.delete_page(pk).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn new_page(name: &str, info: &str) -> NewPage {
        NewPage {
            user: 1,
            page_name: name.to_string(),
            page_info: info.to_string(),
            date: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
        }
    }

    #[test]
    fn name_and_info_limits() {
        assert!(new_page(&"n".repeat(100), &"i".repeat(200)).validate().is_ok());
        assert!(matches!(
            new_page(&"n".repeat(101), "info").validate(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            new_page("name", &"i".repeat(201)).validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut page: Page = new_page("home", "about me").into();
        PageUpdate {
            page_info: Some("updated".to_string()),
            ..Default::default()
        }
        .apply(&mut page);
        assert_eq!(page.page_name, "home");
        assert_eq!(page.page_info, "updated");
    }
}
