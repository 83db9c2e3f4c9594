use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{Model, ModelKind};
use crate::{
    error::AppResult,
    orm::Orm,
    schema::{self, FieldDefault, FieldDefinition, FieldType, FieldValidator, ModelSchema},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            is_staff: false,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        schema::validate_value::<User>("username", &self.username)?;
        schema::validate_value::<User>("password", &self.password)
    }
}

impl User {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            username: row.get("username"),
            password: row.get("password"),
            is_staff: row.get("is_staff"),
        }
    }
}

impl ModelSchema for User {
    fn table() -> &'static str {
        "users"
    }

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::auto_id("id"),
            FieldDefinition::new("username", FieldType::String)
                .unique()
                .validate(FieldValidator::MinLength(1))
                .max_length(100),
            FieldDefinition::new("password", FieldType::String).max_length(50),
            FieldDefinition::new("is_staff", FieldType::Bool)
                .default_value(FieldDefault::Bool(false)),
        ]
    }
}

#[async_trait]
impl Model for User {
    const KIND: ModelKind = ModelKind::User;

    fn pk(&self) -> i64 {
        self.id
    }

    fn display_fields() -> Vec<String> {
        schema::field_names::<Self>()
            .into_iter()
            .filter(|name| name != "password")
            .collect()
    }

    async fn fetch_all(orm: &Orm) -> AppResult<Vec<Self>> {
        orm.list_users().await
    }

    async fn fetch(orm: &Orm, pk: i64) -> AppResult<Option<Self>> {
        orm.find_user(pk).await
    }

    async fn remove(orm: &Orm, pk: i64) -> AppResult<bool> {
        orm.delete_user(pk).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn password_is_never_serialized() {
        let user = User {
            id: 1,
            username: "ada".to_string(),
            password: "secret".to_string(),
            is_staff: false,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert!(!User::display_fields().contains(&"password".to_string()));
    }

    #[test]
    fn long_password_is_rejected() {
        let user = NewUser::new("ada", "p".repeat(51));
        assert!(matches!(user.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn empty_username_is_rejected() {
        assert!(matches!(NewUser::new("", "pw").validate(), Err(AppError::Validation(_))));
    }
}
