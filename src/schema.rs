// Model schemas - declarative field metadata shared by storage, validation and admin

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Schema definition implemented by every stored model
pub trait ModelSchema: Send + Sync {
    /// Storage table backing the model
    fn table() -> &'static str
    where
        Self: Sized;

    /// Columns in declaration order
    fn fields() -> Vec<FieldDefinition>
    where
        Self: Sized;
}

/// Column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<FieldDefault>,
    pub validators: Vec<FieldValidator>,
    pub relation: Option<Relation>,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            validators: Vec::new(),
            relation: None,
        }
    }

    /// Auto-incrementing integer primary key
    pub fn auto_id(name: &str) -> Self {
        let mut field = Self::new(name, FieldType::Int64).primary_key();
        field.auto_increment = true;
        field
    }

    /// One-to-one reference that doubles as this table's primary key
    pub fn one_to_one(name: &str, target_table: &str, target_column: &str) -> Self {
        Self::new(name, FieldType::Int64)
            .primary_key()
            .references(Relation {
                target_table: target_table.to_string(),
                target_column: target_column.to_string(),
                on_delete: OnDelete::Cascade,
                parent_link: false,
            })
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn max_length(self, len: usize) -> Self {
        self.validate(FieldValidator::MaxLength(len))
    }

    pub fn validate(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn references(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Mark the relation as the link to a parent model this one extends
    pub fn parent_link(mut self) -> Self {
        if let Some(relation) = &mut self.relation {
            relation.parent_link = true;
        }
        self
    }

    fn column_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.field_type.sql_type());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.auto_increment {
                sql.push_str(" AUTOINCREMENT");
            }
        } else {
            sql.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {}", default.sql_literal()));
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Int64,
    String,
    Bool,
    Date,
}

impl FieldType {
    fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Int64 | FieldType::Bool => "INTEGER",
            FieldType::String | FieldType::Date => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldDefault {
    Int64(i64),
    Bool(bool),
}

impl FieldDefault {
    fn sql_literal(&self) -> String {
        match self {
            FieldDefault::Int64(v) => v.to_string(),
            FieldDefault::Bool(v) => (*v as i64).to_string(),
        }
    }
}

/// Length checks count characters, not bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValidator {
    MinLength(usize),
    MaxLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnDelete {
    Cascade,
}

impl OnDelete {
    fn sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub target_table: String,
    pub target_column: String,
    pub on_delete: OnDelete,
    pub parent_link: bool,
}

/// Build `CREATE TABLE IF NOT EXISTS` DDL for a model
pub fn create_table_sql<S: ModelSchema>() -> String {
    let fields = S::fields();
    let mut parts: Vec<String> = fields.iter().map(FieldDefinition::column_sql).collect();
    for field in &fields {
        if let Some(relation) = &field.relation {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
                field.name,
                relation.target_table,
                relation.target_column,
                relation.on_delete.sql()
            ));
        }
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        S::table(),
        parts.join(",\n    ")
    )
}

pub fn field_names<S: ModelSchema>() -> Vec<String> {
    S::fields().into_iter().map(|f| f.name).collect()
}

/// Parent model table, if this model extends another through a parent link
pub fn parent_table<S: ModelSchema>() -> Option<String> {
    S::fields()
        .into_iter()
        .filter_map(|f| f.relation)
        .find(|r| r.parent_link)
        .map(|r| r.target_table)
}

/// Own columns followed by the parent's, when `S` extends `P` through a
/// parent link
pub fn inherited_field_names<S: ModelSchema, P: ModelSchema>() -> Vec<String> {
    let mut names = field_names::<S>();
    if parent_table::<S>().as_deref() == Some(P::table()) {
        names.extend(field_names::<P>());
    }
    names
}

/// Run a field's validators against a text value
pub fn validate_value<S: ModelSchema>(field: &str, value: &str) -> AppResult<()> {
    let definition = S::fields()
        .into_iter()
        .find(|f| f.name == field)
        .ok_or_else(|| {
            AppError::Internal(format!("{} has no field named {}", S::table(), field))
        })?;

    let len = value.chars().count();
    for validator in &definition.validators {
        match validator {
            FieldValidator::MaxLength(max) if len > *max => {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters (got {})",
                    field, max, len
                )));
            }
            FieldValidator::MinLength(min) if len < *min => {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters (got {})",
                    field, min, len
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Profile;

    impl ModelSchema for Profile {
        fn table() -> &'static str {
            "profiles"
        }

        fn fields() -> Vec<FieldDefinition> {
            vec![
                FieldDefinition::one_to_one("account", "accounts", "id"),
                FieldDefinition::new("handle", FieldType::String)
                    .validate(FieldValidator::MinLength(2))
                    .max_length(5),
                FieldDefinition::new("score", FieldType::Int64).default_value(FieldDefault::Int64(0)),
            ]
        }
    }

    struct Featured;

    impl ModelSchema for Featured {
        fn table() -> &'static str {
            "featured"
        }

        fn fields() -> Vec<FieldDefinition> {
            vec![FieldDefinition::one_to_one("profile_ptr", "profiles", "account").parent_link()]
        }
    }

    #[test]
    fn ddl_declares_keys_and_cascade() {
        let sql = create_table_sql::<Profile>();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS profiles"));
        assert!(sql.contains("account INTEGER PRIMARY KEY"));
        assert!(sql.contains("handle TEXT NOT NULL"));
        assert!(sql.contains("score INTEGER NOT NULL DEFAULT 0"));
        assert!(sql.contains("FOREIGN KEY (account) REFERENCES accounts(id) ON DELETE CASCADE"));
    }

    #[test]
    fn length_validators_count_characters() {
        assert!(validate_value::<Profile>("handle", "héllo").is_ok());
        match validate_value::<Profile>("handle", "toolong") {
            Err(AppError::Validation(msg)) => assert!(msg.contains("handle")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(matches!(
            validate_value::<Profile>("handle", "x"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn unknown_field_is_internal_error() {
        assert!(matches!(
            validate_value::<Profile>("nickname", "x"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn parent_link_is_discoverable() {
        assert_eq!(parent_table::<Featured>().as_deref(), Some("profiles"));
        assert_eq!(parent_table::<Profile>(), None);
    }

    #[test]
    fn inherited_names_follow_the_parent_link_only() {
        assert_eq!(
            inherited_field_names::<Featured, Profile>(),
            vec!["profile_ptr", "account", "handle", "score"]
        );
        // No parent link from Profile to Featured
        assert_eq!(inherited_field_names::<Profile, Featured>(), field_names::<Profile>());
    }
}
