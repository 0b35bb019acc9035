use chrono::Utc;
use sea_orm::{entity::prelude::*, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() {
        return Err(ModelError::Validation("name required".into()));
    }
    if name.chars().count() > 128 {
        return Err(ModelError::Validation("name too long (max 128)".into()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    if !email.contains('@') {
        return Err(ModelError::Validation("invalid email".into()));
    }
    if email.chars().count() > 255 {
        return Err(ModelError::Validation("email too long (max 255)".into()));
    }
    Ok(())
}

/// Insert a new user. The id and both timestamps are assigned here;
/// `created_at` never changes afterwards.
pub async fn create(db: &DatabaseConnection, name: &str, email: &str) -> Result<Model, ModelError> {
    validate_name(name)?;
    validate_email(email)?;
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    am.insert(db).await.map_err(ModelError::from_db_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rules() {
        assert!(validate_name("Bob").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(129)).is_err());
        assert!(validate_name(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("bob@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        let long = format!("{}@x.com", "a".repeat(250));
        assert!(validate_email(&long).is_err());
    }
}
