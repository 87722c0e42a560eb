use crate::{
    db::DbPool,
    entities::setting::{self, Entity as SettingEntity},
    errors::ServiceError,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_.]{0,63}$").expect("settings key pattern compiles"));

/// Key/value settings with built-in defaults for the keys the app relies on
#[derive(Clone)]
pub struct SettingsService {
    db_pool: Arc<DbPool>,
    defaults: Map<String, Value>,
}

impl SettingsService {
    pub fn new(db_pool: Arc<DbPool>, default_currency: &str) -> Self {
        let mut defaults = Map::new();
        defaults.insert("business_name".into(), json!("My Bakery"));
        defaults.insert("currency".into(), json!(default_currency));
        defaults.insert("tax_rate".into(), json!(0));
        defaults.insert("low_stock_alerts".into(), json!(true));
        Self { db_pool, defaults }
    }

    fn check_key(key: &str) -> Result<(), ServiceError> {
        if KEY_RE.is_match(key) {
            Ok(())
        } else {
            Err(ServiceError::ValidationError(format!(
                "Invalid setting key '{}'",
                key
            )))
        }
    }

    /// Every stored setting merged over the defaults
    pub async fn all(&self) -> Result<Map<String, Value>, ServiceError> {
        let mut merged = self.defaults.clone();
        let stored = SettingEntity::find()
            .order_by_asc(setting::Column::Key)
            .all(&*self.db_pool)
            .await?;
        for row in stored {
            merged.insert(row.key, row.value);
        }
        Ok(merged)
    }

    pub async fn get(&self, key: &str) -> Result<Value, ServiceError> {
        Self::check_key(key)?;
        if let Some(row) = SettingEntity::find_by_id(key.to_string())
            .one(&*self.db_pool)
            .await?
        {
            return Ok(row.value);
        }
        self.defaults
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Setting", key))
    }

    #[instrument(skip(self, value))]
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        updated_by: Option<Uuid>,
    ) -> Result<setting::Model, ServiceError> {
        Self::check_key(key)?;
        validate_known(key, &value)?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let saved = match SettingEntity::find_by_id(key.to_string()).one(db).await? {
            Some(existing) => {
                let mut active: setting::ActiveModel = existing.into();
                active.value = Set(value);
                active.updated_by = Set(updated_by);
                active.updated_at = Set(now);
                active.update(db).await?
            }
            None => {
                setting::ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value),
                    updated_by: Set(updated_by),
                    updated_at: Set(now),
                }
                .insert(db)
                .await?
            }
        };
        info!(key, "Setting saved");
        Ok(saved)
    }

    /// Removes a stored value; defaults come back into effect
    pub async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        Self::check_key(key)?;
        let result = SettingEntity::delete_by_id(key.to_string())
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Setting", key));
        }
        Ok(())
    }
}

/// Type checks for the keys other parts of the app read
fn validate_known(key: &str, value: &Value) -> Result<(), ServiceError> {
    let ok = match key {
        "business_name" | "currency" => value.as_str().map_or(false, |s| !s.trim().is_empty()),
        "tax_rate" => value
            .as_f64()
            .map_or(false, |rate| (0.0..=100.0).contains(&rate)),
        "low_stock_alerts" => value.is_boolean(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "Invalid value for setting '{}'",
            key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tax_rate", json!(5.5), true)]
    #[case("tax_rate", json!(150), false)]
    #[case("tax_rate", json!("5"), false)]
    #[case("currency", json!("INR"), true)]
    #[case("currency", json!(""), false)]
    #[case("low_stock_alerts", json!(false), true)]
    #[case("receipt.footer", json!({"line": "Thank you"}), true)]
    fn known_keys_are_typed(#[case] key: &str, #[case] value: Value, #[case] ok: bool) {
        assert_eq!(validate_known(key, &value).is_ok(), ok);
    }

    #[test]
    fn key_format() {
        assert!(SettingsService::check_key("business_name").is_ok());
        assert!(SettingsService::check_key("Business Name").is_err());
        assert!(SettingsService::check_key("").is_err());
    }
}
