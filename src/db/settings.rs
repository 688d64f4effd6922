//! Settings table access
//!
//! Read/write values in the `settings` key-value table. All settings are
//! global; values are stored as text and parsed on read.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Get a typed setting value, `None` when the key is absent
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((raw,)) => match raw.parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(Error::Config(format!(
                "setting '{}' holds an unparseable value",
                key
            ))),
        },
        None => Ok(None),
    }
}

/// Set a setting value, inserting or replacing
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a setting
pub async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::open_in_memory;

    #[tokio::test]
    async fn test_setting_round_trip() {
        let pool = open_in_memory().await.unwrap();

        assert_eq!(get_setting::<f64>(&pool, "volume").await.unwrap(), None);

        set_setting(&pool, "volume", 0.75).await.unwrap();
        assert_eq!(
            get_setting::<f64>(&pool, "volume").await.unwrap(),
            Some(0.75)
        );

        // Overwrite
        set_setting(&pool, "volume", 0.5).await.unwrap();
        assert_eq!(
            get_setting::<f64>(&pool, "volume").await.unwrap(),
            Some(0.5)
        );
    }

    #[tokio::test]
    async fn test_unparseable_value_is_an_error() {
        let pool = open_in_memory().await.unwrap();

        set_setting(&pool, "count", "not-a-number").await.unwrap();
        assert!(get_setting::<i64>(&pool, "count").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_setting() {
        let pool = open_in_memory().await.unwrap();

        set_setting(&pool, "k", "v").await.unwrap();
        delete_setting(&pool, "k").await.unwrap();
        assert_eq!(get_setting::<String>(&pool, "k").await.unwrap(), None);
    }
}
