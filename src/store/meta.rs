//! `_meta` key/value rows

use super::Store;
use crate::error::Result;

const FINGERPRINT_KEY: &str = "data_fingerprint";
const LOAD_GENERATION_KEY: &str = "load_generation";

impl Store {
    pub async fn meta_value(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM _meta WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.and_then(|(value,)| value))
    }

    pub async fn set_meta_value(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_writable("set_meta_value")?;
        sqlx::query(
            r#"
            INSERT INTO _meta (key, value) VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fingerprint of the data the current unified view was built from
    pub async fn stored_fingerprint(&self) -> Result<Option<String>> {
        self.meta_value(FINGERPRINT_KEY).await
    }

    pub async fn set_fingerprint(&self, fingerprint: &str) -> Result<()> {
        self.set_meta_value(FINGERPRINT_KEY, fingerprint).await
    }

    /// Number of source-table replacements so far, 0 before the first load
    pub async fn load_generation(&self) -> Result<i64> {
        Ok(self
            .meta_value(LOAD_GENERATION_KEY)
            .await?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0))
    }

    pub(crate) async fn bump_load_generation(&self) -> Result<()> {
        self.ensure_writable("bump_load_generation")?;
        sqlx::query(
            r#"
            INSERT INTO _meta (key, value) VALUES (?, '1')
            ON CONFLICT (key) DO UPDATE SET value = CAST(CAST(_meta.value AS INTEGER) + 1 AS TEXT)
            "#,
        )
        .bind(LOAD_GENERATION_KEY)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::Store;

    #[tokio::test]
    async fn test_fingerprint_upsert() {
        let store = Store::in_memory().await.unwrap();
        assert_eq!(store.stored_fingerprint().await.unwrap(), None);

        store.set_fingerprint("abc").await.unwrap();
        store.set_fingerprint("def").await.unwrap();
        assert_eq!(
            store.stored_fingerprint().await.unwrap().as_deref(),
            Some("def")
        );
    }

    #[tokio::test]
    async fn test_load_generation_counts_up() {
        let store = Store::in_memory().await.unwrap();
        assert_eq!(store.load_generation().await.unwrap(), 0);

        store.bump_load_generation().await.unwrap();
        store.bump_load_generation().await.unwrap();
        assert_eq!(store.load_generation().await.unwrap(), 2);
    }
}
