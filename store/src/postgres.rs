use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::Result;
use crate::traits::{Blob, BlobStore, RecordStore};

/// Postgres-backed store. Records and blobs live in two plain tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    /// Connect and apply the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::from_pool(db).await
    }

    pub async fn from_pool(db: PgPool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&db).await?;
        Ok(Self { db })
    }
}

impl RecordStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert(&self, key: &str, value: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"INSERT INTO records (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(r#"SELECT value FROM records WHERE key = $1"#)
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM records WHERE key = $1"#)
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT key FROM records
            WHERE starts_with(key, $1)
            ORDER BY key COLLATE "C"
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.db)
        .await?;
        Ok(keys)
    }
}

impl BlobStore for PgStore {
    async fn put_blob(&self, key: &str, blob: Blob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO blobs (key, data, content_type, filename) VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE SET
                data = EXCLUDED.data,
                content_type = EXCLUDED.content_type,
                filename = EXCLUDED.filename
            "#,
        )
        .bind(key)
        .bind(blob.data)
        .bind(blob.content_type)
        .bind(blob.filename)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> Result<Option<Blob>> {
        let row = sqlx::query_as::<_, (Vec<u8>, String, String)>(
            r#"SELECT data, content_type, filename FROM blobs WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(data, content_type, filename)| Blob {
            data,
            content_type,
            filename,
        }))
    }

    async fn delete_blob(&self, key: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM blobs WHERE key = $1"#)
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
