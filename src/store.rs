use crate::catalog::{dedupe_by_id, normalize_favorites, UserData};
use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, Row, SqlitePool};
use std::{path::Path, str::FromStr};

/// SQLite-backed persistence for per-account marketplace data (favorites and
/// own listings), keyed by account email. The chat core never touches this;
/// it is the read-modify-write collaborator behind the listing surface.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new Store instance.
    /// This will automatically create the database file if it doesn't exist.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_items (
                account TEXT NOT NULL,
                item_id TEXT NOT NULL,
                record TEXT NOT NULL,
                PRIMARY KEY (account, item_id)
            );

            CREATE TABLE IF NOT EXISTS favorites (
                account TEXT NOT NULL,
                item_id TEXT NOT NULL,
                record TEXT NOT NULL,
                PRIMARY KEY (account, item_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    /// Persist an account's marketplace data, replacing whatever was stored
    /// before (the localStorage-style read-modify-write).
    pub async fn save_user_data(&self, account: &str, data: &UserData) -> Result<()> {
        let user_items = dedupe_by_id(&data.user_items);
        let favorites = normalize_favorites(&data.favorite_items);

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_items WHERE account = ?")
            .bind(account)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM favorites WHERE account = ?")
            .bind(account)
            .execute(&mut *tx)
            .await?;

        for item in &user_items {
            sqlx::query("INSERT INTO user_items (account, item_id, record) VALUES (?, ?, ?)")
                .bind(account)
                .bind(&item.id)
                .bind(serde_json::to_string(item)?)
                .execute(&mut *tx)
                .await?;
        }
        for item in &favorites {
            sqlx::query("INSERT INTO favorites (account, item_id, record) VALUES (?, ?, ?)")
                .bind(account)
                .bind(&item.id)
                .bind(serde_json::to_string(item)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await.context("Failed to save user data")?;
        Ok(())
    }

    /// Load an account's marketplace data. Unknown accounts get empty data.
    pub async fn load_user_data(&self, account: &str) -> Result<UserData> {
        let user_items = self.load_items("user_items", account).await?;
        let favorite_items = self.load_items("favorites", account).await?;

        Ok(UserData {
            favorite_items: normalize_favorites(&favorite_items),
            user_items: dedupe_by_id(&user_items),
        })
    }

    async fn load_items(&self, table: &str, account: &str) -> Result<Vec<crate::catalog::Item>> {
        // Table names are fixed strings above, not user input.
        let rows = sqlx::query(&format!(
            "SELECT record FROM {table} WHERE account = ? ORDER BY rowid"
        ))
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch stored items")?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let record: String = row.try_get("record")?;
            match serde_json::from_str(&record) {
                Ok(item) => items.push(item),
                // A corrupt row should not take the whole account down.
                Err(err) => tracing::warn!("skipping undecodable stored item: {err}"),
            }
        }
        Ok(items)
    }
}
