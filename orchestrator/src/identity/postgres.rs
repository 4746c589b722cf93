// Durable identity store backed by the identity_map table

use super::{IdentityEntry, IdentityStore};
use crate::db::DbPool;
use crate::errors::{DatabaseError, IdentityError};
use crate::models::{EntityKind, NativeKey};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Identity store persisting mappings in PostgreSQL
///
/// Uniqueness in both directions is enforced by the table itself: the primary key on
/// `opaque_id` and the `(native_name, native_group, kind)` constraint. A concurrent
/// duplicate `put` therefore surfaces as a unique violation and maps to
/// `IdentityError::DuplicateKey`.
pub struct PostgresIdentityStore {
    pool: DbPool,
}

impl PostgresIdentityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(self.pool.pool()).await?;
        info!("Identity map migrations applied");
        Ok(())
    }

    fn entry_from_row(row: &PgRow) -> Result<IdentityEntry, IdentityError> {
        let kind: String = row.try_get("kind")?;
        Ok(IdentityEntry {
            id: row.try_get("opaque_id")?,
            kind: kind.parse().map_err(IdentityError::Storage)?,
            key: NativeKey::new(
                row.try_get::<String, _>("native_name")?,
                row.try_get::<String, _>("native_group")?,
            ),
        })
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn put(&self, kind: EntityKind, key: &NativeKey) -> Result<Uuid, IdentityError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO identity_map (opaque_id, kind, native_name, native_group)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(&key.name)
        .bind(&key.group)
        .execute(self.pool.pool())
        .await
        .map_err(|e| match IdentityError::from(e) {
            IdentityError::DuplicateKey(_) => {
                IdentityError::DuplicateKey(format!("{} {}", kind, key))
            }
            other => other,
        })?;

        debug!(opaque_id = %id, "Identity mapping stored");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn resolve(&self, id: Uuid) -> Result<IdentityEntry, IdentityError> {
        let row = sqlx::query(
            r#"
            SELECT opaque_id, kind, native_name, native_group
            FROM identity_map
            WHERE opaque_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?
        .ok_or_else(|| IdentityError::NotFound(id.to_string()))?;

        Self::entry_from_row(&row)
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn reverse_resolve(
        &self,
        key: &NativeKey,
        kind: EntityKind,
    ) -> Result<Uuid, IdentityError> {
        let row = sqlx::query(
            r#"
            SELECT opaque_id
            FROM identity_map
            WHERE native_name = $1 AND native_group = $2 AND kind = $3
            "#,
        )
        .bind(&key.name)
        .bind(&key.group)
        .bind(kind.as_str())
        .fetch_optional(self.pool.pool())
        .await?
        .ok_or_else(|| IdentityError::NotFound(format!("{} {}", kind, key)))?;

        Ok(row.try_get("opaque_id")?)
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: Uuid) -> Result<(), IdentityError> {
        let result = sqlx::query("DELETE FROM identity_map WHERE opaque_id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() > 0 {
            debug!(opaque_id = %id, "Identity mapping removed");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn entries(&self, kind: EntityKind) -> Result<Vec<IdentityEntry>, IdentityError> {
        let rows = sqlx::query(
            r#"
            SELECT opaque_id, kind, native_name, native_group
            FROM identity_map
            WHERE kind = $1
            ORDER BY native_group, native_name
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::entry_from_row).collect()
    }
}
