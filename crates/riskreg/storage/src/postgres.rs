//! PostgreSQL adapter for register storage.
//!
//! Rows (with embedded controls), hub controls, links and pending changes
//! are stored as JSONB documents next to the columns used for lookups.
//! Multi-record writes run in one transaction with `SELECT ... FOR UPDATE`
//! on the records they modify.

use async_trait::async_trait;
use riskreg_types::{
    ChangeSet, Control, ControlId, ControlLink, ControlPlacement, LinkId, PendingChange,
    PendingChangeId, PendingStatus, Resolution, Row, RowId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row as _;
use tracing::debug;

use crate::filter::{LinkFilter, PendingFilter, QueryWindow, RowFilter};
use crate::traits::{
    AppliedChange, EntityStore, LocatedControl, PendingChangeStore, RegisterStore,
};
use crate::{StorageError, StorageResult};

/// PostgreSQL-backed register storage.
#[derive(Clone)]
pub struct PostgresRegisterStore {
    pool: PgPool,
}

/// Where a locked control was found.
enum ControlHome {
    Row(Row),
    Hub,
}

impl PostgresRegisterStore {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS riskreg_rows (
                id TEXT PRIMARY KEY,
                position BIGSERIAL,
                risk_id TEXT NOT NULL,
                process_id TEXT NOT NULL,
                doc JSONB NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS riskreg_hub_controls (
                id TEXT PRIMARY KEY,
                position BIGSERIAL,
                doc JSONB NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS riskreg_links (
                id TEXT PRIMARY KEY,
                position BIGSERIAL,
                row_id TEXT NOT NULL,
                control_id TEXT NOT NULL,
                doc JSONB NOT NULL,
                UNIQUE (row_id, control_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS riskreg_pending_changes (
                id TEXT PRIMARY KEY,
                seq BIGSERIAL,
                entity_id TEXT NOT NULL,
                status TEXT NOT NULL,
                submitted_by TEXT NOT NULL,
                submitted_at TIMESTAMPTZ NOT NULL,
                doc JSONB NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS riskreg_rows_controls_idx ON riskreg_rows USING GIN ((doc->'controls') jsonb_path_ops)",
            "CREATE INDEX IF NOT EXISTS riskreg_pending_status_idx ON riskreg_pending_changes (status, submitted_at DESC)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn begin(&self) -> StorageResult<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool.begin().await.map_err(backend)
    }
}

#[async_trait]
impl EntityStore for PostgresRegisterStore {
    async fn get_row(&self, id: &RowId) -> StorageResult<Option<Row>> {
        let row = sqlx::query("SELECT doc FROM riskreg_rows WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| doc_from_row(&r)).transpose()
    }

    async fn list_rows(&self, filter: &RowFilter) -> StorageResult<Vec<Row>> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM riskreg_rows
             WHERE ($1::TEXT IS NULL OR risk_id = $1)
               AND ($2::TEXT IS NULL OR process_id = $2)
             ORDER BY position
            "#,
        )
        .bind(filter.risk_id.as_ref().map(|r| r.0.clone()))
        .bind(filter.process_id.as_ref().map(|p| p.0.clone()))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let row: Row = doc_from_row(&r)?;
            if filter.matches(&row) {
                out.push(row);
            }
        }
        Ok(out)
    }

    async fn put_row(&self, row: Row) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        for (index, control) in row.controls.iter().enumerate() {
            if row.controls[..index].iter().any(|c| c.id == control.id) {
                return Err(StorageError::ControlExists(control.id.clone()));
            }
            let owned_elsewhere = match find_control(&mut tx, &control.id, false).await? {
                Some((_, ControlHome::Row(owner))) => owner.id != row.id,
                Some((_, ControlHome::Hub)) => true,
                None => false,
            };
            if owned_elsewhere {
                return Err(StorageError::ControlExists(control.id.clone()));
            }
        }
        upsert_row(&mut tx, &row).await?;
        tx.commit().await.map_err(backend)
    }

    async fn replace_rows(&self, rows: Vec<Row>) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM riskreg_rows")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        for row in &rows {
            upsert_row(&mut tx, row).await?;
        }
        let dropped = sqlx::query(
            "DELETE FROM riskreg_links WHERE row_id NOT IN (SELECT id FROM riskreg_rows)",
        )
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected();
        tx.commit().await.map_err(backend)?;
        debug!(rows = rows.len(), dropped_links = dropped, "Replaced register rows");
        Ok(())
    }

    async fn get_control(&self, id: &ControlId) -> StorageResult<Option<LocatedControl>> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        Ok(find_control(&mut conn, id, false)
            .await?
            .map(|(control, home)| LocatedControl {
                control,
                placement: match home {
                    ControlHome::Row(row) => ControlPlacement::Embedded { row_id: row.id },
                    ControlHome::Hub => ControlPlacement::Hub,
                },
            }))
    }

    async fn list_hub_controls(&self) -> StorageResult<Vec<Control>> {
        let rows = sqlx::query("SELECT doc FROM riskreg_hub_controls ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(doc_from_row).collect()
    }

    async fn insert_control(
        &self,
        control: Control,
        placement: ControlPlacement,
    ) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        if find_control(&mut tx, &control.id, false).await?.is_some() {
            return Err(StorageError::ControlExists(control.id));
        }
        match placement {
            ControlPlacement::Embedded { row_id } => {
                let r = sqlx::query("SELECT doc FROM riskreg_rows WHERE id = $1 FOR UPDATE")
                    .bind(row_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(backend)?
                    .ok_or_else(|| StorageError::not_found("row", &row_id))?;
                let mut row: Row = doc_from_row(&r)?;
                row.controls.push(control);
                upsert_row(&mut tx, &row).await?;
            }
            ControlPlacement::Hub => {
                sqlx::query("INSERT INTO riskreg_hub_controls (id, doc) VALUES ($1, $2)")
                    .bind(control.id.as_str())
                    .bind(to_json(&control)?)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| match violated_constraint(&e) {
                        Some(_) => StorageError::ControlExists(control.id.clone()),
                        None => backend(e),
                    })?;
            }
        }
        tx.commit().await.map_err(backend)
    }

    async fn get_link(&self, id: &LinkId) -> StorageResult<Option<ControlLink>> {
        let row = sqlx::query("SELECT doc FROM riskreg_links WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| doc_from_row(&r)).transpose()
    }

    async fn list_links(&self, filter: &LinkFilter) -> StorageResult<Vec<ControlLink>> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM riskreg_links
             WHERE ($1::TEXT IS NULL OR row_id = $1)
               AND ($2::TEXT IS NULL OR control_id = $2)
             ORDER BY position
            "#,
        )
        .bind(filter.row_id.as_ref().map(|r| r.0.clone()))
        .bind(filter.control_id.as_ref().map(|c| c.0.clone()))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(doc_from_row).collect()
    }

    async fn insert_link(&self, link: ControlLink) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO riskreg_links (id, row_id, control_id, doc) VALUES ($1, $2, $3, $4)",
        )
        .bind(link.id.as_str())
        .bind(link.row_id.as_str())
        .bind(link.control_id.as_str())
        .bind(to_json(&link)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some(name) if name.ends_with("row_id_control_id_key") => StorageError::DuplicateLink {
                row_id: link.row_id.clone(),
                control_id: link.control_id.clone(),
            },
            Some(_) => StorageError::already_exists("link", &link.id),
            None => backend(e),
        })?;
        Ok(())
    }

    async fn delete_link(&self, id: &LinkId) -> StorageResult<ControlLink> {
        let row = sqlx::query("DELETE FROM riskreg_links WHERE id = $1 RETURNING doc")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| StorageError::not_found("link", id))?;
        doc_from_row(&row)
    }

    async fn apply_change_set(
        &self,
        control_id: &ControlId,
        change: &ChangeSet,
    ) -> StorageResult<AppliedChange> {
        let mut tx = self.begin().await?;
        let applied = apply_change_set_in(&mut tx, control_id, change).await?;
        tx.commit().await.map_err(backend)?;
        Ok(applied)
    }
}

#[async_trait]
impl PendingChangeStore for PostgresRegisterStore {
    async fn insert_pending(&self, change: PendingChange) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO riskreg_pending_changes
                (id, entity_id, status, submitted_by, submitted_at, doc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(change.id.as_str())
        .bind(change.entity_id.as_str())
        .bind(change.status.as_str())
        .bind(change.submitted_by.user_id.as_str())
        .bind(change.submitted_at)
        .bind(to_json(&change)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some(_) => StorageError::already_exists("pending change", &change.id),
            None => backend(e),
        })?;
        Ok(())
    }

    async fn get_pending(&self, id: &PendingChangeId) -> StorageResult<Option<PendingChange>> {
        let row = sqlx::query("SELECT doc FROM riskreg_pending_changes WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| doc_from_row(&r)).transpose()
    }

    async fn list_pending(
        &self,
        filter: &PendingFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<PendingChange>> {
        let limit = if window.limit == 0 {
            None
        } else {
            Some(to_i64(window.limit)?)
        };
        let rows = sqlx::query(
            r#"
            SELECT doc FROM riskreg_pending_changes
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::TEXT IS NULL OR entity_id = $2)
               AND ($3::TEXT IS NULL OR submitted_by = $3)
             ORDER BY submitted_at DESC, seq DESC
             LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.entity_id.as_ref().map(|e| e.0.clone()))
        .bind(filter.submitted_by.as_ref().map(|u| u.0.clone()))
        .bind(limit)
        .bind(to_i64(window.offset)?)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(doc_from_row).collect()
    }

    async fn resolve_pending(
        &self,
        id: &PendingChangeId,
        resolution: Resolution,
    ) -> StorageResult<PendingChange> {
        let mut tx = self.begin().await?;
        let mut change = lock_open_pending(&mut tx, id).await?;
        change.resolve(resolution);
        store_pending(&mut tx, &change).await?;
        tx.commit().await.map_err(backend)?;
        Ok(change)
    }
}

#[async_trait]
impl RegisterStore for PostgresRegisterStore {
    async fn approve_pending(
        &self,
        id: &PendingChangeId,
        resolution: Resolution,
    ) -> StorageResult<(PendingChange, AppliedChange)> {
        let mut tx = self.begin().await?;
        let mut change = lock_open_pending(&mut tx, id).await?;
        let applied = apply_change_set_in(&mut tx, &change.entity_id, &change.proposed_values).await?;
        change.resolve(resolution);
        store_pending(&mut tx, &change).await?;
        tx.commit().await.map_err(backend)?;
        Ok((change, applied))
    }
}

// ── Transaction helpers ─────────────────────────────────────────────────

async fn find_control(
    conn: &mut PgConnection,
    id: &ControlId,
    for_update: bool,
) -> StorageResult<Option<(Control, ControlHome)>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };

    let row_query = format!(
        "SELECT doc FROM riskreg_rows WHERE doc->'controls' @> $1::jsonb{lock}"
    );
    let contains = serde_json::json!([{ "id": id.as_str() }]);
    if let Some(r) = sqlx::query(&row_query)
        .bind(contains)
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
    {
        let row: Row = doc_from_row(&r)?;
        let control = row.find_control(id).cloned().ok_or_else(|| {
            StorageError::Inconsistent(format!("row {} matched control {id} but lacks it", row.id))
        })?;
        return Ok(Some((control, ControlHome::Row(row))));
    }

    let hub_query = format!("SELECT doc FROM riskreg_hub_controls WHERE id = $1{lock}");
    let hub = sqlx::query(&hub_query)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?;
    hub.map(|r| doc_from_row(&r).map(|c| (c, ControlHome::Hub)))
        .transpose()
}

async fn store_control(
    conn: &mut PgConnection,
    control: &Control,
    home: ControlHome,
) -> StorageResult<()> {
    match home {
        ControlHome::Row(mut row) => {
            let slot = row.find_control_mut(&control.id).ok_or_else(|| {
                StorageError::Inconsistent(format!(
                    "control {} vanished from row {}",
                    control.id, row.id
                ))
            })?;
            *slot = control.clone();
            upsert_row(conn, &row).await
        }
        ControlHome::Hub => {
            sqlx::query("UPDATE riskreg_hub_controls SET doc = $1 WHERE id = $2")
                .bind(to_json(control)?)
                .bind(control.id.as_str())
                .execute(&mut *conn)
                .await
                .map_err(backend)?;
            Ok(())
        }
    }
}

async fn upsert_row(conn: &mut PgConnection, row: &Row) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO riskreg_rows (id, risk_id, process_id, doc)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
           SET risk_id = EXCLUDED.risk_id,
               process_id = EXCLUDED.process_id,
               doc = EXCLUDED.doc
        "#,
    )
    .bind(row.id.as_str())
    .bind(row.risk_id.as_str())
    .bind(row.process_id.as_str())
    .bind(to_json(row)?)
    .execute(&mut *conn)
    .await
    .map_err(backend)?;
    Ok(())
}

async fn lock_link(conn: &mut PgConnection, id: &LinkId) -> StorageResult<ControlLink> {
    let row = sqlx::query("SELECT doc FROM riskreg_links WHERE id = $1 FOR UPDATE")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or_else(|| StorageError::not_found("link", id))?;
    doc_from_row(&row)
}

async fn store_link(conn: &mut PgConnection, link: &ControlLink) -> StorageResult<()> {
    sqlx::query("UPDATE riskreg_links SET doc = $1 WHERE id = $2")
        .bind(to_json(link)?)
        .bind(link.id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(backend)?;
    Ok(())
}

async fn apply_change_set_in(
    conn: &mut PgConnection,
    control_id: &ControlId,
    change: &ChangeSet,
) -> StorageResult<AppliedChange> {
    let (mut control, home) = find_control(conn, control_id, true)
        .await?
        .ok_or_else(|| StorageError::not_found("control", control_id))?;

    let link = match &change.link {
        Some(link_change) => {
            let mut link = lock_link(conn, &link_change.link_id).await?;
            if link.control_id != *control_id {
                return Err(StorageError::ForeignLink {
                    link_id: link.id,
                    owner: link.control_id,
                    control_id: control_id.clone(),
                });
            }
            link_change.apply(&mut link);
            store_link(conn, &link).await?;
            Some(link)
        }
        None => None,
    };

    change.apply_to_control(&mut control);
    store_control(conn, &control, home).await?;
    Ok(AppliedChange { control, link })
}

async fn lock_open_pending(
    conn: &mut PgConnection,
    id: &PendingChangeId,
) -> StorageResult<PendingChange> {
    let row = sqlx::query("SELECT doc FROM riskreg_pending_changes WHERE id = $1 FOR UPDATE")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or_else(|| StorageError::not_found("pending change", id))?;
    let change: PendingChange = doc_from_row(&row)?;
    if change.status != PendingStatus::Pending {
        return Err(StorageError::AlreadyResolved {
            id: id.clone(),
            status: change.status,
        });
    }
    Ok(change)
}

async fn store_pending(conn: &mut PgConnection, change: &PendingChange) -> StorageResult<()> {
    sqlx::query("UPDATE riskreg_pending_changes SET status = $1, doc = $2 WHERE id = $3")
        .bind(change.status.as_str())
        .bind(to_json(change)?)
        .bind(change.id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(backend)?;
    Ok(())
}

// ── Codec helpers ───────────────────────────────────────────────────────

fn doc_from_row<T: DeserializeOwned>(row: &PgRow) -> StorageResult<T> {
    let doc: serde_json::Value = row.try_get("doc").map_err(backend)?;
    Ok(serde_json::from_value(doc)?)
}

fn to_json<T: Serialize>(value: &T) -> StorageResult<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Name of the unique constraint `err` violated, if it is a unique violation.
fn violated_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::WindowOutOfRange(value))
}
