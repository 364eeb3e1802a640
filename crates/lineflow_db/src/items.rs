//! Item operations.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::{parse_detail, parse_motive, parse_phase, LineflowDb};
use lineflow_lifecycle::Phase;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

// ============================================================================
// Transaction-scoped operations
// ============================================================================

/// Live (non-deleted) item by serial.
pub async fn find_by_serial(conn: &mut SqliteConnection, serial: &str) -> Result<Option<Item>> {
    let row = sqlx::query("SELECT * FROM items WHERE serial = ? AND deleted_at IS NULL")
        .bind(serial)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_item).transpose()
}

/// Insert a new item in REGISTRO. A live item with the same serial is a
/// `Constraint` error.
pub async fn insert(conn: &mut SqliteConnection, item: &NewItem) -> Result<Item> {
    let now = LineflowDb::now_millis();
    let result = sqlx::query(
        r#"
        INSERT INTO items (
            serial, sku, material_code, batch_tag, phase, state_id, lot_id,
            responsible_id, received_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.serial)
    .bind(&item.sku)
    .bind(&item.material_code)
    .bind(&item.batch_tag)
    .bind(Phase::Registro.as_str())
    .bind(item.state_id)
    .bind(item.lot_id)
    .bind(&item.responsible_id)
    .bind(item.received_at.timestamp_millis())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from_write(e, &item.serial))?;

    let row = sqlx::query("SELECT * FROM items WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&mut *conn)
        .await?;
    row_to_item(&row)
}

/// Apply an approved transition, but only if the item is still in
/// `change.expected`. Zero matching rows is a `Conflict`.
pub async fn apply_phase_change(
    conn: &mut SqliteConnection,
    item_id: i64,
    change: &PhaseChange<'_>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE items SET
            phase = ?,
            state_id = ?,
            responsible_id = ?,
            scrap_motive = ?,
            scrap_detail = ?,
            outbound_lot_id = COALESCE(?, outbound_lot_id),
            updated_at = ?
        WHERE id = ? AND phase = ? AND deleted_at IS NULL
        "#,
    )
    .bind(change.to.as_str())
    .bind(change.state_id)
    .bind(change.responsible_id)
    .bind(change.scrap_motive.map(|m| m.as_str()))
    .bind(change.scrap_detail.map(|d| d.as_str()))
    .bind(change.outbound_lot_id)
    .bind(LineflowDb::now_millis())
    .bind(item_id)
    .bind(change.expected.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "item {item_id} is no longer in {}",
            change.expected
        )));
    }
    Ok(())
}

/// Tombstone every live item of a lot. Returns the number tombstoned.
pub async fn soft_delete_by_lot(conn: &mut SqliteConnection, lot_id: i64) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE items SET deleted_at = ?, updated_at = ? WHERE lot_id = ? AND deleted_at IS NULL",
    )
    .bind(LineflowDb::now_millis())
    .bind(LineflowDb::now_millis())
    .bind(lot_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Detach items whose outbound lot is `lot_id`.
pub async fn clear_outbound_lot(conn: &mut SqliteConnection, lot_id: i64) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE items SET outbound_lot_id = NULL, updated_at = ? WHERE outbound_lot_id = ?",
    )
    .bind(LineflowDb::now_millis())
    .bind(lot_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) fn row_to_item(row: &SqliteRow) -> Result<Item> {
    let phase: String = row.get("phase");
    let deleted_at: Option<i64> = row.get("deleted_at");
    Ok(Item {
        id: row.get("id"),
        serial: row.get("serial"),
        sku: row.get("sku"),
        material_code: row.get("material_code"),
        batch_tag: row.get("batch_tag"),
        phase: parse_phase(&phase)?,
        state_id: row.get("state_id"),
        lot_id: row.get("lot_id"),
        responsible_id: row.get("responsible_id"),
        scrap_motive: parse_motive(row.get("scrap_motive"))?,
        scrap_detail: parse_detail(row.get("scrap_detail"))?,
        outbound_lot_id: row.get("outbound_lot_id"),
        received_at: LineflowDb::millis_to_datetime(row.get("received_at")),
        created_at: LineflowDb::millis_to_datetime(row.get("created_at")),
        updated_at: LineflowDb::millis_to_datetime(row.get("updated_at")),
        deleted_at: deleted_at.map(LineflowDb::millis_to_datetime),
    })
}

// ============================================================================
// Pool-level queries
// ============================================================================

impl LineflowDb {
    /// Live item by serial.
    pub async fn item_by_serial(&self, serial: &str) -> Result<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        find_by_serial(&mut conn, serial).await
    }

    /// List items, oldest first.
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        let mut sql = String::from(
            "SELECT items.* FROM items LEFT JOIN lots ON lots.id = items.lot_id WHERE 1=1",
        );
        if !filter.include_deleted {
            sql.push_str(" AND items.deleted_at IS NULL");
        }
        if filter.phase.is_some() {
            sql.push_str(" AND items.phase = ?");
        }
        if filter.lot_number.is_some() {
            sql.push_str(" AND lots.number = ?");
        }
        if filter.sku.is_some() {
            sql.push_str(" AND items.sku = ?");
        }
        if filter.scrap_motive.is_some() {
            sql.push_str(" AND items.scrap_motive = ?");
        }
        sql.push_str(" ORDER BY items.updated_at ASC, items.id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(phase) = filter.phase {
            query = query.bind(phase.as_str());
        }
        if let Some(ref lot) = filter.lot_number {
            query = query.bind(lot);
        }
        if let Some(ref sku) = filter.sku {
            query = query.bind(sku);
        }
        if let Some(motive) = filter.scrap_motive {
            query = query.bind(motive.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_item).collect()
    }

    /// Items waiting at the repair bench, longest waiting first.
    pub async fn pending_repairs(&self) -> Result<Vec<Item>> {
        self.list_items(&ItemFilter::phase(Phase::Reparacion)).await
    }

    /// Breakdown of live SCRAP items.
    pub async fn scrap_stats(&self) -> Result<ScrapStats> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE phase = 'SCRAP' AND deleted_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ScrapStats {
            total: total as u64,
            by_motive: self.scrap_group("scrap_motive").await?,
            by_detail: self.scrap_group("scrap_detail").await?,
            by_sku: self.scrap_group("sku").await?,
        })
    }

    async fn scrap_group(&self, column: &'static str) -> Result<Vec<(String, u64)>> {
        let sql = format!(
            r#"SELECT COALESCE({column}, 'SIN_DATO') AS label, COUNT(*) AS n
               FROM items WHERE phase = 'SCRAP' AND deleted_at IS NULL
               GROUP BY label ORDER BY n DESC, label ASC"#
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("label"), row.get::<i64, _>("n") as u64))
            .collect())
    }
}
