//! Lot operations.

use crate::error::{DbError, Result};
use crate::items;
use crate::types::*;
use crate::{parse_motive, LineflowDb};
use lineflow_lifecycle::ScrapMotive;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::info;

/// Live lot by number.
pub async fn find_by_number(conn: &mut SqliteConnection, number: &str) -> Result<Option<Lot>> {
    let row = sqlx::query("SELECT * FROM lots WHERE number = ? AND deleted_at IS NULL")
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_lot).transpose()
}

/// Return the lot named `lot.number`, creating it when absent.
///
/// An existing lot is returned unchanged; the caller decides whether its
/// type and motive fit.
pub async fn upsert(conn: &mut SqliteConnection, lot: &NewLot) -> Result<Lot> {
    if let Some(existing) = find_by_number(conn, &lot.number).await? {
        return Ok(existing);
    }
    if !(1..=3).contains(&lot.priority) {
        return Err(DbError::constraint(format!(
            "lot priority must be between 1 and 3, got {}",
            lot.priority
        )));
    }

    let now = LineflowDb::now_millis();
    let result = sqlx::query(
        r#"
        INSERT INTO lots (
            number, sku, lot_type, is_scrap, scrap_motive, status, priority,
            responsible_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&lot.number)
    .bind(&lot.sku)
    .bind(lot.lot_type.as_str())
    .bind(lot.is_scrap)
    .bind(lot.scrap_motive.map(|m| m.as_str()))
    .bind(LotStatus::EnProceso.as_str())
    .bind(lot.priority)
    .bind(&lot.responsible_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from_write(e, &lot.number))?;

    info!(lot = %lot.number, lot_type = %lot.lot_type, "Lot created");

    let row = sqlx::query("SELECT * FROM lots WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&mut *conn)
        .await?;
    row_to_lot(&row)
}

/// Open scrap-output lot for this SKU, responsible user and motive.
pub async fn find_open_scrap_lot(
    conn: &mut SqliteConnection,
    sku: Option<&str>,
    responsible_id: &str,
    motive: ScrapMotive,
) -> Result<Option<Lot>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM lots
        WHERE is_scrap = 1
          AND lot_type = 'SALIDA'
          AND status = 'EN_PROCESO'
          AND deleted_at IS NULL
          AND sku IS ?
          AND responsible_id = ?
          AND scrap_motive = ?
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(sku)
    .bind(responsible_id)
    .bind(motive.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(row_to_lot).transpose()
}

/// Next free number of the form `{prefix}-{NNNN}`.
pub async fn next_sequenced_number(conn: &mut SqliteConnection, prefix: &str) -> Result<String> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lots WHERE number LIKE ? || '-%'")
        .bind(prefix)
        .fetch_one(&mut *conn)
        .await?;
    Ok(format!("{prefix}-{:04}", count + 1))
}

/// Live items that belong to the lot, inbound or outbound.
pub async fn count_items(conn: &mut SqliteConnection, lot_id: i64) -> Result<u64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM items WHERE (lot_id = ? OR outbound_lot_id = ?) AND deleted_at IS NULL",
    )
    .bind(lot_id)
    .bind(lot_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count as u64)
}

/// Mark the lot COMPLETADO. Fails when already closed or empty.
pub async fn close(conn: &mut SqliteConnection, lot: &Lot) -> Result<Lot> {
    if lot.status == LotStatus::Completado {
        return Err(DbError::invalid_state(format!(
            "lot {} is already {}",
            lot.number,
            LotStatus::Completado
        )));
    }
    let count = count_items(conn, lot.id).await?;
    if count == 0 {
        return Err(DbError::invalid_state(format!(
            "lot {} has no items and cannot be closed",
            lot.number
        )));
    }

    sqlx::query("UPDATE lots SET status = ?, updated_at = ? WHERE id = ?")
        .bind(LotStatus::Completado.as_str())
        .bind(LineflowDb::now_millis())
        .bind(lot.id)
        .execute(&mut *conn)
        .await?;

    info!(lot = %lot.number, items = count, "Lot closed");

    let row = sqlx::query("SELECT * FROM lots WHERE id = ?")
        .bind(lot.id)
        .fetch_one(&mut *conn)
        .await?;
    row_to_lot(&row)
}

pub(crate) fn row_to_lot(row: &SqliteRow) -> Result<Lot> {
    let lot_type: String = row.get("lot_type");
    let status: String = row.get("status");
    let deleted_at: Option<i64> = row.get("deleted_at");
    Ok(Lot {
        id: row.get("id"),
        number: row.get("number"),
        sku: row.get("sku"),
        lot_type: LotType::parse(&lot_type)
            .ok_or_else(|| DbError::invalid_state(format!("unknown lot type '{lot_type}'")))?,
        is_scrap: row.get("is_scrap"),
        scrap_motive: parse_motive(row.get("scrap_motive"))?,
        status: LotStatus::parse(&status)
            .ok_or_else(|| DbError::invalid_state(format!("unknown lot status '{status}'")))?,
        priority: row.get("priority"),
        responsible_id: row.get("responsible_id"),
        created_at: LineflowDb::millis_to_datetime(row.get("created_at")),
        updated_at: LineflowDb::millis_to_datetime(row.get("updated_at")),
        deleted_at: deleted_at.map(LineflowDb::millis_to_datetime),
    })
}

/// Counts from a bulk purge.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PurgeSummary {
    pub lot_number: String,
    pub items_tombstoned: u64,
    pub outbound_refs_cleared: u64,
}

impl LineflowDb {
    /// Live lot by number.
    pub async fn lot_by_number(&self, number: &str) -> Result<Option<Lot>> {
        let mut conn = self.pool.acquire().await?;
        find_by_number(&mut conn, number).await
    }

    /// All live lots, newest first.
    pub async fn list_lots(&self, limit: Option<u32>) -> Result<Vec<Lot>> {
        let mut sql = String::from("SELECT * FROM lots WHERE deleted_at IS NULL ORDER BY created_at DESC, id DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_lot).collect()
    }

    /// Close a lot by number.
    pub async fn close_lot(&self, number: &str) -> Result<Lot> {
        let mut tx = self.pool.begin().await?;
        let lot = find_by_number(&mut tx, number)
            .await?
            .ok_or_else(|| DbError::not_found(format!("lot {number}")))?;
        let closed = close(&mut tx, &lot).await?;
        tx.commit().await?;
        Ok(closed)
    }

    /// Tombstone a lot and its items in one transaction.
    ///
    /// `confirmation` must equal the lot number. Outbound references to the
    /// lot are cleared first. Transition records are left untouched.
    pub async fn purge_lot(&self, number: &str, confirmation: &str) -> Result<PurgeSummary> {
        if confirmation.trim() != number {
            return Err(DbError::constraint(format!(
                "confirmation '{confirmation}' does not match lot number '{number}'"
            )));
        }

        let mut tx = self.pool.begin().await?;
        let lot = find_by_number(&mut tx, number)
            .await?
            .ok_or_else(|| DbError::not_found(format!("lot {number}")))?;

        let outbound_refs_cleared = items::clear_outbound_lot(&mut tx, lot.id).await?;
        let items_tombstoned = items::soft_delete_by_lot(&mut tx, lot.id).await?;

        let now = LineflowDb::now_millis();
        sqlx::query("UPDATE lots SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(lot.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            lot = %number,
            items = items_tombstoned,
            outbound_refs = outbound_refs_cleared,
            "Lot purged"
        );

        Ok(PurgeSummary {
            lot_number: number.to_string(),
            items_tombstoned,
            outbound_refs_cleared,
        })
    }
}
