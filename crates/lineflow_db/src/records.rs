//! The transition log.
//!
//! Insert-only: this module has no update or delete, and triggers in the
//! schema reject both.

use crate::error::Result;
use crate::types::*;
use crate::{parse_detail, parse_motive, parse_phase, LineflowDb};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

/// Append one record.
pub async fn insert(conn: &mut SqliteConnection, record: &NewRecord) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO transition_records (
            item_id, serial, phase, previous_phase, state_id, disposition,
            scrap_motive, scrap_detail, diagnosis_code, repair_code, technician,
            note, user_id, lot_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.item_id)
    .bind(&record.serial)
    .bind(record.phase.as_str())
    .bind(record.previous_phase.map(|p| p.as_str()))
    .bind(record.state_id)
    .bind(&record.disposition)
    .bind(record.scrap_motive.map(|m| m.as_str()))
    .bind(record.scrap_detail.map(|d| d.as_str()))
    .bind(&record.diagnosis_code)
    .bind(&record.repair_code)
    .bind(&record.technician)
    .bind(&record.note)
    .bind(&record.user_id)
    .bind(record.lot_id)
    .bind(LineflowDb::now_millis())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Records by id, in insertion order.
pub async fn fetch_by_ids(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<TransitionRecord>> {
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let row = sqlx::query("SELECT * FROM transition_records WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        records.push(row_to_record(&row)?);
    }
    Ok(records)
}

fn row_to_record(row: &SqliteRow) -> Result<TransitionRecord> {
    let phase: String = row.get("phase");
    let previous: Option<String> = row.get("previous_phase");
    Ok(TransitionRecord {
        id: row.get("id"),
        item_id: row.get("item_id"),
        serial: row.get("serial"),
        phase: parse_phase(&phase)?,
        previous_phase: previous.as_deref().map(parse_phase).transpose()?,
        state_id: row.get("state_id"),
        disposition: row.get("disposition"),
        scrap_motive: parse_motive(row.get("scrap_motive"))?,
        scrap_detail: parse_detail(row.get("scrap_detail"))?,
        diagnosis_code: row.get("diagnosis_code"),
        repair_code: row.get("repair_code"),
        technician: row.get("technician"),
        note: row.get("note"),
        user_id: row.get("user_id"),
        lot_id: row.get("lot_id"),
        created_at: LineflowDb::millis_to_datetime(row.get("created_at")),
    })
}

impl LineflowDb {
    /// Read the audit log, newest first.
    pub async fn records(&self, filter: &RecordFilter) -> Result<Vec<TransitionRecord>> {
        let mut sql = String::from("SELECT * FROM transition_records WHERE 1=1");
        if filter.serial.is_some() {
            sql.push_str(" AND serial = ?");
        }
        if filter.phase.is_some() {
            sql.push_str(" AND phase = ?");
        }
        if filter.since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if filter.until.is_some() {
            sql.push_str(" AND created_at < ?");
        }
        if filter.codes_only {
            sql.push_str(" AND (diagnosis_code IS NOT NULL OR repair_code IS NOT NULL)");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(ref serial) = filter.serial {
            query = query.bind(serial.to_uppercase());
        }
        if let Some(phase) = filter.phase {
            query = query.bind(phase.as_str());
        }
        if let Some(since) = filter.since {
            query = query.bind(since.timestamp_millis());
        }
        if let Some(until) = filter.until {
            query = query.bind(until.timestamp_millis());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    /// Diagnosis and repair entries for one serial, newest first.
    pub async fn repair_history(&self, serial: &str) -> Result<Vec<TransitionRecord>> {
        self.records(&RecordFilter {
            serial: Some(serial.to_string()),
            codes_only: true,
            ..RecordFilter::default()
        })
        .await
    }
}
