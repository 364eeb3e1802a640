//! Reconcile run journal.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::LineflowDb;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

/// Bump the run's chunk counter.
///
/// Chunk transactions call this first so they hold the write lock before
/// reading any item.
pub async fn touch_run(conn: &mut SqliteConnection, run_id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE reconcile_runs SET chunks_started = chunks_started + 1 WHERE id = ?")
        .bind(run_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found(format!("reconcile run {run_id}")));
    }
    Ok(())
}

fn row_to_run(row: &SqliteRow) -> Result<ReconcileRun> {
    let count = |name: &str| -> u64 { row.get::<i64, _>(name).max(0) as u64 };
    let finished_at: Option<i64> = row.get("finished_at");
    Ok(ReconcileRun {
        id: row.get("id"),
        operation: row.get("operation"),
        source_name: row.get("source_name"),
        user_id: row.get("user_id"),
        accepted: count("accepted"),
        skipped: count("skipped"),
        failed: count("failed"),
        unmatched: count("unmatched"),
        chunks_started: count("chunks_started"),
        cancelled: row.get("cancelled"),
        started_at: LineflowDb::millis_to_datetime(row.get("started_at")),
        finished_at: finished_at.map(LineflowDb::millis_to_datetime),
    })
}

impl LineflowDb {
    /// Open a journal entry; returns the run id.
    pub async fn begin_run(&self, operation: &str, source_name: Option<&str>, user_id: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO reconcile_runs (operation, source_name, user_id, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(operation)
        .bind(source_name)
        .bind(user_id)
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Write final totals. A run can only be finished once.
    pub async fn finish_run(&self, run_id: i64, totals: RunTotals) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE reconcile_runs
            SET accepted = ?, skipped = ?, failed = ?, unmatched = ?, cancelled = ?, finished_at = ?
            WHERE id = ? AND finished_at IS NULL
            "#,
        )
        .bind(totals.accepted as i64)
        .bind(totals.skipped as i64)
        .bind(totals.failed as i64)
        .bind(totals.unmatched as i64)
        .bind(totals.cancelled)
        .bind(Self::now_millis())
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_state(format!(
                "reconcile run {run_id} is unknown or already finished"
            )));
        }
        Ok(())
    }

    pub async fn get_run(&self, run_id: i64) -> Result<Option<ReconcileRun>> {
        let row = sqlx::query("SELECT * FROM reconcile_runs WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_run).transpose()
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<ReconcileRun>> {
        let rows = sqlx::query("SELECT * FROM reconcile_runs ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_run).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let db = LineflowDb::open(tmp.path().join("test.db")).await.unwrap();

        let run_id = db.begin_run("create", Some("lote.csv"), "u1").await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        touch_run(&mut conn, run_id).await.unwrap();
        touch_run(&mut conn, run_id).await.unwrap();
        drop(conn);

        let totals = RunTotals {
            accepted: 3,
            skipped: 1,
            failed: 2,
            unmatched: 0,
            cancelled: false,
        };
        db.finish_run(run_id, totals).await.unwrap();

        let run = db.get_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.operation, "create");
        assert_eq!(run.chunks_started, 2);
        assert_eq!(run.accepted, 3);
        assert_eq!(run.failed, 2);
        assert!(run.finished_at.is_some());

        // Second finish is rejected.
        assert!(db.finish_run(run_id, totals).await.is_err());
        assert_eq!(db.list_runs(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_touch_unknown_run() {
        let tmp = TempDir::new().unwrap();
        let db = LineflowDb::open(tmp.path().join("test.db")).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(matches!(touch_run(&mut conn, 99).await, Err(DbError::NotFound(_))));
    }
}
