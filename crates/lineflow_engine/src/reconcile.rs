//! Batch reconciliation: parse, dedup, then apply rows in chunked
//! transactions on a bounded worker pool.
//!
//! Each chunk owns one transaction. Rows run inside savepoints, so a bad
//! row rolls back alone while the rest of the chunk commits. Store failures
//! abort the chunk and are retried once; timeouts are not retried.

use crate::cancel::CancellationToken;
use crate::error::{EngineError, ErrorKind, Result};
use crate::ops::{apply_row, BatchOp, RowContext, RowOutcome};
use crate::Engine;
use chrono::{DateTime, Utc};
use lineflow_db::{lots, runs, LineflowDb, Lot, NewLot, RunTotals, DEFAULT_LOT_PRIORITY};
use lineflow_intake::{dedup_rows, parse_batch, CanonicalRow, IntakeError, NormalizeOptions};
use lineflow_lifecycle::Actor;
use serde::Serialize;
use sqlx::Connection;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Lot settings for a run.
#[derive(Debug, Clone)]
pub struct LotOptions {
    /// Defaults to `LOT_{YYMMDD}` (inbound) or `SAL_{YYMMDD}` (outbound).
    pub number: Option<String>,
    pub sku: Option<String>,
    /// 1 (low) to 3 (high).
    pub priority: i64,
    /// File name recorded in the run journal.
    pub source_name: Option<String>,
    /// Received date for rows whose date is missing or unparseable.
    pub received_default: Option<DateTime<Utc>>,
}

impl Default for LotOptions {
    fn default() -> Self {
        Self {
            number: None,
            sku: None,
            priority: DEFAULT_LOT_PRIORITY,
            source_name: None,
            received_default: None,
        }
    }
}

/// One failed row, as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub line: usize,
    pub serial: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub run_id: i64,
    pub operation: String,
    pub lot_number: Option<String>,
    /// Data lines seen, including rejected and duplicate ones.
    pub total_rows: u64,
    pub accepted: u64,
    /// Duplicates within the file plus rows that needed no change.
    pub skipped: u64,
    pub failed: u64,
    /// Outbound serials with no inbound serial on the same line.
    pub unmatched: u64,
    /// Rows in chunks that never started because the run was cancelled.
    pub not_processed: u64,
    pub cancelled: bool,
    /// The first few row errors.
    pub errors: Vec<RowError>,
}

impl BatchResult {
    fn push_error(&mut self, error: RowError, limit: usize) {
        if self.errors.len() < limit {
            self.errors.push(error);
        }
    }

    fn totals(&self) -> RunTotals {
        RunTotals {
            accepted: self.accepted,
            skipped: self.skipped,
            failed: self.failed,
            unmatched: self.unmatched,
            cancelled: self.cancelled,
        }
    }
}

/// Per-chunk counts.
#[derive(Debug, Default)]
struct ChunkTally {
    accepted: u64,
    skipped: u64,
    failed: u64,
    errors: Vec<RowError>,
}

impl ChunkTally {
    fn fail(&mut self, row: &CanonicalRow, err: &EngineError) {
        self.failed += 1;
        self.errors.push(row_error(row, err));
    }

    /// Every row in the chunk failed for the same reason.
    fn all_failed(rows: &[CanonicalRow], err: &EngineError) -> Self {
        let mut tally = Self::default();
        for row in rows {
            tally.fail(row, err);
        }
        tally
    }
}

fn row_error(row: &CanonicalRow, err: &EngineError) -> RowError {
    RowError {
        line: row.line,
        serial: Some(row.serial.clone()),
        kind: err.kind(),
        message: err.to_string(),
    }
}

impl Engine {
    /// Run every row of `text` through `op`.
    ///
    /// Row-level failures are counted, never raised. Only run-level problems
    /// return `Err`: empty input, an incomplete state catalog, a lot of the
    /// wrong type, or the store failing before any chunk starts.
    pub async fn reconcile(
        &self,
        text: &str,
        op: BatchOp,
        actor: &Actor,
        options: LotOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchResult> {
        let started = Instant::now();
        let now = Utc::now();

        let mut normalize = NormalizeOptions::new(options.received_default.unwrap_or(now));
        normalize.min_serial_len = self.config.min_serial_len;
        let parsed = parse_batch(text, &normalize).map_err(|e| match e {
            IntakeError::Empty => EngineError::validation("batch file has no data lines"),
        })?;
        let batch = parsed.batch;

        let mut result = BatchResult {
            operation: op.label(),
            total_rows: (batch.rows.len() + batch.rejected.len() + batch.unmatched.len()) as u64,
            unmatched: batch.unmatched.len() as u64,
            ..BatchResult::default()
        };
        let limit = self.config.error_sample_limit;

        for rejection in &batch.rejected {
            result.failed += 1;
            result.push_error(
                RowError {
                    line: rejection.line,
                    serial: None,
                    kind: ErrorKind::Validation,
                    message: rejection.reason.clone(),
                },
                limit,
            );
        }
        for unmatched in &batch.unmatched {
            debug!(line = unmatched.line, serial = %unmatched.serial, "Outbound serial without inbound");
        }

        let (rows, duplicates) = dedup_rows(batch.rows);
        for dup in &duplicates {
            debug!(line = dup.line, serial = %dup.serial, "Duplicate serial in batch");
        }
        result.skipped += duplicates.len() as u64;

        // Run-level checks: nothing is written if these fail.
        let snapshot = self.catalog.snapshot(&self.db).await?;
        snapshot.states.require(&op.required_states())?;

        let lot = self.prepare_lot(op, &options, actor, now).await?;
        result.lot_number = lot.as_ref().map(|l| l.number.clone());

        let run_id = self
            .db
            .begin_run(&op.label(), options.source_name.as_deref(), &actor.user_id)
            .await?;
        result.run_id = run_id;

        info!(
            run_id,
            op = %op,
            strategy = ?parsed.structure.strategy,
            delimiter = %parsed.structure.delimiter,
            rows = rows.len(),
            duplicates = duplicates.len(),
            rejected = batch.rejected.len(),
            "Reconcile started"
        );

        let ctx = Arc::new(RowContext {
            op,
            actor: actor.clone(),
            snapshot,
            lot: lot.clone(),
        });
        self.run_chunks(run_id, ctx, rows, cancel, &mut result).await;

        self.db.finish_run(run_id, result.totals()).await?;

        if let Some(lot) = lot.filter(|_| op.closes_lot() && !result.cancelled) {
            self.close_after_run(&lot).await;
        }

        info!(
            run_id,
            op = %op,
            accepted = result.accepted,
            skipped = result.skipped,
            failed = result.failed,
            unmatched = result.unmatched,
            not_processed = result.not_processed,
            cancelled = result.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconcile finished"
        );

        Ok(result)
    }

    /// Upsert the run's lot by number. An existing lot of the other type is
    /// a validation error.
    async fn prepare_lot(
        &self,
        op: BatchOp,
        options: &LotOptions,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Option<Lot>> {
        let Some(lot_type) = op.lot_type() else {
            return Ok(None);
        };
        let number = match options.number.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(number) => number.to_string(),
            None => match op.default_lot_number(now) {
                Some(number) => number,
                None => return Ok(None),
            },
        };

        let mut tx = self.db.pool().begin().await?;
        let lot = lots::upsert(
            &mut tx,
            &NewLot {
                number: number.clone(),
                sku: options.sku.clone(),
                lot_type,
                is_scrap: false,
                scrap_motive: None,
                priority: options.priority,
                responsible_id: Some(actor.user_id.clone()),
            },
        )
        .await?;
        tx.commit().await?;

        if lot.lot_type != lot_type {
            return Err(EngineError::validation(format!(
                "lot {number} is {} but this run needs {lot_type}",
                lot.lot_type
            )));
        }
        if lot.is_scrap {
            return Err(EngineError::validation(format!("lot {number} is a scrap output lot")));
        }
        Ok(Some(lot))
    }

    async fn close_after_run(&self, lot: &Lot) {
        let mut conn = match self.db.pool().acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(lot = %lot.number, error = %e, "Could not close lot");
                return;
            }
        };
        let current = match lots::find_by_number(&mut conn, &lot.number).await {
            Ok(Some(current)) => current,
            Ok(None) => return,
            Err(e) => {
                warn!(lot = %lot.number, error = %e, "Could not close lot");
                return;
            }
        };
        if current.status == lineflow_db::LotStatus::Completado {
            return;
        }
        match lots::count_items(&mut conn, current.id).await {
            Ok(0) => debug!(lot = %lot.number, "Lot still empty, left open"),
            Ok(_) => {
                if let Err(e) = lots::close(&mut conn, &current).await {
                    warn!(lot = %lot.number, error = %e, "Could not close lot");
                }
            }
            Err(e) => warn!(lot = %lot.number, error = %e, "Could not count lot items"),
        }
    }

    async fn run_chunks(
        &self,
        run_id: i64,
        ctx: Arc<RowContext>,
        rows: Vec<CanonicalRow>,
        cancel: &CancellationToken,
        result: &mut BatchResult,
    ) {
        let chunk_size = self.config.effective_chunk_size();
        let chunks: Vec<Vec<CanonicalRow>> = rows.chunks(chunk_size).map(<[_]>::to_vec).collect();
        let total_chunks = chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.config.effective_workers()));
        let timeout = self.config.chunk_timeout();

        let mut handles = Vec::with_capacity(total_chunks);
        for (index, chunk) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                result.not_processed += chunk.len() as u64;
                continue;
            }
            // Wait for a free worker before deciding whether to start.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                result.not_processed += chunk.len() as u64;
                continue;
            };
            if cancel.is_cancelled() {
                result.cancelled = true;
                result.not_processed += chunk.len() as u64;
                continue;
            }

            let db = self.db.clone();
            let ctx = Arc::clone(&ctx);
            let len = chunk.len();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let (db_ref, ctx_ref, rows) = (&db, &*ctx, chunk.as_slice());
                process_chunk(run_id, rows, index, timeout, move || {
                    run_chunk(db_ref, run_id, ctx_ref, rows)
                })
                .await
            });
            handles.push((len, handle));
        }

        for (len, handle) in handles {
            let tally = match handle.await {
                Ok(tally) => tally,
                Err(e) => {
                    warn!(run_id, error = %e, "Chunk task failed");
                    result.failed += len as u64;
                    result.push_error(
                        RowError {
                            line: 0,
                            serial: None,
                            kind: ErrorKind::StoreFailure,
                            message: format!("chunk task failed: {e}"),
                        },
                        self.config.error_sample_limit,
                    );
                    continue;
                }
            };
            result.accepted += tally.accepted;
            result.skipped += tally.skipped;
            result.failed += tally.failed;
            for error in tally.errors {
                result.push_error(error, self.config.error_sample_limit);
            }
        }
    }
}

/// One chunk with timeout and a single retry on store failure.
///
/// `attempt_chunk` runs the chunk's transaction once; it is called at most twice.
async fn process_chunk<F, Fut>(
    run_id: i64,
    rows: &[CanonicalRow],
    index: usize,
    timeout: Duration,
    attempt_chunk: F,
) -> ChunkTally
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<ChunkTally>>,
{
    let started = Instant::now();
    let mut attempt = 1;
    let tally = loop {
        match tokio::time::timeout(timeout, attempt_chunk()).await {
            Err(_) => {
                warn!(run_id, chunk = index, ?timeout, "Chunk timed out");
                break ChunkTally::all_failed(rows, &EngineError::Timeout(timeout));
            }
            Ok(Ok(tally)) => break tally,
            Ok(Err(e @ EngineError::StoreFailure(_))) if attempt == 1 => {
                warn!(run_id, chunk = index, error = %e, "Chunk store failure, retrying");
                attempt += 1;
            }
            Ok(Err(e)) => {
                warn!(run_id, chunk = index, error = %e, "Chunk failed");
                break ChunkTally::all_failed(rows, &e);
            }
        }
    };

    info!(
        run_id,
        chunk = index,
        rows = rows.len(),
        accepted = tally.accepted,
        skipped = tally.skipped,
        failed = tally.failed,
        attempts = attempt,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Chunk done"
    );
    tally
}

/// One transaction for the chunk, one savepoint per row.
async fn run_chunk(
    db: &LineflowDb,
    run_id: i64,
    ctx: &RowContext,
    rows: &[CanonicalRow],
) -> Result<ChunkTally> {
    let mut tx = db.pool().begin().await?;
    // Take the write lock before reading anything.
    runs::touch_run(&mut tx, run_id).await.map_err(store_failure)?;

    let mut tally = ChunkTally::default();
    for row in rows {
        let mut savepoint = tx.begin().await?;
        match apply_row(&mut savepoint, ctx, row).await {
            Ok(outcome) => {
                savepoint.commit().await?;
                match outcome {
                    RowOutcome::Accepted => tally.accepted += 1,
                    RowOutcome::Skipped => tally.skipped += 1,
                }
            }
            Err(e) if e.is_row_level() => {
                savepoint.rollback().await?;
                debug!(line = row.line, serial = %row.serial, error = %e, "Row failed");
                tally.fail(row, &e);
            }
            Err(e) => return Err(e),
        }
    }

    tx.commit().await?;
    Ok(tally)
}

/// Any failure to bump the journal means the chunk cannot proceed.
fn store_failure(err: lineflow_db::DbError) -> EngineError {
    EngineError::StoreFailure(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineflow_db::DbError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rows(n: usize) -> Vec<CanonicalRow> {
        (0..n)
            .map(|i| CanonicalRow {
                line: i + 1,
                serial: format!("ABC10000{i}"),
                material_code: None,
                batch_tag: None,
                received_at: Utc::now(),
                received_defaulted: true,
                outbound_serial: None,
            })
            .collect()
    }

    fn accepted(n: usize) -> ChunkTally {
        ChunkTally {
            accepted: n as u64,
            ..ChunkTally::default()
        }
    }

    fn locked() -> EngineError {
        EngineError::StoreFailure(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    #[tokio::test]
    async fn test_store_failure_is_retried_once() {
        let rows = rows(3);
        let calls = AtomicUsize::new(0);
        let tally = process_chunk(1, &rows, 0, Duration::from_secs(5), || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(locked())
                } else {
                    Ok(accepted(3))
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(tally.accepted, 3);
        assert_eq!(tally.failed, 0);
    }

    #[tokio::test]
    async fn test_second_store_failure_fails_whole_chunk() {
        let rows = rows(3);
        let calls = AtomicUsize::new(0);
        let tally = process_chunk(1, &rows, 0, Duration::from_secs(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(locked()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(tally.accepted, 0);
        assert_eq!(tally.failed, 3);
        assert!(tally.errors.iter().all(|e| e.kind == ErrorKind::StoreFailure));
        assert_eq!(tally.errors[2].serial.as_deref(), Some("ABC100002"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_chunk_fails_without_retry() {
        let rows = rows(2);
        let calls = AtomicUsize::new(0);
        let tally = process_chunk(1, &rows, 4, Duration::from_millis(50), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(accepted(2))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tally.failed, 2);
        assert!(tally.errors.iter().all(|e| e.kind == ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_row_level_failure_is_not_retried() {
        let rows = rows(1);
        let calls = AtomicUsize::new(0);
        let tally = process_chunk(1, &rows, 0, Duration::from_secs(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::validation("bad chunk")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.errors[0].kind, ErrorKind::Validation);
    }
}
