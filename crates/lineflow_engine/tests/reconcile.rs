//! Batch reconciliation end to end.

mod common;

use common::{admin, engine_with, item, run, seeded_engine};
use lineflow_db::{ItemFilter, LineflowDb, LotStatus, RecordFilter};
use lineflow_engine::{
    BatchOp, CancellationToken, Engine, EngineConfig, EngineError, ErrorKind, LotOptions,
};
use lineflow_lifecycle::{Actor, Payload, Phase, ScrapRequest};
use tempfile::TempDir;

const CREATE_CSV: &str = "\
sn,material,folio,fecha
ABC123456,76735,F-01,01-ene-24
DEF654321,66262,F-01,15/03/2024
";

#[tokio::test]
async fn test_create_registers_items_and_closes_lot() {
    let (engine, _tmp) = seeded_engine().await;
    let options = LotOptions {
        number: Some("LOT_TEST".into()),
        ..Default::default()
    };

    let result = engine
        .reconcile(CREATE_CSV, BatchOp::Create, &admin(), options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.total_rows, 2);
    assert_eq!(result.accepted, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(result.lot_number.as_deref(), Some("LOT_TEST"));

    let created = item(&engine, "ABC123456").await;
    assert_eq!(created.phase, Phase::Registro);
    assert_eq!(created.sku.as_deref(), Some("X6"));
    assert_eq!(created.batch_tag.as_deref(), Some("F-01"));
    assert_eq!(created.received_at.format("%Y-%m-%d").to_string(), "2024-01-01");

    let records = engine
        .history(&RecordFilter {
            serial: Some("ABC123456".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].phase, Phase::Registro);
    assert_eq!(records[0].disposition, "SN_OK");

    let lot = engine.db().lot_by_number("LOT_TEST").await.unwrap().unwrap();
    assert_eq!(lot.status, LotStatus::Completado);

    let run = engine.db().get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(run.accepted, 2);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let (engine, _tmp) = seeded_engine().await;
    run(&engine, CREATE_CSV, BatchOp::Create, &admin()).await;
    let again = run(&engine, CREATE_CSV, BatchOp::Create, &admin()).await;

    assert_eq!(again.accepted, 0);
    assert_eq!(again.skipped, 2);
    assert_eq!(again.failed, 0);

    let items = engine
        .list_by_phase(Phase::Registro, ItemFilter::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_bad_rows_fail_alone() {
    let (engine, _tmp) = seeded_engine().await;
    let text = "sn,material\nABC123456,76735\nABC,76735\nDEF654321,66262\n";

    let result = run(&engine, text, BatchOp::Create, &admin()).await;

    assert_eq!(result.accepted, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 3);
    assert_eq!(result.errors[0].kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_duplicate_serials_are_skipped() {
    let (engine, _tmp) = seeded_engine().await;
    let text = "AAA111111\nBBB222222\naaa111111\n";

    let result = run(&engine, text, BatchOp::Create, &admin()).await;

    assert_eq!(result.total_rows, 3);
    assert_eq!(result.accepted, 2);
    assert_eq!(result.skipped, 1);
}

#[tokio::test]
async fn test_advance_then_pack_then_advance_skips() {
    let (engine, _tmp) = seeded_engine().await;
    let serials = "AAA111111\nBBB222222\nCCC333333\n";
    run(&engine, serials, BatchOp::Create, &admin()).await;

    let advanced = run(&engine, serials, BatchOp::Advance, &admin()).await;
    assert_eq!(advanced.accepted, 3);
    assert_eq!(item(&engine, "BBB222222").await.phase, Phase::TestInicial);

    let packed = run(&engine, serials, BatchOp::Pack, &admin()).await;
    assert_eq!(packed.accepted, 3);
    let records = engine
        .history(&RecordFilter {
            serial: Some("CCC333333".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    // REGISTRO, TEST_INICIAL, then ENSAMBLE, RETEST and EMPAQUE from the walk.
    assert_eq!(records.len(), 5);

    let again = run(&engine, serials, BatchOp::Advance, &admin()).await;
    assert_eq!(again.accepted, 0);
    assert_eq!(again.skipped, 3);
    assert_eq!(again.failed, 0);
}

#[tokio::test]
async fn test_advance_on_scrap_fails_that_row_only() {
    let (engine, _tmp) = seeded_engine().await;
    let serials = "AAA111111\nBBB222222\n";
    run(&engine, serials, BatchOp::Create, &admin()).await;
    run(&engine, serials, BatchOp::Advance, &admin()).await;
    engine
        .transition(
            "AAA111111",
            Phase::Scrap,
            &admin(),
            Payload::Scrap(ScrapRequest {
                motive: "COSMETICA".into(),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

    let result = run(&engine, serials, BatchOp::Advance, &admin()).await;
    assert_eq!(result.accepted, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].serial.as_deref(), Some("AAA111111"));
    assert_eq!(result.errors[0].kind, ErrorKind::PhaseViolation);
    assert_eq!(item(&engine, "AAA111111").await.phase, Phase::Scrap);

    // Packing leaves scrapped items alone.
    let packed = run(&engine, serials, BatchOp::Pack, &admin()).await;
    assert_eq!(packed.accepted, 1);
    assert_eq!(packed.skipped, 1);
}

#[tokio::test]
async fn test_unregistered_serial_is_not_found() {
    let (engine, _tmp) = seeded_engine().await;
    let result = run(&engine, "ZZZ999999\n", BatchOp::Advance, &admin()).await;
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_row_permission_denied_is_counted() {
    let (engine, _tmp) = seeded_engine().await;
    run(&engine, "AAA111111\n", BatchOp::Create, &admin()).await;

    let result = run(&engine, "AAA111111\n", BatchOp::Advance, &Actor::new("e1", "UEN")).await;
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].kind, ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_set_phase_moves_every_row() {
    let (engine, _tmp) = seeded_engine().await;
    let serials = "AAA111111\nBBB222222\n";
    run(&engine, serials, BatchOp::Create, &admin()).await;

    let result = run(&engine, serials, BatchOp::SetPhase(Phase::Retest), &admin()).await;
    assert_eq!(result.accepted, 2);
    assert_eq!(result.operation, "set-phase:RETEST");
    assert_eq!(item(&engine, "AAA111111").await.phase, Phase::Retest);
}

#[tokio::test]
async fn test_pair_packs_matched_rows() {
    let (engine, _tmp) = seeded_engine().await;
    let text = "entrada,salida\nAAA111111,BBB222222\nCCC333333,\n,DDD444444\n";

    let result = engine
        .reconcile(text, BatchOp::Pair, &admin(), LotOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.accepted, 2);
    assert_eq!(result.unmatched, 1);
    assert_eq!(result.failed, 0);

    assert_eq!(item(&engine, "AAA111111").await.phase, Phase::Empaque);
    assert_eq!(item(&engine, "CCC333333").await.phase, Phase::Registro);
    assert!(engine.db().item_by_serial("DDD444444").await.unwrap().is_none());

    let last = engine
        .history(&RecordFilter {
            serial: Some("AAA111111".into()),
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(last[0].phase, Phase::Empaque);
    assert_eq!(last[0].note.as_deref(), Some("salida BBB222222"));
}

#[tokio::test]
async fn test_ship_attaches_packed_items() {
    let (engine, _tmp) = seeded_engine().await;
    let serials = "AAA111111\nBBB222222\n";
    run(&engine, serials, BatchOp::Create, &admin()).await;
    run(&engine, "AAA111111\n", BatchOp::Pack, &admin()).await;

    let options = LotOptions {
        number: Some("SAL_TEST".into()),
        ..Default::default()
    };
    let shipped = engine
        .reconcile(serials, BatchOp::Ship, &Actor::new("e1", "UE"), options.clone(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(shipped.accepted, 1);
    assert_eq!(shipped.failed, 1);
    assert_eq!(shipped.errors[0].serial.as_deref(), Some("BBB222222"));

    let lot = engine.db().lot_by_number("SAL_TEST").await.unwrap().unwrap();
    assert_eq!(item(&engine, "AAA111111").await.outbound_lot_id, Some(lot.id));

    let again = engine
        .reconcile("AAA111111\n", BatchOp::Ship, &Actor::new("e1", "UE"), options, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.skipped, 1);
}

#[tokio::test]
async fn test_lot_type_mismatch_aborts_run() {
    let (engine, _tmp) = seeded_engine().await;
    let options = LotOptions {
        number: Some("L1".into()),
        ..Default::default()
    };
    engine
        .reconcile("AAA111111\n", BatchOp::Create, &admin(), options.clone(), &CancellationToken::new())
        .await
        .unwrap();

    let err = engine
        .reconcile("AAA111111\n", BatchOp::Ship, &admin(), options, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_small_chunks_cover_every_row() {
    let config = EngineConfig {
        chunk_size: 2,
        max_workers: 3,
        ..EngineConfig::default()
    };
    let (engine, _tmp) = engine_with(config).await;
    let text: String = (1..=7).map(|n| format!("SER{n:06}\n")).collect();

    let result = run(&engine, &text, BatchOp::Create, &admin()).await;
    assert_eq!(result.accepted, 7);
    assert_eq!(result.not_processed, 0);

    let journal = engine.db().get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(journal.chunks_started, 4);
}

#[tokio::test]
async fn test_failing_chunk_rolls_back_and_run_continues() {
    let config = EngineConfig {
        chunk_size: 2,
        max_workers: 1,
        ..EngineConfig::default()
    };
    let (engine, _tmp) = engine_with(config).await;
    // Any write of this serial fails inside the store, not in the data.
    sqlx::query(
        "CREATE TRIGGER fail_serial BEFORE INSERT ON items \
         WHEN NEW.serial = 'SER000003' BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END",
    )
    .execute(engine.db().pool())
    .await
    .unwrap();

    let text: String = (1..=6).map(|n| format!("SER{n:06}\n")).collect();
    let result = run(&engine, &text, BatchOp::Create, &admin()).await;

    // The second chunk holds SER000003 and SER000004; both fail together.
    assert_eq!(result.accepted, 4);
    assert_eq!(result.failed, 2);
    assert!(result.errors.iter().all(|e| e.kind == ErrorKind::StoreFailure));
    let failed: Vec<_> = result.errors.iter().filter_map(|e| e.serial.as_deref()).collect();
    assert_eq!(failed, vec!["SER000003", "SER000004"]);
    assert!(engine.db().item_by_serial("SER000004").await.unwrap().is_none());
    assert!(engine.db().item_by_serial("SER000005").await.unwrap().is_some());

    let journal = engine.db().get_run(result.run_id).await.unwrap().unwrap();
    assert_eq!(journal.accepted, 4);
    assert_eq!(journal.failed, 2);
    // Both attempts of the failed chunk rolled back their journal bump.
    assert_eq!(journal.chunks_started, 2);
    assert!(journal.finished_at.is_some());
}

#[tokio::test]
async fn test_workers_capped_at_pool_size() {
    let config = EngineConfig {
        max_workers: 64,
        ..EngineConfig::default()
    };
    let (engine, _tmp) = engine_with(config).await;
    assert_eq!(engine.config().max_workers as u32, engine.db().max_connections());

    let text: String = (1..=5).map(|n| format!("SER{n:06}\n")).collect();
    let result = run(&engine, &text, BatchOp::Create, &admin()).await;
    assert_eq!(result.accepted, 5);
}

#[tokio::test]
async fn test_cancelled_run_processes_nothing() {
    let (engine, _tmp) = seeded_engine().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = engine
        .reconcile(CREATE_CSV, BatchOp::Create, &admin(), LotOptions::default(), &cancel)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.accepted, 0);
    assert_eq!(result.not_processed, 2);
    assert!(engine.db().item_by_serial("ABC123456").await.unwrap().is_none());

    let journal = engine.db().get_run(result.run_id).await.unwrap().unwrap();
    assert!(journal.cancelled);
}

#[tokio::test]
async fn test_empty_input_is_rejected() {
    let (engine, _tmp) = seeded_engine().await;
    let err = engine
        .reconcile("\n\n", BatchOp::Create, &admin(), LotOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_missing_states_abort_before_any_write() {
    let tmp = TempDir::new().unwrap();
    let db = LineflowDb::open(tmp.path().join("bare.sqlite3")).await.unwrap();
    let engine = Engine::new(db, EngineConfig::default());

    let err = engine
        .reconcile("AAA111111\n", BatchOp::Create, &admin(), LotOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CatalogIncomplete(_)));
    assert!(engine.recent_runs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_and_purge_lot() {
    let (engine, _tmp) = seeded_engine().await;
    let options = LotOptions {
        number: Some("LOT_PURGE".into()),
        ..Default::default()
    };
    engine
        .reconcile("AAA111111\n", BatchOp::Create, &admin(), options, &CancellationToken::new())
        .await
        .unwrap();

    // Create runs close their lot; closing again is refused.
    let err = engine.close_lot("LOT_PURGE").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine.purge_lot("LOT_PURGE", "LOT_OTHER").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let summary = engine.purge_lot("LOT_PURGE", "LOT_PURGE").await.unwrap();
    assert_eq!(summary.items_tombstoned, 1);
    assert!(engine.db().item_by_serial("AAA111111").await.unwrap().is_none());

    let kept = engine
        .history(&RecordFilter {
            serial: Some("AAA111111".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(kept.len(), 1);
}
