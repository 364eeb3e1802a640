#![allow(dead_code)]

use lineflow_db::{Item, LineflowDb};
use lineflow_engine::{BatchOp, BatchResult, CancellationToken, Engine, EngineConfig, LotOptions};
use lineflow_lifecycle::{Actor, Payload, Phase};
use tempfile::TempDir;

pub fn admin() -> Actor {
    Actor::new("admin", "UA")
}

pub async fn engine_with(config: EngineConfig) -> (Engine, TempDir) {
    let tmp = TempDir::new().unwrap();
    let db = LineflowDb::open(tmp.path().join("lineflow.sqlite3")).await.unwrap();
    let engine = Engine::new(db, config);
    engine.seed().await.unwrap();
    (engine, tmp)
}

pub async fn seeded_engine() -> (Engine, TempDir) {
    engine_with(EngineConfig::default()).await
}

pub async fn run(engine: &Engine, text: &str, op: BatchOp, actor: &Actor) -> BatchResult {
    engine
        .reconcile(text, op, actor, LotOptions::default(), &CancellationToken::new())
        .await
        .unwrap()
}

pub async fn register(engine: &Engine, serials: &[&str]) {
    let text = serials.join("\n");
    let result = run(engine, &text, BatchOp::Create, &admin()).await;
    assert_eq!(result.accepted as usize, serials.len());
}

/// Register `serial` and administratively place it in `phase`.
pub async fn item_in(engine: &Engine, serial: &str, phase: Phase) -> Item {
    register(engine, &[serial]).await;
    if phase != Phase::Registro {
        engine
            .transition(serial, phase, &admin(), Payload::None)
            .await
            .unwrap();
    }
    item(engine, serial).await
}

pub async fn item(engine: &Engine, serial: &str) -> Item {
    engine.db().item_by_serial(serial).await.unwrap().unwrap()
}
