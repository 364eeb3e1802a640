//! Database schema creation.
//!
//! All CREATE TABLE statements live here.

use crate::error::Result;
use crate::LineflowDb;
use tracing::info;

impl LineflowDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        self.create_catalog_tables().await?;
        self.create_lot_tables().await?;
        self.create_item_tables().await?;
        self.create_record_tables().await?;
        self.create_run_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    async fn create_catalog_tables(&self) -> Result<()> {
        // States: phase label → state id
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS states (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS repair_codes (
                code TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                scrap_tier INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS diagnosis_codes (
                code TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'NA',
                repair_code TEXT REFERENCES repair_codes(code),
                active INTEGER NOT NULL DEFAULT 1
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Material code → SKU name
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS skus (
                material_code TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_lot_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS lots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number TEXT NOT NULL,
                sku TEXT,
                lot_type TEXT NOT NULL,
                is_scrap INTEGER NOT NULL DEFAULT 0,
                scrap_motive TEXT,
                status TEXT NOT NULL DEFAULT 'EN_PROCESO',
                priority INTEGER NOT NULL DEFAULT 2 CHECK (priority BETWEEN 1 AND 3),
                responsible_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Purged lot numbers may be reused.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_lots_live_number ON lots(number) WHERE deleted_at IS NULL",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_lots_open_scrap ON lots(is_scrap, status, sku, responsible_id, scrap_motive)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_item_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                serial TEXT NOT NULL,
                sku TEXT,
                material_code TEXT,
                batch_tag TEXT,
                phase TEXT NOT NULL,
                state_id INTEGER REFERENCES states(id),
                lot_id INTEGER REFERENCES lots(id),
                responsible_id TEXT,
                scrap_motive TEXT,
                scrap_detail TEXT,
                outbound_lot_id INTEGER REFERENCES lots(id),
                received_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Serial is unique among live items only; tombstones may repeat it.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_items_live_serial ON items(serial) WHERE deleted_at IS NULL",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_phase ON items(phase, deleted_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_lot ON items(lot_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_record_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS transition_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL REFERENCES items(id),
                serial TEXT NOT NULL,
                phase TEXT NOT NULL,
                previous_phase TEXT,
                state_id INTEGER REFERENCES states(id),
                disposition TEXT NOT NULL,
                scrap_motive TEXT,
                scrap_detail TEXT,
                diagnosis_code TEXT,
                repair_code TEXT,
                technician TEXT,
                note TEXT,
                user_id TEXT NOT NULL,
                lot_id INTEGER REFERENCES lots(id),
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_serial ON transition_records(serial, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_phase ON transition_records(phase, created_at)",
        )
        .execute(&self.pool)
        .await?;

        // The audit log is insert-only.
        sqlx::query(
            r#"CREATE TRIGGER IF NOT EXISTS transition_records_no_update
               BEFORE UPDATE ON transition_records
               BEGIN SELECT RAISE(ABORT, 'transition records are append-only'); END"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TRIGGER IF NOT EXISTS transition_records_no_delete
               BEFORE DELETE ON transition_records
               BEGIN SELECT RAISE(ABORT, 'transition records are append-only'); END"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_run_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS reconcile_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                operation TEXT NOT NULL,
                source_name TEXT,
                user_id TEXT NOT NULL,
                accepted INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                unmatched INTEGER NOT NULL DEFAULT 0,
                chunks_started INTEGER NOT NULL DEFAULT 0,
                cancelled INTEGER NOT NULL DEFAULT 0,
                started_at INTEGER NOT NULL,
                finished_at INTEGER
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
