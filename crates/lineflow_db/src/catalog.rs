//! State catalog, code catalogs and SKU mapping.

use crate::error::{DbError, Result};
use crate::seed;
use crate::types::*;
use crate::LineflowDb;
use lineflow_lifecycle::{CodeCatalog, DiagnosisCode, Phase, RepairCode, Severity};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::info;

/// SKU name mapped from a material code.
pub async fn sku_for_material(conn: &mut SqliteConnection, material_code: &str) -> Result<Option<String>> {
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM skus WHERE material_code = ?")
        .bind(material_code.trim())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(name)
}

impl LineflowDb {
    // ========================================================================
    // States
    // ========================================================================

    /// All state rows.
    pub async fn list_states(&self) -> Result<Vec<StateEntry>> {
        let rows = sqlx::query("SELECT id, name FROM states ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| StateEntry {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    /// Add a state row for `phase` if missing; returns its id.
    pub async fn ensure_state(&self, phase: Phase) -> Result<i64> {
        sqlx::query("INSERT OR IGNORE INTO states (name) VALUES (?)")
            .bind(phase.as_str())
            .execute(&self.pool)
            .await?;
        let id: i64 = sqlx::query_scalar("SELECT id FROM states WHERE name = ?")
            .bind(phase.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// Remove a state row. Fails while items or records still point at it.
    pub async fn remove_state(&self, phase: Phase) -> Result<()> {
        let result = sqlx::query("DELETE FROM states WHERE name = ?")
            .bind(phase.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::constraint(format!("state {phase} is in use: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("state {phase}")));
        }
        Ok(())
    }

    // ========================================================================
    // Diagnosis / repair codes
    // ========================================================================

    pub async fn list_diagnosis_codes(&self) -> Result<Vec<DiagnosisCode>> {
        let rows = sqlx::query("SELECT * FROM diagnosis_codes ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let severity: String = row.get("severity");
                Ok(DiagnosisCode {
                    code: row.get("code"),
                    description: row.get("description"),
                    severity: Severity::parse(&severity).ok_or_else(|| {
                        DbError::invalid_state(format!("unknown severity '{severity}'"))
                    })?,
                    repair_code: row.get("repair_code"),
                    active: row.get("active"),
                })
            })
            .collect()
    }

    pub async fn list_repair_codes(&self) -> Result<Vec<RepairCode>> {
        let rows = sqlx::query("SELECT * FROM repair_codes ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| RepairCode {
                code: row.get("code"),
                description: row.get("description"),
                scrap_tier: row.get("scrap_tier"),
                active: row.get("active"),
            })
            .collect())
    }

    pub async fn upsert_repair_code(&self, code: &RepairCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repair_codes (code, description, scrap_tier, active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                description = excluded.description,
                scrap_tier = excluded.scrap_tier,
                active = excluded.active
            "#,
        )
        .bind(&code.code)
        .bind(&code.description)
        .bind(code.scrap_tier)
        .bind(code.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_diagnosis_code(&self, code: &DiagnosisCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO diagnosis_codes (code, description, severity, repair_code, active)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                description = excluded.description,
                severity = excluded.severity,
                repair_code = excluded.repair_code,
                active = excluded.active
            "#,
        )
        .bind(&code.code)
        .bind(&code.description)
        .bind(code.severity.as_str())
        .bind(&code.repair_code)
        .bind(code.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Snapshot of both code catalogs for the state machine.
    pub async fn code_catalog(&self) -> Result<CodeCatalog> {
        let diagnosis = self.list_diagnosis_codes().await?;
        let repair = self.list_repair_codes().await?;
        Ok(CodeCatalog::new(diagnosis, repair))
    }

    // ========================================================================
    // SKUs
    // ========================================================================

    pub async fn upsert_sku(&self, material_code: &str, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO skus (material_code, name) VALUES (?, ?) ON CONFLICT(material_code) DO UPDATE SET name = excluded.name",
        )
        .bind(material_code)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_skus(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT material_code, name FROM skus ORDER BY material_code")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("material_code"), row.get("name")))
            .collect())
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Load the default states, codes and SKU map. Safe to run repeatedly.
    pub async fn seed_catalogs(&self) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for phase in seed::STATES {
            self.ensure_state(phase).await?;
            summary.states += 1;
        }

        // Repair codes first: diagnosis codes reference them.
        for (code, description, scrap_tier) in seed::REPAIR_CODES {
            self.upsert_repair_code(&RepairCode {
                code: code.to_string(),
                description: description.to_string(),
                scrap_tier: *scrap_tier,
                active: true,
            })
            .await?;
            summary.repair_codes += 1;
        }

        for (code, description, severity, repair_code) in seed::DIAGNOSIS_CODES {
            let severity = Severity::parse(severity)
                .ok_or_else(|| DbError::invalid_state(format!("unknown severity '{severity}'")))?;
            self.upsert_diagnosis_code(&DiagnosisCode {
                code: code.to_string(),
                description: description.to_string(),
                severity,
                repair_code: repair_code.map(str::to_string),
                active: true,
            })
            .await?;
            summary.diagnosis_codes += 1;
        }

        for (material, name) in seed::SKUS {
            self.upsert_sku(material, name).await?;
            summary.skus += 1;
        }

        info!(
            states = summary.states,
            repair_codes = summary.repair_codes,
            diagnosis_codes = summary.diagnosis_codes,
            skus = summary.skus,
            "Catalogs seeded"
        );

        Ok(summary)
    }
}
