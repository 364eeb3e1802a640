//! Global flags shared by every subcommand: where the database is, and who
//! is acting.

use crate::cli::config::LineflowConfig;
use crate::cli::error::HelpfulError;
use anyhow::Context;
use lineflow_db::LineflowDb;
use lineflow_engine::Engine;
use lineflow_lifecycle::Actor;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub user: Option<String>,
    pub role: Option<String>,
}

impl GlobalArgs {
    pub fn load_config(&self) -> anyhow::Result<LineflowConfig> {
        let path = self.config.clone().unwrap_or_else(lineflow_logging::config_path);
        LineflowConfig::load(&path)
    }

    /// The acting user. Required by every command that writes items.
    pub fn actor(&self) -> anyhow::Result<Actor> {
        let user = self.user.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let role = self.role.as_deref().map(str::trim).filter(|r| !r.is_empty());
        match (user, role) {
            (Some(user), Some(role)) => Ok(Actor::new(user, role)),
            _ => Err(HelpfulError::new("No acting user")
                .with_context("This command records who made each change")
                .with_suggestions([
                    "TRY: Pass --user <id> --role <role>",
                    "TRY: Or export LINEFLOW_USER and LINEFLOW_ROLE",
                ])
                .into()),
        }
    }

    /// Open the database and build an engine over it.
    pub async fn open_engine(&self) -> anyhow::Result<Engine> {
        let config = self.load_config()?;
        let path = config.database_path(self.db.as_deref());
        debug!(path = %path.display(), "Opening database");
        let db = LineflowDb::open(&path)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Engine::new(db, config.engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_requires_both_fields() {
        let mut args = GlobalArgs {
            user: Some("u1".into()),
            ..Default::default()
        };
        assert!(args.actor().is_err());

        args.role = Some(" UA ".into());
        let actor = args.actor().unwrap();
        assert_eq!(actor.user_id, "u1");
        assert_eq!(actor.role, "UA");
    }
}
