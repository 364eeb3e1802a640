//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use lineflow_engine::{EngineError, ErrorKind};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// File does not exist
    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                format!(
                    "TRY: Look for similar files: ls {}",
                    path.parent().map(|p| p.display().to_string()).unwrap_or_else(|| ".".to_string())
                ),
            ])
    }

    /// File cannot be read
    pub fn cannot_read_file(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot read file: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check file permissions: ls -la {}", path.display()),
                "TRY: Ensure the file is not open in another program".to_string(),
            ])
    }

    /// Batch operation name not recognized
    pub fn unknown_operation(name: &str) -> Self {
        Self::new(format!("Unknown operation: '{}'", name))
            .with_context("reconcile applies one operation to every row")
            .with_suggestions([
                "TRY: --op create | advance | set-phase | pack | pair | ship",
                "TRY: set-phase also needs --phase <PHASE>",
            ])
    }

    /// Engine failure, with advice keyed on its kind
    pub fn from_engine(err: &EngineError) -> Self {
        let base = Self::new(err.to_string()).with_context(format!("kind: {}", err.kind()));
        match err.kind() {
            ErrorKind::PhaseViolation => base.with_suggestions([
                "TRY: Check where the item is: lineflow history --serial <SERIAL> -n 1",
                "TRY: Items in SCRAP must be released by URep before moving on",
            ]),
            ErrorKind::PermissionDenied => base.with_suggestion(
                "TRY: Run the command as a user whose role is allowed this move (--role)",
            ),
            ErrorKind::NotFound => base.with_suggestions([
                "TRY: Register the item first: lineflow reconcile <FILE> --op create",
                "TRY: Check the serial for typos",
            ]),
            ErrorKind::CatalogIncomplete => base.with_suggestion("TRY: Seed the catalogs: lineflow seed"),
            ErrorKind::Conflict => {
                base.with_suggestion("TRY: Another user changed this item; run the command again")
            }
            ErrorKind::StoreFailure | ErrorKind::Timeout => base.with_suggestions([
                "TRY: Check that no other process holds the database locked",
                "TRY: Re-run with -v and check ~/.lineflow/logs/lineflow.log",
            ]),
            ErrorKind::Validation | ErrorKind::Cancelled => base,
        }
    }
}

impl From<EngineError> for HelpfulError {
    fn from(err: EngineError) -> Self {
        Self::from_engine(&err)
    }
}

/// Turn an engine result into one that prints with suggestions.
pub fn helpful<T>(result: Result<T, EngineError>) -> anyhow::Result<T> {
    result.map_err(|e| HelpfulError::from(e).into())
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;
    use lineflow_lifecycle::Phase;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_catalog_incomplete_suggests_seed() {
        let err = HelpfulError::from(EngineError::CatalogIncomplete(Phase::Scrap));
        let display = format!("{}", err);
        assert!(display.contains("catalog_incomplete"));
        assert!(display.contains("lineflow seed"));
    }

    #[test]
    fn test_unknown_operation_lists_choices() {
        let display = format!("{}", HelpfulError::unknown_operation("explode"));
        assert!(display.contains("explode"));
        assert!(display.contains("set-phase"));
    }
}
