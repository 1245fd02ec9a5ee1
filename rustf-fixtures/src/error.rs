use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fixture migrations
///
/// Every variant is fatal to the current run. Nothing is retried internally;
/// the operator fixes the script, configuration or data and runs again.
#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Illegal name for migration file: {}\n\t(only lower case letters, numbers, and '_' allowed).",
        .0.display()
    )]
    IllegalMigrationName(PathBuf),

    #[error("Duplicate migration version {version}: {} and {}", .first.display(), .second.display())]
    DuplicateMigrationVersion {
        version: i64,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Could not load migration {name} ({version}): {message}")]
    MigrationLoad {
        name: String,
        version: i64,
        message: String,
    },

    #[error("Migration {0} cannot be rolled back")]
    IrreversibleMigration(String),

    #[error("Label '{label}' is repeated in table '{table}'")]
    RepeatedFixtureLabel { table: String, label: String },

    #[error("Table '{table}' is owned by both {first} and {second}")]
    RepeatedTableKey {
        table: String,
        first: String,
        second: String,
    },

    #[error("Label template for '{table}' references missing attribute '{attribute}'")]
    MissingAttribute { table: String, attribute: String },

    #[error("Cannot overwrite fixtures: more than one fixture directory has content ({})", format_paths(.0))]
    AmbiguousFixtureSource(Vec<PathBuf>),

    #[error("Fixture migrations folder not found: {}", .0.display())]
    MissingMigrationsFolder(PathBuf),

    #[error("No test suite folder found: {}", .0.display())]
    MissingSuiteFolder(PathBuf),

    #[error("Unknown fixture: {0}")]
    UnknownFixture(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Broken reference {table}.{association} on record {id}: {message}")]
    BrokenReference {
        table: String,
        association: String,
        id: i64,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Error with context chain
    #[error("{message}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    pub fn migration_load(
        name: impl Into<String>,
        version: i64,
        message: impl Into<String>,
    ) -> Self {
        Self::MigrationLoad {
            name: name.into(),
            version,
            message: message.into(),
        }
    }

    pub fn unknown_fixture(msg: impl Into<String>) -> Self {
        Self::UnknownFixture(msg.into())
    }

    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel(name.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn broken_reference(
        table: impl Into<String>,
        association: impl Into<String>,
        id: i64,
        message: impl Into<String>,
    ) -> Self {
        Self::BrokenReference {
            table: table.into(),
            association: association.into(),
            id,
            message: message.into(),
        }
    }

    // Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::IllegalMigrationName(_) => "E_ILLEGAL_MIGRATION_NAME",
            Error::DuplicateMigrationVersion { .. } => "E_DUPLICATE_MIGRATION_VERSION",
            Error::MigrationLoad { .. } => "E_MIGRATION_LOAD",
            Error::IrreversibleMigration(_) => "E_IRREVERSIBLE_MIGRATION",
            Error::RepeatedFixtureLabel { .. } => "E_REPEATED_FIXTURE_LABEL",
            Error::RepeatedTableKey { .. } => "E_REPEATED_TABLE_KEY",
            Error::MissingAttribute { .. } => "E_MISSING_ATTRIBUTE",
            Error::AmbiguousFixtureSource(_) => "E_AMBIGUOUS_FIXTURE_SOURCE",
            Error::MissingMigrationsFolder(_) => "E_MISSING_MIGRATIONS_FOLDER",
            Error::MissingSuiteFolder(_) => "E_MISSING_SUITE_FOLDER",
            Error::UnknownFixture(_) => "E_UNKNOWN_FIXTURE",
            Error::UnknownModel(_) => "E_UNKNOWN_MODEL",
            Error::BrokenReference { .. } => "E_BROKEN_REFERENCE",
            Error::InvalidConfig(_) => "E_INVALID_CONFIG",
            Error::Database(_) => "E_DATABASE",
            Error::Io(_) => "E_IO",
            Error::Yaml(_) => "E_YAML",
            Error::Json(_) => "E_JSON",
            Error::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error signals corrupt fixture data rather than a bad script or setup
    pub fn is_integrity_violation(&self) -> bool {
        match self {
            Error::RepeatedFixtureLabel { .. }
            | Error::RepeatedTableKey { .. }
            | Error::BrokenReference { .. } => true,
            Error::WithContext { source, .. } => source.is_integrity_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_name_message() {
        let err = Error::IllegalMigrationName(PathBuf::from("20230101_AddTurtle.sql"));
        let message = err.to_string();
        assert!(message.contains("20230101_AddTurtle.sql"));
        assert!(message.contains("only lower case letters"));
    }

    #[test]
    fn test_context_keeps_code() {
        let err = Error::RepeatedFixtureLabel {
            table: "levels".to_string(),
            label: "hard".to_string(),
        }
        .with_context("Building fixture set");

        assert_eq!(err.to_string(), "Building fixture set");
        assert_eq!(err.error_code(), "E_REPEATED_FIXTURE_LABEL");
        assert!(err.is_integrity_violation());
    }
}
