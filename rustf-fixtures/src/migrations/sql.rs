//! SQL fixture migrations

use super::{MigrationEnvironment, MigrationUnit};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fs;
use std::path::Path;

const DOWN_MARKER: &str = "-- Down";

/// Migration read from a `.sql` file
///
/// Everything before the `-- Down` line is the up script, everything after
/// it the down script. Comment lines are dropped. A file without the marker cannot
/// be rolled back; a marker followed by nothing rolls back as a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    pub name: String,
    pub up_sql: String,
    pub down_sql: Option<String>,
}

impl SqlMigration {
    /// Read and parse a migration file
    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Io(e).with_context(format!(
                "Failed to read migration file {}",
                path.display()
            ))
        })?;
        Ok(Self::parse(name, &content))
    }

    pub fn parse(name: impl Into<String>, content: &str) -> Self {
        let mut up_lines = Vec::new();
        let mut down_lines: Option<Vec<&str>> = None;

        for line in content.lines() {
            if let Some(down) = down_lines.as_mut() {
                down.push(line);
            } else if line.trim() == DOWN_MARKER {
                down_lines = Some(Vec::new());
            } else {
                up_lines.push(line);
            }
        }

        Self {
            name: name.into(),
            up_sql: strip_comments(&up_lines),
            down_sql: down_lines.map(|lines| strip_comments(&lines)),
        }
    }

    async fn run_script(&self, env: &MigrationEnvironment<'_>, sql: &str) -> Result<()> {
        if sql.is_empty() {
            log::debug!("Migration {} has nothing to execute", self.name);
            return Ok(());
        }

        let sql = env.expand_fixture_references(sql)?;
        let affected = env.execute(&sql).await?;
        log::debug!("Migration {} affected {} rows", self.name, affected);
        Ok(())
    }
}

fn strip_comments(lines: &[&str]) -> String {
    lines
        .iter()
        .copied()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("--") && !trimmed.is_empty()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[async_trait]
impl MigrationUnit for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
        self.run_script(env, &self.up_sql).await
    }

    async fn down(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
        match &self.down_sql {
            Some(sql) => self.run_script(env, sql).await,
            None => Err(Error::IrreversibleMigration(self.name.clone())),
        }
    }
}
