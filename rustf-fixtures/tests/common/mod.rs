//! Shared game-world project used by the integration tests
#![allow(dead_code)]

use rustf_fixtures::store::Row;
use rustf_fixtures::{
    async_trait, Configuration, MemoryStore, MigrationEnvironment, MigrationUnit, ModelCatalog,
    ProjectLayout, RecordStore, Result,
};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const MODELS: &str = r#"
Level:
  table: levels
  columns:
    id: integer
    name: string
    difficulty: string
    unlocked: boolean
    created_at: datetime
    updated_at: datetime

Character:
  abstract: true
  belongs_to:
    level: {}

Character::Turtle:
  parent: Character
  table: character_turtles
  columns:
    id: integer
    name: string
    type: string
    level_id: integer

Character::Turtle::Ninja:
  parent: Character::Turtle

Character::Mushroom:
  parent: Character
  table: character_mushrooms
  columns:
    id: integer
    name: string
    level_id: integer

Weaponizable::Weapon:
  table: weaponizable_weapons
  columns:
    id: integer
    name: string
    weaponizable_type: string
    weaponizable_id: integer
  belongs_to:
    weaponizable:
      polymorphic: true
"#;

pub const LEVELS: &str = "\
easy:
  name: Initial
  difficulty: easy
  unlocked: true

hard:
  name: Final Boss
  difficulty: hard
  unlocked: false
";

pub const TURTLES: &str = "\
leonardo:
  name: Leonardo
  type: Character::Turtle::Ninja
  level: easy
";

pub const MUSHROOMS: &str = "\
toad:
  name: Toad
  level: hard
";

pub const WEAPONS: &str = "\
katana:
  name: Katana
  weaponizable: leonardo (Character::Turtle::Ninja)

spores:
  name: Spores
  weaponizable: toad (Character::Mushroom)
";

/// A project in a temporary directory with the game-world fixtures in place
pub struct TestProject {
    pub temp: TempDir,
    pub layout: ProjectLayout,
}

impl TestProject {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path());
        fs::create_dir_all(layout.migrations_dir()).unwrap();

        let project = Self { temp, layout };
        project.write_fixture("levels.yml", LEVELS);
        project.write_fixture("character/turtles.yml", TURTLES);
        project.write_fixture("character/mushrooms.yml", MUSHROOMS);
        project.write_fixture("weaponizable/weapons.yml", WEAPONS);
        project
    }

    pub fn fixtures_dir(&self) -> PathBuf {
        self.layout.default_fixtures_dir()
    }

    pub fn write_fixture(&self, relative: &str, contents: &str) {
        write_file(&self.fixtures_dir().join(relative), contents);
    }

    pub fn read_fixture(&self, relative: &str) -> String {
        fs::read_to_string(self.fixtures_dir().join(relative)).unwrap()
    }

    /// Fixture file parsed back into YAML
    pub fn fixture_yaml(&self, relative: &str) -> Value {
        serde_yaml::from_str(&self.read_fixture(relative)).unwrap()
    }

    /// Add a migration file and return its path
    pub fn add_migration(&self, filename: &str, contents: &str) -> PathBuf {
        let path = self.layout.migrations_dir().join(filename);
        write_file(&path, contents);
        path
    }

    pub fn write_config(&self, contents: &str) {
        write_file(&self.layout.config_path(), contents);
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

pub fn models() -> ModelCatalog {
    ModelCatalog::from_yaml_str(MODELS).unwrap()
}

pub fn memory_store(schema_version: i64) -> MemoryStore {
    MemoryStore::new(models(), schema_version).with_name("game")
}

pub fn default_config() -> Configuration {
    Configuration::default()
}

/// Labels of a fixture file in file order
pub fn labels(yaml: &Value) -> Vec<String> {
    yaml.as_mapping()
        .map(|m| {
            m.keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn attribute<'a>(yaml: &'a Value, label: &str, attribute: &str) -> &'a Value {
    &yaml[label][attribute]
}

/// Adds a fresh mushroom on the hard level
pub struct AddMushroom;

#[async_trait]
impl MigrationUnit for AddMushroom {
    async fn up(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
        let level = env.fixture_id("levels", "hard")?;
        let mut row = Row::new();
        row.insert("name".into(), "Goomba".into());
        row.insert("level_id".into(), level.into());
        env.store().insert("character_mushrooms", row).await?;
        Ok(())
    }

    async fn down(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
        let store = env.store();
        for record in store.all("character_mushrooms").await? {
            if record.get_str("name").as_deref() == Some("Goomba") {
                store.delete("character_mushrooms", record.id).await?;
            }
        }
        Ok(())
    }
}

/// Unlocks every level; cannot be undone
pub struct UnlockLevels;

#[async_trait]
impl MigrationUnit for UnlockLevels {
    async fn up(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
        let store = env.store();
        for record in store.all("levels").await? {
            let mut changes = Row::new();
            changes.insert("unlocked".into(), true.into());
            store.update("levels", record.id, changes).await?;
        }
        Ok(())
    }
}

/// Fails halfway through
pub struct BrokenMigration;

#[async_trait]
impl MigrationUnit for BrokenMigration {
    async fn up(&self, env: &MigrationEnvironment<'_>) -> Result<()> {
        env.fixture_id("levels", "missing")?;
        Ok(())
    }
}
