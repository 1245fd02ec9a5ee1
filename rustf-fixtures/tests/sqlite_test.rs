mod common;

use common::*;
use rustf_fixtures::{
    MigrationContext, MigrationOutcome, MigrationRegistry, RecordStore, SqliteStore,
    VersionLedger, VersionState,
};
use serde_yaml::Value;

const SCHEMA: &str = r#"
CREATE TABLE levels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(255),
    difficulty VARCHAR(255),
    unlocked BOOLEAN DEFAULT 0,
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL
);
CREATE TABLE character_turtles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(255),
    type VARCHAR(255),
    level_id INTEGER
);
CREATE TABLE character_mushrooms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(255),
    level_id INTEGER
);
CREATE TABLE weaponizable_weapons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(255),
    weaponizable_type VARCHAR(255),
    weaponizable_id INTEGER
);
PRAGMA user_version = 7;
"#;

const ADD_RAPHAEL: &str = "\
-- Up
-- Raphael joins on the hardest level
INSERT INTO character_turtles (name, type, level_id)
VALUES ('Raphael', 'Character::Turtle::Ninja', {{levels.hard}});
UPDATE levels SET unlocked = 1 WHERE id = {{ levels.hard }};

-- Down
DELETE FROM character_turtles WHERE name = 'Raphael';
UPDATE levels SET unlocked = 0 WHERE id = {{levels.hard}};
";

async fn sqlite_store() -> SqliteStore {
    SqliteStore::open(models(), SCHEMA).await.unwrap()
}

#[tokio::test]
async fn test_sql_migration_round_trip() {
    let project = TestProject::new();
    project.add_migration("20240505000000_add_raphael.sql", ADD_RAPHAEL);
    let store = sqlite_store().await;
    let registry = MigrationRegistry::new();

    let context = MigrationContext::with_configuration(
        project.layout.clone(),
        default_config(),
        &store,
        &registry,
    )
    .await
    .unwrap();
    assert_eq!(context.schema_version(), 7);

    let outcome = context.migrate().await.unwrap();
    assert_eq!(outcome.report().unwrap().migrated, vec![20240505000000]);

    let turtles = project.fixture_yaml("character/turtles.yml");
    let turtle_labels = labels(&turtles);
    assert_eq!(turtle_labels.len(), 2);
    let raphael = turtle_labels
        .iter()
        .find(|label| attribute(&turtles, label, "name") == "Raphael")
        .unwrap();
    assert_eq!(attribute(&turtles, raphael, "level"), "hard");
    assert_eq!(
        attribute(&turtles, raphael, "type"),
        "Character::Turtle::Ninja"
    );

    let levels = project.fixture_yaml("levels.yml");
    assert_eq!(attribute(&levels, "hard", "unlocked"), &Value::Bool(true));
    assert_eq!(attribute(&levels, "easy", "unlocked"), &Value::Bool(true));

    let ledger = VersionLedger::new(project.layout.ledger_path());
    assert_eq!(ledger.load().unwrap(), VersionState::new(20240505000000, 7));

    let context = MigrationContext::with_configuration(
        project.layout.clone(),
        default_config(),
        &store,
        &registry,
    )
    .await
    .unwrap();
    let outcome = context.rollback().await.unwrap();
    assert!(matches!(outcome, MigrationOutcome::Migrated(_)));

    let turtles = project.fixture_yaml("character/turtles.yml");
    assert_eq!(labels(&turtles), vec!["leonardo"]);
    let levels = project.fixture_yaml("levels.yml");
    assert_eq!(attribute(&levels, "hard", "unlocked"), &Value::Bool(false));
    assert_eq!(ledger.load().unwrap(), VersionState::new(0, 7));
}

#[tokio::test]
async fn test_fixture_ids_are_stable_in_sqlite() {
    let project = TestProject::new();
    let store = sqlite_store().await;
    let loaded = rustf_fixtures::fixtures::FixtureLoader::new(store.models())
        .load(&store, &[project.fixtures_dir()])
        .await
        .unwrap();

    let easy = loaded.accessors["levels"].id("easy").unwrap();
    assert_eq!(easy, rustf_fixtures::identify("easy"));

    let leonardo_id = loaded.accessors["character_turtles"].id("leonardo").unwrap();
    let leonardo = store
        .find("character_turtles", leonardo_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(leonardo.get_i64("level_id"), Some(easy));

    let katana_id = loaded.accessors["weaponizable_weapons"].id("katana").unwrap();
    let katana = store
        .find("weaponizable_weapons", katana_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(katana.get_i64("weaponizable_id"), Some(leonardo_id));
    assert_eq!(
        katana.get_str("weaponizable_type").as_deref(),
        Some("Character::Turtle::Ninja")
    );
}

#[tokio::test]
async fn test_unknown_fixture_reference_in_sql_fails() {
    let project = TestProject::new();
    project.add_migration(
        "20240606000000_add_bowser.sql",
        "INSERT INTO character_mushrooms (name, level_id) VALUES ('Bowser', {{levels.castle}});\n",
    );
    let store = sqlite_store().await;
    let registry = MigrationRegistry::new();

    let context = MigrationContext::with_configuration(
        project.layout.clone(),
        default_config(),
        &store,
        &registry,
    )
    .await
    .unwrap();
    let err = context.migrate().await.unwrap_err();
    assert_eq!(err.error_code(), "E_UNKNOWN_FIXTURE");
    assert_eq!(project.read_fixture("character/mushrooms.yml"), MUSHROOMS);
}
