mod common;

use common::*;
use rustf_fixtures::{
    Configuration, Error, MemoryStore, MigrationContext, MigrationOutcome, MigrationRegistry,
    ModelCatalog, VersionLedger, VersionState,
};
use serde_yaml::Value;
use std::fs;
use std::path::PathBuf;

const ADD_MUSHROOM: &str = "20240101000000_add_mushroom.rs";
const UNLOCK_LEVELS: &str = "20240202000000_unlock_levels.rs";

fn registry() -> MigrationRegistry {
    MigrationRegistry::new()
        .with("AddMushroom", || AddMushroom)
        .with("UnlockLevels", || UnlockLevels)
        .with("BrokenMigration", || BrokenMigration)
}

async fn migrate(
    project: &TestProject,
    config: Configuration,
    schema_version: i64,
) -> rustf_fixtures::Result<MigrationOutcome> {
    let store = memory_store(schema_version);
    let registry = registry();
    let context =
        MigrationContext::with_configuration(project.layout.clone(), config, &store, &registry)
            .await?;
    context.migrate().await
}

async fn rollback(
    project: &TestProject,
    schema_version: i64,
) -> rustf_fixtures::Result<MigrationOutcome> {
    let store = memory_store(schema_version);
    let registry = registry();
    let context = MigrationContext::with_configuration(
        project.layout.clone(),
        default_config(),
        &store,
        &registry,
    )
    .await?;
    context.rollback().await
}

fn ledger_state(project: &TestProject) -> VersionState {
    VersionLedger::new(project.layout.ledger_path())
        .load()
        .unwrap()
}

fn fixture_files(project: &TestProject) -> Vec<(PathBuf, String)> {
    let mut files: Vec<(PathBuf, String)> = walkdir::WalkDir::new(project.fixtures_dir())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), fs::read_to_string(e.path()).unwrap()))
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_migrate_applies_pending_migration_and_records_version() {
    let project = TestProject::new();
    project.add_migration(ADD_MUSHROOM, "// AddMushroom\n");

    let outcome = migrate(&project, default_config(), 3).await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.migrated, vec![20240101000000]);
    assert_eq!(report.loaded_fixtures, 6);
    assert_eq!(report.written_fixtures, 7);
    assert!(report.promoted);
    assert_eq!(report.output_dir, project.fixtures_dir());

    let mushrooms = project.fixture_yaml("character/mushrooms.yml");
    let mushroom_labels = labels(&mushrooms);
    assert_eq!(mushroom_labels.len(), 2);
    assert!(mushroom_labels[0].starts_with("character_mushrooms_"));
    assert_eq!(mushroom_labels[1], "toad");
    assert_eq!(attribute(&mushrooms, &mushroom_labels[0], "name"), "Goomba");
    assert_eq!(attribute(&mushrooms, &mushroom_labels[0], "level"), "hard");

    assert_eq!(ledger_state(&project), VersionState::new(20240101000000, 3));

    let again = migrate(&project, default_config(), 3).await.unwrap();
    assert_eq!(again, MigrationOutcome::NothingPending);
    assert_eq!(again.message(), "No fixture migrations pending.");
}

#[tokio::test]
async fn test_migrations_run_in_version_order() {
    let project = TestProject::new();
    project.add_migration(UNLOCK_LEVELS, "");
    project.add_migration(ADD_MUSHROOM, "");

    let outcome = migrate(&project, default_config(), 0).await.unwrap();
    assert_eq!(
        outcome.report().unwrap().migrated,
        vec![20240101000000, 20240202000000]
    );

    let levels = project.fixture_yaml("levels.yml");
    assert_eq!(attribute(&levels, "hard", "unlocked"), &Value::Bool(true));
    assert_eq!(ledger_state(&project).version, 20240202000000);
}

#[tokio::test]
async fn test_regeneration_is_idempotent() {
    let project = TestProject::new();

    // Schema drift alone forces a run
    migrate(&project, default_config(), 1).await.unwrap();
    let first = fixture_files(&project);
    migrate(&project, default_config(), 2).await.unwrap();
    let second = fixture_files(&project);

    assert_eq!(first, second);
    assert_eq!(ledger_state(&project), VersionState::new(0, 2));
}

#[tokio::test]
async fn test_references_are_written_as_labels() {
    let project = TestProject::new();
    migrate(&project, default_config(), 1).await.unwrap();

    let turtles = project.fixture_yaml("character/turtles.yml");
    assert_eq!(attribute(&turtles, "leonardo", "level"), "easy");
    assert_eq!(
        attribute(&turtles, "leonardo", "type"),
        "Character::Turtle::Ninja"
    );
    let leonardo = turtles["leonardo"].as_mapping().unwrap();
    assert!(!leonardo.contains_key("id"));
    assert!(!leonardo.contains_key("level_id"));

    let weapons = project.fixture_yaml("weaponizable/weapons.yml");
    assert_eq!(
        attribute(&weapons, "katana", "weaponizable"),
        "leonardo (Character::Turtle::Ninja)"
    );
    assert_eq!(
        attribute(&weapons, "spores", "weaponizable"),
        "toad (Character::Mushroom)"
    );
    let katana = weapons["katana"].as_mapping().unwrap();
    assert!(!katana.contains_key("weaponizable_type"));
    assert!(!katana.contains_key("weaponizable_id"));

    let levels = project.fixture_yaml("levels.yml");
    let easy = levels["easy"].as_mapping().unwrap();
    assert!(!easy.contains_key("created_at"));
    assert!(!easy.contains_key("updated_at"));
}

#[tokio::test]
async fn test_label_template_applies_to_new_records_only() {
    let project = TestProject::new();
    project.add_migration(ADD_MUSHROOM, "");
    let config = default_config().with_label("character_mushrooms", "%{name}");

    migrate(&project, config, 0).await.unwrap();

    let mushrooms = project.fixture_yaml("character/mushrooms.yml");
    assert_eq!(labels(&mushrooms), vec!["goomba", "toad"]);
}

#[tokio::test]
async fn test_rename_relabels_every_record_and_its_references() {
    let project = TestProject::new();
    let config = default_config()
        .with_label("levels", "%{difficulty} %{name}")
        .with_rename(true);

    let outcome = migrate(&project, config, 0).await.unwrap();
    assert!(outcome.report().unwrap().migrated.is_empty());

    let levels = project.fixture_yaml("levels.yml");
    assert_eq!(labels(&levels), vec!["easy_initial", "hard_final_boss"]);

    // No template for turtles, so they fall back to table_id labels
    let turtles = project.fixture_yaml("character/turtles.yml");
    let turtle_labels = labels(&turtles);
    assert!(turtle_labels[0].starts_with("character_turtles_"));
    assert_eq!(attribute(&turtles, &turtle_labels[0], "level"), "easy_initial");
}

#[tokio::test]
async fn test_ignored_tables_are_not_written() {
    let project = TestProject::new();
    let config = default_config().with_ignored("weaponizable_weapons");

    migrate(&project, config, 1).await.unwrap();

    assert!(!project.fixtures_dir().join("weaponizable/weapons.yml").exists());
    assert!(project.fixtures_dir().join("levels.yml").exists());
}

#[tokio::test]
async fn test_overwrite_disabled_leaves_live_fixtures_alone() {
    let project = TestProject::new();
    project.add_migration(ADD_MUSHROOM, "");
    let config = default_config().with_overwrite(false);

    let outcome = migrate(&project, config, 0).await.unwrap();
    let report = outcome.report().unwrap();

    assert!(!report.promoted);
    assert_eq!(report.output_dir, project.layout.scratch_dir());
    assert!(project
        .layout
        .scratch_dir()
        .join("character/mushrooms.yml")
        .exists());
    assert_eq!(project.read_fixture("character/mushrooms.yml"), MUSHROOMS);
    assert_eq!(ledger_state(&project), VersionState::default());
}

#[tokio::test]
async fn test_overwrite_refuses_several_fixture_sources() {
    let project = TestProject::new();
    write_file(
        &project.root().join("spec/fixtures/levels.yml"),
        "medium:\n  name: Middle\n",
    );
    let mut config = default_config();
    config.fixture_paths = vec![PathBuf::from("tests/fixtures"), PathBuf::from("spec/fixtures")];

    let err = migrate(&project, config, 1).await.unwrap_err();
    assert!(matches!(err, Error::AmbiguousFixtureSource(ref dirs) if dirs.len() == 2));
    assert_eq!(project.read_fixture("levels.yml"), LEVELS);
}

#[tokio::test]
async fn test_promotes_into_the_directory_holding_the_fixtures() {
    let project = TestProject::new();
    let spec_fixtures = project.root().join("spec/fixtures");
    fs::create_dir_all(spec_fixtures.parent().unwrap()).unwrap();
    fs::rename(project.fixtures_dir(), &spec_fixtures).unwrap();
    fs::create_dir_all(project.fixtures_dir()).unwrap();

    let config = || {
        let mut config = default_config();
        config.fixture_paths = vec![PathBuf::from("tests/fixtures"), PathBuf::from("spec/fixtures")];
        config
    };

    let outcome = migrate(&project, config(), 1).await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.output_dir, spec_fixtures);
    assert_eq!(report.loaded_fixtures, 6);
    assert!(spec_fixtures.join("levels.yml").exists());
    assert!(!project.fixtures_dir().join("levels.yml").exists());

    // Still a single source, so the next run goes through
    let again = migrate(&project, config(), 2).await.unwrap();
    assert_eq!(again.report().unwrap().output_dir, spec_fixtures);
}

#[tokio::test]
async fn test_irregular_table_names_keep_their_fixture_file() {
    let project = TestProject::new();
    project.write_fixture("people.yml", "alice:\n  name: Alice\n");
    let catalog = ModelCatalog::from_yaml_str(&format!(
        "{}\nPerson:\n  table: people\n  columns:\n    id: integer\n    name: string\n",
        MODELS
    ))
    .unwrap();
    let store = MemoryStore::new(catalog, 1);
    let registry = registry();
    let context = MigrationContext::with_configuration(
        project.layout.clone(),
        default_config(),
        &store,
        &registry,
    )
    .await
    .unwrap();

    let outcome = context.migrate().await.unwrap();
    assert_eq!(outcome.report().unwrap().loaded_fixtures, 7);

    let people = project.fixture_yaml("people.yml");
    assert_eq!(labels(&people), vec!["alice"]);
    assert_eq!(attribute(&people, "alice", "name"), "Alice");
    assert!(!project.fixtures_dir().join("persons.yml").exists());
}

#[tokio::test]
async fn test_failed_migration_changes_nothing() {
    let project = TestProject::new();
    project.add_migration(ADD_MUSHROOM, "");
    project.add_migration("20240303000000_broken_migration.rs", "");

    let err = migrate(&project, default_config(), 0).await.unwrap_err();
    assert_eq!(err.error_code(), "E_UNKNOWN_FIXTURE");

    assert_eq!(project.read_fixture("character/mushrooms.yml"), MUSHROOMS);
    assert!(!project.layout.ledger_path().exists());
}

#[tokio::test]
async fn test_unregistered_rust_migration_fails_to_load() {
    let project = TestProject::new();
    project.add_migration("20240404000000_spawn_bowser.rs", "");

    let err = migrate(&project, default_config(), 0).await.unwrap_err();
    assert!(matches!(
        err,
        Error::MigrationLoad { ref name, version: 20240404000000, .. } if name == "SpawnBowser"
    ));
}

#[tokio::test]
async fn test_rollback_reverts_last_migration() {
    let project = TestProject::new();
    project.add_migration(ADD_MUSHROOM, "");
    migrate(&project, default_config(), 0).await.unwrap();
    assert_eq!(
        labels(&project.fixture_yaml("character/mushrooms.yml")).len(),
        2
    );

    let outcome = rollback(&project, 0).await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.migrated, vec![20240101000000]);
    assert_eq!(report.target_version, 0);

    let mushrooms = project.fixture_yaml("character/mushrooms.yml");
    assert_eq!(labels(&mushrooms), vec!["toad"]);
    assert_eq!(ledger_state(&project).version, 0);

    let nothing = rollback(&project, 0).await.unwrap();
    assert_eq!(nothing, MigrationOutcome::NothingToRollback);
    assert_eq!(nothing.message(), "No migration to rollback.");
}

#[tokio::test]
async fn test_irreversible_migration_cannot_roll_back() {
    let project = TestProject::new();
    project.add_migration(UNLOCK_LEVELS, "");
    migrate(&project, default_config(), 0).await.unwrap();

    let err = rollback(&project, 0).await.unwrap_err();
    assert!(matches!(err, Error::IrreversibleMigration(_)));
    assert_eq!(ledger_state(&project).version, 20240202000000);
}

#[tokio::test]
async fn test_attachments_survive_promotion() {
    let project = TestProject::new();
    let avatar = project.fixtures_dir().join("files/avatar.png");
    fs::create_dir_all(avatar.parent().unwrap()).unwrap();
    fs::write(&avatar, [137u8, 80, 78, 71]).unwrap();

    migrate(&project, default_config(), 1).await.unwrap();

    assert_eq!(fs::read(&avatar).unwrap(), vec![137u8, 80, 78, 71]);
}

#[tokio::test]
async fn test_unknown_fixture_files_are_dropped() {
    let project = TestProject::new();
    project.write_fixture("planets.yml", "mars:\n  name: Mars\n");

    let outcome = migrate(&project, default_config(), 1).await.unwrap();
    assert_eq!(outcome.report().unwrap().loaded_fixtures, 6);
    assert!(!project.fixtures_dir().join("planets.yml").exists());
}
