//! End-to-end migration and rollback against a temporary configuration directory

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use aicleaner_config::{
    ConfigError, ConfigLoader, ConfigMigrator, LegacyPaths, LegacySource, MigrationState,
    RestoreStatus, RuntimeSettings, MIGRATION_MARKER,
};
use tempfile::TempDir;

const ROOT_YAML: &str = r#"name: AICleaner
version: "1.9.0"
slug: aicleaner
arch:
  - amd64
  - aarch64
options:
  display_name: A
  mqtt:
    broker_host: core-mosquitto
    broker_port: 1883
"#;

const ADDON_JSON: &str = r#"{
  "display_name": "B",
  "zones": [
    {
      "name": "Kitchen",
      "camera_entity": "camera.kitchen",
      "todo_list_entity": "todo.kitchen",
      "interval_minutes": 30
    }
  ]
}"#;

const ADDON_YAML: &str = r#"zones:
  - name: Kitchen
    interval_minutes: 45
  - name: Office
    camera_entity: camera.office
    todo_list_entity: todo.office
ai_enhancements:
  failure_threshold: 5
providers:
  - id: local
    kind: ollama
    priority: 1
    base_url: http://localhost:11434
"#;

/// Write `content` and backdate its modification time
fn write_aged(path: &Path, content: &str, age_secs: u64) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
}

struct Fixture {
    dir: TempDir,
    paths: LegacyPaths,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = LegacyPaths::new(dir.path());
        Self { dir, paths }
    }

    fn path(&self, source: LegacySource) -> PathBuf {
        self.paths.source(source)
    }

    fn write(&self, source: LegacySource, content: &str, age_secs: u64) {
        write_aged(&self.path(source), content, age_secs);
    }

    fn migrator(&self) -> ConfigMigrator {
        ConfigMigrator::from_settings(&RuntimeSettings::default().with_config_dir(self.dir.path()))
    }

    fn read(&self, path: &Path) -> Vec<u8> {
        std::fs::read(path).unwrap()
    }
}

#[tokio::test]
async fn test_newest_file_wins_display_name() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);

    let result = fixture.migrator().migrate_configuration().await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.state, MigrationState::Written);
    let config = result.unified_config.unwrap();
    assert_eq!(config.options.display_name.as_deref(), Some("B"));
    assert_eq!(config.name, "AICleaner");

    let decision = result
        .decisions
        .iter()
        .rev()
        .find(|d| d.key == "options.display_name")
        .unwrap();
    assert_eq!(decision.source, "aicleaner/config.json");
    assert_eq!(decision.value, "B");
}

#[tokio::test]
async fn test_older_file_loses_even_with_higher_precedence() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);
    fixture.write(LegacySource::AddonYaml, "display_name: C\n", 500);

    let result = fixture.migrator().migrate_configuration().await;

    let config = result.unified_config.unwrap();
    assert_eq!(config.options.display_name.as_deref(), Some("B"));
}

#[tokio::test]
async fn test_three_files_merge_into_unified_file() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 200);
    fixture.write(LegacySource::AddonYaml, ADDON_YAML, 100);

    let migrator = fixture.migrator();
    let result = migrator.migrate_configuration().await;
    assert!(result.success, "{:?}", result.error_message);

    let config = result.unified_config.clone().unwrap();
    let kitchen = config.zone("Kitchen").unwrap();
    assert_eq!(kitchen.camera_entity, "camera.kitchen");
    assert_eq!(kitchen.interval_minutes, Some(45));
    assert!(config.zone("Office").is_some());
    assert_eq!(config.options.ai_enhancements.failure_threshold, 5);
    assert_eq!(config.providers().len(), 1);
    assert_eq!(
        config.options.mqtt.as_ref().unwrap().broker_host.as_deref(),
        Some("core-mosquitto")
    );

    // Legacy files are retired, the unified file replaces the add-on YAML
    for source in [LegacySource::RootYaml, LegacySource::AddonJson] {
        let path = fixture.path(source);
        assert!(!path.exists());
        assert!(aicleaner_config::migration::writer::with_suffix(&path, "old").exists());
    }
    let unified = ConfigLoader::load_unified(&migrator.paths().unified())
        .await
        .unwrap();
    assert_eq!(unified, config);
    assert!(migrator.paths().marker().exists());
    assert_eq!(result.backup.unwrap().entries.len(), 3);
}

#[tokio::test]
async fn test_invalid_merge_leaves_legacy_files_untouched() {
    let fixture = Fixture::new();
    let broken_zones = r#"{
  "zones": [{"name": "Garage", "todo_list_entity": "todo.garage"}]
}"#;
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, broken_zones, 100);
    let before_root = fixture.read(&fixture.path(LegacySource::RootYaml));
    let before_json = fixture.read(&fixture.path(LegacySource::AddonJson));

    let migrator = fixture.migrator();
    let result = migrator.migrate_configuration().await;

    assert!(!result.success);
    assert_eq!(result.state, MigrationState::Failed);
    assert_eq!(result.last_completed, MigrationState::Merged);
    assert!(result
        .error_message
        .unwrap()
        .contains("options.zones[0].camera_entity"));
    assert_eq!(fixture.read(&fixture.path(LegacySource::RootYaml)), before_root);
    assert_eq!(fixture.read(&fixture.path(LegacySource::AddonJson)), before_json);
    assert!(!migrator.paths().unified().exists());
    assert!(!migrator.paths().marker().exists());
}

#[tokio::test]
async fn test_failed_rename_puts_legacy_files_back() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);
    let before_root = fixture.read(&fixture.path(LegacySource::RootYaml));
    let before_json = fixture.read(&fixture.path(LegacySource::AddonJson));

    // A non-empty directory where config.json.old should go blocks the rename
    let blocker = fixture.dir.path().join("aicleaner/config.json.old");
    std::fs::create_dir_all(blocker.join("x")).unwrap();

    let migrator = fixture.migrator();
    let result = migrator.migrate_configuration().await;

    assert!(!result.success);
    assert_eq!(result.state, MigrationState::Failed);
    assert_eq!(result.last_completed, MigrationState::Validated);
    assert_eq!(fixture.read(&fixture.path(LegacySource::RootYaml)), before_root);
    assert_eq!(fixture.read(&fixture.path(LegacySource::AddonJson)), before_json);
    assert!(!fixture.dir.path().join("config.yaml.old").exists());
    assert!(!migrator.paths().unified().exists());
    assert!(!migrator.paths().marker().exists());

    let fallback = migrator.load_legacy_merged().await.unwrap();
    let config = fallback.unified().unwrap();
    assert_eq!(config.name, "AICleaner");
    assert_eq!(config.options.display_name.as_deref(), Some("B"));

    std::fs::remove_dir_all(&blocker).unwrap();
    let retry = fixture.migrator().migrate_configuration().await;
    assert!(retry.success, "{:?}", retry.error_message);
    assert_eq!(
        retry.unified_config.unwrap().options.display_name.as_deref(),
        Some("B")
    );
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);

    let migrator = fixture.migrator();
    assert!(migrator.migrate_configuration().await.success);
    let unified = fixture.read(&migrator.paths().unified());

    let second = fixture.migrator().migrate_configuration().await;
    assert!(second.success);
    assert!(second.already_migrated);
    assert!(second.backup.is_none());
    assert!(second.decisions.is_empty());
    assert_eq!(
        second.unified_config.unwrap().options.display_name.as_deref(),
        Some("B")
    );
    assert_eq!(fixture.read(&migrator.paths().unified()), unified);
}

#[tokio::test]
async fn test_nothing_to_migrate() {
    let fixture = Fixture::new();
    let result = fixture.migrator().migrate_configuration().await;

    assert!(result.success);
    assert!(!result.already_migrated);
    assert!(result.unified_config.is_none());
    assert_eq!(result.warnings, vec!["no legacy configuration found".to_string()]);
}

#[tokio::test]
async fn test_unparseable_file_is_reported_and_skipped() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, "{ \"display_name\": ", 100);

    let result = fixture.migrator().migrate_configuration().await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("aicleaner/config.json ignored"));
    assert_eq!(
        result.unified_config.unwrap().options.display_name.as_deref(),
        Some("A")
    );
}

#[tokio::test]
async fn test_rollback_restores_original_bytes() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 200);
    fixture.write(LegacySource::AddonYaml, ADDON_YAML, 100);
    let originals: Vec<(PathBuf, Vec<u8>)> = LegacySource::all()
        .iter()
        .map(|source| {
            let path = fixture.path(*source);
            let bytes = fixture.read(&path);
            (path, bytes)
        })
        .collect();

    let migrator = fixture.migrator();
    let result = migrator.migrate_configuration().await;
    let backup = result.backup.unwrap();

    // A fresh process finds the backup on disk
    let restorer = fixture.migrator();
    let loaded = restorer.load_backup(&backup.dir).await.unwrap();
    let rollback = restorer.rollback_migration(&loaded).await.unwrap();

    assert!(rollback.success);
    assert!(rollback
        .files
        .iter()
        .all(|f| f.status == RestoreStatus::Restored));
    assert_eq!(rollback.moved_aside, None);
    for (path, bytes) in &originals {
        assert_eq!(&fixture.read(path), bytes);
        assert!(!aicleaner_config::migration::writer::with_suffix(path, "old").exists());
    }
    assert!(!migrator.paths().marker().exists());
    assert_eq!(restorer.state(), MigrationState::RolledBack);
    assert!(backup.dir.join("manifest.json").exists());
}

#[tokio::test]
async fn test_rollback_moves_new_unified_file_aside() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);

    let migrator = fixture.migrator();
    let backup = migrator.migrate_configuration().await.backup.unwrap();
    let rollback = migrator.rollback_migration(&backup).await.unwrap();

    let unified = migrator.paths().unified();
    assert!(!unified.exists());
    let aside = rollback.moved_aside.unwrap();
    assert_eq!(aside, unified.with_file_name("config.yaml.rolled-back"));
    assert!(aside.exists());
    assert_eq!(
        fixture.read(&fixture.path(LegacySource::AddonJson)),
        ADDON_JSON.as_bytes()
    );
}

#[tokio::test]
async fn test_corrupted_backup_is_refused() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);

    let migrator = fixture.migrator();
    let backup = migrator.migrate_configuration().await.backup.unwrap();
    let unified_before = fixture.read(&migrator.paths().unified());
    std::fs::write(backup.copy_path(&backup.entries[0]), "tampered").unwrap();

    let err = migrator.rollback_migration(&backup).await.unwrap_err();

    assert!(matches!(err, ConfigError::RollbackIntegrity { .. }));
    assert!(err.is_fatal());
    // Nothing was touched
    assert_eq!(fixture.read(&migrator.paths().unified()), unified_before);
    assert!(migrator.paths().marker().exists());
    assert!(!fixture.path(LegacySource::RootYaml).exists());
    assert_eq!(migrator.state(), MigrationState::Written);
}

#[tokio::test]
async fn test_rollback_twice_is_rejected() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);

    let migrator = fixture.migrator();
    let backup = migrator.migrate_configuration().await.backup.unwrap();
    migrator.rollback_migration(&backup).await.unwrap();

    let err = migrator.rollback_migration(&backup).await.unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidTransition {
            from: MigrationState::RolledBack,
            to: MigrationState::RolledBack
        }
    ));
}

#[tokio::test]
async fn test_migration_can_run_again_after_rollback() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    fixture.write(LegacySource::AddonJson, ADDON_JSON, 100);

    let migrator = fixture.migrator();
    let backup = migrator.migrate_configuration().await.backup.unwrap();
    migrator.rollback_migration(&backup).await.unwrap();

    // The moved-aside unified file is not a legacy source
    let again = migrator.migrate_configuration().await;
    assert!(again.success, "{:?}", again.error_message);
    assert!(!again.already_migrated);
    assert_eq!(migrator.backups().list_backups().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_custom_unified_path_and_marker_location() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::RootYaml, ROOT_YAML, 300);
    let unified = fixture.dir.path().join("unified").join("aicleaner.yaml");
    let settings = RuntimeSettings::default()
        .with_config_dir(fixture.dir.path())
        .with_unified_path(&unified)
        .with_backup_dir(fixture.dir.path().join("backups"));

    let migrator = ConfigMigrator::from_settings(&settings);
    let result = migrator.migrate_configuration().await;

    assert!(result.success, "{:?}", result.error_message);
    assert!(unified.exists());
    assert!(unified.with_file_name(MIGRATION_MARKER).exists());
    assert!(result
        .backup
        .unwrap()
        .dir
        .starts_with(fixture.dir.path().join("backups")));
}

#[tokio::test]
async fn test_legacy_fallback_without_writing() {
    let fixture = Fixture::new();
    fixture.write(LegacySource::AddonYaml, ADDON_YAML, 100);

    let migrator = fixture.migrator();
    let fallback = migrator.load_legacy_merged().await.unwrap();

    // No manifest keys, so not a valid unified file, but providers still load
    assert!(fallback.unified().is_none());
    let providers = fallback.providers();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].id, "local");
    assert_eq!(fallback.ai_enhancements().failure_threshold, 5);
    assert_eq!(fallback.ai_enhancements().cooldown_secs, 60);
    assert!(fixture.path(LegacySource::AddonYaml).exists());
    assert!(!migrator.paths().marker().exists());
}
