// tests/integration_test.rs

//! Integration tests for pkgsys
//!
//! These tests drive the package system end to end over the SQLite backend,
//! with repositories loaded from local metadata directories.

use pkgsys::db::models::{Changeset, ChangesetStatus, Trove};
use pkgsys::lock::SystemLock;
use pkgsys::runtime::REBOOT_MARKER;
use pkgsys::{
    FileLock, InstallStage, PackageSystem, ScriptedConfirmer, SolverService, SqliteBackend,
    SystemConfig, SystemRuntime, db, repository,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

const METADATA: &str = r#"{
    "name": "main",
    "version": "1",
    "packages": [
        {"name": "foo", "version": "1.0", "requires": ["libfoo"], "recommends": ["foo-doc"],
         "update_message": "Run foo-setup once"},
        {"name": "libfoo", "version": "1.0"},
        {"name": "foo-doc", "version": "1.0"},
        {"name": "broken", "version": "1.0", "requires": ["libmissing"]},
        {"name": "eula-tool", "version": "2.0", "license": "You agree to everything."},
        {"name": "kernel-default", "version": "6.1"}
    ]
}"#;

type ScriptedSystem = PackageSystem<SqliteBackend, ScriptedConfirmer>;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    db_path: PathBuf,
    lock_path: PathBuf,
}

impl Fixture {
    fn new(with_repository: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        let repo_dir = dir.path().join("repo");
        let db_path = dir.path().join("db/pkgsys.db");
        let lock_path = dir.path().join("pkgsys.lock");

        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&repo_dir).unwrap();
        fs::write(repo_dir.join(repository::METADATA_FILE), METADATA).unwrap();

        db::init(&db_path).unwrap();
        if with_repository {
            let conn = db::open(&db_path).unwrap();
            let url = repo_dir.display().to_string();
            repository::add_repository(&conn, "main".to_string(), url, true, 0).unwrap();
        }

        Self {
            _dir: dir,
            root,
            db_path,
            lock_path,
        }
    }

    fn config(&self) -> SystemConfig {
        SystemConfig::new(self.root.clone(), self.db_path.clone())
            .with_lock_path(self.lock_path.clone())
    }

    fn system(&self, confirmer: ScriptedConfirmer) -> ScriptedSystem {
        self.system_with(self.config(), confirmer)
    }

    fn system_with(&self, config: SystemConfig, confirmer: ScriptedConfirmer) -> ScriptedSystem {
        let backend = SqliteBackend::open(&self.db_path).unwrap();
        let lock = FileLock::new(self.lock_path.clone());
        let runtime = SystemRuntime::new(self.root.clone());
        PackageSystem::new(config, backend, confirmer, lock, runtime)
    }

    fn installed_names(&self) -> Vec<String> {
        let conn = db::open(&self.db_path).unwrap();
        Trove::list_all(&conn).unwrap().into_iter().map(|t| t.name).collect()
    }
}

#[test]
fn test_database_lifecycle() {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap().to_string();

    // Remove the temp file so init can create it
    drop(temp_file);

    assert!(db::init(&db_path).is_ok(), "Database initialization should succeed");
    assert!(Path::new(&db_path).exists(), "Database file should exist after initialization");

    let conn = db::open(&db_path).expect("Opening database should succeed");
    let result: Result<i32, _> = conn.query_row("SELECT 1", [], |row| row.get(0));
    assert_eq!(result.unwrap(), 1, "Should be able to execute queries");
}

#[test]
fn test_database_init_creates_parent_directories() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("nested/path/to/pkgsys.db");

    assert!(db::init(&db_path).is_ok(), "Should create parent directories");
    assert!(db_path.exists(), "Database should exist in nested path");
}

#[test]
fn test_install_pulls_requirements_and_recommendations() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(system.install("foo"));
    assert!(!system.last_operation_canceled());
    assert_eq!(
        fixture.installed_names(),
        vec!["foo".to_string(), "foo-doc".to_string(), "libfoo".to_string()]
    );

    // Overrides applied during the transaction are gone afterwards
    assert!(system.backend().flags().is_empty());

    let conn = db::open(&fixture.db_path).unwrap();
    let history = Changeset::list_all(&conn).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ChangesetStatus::Applied);
}

#[test]
fn test_installed_and_available_queries() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(!system.installed("libfoo"));
    assert!(system.package_available("libfoo"));
    assert!(system.packages_available(&["foo".to_string(), "libfoo".to_string()]));
    assert!(!system.package_available("ghost"));

    assert!(system.install("libfoo"));
    assert!(system.package_installed("libfoo"));
    assert!(!system.packages_installed(&["libfoo".to_string(), "foo".to_string()]));
}

#[test]
fn test_declined_license_cancels_without_installing() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(!system.install_all(["eula-tool", "libfoo"]));
    assert!(system.last_operation_canceled());
    assert!(fixture.installed_names().is_empty());
    assert!(system.backend().flags().is_empty());
}

#[test]
fn test_accepted_license_installs() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::accept_all());

    assert!(system.install("eula-tool"));
    assert!(!system.last_operation_canceled());
    assert_eq!(fixture.installed_names(), vec!["eula-tool".to_string()]);
}

#[test]
fn test_unresolvable_request_fails_and_leaves_system_untouched() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(!system.install("broken"));
    assert!(!system.last_operation_canceled());
    assert!(fixture.installed_names().is_empty());

    assert!(!system.install("ghost"));
    assert!(fixture.installed_names().is_empty());

    // Selection was reset, a later request is unaffected
    assert!(system.install("libfoo"));
    assert_eq!(fixture.installed_names(), vec!["libfoo".to_string()]);
}

#[test]
fn test_remove_respects_installed_requirements() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(system.install("foo"));
    assert!(!system.remove("libfoo"));
    assert!(fixture.installed_names().contains(&"libfoo".to_string()));

    assert!(system.remove_all(["foo", "libfoo", "foo-doc"]));
    assert!(fixture.installed_names().is_empty());
}

#[test]
fn test_install_and_remove_in_one_transaction() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(system.install("libfoo"));
    assert!(system.install_and_remove(["kernel-default"], ["libfoo"]));
    assert_eq!(fixture.installed_names(), vec!["kernel-default".to_string()]);

    // Same name on both sides is rejected outright
    assert!(!system.install_and_remove(["libfoo"], ["libfoo"]));
}

#[test]
fn test_kernel_install_requests_reboot() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(system.install("kernel-default"));

    let marker = fs::read_to_string(fixture.root.join(REBOOT_MARKER)).unwrap();
    assert_eq!(marker.trim(), "kernel-default");
}

#[test]
fn test_initial_stage_does_not_announce_kernel_change() {
    let fixture = Fixture::new(true);
    let config = fixture
        .config()
        .with_stage(InstallStage::Initial)
        .with_target_mounted(false);
    let mut system = fixture.system_with(config, ScriptedConfirmer::default());

    assert!(system.install("kernel-default"));
    assert!(!fixture.root.join(REBOOT_MARKER).exists());
}

#[test]
fn test_without_repositories_nothing_is_available() {
    let fixture = Fixture::new(false);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(system.ensure_source_init());
    assert!(!system.package_available("foo"));
    assert!(!system.install("foo"));
    assert!(fixture.installed_names().is_empty());
}

#[test]
fn test_lock_held_by_another_holder_fails_transaction() {
    let fixture = Fixture::new(true);
    let _held = SystemLock::try_acquire(&fixture.lock_path).unwrap().unwrap();

    let mut system = fixture.system(ScriptedConfirmer::default());
    assert!(!system.install("libfoo"));
    assert!(!system.last_operation_canceled());
    assert!(fixture.installed_names().is_empty());
}

#[test]
fn test_check_and_install_only_installs_missing() {
    let fixture = Fixture::new(true);
    let mut system = fixture.system(ScriptedConfirmer::default());

    assert!(system.install("libfoo"));
    assert!(system.check_and_install_packages(&["libfoo".to_string(), "foo-doc".to_string()]));
    assert_eq!(
        fixture.installed_names(),
        vec!["foo-doc".to_string(), "libfoo".to_string()]
    );

    let conn = db::open(&fixture.db_path).unwrap();
    let history = Changeset::list_all(&conn).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].description.contains("foo-doc"));
    assert!(!history[0].description.contains("libfoo"));

    // Everything present: no new transaction
    assert!(system.check_and_install_packages(&["libfoo".to_string()]));
    assert_eq!(Changeset::list_all(&conn).unwrap().len(), 2);
}

#[test]
fn test_interactive_check_respects_refusal() {
    let fixture = Fixture::new(true);
    let confirmer = ScriptedConfirmer {
        install_missing: false,
        ..ScriptedConfirmer::default()
    };
    let mut system = fixture.system(confirmer);

    assert!(!system.check_and_install_packages_interactive(&["libfoo".to_string()]));
    assert!(fixture.installed_names().is_empty());
}
