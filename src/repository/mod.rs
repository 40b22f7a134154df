// src/repository/mod.rs

//! Repository management and metadata loading
//!
//! This module provides functionality for:
//! - Managing configured package repositories
//! - Loading repository metadata from local directories or over HTTP
//! - Keeping the package index in the database in sync

use crate::db;
use crate::db::models::{PackageKind, Repository, RepositoryPackage, encode_name_list};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Name of the index file at the repository root
pub const METADATA_FILE: &str = "metadata.json";

/// Repository metadata format (simple JSON index)
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    pub version: String,
    pub packages: Vec<PackageMetadata>,
}

/// Package metadata in repository index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub patch: bool,
    pub architecture: Option<String>,
    pub description: Option<String>,
    /// License text requiring explicit confirmation
    pub license: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub recommends: Vec<String>,
    pub update_message: Option<String>,
}

/// Where a repository URL points to
#[derive(Debug, Clone, PartialEq, Eq)]
enum MetadataSource {
    Local(PathBuf),
    Remote(String),
}

fn metadata_source(url: &str) -> MetadataSource {
    if url.starts_with("http://") || url.starts_with("https://") {
        let metadata_url = if url.ends_with('/') {
            format!("{}{}", url, METADATA_FILE)
        } else {
            format!("{}/{}", url, METADATA_FILE)
        };
        MetadataSource::Remote(metadata_url)
    } else {
        let path = url.strip_prefix("file://").unwrap_or(url);
        MetadataSource::Local(PathBuf::from(path).join(METADATA_FILE))
    }
}

/// Metadata client with retry support for remote repositories
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Fetch repository metadata from a directory, `file://` or HTTP URL
    pub fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata> {
        match metadata_source(url) {
            MetadataSource::Local(path) => {
                debug!("Reading repository metadata from {}", path.display());
                let content = fs::read_to_string(&path)?;
                serde_json::from_str(&content).map_err(|e| {
                    Error::ParseError(format!("Invalid metadata in {}: {}", path.display(), e))
                })
            }
            MetadataSource::Remote(metadata_url) => self.fetch_remote(&metadata_url),
        }
    }

    fn fetch_remote(&self, metadata_url: &str) -> Result<RepositoryMetadata> {
        info!("Fetching repository metadata from {}", metadata_url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(metadata_url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            metadata_url
                        )));
                    }

                    let metadata: RepositoryMetadata = response.json().map_err(|e| {
                        Error::DownloadError(format!("Failed to parse metadata JSON: {}", e))
                    })?;

                    info!("Fetched metadata for {} packages", metadata.packages.len());
                    return Ok(metadata);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch metadata after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Metadata fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

/// Replace the package index of `repo` with freshly loaded metadata
///
/// The old index stays in place unless the whole new index is written.
pub fn sync_repository(
    conn: &mut Connection,
    client: &RepositoryClient,
    repo: &mut Repository,
) -> Result<usize> {
    info!("Synchronizing repository: {}", repo.name);

    let repo_id = repo
        .id
        .ok_or_else(|| Error::InitError(format!("Repository {} has no ID", repo.name)))?;
    let metadata = client.fetch_metadata(&repo.url)?;

    let mut synced = repo.clone();
    synced.last_sync = Some(current_timestamp());

    let count = db::transaction(conn, |tx| {
        RepositoryPackage::delete_by_repository(tx, repo_id)?;

        let mut count = 0;
        for pkg_meta in metadata.packages {
            let mut repo_pkg = RepositoryPackage::new(repo_id, pkg_meta.name, pkg_meta.version);
            if pkg_meta.patch {
                repo_pkg.kind = PackageKind::Patch;
            }
            repo_pkg.architecture = pkg_meta.architecture;
            repo_pkg.description = pkg_meta.description;
            repo_pkg.license = pkg_meta.license;
            repo_pkg.requires = encode_name_list(&pkg_meta.requires);
            repo_pkg.recommends = encode_name_list(&pkg_meta.recommends);
            repo_pkg.update_message = pkg_meta.update_message;

            repo_pkg.insert(tx)?;
            count += 1;
        }

        synced.update(tx)?;
        Ok(count)
    })?;

    *repo = synced;
    info!("Synchronized {} packages from repository {}", count, repo.name);
    Ok(count)
}

/// Check if repository metadata needs refresh
pub fn needs_sync(repo: &Repository) -> bool {
    match &repo.last_sync {
        None => true,
        Some(last_sync) => match parse_timestamp(last_sync) {
            Ok(last_sync_time) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);

                let age_seconds = now.saturating_sub(last_sync_time);
                age_seconds > repo.metadata_expire as u64
            }
            Err(_) => true,
        },
    }
}

/// Get current timestamp as ISO 8601 string
fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Parse ISO 8601 timestamp to Unix seconds
fn parse_timestamp(timestamp: &str) -> Result<u64> {
    let dt = chrono::DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| Error::ParseError(format!("Invalid timestamp: {}", e)))?;

    Ok(dt.timestamp() as u64)
}

/// Add a new repository to the database
pub fn add_repository(
    conn: &Connection,
    name: String,
    url: String,
    enabled: bool,
    priority: i32,
) -> Result<Repository> {
    if Repository::find_by_name(conn, &name)?.is_some() {
        return Err(Error::ConflictError(format!(
            "Repository '{}' already exists",
            name
        )));
    }

    let mut repo = Repository::new(name, url);
    repo.enabled = enabled;
    repo.priority = priority;

    repo.insert(conn)?;

    info!("Added repository: {} ({})", repo.name, repo.url);
    Ok(repo)
}

/// Remove a repository from the database
pub fn remove_repository(conn: &Connection, name: &str) -> Result<()> {
    let repo = Repository::find_by_name(conn, name)?
        .ok_or_else(|| Error::NotFoundError(format!("Repository '{}' not found", name)))?;

    if let Some(id) = repo.id {
        Repository::delete(conn, id)?;
    }
    info!("Removed repository: {}", name);
    Ok(())
}

/// Enable or disable a repository
pub fn set_repository_enabled(conn: &Connection, name: &str, enabled: bool) -> Result<()> {
    let mut repo = Repository::find_by_name(conn, name)?
        .ok_or_else(|| Error::NotFoundError(format!("Repository '{}' not found", name)))?;

    repo.enabled = enabled;
    repo.update(conn)?;

    info!(
        "Repository '{}' {}",
        name,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::{NamedTempFile, TempDir};

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn write_metadata(dir: &TempDir, json: &str) {
        fs::write(dir.path().join(METADATA_FILE), json).unwrap();
    }

    #[test]
    fn test_metadata_source() {
        assert_eq!(
            metadata_source("https://example.com/repo"),
            MetadataSource::Remote("https://example.com/repo/metadata.json".to_string())
        );
        assert_eq!(
            metadata_source("http://example.com/repo/"),
            MetadataSource::Remote("http://example.com/repo/metadata.json".to_string())
        );
        assert_eq!(
            metadata_source("file:///srv/repo"),
            MetadataSource::Local(PathBuf::from("/srv/repo/metadata.json"))
        );
        assert_eq!(
            metadata_source("/srv/repo"),
            MetadataSource::Local(PathBuf::from("/srv/repo/metadata.json"))
        );
    }

    #[test]
    fn test_add_duplicate_repository() {
        let (_temp, conn) = create_test_db();

        add_repository(&conn, "main".to_string(), "/srv/main".to_string(), true, 10).unwrap();
        let result = add_repository(&conn, "main".to_string(), "/srv/other".to_string(), true, 10);

        assert!(matches!(result, Err(Error::ConflictError(_))));
    }

    #[test]
    fn test_remove_and_toggle_repository() {
        let (_temp, conn) = create_test_db();

        add_repository(&conn, "main".to_string(), "/srv/main".to_string(), true, 0).unwrap();

        set_repository_enabled(&conn, "main", false).unwrap();
        assert!(!Repository::find_by_name(&conn, "main").unwrap().unwrap().enabled);

        remove_repository(&conn, "main").unwrap();
        assert!(Repository::find_by_name(&conn, "main").unwrap().is_none());
        assert!(matches!(
            remove_repository(&conn, "main"),
            Err(Error::NotFoundError(_))
        ));
    }

    #[test]
    fn test_sync_local_repository() {
        let (_temp, mut conn) = create_test_db();
        let dir = TempDir::new().unwrap();
        write_metadata(
            &dir,
            r#"{
                "name": "main",
                "version": "1",
                "packages": [
                    {"name": "foo", "version": "1.0", "requires": ["libfoo"], "license": "EULA"},
                    {"name": "libfoo", "version": "1.0"},
                    {"name": "security-fix", "version": "1", "patch": true}
                ]
            }"#,
        );

        let mut repo = add_repository(
            &conn,
            "main".to_string(),
            dir.path().display().to_string(),
            true,
            0,
        )
        .unwrap();

        let client = RepositoryClient::new().unwrap();
        let count = sync_repository(&mut conn, &client, &mut repo).unwrap();
        assert_eq!(count, 3);
        assert!(!needs_sync(&repo));

        let foo = RepositoryPackage::find_best_enabled(&conn, "foo").unwrap().unwrap();
        assert_eq!(foo.requires_list(), vec!["libfoo".to_string()]);
        assert_eq!(foo.license.as_deref(), Some("EULA"));

        let fix = RepositoryPackage::find_best_enabled(&conn, "security-fix").unwrap().unwrap();
        assert_eq!(fix.kind, PackageKind::Patch);

        // a second sync replaces, not duplicates
        sync_repository(&mut conn, &client, &mut repo).unwrap();
        let packages = RepositoryPackage::find_by_repository(&conn, repo.id.unwrap()).unwrap();
        assert_eq!(packages.len(), 3);
    }

    #[test]
    fn test_failed_sync_keeps_previous_index() {
        let (_temp, mut conn) = create_test_db();
        let dir = TempDir::new().unwrap();
        write_metadata(
            &dir,
            r#"{"name": "main", "version": "1", "packages": [
                {"name": "a", "version": "1"},
                {"name": "b", "version": "1"},
                {"name": "c", "version": "1"}
            ]}"#,
        );

        let mut repo = add_repository(
            &conn,
            "main".to_string(),
            dir.path().display().to_string(),
            true,
            0,
        )
        .unwrap();
        let client = RepositoryClient::new().unwrap();
        sync_repository(&mut conn, &client, &mut repo).unwrap();
        let synced_at = repo.last_sync.clone();

        // duplicate (name, version) violates the unique index halfway through
        write_metadata(
            &dir,
            r#"{"name": "main", "version": "2", "packages": [
                {"name": "a", "version": "1"},
                {"name": "a", "version": "1"}
            ]}"#,
        );
        assert!(sync_repository(&mut conn, &client, &mut repo).is_err());

        let names: Vec<String> = RepositoryPackage::find_by_repository(&conn, repo.id.unwrap())
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(repo.last_sync, synced_at);

        let stored = Repository::find_by_name(&conn, "main").unwrap().unwrap();
        assert_eq!(stored.last_sync, synced_at);
    }

    #[test]
    fn test_sync_missing_metadata_fails() {
        let (_temp, mut conn) = create_test_db();
        let dir = TempDir::new().unwrap();
        let mut repo = add_repository(
            &conn,
            "empty".to_string(),
            dir.path().display().to_string(),
            true,
            0,
        )
        .unwrap();

        let client = RepositoryClient::new().unwrap();
        assert!(sync_repository(&mut conn, &client, &mut repo).is_err());
    }

    #[test]
    fn test_needs_sync() {
        let repo_never_synced = Repository::new("test".to_string(), "url".to_string());
        assert!(needs_sync(&repo_never_synced));

        let mut repo_recently_synced = Repository::new("test".to_string(), "url".to_string());
        repo_recently_synced.last_sync = Some(current_timestamp());
        repo_recently_synced.metadata_expire = 3600;
        assert!(!needs_sync(&repo_recently_synced));
    }
}
