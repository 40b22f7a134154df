// src/db/models.rs

//! Data models for pkgsys database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Kind of installable item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Package,
    Patch,
}

impl PackageKind {
    pub fn as_str(&self) -> &str {
        match self {
            PackageKind::Package => "package",
            PackageKind::Patch => "patch",
        }
    }
}

impl FromStr for PackageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "package" => Ok(PackageKind::Package),
            "patch" => Ok(PackageKind::Patch),
            _ => Err(format!("Invalid package kind: {}", s)),
        }
    }
}

fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

/// Decode a JSON list of names, treating NULL or garbage as empty
pub fn name_list(json: Option<&str>) -> Vec<String> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Encode a list of names as JSON, NULL when empty
pub fn encode_name_list(names: &[String]) -> Option<String> {
    if names.is_empty() {
        None
    } else {
        serde_json::to_string(names).ok()
    }
}

/// An installed package or patch in the target database
#[derive(Debug, Clone)]
pub struct Trove {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub kind: PackageKind,
    pub architecture: Option<String>,
    pub description: Option<String>,
    pub requires: Option<String>,
    pub installed_at: Option<String>,
    pub installed_by_changeset_id: Option<i64>,
}

const TROVE_COLUMNS: &str = "id, name, version, kind, architecture, description, requires, \
     installed_at, installed_by_changeset_id";

impl Trove {
    pub fn new(name: String, version: String, kind: PackageKind) -> Self {
        Self {
            id: None,
            name,
            version,
            kind,
            architecture: None,
            description: None,
            requires: None,
            installed_at: None,
            installed_by_changeset_id: None,
        }
    }

    /// Build the installed record for a repository package
    pub fn from_repository_package(pkg: &RepositoryPackage) -> Self {
        Self {
            id: None,
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            kind: pkg.kind,
            architecture: pkg.architecture.clone(),
            description: pkg.description.clone(),
            requires: pkg.requires.clone(),
            installed_at: None,
            installed_by_changeset_id: None,
        }
    }

    /// Insert this trove, replacing any installed trove of the same name
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute("DELETE FROM troves WHERE name = ?1", [&self.name])?;
        conn.execute(
            "INSERT INTO troves
             (name, version, kind, architecture, description, requires, installed_by_changeset_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.name,
                &self.version,
                self.kind.as_str(),
                &self.architecture,
                &self.description,
                &self.requires,
                &self.installed_by_changeset_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM troves WHERE name = ?1", TROVE_COLUMNS))?;
        let trove = stmt.query_row([name], Self::from_row).optional()?;
        Ok(trove)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM troves ORDER BY name", TROVE_COLUMNS))?;
        let troves = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(troves)
    }

    /// Installed troves whose name contains `pattern`
    pub fn search(conn: &Connection, pattern: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM troves WHERE name LIKE ?1 ORDER BY name",
            TROVE_COLUMNS
        ))?;
        let troves = stmt
            .query_map([format!("%{}%", pattern)], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(troves)
    }

    pub fn delete_by_name(conn: &Connection, name: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM troves WHERE name = ?1", [name])?;
        Ok(deleted > 0)
    }

    pub fn requires_list(&self) -> Vec<String> {
        name_list(self.requires.as_deref())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            kind: parse_column(row, 3)?,
            architecture: row.get(4)?,
            description: row.get(5)?,
            requires: row.get(6)?,
            installed_at: row.get(7)?,
            installed_by_changeset_id: row.get(8)?,
        })
    }
}

/// Changeset status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Applied,
    Failed,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Applied => "applied",
            ChangesetStatus::Failed => "failed",
        }
    }
}

impl FromStr for ChangesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangesetStatus::Pending),
            "applied" => Ok(ChangesetStatus::Applied),
            "failed" => Ok(ChangesetStatus::Failed),
            _ => Err(format!("Invalid changeset status: {}", s)),
        }
    }
}

/// A Changeset records one committed package transaction
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub description: String,
    pub status: ChangesetStatus,
    pub created_at: Option<String>,
    pub applied_at: Option<String>,
}

impl Changeset {
    pub fn new(description: String) -> Self {
        Self {
            id: None,
            description,
            status: ChangesetStatus::Pending,
            created_at: None,
            applied_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (description, status) VALUES (?1, ?2)",
            params![&self.description, self.status.as_str()],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at
             FROM changesets ORDER BY id DESC",
        )?;

        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    pub fn update_status(&mut self, conn: &Connection, new_status: ChangesetStatus) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            crate::error::Error::InitError("Cannot update changeset without ID".to_string())
        })?;

        if new_status == ChangesetStatus::Applied {
            conn.execute(
                "UPDATE changesets SET status = ?1, applied_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;
        } else {
            conn.execute(
                "UPDATE changesets SET status = ?1 WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;
        }

        self.status = new_status;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            status: parse_column(row, 2)?,
            created_at: row.get(3)?,
            applied_at: row.get(4)?,
        })
    }
}

/// Repository represents a package source
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub priority: i32,
    pub metadata_expire: i32,
    pub last_sync: Option<String>,
    pub created_at: Option<String>,
}

const REPOSITORY_COLUMNS: &str =
    "id, name, url, enabled, priority, metadata_expire, last_sync, created_at";

impl Repository {
    pub fn new(name: String, url: String) -> Self {
        Self {
            id: None,
            name,
            url,
            enabled: true,
            priority: 0,
            metadata_expire: 3600, // Default: 1 hour
            last_sync: None,
            created_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories (name, url, enabled, priority, metadata_expire)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.name,
                &self.url,
                self.enabled as i32,
                &self.priority,
                &self.metadata_expire,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repositories WHERE name = ?1",
            REPOSITORY_COLUMNS
        ))?;
        let repo = stmt.query_row([name], Self::from_row).optional()?;
        Ok(repo)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repositories ORDER BY priority DESC, name",
            REPOSITORY_COLUMNS
        ))?;
        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    pub fn list_enabled(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repositories WHERE enabled = 1 ORDER BY priority DESC, name",
            REPOSITORY_COLUMNS
        ))?;
        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            crate::error::Error::InitError("Cannot update repository without ID".to_string())
        })?;

        conn.execute(
            "UPDATE repositories SET name = ?1, url = ?2, enabled = ?3, priority = ?4,
             metadata_expire = ?5, last_sync = ?6 WHERE id = ?7",
            params![
                &self.name,
                &self.url,
                self.enabled as i32,
                &self.priority,
                &self.metadata_expire,
                &self.last_sync,
                id,
            ],
        )?;

        Ok(())
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            url: row.get(2)?,
            enabled: row.get::<_, i32>(3)? != 0,
            priority: row.get(4)?,
            metadata_expire: row.get(5)?,
            last_sync: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

/// RepositoryPackage represents a package available from a repository
#[derive(Debug, Clone)]
pub struct RepositoryPackage {
    pub id: Option<i64>,
    pub repository_id: i64,
    pub name: String,
    pub version: String,
    pub kind: PackageKind,
    pub architecture: Option<String>,
    pub description: Option<String>,
    /// License text that must be confirmed before installation
    pub license: Option<String>,
    pub requires: Option<String>,
    pub recommends: Option<String>,
    pub update_message: Option<String>,
    pub synced_at: Option<String>,
}

const PACKAGE_COLUMNS: &str = "p.id, p.repository_id, p.name, p.version, p.kind, p.architecture,
     p.description, p.license, p.requires, p.recommends, p.update_message, p.synced_at";

impl RepositoryPackage {
    pub fn new(repository_id: i64, name: String, version: String) -> Self {
        Self {
            id: None,
            repository_id,
            name,
            version,
            kind: PackageKind::Package,
            architecture: None,
            description: None,
            license: None,
            requires: None,
            recommends: None,
            update_message: None,
            synced_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repository_packages
             (repository_id, name, version, kind, architecture, description, license, requires,
              recommends, update_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &self.repository_id,
                &self.name,
                &self.version,
                self.kind.as_str(),
                &self.architecture,
                &self.description,
                &self.license,
                &self.requires,
                &self.recommends,
                &self.update_message,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Best candidate for `name` among enabled repositories
    ///
    /// Highest repository priority wins, then the most recently synced entry.
    pub fn find_best_enabled(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repository_packages p
             JOIN repositories r ON r.id = p.repository_id
             WHERE p.name = ?1 AND r.enabled = 1
             ORDER BY r.priority DESC, p.id DESC
             LIMIT 1",
            PACKAGE_COLUMNS
        ))?;
        let pkg = stmt.query_row([name], Self::from_row).optional()?;
        Ok(pkg)
    }

    pub fn find_by_repository(conn: &Connection, repository_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repository_packages p WHERE p.repository_id = ?1 ORDER BY p.name",
            PACKAGE_COLUMNS
        ))?;
        let packages = stmt
            .query_map([repository_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    /// Delete all packages for a repository (used when syncing)
    pub fn delete_by_repository(conn: &Connection, repository_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM repository_packages WHERE repository_id = ?1",
            [repository_id],
        )?;
        Ok(())
    }

    pub fn requires_list(&self) -> Vec<String> {
        name_list(self.requires.as_deref())
    }

    pub fn recommends_list(&self) -> Vec<String> {
        name_list(self.recommends.as_deref())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            repository_id: row.get(1)?,
            name: row.get(2)?,
            version: row.get(3)?,
            kind: parse_column(row, 4)?,
            architecture: row.get(5)?,
            description: row.get(6)?,
            license: row.get(7)?,
            requires: row.get(8)?,
            recommends: row.get(9)?,
            update_message: row.get(10)?,
            synced_at: row.get(11)?,
        })
    }
}
