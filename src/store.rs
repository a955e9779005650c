use crate::matcher::Pattern;
use crate::pipeline::{RunResult, TemplateGroup};
use crate::template::Variables;
use indexmap::IndexMap;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_TABLE: &str = "templates";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io { path: path.display().to_string(), source }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupEntry {
    variables: Variables,
    matches: Vec<String>,
}

pub fn artifact_path(dir: &Path, dataset: &str) -> PathBuf {
    dir.join(format!("result_{dataset}.json"))
}

pub fn residual_path(dir: &Path, dataset: &str) -> PathBuf {
    dir.join(format!("residual_{dataset}.json"))
}

/// Writes `{template: {variables, matches}}` as pretty JSON.
pub fn save_run(path: &Path, run: &RunResult) -> Result<(), StoreError> {
    let out: IndexMap<&str, GroupEntry> = run
        .groups
        .iter()
        .map(|(t, g)| {
            (t.as_str(), GroupEntry { variables: g.variables.clone(), matches: g.matches.clone() })
        })
        .collect();
    write_json(path, &out)
}

pub fn load_run(path: &Path) -> Result<IndexMap<String, TemplateGroup>, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let raw: IndexMap<String, GroupEntry> = serde_json::from_str(&text)?;
    Ok(raw
        .into_iter()
        .map(|(template, e)| {
            let group = TemplateGroup { template: template.clone(), variables: e.variables, matches: e.matches };
            (template, group)
        })
        .collect())
}

pub fn save_residual(path: &Path, residual: &[String]) -> Result<(), StoreError> {
    write_json(path, &residual)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| StoreError::io(path, e))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTemplate {
    pub template: String,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub template: String,
    /// Values captured by each placeholder, left to right.
    pub instances: Vec<String>,
}

/// Template table in SQLite, named after the database file stem.
pub struct TemplateStore {
    conn: Connection,
    table: String,
}

impl TemplateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let table = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::init(Connection::open(path)?, table)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, DEFAULT_TABLE.to_string())
    }

    fn init(conn: Connection, table: String) -> Result<Self, StoreError> {
        let table = sanitize_table(&table);
        conn.execute(
            &format!(r#"CREATE TABLE IF NOT EXISTS "{table}" (template TEXT, variables TEXT)"#),
            [],
        )?;
        Ok(Self { conn, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Appends the template unless it is already stored. Returns whether a row was added.
    pub fn add_template<S: AsRef<str>>(&self, template: &str, variables: &[S]) -> Result<bool, StoreError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                &format!(r#"SELECT 1 FROM "{}" WHERE template = ?1 LIMIT 1"#, self.table),
                params![template],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Ok(false);
        }
        let keys = variables.iter().map(|v| v.as_ref()).collect::<Vec<&str>>().join(",");
        self.conn.execute(
            &format!(r#"INSERT INTO "{}" (template, variables) VALUES (?1, ?2)"#, self.table),
            params![template, keys],
        )?;
        Ok(true)
    }

    /// Stores every group of a run; returns how many were new.
    pub fn record_run(&self, run: &RunResult) -> Result<usize, StoreError> {
        let mut added = 0;
        for group in run.groups.values() {
            let names: Vec<&str> = group.variables.keys().map(String::as_str).collect();
            if self.add_template(&group.template, &names)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn templates(&self) -> Result<Vec<StoredTemplate>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!(r#"SELECT template, variables FROM "{}" ORDER BY rowid"#, self.table))?;
        let rows = stmt.query_map([], |row| {
            let template: String = row.get(0)?;
            let keys: Option<String> = row.get(1)?;
            Ok(StoredTemplate { template, variables: split_keys(keys.as_deref().unwrap_or_default()) })
        })?;
        let templates = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(templates)
    }

    /// First stored template whose pattern matches `line`.
    pub fn lookup(&self, line: &str) -> Result<Option<Lookup>, StoreError> {
        for stored in self.templates()? {
            let pattern = match Pattern::from_template(&stored.template) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(template = %stored.template, error = %e, "stored template does not compile");
                    continue;
                }
            };
            if let Some(instances) = pattern.extract(line) {
                return Ok(Some(Lookup { template: stored.template, instances }));
            }
        }
        Ok(None)
    }
}

fn split_keys(keys: &str) -> Vec<String> {
    keys.split(',').filter(|k| !k.is_empty()).map(str::to_string).collect()
}

pub(crate) fn sanitize_table(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        DEFAULT_TABLE.to_string()
    } else {
        cleaned
    }
}
