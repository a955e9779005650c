use crate::store;
use crate::template;
use indexmap::{IndexMap, IndexSet};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_COLUMN: &str = "Content";
const TEMPLATE_COLUMN: &str = "EventTemplate";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset file {} does not exist", path.display())]
    NotFound { path: PathBuf },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{path} has no {column} column")]
    MissingColumn { path: String, column: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub project: String,
    pub log: String,
    /// Ground-truth positional template.
    pub template: String,
    /// The log has no variable parts.
    pub is_static: bool,
}

/// Ground-truth template with every log it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSample {
    pub template: String,
    pub logs: Vec<String>,
    pub num_variables: usize,
    pub is_static: bool,
    /// One log standing in for the group; the first one seen.
    pub sample_log: String,
}

pub fn dataset_path(base_dir: &Path, project: &str) -> PathBuf {
    base_dir
        .join(project)
        .join(format!("{project}_2k.log_structured_corrected.csv"))
}

/// Loads `<base>/<project>/<project>_2k.log_structured_corrected.csv`.
pub fn load_dataset(base_dir: &Path, project: &str) -> Result<Vec<LogRecord>, DatasetError> {
    let path = dataset_path(base_dir, project);
    if !path.exists() {
        return Err(DatasetError::NotFound { path });
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &'static str| {
        headers.iter().position(|h| h == name).ok_or_else(|| DatasetError::MissingColumn {
            path: path.display().to_string(),
            column: name,
        })
    };
    let log_idx = column(LOG_COLUMN)?;
    let template_idx = column(TEMPLATE_COLUMN)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let log = row.get(log_idx).unwrap_or_default().to_string();
        let template = row.get(template_idx).unwrap_or_default().to_string();
        records.push(LogRecord {
            project: project.to_string(),
            is_static: log == template,
            log,
            template,
        });
    }
    tracing::debug!(project, records = records.len(), "loaded dataset");
    Ok(records)
}

/// Project directory names under `base_dir`, sorted.
pub fn all_projects(base_dir: &Path) -> Result<Vec<String>, DatasetError> {
    if !base_dir.exists() {
        return Err(DatasetError::NotFound { path: base_dir.to_path_buf() });
    }
    let mut projects = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            projects.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    projects.sort();
    Ok(projects)
}

/// Distinct log texts in first-seen order.
pub fn unique_logs(records: &[LogRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.log.as_str())
        .collect::<IndexSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn group_by_template(records: &[LogRecord]) -> Vec<TemplateSample> {
    let mut groups: IndexMap<&str, Vec<String>> = IndexMap::new();
    for r in records {
        groups.entry(r.template.as_str()).or_default().push(r.log.clone());
    }
    groups
        .into_iter()
        .map(|(t, logs)| {
            let num_variables = template::marker_count(t);
            TemplateSample {
                template: t.to_string(),
                sample_log: logs[0].clone(),
                logs,
                num_variables,
                is_static: num_variables == 0,
            }
        })
        .collect()
}

fn records_table(db: &Path) -> String {
    let stem = db.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    store::sanitize_table(&stem)
}

fn create_records_table(conn: &Connection, table: &str) -> Result<(), DatasetError> {
    conn.execute(
        &format!(
            r#"CREATE TABLE IF NOT EXISTS "{table}"
               (project TEXT, log TEXT, template TEXT, only_static INTEGER)"#
        ),
        [],
    )?;
    Ok(())
}

/// Appends `records` to the table named after the database file stem.
pub fn save_records_to_sqlite(records: &[LogRecord], db: &Path) -> Result<(), DatasetError> {
    let table = records_table(db);
    let mut conn = Connection::open(db)?;
    create_records_table(&conn, &table)?;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            r#"INSERT INTO "{table}" (project, log, template, only_static) VALUES (?1, ?2, ?3, ?4)"#
        ))?;
        for r in records {
            stmt.execute(params![r.project, r.log, r.template, r.is_static])?;
        }
    }
    tx.commit()?;
    tracing::debug!(db = %db.display(), table, records = records.len(), "saved records");
    Ok(())
}

/// Reads every record back in insertion order.
pub fn load_records_from_sqlite(db: &Path) -> Result<Vec<LogRecord>, DatasetError> {
    if !db.exists() {
        return Err(DatasetError::NotFound { path: db.to_path_buf() });
    }
    let table = records_table(db);
    let conn = Connection::open(db)?;
    let mut stmt = conn.prepare(&format!(
        r#"SELECT project, log, template, only_static FROM "{table}" ORDER BY rowid"#
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(LogRecord {
            project: row.get(0)?,
            log: row.get(1)?,
            template: row.get(2)?,
            is_static: row.get(3)?,
        })
    })?;
    let records = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Every project under `base_dir`, cached in `db`. An existing database is
/// read as is; otherwise each project's CSV is loaded and appended first.
pub fn all_datasets(base_dir: &Path, db: &Path) -> Result<Vec<LogRecord>, DatasetError> {
    if db.exists() {
        return load_records_from_sqlite(db);
    }
    for project in all_projects(base_dir)? {
        let records = load_dataset(base_dir, &project)?;
        save_records_to_sqlite(&records, db)?;
    }
    if !db.exists() {
        // no projects: leave an empty cache behind so the next call reads it
        create_records_table(&Connection::open(db)?, &records_table(db))?;
    }
    load_records_from_sqlite(db)
}
