use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info};

use crate::{
    error::{StoreError, StoreResult},
    model::{EmpId, Employee},
};

pub const DEFAULT_DATA_FILE: &str = "data/employees.json";

/// Reads a boolean flag from the environment; `1`, `true` and `yes` are on.
pub fn env_bool(var: &str, default: bool) -> bool {
    std::env::var(var)
        .ok()
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Where the employee document lives and which write rules apply.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub path: PathBuf,
    /// Reject creates whose `empId` is already stored.
    pub unique_ids: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_FILE)
    }
}

impl StoreSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            unique_ids: true,
        }
    }

    /// Reads `EMPLOYEES_FILE` and `EMPLOYEES_UNIQUE_IDS`.
    pub fn from_env() -> Self {
        let path = std::env::var("EMPLOYEES_FILE").unwrap_or_else(|_| DEFAULT_DATA_FILE.into());
        Self::new(path).with_unique_ids(env_bool("EMPLOYEES_UNIQUE_IDS", true))
    }

    pub fn with_unique_ids(mut self, unique_ids: bool) -> Self {
        self.unique_ids = unique_ids;
        self
    }
}

/// Result of a keyed replace.
#[derive(Clone, Debug, PartialEq)]
pub struct Replaced {
    pub employee: Employee,
    /// Number of stored records that were overwritten.
    pub matched: usize,
}

/// Employee collection persisted as one JSON array.
///
/// Every mutation reads the whole document, transforms it in memory and
/// replaces the file atomically (temp file + rename). Mutations are serialized
/// through `write_lock`; readers never wait on it because a rename always
/// leaves a complete document behind.
#[derive(Debug)]
pub struct EmployeeStore {
    settings: StoreSettings,
    write_lock: Mutex<()>,
}

impl EmployeeStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.settings.path
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Fails with `StorageUnavailable` unless the document exists as a file.
    pub async fn ensure_available(&self) -> StoreResult<()> {
        let path = self.path();
        let meta = fs::metadata(path)
            .await
            .map_err(|err| StoreError::unavailable(path, err))?;
        if !meta.is_file() {
            return Err(StoreError::unavailable(
                path,
                std::io::Error::other("not a regular file"),
            ));
        }
        Ok(())
    }

    /// Creates the document holding `seed` when it is missing. Returns whether
    /// a new document was written.
    pub async fn initialize(&self, seed: &[Employee]) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        if self.ensure_available().await.is_ok() {
            return Ok(false);
        }
        self.create_parent_dir().await?;
        self.write_document(seed).await?;
        info!(path = %self.path().display(), records = seed.len(), "employee document initialized");
        Ok(true)
    }

    /// Appends every record whose id is not stored yet, creating the document
    /// if needed. Returns how many were added.
    pub async fn seed(&self, employees: &[Employee]) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut data = match self.read_document().await {
            Ok(data) => data,
            Err(StoreError::StorageUnavailable { .. }) => {
                self.create_parent_dir().await?;
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        let mut added = 0;
        for employee in employees {
            if data.iter().any(|stored| stored.emp_id == employee.emp_id) {
                continue;
            }
            data.push(employee.clone());
            added += 1;
        }
        self.write_document(&data).await?;
        Ok(added)
    }

    /// All records in stored order.
    pub async fn list(&self) -> StoreResult<Vec<Employee>> {
        self.read_document().await
    }

    /// First record carrying `emp_id`.
    pub async fn get(&self, emp_id: EmpId) -> StoreResult<Option<Employee>> {
        let data = self.read_document().await?;
        Ok(data.into_iter().find(|employee| employee.emp_id == emp_id))
    }

    pub async fn create(&self, employee: Employee) -> StoreResult<Employee> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_document().await?;
        if self.settings.unique_ids && data.iter().any(|stored| stored.emp_id == employee.emp_id) {
            return Err(StoreError::DuplicateId(employee.emp_id));
        }
        data.push(employee.clone());
        self.write_document(&data).await?;
        debug!(emp_id = employee.emp_id, total = data.len(), "employee created");
        Ok(employee)
    }

    /// Overwrites every record whose id equals `emp_id` with `employee`. The
    /// document is left untouched when nothing matches.
    pub async fn replace(&self, emp_id: EmpId, employee: Employee) -> StoreResult<Replaced> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_document().await?;
        let mut matched = 0;
        for stored in data.iter_mut().filter(|stored| stored.emp_id == emp_id) {
            *stored = employee.clone();
            matched += 1;
        }
        if matched > 0 {
            self.write_document(&data).await?;
        }
        debug!(emp_id, matched, "employee replaced");
        Ok(Replaced { employee, matched })
    }

    /// Removes every record whose id equals `emp_id` and returns how many went
    /// away. Deleting an unknown id is not an error.
    pub async fn delete(&self, emp_id: EmpId) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_document().await?;
        let before = data.len();
        data.retain(|stored| stored.emp_id != emp_id);
        let removed = before - data.len();
        if removed > 0 {
            self.write_document(&data).await?;
        }
        debug!(emp_id, removed, "employee deleted");
        Ok(removed)
    }

    async fn read_document(&self) -> StoreResult<Vec<Employee>> {
        let path = self.path();
        let bytes = fs::read(path)
            .await
            .map_err(|err| StoreError::unavailable(path, err))?;
        parse_document(path, &bytes)
    }

    async fn write_document(&self, employees: &[Employee]) -> StoreResult<()> {
        let path = self.path().to_path_buf();
        let payload = serde_json::to_vec(employees)
            .map_err(|err| StoreError::io(&path, std::io::Error::other(err)))?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || persist_atomically(&target, &payload))
            .await
            .map_err(|err| StoreError::io(&path, std::io::Error::other(err)))?
    }

    async fn create_parent_dir(&self) -> StoreResult<()> {
        match self.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::io(parent, err)),
            _ => Ok(()),
        }
    }
}

/// Blank documents and a literal `null` read as an empty collection.
fn parse_document(path: &Path, bytes: &[u8]) -> StoreResult<Vec<Employee>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let parsed: Option<Vec<Employee>> =
        serde_json::from_slice(bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parsed.unwrap_or_default())
}

/// Writes `payload` to a uniquely named sibling of `path`, syncs it and
/// renames it over `path`. The temporary file is removed on every failure.
fn persist_atomically(path: &Path, payload: &[u8]) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|err| StoreError::io(dir, err))?;
    tmp.write_all(payload)
        .map_err(|err| StoreError::io(tmp.path(), err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| StoreError::io(tmp.path(), err))?;
    tmp.persist(path)
        .map_err(|err| StoreError::io(path, err.error))?;
    Ok(())
}
