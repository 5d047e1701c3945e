use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::entry::MemorizationEntry;
use crate::error::StoreError;
use crate::phase::{MemorizationPhase, PhaseProgress, Progress};

/// Persistence boundary owned by the host application.
pub trait EntryStore {
    fn load_all(&mut self) -> Result<Vec<MemorizationEntry>, StoreError>;

    /// Inserts or replaces the entry with the same id.
    fn save(&mut self, entry: &MemorizationEntry) -> Result<(), StoreError>;
}

const HEADER: [&str; 16] = [
    "id",
    "reference",
    "text",
    "date_added",
    "system_managed",
    "current_phase",
    "phase1_units",
    "phase1_start",
    "phase1_last",
    "phase2_units",
    "phase2_start",
    "phase2_last",
    "phase3_units",
    "phase3_start",
    "phase3_last",
    "last_completion",
];

/// Entries kept in a single CSV file, rewritten on every save.
pub struct CsvStore {
    path: PathBuf,
    entries: Vec<MemorizationEntry>,
}

impl CsvStore {
    /// Opens `path`, treating a missing file as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let (entries, minted) = read_csv(&path)?;
            // ids and dates filled in on load must stay put across runs
            if minted {
                info!("writing generated ids back to {}", path.display());
                save_csv(&path, &entries)?;
            }
            entries
        } else {
            Vec::new()
        };
        Ok(CsvStore { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntryStore for CsvStore {
    fn load_all(&mut self) -> Result<Vec<MemorizationEntry>, StoreError> {
        Ok(self.entries.clone())
    }

    fn save(&mut self, entry: &MemorizationEntry) -> Result<(), StoreError> {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => self.entries.push(entry.clone()),
        }
        save_csv(&self.path, &self.entries)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<MemorizationEntry>,
    saves: usize,
}

impl MemoryStore {
    pub fn new(entries: Vec<MemorizationEntry>) -> Self {
        MemoryStore { entries, saves: 0 }
    }

    pub fn get(&self, id: Uuid) -> Option<&MemorizationEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Number of successful `save` calls.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl EntryStore for MemoryStore {
    fn load_all(&mut self) -> Result<Vec<MemorizationEntry>, StoreError> {
        Ok(self.entries.clone())
    }

    fn save(&mut self, entry: &MemorizationEntry) -> Result<(), StoreError> {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => self.entries.push(entry.clone()),
        }
        self.saves += 1;
        Ok(())
    }
}

/// Several CSV files behind one store. Saves go back to the file the entry
/// was loaded from; new entries land in the first file.
pub struct CsvLibrary {
    stores: Vec<CsvStore>,
    owner: HashMap<Uuid, usize>,
}

impl CsvLibrary {
    /// Opens every file, skipping ones that fail to parse.
    pub fn open(files: &[PathBuf]) -> Self {
        let mut stores = Vec::new();
        let mut owner = HashMap::new();
        for file in files {
            match CsvStore::open(file) {
                Ok(store) => {
                    for entry in &store.entries {
                        owner.insert(entry.id, stores.len());
                    }
                    stores.push(store);
                }
                Err(e) => warn!("skipping {}: {e}", file.display()),
            }
        }
        CsvLibrary { stores, owner }
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.stores.iter().map(|s| s.path())
    }

    pub fn file_count(&self) -> usize {
        self.stores.len()
    }
}

impl EntryStore for CsvLibrary {
    fn load_all(&mut self) -> Result<Vec<MemorizationEntry>, StoreError> {
        let mut all = Vec::new();
        for store in &mut self.stores {
            all.extend(store.load_all()?);
        }
        Ok(all)
    }

    fn save(&mut self, entry: &MemorizationEntry) -> Result<(), StoreError> {
        let index = *self.owner.entry(entry.id).or_insert(0);
        let store = self
            .stores
            .get_mut(index)
            .ok_or_else(|| StoreError::Unavailable("no entry files loaded".into()))?;
        store.save(entry)
    }
}

fn get_field(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("").trim()
}

fn parse_error(field: &'static str, value: &str, path: &Path, line: usize) -> StoreError {
    StoreError::Parse {
        field,
        value: value.to_string(),
        location: format!("{}:{}", path.display(), line),
    }
}

fn parse_optional_datetime(
    s: &str,
    field: &'static str,
    path: &Path,
    line: usize,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    if s.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| parse_error(field, s, path, line))
}

fn parse_units(s: &str, field: &'static str, path: &Path, line: usize) -> Result<u32, StoreError> {
    if s.is_empty() {
        Ok(0)
    } else {
        s.parse().map_err(|_| parse_error(field, s, path, line))
    }
}

fn parse_bool(s: &str, path: &Path, line: usize) -> Result<bool, StoreError> {
    match s.to_ascii_lowercase().as_str() {
        "" | "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(parse_error("system_managed", s, path, line)),
    }
}

fn parse_phase_progress(
    record: &csv::StringRecord,
    first_column: usize,
    path: &Path,
    line: usize,
) -> Result<PhaseProgress, StoreError> {
    Ok(PhaseProgress {
        units_completed: parse_units(get_field(record, first_column), "units", path, line)?,
        start_date: parse_optional_datetime(
            get_field(record, first_column + 1),
            "start_date",
            path,
            line,
        )?,
        last_completion: parse_optional_datetime(
            get_field(record, first_column + 2),
            "last_completion",
            path,
            line,
        )?,
    })
}

/// Reads every row of `path`.
///
/// Rows without an id or `date_added` get a fresh one that is not written
/// back; [`CsvStore::open`] persists them.
pub fn load_csv(path: &Path) -> Result<Vec<MemorizationEntry>, StoreError> {
    read_csv(path).map(|(entries, _)| entries)
}

/// Rows of `path`, and whether any id or `date_added` had to be generated.
fn read_csv(path: &Path) -> Result<(Vec<MemorizationEntry>, bool), StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let mut entries = Vec::new();
    let mut minted = false;
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        // header is line 1
        let line = i + 2;

        let id_raw = get_field(&record, 0);
        let id = if id_raw.is_empty() {
            minted = true;
            Uuid::new_v4()
        } else {
            Uuid::parse_str(id_raw).map_err(|_| parse_error("id", id_raw, path, line))?
        };

        let added_raw = get_field(&record, 3);
        let date_added = match parse_optional_datetime(added_raw, "date_added", path, line)? {
            Some(dt) => dt,
            None => {
                minted = true;
                Utc::now()
            }
        };

        let phase_raw = get_field(&record, 5);
        let current_phase = if phase_raw.is_empty() {
            MemorizationPhase::Phase1
        } else {
            phase_raw
                .parse()
                .map_err(|_| parse_error("current_phase", phase_raw, path, line))?
        };

        let progress = Progress {
            phase1: parse_phase_progress(&record, 6, path, line)?,
            phase2: parse_phase_progress(&record, 9, path, line)?,
            phase3: parse_phase_progress(&record, 12, path, line)?,
        };
        let last_completion =
            parse_optional_datetime(get_field(&record, 15), "last_completion", path, line)?
                .or_else(|| progress.latest_completion());

        entries.push(MemorizationEntry {
            id,
            reference: record.get(1).unwrap_or("").to_string(),
            text: record.get(2).unwrap_or("").to_string(),
            date_added,
            system_managed: parse_bool(get_field(&record, 4), path, line)?,
            current_phase,
            progress,
            last_completion,
        });
    }
    Ok((entries, minted))
}

fn format_datetime(dt: Option<DateTime<Utc>>) -> String {
    dt.map_or(String::new(), |d| d.to_rfc3339())
}

pub fn save_csv(path: &Path, entries: &[MemorizationEntry]) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;

    for entry in entries {
        let p = &entry.progress;
        writer.write_record([
            entry.id.to_string(),
            entry.reference.clone(),
            entry.text.clone(),
            entry.date_added.to_rfc3339(),
            entry.system_managed.to_string(),
            entry.current_phase.number().to_string(),
            p.phase1.units_completed.to_string(),
            format_datetime(p.phase1.start_date),
            format_datetime(p.phase1.last_completion),
            p.phase2.units_completed.to_string(),
            format_datetime(p.phase2.start_date),
            format_datetime(p.phase2.last_completion),
            p.phase3.units_completed.to_string(),
            format_datetime(p.phase3.start_date),
            format_datetime(p.phase3.last_completion),
            format_datetime(entry.last_completion),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn discover_files(paths: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for p in paths {
        let path = PathBuf::from(p);
        if path.is_dir() {
            collect_csv_recursive(&path, &mut files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files
}

fn collect_csv_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_csv_recursive(&path, files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
}
