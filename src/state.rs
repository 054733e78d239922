use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Generates a short unique run ID (7 characters, like git)
pub fn generate_run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let hash = blake3::hash(&timestamp.to_le_bytes());
    let hex = hash.to_hex();
    hex.as_str()[..7].to_string()
}

/// Get the state directory path
///
/// Priority order:
/// 1. Environment variable FIELD_SWEEP_STATE_DIR (highest priority)
/// 2. --local-state flag (uses ./.field-sweep)
/// 3. Global default (uses system data directory)
pub fn get_state_dir(local: bool) -> Result<PathBuf> {
    if let Ok(custom_dir) = std::env::var("FIELD_SWEEP_STATE_DIR") {
        return Ok(PathBuf::from(custom_dir));
    }

    if local {
        let current_dir = std::env::current_dir()?;
        Ok(current_dir.join(".field-sweep"))
    } else {
        let proj_dirs = ProjectDirs::from("com", "field-sweep", "field-sweep")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }
}

/// Compute blake3 hash of file content already in memory
pub fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// One file rewritten by a removal run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileModification {
    pub path: PathBuf,
    pub hash_before: String,
    pub hash_after: String,
    /// Pre-image backup, relative to the state directory
    pub backup: PathBuf,
}

/// Status of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Applied,
    Reverted,
}

/// Metadata about a single removal run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub field: String,
    pub files: Vec<FileModification>,
    pub status: RunStatus,
}

/// Index of all runs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunsIndex {
    pub runs: HashMap<String, RunMetadata>,
}

impl RunsIndex {
    pub fn load(state_dir: &Path) -> Result<Self> {
        let index_path = state_dir.join("runs.json");
        if !index_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&index_path).context("Failed to read runs index")?;
        let index: RunsIndex =
            serde_json::from_str(&content).context("Failed to parse runs index")?;
        Ok(index)
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;
        let index_path = state_dir.join("runs.json");
        let content = serde_json::to_string_pretty(self)?;

        // Atomic write using temp file
        let temp_path = state_dir.join("runs.json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &index_path)?;
        Ok(())
    }
}

/// Collects pre-image backups for one batch as files are rewritten.
///
/// A log that recorded nothing leaves no trace in the index; one that did is
/// committed as an `Applied` run that `revert` can undo.
pub struct RunLog {
    state_dir: PathBuf,
    meta: RunMetadata,
}

impl RunLog {
    pub fn begin(state_dir: PathBuf, field: &str) -> Result<Self> {
        let run_id = generate_run_id();
        fs::create_dir_all(state_dir.join("backups").join(&run_id))
            .context("Failed to create backup directory")?;
        Ok(Self {
            state_dir,
            meta: RunMetadata {
                run_id,
                timestamp: Utc::now(),
                field: field.to_string(),
                files: Vec::new(),
                status: RunStatus::Applied,
            },
        })
    }

    pub fn run_id(&self) -> &str {
        &self.meta.run_id
    }

    /// Persist the pre-image of `path` before it gets overwritten.
    pub fn record(&mut self, path: &Path, before: &str, after: &str) -> Result<()> {
        let index = self.meta.files.len();
        let backup_rel = PathBuf::from("backups")
            .join(&self.meta.run_id)
            .join(format!("{index}.xml"));
        let backup_abs = self.state_dir.join(&backup_rel);
        fs::write(&backup_abs, before)
            .with_context(|| format!("Failed to back up {}", path.display()))?;

        self.meta.files.push(FileModification {
            path: path.to_path_buf(),
            hash_before: hash_text(before),
            hash_after: hash_text(after),
            backup: backup_rel,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.meta.files.is_empty()
    }

    /// Register the run in the index. Runs that modified nothing are dropped
    /// along with their (empty) backup directory.
    pub fn commit(self) -> Result<Option<String>> {
        if self.meta.files.is_empty() {
            let _ = fs::remove_dir(self.state_dir.join("backups").join(&self.meta.run_id));
            return Ok(None);
        }
        let mut index = RunsIndex::load(&self.state_dir)?;
        let run_id = self.meta.run_id.clone();
        index.runs.insert(run_id.clone(), self.meta);
        index.save(&self.state_dir)?;
        Ok(Some(run_id))
    }
}

/// All recorded runs, newest first.
pub fn list_runs(state_dir: &Path) -> Result<Vec<RunMetadata>> {
    let index = RunsIndex::load(state_dir)?;
    let mut runs: Vec<RunMetadata> = index.runs.into_values().collect();
    runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(runs)
}

/// Restore every file of a run from its pre-image backup.
///
/// Each file's current hash must still equal the run's after-hash; a file
/// edited since the run makes the revert refuse rather than clobber newer
/// work. Returns the number of files restored.
pub fn revert_run(state_dir: &Path, run_id: &str) -> Result<usize> {
    let mut index = RunsIndex::load(state_dir)?;
    let Some(run) = index.runs.get(run_id) else {
        bail!("Unknown run id: {run_id}");
    };
    if run.status == RunStatus::Reverted {
        bail!("Run {run_id} has already been reverted");
    }

    for file in &run.files {
        let current = fs::read_to_string(&file.path)
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        if hash_text(&current) != file.hash_after {
            bail!(
                "{} changed since run {run_id}; refusing to revert",
                file.path.display()
            );
        }
    }

    let mut restored = 0;
    for file in &run.files {
        let backup = state_dir.join(&file.backup);
        let before = fs::read_to_string(&backup)
            .with_context(|| format!("Failed to read backup {}", backup.display()))?;
        fs::write(&file.path, before)
            .with_context(|| format!("Failed to restore {}", file.path.display()))?;
        restored += 1;
    }

    if let Some(run) = index.runs.get_mut(run_id) {
        run.status = RunStatus::Reverted;
    }
    index.save(state_dir)?;
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_short_and_unique_enough() {
        let a = generate_run_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generate_run_id();
        assert_eq!(a.len(), 7);
        assert_ne!(a, b);
    }

    #[test]
    fn record_commit_and_revert_round_trip() {
        let state = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let target = work.path().join("Account.layout-meta.xml");
        fs::write(&target, "old contents").unwrap();

        let mut log = RunLog::begin(state.path().to_path_buf(), "Account.MyField__c").unwrap();
        log.record(&target, "old contents", "new contents").unwrap();
        fs::write(&target, "new contents").unwrap();
        let run_id = log.commit().unwrap().unwrap();

        let runs = list_runs(state.path()).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].field, "Account.MyField__c");

        let restored = revert_run(state.path(), &run_id).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "old contents");

        // Second revert is refused.
        assert!(revert_run(state.path(), &run_id).is_err());
    }

    #[test]
    fn revert_refuses_when_file_changed_after_run() {
        let state = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let target = work.path().join("a.xml");
        fs::write(&target, "old").unwrap();

        let mut log = RunLog::begin(state.path().to_path_buf(), "F").unwrap();
        log.record(&target, "old", "new").unwrap();
        fs::write(&target, "edited since").unwrap();
        let run_id = log.commit().unwrap().unwrap();

        assert!(revert_run(state.path(), &run_id).is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "edited since");
    }

    #[test]
    fn empty_runs_are_not_indexed() {
        let state = tempfile::tempdir().unwrap();
        let log = RunLog::begin(state.path().to_path_buf(), "F").unwrap();
        assert!(log.commit().unwrap().is_none());
        assert!(list_runs(state.path()).unwrap().is_empty());
    }
}
