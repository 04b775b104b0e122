/*!
 * Per-state output files
 *
 * Commits one input file's accumulated groups to the shared `<STATE>.csv`
 * artifacts in the output directory. Every artifact gets its header exactly
 * once, when it is first created; later commits only append rows.
 *
 * Workers share one `StateFileWriter`. The existence check and the append for
 * a given state run under that state's lock, so two workers can never both
 * see a missing file and both write a header. Locks are per state: workers
 * committing disjoint states do not wait on each other.
 */

use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use csv::WriterBuilder;
use serde::Serialize;

use crate::accumulator::StateAccumulator;
use crate::data_types::{OutputRecord, StateKey};
use crate::schema::OutputSchema;
use crate::{ErrorContext, PartitionError, Result};

/// One mutex per `StateKey`, indexed by `StateKey::index`
struct StateLockTable {
    locks: [Mutex<()>; StateKey::COUNT],
}

impl StateLockTable {
    fn new() -> Self {
        Self {
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    fn lock(&self, state: StateKey) -> MutexGuard<'_, ()> {
        // The guard protects the file on disk, not the unit value, so a
        // panic in another holder leaves nothing to repair.
        self.locks[state.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Rows appended for each state by one commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub rows_by_state: Vec<(StateKey, usize)>,
    /// States whose artifact was created (and got its header) by this commit
    pub created: Vec<StateKey>,
}

impl CommitReport {
    pub fn rows_written(&self) -> usize {
        self.rows_by_state.iter().map(|(_, n)| n).sum()
    }
}

/// A commit that stopped at a failing state
///
/// `report` lists the states appended before the failure. Those rows are
/// already on disk and are not rolled back.
#[derive(Debug)]
pub struct PartialCommit {
    pub report: CommitReport,
    pub error: PartitionError,
}

/// Shared writer for the per-state artifacts of one output directory
pub struct StateFileWriter {
    output_dir: PathBuf,
    delimiter: u8,
    locks: StateLockTable,
}

impl StateFileWriter {
    /// Create a writer, creating the output directory if needed
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir).map_err(|e| PartitionError::Io {
            message: format!("Cannot create output directory: {}", e),
            source: e,
            context: ErrorContext::for_file(&output_dir),
        })?;

        Ok(Self {
            output_dir,
            delimiter: b',',
            locks: StateLockTable::new(),
        })
    }

    /// Set the field delimiter of the output files
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Artifact path for a state
    pub fn path_for(&self, state: StateKey) -> PathBuf {
        self.output_dir.join(state.file_name())
    }

    /// Remove existing state artifacts; run once before any worker starts
    pub fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for state in StateKey::ALL {
            let _guard = self.locks.lock(state);
            let path = self.path_for(state);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PartitionError::from(e).with_file(&path)),
            }
        }
        Ok(removed)
    }

    /// Commit every non-empty group of one file's accumulator, in
    /// `StateKey` order, stopping at the first state that fails
    pub fn commit(&self, accumulator: &StateAccumulator) -> std::result::Result<CommitReport, PartialCommit> {
        let mut report = CommitReport::default();

        for (state, rows) in accumulator.iter() {
            match self.append(state, rows) {
                Ok(created) => {
                    if created {
                        report.created.push(state);
                    }
                    report.rows_by_state.push((state, rows.len()));
                }
                Err(error) => return Err(PartialCommit { report, error }),
            }
        }

        Ok(report)
    }

    /// Append rows to one state's artifact, writing the header if the
    /// artifact is new. Returns whether the header was written.
    pub fn append(&self, state: StateKey, rows: &[OutputRecord]) -> Result<bool> {
        let path = self.path_for(state);
        let _guard = self.locks.lock(state);

        let is_new = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(PartitionError::from(e).with_file(&path).with_state(state.as_code())),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PartitionError::from(e).with_file(&path).with_state(state.as_code()))?;

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(BufWriter::new(file));

        let write_all = |writer: &mut csv::Writer<BufWriter<fs::File>>| -> Result<()> {
            if is_new {
                writer.write_record(OutputSchema::column_names())?;
            }
            for row in rows {
                writer.write_record(row.as_slice())?;
            }
            writer.flush()?;
            Ok(())
        };
        write_all(&mut writer).map_err(|e| e.with_file(&path).with_state(state.as_code()))?;

        tracing::trace!(state = %state, rows = rows.len(), created = is_new, "Appended state batch");
        Ok(is_new)
    }
}
