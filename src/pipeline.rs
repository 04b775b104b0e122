/*!
 * File orchestration for state partitioning
 *
 * Each input file is one unit of work: stream it in bounded chunks, reduce
 * every chunk into a file-local `StateAccumulator`, then commit the whole
 * file to the shared state artifacts. Units run on a bounded worker pool and
 * only meet each other through the per-state locks of `StateFileWriter`.
 *
 * A file that fails before its commit step leaves no rows behind. If every
 * input file skews toward a few states, commits serialize on those states'
 * locks; that is the throughput ceiling of this design.
 */

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::accumulator::StateAccumulator;
use crate::config::PartitionConfig;
use crate::data_types::StateKey;
use crate::schema::InputSchema;
use crate::transform::ChunkTransformer;
use crate::writer::{CommitReport, PartialCommit, StateFileWriter};
use crate::{ErrorContext, PartitionError, Result};

/// Outcome of one successfully committed input file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub rows_read: usize,
    pub rows_excluded: usize,
    pub chunks: usize,
    pub commit: CommitReport,
}

/// An input file whose unit of work was aborted
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
    /// Rows appended before the failure; these stay on disk
    pub rows_by_state: Vec<(StateKey, usize)>,
}

impl FileFailure {
    /// Failure before anything was committed
    fn before_commit(path: &Path, error: PartitionError) -> Self {
        Self {
            path: path.to_path_buf(),
            error: error.with_file(path).to_string(),
            rows_by_state: Vec::new(),
        }
    }

    /// Failure partway through the commit step
    fn during_commit(path: &Path, partial: PartialCommit) -> Self {
        Self {
            path: path.to_path_buf(),
            error: partial.error.with_file(path).to_string(),
            rows_by_state: partial.report.rows_by_state,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows_by_state.iter().map(|(_, n)| n).sum()
    }
}

/// Result of one input file's unit of work
pub type FileOutcome = std::result::Result<FileReport, FileFailure>;

/// Aggregate result of a partitioning run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_duration_ms", rename = "elapsed_ms")]
    pub elapsed: Duration,
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_failed: Vec<FileFailure>,
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_excluded: usize,
    /// Rows appended per state, in `StateKey` order, omitting empty states
    pub rows_by_state: Vec<(StateKey, usize)>,
    pub workers: usize,
}

fn serialize_duration_ms<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

impl RunSummary {
    fn from_outcomes(
        started_at: DateTime<Utc>,
        elapsed: Duration,
        workers: usize,
        outcomes: Vec<FileOutcome>,
    ) -> Self {
        let mut per_state = [0usize; StateKey::COUNT];
        let mut summary = Self {
            started_at,
            elapsed,
            files_discovered: outcomes.len(),
            files_processed: 0,
            files_failed: Vec::new(),
            rows_read: 0,
            rows_written: 0,
            rows_excluded: 0,
            rows_by_state: Vec::new(),
            workers,
        };

        for outcome in outcomes {
            let appended = match &outcome {
                Ok(report) => &report.commit.rows_by_state,
                Err(failure) => &failure.rows_by_state,
            };
            for (state, rows) in appended {
                per_state[state.index()] += rows;
                summary.rows_written += rows;
            }

            match outcome {
                Ok(report) => {
                    summary.files_processed += 1;
                    summary.rows_read += report.rows_read;
                    summary.rows_excluded += report.rows_excluded;
                }
                Err(failure) => summary.files_failed.push(failure),
            }
        }

        summary.rows_by_state = StateKey::ALL
            .iter()
            .map(|&state| (state, per_state[state.index()]))
            .filter(|(_, rows)| *rows > 0)
            .collect();
        summary
    }

    /// True when every discovered file was committed
    pub fn is_success(&self) -> bool {
        self.files_failed.is_empty()
    }

    /// Print a human-readable report
    pub fn print_summary(&self) {
        println!("=== State Partitioning Summary ===");
        println!("Started:            {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Elapsed:            {:.2}s", self.elapsed.as_secs_f64());
        println!("Workers:            {}", self.workers);
        println!("Files processed:    {}/{}", self.files_processed, self.files_discovered);
        println!("Rows read:          {}", self.rows_read);
        println!("Rows written:       {}", self.rows_written);
        println!("Rows excluded:      {} (practice state outside the 50 states)", self.rows_excluded);

        if !self.rows_by_state.is_empty() {
            println!("\nRows by state:");
            for (state, rows) in &self.rows_by_state {
                println!("  {}: {}", state, rows);
            }
        }

        if !self.files_failed.is_empty() {
            println!("\nFailed files ({}):", self.files_failed.len());
            for failure in &self.files_failed {
                println!("  {}: {}", failure.path.display(), failure.error);
                if failure.rows_written() > 0 {
                    println!("    ({} rows were appended before the failure)", failure.rows_written());
                }
            }
        }
    }
}

/// Drives a partitioning run over every input file of a directory
pub struct StatePartitioner {
    config: PartitionConfig,
}

impl StatePartitioner {
    pub fn new(config: PartitionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// List input files, sorted by path
    pub fn discover_input_files(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.input_dir;
        if !dir.is_dir() {
            return Err(PartitionError::file_not_found_with_suggestion(dir.clone()));
        }

        let wanted = self.config.input_extension.to_ascii_lowercase();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| PartitionError::from(e).with_file(dir))? {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_ascii_lowercase() == wanted)
                .unwrap_or(false);
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(PartitionError::Configuration {
                message: format!(
                    "No '.{}' files found in {}",
                    self.config.input_extension,
                    dir.display()
                ),
                suggestion: Some("Point --input-dir at the directory holding the NPPES CSV chunks".to_string()),
            });
        }
        Ok(files)
    }

    /// Partition every input file and report the outcome
    ///
    /// Errors are returned only for run-level problems (bad config, missing
    /// input directory, unwritable output directory). Per-file failures are
    /// listed in the summary.
    pub fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;
        let started_at = Utc::now();
        let start = Instant::now();

        let files = self.discover_input_files()?;
        let writer = StateFileWriter::new(&self.config.output_dir)?
            .with_delimiter(self.config.delimiter_byte());

        if self.config.clean_output {
            let removed = writer.clean()?;
            info!(removed, output_dir = %writer.output_dir().display(), "Removed existing state files");
        }

        let workers = self.config.worker_count(files.len());
        info!(
            files = files.len(),
            workers,
            chunk_size = self.config.chunk_size,
            "Starting state partitioning"
        );

        #[cfg(feature = "progress")]
        let progress_bar = if self.config.enable_progress_bar {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let run_one = |path: &PathBuf| {
            let outcome = self.process_file(path, &writer);
            if let Err(failure) = &outcome {
                warn!(
                    file = %path.display(),
                    error = %failure.error,
                    partial_rows = failure.rows_written(),
                    "Input file failed"
                );
            }
            #[cfg(feature = "progress")]
            if let Some(pb) = &progress_bar {
                pb.inc(1);
            }
            outcome
        };

        let outcomes = self.dispatch(&files, workers, run_one)?;

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_with_message("Partitioning complete");
        }

        let summary = RunSummary::from_outcomes(started_at, start.elapsed(), workers, outcomes);
        info!(
            processed = summary.files_processed,
            failed = summary.files_failed.len(),
            rows_written = summary.rows_written,
            rows_excluded = summary.rows_excluded,
            "State partitioning finished"
        );
        Ok(summary)
    }

    #[cfg(feature = "parallel")]
    fn dispatch<F>(&self, files: &[PathBuf], workers: usize, run_one: F) -> Result<Vec<FileOutcome>>
    where
        F: Fn(&PathBuf) -> FileOutcome + Sync + Send,
    {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("npsplit-worker-{}", i))
            .build()
            .map_err(|e| PartitionError::Custom {
                message: format!("Failed to start worker pool: {}", e),
                suggestion: Some("Lower parallel_threads".to_string()),
            })?;

        // One file per task so an idle worker picks up the next pending file
        Ok(pool.install(|| files.par_iter().with_max_len(1).map(run_one).collect()))
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch<F>(&self, files: &[PathBuf], _workers: usize, run_one: F) -> Result<Vec<FileOutcome>>
    where
        F: Fn(&PathBuf) -> FileOutcome,
    {
        Ok(files.iter().map(run_one).collect())
    }

    /// Run one file's unit of work: stream, transform, accumulate, commit
    ///
    /// A failure while reading writes nothing. A failure during the commit
    /// keeps the states appended before it, listed in the `FileFailure`.
    pub fn process_file(&self, path: &Path, writer: &StateFileWriter) -> FileOutcome {
        info!(file = %path.display(), "Processing file");
        let (accumulator, chunks) = self
            .accumulate_file(path)
            .map_err(|e| FileFailure::before_commit(path, e))?;

        let commit = writer
            .commit(&accumulator)
            .map_err(|partial| FileFailure::during_commit(path, partial))?;
        info!(
            file = %path.display(),
            rows = accumulator.rows_read(),
            written = commit.rows_written(),
            excluded = accumulator.excluded(),
            states = commit.rows_by_state.len(),
            "Committed file"
        );

        Ok(FileReport {
            path: path.to_path_buf(),
            rows_read: accumulator.rows_read(),
            rows_excluded: accumulator.excluded(),
            chunks,
            commit,
        })
    }

    /// Read a whole file into a state accumulator without writing anything
    pub fn accumulate_file(&self, path: &Path) -> Result<(StateAccumulator, usize)> {
        let file = File::open(path).map_err(|e| PartitionError::Io {
            message: format!("Cannot open input file: {}", e),
            source: e,
            context: ErrorContext::for_file(path),
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.config.delimiter_byte())
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PartitionError::from(e).with_file(path))?
            .iter()
            .map(str::to_string)
            .collect();
        let schema = InputSchema::resolve(&headers, Some(path))?;
        let transformer = ChunkTransformer::new(schema);

        let chunk_size = self.config.chunk_size;
        let mut accumulator = StateAccumulator::new();
        let mut chunk: Vec<StringRecord> = Vec::with_capacity(chunk_size);
        let mut chunks = 0;

        loop {
            // Refill the reused buffer; the last chunk may be partial
            let mut filled = 0;
            while filled < chunk_size {
                if filled == chunk.len() {
                    chunk.push(StringRecord::new());
                }
                let more = reader
                    .read_record(&mut chunk[filled])
                    .map_err(|e| PartitionError::from(e).with_file(path))?;
                if !more {
                    break;
                }
                filled += 1;
            }

            if filled == 0 {
                break;
            }

            chunks += 1;
            let transformed = transformer.transform_chunk(&chunk[..filled]);
            debug!(
                file = %path.display(),
                chunk = chunks,
                rows = filled,
                excluded = transformed.excluded,
                "Transformed chunk"
            );
            accumulator.merge(transformed);

            if filled < chunk_size {
                break;
            }
        }

        Ok((accumulator, chunks))
    }
}

/// Partition a directory of input files with the given configuration
pub fn partition_states(config: PartitionConfig) -> Result<RunSummary> {
    StatePartitioner::new(config).run()
}
