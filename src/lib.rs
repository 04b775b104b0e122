/*!
 * # NPPES State Partitioning Library
 *
 * Splits National Plan and Provider Enumeration System (NPPES) registry
 * files into one compact CSV file per U.S. state.
 *
 * ## Features
 *
 * - 🚀 **Bounded Memory**: Input files are streamed in fixed-size chunks
 * - 🧩 **Compact Schema**: 47 core columns plus seven concatenated families
 *   (taxonomy codes, license numbers, other identifiers, ...)
 * - 🗺️ **State Partitioning**: One `<STATE>.csv` per U.S. state, header once,
 *   append-only across input files
 * - ⚡ **Parallel Files**: Input files are processed on a bounded worker pool
 *   with per-state locking of the shared outputs
 * - 📮 **Postal Tools**: ZIP normalization and city/county/state enrichment
 *
 * ## Quick Start
 *
 * ```no_run
 * use nppes_states::prelude::*;
 *
 * # fn main() -> Result<()> {
 * let config = ConfigBuilder::new()
 *     .input_dir("Final")
 *     .output_dir("states")
 *     .chunk_size(100_000)
 *     .build()?;
 *
 * let summary = StatePartitioner::new(config).run()?;
 * summary.print_summary();
 * # Ok(())
 * # }
 * ```
 *
 * ## Reducing a Single Row
 *
 * ```
 * use nppes_states::prelude::*;
 * use csv::StringRecord;
 *
 * # fn main() -> Result<()> {
 * let headers = InputSchema::required_columns();
 * let transformer = ChunkTransformer::new(InputSchema::resolve(&headers, None)?);
 *
 * let mut row = vec![String::new(); headers.len()];
 * row[transformer.schema().practice_state] = "CA".to_string();
 * row[transformer.schema().families[0][0]] = "207Q00000X".to_string();
 * row[transformer.schema().families[0][2]] = "208D00000X".to_string();
 *
 * match transformer.transform_record(&StringRecord::from(row)) {
 *     Routed::State(state, record) => {
 *         assert_eq!(state, StateKey::CA);
 *         assert_eq!(record.get(47), Some("207Q00000X,208D00000X"));
 *     }
 *     Routed::Excluded => unreachable!(),
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Postal Codes
 *
 * ```
 * use nppes_states::postal::PostalCode;
 *
 * assert_eq!(PostalCode::normalize("902101234").as_str(), "90210-1234");
 * assert_eq!(PostalCode::normalize("9021").as_str(), "review");
 * ```
 */

// Re-export error types from root
pub use error::{PartitionError, Result, ErrorContext};

// Public modules
pub mod data_types;
pub mod schema;
pub mod error;
pub mod config;
pub mod postal;
pub mod transform;
pub mod accumulator;
pub mod writer;
pub mod pipeline;
pub mod enrich;
pub mod split;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use nppes_states::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::{OutputRecord, StateKey};
    pub use crate::schema::{InputSchema, OutputSchema, ResolvedSchema, ColumnFamily, FAMILIES};
    pub use crate::error::{PartitionError, Result};
    pub use crate::config::{ConfigBuilder, PartitionConfig};
    pub use crate::postal::{normalize_postal_code, PostalCode};
    pub use crate::transform::{reduce_family, ChunkTransformer, Routed, TransformedChunk};
    pub use crate::accumulator::StateAccumulator;
    pub use crate::writer::{CommitReport, StateFileWriter};
    pub use crate::pipeline::{partition_states, RunSummary, StatePartitioner};
    pub use crate::enrich::{Enrichment, Location, PostalEnricher, PostalLookup, ZipTable};
    pub use crate::split::split_file;
}

/// NPPES data constants
pub mod constants {
    /// Maximum number of healthcare taxonomy codes per provider
    pub const MAX_TAXONOMY_CODES: usize = 15;

    /// Maximum number of other provider identifiers per provider
    pub const MAX_OTHER_IDENTIFIERS: usize = 50;

    /// Column whose value selects the output partition
    pub const PRACTICE_STATE_COLUMN: &str = "Provider Business Practice Location Address State Name";

    /// Column normalized by the enrichment sub-pipeline
    pub const PRACTICE_POSTAL_COLUMN: &str = "Provider Business Practice Location Address Postal Code";

    /// Separator between values of a reduced family
    pub const FAMILY_DELIMITER: &str = ",";

    /// Marker for postal codes that cannot be normalized or resolved
    pub const UNRESOLVABLE_SENTINEL: &str = "review";

    /// Marker for postal lookups that failed in the lookup service
    pub const LOOKUP_ERROR_MARKER: &str = "error";

    /// Rows read per chunk by default
    pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

    /// Rows per output file of the repartition utility by default
    pub const DEFAULT_SPLIT_ROWS: usize = 250_000;
}
