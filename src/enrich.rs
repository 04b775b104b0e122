/*!
 * Postal enrichment
 *
 * Normalizes the practice-location postal code of a CSV file and appends the
 * city, county and state resolved from its five-digit base. Rows whose postal
 * code cannot be normalized are dropped. Rows whose code is well-formed but
 * unknown keep the `review` marker in the location columns; rows whose lookup
 * failed carry `error`.
 */

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{LOOKUP_ERROR_MARKER, UNRESOLVABLE_SENTINEL};
use crate::postal::PostalCode;
use crate::{ErrorContext, PartitionError, Result};

/// Column added with the normalized postal code
pub const FORMATTED_POSTAL_COLUMN: &str = "Formatted Postal Code";

/// Location columns appended after the formatted postal code
pub const LOCATION_COLUMNS: [&str; 3] = ["City", "County", "State"];

/// Place a five-digit ZIP code belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub county: String,
    pub state: String,
}

/// Source of ZIP code locations
///
/// `Ok(None)` means the code is not known; `Err` means the lookup itself
/// failed and should be reported with [`PartitionError::Lookup`].
pub trait PostalLookup {
    fn lookup(&self, base_zip: &str) -> Result<Option<Location>>;
}

/// Outcome of enriching one postal code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    Resolved(Location),
    Unresolvable,
    Error(String),
}

impl Enrichment {
    /// City, county and state column values
    pub fn columns(&self) -> [&str; 3] {
        match self {
            Enrichment::Resolved(loc) => [loc.city.as_str(), loc.county.as_str(), loc.state.as_str()],
            Enrichment::Unresolvable => [UNRESOLVABLE_SENTINEL; 3],
            Enrichment::Error(_) => [LOOKUP_ERROR_MARKER; 3],
        }
    }
}

/// Resolve a normalized postal code by its five-digit base
pub fn enrich_postal(code: &PostalCode, lookup: &dyn PostalLookup) -> Enrichment {
    let Some(base) = code.base() else {
        return Enrichment::Unresolvable;
    };
    match lookup.lookup(base) {
        Ok(Some(location)) => Enrichment::Resolved(location),
        Ok(None) => Enrichment::Unresolvable,
        Err(e) => Enrichment::Error(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ZipRow {
    zipcode: String,
    major_city: String,
    county: String,
    state: String,
}

/// In-memory ZIP code table
#[derive(Debug, Default, Clone)]
pub struct ZipTable {
    entries: HashMap<String, Location>,
}

impl ZipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a CSV with `zipcode,major_city,county,state` columns
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PartitionError::file_not_found_with_suggestion(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| PartitionError::from(e).with_file(path))?;
        Self::from_reader(file).map_err(|e| e.with_file(path))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let mut table = Self::new();
        for row in csv.deserialize() {
            let row: ZipRow = row?;
            table.insert(
                &row.zipcode,
                Location {
                    city: row.major_city,
                    county: row.county,
                    state: row.state,
                },
            );
        }
        Ok(table)
    }

    /// Add an entry; numeric codes that lost leading zeros are padded back
    pub fn insert(&mut self, zipcode: &str, location: Location) {
        let zip = zipcode.trim();
        let key = if zip.len() < 5 && !zip.is_empty() && zip.bytes().all(|b| b.is_ascii_digit()) {
            format!("{:0>5}", zip)
        } else {
            zip.to_string()
        };
        self.entries.insert(key, location);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PostalLookup for ZipTable {
    fn lookup(&self, base_zip: &str) -> Result<Option<Location>> {
        Ok(self.entries.get(base_zip).cloned())
    }
}

/// Row counts of one enrichment run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub rows_read: usize,
    pub rows_written: usize,
    /// Rows removed because their postal code could not be normalized
    pub rows_dropped: usize,
    /// Written rows whose code was not found by the lookup
    pub unresolved: usize,
    /// Written rows whose lookup failed
    pub lookup_errors: usize,
}

/// Streams a CSV file through postal normalization and location lookup
pub struct PostalEnricher<'a> {
    lookup: &'a dyn PostalLookup,
    delimiter: u8,
}

impl<'a> PostalEnricher<'a> {
    pub fn new(lookup: &'a dyn PostalLookup) -> Self {
        Self { lookup, delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Enrich `input` into `output` using the postal code in `postal_column`
    pub fn enrich_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
        postal_column: &str,
    ) -> Result<EnrichReport> {
        let input = input.as_ref();
        let output = output.as_ref();
        if !input.exists() {
            return Err(PartitionError::file_not_found_with_suggestion(input.to_path_buf()));
        }
        info!(input = %input.display(), output = %output.display(), "Enriching postal codes");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(input)
            .map_err(|e| PartitionError::from(e).with_file(input))?;

        let headers = reader
            .headers()
            .map_err(|e| PartitionError::from(e).with_file(input))?
            .clone();
        let postal_idx = headers
            .iter()
            .position(|h| h == postal_column)
            .ok_or_else(|| {
                PartitionError::missing_column(postal_column, headers.len(), Some(input.to_path_buf()))
            })?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(output)
            .map_err(|e| PartitionError::from(e).with_file(output))?;

        let mut out_header = headers.clone();
        out_header.push_field(FORMATTED_POSTAL_COLUMN);
        for column in LOCATION_COLUMNS {
            out_header.push_field(column);
        }
        writer.write_record(&out_header)?;

        let mut report = EnrichReport::default();
        let mut record = StringRecord::new();
        let mut out = StringRecord::new();

        while reader
            .read_record(&mut record)
            .map_err(|e| PartitionError::from(e).with_file(input))?
        {
            report.rows_read += 1;
            let code = PostalCode::normalize_opt(record.get(postal_idx));
            if !code.is_resolvable() {
                report.rows_dropped += 1;
                continue;
            }

            let enrichment = enrich_postal(&code, self.lookup);
            match &enrichment {
                Enrichment::Resolved(_) => {}
                Enrichment::Unresolvable => report.unresolved += 1,
                Enrichment::Error(message) => {
                    debug!(zip = code.as_str(), error = %message, "Postal lookup failed");
                    report.lookup_errors += 1;
                }
            }

            out.clear();
            for i in 0..headers.len() {
                out.push_field(record.get(i).unwrap_or(""));
            }
            out.push_field(code.as_str());
            for value in enrichment.columns() {
                out.push_field(value);
            }
            writer.write_record(&out)?;
            report.rows_written += 1;
        }

        writer.flush().map_err(|e| PartitionError::Io {
            message: format!("Failed to flush enriched output: {}", e),
            source: e,
            context: ErrorContext::for_file(output),
        })?;

        info!(
            rows_written = report.rows_written,
            rows_dropped = report.rows_dropped,
            unresolved = report.unresolved,
            lookup_errors = report.lookup_errors,
            "Postal enrichment finished"
        );
        Ok(report)
    }
}

/// Default output path for an enriched copy of `input`
pub fn default_enriched_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_enriched.csv", stem))
}
