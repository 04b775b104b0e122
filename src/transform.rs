/*!
 * Chunk transformation
 *
 * Reduces raw NPPES rows to the compact output schema: selected columns are
 * copied, each repeated-column family is concatenated into one field, the
 * numbered columns are dropped, and every row is routed by its practice
 * location state.
 */

use csv::StringRecord;

use crate::constants::FAMILY_DELIMITER;
use crate::data_types::{OutputRecord, StateKey};
use crate::schema::{OutputSchema, ResolvedSchema};

/// Concatenate one family's values from a row
///
/// Values are visited in family-index order. Absent, empty and
/// whitespace-only values are skipped; survivors are trimmed and joined with
/// `,`. Duplicates are preserved and an all-empty family yields `""`.
pub fn reduce_family(record: &StringRecord, columns: &[usize]) -> String {
    let mut reduced = String::new();
    for value in columns.iter().filter_map(|&i| record.get(i)) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !reduced.is_empty() {
            reduced.push_str(FAMILY_DELIMITER);
        }
        reduced.push_str(value);
    }
    reduced
}

/// Routing decision for one transformed row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    State(StateKey, OutputRecord),
    Excluded,
}

/// Output of transforming one chunk
#[derive(Debug, Default)]
pub struct TransformedChunk {
    /// Rows tagged with their state, in chunk order
    pub routed: Vec<(StateKey, OutputRecord)>,
    /// Rows whose practice state is outside the 50-state set
    pub excluded: usize,
}

impl TransformedChunk {
    /// Total rows seen, routed or excluded
    pub fn rows(&self) -> usize {
        self.routed.len() + self.excluded
    }
}

/// Maps raw rows onto the output schema for one resolved input header
#[derive(Debug, Clone)]
pub struct ChunkTransformer {
    schema: ResolvedSchema,
}

impl ChunkTransformer {
    pub fn new(schema: ResolvedSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    /// Reduce one row to the output schema, without routing it
    pub fn reduce(&self, record: &StringRecord) -> OutputRecord {
        let mut fields = Vec::with_capacity(OutputSchema::column_count());

        // Short rows read as empty trailing fields
        fields.extend(
            self.schema
                .selected
                .iter()
                .map(|&i| record.get(i).unwrap_or_default().to_string()),
        );
        fields.extend(
            self.schema
                .families
                .iter()
                .map(|columns| reduce_family(record, columns)),
        );

        OutputRecord::new(fields)
    }

    /// Reduce and route one row
    pub fn transform_record(&self, record: &StringRecord) -> Routed {
        match record.get(self.schema.practice_state).and_then(StateKey::from_code) {
            Some(state) => Routed::State(state, self.reduce(record)),
            None => Routed::Excluded,
        }
    }

    /// Transform a bounded batch of rows
    pub fn transform_chunk(&self, chunk: &[StringRecord]) -> TransformedChunk {
        let mut out = TransformedChunk {
            routed: Vec::with_capacity(chunk.len()),
            excluded: 0,
        };

        for record in chunk {
            match self.transform_record(record) {
                Routed::State(state, row) => out.routed.push((state, row)),
                Routed::Excluded => out.excluded += 1,
            }
        }

        out
    }
}
