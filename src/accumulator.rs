/*!
 * Per-file state accumulation
 *
 * Collects the transformed chunks of one input file into a fixed table keyed
 * by `StateKey`. The table is owned by the worker processing that file and is
 * handed to the writer only after the file has been read completely.
 */

use crate::data_types::{OutputRecord, StateKey};
use crate::transform::TransformedChunk;

/// State-keyed rows gathered from one input file
#[derive(Debug)]
pub struct StateAccumulator {
    groups: [Vec<OutputRecord>; StateKey::COUNT],
    rows_read: usize,
    excluded: usize,
}

impl Default for StateAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StateAccumulator {
    pub fn new() -> Self {
        Self {
            groups: std::array::from_fn(|_| Vec::new()),
            rows_read: 0,
            excluded: 0,
        }
    }

    /// Merge one chunk, keeping chunk arrival order and within-chunk order
    pub fn merge(&mut self, chunk: TransformedChunk) {
        self.rows_read += chunk.rows();
        self.excluded += chunk.excluded;
        for (state, record) in chunk.routed {
            self.groups[state.index()].push(record);
        }
    }

    /// Rows accumulated for one state
    pub fn get(&self, state: StateKey) -> &[OutputRecord] {
        &self.groups[state.index()]
    }

    /// Non-empty groups in `StateKey` order
    pub fn iter(&self) -> impl Iterator<Item = (StateKey, &[OutputRecord])> + '_ {
        StateKey::ALL
            .iter()
            .map(move |&state| (state, self.get(state)))
            .filter(|(_, rows)| !rows.is_empty())
    }

    /// States with at least one row
    pub fn states(&self) -> Vec<StateKey> {
        self.iter().map(|(state, _)| state).collect()
    }

    /// Rows routed to some state
    pub fn routed(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// Rows seen in the file, routed or excluded
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Rows dropped for state-set membership
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn is_empty(&self) -> bool {
        self.routed() == 0
    }
}
