/*!
 * Data type definitions for the state partitioning pipeline
 *
 * `StateKey` is the closed set of 50 U.S. state abbreviations used as the
 * output partition key. `OutputRecord` is one reduced row in output schema
 * order.
 */

use serde::{Deserialize, Serialize};

/// One of the 50 U.S. states, used as the output partition key
///
/// DC, territories, military codes and `ZZ` are deliberately absent: records
/// carrying them are excluded from every state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKey {
    AL, AK, AZ, AR, CA, CO, CT, DE, FL, GA, HI, ID, IL, IN, IA, KS, KY, LA, ME, MD,
    MA, MI, MN, MS, MO, MT, NE, NV, NH, NJ, NM, NY, NC, ND, OH, OK, OR, PA, RI, SC,
    SD, TN, TX, UT, VT, VA, WA, WV, WI, WY,
}

impl StateKey {
    /// Number of partition keys
    pub const COUNT: usize = 50;

    /// All keys in declaration order
    pub const ALL: [StateKey; StateKey::COUNT] = {
        use StateKey::*;
        [
            AL, AK, AZ, AR, CA, CO, CT, DE, FL, GA, HI, ID, IL, IN, IA, KS, KY, LA, ME, MD,
            MA, MI, MN, MS, MO, MT, NE, NV, NH, NJ, NM, NY, NC, ND, OH, OK, OR, PA, RI, SC,
            SD, TN, TX, UT, VT, VA, WA, WV, WI, WY,
        ]
    };

    /// Look up a key by its exact two-letter abbreviation
    ///
    /// Matching is case-sensitive; anything outside the closed set yields `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.as_code() == code)
    }

    pub fn as_code(&self) -> &'static str {
        use StateKey::*;
        match self {
            AL => "AL", AK => "AK", AZ => "AZ", AR => "AR", CA => "CA", CO => "CO", CT => "CT",
            DE => "DE", FL => "FL", GA => "GA", HI => "HI", ID => "ID", IL => "IL", IN => "IN",
            IA => "IA", KS => "KS", KY => "KY", LA => "LA", ME => "ME", MD => "MD", MA => "MA",
            MI => "MI", MN => "MN", MS => "MS", MO => "MO", MT => "MT", NE => "NE", NV => "NV",
            NH => "NH", NJ => "NJ", NM => "NM", NY => "NY", NC => "NC", ND => "ND", OH => "OH",
            OK => "OK", OR => "OR", PA => "PA", RI => "RI", SC => "SC", SD => "SD", TN => "TN",
            TX => "TX", UT => "UT", VT => "VT", VA => "VA", WA => "WA", WV => "WV", WI => "WI",
            WY => "WY",
        }
    }

    /// Dense index into fixed-size per-state tables
    pub fn index(self) -> usize {
        self as usize
    }

    /// Artifact file name for this key, e.g. `CA.csv`
    pub fn file_name(&self) -> String {
        format!("{}.csv", sanitize_filename(self.as_code()))
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Replace every non-alphanumeric character with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// A reduced provider row, fields in `OutputSchema` column order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputRecord {
    pub fields: Vec<String>,
}

impl OutputRecord {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field by output column position
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.fields
    }
}
