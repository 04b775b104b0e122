/*!
 * Schema definitions for partitioning NPPES data files
 *
 * The input side is a descriptor of the columns the pipeline reads, resolved
 * by name against each file's header before any row is parsed. The output
 * side is the fixed reduced schema shared by every state file.
 */

use std::collections::HashMap;
use std::path::Path;

use crate::constants::{MAX_OTHER_IDENTIFIERS, MAX_TAXONOMY_CODES, PRACTICE_STATE_COLUMN};
use crate::{PartitionError, Result};

/// Core columns carried through unchanged, in NPPES file order
pub const SELECTED_COLUMNS: [&str; 47] = [
    // Core identifiers
    "NPI",
    "Entity Type Code",
    "Replacement NPI",
    "Employer Identification Number (EIN)",

    // Organization name
    "Provider Organization Name (Legal Business Name)",

    // Individual provider name
    "Provider Last Name (Legal Name)",
    "Provider First Name",
    "Provider Middle Name",
    "Provider Name Prefix Text",
    "Provider Name Suffix Text",
    "Provider Credential Text",

    // Other organization name
    "Provider Other Organization Name",
    "Provider Other Organization Name Type Code",

    // Other individual name
    "Provider Other Last Name",
    "Provider Other First Name",
    "Provider Other Middle Name",
    "Provider Other Name Prefix Text",
    "Provider Other Name Suffix Text",
    "Provider Other Credential Text",
    "Provider Other Last Name Type Code",

    // Mailing address
    "Provider First Line Business Mailing Address",
    "Provider Second Line Business Mailing Address",
    "Provider Business Mailing Address City Name",
    "Provider Business Mailing Address State Name",
    "Provider Business Mailing Address Postal Code",
    "Provider Business Mailing Address Country Code (If outside U.S.)",
    "Provider Business Mailing Address Telephone Number",
    "Provider Business Mailing Address Fax Number",

    // Practice location address
    "Provider First Line Business Practice Location Address",
    "Provider Second Line Business Practice Location Address",
    "Provider Business Practice Location Address City Name",
    "Provider Business Practice Location Address State Name",
    "Provider Business Practice Location Address Postal Code",
    "Provider Business Practice Location Address Country Code (If outside U.S.)",
    "Provider Business Practice Location Address Telephone Number",
    "Provider Business Practice Location Address Fax Number",

    // Dates
    "Provider Enumeration Date",
    "Last Update Date",
    "NPI Deactivation Reason Code",
    "NPI Deactivation Date",
    "NPI Reactivation Date",

    // Provider gender
    "Provider Gender Code",

    // Authorized official
    "Authorized Official Last Name",
    "Authorized Official First Name",
    "Authorized Official Middle Name",
    "Authorized Official Title or Position",
    "Authorized Official Telephone Number",
];

/// A family of numbered columns reduced into one synthesized field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFamily {
    /// Name of the synthesized output column
    pub output_name: &'static str,
    /// Source column prefix; members are `{prefix}_1` ..= `{prefix}_{count}`
    pub prefix: &'static str,
    pub count: usize,
}

impl ColumnFamily {
    /// Member column names in family-index order
    pub fn column_names(&self) -> Vec<String> {
        (1..=self.count)
            .map(|i| format!("{}_{}", self.prefix, i))
            .collect()
    }
}

/// The seven repeated-column families, in synthesized column order
pub const FAMILIES: [ColumnFamily; 7] = [
    ColumnFamily {
        output_name: "Taxonomy Codes",
        prefix: "Healthcare Provider Taxonomy Code",
        count: MAX_TAXONOMY_CODES,
    },
    ColumnFamily {
        output_name: "License Numbers",
        prefix: "Provider License Number",
        count: MAX_TAXONOMY_CODES,
    },
    ColumnFamily {
        output_name: "State Codes",
        prefix: "Provider License Number State Code",
        count: MAX_TAXONOMY_CODES,
    },
    ColumnFamily {
        output_name: "Other Identifier",
        prefix: "Other Provider Identifier",
        count: MAX_OTHER_IDENTIFIERS,
    },
    ColumnFamily {
        output_name: "Other Identifier Type Codes",
        prefix: "Other Provider Identifier Type Code",
        count: MAX_OTHER_IDENTIFIERS,
    },
    ColumnFamily {
        output_name: "Other Identifier States",
        prefix: "Other Provider Identifier State",
        count: MAX_OTHER_IDENTIFIERS,
    },
    ColumnFamily {
        output_name: "Other Identifier Issuers",
        prefix: "Other Provider Identifier Issuer",
        count: MAX_OTHER_IDENTIFIERS,
    },
];

/// Reduced output schema written to every state file
pub struct OutputSchema;

impl OutputSchema {
    /// Header row: selected columns followed by the synthesized family columns
    pub fn column_names() -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = SELECTED_COLUMNS.to_vec();
        columns.extend(FAMILIES.iter().map(|family| family.output_name));
        columns
    }

    pub fn column_count() -> usize {
        SELECTED_COLUMNS.len() + FAMILIES.len()
    }
}

/// Descriptor of the input columns the pipeline depends on
pub struct InputSchema;

impl InputSchema {
    /// Every input column read by the transformer, selected columns first,
    /// then each family's members in family-index order
    pub fn required_columns() -> Vec<String> {
        let mut columns: Vec<String> = SELECTED_COLUMNS.iter().map(|c| c.to_string()).collect();
        for family in &FAMILIES {
            columns.extend(family.column_names());
        }
        columns
    }

    /// Resolve required columns against an actual header row
    ///
    /// Extra columns are ignored. Duplicate header names resolve to their
    /// first occurrence.
    pub fn resolve<S: AsRef<str>>(headers: &[S], file: Option<&Path>) -> Result<ResolvedSchema> {
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            positions.entry(name.as_ref()).or_insert(i);
        }

        let lookup = |name: &str| -> Result<usize> {
            positions.get(name).copied().ok_or_else(|| {
                PartitionError::missing_column(name, headers.len(), file.map(Path::to_path_buf))
            })
        };

        let selected = SELECTED_COLUMNS
            .iter()
            .map(|name| lookup(name))
            .collect::<Result<Vec<_>>>()?;

        let families = FAMILIES
            .iter()
            .map(|family| {
                family
                    .column_names()
                    .iter()
                    .map(|name| lookup(name))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let practice_state = lookup(PRACTICE_STATE_COLUMN)?;

        Ok(ResolvedSchema {
            selected,
            families,
            practice_state,
            header_len: headers.len(),
        })
    }
}

/// Required columns mapped to their positions in one file's header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    /// Header index of each selected column, in output order
    pub selected: Vec<usize>,
    /// Header indices of each family's members, in `FAMILIES` order
    pub families: Vec<Vec<usize>>,
    /// Header index of the partition field
    pub practice_state: usize,
    /// Number of columns in the source header
    pub header_len: usize,
}
