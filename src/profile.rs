// File: src/profile.rs
use serde::{Deserialize, Serialize};

fn default_cell_size() -> u8 {
    6
}

/// One authored profile: a braille system at one grade, already
/// converted to JSON by the data pipeline. The engine consumes these
/// as parsed records and never writes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub schema_version: u32,
    pub system_id: String,
    #[serde(default)]
    pub system_name: String,
    #[serde(default)]
    pub locale: String,
    /// Free-form; may contain the tokens "grade1" and/or "grade2".
    #[serde(default)]
    pub braille_type: String,
    #[serde(default = "default_cell_size")]
    pub cell_size: u8,
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

/// One raw profile entry. The unifier classifies these into the
/// single-cell, numeric, indicator and multi-cell tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub print: Option<String>,
    /// Per-cell digit strings, e.g. `["1"]`, `["16", "13"]`, `["42"]`.
    /// Cell order is significant; digit order inside a cell is not.
    #[serde(default)]
    pub dots: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub context: Option<EntryContext>,
}

/// Authoring context carried through for provenance. Matching does not
/// consult it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryContext {
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub requires_indicator: Option<bool>,
    #[serde(default)]
    pub priority: Option<i32>,
}
