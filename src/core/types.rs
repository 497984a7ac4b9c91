// File: src/core/types.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The active braille system. Profile-level strings are parsed into this
/// enum at the unifier boundary and never travel through the API as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Grade1,
    Grade2,
    Kana,
    Nemeth,
}

impl Mode {
    /// Grade 1 is the distinguished base mode and the universal fallback
    /// for both single-cell lookup and multi-cell filtering.
    pub const BASE: Mode = Mode::Grade1;

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Grade1 => "grade1",
            Mode::Grade2 => "grade2",
            Mode::Kana => "kana",
            Mode::Nemeth => "nemeth",
        }
    }
}

/// How long a mode switch persists: one symbol, until the next space,
/// or until an explicit exit indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Symbol,
    Word,
    Passage,
}

/// A flag an indicator sets for the following characters without
/// changing the active mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Capital,
    Numeric,
    Typeform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorAction {
    Enter,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    ModeSwitch,
    Modifier,
}

/// One print mapping for a single cell in one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellMapping {
    pub print: String,
    pub role: String,
    pub id: String,
}

/// A single-cell table entry: the canonical dot key plus its per-mode
/// mappings. Keys are globally unique in the table; within one entry
/// there is at most one mapping per mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedCell {
    pub dots: String,
    pub mappings: HashMap<Mode, CellMapping>,
}

/// A cell sequence that changes mode or flags the next characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: String,
    /// Canonical per-cell dot keys, in order.
    pub cells: Vec<String>,
    /// The cells joined by `|`.
    pub dots_key: String,
    pub action: IndicatorAction,
    pub target_mode: Mode,
    pub scope: Scope,
    pub kind: IndicatorKind,
    pub modifier: Option<Modifier>,
    pub tags: Vec<String>,
}

/// A multi-cell character sequence (inner quotation, slash, brackets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiCellEntry {
    pub id: String,
    pub cells: Vec<String>,
    pub dots_key: String,
    pub print: String,
    pub mode: Mode,
    pub role: String,
}

/// The four lookup structures the unifier produces. Computed once at
/// startup and immutable afterwards; the matchers share the `Arc` lists.
#[derive(Debug, Clone, Default)]
pub struct UnifiedTables {
    /// Dot key -> single-cell entry.
    pub cells: HashMap<String, UnifiedCell>,
    /// Dot key -> mapping for entries with role "numbers". A key may
    /// appear here and in `cells` (a-j and 1-0 share dot patterns).
    pub numeric: HashMap<String, CellMapping>,
    /// Ordered: prefix matching scans these, it does not hash by key.
    pub indicators: Arc<Vec<Indicator>>,
    pub multi_cell: Arc<Vec<MultiCellEntry>>,
    /// Count of profile entries dropped during unification.
    pub discarded: u64,
}

/// A mode transition reported to the host, either from an indicator or
/// from scope-based auto-return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
    pub trigger: ModeChangeTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeChangeTrigger {
    /// The id of the indicator that switched modes.
    Indicator(String),
    /// Scope ran out: one symbol emitted, or a space in word scope.
    Auto,
}
