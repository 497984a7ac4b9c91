// File: src/core/unifier.rs
use crate::core::dots::multi_cell_key;
use crate::core::types::{
    CellMapping, Indicator, IndicatorAction, IndicatorKind, Mode, Modifier, MultiCellEntry, Scope,
    UnifiedCell, UnifiedTables,
};
use crate::profile::{ProfileRecord, RawEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Compiles profile records into the four lookup structures.
///
/// Profile data is authored and treated as authoritative: malformed
/// entries are dropped and counted, never reported as errors.
pub fn unify(profiles: &HashMap<String, Vec<ProfileRecord>>) -> UnifiedTables {
    let mut builder = TableBuilder::default();
    for records in profiles.values() {
        for record in records {
            let modes = derive_modes(record);
            for entry in &record.entries {
                builder.classify(entry, &modes);
            }
        }
    }
    builder.finish()
}

/// Which modes a profile's plain entries belong to.
fn derive_modes(record: &ProfileRecord) -> Vec<Mode> {
    match record.system_id.as_str() {
        "kana" => vec![Mode::Kana],
        "nemeth" => vec![Mode::Nemeth],
        _ => {
            let g1 = record.braille_type.contains("grade1");
            let g2 = record.braille_type.contains("grade2");
            match (g1, g2) {
                (true, true) => vec![Mode::Grade1, Mode::Grade2],
                (false, true) => vec![Mode::Grade2],
                _ => vec![Mode::Grade1],
            }
        }
    }
}

/// Totally ordered role priority for single-cell conflicts. Paired
/// punctuation outranks plain punctuation, which outranks contractions;
/// an incoming mapping replaces an existing one only on a strictly
/// higher rank, so equal ranks keep the first writer.
fn role_rank(role: &str) -> u8 {
    match role {
        "open" | "close" => 5,
        "punctuation" => 4,
        "groupsigns" | "wordsigns" | "contraction" => 3,
        "letter" => 2,
        "numbers" => 1,
        _ => 0,
    }
}

#[derive(Default)]
struct TableBuilder {
    cells: HashMap<String, UnifiedCell>,
    numeric: HashMap<String, CellMapping>,
    indicators: Vec<Indicator>,
    multi_cell: Vec<MultiCellEntry>,
    discarded: u64,
}

impl TableBuilder {
    fn classify(&mut self, entry: &RawEntry, modes: &[Mode]) {
        let Some(cells) = canonical_cells(&entry.dots) else {
            self.discard(entry, "invalid dot string");
            return;
        };

        if entry.role == "indicator" || entry.category == "indicator" {
            if cells.is_empty() {
                self.discard(entry, "indicator without dots");
                return;
            }
            self.indicators.push(build_indicator(entry, cells));
            return;
        }

        let print = match entry.print.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => {
                self.discard(entry, "no print form");
                return;
            }
        };

        match cells.len() {
            0 => self.discard(entry, "no dots"),
            1 => self.add_single_cell(entry, &cells[0], print, modes),
            _ => {
                let dots_key = multi_cell_key(&cells);
                for &mode in modes {
                    self.multi_cell.push(MultiCellEntry {
                        id: entry.id.clone(),
                        cells: cells.clone(),
                        dots_key: dots_key.clone(),
                        print: print.clone(),
                        mode,
                        role: entry.role.clone(),
                    });
                }
            }
        }
    }

    fn add_single_cell(&mut self, entry: &RawEntry, key: &str, print: String, modes: &[Mode]) {
        let mapping = CellMapping {
            print,
            role: entry.role.clone(),
            id: entry.id.clone(),
        };

        let cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| UnifiedCell {
                dots: key.to_string(),
                mappings: HashMap::new(),
            });
        for &mode in modes {
            match cell.mappings.get(&mode) {
                Some(existing) if role_rank(&mapping.role) <= role_rank(&existing.role) => {}
                _ => {
                    cell.mappings.insert(mode, mapping.clone());
                }
            }
        }

        // Digits share dot patterns with letters; they live in their own
        // table, first writer wins.
        if entry.role == "numbers" && !self.numeric.contains_key(key) {
            self.numeric.insert(key.to_string(), mapping);
        }
    }

    fn discard(&mut self, entry: &RawEntry, reason: &str) {
        self.discarded += 1;
        debug!(id = %entry.id, reason, "discarded profile entry");
    }

    fn finish(self) -> UnifiedTables {
        UnifiedTables {
            cells: self.cells,
            numeric: self.numeric,
            indicators: Arc::new(self.indicators),
            multi_cell: Arc::new(self.multi_cell),
            discarded: self.discarded,
        }
    }
}

/// Sorts each per-cell digit string into canonical form. Returns `None`
/// if any cell contains a character outside '1'..='6'.
fn canonical_cells(dots: &[String]) -> Option<Vec<String>> {
    let mut cells = Vec::with_capacity(dots.len());
    for cell in dots {
        if !cell.chars().all(|c| ('1'..='6').contains(&c)) {
            return None;
        }
        let mut chars: Vec<char> = cell.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        cells.push(chars.into_iter().collect());
    }
    Some(cells)
}

const MODIFIER_SUBCATEGORIES: &[&str] =
    &["capital", "numeric", "italic", "bold", "underline", "script"];

fn build_indicator(entry: &RawEntry, cells: Vec<String>) -> Indicator {
    let is_terminator = entry.tags.iter().any(|t| t == "terminator")
        || entry.id.contains("terminator");
    let action = if is_terminator {
        IndicatorAction::Exit
    } else {
        IndicatorAction::Enter
    };

    let (kind, modifier) = if MODIFIER_SUBCATEGORIES.contains(&entry.subcategory.as_str()) {
        let modifier = match entry.subcategory.as_str() {
            "capital" => Modifier::Capital,
            "numeric" => Modifier::Numeric,
            _ => Modifier::Typeform,
        };
        (IndicatorKind::Modifier, Some(modifier))
    } else {
        (IndicatorKind::ModeSwitch, None)
    };

    let target_mode = if mentions(entry, "kana") {
        Mode::Kana
    } else if mentions(entry, "nemeth") {
        Mode::Nemeth
    } else {
        Mode::Grade1
    };

    let scope = if entry.tags.iter().any(|t| t == "passage") {
        Scope::Passage
    } else if entry.tags.iter().any(|t| t == "word") {
        Scope::Word
    } else {
        Scope::Symbol
    };

    let dots_key = multi_cell_key(&cells);
    Indicator {
        id: entry.id.clone(),
        cells,
        dots_key,
        action,
        target_mode,
        scope,
        kind,
        modifier,
        tags: entry.tags.clone(),
    }
}

fn mentions(entry: &RawEntry, token: &str) -> bool {
    entry.tags.iter().any(|t| t == token) || entry.subcategory.contains(token)
}
