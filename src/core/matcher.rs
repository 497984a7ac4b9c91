// File: src/core/matcher.rs
use crate::core::dots::CELL_SEPARATOR;
use crate::core::types::{Indicator, Mode, MultiCellEntry};
use std::mem;
use std::sync::Arc;

/// An entry a [`PrefixMatcher`] can scan: a `|`-joined dot key, plus an
/// optional mode for tables that are mode-filtered.
pub trait PrefixEntry: Clone {
    fn dots_key(&self) -> &str;

    /// `None` means the entry is visible in every mode.
    fn mode(&self) -> Option<Mode> {
        None
    }
}

impl PrefixEntry for Indicator {
    fn dots_key(&self) -> &str {
        &self.dots_key
    }
}

impl PrefixEntry for MultiCellEntry {
    fn dots_key(&self) -> &str {
        &self.dots_key
    }

    fn mode(&self) -> Option<Mode> {
        Some(self.mode)
    }
}

/// What to do when an exact match coexists with a longer candidate.
///
/// Indicators defer: the short match is held back until the next cell
/// proves the longer sequence is not arriving. Multi-cell sequences are
/// authored to only overlap by length, so their matcher takes the exact
/// match as soon as the buffer cannot grow further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    Deferred,
    Immediate,
}

/// Outcome of feeding one cell key to the automaton.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<E> {
    Matched(E),
    /// A held-back match was committed; the trailing cells were not part
    /// of it and must be re-offered downstream.
    MatchedWithLeftover { entry: E, leftover: Vec<String> },
    /// The buffer is a live prefix; wait for the next chord.
    Pending,
    /// Dead end. The buffered cells are returned in push order.
    NoMatch(Vec<String>),
}

/// Deferred-prefix automaton over an ordered entry list.
///
/// Holds an `Arc` slice of the unified tables; the list is never
/// mutated after unification.
#[derive(Debug, Clone)]
pub struct PrefixMatcher<E> {
    entries: Arc<Vec<E>>,
    policy: MatchPolicy,
    buffer: Vec<String>,
    deferred: Option<E>,
    max_cells: usize,
}

impl<E: PrefixEntry> PrefixMatcher<E> {
    pub fn new(entries: Arc<Vec<E>>, policy: MatchPolicy) -> Self {
        let max_cells = entries
            .iter()
            .map(|e| e.dots_key().split(CELL_SEPARATOR).count())
            .max()
            .unwrap_or(0);
        Self {
            entries,
            policy,
            buffer: Vec::new(),
            deferred: None,
            max_cells,
        }
    }

    /// Feeds one canonical cell key under the given mode.
    pub fn step(&mut self, key: &str, mode: Mode) -> Step<E> {
        self.buffer.push(key.to_string());
        let prefix = self.buffer.join(&CELL_SEPARATOR.to_string());

        let exact = self.find_exact(&prefix, mode);
        let continuation = format!("{prefix}{CELL_SEPARATOR}");
        let longer = self
            .entries
            .iter()
            .any(|e| Self::visible(e, mode) && e.dots_key().starts_with(&continuation));

        match self.policy {
            MatchPolicy::Deferred => self.step_deferred(exact, longer),
            MatchPolicy::Immediate => self.step_immediate(exact, longer, mode),
        }
    }

    fn step_deferred(&mut self, exact: Option<E>, longer: bool) -> Step<E> {
        match (exact, longer) {
            (Some(entry), false) => {
                self.buffer.clear();
                self.deferred = None;
                Step::Matched(entry)
            }
            (Some(entry), true) => {
                // A longer indicator is still possible; hold this one.
                self.deferred = Some(entry);
                Step::Pending
            }
            (None, true) if self.buffer.len() < self.max_cells => Step::Pending,
            (None, _) => {
                if let Some(entry) = self.deferred.take() {
                    // The cell that just arrived disproved the longer
                    // sequence; it was never part of the held match.
                    let last = self.buffer.pop().unwrap_or_default();
                    self.buffer.clear();
                    Step::MatchedWithLeftover {
                        entry,
                        leftover: vec![last],
                    }
                } else {
                    Step::NoMatch(mem::take(&mut self.buffer))
                }
            }
        }
    }

    fn step_immediate(&mut self, exact: Option<E>, longer: bool, mode: Mode) -> Step<E> {
        if let Some(entry) = exact {
            if !longer || self.buffer.len() >= self.max_cells {
                self.buffer.clear();
                return Step::Matched(entry);
            }
            return Step::Pending;
        }
        if longer && self.buffer.len() < self.max_cells {
            return Step::Pending;
        }
        // Dead end. Check whether dropping the cell that just arrived
        // leaves an exact match; only the immediately-preceding prefix
        // is inspected, shorter prefixes are not searched.
        if self.buffer.len() >= 2 {
            let preceding = self.buffer[..self.buffer.len() - 1].join(&CELL_SEPARATOR.to_string());
            if let Some(entry) = self.find_exact(&preceding, mode) {
                let last = self.buffer.pop().unwrap_or_default();
                self.buffer.clear();
                return Step::MatchedWithLeftover {
                    entry,
                    leftover: vec![last],
                };
            }
        }
        Step::NoMatch(mem::take(&mut self.buffer))
    }

    fn find_exact(&self, prefix: &str, mode: Mode) -> Option<E> {
        self.entries
            .iter()
            .find(|e| Self::visible(e, mode) && e.dots_key() == prefix)
            .cloned()
    }

    fn visible(entry: &E, mode: Mode) -> bool {
        match entry.mode() {
            Some(m) => m == mode || m == Mode::BASE,
            None => true,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Returns the buffered cells in push order and drops any held
    /// match.
    pub fn flush_pending(&mut self) -> Vec<String> {
        self.deferred = None;
        mem::take(&mut self.buffer)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.deferred = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IndicatorAction, IndicatorKind, Modifier, Scope};

    fn indicator(id: &str, dots_key: &str) -> Indicator {
        Indicator {
            id: id.to_string(),
            cells: dots_key.split('|').map(str::to_string).collect(),
            dots_key: dots_key.to_string(),
            action: IndicatorAction::Enter,
            target_mode: Mode::Grade1,
            scope: Scope::Symbol,
            kind: IndicatorKind::Modifier,
            modifier: Some(Modifier::Capital),
            tags: Vec::new(),
        }
    }

    fn entry(id: &str, dots_key: &str, print: &str, mode: Mode) -> MultiCellEntry {
        MultiCellEntry {
            id: id.to_string(),
            cells: dots_key.split('|').map(str::to_string).collect(),
            dots_key: dots_key.to_string(),
            print: print.to_string(),
            mode,
            role: "punctuation".to_string(),
        }
    }

    fn deferred_matcher(entries: Vec<Indicator>) -> PrefixMatcher<Indicator> {
        PrefixMatcher::new(Arc::new(entries), MatchPolicy::Deferred)
    }

    fn immediate_matcher(entries: Vec<MultiCellEntry>) -> PrefixMatcher<MultiCellEntry> {
        PrefixMatcher::new(Arc::new(entries), MatchPolicy::Immediate)
    }

    #[test]
    fn unique_exact_match_commits_immediately() {
        let mut m = deferred_matcher(vec![indicator("numeric", "3456")]);
        match m.step("3456", Mode::Grade1) {
            Step::Matched(i) => assert_eq!(i.id, "numeric"),
            other => panic!("expected match, got {other:?}"),
        }
        assert!(!m.has_pending());
    }

    #[test]
    fn short_indicator_defers_while_longer_is_possible() {
        let mut m = deferred_matcher(vec![
            indicator("capital", "6"),
            indicator("capital-word", "6|6"),
        ]);
        assert_eq!(m.step("6", Mode::Grade1), Step::Pending);
        match m.step("6", Mode::Grade1) {
            Step::Matched(i) => assert_eq!(i.id, "capital-word"),
            other => panic!("expected capital-word, got {other:?}"),
        }
    }

    #[test]
    fn deferred_match_commits_with_leftover_on_dead_end() {
        let mut m = deferred_matcher(vec![
            indicator("capital", "6"),
            indicator("capital-word", "6|6"),
        ]);
        assert_eq!(m.step("6", Mode::Grade1), Step::Pending);
        match m.step("1", Mode::Grade1) {
            Step::MatchedWithLeftover { entry, leftover } => {
                assert_eq!(entry.id, "capital");
                assert_eq!(leftover, vec!["1".to_string()]);
            }
            other => panic!("expected leftover commit, got {other:?}"),
        }
        assert!(!m.has_pending());
    }

    #[test]
    fn dead_end_without_deferred_returns_buffer_in_order() {
        let mut m = deferred_matcher(vec![indicator("kana", "16|13")]);
        assert_eq!(m.step("16", Mode::Grade1), Step::Pending);
        assert_eq!(
            m.step("25", Mode::Grade1),
            Step::NoMatch(vec!["16".to_string(), "25".to_string()])
        );
    }

    #[test]
    fn single_unknown_cell_is_no_match() {
        let mut m = deferred_matcher(vec![indicator("capital", "6")]);
        assert_eq!(
            m.step("25", Mode::Grade1),
            Step::NoMatch(vec!["25".to_string()])
        );
    }

    #[test]
    fn immediate_policy_waits_while_buffer_can_grow() {
        let mut m = immediate_matcher(vec![
            entry("paren", "5|126", "(", Mode::Grade1),
            entry("paren-big", "5|126|3", "((", Mode::Grade1),
        ]);
        assert_eq!(m.step("5", Mode::Grade1), Step::Pending);
        // Exact match exists but a longer entry is still possible and
        // the buffer is below max_cells.
        assert_eq!(m.step("126", Mode::Grade1), Step::Pending);
        match m.step("3", Mode::Grade1) {
            Step::Matched(e) => assert_eq!(e.id, "paren-big"),
            other => panic!("expected paren-big, got {other:?}"),
        }
    }

    #[test]
    fn immediate_policy_recovers_by_dropping_last_cell() {
        let mut m = immediate_matcher(vec![
            entry("paren", "5|126", "(", Mode::Grade1),
            entry("paren-big", "5|126|3", "((", Mode::Grade1),
        ]);
        m.step("5", Mode::Grade1);
        m.step("126", Mode::Grade1);
        match m.step("14", Mode::Grade1) {
            Step::MatchedWithLeftover { entry, leftover } => {
                assert_eq!(entry.id, "paren");
                assert_eq!(leftover, vec!["14".to_string()]);
            }
            other => panic!("expected recovery, got {other:?}"),
        }
    }

    #[test]
    fn immediate_exact_commits_when_no_longer_candidate() {
        let mut m = immediate_matcher(vec![entry("slash", "456|34", "/", Mode::Grade1)]);
        assert_eq!(m.step("456", Mode::Grade1), Step::Pending);
        match m.step("34", Mode::Grade1) {
            Step::Matched(e) => assert_eq!(e.id, "slash"),
            other => panic!("expected slash, got {other:?}"),
        }
    }

    #[test]
    fn mode_filter_hides_foreign_entries_but_keeps_grade1() {
        let mut m = immediate_matcher(vec![
            entry("kana-seq", "12|34", "x", Mode::Kana),
            entry("base-seq", "45|56", "y", Mode::Grade1),
        ]);
        // Kana entry invisible under grade2.
        assert_eq!(
            m.step("12", Mode::Grade2),
            Step::NoMatch(vec!["12".to_string()])
        );
        // Grade 1 entries stay visible everywhere.
        assert_eq!(m.step("45", Mode::Grade2), Step::Pending);
        match m.step("56", Mode::Grade2) {
            Step::Matched(e) => assert_eq!(e.id, "base-seq"),
            other => panic!("expected base-seq, got {other:?}"),
        }
    }

    #[test]
    fn flush_pending_returns_cells_and_drops_deferred() {
        let mut m = deferred_matcher(vec![
            indicator("capital", "6"),
            indicator("capital-word", "6|6"),
        ]);
        m.step("6", Mode::Grade1);
        assert!(m.has_pending());
        assert_eq!(m.flush_pending(), vec!["6".to_string()]);
        assert!(!m.has_pending());
        // The dropped deferred match must not resurface.
        assert_eq!(
            m.step("25", Mode::Grade1),
            Step::NoMatch(vec!["25".to_string()])
        );
    }

    #[test]
    fn reset_clears_buffer_and_deferred() {
        let mut m = deferred_matcher(vec![indicator("kana", "16|13")]);
        m.step("16", Mode::Grade1);
        m.reset();
        assert!(!m.has_pending());
        assert_eq!(
            m.step("13", Mode::Grade1),
            Step::NoMatch(vec!["13".to_string()])
        );
    }
}
