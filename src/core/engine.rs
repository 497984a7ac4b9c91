// File: src/core/engine.rs
use crate::core::chord::{ChordAggregator, DEFAULT_CHORD_TIMEOUT_MS};
use crate::core::dots::{key_to_unicode, Chord};
use crate::core::matcher::{MatchPolicy, PrefixMatcher, Step};
use crate::core::state::{IndicatorEffect, ModeState};
use crate::core::types::{
    Indicator, IndicatorAction, Mode, ModeChange, Modifier, MultiCellEntry, UnifiedTables,
};
use crate::overlay::OverlayTracker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Dots 3+6: the kana corner bracket, which alternates open/close.
const KANA_BRACKET_KEY: &str = "36";
const KANA_OPEN_BRACKET: &str = "\u{300c}";
const KANA_CLOSE_BRACKET: &str = "\u{300d}";

/// Emission is best-effort: the host may have nowhere to put text. The
/// engine reports the failure, never retries, and keeps its own state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("no active emission target")]
    NoTarget,
    #[error("host rejected emission: {0}")]
    Host(String),
}

/// Runtime-mutable engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chord_timeout: Duration,
    /// Whether the host should render the braille overlay. The tracker
    /// records either way; this is the display flag the host queries.
    pub show_overlay: bool,
    pub startup_mode: Mode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chord_timeout: Duration::from_millis(DEFAULT_CHORD_TIMEOUT_MS),
            show_overlay: true,
            startup_mode: Mode::BASE,
        }
    }
}

/// Where an emission landed in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

/// The editor side of the engine. `emit` inserts print text and returns
/// the position it landed at so the overlay can track it.
pub trait Host {
    fn emit(&mut self, text: &str, dots: &str) -> Result<Position, EmitError>;
    fn mode_changed(&mut self, change: &ModeChange);
}

/// The pipeline driver: wires the aggregator, the two matchers, the
/// mode state machine and the overlay, and owns the ordering law for
/// interpreting chords.
///
/// Multi-cell sequences are tried before indicators: several of them
/// (inner quotation, slash) begin with a cell that is itself an
/// indicator, and checking indicators first would consume the prefix
/// and make the longer sequence unreachable.
pub struct BrailleEngine {
    tables: UnifiedTables,
    aggregator: ChordAggregator,
    multi_matcher: PrefixMatcher<MultiCellEntry>,
    indicator_matcher: PrefixMatcher<Indicator>,
    state: ModeState,
    overlay: OverlayTracker,
    show_overlay: bool,
    numeric_mode: bool,
    kana_bracket_open: bool,
    emit_failures: u64,
}

impl BrailleEngine {
    pub fn new(tables: UnifiedTables) -> Self {
        Self::with_mode(tables, Mode::BASE)
    }

    pub fn with_mode(tables: UnifiedTables, mode: Mode) -> Self {
        Self::with_config(
            tables,
            EngineConfig {
                startup_mode: mode,
                ..EngineConfig::default()
            },
        )
    }

    pub fn with_config(tables: UnifiedTables, config: EngineConfig) -> Self {
        let multi_matcher =
            PrefixMatcher::new(Arc::clone(&tables.multi_cell), MatchPolicy::Immediate);
        let indicator_matcher =
            PrefixMatcher::new(Arc::clone(&tables.indicators), MatchPolicy::Deferred);
        let mut aggregator = ChordAggregator::new();
        aggregator.set_timeout(config.chord_timeout);
        Self {
            tables,
            aggregator,
            multi_matcher,
            indicator_matcher,
            state: ModeState::with_mode(config.startup_mode),
            overlay: OverlayTracker::new(),
            show_overlay: config.show_overlay,
            numeric_mode: false,
            kana_bracket_open: false,
            emit_failures: 0,
        }
    }

    /// Feeds one dot-press event from the host keybindings.
    pub fn press(&mut self, dot: u8, now: Instant, host: &mut dyn Host) {
        for chord in self.aggregator.press(dot, now) {
            self.process_chord(chord, host);
        }
    }

    /// Alias for the host's `dotInput` command.
    pub fn dot_input(&mut self, dot: u8, now: Instant, host: &mut dyn Host) {
        self.press(dot, now, host);
    }

    /// Delivers the pending chord if its quiescence deadline has passed.
    pub fn poll(&mut self, now: Instant, host: &mut dyn Host) {
        if let Some(chord) = self.aggregator.poll(now) {
            self.process_chord(chord, host);
        }
    }

    /// The instant the host should arm its timer for, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.aggregator.deadline()
    }

    /// Commits the pending chord immediately.
    pub fn flush_input(&mut self, host: &mut dyn Host) {
        if let Some(chord) = self.aggregator.flush() {
            self.process_chord(chord, host);
        }
    }

    /// Discards pending dot accumulation without emission.
    pub fn cancel_input(&mut self) {
        self.aggregator.cancel();
    }

    pub fn set_chord_timeout(&mut self, timeout: Duration) {
        self.aggregator.set_timeout(timeout);
    }

    pub fn current_mode(&self) -> Mode {
        self.state.current_mode()
    }

    /// Cycles through the four modes, clearing matcher state. The host
    /// invoked the command, so no mode-change callback fires.
    pub fn toggle_mode(&mut self) -> Mode {
        let next = match self.state.current_mode() {
            Mode::Grade1 => Mode::Grade2,
            Mode::Grade2 => Mode::Kana,
            Mode::Kana => Mode::Nemeth,
            Mode::Nemeth => Mode::Grade1,
        };
        self.state = ModeState::with_mode(next);
        self.multi_matcher.reset();
        self.indicator_matcher.reset();
        self.numeric_mode = false;
        next
    }

    pub fn overlay(&self) -> &OverlayTracker {
        &self.overlay
    }

    /// Flips the overlay display flag and returns the new value.
    pub fn toggle_overlay(&mut self) -> bool {
        self.show_overlay = !self.show_overlay;
        self.show_overlay
    }

    pub fn overlay_visible(&self) -> bool {
        self.show_overlay
    }

    pub fn emit_failures(&self) -> u64 {
        self.emit_failures
    }

    /// Deactivation: drops all pending input, matcher buffers, mode
    /// state, driver flags and the overlay.
    pub fn reset(&mut self) {
        self.aggregator.cancel();
        self.multi_matcher.reset();
        self.indicator_matcher.reset();
        self.state.reset();
        self.overlay.clear();
        self.numeric_mode = false;
        self.kana_bracket_open = false;
    }

    /// Interprets one closed chord.
    pub fn process_chord(&mut self, chord: Chord, host: &mut dyn Host) {
        match chord {
            Chord::Space => self.handle_space(host),
            Chord::Cell(set) => {
                let key = set.key();
                self.offer_multi_cell(&key, host);
            }
        }
    }

    /// Stage 2: the multi-cell matcher sees every cell first.
    fn offer_multi_cell(&mut self, key: &str, host: &mut dyn Host) {
        match self.multi_matcher.step(key, self.state.current_mode()) {
            Step::Matched(entry) => self.emit_multi_cell(&entry, host),
            Step::MatchedWithLeftover { entry, leftover } => {
                self.emit_multi_cell(&entry, host);
                for cell in leftover {
                    self.offer_indicator(&cell, host);
                }
            }
            Step::Pending => {}
            Step::NoMatch(cells) => {
                for cell in cells {
                    self.offer_indicator(&cell, host);
                }
            }
        }
    }

    /// Stage 3: indicators.
    fn offer_indicator(&mut self, key: &str, host: &mut dyn Host) {
        match self.indicator_matcher.step(key, self.state.current_mode()) {
            Step::Matched(ind) => self.apply_indicator(&ind, host),
            Step::MatchedWithLeftover { entry, leftover } => {
                self.apply_indicator(&entry, host);
                for cell in leftover {
                    self.emit_single_cell(&cell, host);
                }
            }
            Step::Pending => {}
            Step::NoMatch(cells) => {
                for cell in cells {
                    self.emit_single_cell(&cell, host);
                }
            }
        }
    }

    fn apply_indicator(&mut self, ind: &Indicator, host: &mut dyn Host) {
        if let IndicatorEffect::Changed(change) = self.state.apply_indicator(ind) {
            host.mode_changed(&change);
        }
        if ind.modifier == Some(Modifier::Numeric) {
            // The numeric terminator clears the run instead of starting one.
            self.numeric_mode = ind.action == IndicatorAction::Enter;
        }
    }

    fn emit_multi_cell(&mut self, entry: &MultiCellEntry, host: &mut dyn Host) {
        self.numeric_mode = false;
        if self.emit(&entry.print, &entry.dots_key, host) {
            self.notify_character(host);
        }
    }

    /// Stage 4: single-cell character emission.
    fn emit_single_cell(&mut self, key: &str, host: &mut dyn Host) {
        let modifier = self.state.consume_modifier();

        if self.numeric_mode || modifier == Some(Modifier::Numeric) {
            if let Some(mapping) = self.tables.numeric.get(key) {
                let print = mapping.print.clone();
                if self.emit(&print, key, host) {
                    self.notify_character(host);
                }
                self.numeric_mode = true;
                return;
            }
            // First non-numeric cell ends the run.
            self.numeric_mode = false;
        }

        let mut print = self.lookup_print(key);
        if self.state.current_mode() == Mode::Kana && key == KANA_BRACKET_KEY {
            print = if self.kana_bracket_open {
                KANA_CLOSE_BRACKET
            } else {
                KANA_OPEN_BRACKET
            }
            .to_string();
            self.kana_bracket_open = !self.kana_bracket_open;
        }
        if modifier == Some(Modifier::Capital) {
            print = print.to_uppercase();
        }

        if self.emit(&print, key, host) {
            self.notify_character(host);
        }
        self.numeric_mode = false;
    }

    /// Mode lookup with grade-1 fallback; unknown keys come out as the
    /// literal braille glyph.
    fn lookup_print(&self, key: &str) -> String {
        if let Some(cell) = self.tables.cells.get(key) {
            if let Some(mapping) = cell.mappings.get(&self.state.current_mode()) {
                return mapping.print.clone();
            }
            if let Some(mapping) = cell.mappings.get(&Mode::BASE) {
                return mapping.print.clone();
            }
        }
        key_to_unicode(key)
    }

    fn handle_space(&mut self, host: &mut dyn Host) {
        // Drain pending matcher state through the later stages first.
        for cell in self.multi_matcher.flush_pending() {
            self.offer_indicator(&cell, host);
        }
        for cell in self.indicator_matcher.flush_pending() {
            self.emit_single_cell(&cell, host);
        }

        self.emit(" ", "", host);
        if let Some(change) = self.state.on_space() {
            host.mode_changed(&change);
        }
        self.numeric_mode = false;
    }

    fn notify_character(&mut self, host: &mut dyn Host) {
        if let Some(change) = self.state.on_character_emitted() {
            host.mode_changed(&change);
        }
    }

    /// Best-effort emission. On failure the character is dropped: no
    /// overlay record, no character notification, no retry.
    fn emit(&mut self, text: &str, dots: &str, host: &mut dyn Host) -> bool {
        match host.emit(text, dots) {
            Ok(pos) => {
                if dots.is_empty() {
                    self.overlay.record_space(pos.line, pos.col);
                } else {
                    self.overlay.record(pos.line, pos.col, dots);
                }
                true
            }
            Err(err) => {
                self.emit_failures += 1;
                warn!(%err, text, "emission failed");
                false
            }
        }
    }
}
