// File: src/core/state.rs
use crate::core::types::{
    Indicator, IndicatorAction, IndicatorKind, Mode, ModeChange, ModeChangeTrigger, Modifier,
    Scope,
};

/// What applying an indicator did to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorEffect {
    /// A pending modifier was set; the mode is unchanged.
    ModifierSet,
    ModifierCleared,
    Changed(ModeChange),
    /// Already in the requested state, or exit at base with an empty
    /// stack.
    NoOp,
}

/// Tracks the active braille system, the stack of modes to return to,
/// the scope of the current switch, and the pending one-shot modifier.
///
/// Scope semantics: `symbol` lasts exactly one emitted character, `word`
/// until the next space, `passage` until an explicit exit indicator.
#[derive(Debug, Clone)]
pub struct ModeState {
    current: Mode,
    initial: Mode,
    stack: Vec<Mode>,
    active_scope: Option<Scope>,
    symbol_count: u32,
    pending_modifier: Option<Modifier>,
}

impl ModeState {
    pub fn new() -> Self {
        Self::with_mode(Mode::BASE)
    }

    pub fn with_mode(mode: Mode) -> Self {
        Self {
            current: mode,
            initial: mode,
            stack: Vec::new(),
            active_scope: None,
            symbol_count: 0,
            pending_modifier: None,
        }
    }

    pub fn current_mode(&self) -> Mode {
        self.current
    }

    pub fn active_scope(&self) -> Option<Scope> {
        self.active_scope
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn pending_modifier(&self) -> Option<Modifier> {
        self.pending_modifier
    }

    pub fn apply_indicator(&mut self, ind: &Indicator) -> IndicatorEffect {
        if ind.kind == IndicatorKind::Modifier {
            return match ind.action {
                IndicatorAction::Enter => {
                    self.pending_modifier = ind.modifier;
                    IndicatorEffect::ModifierSet
                }
                IndicatorAction::Exit => {
                    self.pending_modifier = None;
                    IndicatorEffect::ModifierCleared
                }
            };
        }

        match ind.action {
            IndicatorAction::Enter => {
                if self.current == ind.target_mode && self.active_scope == Some(ind.scope) {
                    return IndicatorEffect::NoOp;
                }
                let from = self.current;
                self.stack.push(from);
                self.current = ind.target_mode;
                self.active_scope = Some(ind.scope);
                self.symbol_count = 0;
                IndicatorEffect::Changed(ModeChange {
                    from,
                    to: self.current,
                    trigger: ModeChangeTrigger::Indicator(ind.id.clone()),
                })
            }
            IndicatorAction::Exit => {
                // An unbalanced exit lands on the session's configured
                // base, the same state reset() restores.
                if self.current == self.initial && self.stack.is_empty() {
                    return IndicatorEffect::NoOp;
                }
                let from = self.current;
                self.current = self.stack.pop().unwrap_or(self.initial);
                self.active_scope = None;
                self.symbol_count = 0;
                IndicatorEffect::Changed(ModeChange {
                    from,
                    to: self.current,
                    trigger: ModeChangeTrigger::Indicator(ind.id.clone()),
                })
            }
        }
    }

    /// Takes the pending modifier, leaving none behind.
    pub fn consume_modifier(&mut self) -> Option<Modifier> {
        self.pending_modifier.take()
    }

    /// Symbol scope lasts exactly one character.
    pub fn on_character_emitted(&mut self) -> Option<ModeChange> {
        if self.active_scope == Some(Scope::Symbol) {
            self.symbol_count += 1;
            if self.symbol_count >= 1 {
                return self.auto_return();
            }
        }
        None
    }

    /// Word scope ends at the next space.
    pub fn on_space(&mut self) -> Option<ModeChange> {
        if self.active_scope == Some(Scope::Word) {
            return self.auto_return();
        }
        None
    }

    fn auto_return(&mut self) -> Option<ModeChange> {
        let from = self.current;
        self.current = self.stack.pop().unwrap_or(self.initial);
        self.active_scope = None;
        self.symbol_count = 0;
        if self.current == from {
            return None;
        }
        Some(ModeChange {
            from,
            to: self.current,
            trigger: ModeChangeTrigger::Auto,
        })
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.stack.clear();
        self.active_scope = None;
        self.symbol_count = 0;
        self.pending_modifier = None;
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enter(id: &str, target: Mode, scope: Scope) -> Indicator {
        Indicator {
            id: id.to_string(),
            cells: vec!["16".to_string()],
            dots_key: "16".to_string(),
            action: IndicatorAction::Enter,
            target_mode: target,
            scope,
            kind: IndicatorKind::ModeSwitch,
            modifier: None,
            tags: Vec::new(),
        }
    }

    fn exit(id: &str) -> Indicator {
        Indicator {
            action: IndicatorAction::Exit,
            ..enter(id, Mode::Grade1, Scope::Passage)
        }
    }

    fn modifier(id: &str, modifier: Modifier, action: IndicatorAction) -> Indicator {
        Indicator {
            kind: IndicatorKind::Modifier,
            modifier: Some(modifier),
            action,
            ..enter(id, Mode::Grade1, Scope::Symbol)
        }
    }

    #[test]
    fn enter_then_exit_restores_previous_state() {
        let mut state = ModeState::new();
        let before = (state.current_mode(), state.active_scope(), state.stack_depth());

        match state.apply_indicator(&enter("kana", Mode::Kana, Scope::Passage)) {
            IndicatorEffect::Changed(change) => {
                assert_eq!(change.from, Mode::Grade1);
                assert_eq!(change.to, Mode::Kana);
            }
            other => panic!("expected change, got {other:?}"),
        }
        assert_eq!(state.current_mode(), Mode::Kana);
        assert_eq!(state.stack_depth(), 1);

        state.apply_indicator(&exit("kana-term"));
        assert_eq!(
            (state.current_mode(), state.active_scope(), state.stack_depth()),
            before
        );
    }

    #[test]
    fn exit_at_base_with_empty_stack_is_noop() {
        let mut state = ModeState::new();
        assert_eq!(state.apply_indicator(&exit("term")), IndicatorEffect::NoOp);
        assert_eq!(state.current_mode(), Mode::Grade1);
    }

    #[test]
    fn bare_exit_from_configured_startup_mode_is_noop() {
        // A session can start in grade 2; an unbalanced terminator must
        // not flip it to grade 1 or fire a mode-change callback.
        let mut state = ModeState::with_mode(Mode::Grade2);
        assert_eq!(state.apply_indicator(&exit("term")), IndicatorEffect::NoOp);
        assert_eq!(state.current_mode(), Mode::Grade2);
        assert_eq!(state.stack_depth(), 0);
    }

    #[test]
    fn exit_returns_to_configured_startup_mode() {
        let mut state = ModeState::with_mode(Mode::Grade2);
        state.apply_indicator(&enter("kana", Mode::Kana, Scope::Passage));
        state.apply_indicator(&exit("kana-term"));
        assert_eq!(state.current_mode(), Mode::Grade2);
    }

    #[test]
    fn reentering_same_mode_and_scope_is_noop() {
        let mut state = ModeState::new();
        let ind = enter("nemeth", Mode::Nemeth, Scope::Passage);
        assert!(matches!(
            state.apply_indicator(&ind),
            IndicatorEffect::Changed(_)
        ));
        assert_eq!(state.apply_indicator(&ind), IndicatorEffect::NoOp);
        assert_eq!(state.stack_depth(), 1);
    }

    #[test]
    fn symbol_scope_returns_after_exactly_one_character() {
        let mut state = ModeState::with_mode(Mode::Grade2);
        state.apply_indicator(&enter("g1-symbol", Mode::Grade1, Scope::Symbol));
        assert_eq!(state.current_mode(), Mode::Grade1);

        let change = state.on_character_emitted().expect("auto-return");
        assert_eq!(change.trigger, ModeChangeTrigger::Auto);
        assert_eq!(state.current_mode(), Mode::Grade2);
        assert_eq!(state.active_scope(), None);

        // A second character changes nothing further.
        assert_eq!(state.on_character_emitted(), None);
    }

    #[test]
    fn word_scope_ends_on_space_not_on_characters() {
        let mut state = ModeState::new();
        state.apply_indicator(&enter("kana-word", Mode::Kana, Scope::Word));

        assert_eq!(state.on_character_emitted(), None);
        assert_eq!(state.on_character_emitted(), None);
        assert_eq!(state.current_mode(), Mode::Kana);

        let change = state.on_space().expect("auto-return on space");
        assert_eq!(change.to, Mode::Grade1);
        assert_eq!(state.current_mode(), Mode::Grade1);
    }

    #[test]
    fn passage_scope_survives_characters_and_spaces() {
        let mut state = ModeState::new();
        state.apply_indicator(&enter("nemeth", Mode::Nemeth, Scope::Passage));
        assert_eq!(state.on_character_emitted(), None);
        assert_eq!(state.on_space(), None);
        assert_eq!(state.current_mode(), Mode::Nemeth);

        state.apply_indicator(&exit("nemeth-term"));
        assert_eq!(state.current_mode(), Mode::Grade1);
    }

    #[test]
    fn nested_modes_pop_in_order() {
        let mut state = ModeState::new();
        state.apply_indicator(&enter("kana", Mode::Kana, Scope::Passage));
        state.apply_indicator(&enter("nemeth", Mode::Nemeth, Scope::Passage));
        assert_eq!(state.stack_depth(), 2);

        state.apply_indicator(&exit("term"));
        assert_eq!(state.current_mode(), Mode::Kana);
        state.apply_indicator(&exit("term"));
        assert_eq!(state.current_mode(), Mode::Grade1);
    }

    #[test]
    fn modifier_sets_and_consumes_without_mode_change() {
        let mut state = ModeState::new();
        assert_eq!(
            state.apply_indicator(&modifier("cap", Modifier::Capital, IndicatorAction::Enter)),
            IndicatorEffect::ModifierSet
        );
        assert_eq!(state.current_mode(), Mode::Grade1);
        assert_eq!(state.consume_modifier(), Some(Modifier::Capital));
        assert_eq!(state.consume_modifier(), None);
    }

    #[test]
    fn modifier_exit_clears_pending() {
        let mut state = ModeState::new();
        state.apply_indicator(&modifier("cap", Modifier::Capital, IndicatorAction::Enter));
        assert_eq!(
            state.apply_indicator(&modifier(
                "cap-term",
                Modifier::Capital,
                IndicatorAction::Exit
            )),
            IndicatorEffect::ModifierCleared
        );
        assert_eq!(state.consume_modifier(), None);
    }

    #[test]
    fn reset_restores_initial_mode() {
        let mut state = ModeState::with_mode(Mode::Grade2);
        state.apply_indicator(&enter("kana", Mode::Kana, Scope::Word));
        state.apply_indicator(&modifier("num", Modifier::Numeric, IndicatorAction::Enter));
        state.reset();

        assert_eq!(state.current_mode(), Mode::Grade2);
        assert_eq!(state.stack_depth(), 0);
        assert_eq!(state.active_scope(), None);
        assert_eq!(state.pending_modifier(), None);
    }
}
