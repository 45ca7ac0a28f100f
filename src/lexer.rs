//! On-demand, memoized lexical analysis. `lex(position)` returns
//! the *set* of tokens admitted at a position; the caller (the EPN driver)
//! decides which of them to consume at a given parse slot.
use crate::condition::{Assignment, ConditionCache};
use crate::error::LexicalError;
use crate::terminal::{TerminalId, TerminalTable};
use crate::util::{Code, Log};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub terminal: TerminalId,
    pub start: usize,
    pub end: usize,
}

/// Lexes `code` on demand against a fixed [`TerminalTable`] and a fixed
/// assignment for the session's lifetime. Results are memoized by position,
/// since the assignment never varies within a session.
pub struct Lexer<'g, 'c> {
    terminals: &'g TerminalTable,
    sigma: Assignment,
    conditions: ConditionCache,
    code: &'c Code<'c>,
    memo: RefCell<HashMap<usize, Rc<Vec<Token>>>>,
    debug: Log<&'static str>,
}

impl<'g, 'c> Lexer<'g, 'c> {
    pub fn new(terminals: &'g TerminalTable, sigma: Assignment, code: &'c Code<'c>) -> Self {
        Self {
            terminals,
            sigma,
            conditions: ConditionCache::new(),
            code,
            memo: RefCell::new(HashMap::new()),
            debug: Log::None,
        }
    }

    /// Attaches a debug trace level, printing `[Lexer; ...]` lines under
    /// `#[cfg(debug_assertions)]` as positions are queried.
    pub fn with_debug(mut self, level: Log<&'static str>) -> Self {
        self.debug = level;
        self
    }

    pub fn code(&self) -> &Code<'c> {
        self.code
    }

    /// Returns the set of non-ignorable tokens admitted at `position`, after
    /// skipping ignorables, applying longest match and pruning by precedence.
    /// An empty result with `position < source length` is a lexical error at
    /// that position (not surfaced eagerly — see [`crate::error::SessionError`]).
    pub fn lex(&self, position: usize) -> Result<Rc<Vec<Token>>, LexicalError> {
        if let Some(cached) = self.memo.borrow().get(&position) {
            return Ok(cached.clone());
        }
        let start = self.skip_ignorables(position);
        let tokens = Rc::new(self.admitted_tokens(start));
        self.debug.trace_lex(start, &tokens, self.code);
        self.memo.borrow_mut().insert(position, tokens.clone());
        if tokens.is_empty() && start < self.code.value.len() {
            return Err(LexicalError::new(start));
        }
        Ok(tokens)
    }

    /// Step 1: repeatedly run the longest ignorable match at the current
    /// position until no ignorable advances it further.
    fn skip_ignorables(&self, mut position: usize) -> usize {
        loop {
            let mut best_end = position;
            for id in self.terminals.ids() {
                let terminal = self.terminals.get(id);
                if !terminal.ignorable || !self.admitted(id) {
                    continue;
                }
                if let Some(end) = crate::regex::run(&terminal.nfa, self.code.value, position)
                {
                    best_end = best_end.max(end);
                }
            }
            if best_end == position {
                return position;
            }
            position = best_end;
        }
    }

    /// Steps 2-4: run every admitted non-ignorable terminal, keep only the
    /// longest matches, then prune by precedence.
    fn admitted_tokens(&self, position: usize) -> Vec<Token> {
        let mut hits: Vec<(TerminalId, usize)> = Vec::new();
        for id in self.terminals.ids() {
            let terminal = self.terminals.get(id);
            if terminal.ignorable || !self.admitted(id) {
                continue;
            }
            if let Some(end) = crate::regex::run(&terminal.nfa, self.code.value, position) {
                hits.push((id, end));
            }
        }
        let Some(longest) = hits.iter().map(|(_, end)| *end).max() else {
            return Vec::new();
        };
        let survivors: Vec<TerminalId> = hits
            .into_iter()
            .filter(|(_, end)| *end == longest)
            .map(|(id, _)| id)
            .collect();

        let pruned: Vec<TerminalId> = survivors
            .iter()
            .copied()
            .filter(|&candidate| {
                !survivors.iter().any(|&other| {
                    other != candidate && self.terminals.beats(other, candidate)
                })
            })
            .collect();

        pruned
            .into_iter()
            .map(|terminal| Token {
                terminal,
                start: position,
                end: longest,
            })
            .collect()
    }

    fn admitted(&self, id: TerminalId) -> bool {
        self.terminals.is_admitted(id, &self.sigma, &self.conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::regex::compile;
    use crate::terminal::Terminal;

    fn terminal(
        name: &str,
        pattern: &str,
        ignorable: bool,
        condition: Condition,
        includes: Vec<&str>,
        excludes: Vec<&str>,
    ) -> Terminal {
        Terminal {
            name: name.to_string(),
            nfa: compile(pattern, 0, name).unwrap(),
            condition,
            ignorable,
            includes: includes.into_iter().map(String::from).collect(),
            excludes: excludes.into_iter().map(String::from).collect(),
            punctuation: false,
        }
    }

    #[test]
    fn ignorable_then_on_demand_lexing() {
        let ws = terminal("Ws", "[ ]+", true, Condition::True, vec![], vec![]);
        let a = terminal("a", "a", false, Condition::True, vec![], vec![]);
        let b = terminal("b", "b", false, Condition::True, vec![], vec![]);
        let table = TerminalTable::build(vec![ws, a, b]).unwrap();
        let code = Code::new(b"a   b");
        let lexer = Lexer::new(&table, Assignment::new(), &code);

        let at_zero = lexer.lex(0).unwrap();
        assert_eq!(at_zero.len(), 1);
        assert_eq!(at_zero[0].start, 0);
        assert_eq!(at_zero[0].end, 1);

        let at_one = lexer.lex(1).unwrap();
        assert_eq!(at_one.len(), 1);
        assert_eq!(at_one[0].start, 4);
        assert_eq!(at_one[0].end, 5);
    }

    #[test]
    fn conditional_precedence_picks_keyword_over_identifier() {
        let kw = terminal(
            "Kw",
            "if",
            false,
            Condition::atom("lexical"),
            vec!["Id"],
            vec![],
        );
        let id = terminal("Id", "[A-Za-z]+", false, Condition::True, vec![], vec![]);
        let table = TerminalTable::build(vec![kw, id]).unwrap();
        let code = Code::new(b"if");

        let mut on = Assignment::new();
        on.set("lexical", true);
        let lexer_on = Lexer::new(&table, on, &code);
        let tokens = lexer_on.lex(0).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(table.get(tokens[0].terminal).name, "Kw");

        let lexer_off = Lexer::new(&table, Assignment::new(), &code);
        let tokens = lexer_off.lex(0).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(table.get(tokens[0].terminal).name, "Id");
    }
}
