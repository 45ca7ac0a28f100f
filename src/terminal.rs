//! Per-terminal metadata: NFA, static condition, ignorable flag, and the
//! precedence DAG used to break longest-match ties.
use crate::condition::{Assignment, Condition, ConditionCache};
use crate::error::GrammarLoadError;
use crate::regex::Nfa;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalId(pub usize);

/// `(name, nfa, static_condition, ignorable, includes, excludes)`.
///
/// `includes` lists terminals this one specializes (`+Name`: wins on tie);
/// `excludes` lists terminals this one generalizes (`-Name`: loses on tie).
pub struct Terminal {
    pub name: String,
    pub nfa: Nfa,
    pub condition: Condition,
    pub ignorable: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    /// Purely syntactic terminals (braces, commas, keywords used only as
    /// markers) that the AST builder elides rather than keeping as leaves.
    pub punctuation: bool,
}

/// All declared terminals plus the precomputed transitive closure of their
/// precedence relation, resolved once at grammar load.
pub struct TerminalTable {
    terminals: Vec<Terminal>,
    name_to_id: HashMap<String, TerminalId>,
    /// `beats[t]` is the set of terminals that `t` wins against on a
    /// longest-match tie: the transitive closure of `includes` edges, unioned
    /// with the terminals that list `t` in their `excludes`.
    beats: Vec<HashSet<TerminalId>>,
}

impl TerminalTable {
    pub fn build(terminals: Vec<Terminal>) -> Result<Self, GrammarLoadError> {
        let name_to_id: HashMap<String, TerminalId> = terminals
            .iter()
            .enumerate()
            .map(|(idx, terminal)| (terminal.name.clone(), TerminalId(idx)))
            .collect();

        let mut edges: Vec<HashSet<TerminalId>> = vec![HashSet::new(); terminals.len()];
        for (idx, terminal) in terminals.iter().enumerate() {
            for include in &terminal.includes {
                let target = *name_to_id
                    .get(include)
                    .ok_or_else(|| GrammarLoadError::UndefinedTerminal(include.clone()))?;
                edges[idx].insert(target);
            }
            for exclude in &terminal.excludes {
                let target = *name_to_id
                    .get(exclude)
                    .ok_or_else(|| GrammarLoadError::UndefinedTerminal(exclude.clone()))?;
                edges[target.0].insert(TerminalId(idx));
            }
        }

        let beats = close_precedence(&edges)?;

        Ok(Self {
            terminals,
            name_to_id,
            beats,
        })
    }

    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn get(&self, id: TerminalId) -> &Terminal {
        &self.terminals[id.0]
    }

    pub fn id_of(&self, name: &str) -> Option<TerminalId> {
        self.name_to_id.get(name).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = TerminalId> {
        (0..self.terminals.len()).map(TerminalId)
    }

    /// `winner` beats `loser` on a longest-match tie.
    pub fn beats(&self, winner: TerminalId, loser: TerminalId) -> bool {
        self.beats[winner.0].contains(&loser)
    }

    pub fn is_admitted(&self, id: TerminalId, sigma: &Assignment, cache: &ConditionCache) -> bool {
        cache.evaluate(&self.terminals[id.0].condition, id.0, sigma)
    }
}

/// Computes the transitive closure of the "beats" graph and rejects it if a
/// cycle makes the relation fail to be a strict partial order, resolving the
/// precedence open question by explicit detection rather than silent
/// acceptance.
fn close_precedence(
    edges: &[HashSet<TerminalId>],
) -> Result<Vec<HashSet<TerminalId>>, GrammarLoadError> {
    let n = edges.len();
    let mut closure: Vec<HashSet<TerminalId>> = edges.to_vec();
    // Floyd-Warshall-style closure over a boolean adjacency relation.
    for k in 0..n {
        let reaches_k: Vec<TerminalId> = (0..n)
            .filter(|&i| closure[i].contains(&TerminalId(k)))
            .map(TerminalId)
            .collect();
        if reaches_k.is_empty() {
            continue;
        }
        let via_k: HashSet<TerminalId> = closure[k].clone();
        for i in reaches_k {
            closure[i.0].extend(via_k.iter().copied());
        }
    }
    for i in 0..n {
        if closure[i].contains(&TerminalId(i)) {
            let cycle = reconstruct_cycle(edges, TerminalId(i));
            return Err(GrammarLoadError::CyclicPrecedence(cycle));
        }
    }
    Ok(closure)
}

fn reconstruct_cycle(edges: &[HashSet<TerminalId>], start: TerminalId) -> Vec<String> {
    let mut path = vec![start];
    let mut current = start;
    let mut visited = HashSet::new();
    visited.insert(start);
    loop {
        let Some(&next) = edges[current.0].iter().next() else {
            break;
        };
        path.push(next);
        if next == start || !visited.insert(next) {
            break;
        }
        current = next;
    }
    path.iter().map(|id| id.0.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::compile;

    fn terminal(name: &str, pattern: &str, includes: Vec<&str>, excludes: Vec<&str>) -> Terminal {
        Terminal {
            name: name.to_string(),
            nfa: compile(pattern, 0, name).unwrap(),
            condition: Condition::True,
            ignorable: false,
            includes: includes.into_iter().map(String::from).collect(),
            excludes: excludes.into_iter().map(String::from).collect(),
            punctuation: false,
        }
    }

    #[test]
    fn precedence_closure_is_transitive() {
        let a = terminal("A", "a", vec![], vec![]);
        let b = terminal("B", "a", vec!["A"], vec![]); // B specializes A
        let c = terminal("C", "a", vec!["B"], vec![]); // C specializes B
        let table = TerminalTable::build(vec![a, b, c]).unwrap();
        let (a_id, b_id, c_id) = (
            table.id_of("A").unwrap(),
            table.id_of("B").unwrap(),
            table.id_of("C").unwrap(),
        );
        assert!(table.beats(c_id, a_id));
        assert!(table.beats(b_id, a_id));
        assert!(!table.beats(a_id, c_id));
    }

    #[test]
    fn cyclic_precedence_is_rejected() {
        let a = terminal("A", "a", vec!["B"], vec![]);
        let b = terminal("B", "a", vec!["A"], vec![]);
        assert!(matches!(
            TerminalTable::build(vec![a, b]),
            Err(GrammarLoadError::CyclicPrecedence(_))
        ));
    }
}
