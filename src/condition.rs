//! Boolean algebra over a fixed set of condition names.
use crate::error::GrammarLoadError;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A boolean expression over condition names, parsed once at grammar-load
/// time and evaluated many times per session against different assignments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    True,
    Atom(Rc<str>),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn atom(name: impl Into<Rc<str>>) -> Self {
        Condition::Atom(name.into())
    }

    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Every atom this expression refers to, used to validate a grammar
    /// against its declared condition universe at load time.
    pub fn atoms<'a>(&'a self, out: &mut HashSet<&'a str>) {
        match self {
            Condition::True => {}
            Condition::Atom(name) => {
                out.insert(name);
            }
            Condition::Not(inner) => inner.atoms(out),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.atoms(out);
                b.atoms(out);
            }
        }
    }

    /// Whether this expression contains any negation; used by the
    /// condition-monotonicity property.
    pub fn has_negation(&self) -> bool {
        match self {
            Condition::True | Condition::Atom(_) => false,
            Condition::Not(_) => true,
            Condition::And(a, b) | Condition::Or(a, b) => a.has_negation() || b.has_negation(),
        }
    }
}

/// A total boolean assignment over the condition-name universe declared in
/// the grammar IR, supplied by the caller at session open.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    values: HashMap<Rc<str>, bool>,
}

impl Assignment {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<Rc<str>>, value: bool) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> bool {
        self.values.get(name).copied().unwrap_or(false)
    }

    /// Pointwise ordering used by the condition-monotonicity property:
    /// `self <= other` iff every name true under `self` is also true under
    /// `other`.
    pub fn le(&self, other: &Assignment) -> bool {
        self.values
            .iter()
            .all(|(name, value)| !*value || other.get(name))
    }
}

/// Memoizes `evaluate(expr, sigma)` per (expression identity, assignment)
/// pair for the lifetime of one session.
#[derive(Default)]
pub struct ConditionCache {
    cache: RefCell<HashMap<(usize, u64), bool>>,
}

impl ConditionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&self, expr: &Condition, expr_id: usize, sigma: &Assignment) -> bool {
        let key = (expr_id, assignment_hash(sigma));
        if let Some(value) = self.cache.borrow().get(&key) {
            return *value;
        }
        let value = evaluate(expr, sigma);
        self.cache.borrow_mut().insert(key, value);
        value
    }
}

fn assignment_hash(sigma: &Assignment) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut names: Vec<&Rc<str>> = sigma.values.keys().collect();
    names.sort();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for name in names {
        name.hash(&mut hasher);
        sigma.get(name).hash(&mut hasher);
    }
    hasher.finish()
}

/// Pure, total evaluation of an expression against an assignment. Eager;
/// short-circuiting is not observable because atoms have no side effects.
pub fn evaluate(expr: &Condition, sigma: &Assignment) -> bool {
    match expr {
        Condition::True => true,
        Condition::Atom(name) => sigma.get(name),
        Condition::Not(inner) => !evaluate(inner, sigma),
        Condition::And(a, b) => evaluate(a, sigma) && evaluate(b, sigma),
        Condition::Or(a, b) => evaluate(a, sigma) || evaluate(b, sigma),
    }
}

/// Validates that every atom referenced by `expr` is a member of `universe`,
/// the set of condition names declared by the grammar IR.
pub fn validate_against_universe(
    expr: &Condition,
    universe: &HashSet<String>,
) -> Result<(), GrammarLoadError> {
    let mut atoms = HashSet::new();
    expr.atoms(&mut atoms);
    for atom in atoms {
        if !universe.contains(atom) {
            return Err(GrammarLoadError::UndefinedCondition(atom.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_boolean_algebra() {
        let mut sigma = Assignment::new();
        sigma.set("lexical", true);
        sigma.set("strict", false);
        let expr = Condition::atom("lexical").and(Condition::atom("strict").not());
        assert!(evaluate(&expr, &sigma));
    }

    #[test]
    fn assignment_ordering_is_pointwise() {
        let mut small = Assignment::new();
        small.set("a", true);
        let mut big = Assignment::new();
        big.set("a", true);
        big.set("b", true);
        assert!(small.le(&big));
        assert!(!big.le(&small));
    }

    #[test]
    fn cache_memoizes_per_expression_and_assignment() {
        let cache = ConditionCache::new();
        let mut sigma = Assignment::new();
        sigma.set("x", true);
        let expr = Condition::atom("x");
        assert!(cache.evaluate(&expr, 0, &sigma));
        assert!(cache.evaluate(&expr, 0, &sigma));
        assert_eq!(cache.cache.borrow().len(), 1);
    }
}
