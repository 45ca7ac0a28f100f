//! Lowers a parse of the bootstrap grammar (spec.md's concrete meta-language
//! surface) into a target [`GrammarIr`]. Two passes over the flat production
//! list: the first classifies each declared name as a terminal or a
//! non-terminal (a production is a terminal iff its whole body is one bare
//! string-literal atom with no quantifier or alternation), so that the
//! second pass can resolve a bare identifier reference regardless of
//! whether its declaration appears earlier or later in the source.
use crate::condition::Condition;
use crate::error::GrammarLoadError;
use crate::forest::SyntaxForest;
use crate::grammar::{AlternativeSpec, GrammarBuilder, GrammarIr, Separator, SymbolSpec};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
struct Specifiers {
    ignore: bool,
    start: bool,
    includes: Vec<String>,
    excludes: Vec<String>,
}

struct Lowering<'s> {
    bootstrap: &'s GrammarIr,
    source: &'s [u8],
    builder: GrammarBuilder,
    kinds: HashMap<String, bool>,
    lit_counter: usize,
    group_counter: usize,
}

fn children_of(node: &Rc<SyntaxForest>) -> Vec<Rc<SyntaxForest>> {
    match node.as_ref() {
        SyntaxForest::Node { children, .. } => children.clone(),
        SyntaxForest::Token { .. } => Vec::new(),
    }
}

/// Flattens a `{X}`-iteration or `[X]`-optional synthesized non-terminal
/// back into a plain list: both shapes are either empty (nothing matched)
/// or `[element, ...]`/`[element, rest]`, so the same walk handles zero,
/// one, or many repetitions uniformly.
fn flatten_star(node: &Rc<SyntaxForest>) -> Vec<Rc<SyntaxForest>> {
    let children = children_of(node);
    if children.is_empty() {
        return Vec::new();
    }
    let mut out = vec![children[0].clone()];
    if children.len() > 1 {
        out.extend(flatten_star(&children[1]));
    }
    out
}

fn text<'s>(source: &'s [u8], node: &Rc<SyntaxForest>) -> &'s str {
    let (start, end) = node.span();
    std::str::from_utf8(&source[start..end]).unwrap_or("")
}

/// Un-escapes only `\"`, leaving every other backslash sequence (`\\`, `\d`,
/// `\.`, ...) untouched so it reaches [`crate::regex::compile`] exactly as
/// the grammar author wrote it.
fn decode_str_literal(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    inner.replace("\\\"", "\"")
}

fn collect_productions(root: &Rc<SyntaxForest>) -> Vec<Rc<SyntaxForest>> {
    let ch = children_of(root);
    flatten_star(&ch[0])
}

impl<'s> Lowering<'s> {
    fn classify(&mut self, node: &Rc<SyntaxForest>) {
        let ch = children_of(node);
        let name = text(self.source, &ch[0]).to_string();
        let is_terminal = self.as_terminal_pattern(&ch[5]).is_some();
        self.kinds.insert(name, is_terminal);
    }

    /// `Some(pattern)` iff `body` is exactly one bare string-literal atom
    /// with no quantifier and no further alternatives.
    fn as_terminal_pattern(&self, body_node: &Rc<SyntaxForest>) -> Option<String> {
        let bch = children_of(body_node);
        if !flatten_star(&bch[1]).is_empty() {
            return None;
        }
        let sch = children_of(&bch[0]);
        let exprs = flatten_star(&sch[0]);
        if exprs.len() != 1 {
            return None;
        }
        let sech = children_of(&exprs[0]);
        if !flatten_star(&sech[1]).is_empty() {
            return None;
        }
        let atom_children = children_of(&sech[0]);
        match atom_children[0].as_ref() {
            SyntaxForest::Token { terminal, .. }
                if self.bootstrap.terminals.get(*terminal).name == "Str" =>
            {
                Some(decode_str_literal(text(self.source, &atom_children[0])))
            }
            _ => None,
        }
    }

    fn lower_production(&mut self, node: &Rc<SyntaxForest>) {
        let ch = children_of(node);
        let name = text(self.source, &ch[0]).to_string();
        let specifiers = self.lower_specifiers_opt(&ch[1]);
        let cond = self.lower_cond_guard_opt(&ch[2]);
        let subcond = self.lower_subcond_opt(&ch[3]);
        let condition = match subcond {
            Some(atom_name) => {
                self.builder.declare_condition(atom_name.clone());
                cond.and(Condition::atom(atom_name))
            }
            None => cond,
        };

        let is_terminal = *self.kinds.get(&name).unwrap_or(&false);
        if is_terminal {
            let pattern = self.as_terminal_pattern(&ch[5]).unwrap_or_default();
            self.builder.declare_terminal(
                name,
                pattern,
                condition,
                specifiers.ignore,
                specifiers.includes,
                specifiers.excludes,
                false,
            );
        } else {
            let alternatives = self.lower_body(&ch[5]);
            self.builder
                .declare_non_terminal(name, specifiers.start, condition, alternatives);
        }
    }

    fn lower_specifiers_opt(&mut self, node: &Rc<SyntaxForest>) -> Specifiers {
        match flatten_star(node).first() {
            None => Specifiers::default(),
            Some(paren) => {
                let ch = children_of(paren);
                self.lower_specifier_list(&ch[1])
            }
        }
    }

    fn lower_specifier_list(&mut self, node: &Rc<SyntaxForest>) -> Specifiers {
        let ch = children_of(node);
        let mut specs = vec![ch[0].clone()];
        for tail in flatten_star(&ch[1]) {
            let tch = children_of(&tail);
            specs.push(tch[1].clone());
        }
        let mut out = Specifiers::default();
        for spec in &specs {
            self.apply_specifier(spec, &mut out);
        }
        out
    }

    fn apply_specifier(&self, node: &Rc<SyntaxForest>, out: &mut Specifiers) {
        let ch = children_of(node);
        match ch[0].as_ref() {
            SyntaxForest::Node { non_terminal, .. } => {
                let nname = self.bootstrap.non_terminal(*non_terminal).name.as_str();
                let gch = children_of(&ch[0]);
                match nname {
                    "PlusSpec" => out.includes.push(text(self.source, &gch[1]).to_string()),
                    "MinusSpec" => out.excludes.push(text(self.source, &gch[1]).to_string()),
                    _ => {}
                }
            }
            SyntaxForest::Token { terminal, .. } => {
                match self.bootstrap.terminals.get(*terminal).name.as_str() {
                    "KwIgnore" => out.ignore = true,
                    "KwStart" => out.start = true,
                    _ => {}
                }
            }
        }
    }

    fn lower_cond_guard_opt(&mut self, node: &Rc<SyntaxForest>) -> Condition {
        match flatten_star(node).first() {
            None => Condition::True,
            Some(guard) => {
                let ch = children_of(guard);
                self.lower_cond(&ch[1])
            }
        }
    }

    fn lower_subcond_opt(&mut self, node: &Rc<SyntaxForest>) -> Option<String> {
        let sub = flatten_star(node).first()?.clone();
        let ch = children_of(&sub);
        match ch[0].as_ref() {
            SyntaxForest::Token { terminal, .. } => {
                if self.bootstrap.terminals.get(*terminal).name == "KwLexical" {
                    Some("lexical".to_string())
                } else {
                    Some("syntactic".to_string())
                }
            }
            _ => None,
        }
    }

    fn lower_cond(&mut self, node: &Rc<SyntaxForest>) -> Condition {
        match node.as_ref() {
            SyntaxForest::Node { non_terminal, .. } => {
                let nname = self.bootstrap.non_terminal(*non_terminal).name.clone();
                let ch = children_of(node);
                match nname.as_str() {
                    "Cond" => self.lower_cond(&ch[0]),
                    "CondOr" => {
                        if ch.len() == 3 {
                            self.lower_cond(&ch[0]).or(self.lower_cond(&ch[2]))
                        } else {
                            self.lower_cond(&ch[0])
                        }
                    }
                    "CondAnd" => {
                        if ch.len() == 3 {
                            self.lower_cond(&ch[0]).and(self.lower_cond(&ch[2]))
                        } else {
                            self.lower_cond(&ch[0])
                        }
                    }
                    "CondNot" => {
                        if ch.len() == 2 {
                            self.lower_cond(&ch[1]).not()
                        } else {
                            self.lower_cond(&ch[0])
                        }
                    }
                    "CondAtom" => {
                        if ch.len() == 1 {
                            let name = text(self.source, &ch[0]).to_string();
                            self.builder.declare_condition(name.clone());
                            Condition::atom(name)
                        } else {
                            self.lower_cond(&ch[1])
                        }
                    }
                    _ => Condition::True,
                }
            }
            SyntaxForest::Token { .. } => Condition::True,
        }
    }

    fn lower_body(&mut self, node: &Rc<SyntaxForest>) -> Vec<AlternativeSpec> {
        let ch = children_of(node);
        let mut alternatives = vec![AlternativeSpec {
            symbols: self.lower_sequence(&ch[0]),
            condition: Condition::True,
            separator_before: None,
        }];
        for pair in flatten_star(&ch[1]) {
            let pch = children_of(&pair);
            let separator = self.sep_of(&pch[0]);
            alternatives.push(AlternativeSpec {
                symbols: self.lower_sequence(&pch[1]),
                condition: Condition::True,
                separator_before: Some(separator),
            });
        }
        alternatives
    }

    fn sep_of(&self, node: &Rc<SyntaxForest>) -> Separator {
        let ch = children_of(node);
        match ch[0].as_ref() {
            SyntaxForest::Token { terminal, .. }
                if self.bootstrap.terminals.get(*terminal).name == "Pipe" =>
            {
                Separator::Ambiguous
            }
            _ => Separator::Ordered,
        }
    }

    fn lower_sequence(&mut self, node: &Rc<SyntaxForest>) -> Vec<SymbolSpec> {
        let ch = children_of(node);
        flatten_star(&ch[0])
            .iter()
            .map(|expr| self.lower_symbol_expr(expr))
            .collect()
    }

    fn lower_symbol_expr(&mut self, node: &Rc<SyntaxForest>) -> SymbolSpec {
        let ch = children_of(node);
        let atom = self.lower_atom(&ch[0]);
        match flatten_star(&ch[1]).first() {
            None => atom,
            Some(quant) => self.apply_quantifier(atom, quant),
        }
    }

    fn lower_atom(&mut self, node: &Rc<SyntaxForest>) -> SymbolSpec {
        let ch = children_of(node);
        match ch[0].as_ref() {
            SyntaxForest::Token { terminal, .. } => {
                let tname = self.bootstrap.terminals.get(*terminal).name.clone();
                let raw = text(self.source, &ch[0]);
                if tname == "Str" {
                    let pattern = decode_str_literal(raw);
                    let fresh = format!("$lit{}", self.lit_counter);
                    self.lit_counter += 1;
                    self.builder.declare_terminal(
                        fresh.clone(),
                        pattern,
                        Condition::True,
                        false,
                        vec![],
                        vec![],
                        false,
                    );
                    SymbolSpec::Terminal(fresh)
                } else {
                    let name = raw.to_string();
                    if *self.kinds.get(&name).unwrap_or(&false) {
                        SymbolSpec::Terminal(name)
                    } else {
                        SymbolSpec::NonTerminal(name)
                    }
                }
            }
            SyntaxForest::Node { non_terminal, .. } => {
                let nname = self.bootstrap.non_terminal(*non_terminal).name.clone();
                let gch = children_of(&ch[0]);
                match nname.as_str() {
                    "IterAtom" => {
                        let inner = self.lower_symbol_expr(&gch[1]);
                        SymbolSpec::Iteration {
                            inner: Box::new(inner),
                            left_fold: false,
                        }
                    }
                    "IterFoldAtom" => {
                        let inner = self.lower_symbol_expr(&gch[2]);
                        SymbolSpec::Iteration {
                            inner: Box::new(inner),
                            left_fold: true,
                        }
                    }
                    "OptAtom" => {
                        let inner = self.lower_symbol_expr(&gch[1]);
                        SymbolSpec::Optional {
                            inner: Box::new(inner),
                            ordered: false,
                        }
                    }
                    "OptFoldAtom" => {
                        let inner = self.lower_symbol_expr(&gch[2]);
                        SymbolSpec::Optional {
                            inner: Box::new(inner),
                            ordered: true,
                        }
                    }
                    "GroupAtom" => {
                        let alternatives = self.lower_body(&gch[1]);
                        let fresh = format!("$group{}", self.group_counter);
                        self.group_counter += 1;
                        self.builder
                            .declare_non_terminal(fresh.clone(), false, Condition::True, alternatives);
                        SymbolSpec::NonTerminal(fresh)
                    }
                    _ => SymbolSpec::NonTerminal(nname),
                }
            }
        }
    }

    /// `node` is the `Quantifier` wrapper; unwrap its single child (the
    /// actual `Star`/`PlusOp`/`Question` token or `BoundedQuant` node) before
    /// inspecting it.
    fn apply_quantifier(&self, atom: SymbolSpec, node: &Rc<SyntaxForest>) -> SymbolSpec {
        let quant = children_of(node)[0].clone();
        match quant.as_ref() {
            SyntaxForest::Token { terminal, .. } => {
                match self.bootstrap.terminals.get(*terminal).name.as_str() {
                    "Star" => SymbolSpec::Quantified {
                        inner: Box::new(atom),
                        min: 0,
                        max: None,
                    },
                    "PlusOp" => SymbolSpec::Quantified {
                        inner: Box::new(atom),
                        min: 1,
                        max: None,
                    },
                    "Question" => SymbolSpec::Quantified {
                        inner: Box::new(atom),
                        min: 0,
                        max: Some(1),
                    },
                    _ => atom,
                }
            }
            SyntaxForest::Node { .. } => {
                // BoundedQuant: `{m}` | `{m,}` | `{m,n}`.
                let ch = children_of(&quant);
                let (min, max) = match ch.len() {
                    3 => (self.number_of(&ch[1]), Some(self.number_of(&ch[1]))),
                    4 => (self.number_of(&ch[1]), None),
                    5 => (self.number_of(&ch[1]), Some(self.number_of(&ch[3]))),
                    _ => (0, None),
                };
                SymbolSpec::Quantified {
                    inner: Box::new(atom),
                    min,
                    max,
                }
            }
        }
    }

    fn number_of(&self, node: &Rc<SyntaxForest>) -> u32 {
        text(self.source, node).parse().unwrap_or(0)
    }
}

/// Lowers every `ProductionDecl` reachable from `roots[0]` (the bootstrap
/// grammar has a single start symbol and no genuine top-level ambiguity for
/// well-formed input) into a freshly built [`GrammarIr`].
pub fn lower(
    bootstrap: &GrammarIr,
    source: &[u8],
    roots: &[Rc<SyntaxForest>],
) -> Result<GrammarIr, GrammarLoadError> {
    let root = roots.first().ok_or(GrammarLoadError::NoStartSymbol)?;
    let productions = collect_productions(root);

    let mut lowering = Lowering {
        bootstrap,
        source,
        builder: GrammarBuilder::new(),
        kinds: HashMap::new(),
        lit_counter: 0,
        group_counter: 0,
    };
    for production in &productions {
        lowering.classify(production);
    }
    for production in &productions {
        lowering.lower_production(production);
    }
    lowering.builder.build()
}
