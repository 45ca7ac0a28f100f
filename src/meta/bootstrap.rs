//! The hand-authored grammar for the meta-language surface itself:
//! productions, specifiers, guards, body alternation, iteration/optional
//! sugar and quantifiers. Built directly with [`GrammarBuilder`] rather than
//! from a `.aether` source file, since this *is* the bootstrap the rest of
//! [`crate::meta`] runs to parse every other grammar, including, eventually,
//! a rewritten copy of itself.
use crate::condition::Condition;
use crate::grammar::{AlternativeSpec, GrammarBuilder, GrammarIr, Separator, SymbolSpec};
use crate::error::GrammarLoadError;

fn term(name: &str) -> SymbolSpec {
    SymbolSpec::Terminal(name.to_string())
}

fn nt(name: &str) -> SymbolSpec {
    SymbolSpec::NonTerminal(name.to_string())
}

fn seq(symbols: Vec<SymbolSpec>) -> AlternativeSpec {
    AlternativeSpec {
        symbols,
        condition: Condition::True,
        separator_before: None,
    }
}

fn seq_sep(symbols: Vec<SymbolSpec>, separator: Separator) -> AlternativeSpec {
    AlternativeSpec {
        symbols,
        condition: Condition::True,
        separator_before: Some(separator),
    }
}

fn iter0(inner: SymbolSpec) -> SymbolSpec {
    SymbolSpec::Iteration {
        inner: Box::new(inner),
        left_fold: false,
    }
}

fn opt(inner: SymbolSpec) -> SymbolSpec {
    SymbolSpec::Optional {
        inner: Box::new(inner),
        ordered: true,
    }
}

/// The bootstrap grammar: `MetaGrammar: { ProductionDecl } ;` down through
/// condition expressions. Mirrors spec.md §6's concrete syntax: production
/// headers with specifiers/guards/sub-conditions, `|`/`/`-separated bodies,
/// `{X}`/`{/X}`/`[X]`/`[/X]` sugar and `* + ? {m,n}` quantifiers on atoms.
pub fn grammar() -> Result<GrammarIr, GrammarLoadError> {
    let mut b = GrammarBuilder::new();

    // Lexical surface.
    b.declare_terminal("Ws", r"[ \t\r\n]+", Condition::True, true, vec![], vec![], true);
    b.declare_terminal("Comment", "#[^\n]*", Condition::True, true, vec![], vec![], true);

    b.declare_terminal("Ident", "[A-Za-z_][A-Za-z0-9_]*", Condition::True, false, vec![], vec![], false);
    b.declare_terminal(
        "Str",
        r#""([^"\\]|\\.)*""#,
        Condition::True,
        false,
        vec![],
        vec![],
        false,
    );
    b.declare_terminal("Number", "[0-9]+", Condition::True, false, vec![], vec![], false);

    // Keywords specialize Ident on a longest-match tie.
    b.declare_terminal("KwIgnore", "ignore", Condition::True, false, vec!["Ident".into()], vec![], false);
    b.declare_terminal("KwStart", "start", Condition::True, false, vec!["Ident".into()], vec![], false);
    b.declare_terminal("KwLexical", r"@lexical", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("KwSyntactic", r"@syntactic", Condition::True, false, vec![], vec![], false);

    b.declare_terminal("Colon", ":", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("Semi", ";", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("Pipe", r"\|", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("Slash", r"/", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("LParen", r"\(", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("RParen", r"\)", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("LBracket", r"\[", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("RBracket", r"\]", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("LBrace", r"\{", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("RBrace", r"\}", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("Star", r"\*", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("PlusOp", r"\+", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("Question", r"\?", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("Comma", ",", Condition::True, false, vec![], vec![], true);
    b.declare_terminal("Minus", "-", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("Bang", "!", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("AndAnd", "&&", Condition::True, false, vec![], vec![], false);
    b.declare_terminal("OrOr", r"\|\|", Condition::True, false, vec!["Pipe".into()], vec![], false);

    // MetaGrammar: { ProductionDecl } ;
    b.declare_non_terminal(
        "MetaGrammar",
        true,
        Condition::True,
        vec![seq(vec![iter0(nt("ProductionDecl"))])],
    );

    // ProductionDecl: Ident [ParenSpecifiers] [CondGuard] [SubCond] Colon Body Semi ;
    b.declare_non_terminal(
        "ProductionDecl",
        false,
        Condition::True,
        vec![seq(vec![
            term("Ident"),
            opt(nt("ParenSpecifiers")),
            opt(nt("CondGuard")),
            opt(nt("SubCond")),
            term("Colon"),
            nt("Body"),
            term("Semi"),
        ])],
    );

    // ParenSpecifiers: LParen SpecifierList RParen ;
    b.declare_non_terminal(
        "ParenSpecifiers",
        false,
        Condition::True,
        vec![seq(vec![term("LParen"), nt("SpecifierList"), term("RParen")])],
    );

    // CondGuard: Slash Cond ;
    b.declare_non_terminal(
        "CondGuard",
        false,
        Condition::True,
        vec![seq(vec![term("Slash"), nt("Cond")])],
    );

    // SubCond: KwLexical | KwSyntactic ;
    b.declare_non_terminal(
        "SubCond",
        false,
        Condition::True,
        vec![seq(vec![term("KwLexical")]), seq(vec![term("KwSyntactic")])],
    );

    // SpecifierList: Specifier { Comma Specifier } ;
    b.declare_non_terminal(
        "SpecifierList",
        false,
        Condition::True,
        vec![seq(vec![
            nt("Specifier"),
            iter0(nt("SpecifierTail")),
        ])],
    );
    b.declare_non_terminal(
        "SpecifierTail",
        false,
        Condition::True,
        vec![seq(vec![term("Comma"), nt("Specifier")])],
    );

    // Specifier: PlusSpec | MinusSpec | KwIgnore | KwStart ;
    b.declare_non_terminal(
        "Specifier",
        false,
        Condition::True,
        vec![
            seq(vec![nt("PlusSpec")]),
            seq(vec![nt("MinusSpec")]),
            seq(vec![term("KwIgnore")]),
            seq(vec![term("KwStart")]),
        ],
    );
    b.declare_non_terminal(
        "PlusSpec",
        false,
        Condition::True,
        vec![seq(vec![term("PlusOp"), term("Ident")])],
    );
    b.declare_non_terminal(
        "MinusSpec",
        false,
        Condition::True,
        vec![seq(vec![term("Minus"), term("Ident")])],
    );

    // Condition expressions, left-recursive to exercise seed-and-grow.
    // CondOr: CondOr OrOr CondAnd | CondAnd ;
    b.declare_non_terminal(
        "CondOr",
        false,
        Condition::True,
        vec![
            seq(vec![nt("CondOr"), term("OrOr"), nt("CondAnd")]),
            seq(vec![nt("CondAnd")]),
        ],
    );
    // CondAnd: CondAnd AndAnd CondNot | CondNot ;
    b.declare_non_terminal(
        "CondAnd",
        false,
        Condition::True,
        vec![
            seq(vec![nt("CondAnd"), term("AndAnd"), nt("CondNot")]),
            seq(vec![nt("CondNot")]),
        ],
    );
    // CondNot: Bang CondNot | CondAtom ;
    b.declare_non_terminal(
        "CondNot",
        false,
        Condition::True,
        vec![
            seq(vec![term("Bang"), nt("CondNot")]),
            seq(vec![nt("CondAtom")]),
        ],
    );
    // CondAtom: Ident | LParen Cond RParen ;
    b.declare_non_terminal(
        "CondAtom",
        false,
        Condition::True,
        vec![
            seq(vec![term("Ident")]),
            seq(vec![term("LParen"), nt("Cond"), term("RParen")]),
        ],
    );
    // Cond: CondOr ;
    b.declare_non_terminal(
        "Cond",
        false,
        Condition::True,
        vec![seq(vec![nt("CondOr")])],
    );

    // Body: Sequence { BodyPair } ;
    b.declare_non_terminal(
        "Body",
        false,
        Condition::True,
        vec![seq(vec![nt("Sequence"), iter0(nt("BodyPair"))])],
    );
    // BodyPair: SepTok Sequence ;
    b.declare_non_terminal(
        "BodyPair",
        false,
        Condition::True,
        vec![seq(vec![nt("SepTok"), nt("Sequence")])],
    );
    // SepTok: Pipe | Slash ;
    b.declare_non_terminal(
        "SepTok",
        false,
        Condition::True,
        vec![
            seq(vec![term("Pipe")]),
            seq_sep(vec![term("Slash")], Separator::Ambiguous),
        ],
    );

    // Sequence: { SymbolExpr } ;
    b.declare_non_terminal(
        "Sequence",
        false,
        Condition::True,
        vec![seq(vec![iter0(nt("SymbolExpr"))])],
    );

    // SymbolExpr: Atom [Quantifier] ;
    b.declare_non_terminal(
        "SymbolExpr",
        false,
        Condition::True,
        vec![seq(vec![nt("Atom"), opt(nt("Quantifier"))])],
    );

    // Quantifier: Star | PlusOp | Question | BoundedQuant ;
    b.declare_non_terminal(
        "Quantifier",
        false,
        Condition::True,
        vec![
            seq(vec![term("Star")]),
            seq(vec![term("PlusOp")]),
            seq(vec![term("Question")]),
            seq(vec![nt("BoundedQuant")]),
        ],
    );
    // BoundedQuant: LBrace Number RBrace
    //             | LBrace Number Comma RBrace
    //             | LBrace Number Comma Number RBrace ;
    b.declare_non_terminal(
        "BoundedQuant",
        false,
        Condition::True,
        vec![
            seq(vec![term("LBrace"), term("Number"), term("RBrace")]),
            seq(vec![
                term("LBrace"),
                term("Number"),
                term("Comma"),
                term("RBrace"),
            ]),
            seq(vec![
                term("LBrace"),
                term("Number"),
                term("Comma"),
                term("Number"),
                term("RBrace"),
            ]),
        ],
    );

    // Atom: Str | Ident | IterAtom | IterFoldAtom | OptAtom | OptFoldAtom | GroupAtom ;
    b.declare_non_terminal(
        "Atom",
        false,
        Condition::True,
        vec![
            seq(vec![term("Str")]),
            seq(vec![term("Ident")]),
            seq(vec![nt("IterAtom")]),
            seq(vec![nt("IterFoldAtom")]),
            seq(vec![nt("OptAtom")]),
            seq(vec![nt("OptFoldAtom")]),
            seq(vec![nt("GroupAtom")]),
        ],
    );
    b.declare_non_terminal(
        "IterAtom",
        false,
        Condition::True,
        vec![seq(vec![term("LBrace"), nt("SymbolExpr"), term("RBrace")])],
    );
    b.declare_non_terminal(
        "IterFoldAtom",
        false,
        Condition::True,
        vec![seq(vec![
            term("LBrace"),
            term("Slash"),
            nt("SymbolExpr"),
            term("RBrace"),
        ])],
    );
    b.declare_non_terminal(
        "OptAtom",
        false,
        Condition::True,
        vec![seq(vec![term("LBracket"), nt("SymbolExpr"), term("RBracket")])],
    );
    b.declare_non_terminal(
        "OptFoldAtom",
        false,
        Condition::True,
        vec![seq(vec![
            term("LBracket"),
            term("Slash"),
            nt("SymbolExpr"),
            term("RBracket"),
        ])],
    );
    b.declare_non_terminal(
        "GroupAtom",
        false,
        Condition::True,
        vec![seq(vec![term("LParen"), nt("Body"), term("RParen")])],
    );

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_grammar_builds() {
        grammar().unwrap();
    }
}
