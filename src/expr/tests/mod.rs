use pretty_assertions::assert_eq;

use crate::config::errors::ConfigError;
use crate::config::symbol::SymbolId;
use crate::config::{SYM_M, SYM_N, SYM_Y};
use crate::expr::{parse_tokens, Atom, Expr, ParseOptions, Relation};
use crate::lexer::token::Token;
use crate::lexer::tokenize;

const MODULES: SymbolId = SymbolId(40);

fn resolve(token: &Token) -> Atom {
    let text = match token {
        Token::Word(w) => w,
        Token::Str(s) => s,
        _ => unreachable!(),
    };
    match text.as_str() {
        "n" => Atom::Symbol(SYM_N),
        "m" => Atom::Symbol(SYM_M),
        "y" => Atom::Symbol(SYM_Y),
        other => Atom::Constant(other.to_string()),
    }
}

fn parse(input: &str) -> Result<Expr, ConfigError> {
    let tokens = tokenize(input).map_err(ConfigError::from)?;
    parse_tokens(&tokens, ParseOptions::default(), &mut resolve)
}

fn constant(text: &str) -> Expr {
    Expr::Atom(Atom::Constant(text.to_string()))
}

#[test]
fn precedence_or_is_loosest() {
    assert_eq!(
        parse("A || B && C").unwrap(),
        Expr::or(constant("A"), Expr::and(constant("B"), constant("C")))
    );
}

#[test]
fn parens_override_precedence() {
    assert_eq!(
        parse("(A || B) && C").unwrap(),
        Expr::and(Expr::or(constant("A"), constant("B")), constant("C"))
    );
}

#[test]
fn not_binds_tighter_than_and() {
    assert_eq!(
        parse("!A && B").unwrap(),
        Expr::and(Expr::not(constant("A")), constant("B"))
    );
}

#[test]
fn not_applies_to_a_whole_comparison() {
    assert_eq!(
        parse("!A = B").unwrap(),
        Expr::not(Expr::Compare(
            Relation::Equal,
            Atom::Constant("A".to_string()),
            Atom::Constant("B".to_string()),
        ))
    );
}

#[test]
fn all_relations_parse() {
    for (text, relation) in [
        ("=", Relation::Equal),
        ("!=", Relation::NotEqual),
        ("<", Relation::Less),
        ("<=", Relation::LessEq),
        (">", Relation::Greater),
        (">=", Relation::GreaterEq),
    ] {
        assert_eq!(
            parse(&format!("A {text} B")).unwrap(),
            Expr::Compare(
                relation,
                Atom::Constant("A".to_string()),
                Atom::Constant("B".to_string()),
            ),
            "relation {text}"
        );
    }
}

#[test]
fn malformed_expressions_fail() {
    for input in [
        "", "&", "|", "!", "(", ")", "=", "(X", "X &&", "&& X", "X ||", "|| X", "X = ", "X Y",
        "(X))",
    ] {
        assert!(parse(input).is_err(), "parsing {input:?} should fail");
    }
}

#[test]
fn bare_m_is_tied_to_the_modules_symbol() {
    let tokens = tokenize("m").unwrap();
    let options = ParseOptions::default().transform_m(Some(MODULES));
    assert_eq!(
        parse_tokens(&tokens, options, &mut resolve).unwrap(),
        Expr::and(Expr::symbol(SYM_M), Expr::symbol(MODULES))
    );
}

#[test]
fn m_in_a_comparison_stays_bare() {
    let tokens = tokenize("M = m").unwrap();
    let options = ParseOptions::default().transform_m(Some(MODULES));
    assert_eq!(
        parse_tokens(&tokens, options, &mut resolve).unwrap(),
        Expr::Compare(
            Relation::Equal,
            Atom::Constant("M".to_string()),
            Atom::Symbol(SYM_M),
        )
    );
}

#[test]
fn m_stays_bare_without_transform() {
    assert_eq!(parse("m").unwrap(), Expr::symbol(SYM_M));
}

#[test]
fn referenced_preserves_first_occurrence_order() {
    let expr = Expr::and(
        Expr::or(Expr::symbol(SymbolId(7)), Expr::symbol(SymbolId(5))),
        Expr::symbol(SymbolId(7)),
    );
    assert_eq!(
        expr.referenced(),
        vec![SymbolId(7), SymbolId(5), SymbolId(7)]
    );
}
