//! Tri-state evaluation of expression trees against a [`Config`].
//!
//! Evaluation is a pure read of the graph's current (cached) values; all
//! promotion of `m` results when modules are disabled happens in
//! [`Config::eval_expr`], which wraps this.

use crate::config::symbol::SymbolType;
use crate::config::{parse_in_base, Config};
use crate::expr::{Atom, Expr, Relation};
use crate::tristate::Tristate;

pub trait Evaluate {
    fn evaluate(&self, config: &Config) -> Tristate;
}

impl Evaluate for Expr {
    fn evaluate(&self, config: &Config) -> Tristate {
        match self {
            Expr::Atom(atom) => boolean_value(config, atom),
            Expr::Not(e) => e.evaluate(config).not(),
            Expr::And(a, b) => a.evaluate(config).min(b.evaluate(config)),
            Expr::Or(a, b) => a.evaluate(config).max(b.evaluate(config)),
            Expr::Compare(relation, lhs, rhs) => compare(config, *relation, lhs, rhs),
        }
    }
}

/// The tri-state reading of a bare atom: bool/tristate symbols contribute
/// their own value, anything else is `n`. Literals are `n` except for the
/// spellings of the tri-state constants themselves (which the parser
/// normally resolves to the constant symbols anyway).
fn boolean_value(config: &Config, atom: &Atom) -> Tristate {
    match atom {
        Atom::Symbol(id) => match config.effective_type(*id) {
            SymbolType::Bool | SymbolType::Tristate => config
                .value(*id)
                .as_tristate()
                .unwrap_or(Tristate::No),
            _ => Tristate::No,
        },
        Atom::Constant(text) => Tristate::from_name(text).unwrap_or(Tristate::No),
    }
}

/// Reduces an atom to the (type, text) pair comparisons operate on. An
/// undefined symbol's text is its own name.
fn comparable(config: &Config, atom: &Atom) -> (SymbolType, String) {
    match atom {
        Atom::Symbol(id) => (
            config.effective_type(*id),
            config.value(*id).as_str().to_string(),
        ),
        Atom::Constant(text) => (SymbolType::Unknown, text.clone()),
    }
}

/// Numeric reading of one comparison operand. Typed operands use the base
/// their type implies; untyped ones detect a hex marker.
fn number(typ: SymbolType, text: &str) -> Option<i64> {
    match typ {
        SymbolType::Hex => parse_in_base(text, 16),
        SymbolType::Int => parse_in_base(text, 10),
        _ => {
            if text.starts_with("0x") || text.starts_with("0X") {
                parse_in_base(text, 16)
            } else {
                parse_in_base(text, 10)
            }
        }
    }
}

fn compare(config: &Config, relation: Relation, lhs: &Atom, rhs: &Atom) -> Tristate {
    let (lhs_type, lhs_text) = comparable(config, lhs);
    let (rhs_type, rhs_text) = comparable(config, rhs);

    let tri = |b: bool| if b { Tristate::Yes } else { Tristate::No };

    let numeric = matches!(lhs_type, SymbolType::Int | SymbolType::Hex)
        || matches!(rhs_type, SymbolType::Int | SymbolType::Hex);
    if numeric {
        if let (Some(a), Some(b)) = (number(lhs_type, &lhs_text), number(rhs_type, &rhs_text)) {
            return tri(match relation {
                Relation::Equal => a == b,
                Relation::NotEqual => a != b,
                Relation::Less => a < b,
                Relation::LessEq => a <= b,
                Relation::Greater => a > b,
                Relation::GreaterEq => a >= b,
            });
        }
        // One side is numeric-typed and the other does not parse as a
        // number: ordering is undefined, equality falls back to text.
        if !matches!(relation, Relation::Equal | Relation::NotEqual) {
            return Tristate::No;
        }
    }

    // Byte-wise comparison on the textual forms.
    tri(match relation {
        Relation::Equal => lhs_text == rhs_text,
        Relation::NotEqual => lhs_text != rhs_text,
        Relation::Less => lhs_text < rhs_text,
        Relation::LessEq => lhs_text <= rhs_text,
        Relation::Greater => lhs_text > rhs_text,
        Relation::GreaterEq => lhs_text >= rhs_text,
    })
}
