//! Expression trees and the recursive-descent parser that builds them from
//! token streams.
//!
//! Precedence, lowest to highest: `||`, `&&`, `!`, comparisons, atoms and
//! parenthesized sub-expressions. Atoms are resolved to graph entries (or
//! left as literal constants) by the caller-provided resolver, so the parser
//! itself stays independent of graph bookkeeping.

use crate::config::errors::ConfigError;
use crate::config::symbol::SymbolId;
use crate::config::SYM_M;
use crate::lexer::token::Token;

pub mod evaluate;

#[cfg(test)]
mod tests;

/// A leaf of an expression: either a graph symbol or a bare literal. A
/// literal behaves as a constant whose value is its own spelling, which is
/// also how names that resolve to nothing behave in ad-hoc evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Atom {
    Symbol(SymbolId),
    Constant(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Relation {
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Atom(Atom),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Relation, Atom, Atom),
}

impl Expr {
    pub fn not(e: Expr) -> Expr {
        Expr::Not(Box::new(e))
    }

    pub fn and(a: Expr, b: Expr) -> Expr {
        Expr::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Expr, b: Expr) -> Expr {
        Expr::Or(Box::new(a), Box::new(b))
    }

    pub fn symbol(id: SymbolId) -> Expr {
        Expr::Atom(Atom::Symbol(id))
    }

    /// Symbols mentioned by this expression, in first-occurrence order,
    /// duplicates included (callers de-duplicate as needed).
    pub fn referenced(&self) -> Vec<SymbolId> {
        fn walk(expr: &Expr, out: &mut Vec<SymbolId>) {
            match expr {
                Expr::Atom(atom) => walk_atom(atom, out),
                Expr::Not(e) => walk(e, out),
                Expr::And(a, b) | Expr::Or(a, b) => {
                    walk(a, out);
                    walk(b, out);
                }
                Expr::Compare(_, a, b) => {
                    walk_atom(a, out);
                    walk_atom(b, out);
                }
            }
        }

        fn walk_atom(atom: &Atom, out: &mut Vec<SymbolId>) {
            if let Atom::Symbol(id) = atom {
                out.push(*id);
            }
        }

        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

/// Parse behavior knobs, in the style of an options builder.
#[derive(Copy, Clone, Debug, Default)]
pub struct ParseOptions {
    transform_m: bool,
    modules_sym: Option<SymbolId>,
}

impl ParseOptions {
    /// Rewrite a bare `m` constant used as a boolean operand into
    /// `m && <modules>`. This is what makes `m` collapse to `n` whenever
    /// modules are disabled, while leaving `m` intact as a comparison
    /// operand and in value expressions.
    pub fn transform_m(self, modules_sym: Option<SymbolId>) -> Self {
        ParseOptions {
            transform_m: true,
            modules_sym,
        }
    }
}

pub(crate) fn parse_tokens(
    tokens: &[Token],
    options: ParseOptions,
    resolve: &mut dyn FnMut(&Token) -> Atom,
) -> Result<Expr, ConfigError> {
    Parser {
        tokens,
        pos: 0,
        options,
        resolve,
    }
    .parse()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    options: ParseOptions,
    resolve: &'a mut dyn FnMut(&Token) -> Atom,
}

impl<'a> Parser<'a> {
    fn parse(mut self) -> Result<Expr, ConfigError> {
        if self.tokens.is_empty() {
            return Err(self.syntax_error("empty expression"));
        }
        let expr = self.parse_or()?;
        match self.peek() {
            None => Ok(expr),
            Some(t) => Err(self.syntax_error(&format!("unexpected token {t:?}"))),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn syntax_error(&self, message: &str) -> ConfigError {
        ConfigError::Syntax {
            message: message.to_string(),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConfigError> {
        let mut expr = self.parse_and()?;
        while let Some(Token::OrOr) = self.peek() {
            self.bump();
            expr = Expr::or(expr, self.parse_and()?);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ConfigError> {
        let mut expr = self.parse_factor()?;
        while let Some(Token::AndAnd) = self.peek() {
            self.bump();
            expr = Expr::and(expr, self.parse_factor()?);
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Atom, ConfigError> {
        match self.bump() {
            Some(token @ (Token::Word(_) | Token::Str(_))) => Ok((self.resolve)(token)),
            Some(t) => Err(self.syntax_error(&format!("expected a symbol or literal, got {t:?}"))),
            None => Err(self.syntax_error("expected a symbol or literal, got end of input")),
        }
    }

    fn parse_factor(&mut self) -> Result<Expr, ConfigError> {
        match self.peek() {
            Some(Token::Not) => {
                self.bump();
                Ok(Expr::not(self.parse_factor()?))
            }
            Some(Token::OpenParen) => {
                self.bump();
                let expr = self.parse_or()?;
                match self.bump() {
                    Some(Token::CloseParen) => Ok(expr),
                    _ => Err(self.syntax_error("unbalanced parenthesis")),
                }
            }
            Some(Token::Word(_) | Token::Str(_)) => {
                let atom = self.parse_atom()?;
                if self.peek().is_some_and(Token::is_relational) {
                    let relation = match self.bump() {
                        Some(Token::Equal) => Relation::Equal,
                        Some(Token::NotEqual) => Relation::NotEqual,
                        Some(Token::Less) => Relation::Less,
                        Some(Token::LessEq) => Relation::LessEq,
                        Some(Token::Greater) => Relation::Greater,
                        Some(Token::GreaterEq) => Relation::GreaterEq,
                        _ => unreachable!(),
                    };
                    let rhs = self.parse_atom()?;
                    Ok(Expr::Compare(relation, atom, rhs))
                } else {
                    Ok(self.boolean_atom(atom))
                }
            }
            Some(t) => Err(self.syntax_error(&format!("unexpected token {t:?}"))),
            None => Err(self.syntax_error("unexpected end of expression")),
        }
    }

    /// A bare atom used as a boolean operand. This is the one spot where the
    /// `m` constant gets tied to the modules symbol.
    fn boolean_atom(&self, atom: Atom) -> Expr {
        if self.options.transform_m && atom == Atom::Symbol(SYM_M) {
            if let Some(modules) = self.options.modules_sym {
                return Expr::and(Expr::Atom(atom), Expr::symbol(modules));
            }
        }
        Expr::Atom(atom)
    }
}
