use thiserror::Error;

/// A token of the expression language. Words carry symbol names or unquoted
/// literals; `Str` carries the unescaped contents of a quoted string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Str(String),
    Not,
    AndAnd,
    OrOr,
    OpenParen,
    CloseParen,
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl Token {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Token::Equal
                | Token::NotEqual
                | Token::Less
                | Token::LessEq
                | Token::Greater
                | Token::GreaterEq
        )
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{kind}")]
pub struct LexerError {
    pub(super) kind: LexerErrorKind,
}

impl LexerError {
    pub fn kind(&self) -> &LexerErrorKind {
        &self.kind
    }
}

impl From<LexerErrorKind> for LexerError {
    fn from(kind: LexerErrorKind) -> Self {
        LexerError { kind }
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum LexerErrorKind {
    #[error("unterminated quoted string")]
    UnterminatedString,
    #[error("trailing backslash with nothing to escape")]
    TrailingEscape,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
}
