use std::io;

use thiserror::Error;

use crate::lexer::token::LexerError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("syntax error: {message}")]
    Syntax { message: String },

    #[error("malformed assignment line: {line}")]
    MalformedAssignment { line: String },

    #[error("invalid value '{value}' for symbol {symbol}")]
    InvalidUserValue { symbol: String, value: String },

    #[error("i/o error")]
    IoError {
        #[from]
        source: io::Error,
    },
}

impl From<LexerError> for ConfigError {
    fn from(err: LexerError) -> Self {
        ConfigError::Syntax {
            message: err.to_string(),
        }
    }
}

pub type ConfigResult<T> = anyhow::Result<T>;
