//! Tokenizer for the expression language.
//!
//! Used both for expression trees embedded in declarations and for the
//! ad-hoc "evaluate this string against current values" query.

use muncher::Muncher;

use crate::lexer::token::{LexerError, LexerErrorKind, Token};

pub mod token;

#[cfg(test)]
mod tests;

fn is_word_char(c: char) -> bool {
    // Symbol names are [A-Za-z0-9_]; unquoted literals additionally allow
    // signs and dots (negative numbers, version-ish strings).
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

#[inline]
fn scan_word(first_char: char, m: &mut Muncher) -> Token {
    let mut word = String::new();
    word.push(first_char);

    while let Some(&c) = m.peek() {
        if !is_word_char(c) {
            break;
        }
        m.eat();
        word.push(c);
    }

    Token::Word(word)
}

#[inline]
fn scan_string(quote: char, m: &mut Muncher) -> Result<Token, LexerError> {
    let mut value = String::new();

    loop {
        match m.eat() {
            Some('\\') => match m.eat() {
                // A backslash escapes any character, most importantly the
                // closing quote and the backslash itself.
                Some(escaped) => value.push(escaped),
                None => return Err(LexerErrorKind::TrailingEscape.into()),
            },
            Some(c) if c == quote => return Ok(Token::Str(value)),
            Some(c) => value.push(c),
            None => return Err(LexerErrorKind::UnterminatedString.into()),
        }
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    let mut m = Muncher::new(input);
    let mut tokens = Vec::new();

    while let Some(c) = m.eat() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::OpenParen),
            ')' => tokens.push(Token::CloseParen),
            '&' => match m.eat() {
                Some('&') => tokens.push(Token::AndAnd),
                _ => return Err(LexerErrorKind::UnexpectedChar('&').into()),
            },
            '|' => match m.eat() {
                Some('|') => tokens.push(Token::OrOr),
                _ => return Err(LexerErrorKind::UnexpectedChar('|').into()),
            },
            '!' => {
                if let Some(&'=') = m.peek() {
                    m.eat();
                    tokens.push(Token::NotEqual);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => tokens.push(Token::Equal),
            '<' => {
                if let Some(&'=') = m.peek() {
                    m.eat();
                    tokens.push(Token::LessEq);
                } else {
                    tokens.push(Token::Less);
                }
            }
            '>' => {
                if let Some(&'=') = m.peek() {
                    m.eat();
                    tokens.push(Token::GreaterEq);
                } else {
                    tokens.push(Token::Greater);
                }
            }
            '"' | '\'' => tokens.push(scan_string(c, &mut m)?),
            c if is_word_char(c) => tokens.push(scan_word(c, &mut m)),
            c => return Err(LexerErrorKind::UnexpectedChar(c).into()),
        }
    }

    Ok(tokens)
}
