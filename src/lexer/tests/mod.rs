use pretty_assertions::assert_eq;

use crate::lexer::token::{LexerErrorKind, Token};
use crate::lexer::tokenize;

fn lex_one_string(input: &str) -> String {
    match tokenize(input).unwrap().as_slice() {
        [Token::Str(s)] => s.clone(),
        other => panic!("expected a single string token, got {other:?}"),
    }
}

fn lex_fails(input: &str) {
    assert!(tokenize(input).is_err(), "tokenizing {input:?} should fail");
}

#[test]
fn empty_strings() {
    assert_eq!(lex_one_string(r#""""#), "");
    assert_eq!(lex_one_string("''"), "");
}

#[test]
fn plain_strings() {
    assert_eq!(lex_one_string(r#""a""#), "a");
    assert_eq!(lex_one_string("'a'"), "a");
    assert_eq!(lex_one_string(r#""abc""#), "abc");
    assert_eq!(lex_one_string("'abc'"), "abc");
}

#[test]
fn opposite_quote_passes_through() {
    assert_eq!(lex_one_string(r#""'""#), "'");
    assert_eq!(lex_one_string(r#"'"'"#), "\"");
}

#[test]
fn escaped_quotes() {
    assert_eq!(lex_one_string(r#""\"""#), "\"");
    assert_eq!(lex_one_string(r"'\''"), "'");
    assert_eq!(lex_one_string(r#""\"\"""#), "\"\"");
    assert_eq!(lex_one_string(r#""\'""#), "'");
    assert_eq!(lex_one_string(r#"'\"'"#), "\"");
}

#[test]
fn escaped_backslash() {
    assert_eq!(lex_one_string(r#""\\""#), "\\");
    assert_eq!(lex_one_string(r"'\\'"), "\\");
}

#[test]
fn escape_soup() {
    // A backslash escapes any character, not just quotes and backslashes.
    assert_eq!(lex_one_string(r#""\a\\'\b\c\"'d""#), "a\\'bc\"'d");
    assert_eq!(lex_one_string(r#"'\a\\"\b\c\'"d'"#), "a\\\"bc'\"d");
}

#[test]
fn bad_strings() {
    lex_fails(r#"""#);
    lex_fails("'");
    lex_fails(r#""'"#);
    lex_fails(r#"'""#);
    lex_fails(r#""\"#);
    lex_fails(r"'\");
    lex_fails(r#""foo"#);
    lex_fails("'foo");
}

#[test]
fn unterminated_has_the_right_kind() {
    let err = tokenize(r#""foo"#).unwrap_err();
    assert_eq!(*err.kind(), LexerErrorKind::UnterminatedString);

    let err = tokenize(r#""foo\"#).unwrap_err();
    assert_eq!(*err.kind(), LexerErrorKind::TrailingEscape);
}

#[test]
fn operators_and_words() {
    assert_eq!(
        tokenize("(FOO && !BAR) || BAZ != 'qux'").unwrap(),
        vec![
            Token::OpenParen,
            Token::Word("FOO".into()),
            Token::AndAnd,
            Token::Not,
            Token::Word("BAR".into()),
            Token::CloseParen,
            Token::OrOr,
            Token::Word("BAZ".into()),
            Token::NotEqual,
            Token::Str("qux".into()),
        ]
    );
}

#[test]
fn relational_operators() {
    assert_eq!(
        tokenize("A < B <= C > D >= E = F").unwrap(),
        vec![
            Token::Word("A".into()),
            Token::Less,
            Token::Word("B".into()),
            Token::LessEq,
            Token::Word("C".into()),
            Token::Greater,
            Token::Word("D".into()),
            Token::GreaterEq,
            Token::Word("E".into()),
            Token::Equal,
            Token::Word("F".into()),
        ]
    );
}

#[test]
fn negative_numbers_lex_as_words() {
    assert_eq!(
        tokenize("INT_37 < -138").unwrap(),
        vec![
            Token::Word("INT_37".into()),
            Token::Less,
            Token::Word("-138".into()),
        ]
    );
}

#[test]
fn stray_operator_chars_fail() {
    lex_fails("&");
    lex_fails("A & B");
    lex_fails("|");
    lex_fails("$");
}
