//! Character classification for configuration text.
//!
//! The lexer is stateless: every character is looked up in a fixed table
//! and mapped to exactly one [`Category`]. Characters missing from the
//! table are reported as [`LexError`]s and dropped.

use log::warn;

use super::token::{Category, Token};
use crate::error::LexError;

/// Look up the category of a single character.
pub fn classify(ch: char) -> Option<Category> {
    let category = match ch {
        '\\' => Category::Backslash,
        '#' => Category::Comment,
        '\'' => Category::Quote,
        '"' => Category::DoubleQuote,
        '?' => Category::Variable,
        '(' => Category::ParenLeft,
        ')' => Category::ParenRight,
        '-' => Category::Dash,
        ' ' | '\t' => Category::Whitespace,
        '\n' | ';' => Category::Newline,
        c if c.is_ascii_alphabetic() => Category::Letter,
        c if c.is_ascii_digit() => Category::Number,
        c if c.is_ascii_punctuation() => Category::Punctuation,
        _ => return None,
    };
    Some(category)
}

/// Tokenize configuration text.
///
/// Returns the tokens in input order together with one error per
/// unmapped character.
pub fn lex(text: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens = Vec::with_capacity(text.len());
    let mut errors = Vec::new();
    let mut line = 1;

    for (offset, ch) in text.chars().enumerate() {
        match classify(ch) {
            Some(category) => tokens.push(Token::new(category, ch)),
            None => {
                let err = LexError { ch, offset, line };
                warn!("{err}");
                errors.push(err);
            }
        }
        if ch == '\n' {
            line += 1;
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(text: &str) -> Vec<Category> {
        lex(text).0.into_iter().map(|t| t.category).collect()
    }

    #[test]
    fn test_single_characters_map_to_one_token() {
        let table = [
            ('a', Category::Letter),
            ('Z', Category::Letter),
            ('7', Category::Number),
            ('/', Category::Punctuation),
            ('.', Category::Punctuation),
            ('_', Category::Punctuation),
            ('\\', Category::Backslash),
            ('#', Category::Comment),
            ('\'', Category::Quote),
            ('"', Category::DoubleQuote),
            ('?', Category::Variable),
            ('(', Category::ParenLeft),
            (')', Category::ParenRight),
            ('-', Category::Dash),
            (' ', Category::Whitespace),
            ('\t', Category::Whitespace),
            ('\n', Category::Newline),
            (';', Category::Newline),
        ];

        for (ch, expected) in table {
            let (tokens, errors) = lex(&ch.to_string());
            assert!(errors.is_empty(), "{ch:?} should be mapped");
            assert_eq!(tokens, vec![Token::new(expected, ch)], "for {ch:?}");
        }
    }

    #[test]
    fn test_every_ascii_punctuation_is_mapped() {
        for ch in (0u8..=127).map(char::from).filter(|c| c.is_ascii_punctuation()) {
            assert!(classify(ch).is_some(), "{ch:?} should be mapped");
        }
    }

    #[test]
    fn test_unmapped_character_is_reported_and_dropped() {
        let (tokens, errors) = lex("\u{7}");
        assert!(tokens.is_empty());
        assert_eq!(
            errors,
            vec![LexError {
                ch: '\u{7}',
                offset: 0,
                line: 1
            }]
        );
    }

    #[test]
    fn test_unmapped_character_does_not_abort() {
        let (tokens, errors) = lex("ab\nc\u{e9}d");
        let text: String = tokens.iter().map(|t| t.ch).collect();
        assert_eq!(text, "ab\ncd");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].offset, 4);
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn test_order_matches_input() {
        assert_eq!(
            categories("cp -- a1"),
            vec![
                Category::Letter,
                Category::Letter,
                Category::Whitespace,
                Category::Dash,
                Category::Dash,
                Category::Whitespace,
                Category::Letter,
                Category::Number,
            ]
        );
    }
}
