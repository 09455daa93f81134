//! Token categories for the configuration language.

use std::fmt;

/// Lexical category of a single input character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Letter,
    Number,
    Punctuation,
    /// `\` - escapes the following token.
    Backslash,
    /// `#` - comment to end of line.
    Comment,
    /// `'`
    Quote,
    /// `"`
    DoubleQuote,
    /// `?` - variable sigil.
    Variable,
    ParenLeft,
    ParenRight,
    /// `-` - a pair forms the `--` group delimiter.
    Dash,
    Whitespace,
    /// `\n` or `;` - statement terminator.
    Newline,
}

impl Category {
    /// Categories that steer the grouper rather than carry text.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            Category::Dash | Category::Backslash | Category::Newline | Category::Comment
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Letter => "LETTER",
            Category::Number => "NUMBER",
            Category::Punctuation => "PUNCTUATION",
            Category::Backslash => "BACKSLASH",
            Category::Comment => "COMMENT",
            Category::Quote => "QUOTE",
            Category::DoubleQuote => "DOUBLE_QUOTE",
            Category::Variable => "VARIABLE",
            Category::ParenLeft => "PAREN_LEFT",
            Category::ParenRight => "PAREN_RIGHT",
            Category::Dash => "DASH",
            Category::Whitespace => "WHITESPACE",
            Category::Newline => "NEWLINE",
        };
        f.write_str(name)
    }
}

/// One classified character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub category: Category,
    pub ch: char,
}

impl Token {
    pub fn new(category: Category, ch: char) -> Self {
        Self { category, ch }
    }

    /// Same character, reclassified as plain text.
    ///
    /// Used for escaped tokens so later stages treat them literally.
    pub fn literal(self) -> Self {
        let category = match self.category {
            Category::Letter | Category::Number => self.category,
            _ => Category::Punctuation,
        };
        Self {
            category,
            ch: self.ch,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.category, self.ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display_uses_upper_snake_case() {
        assert_eq!(Category::DoubleQuote.to_string(), "DOUBLE_QUOTE");
        assert_eq!(Category::ParenLeft.to_string(), "PAREN_LEFT");
        assert_eq!(Category::Newline.to_string(), "NEWLINE");
    }

    #[test]
    fn test_literal_strips_control_meaning() {
        let dash = Token::new(Category::Dash, '-');
        assert_eq!(dash.literal(), Token::new(Category::Punctuation, '-'));

        let quote = Token::new(Category::DoubleQuote, '"');
        assert_eq!(quote.literal().category, Category::Punctuation);

        let space = Token::new(Category::Whitespace, ' ');
        assert_eq!(space.literal(), Token::new(Category::Punctuation, ' '));

        let letter = Token::new(Category::Letter, 'a');
        assert_eq!(letter.literal(), letter);
    }

    #[test]
    fn test_control_categories() {
        assert!(Category::Dash.is_control());
        assert!(Category::Comment.is_control());
        assert!(!Category::Variable.is_control());
        assert!(!Category::Letter.is_control());
    }
}
