//! Statement and argument grouping.
//!
//! Splits a token stream into statements and each statement into a flags
//! group and a values group. The split is driven by an explicit state
//! machine:
//!
//! ```text
//!            Dash            Dash
//! InFlags ─────────▶ DashPending ─────────▶ InValues   (and back)
//!    │  Backslash                 any
//!    ├────────────▶ EscapeArmed ──────▶ literal token appended
//!    │  #                         Newline
//!    └────────────▶ InComment ─────────▶ statement closed
//! ```
//!
//! A `Newline` always closes the current statement and returns to the
//! flags group. The very first token of the input is absorbed when it is a
//! dash, backslash or newline.

use super::token::{Category, Token};

/// Which half of a statement tokens are appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Flags,
    Values,
}

impl Group {
    fn toggled(self) -> Self {
        match self {
            Group::Flags => Group::Values,
            Group::Values => Group::Flags,
        }
    }
}

/// Grouper state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No token seen yet.
    Start,
    InFlags,
    InValues,
    /// One dash seen; a second one toggles the group.
    DashPending(Group),
    /// A backslash was seen; the next token is taken literally.
    EscapeArmed(Group),
    /// Discarding tokens up to the end of the line.
    InComment,
}

impl State {
    fn collecting(group: Group) -> Self {
        match group {
            Group::Flags => State::InFlags,
            Group::Values => State::InValues,
        }
    }
}

/// One statement: the tokens before and after its `--` delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement {
    pub flags: Vec<Token>,
    pub values: Vec<Token>,
    /// 1-based line the statement starts on.
    pub line: usize,
}

impl Statement {
    /// True when neither group carries anything but whitespace.
    pub fn is_blank(&self) -> bool {
        self.flags
            .iter()
            .chain(self.values.iter())
            .all(|t| t.category == Category::Whitespace)
    }

    fn group_mut(&mut self, group: Group) -> &mut Vec<Token> {
        match group {
            Group::Flags => &mut self.flags,
            Group::Values => &mut self.values,
        }
    }
}

/// Incremental grouper; feed tokens with [`Grouper::push`].
#[derive(Debug)]
pub struct Grouper {
    state: State,
    current: Statement,
    statements: Vec<Statement>,
    line: usize,
}

impl Default for Grouper {
    fn default() -> Self {
        Self::new()
    }
}

impl Grouper {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            current: Statement {
                line: 1,
                ..Default::default()
            },
            statements: Vec::new(),
            line: 1,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Process one token.
    pub fn push(&mut self, token: Token) {
        match self.state {
            State::Start => {
                self.state = State::InFlags;
                if matches!(
                    token.category,
                    Category::Dash | Category::Backslash | Category::Newline
                ) {
                    self.advance_line(token);
                    return;
                }
                self.collect(Group::Flags, token);
            }
            State::InFlags => self.collect(Group::Flags, token),
            State::InValues => self.collect(Group::Values, token),
            State::DashPending(group) => {
                if token.category == Category::Dash {
                    self.state = State::collecting(group.toggled());
                } else {
                    // Lone dash: dropped, the token is handled as usual.
                    self.collect(group, token);
                }
            }
            State::EscapeArmed(group) => {
                self.state = State::collecting(group);
                if token.category == Category::Newline {
                    self.advance_line(token);
                } else {
                    self.append(group, token.literal());
                }
            }
            State::InComment => {
                if token.category == Category::Newline {
                    self.close_statement();
                    self.advance_line(token);
                }
            }
        }
    }

    /// Close the last statement and return all non-blank statements.
    pub fn finish(mut self) -> Vec<Statement> {
        self.close_statement();
        self.statements
    }

    fn collect(&mut self, group: Group, token: Token) {
        self.state = State::collecting(group);
        if !token.category.is_control() {
            self.append(group, token);
            return;
        }
        match token.category {
            Category::Dash => self.state = State::DashPending(group),
            Category::Backslash => self.state = State::EscapeArmed(group),
            Category::Comment => self.state = State::InComment,
            _ => {
                self.close_statement();
                self.advance_line(token);
            }
        }
    }

    fn append(&mut self, group: Group, token: Token) {
        self.current.group_mut(group).push(token);
    }

    fn close_statement(&mut self) {
        let next = Statement {
            line: self.line,
            ..Default::default()
        };
        let done = std::mem::replace(&mut self.current, next);
        if !done.is_blank() {
            self.statements.push(done);
        }
        self.state = State::InFlags;
    }

    fn advance_line(&mut self, token: Token) {
        if token.ch == '\n' {
            self.line += 1;
        }
        // A statement with nothing in it yet starts on the new line.
        if self.current.flags.is_empty() && self.current.values.is_empty() {
            self.current.line = self.line;
        }
    }
}

/// Group a whole token stream into statements.
pub fn group(tokens: &[Token]) -> Vec<Statement> {
    let mut grouper = Grouper::new();
    for token in tokens {
        grouper.push(*token);
    }
    grouper.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::lexer::lex;

    fn grouped(text: &str) -> Vec<Statement> {
        group(&lex(text).0)
    }

    fn text(tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.ch).collect()
    }

    fn halves(statement: &Statement) -> (String, String) {
        (text(&statement.flags), text(&statement.values))
    }

    #[test]
    fn test_double_dash_splits_flags_and_values() {
        let statements = grouped("mkdir -- /tmp/x\n");
        assert_eq!(statements.len(), 1);
        assert_eq!(halves(&statements[0]), ("mkdir ".into(), " /tmp/x".into()));
    }

    #[test]
    fn test_newline_and_semicolon_close_statements() {
        let statements = grouped("a -- 1\nb -- 2; c -- 3");
        let pairs: Vec<_> = statements.iter().map(halves).collect();
        assert_eq!(
            pairs,
            vec![
                ("a ".into(), " 1".into()),
                ("b ".into(), " 2".into()),
                (" c ".into(), " 3".into()),
            ]
        );
    }

    #[test]
    fn test_final_token_is_kept_without_trailing_newline() {
        let statements = grouped("echo -- ok");
        assert_eq!(halves(&statements[0]).1, " ok");
    }

    #[test]
    fn test_newline_resets_to_flags_group() {
        let statements = grouped("a -- 1\nb");
        assert_eq!(halves(&statements[1]), ("b".into(), String::new()));
    }

    #[test]
    fn test_second_delimiter_returns_to_flags() {
        let statements = grouped("a -- 1 -- b");
        assert_eq!(halves(&statements[0]), ("a  b".into(), " 1 ".into()));
    }

    #[test]
    fn test_lone_dash_is_dropped() {
        let statements = grouped("a -- my-dir");
        assert_eq!(halves(&statements[0]).1, " mydir");
    }

    #[test]
    fn test_leading_marker_is_absorbed() {
        let statements = grouped("-echo -- hi");
        assert_eq!(halves(&statements[0]), ("echo ".into(), " hi".into()));

        let statements = grouped("\necho -- hi");
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].line, 2);
    }

    #[test]
    fn test_leading_double_dash_only_absorbs_first() {
        // First dash absorbed, second one is a lone dash before 'x'.
        let statements = grouped("--x");
        assert_eq!(halves(&statements[0]), ("x".into(), String::new()));
    }

    #[test]
    fn test_escaped_tokens_are_literal() {
        let statements = grouped("echo -- my\\-dir a\\;b c\\ d");
        assert_eq!(halves(&statements[0]).1, " my-dir a;b c d");
        assert!(statements[0]
            .values
            .iter()
            .all(|t| !t.category.is_control()));
    }

    #[test]
    fn test_only_control_tokens_steer_grouping() {
        let all = [
            (Category::Letter, 'b'),
            (Category::Number, '1'),
            (Category::Punctuation, '/'),
            (Category::Backslash, '\\'),
            (Category::Comment, '#'),
            (Category::Quote, '\''),
            (Category::DoubleQuote, '"'),
            (Category::Variable, '?'),
            (Category::ParenLeft, '('),
            (Category::ParenRight, ')'),
            (Category::Dash, '-'),
            (Category::Whitespace, ' '),
            (Category::Newline, ';'),
        ];
        for (category, ch) in all {
            let mut grouper = Grouper::new();
            grouper.push(Token::new(Category::Letter, 'a'));
            grouper.push(Token::new(category, ch));
            let statements = grouper.finish();

            let expected = if category.is_control() {
                "a".to_string()
            } else {
                format!("a{ch}")
            };
            assert_eq!(text(&statements[0].flags), expected, "{category}");
        }
    }

    #[test]
    fn test_escaped_newline_continues_statement() {
        let statements = grouped("echo -- a \\\n b\nnext");
        assert_eq!(statements.len(), 2);
        assert_eq!(halves(&statements[0]).1, " a  b");
        assert_eq!(statements[1].line, 3);
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        let statements = grouped("# setup -- ignored\nmkdir -- out # trailing -- x\n");
        assert_eq!(statements.len(), 1);
        assert_eq!(halves(&statements[0]), ("mkdir ".into(), " out ".into()));
        assert_eq!(statements[0].line, 2);
    }

    #[test]
    fn test_blank_statements_are_dropped() {
        let statements = grouped("\n\n   \n;;echo -- a\n\n");
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].line, 4);
    }

    #[test]
    fn test_grouping_is_idempotent_on_flattened_input() {
        let statements = grouped("copy -- some/src dst\\-dir\n");
        let first = &statements[0];

        let regrouped_flags = group(&first.flags);
        assert_eq!(regrouped_flags.len(), 1);
        assert_eq!(regrouped_flags[0].flags, first.flags);
        assert!(regrouped_flags[0].values.is_empty());

        let regrouped_values = group(&first.values);
        assert_eq!(regrouped_values[0].flags, first.values);
    }

    #[test]
    fn test_state_transitions() {
        let mut grouper = Grouper::new();
        assert_eq!(grouper.state(), State::Start);

        let push = |g: &mut Grouper, category, ch| g.push(Token::new(category, ch));

        push(&mut grouper, Category::Letter, 'a');
        assert_eq!(grouper.state(), State::InFlags);
        push(&mut grouper, Category::Dash, '-');
        assert_eq!(grouper.state(), State::DashPending(Group::Flags));
        push(&mut grouper, Category::Dash, '-');
        assert_eq!(grouper.state(), State::InValues);
        push(&mut grouper, Category::Backslash, '\\');
        assert_eq!(grouper.state(), State::EscapeArmed(Group::Values));
        push(&mut grouper, Category::Dash, '-');
        assert_eq!(grouper.state(), State::InValues);
        push(&mut grouper, Category::Comment, '#');
        assert_eq!(grouper.state(), State::InComment);
        push(&mut grouper, Category::Dash, '-');
        assert_eq!(grouper.state(), State::InComment);
        push(&mut grouper, Category::Newline, '\n');
        assert_eq!(grouper.state(), State::InFlags);

        let statements = grouper.finish();
        assert_eq!(halves(&statements[0]), ("a".into(), "-".into()));
    }
}
