//! Command queue construction.
//!
//! Turns grouped statements into `(command, args)` entries. Words are runs
//! of non-whitespace tokens; quotes keep whitespace inside a word and
//! `?name` / `?(name)` splice in variable values. A statement of the form
//! `?name -- value ...` binds a variable instead of queueing a command.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use super::grouper::Statement;
use super::token::{Category, Token};
use crate::error::GroupError;

/// One command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub command: String,
    pub args: Vec<String>,
    /// Source line, 0 when built by hand.
    pub line: usize,
}

impl QueueEntry {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            line: 0,
        }
    }
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if !self.args.is_empty() {
            write!(f, " -- {}", self.args.join(" "))?;
        }
        Ok(())
    }
}

/// Ordered list of command invocations for one configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandQueue {
    entries: Vec<QueueEntry>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueueEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<QueueEntry> for CommandQueue {
    fn from_iter<T: IntoIterator<Item = QueueEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CommandQueue {
    type Item = &'a QueueEntry;
    type IntoIter = std::slice::Iter<'a, QueueEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Variable table used during queue construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any earlier value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut vars = Variables::new();
        for (k, v) in iter {
            vars.set(k, v);
        }
        vars
    }
}

/// Builds a [`CommandQueue`] from statements, tracking variable bindings
/// in file order.
#[derive(Debug, Default)]
pub struct QueueBuilder {
    variables: Variables,
}

impl QueueBuilder {
    pub fn new(variables: Variables) -> Self {
        Self { variables }
    }

    /// Variables as bound after the last statement processed.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Build the queue. Statements that fail to resolve are skipped and
    /// returned as errors.
    pub fn build(&mut self, statements: &[Statement]) -> (CommandQueue, Vec<GroupError>) {
        let mut queue = CommandQueue::new();
        let mut errors = Vec::new();

        for statement in statements {
            match self.statement(statement) {
                Ok(Some(entry)) => queue.push(entry),
                Ok(None) => {}
                Err(err) => {
                    warn!("{err}; statement skipped");
                    errors.push(err);
                }
            }
        }

        (queue, errors)
    }

    fn statement(&mut self, statement: &Statement) -> Result<Option<QueueEntry>, GroupError> {
        let line = statement.line;

        if let Some(name) = binding_target(&statement.flags, line)? {
            let value = self.words(&statement.values, line)?.join(" ");
            debug!("line {line}: ?{name} = {value:?}");
            self.variables.set(name, value);
            return Ok(None);
        }

        let mut flags = self.words(&statement.flags, line)?.into_iter();
        let Some(command) = flags.next().filter(|c| !c.is_empty()) else {
            return Err(GroupError::MissingCommand { line });
        };
        let extra: Vec<String> = flags.collect();
        if !extra.is_empty() {
            warn!(
                "line {line}: ignoring extra words before '--' in '{command}': {}",
                extra.join(" ")
            );
        }

        let args = self.words(&statement.values, line)?;
        Ok(Some(QueueEntry {
            command,
            args,
            line,
        }))
    }

    /// Split a token group into words, resolving quotes and variables.
    fn words(&self, tokens: &[Token], line: usize) -> Result<Vec<String>, GroupError> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut quote: Option<Category> = None;
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            i += 1;

            match (quote, token.category) {
                (Some(open), category) if category == open => quote = None,
                (None, Category::Quote | Category::DoubleQuote) => {
                    quote = Some(token.category);
                    in_word = true;
                }
                (None, Category::Whitespace) => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                (q, Category::Variable) if q != Some(Category::Quote) => {
                    let (name, used) = reference(&tokens[i..], line)?;
                    i += used;
                    match name {
                        None => current.push('?'),
                        Some(name) => match self.variables.get(&name) {
                            Some(value) => current.push_str(value),
                            None => return Err(GroupError::UndefinedVariable { name, line }),
                        },
                    }
                    in_word = true;
                }
                _ => {
                    current.push(token.ch);
                    in_word = true;
                }
            }
        }

        if quote.is_some() {
            return Err(GroupError::UnterminatedQuote { line });
        }
        if in_word {
            words.push(current);
        }
        Ok(words)
    }
}

fn is_name_char(token: &Token) -> bool {
    matches!(token.category, Category::Letter | Category::Number) || token.ch == '_'
}

/// Parse the variable name following a `?`.
///
/// Returns the name (`None` for the `??` escape) and how many tokens it
/// used.
fn reference(rest: &[Token], line: usize) -> Result<(Option<String>, usize), GroupError> {
    match rest.first().map(|t| t.category) {
        Some(Category::Variable) => Ok((None, 1)),
        Some(Category::ParenLeft) => {
            let close = rest
                .iter()
                .position(|t| t.category == Category::ParenRight)
                .ok_or(GroupError::UnclosedReference { line })?;
            let inner = &rest[1..close];
            if inner.is_empty() || !inner.iter().all(is_name_char) {
                return Err(GroupError::EmptyVariableName { line });
            }
            Ok((Some(inner.iter().map(|t| t.ch).collect()), close + 1))
        }
        _ => {
            let used = rest.iter().take_while(|t| is_name_char(t)).count();
            if used == 0 {
                return Err(GroupError::EmptyVariableName { line });
            }
            Ok((Some(rest[..used].iter().map(|t| t.ch).collect()), used))
        }
    }
}

/// Name bound by a `?name -- value` statement, if the flags group is
/// exactly one variable reference.
fn binding_target(flags: &[Token], line: usize) -> Result<Option<String>, GroupError> {
    let start = flags
        .iter()
        .position(|t| t.category != Category::Whitespace)
        .unwrap_or(flags.len());
    let end = flags
        .iter()
        .rposition(|t| t.category != Category::Whitespace)
        .map_or(start, |p| p + 1);
    let trimmed = &flags[start..end];

    match trimmed.split_first() {
        Some((first, rest)) if first.category == Category::Variable => {
            let (name, used) = reference(rest, line)?;
            match name {
                Some(name) if used == rest.len() => Ok(Some(name)),
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}
