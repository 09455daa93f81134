//! The configuration language.
//!
//! ```text
//! # comments run to the end of the line
//! ?out -- ?base/out/?arch           # variable binding
//! mkdir -- ?out/boot ?out/modules
//! copy -- configs/boot/grub.cfg ?out/boot
//! echo -- "staging done for" ?arch; build -- toolchain compile
//! ```
//!
//! Pipeline: [`lexer::lex`] → [`grouper::group`] → [`queue::QueueBuilder`].
//! Every stage degrades gracefully: problems are collected as
//! [`Diagnostics`] and the offending character or statement is skipped.

pub mod grouper;
pub mod lexer;
pub mod queue;
pub mod token;

pub use grouper::{group, Statement};
pub use lexer::lex;
pub use queue::{CommandQueue, QueueBuilder, QueueEntry, Variables};
pub use token::{Category, Token};

use crate::error::{GroupError, LexError};

/// Non-fatal problems found while parsing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub lex: Vec<LexError>,
    pub group: Vec<GroupError>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.lex.is_empty() && self.group.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lex.len() + self.group.len()
    }
}

/// Result of parsing one configuration text.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub queue: CommandQueue,
    pub diagnostics: Diagnostics,
    /// Variables as bound at the end of the file.
    pub variables: Variables,
}

/// Parse configuration text into a command queue.
pub fn parse(text: &str, variables: Variables) -> Parsed {
    let (tokens, lex_errors) = lex(text);
    let statements = group(&tokens);
    let mut builder = QueueBuilder::new(variables);
    let (queue, group_errors) = builder.build(&statements);

    Parsed {
        queue,
        diagnostics: Diagnostics {
            lex: lex_errors,
            group: group_errors,
        },
        variables: builder.variables().clone(),
    }
}
