// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::{self, Display};

use crate::location::Location;

/// Errors that abort an operation outright.
///
/// Defects local to one construct (an unmatched delimiter, an unknown
/// group type, a bad modifier letter) never show up here: those are kept
/// inside the tree as `Unknown` elements plus a diagnostic record, and
/// construction still succeeds.
#[derive(Debug, PartialEq, Clone)]
pub enum PerlreError {
    /// The input cannot produce a tree at all, for example an empty
    /// literal or an unsupported operator word.
    SyntaxIncorrect(String),

    /// A message anchored to a position within the pattern text.
    MessageWithLocation(String, Location),

    /// The pattern text ended in the middle of a construct that cannot
    /// be recovered locally.
    UnexpectedEndOfDocument(String),

    /// A fallible search predicate returned an error; the query is
    /// abandoned with no partial result.
    QueryFault(String),
}

impl Display for PerlreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerlreError::SyntaxIncorrect(message) => {
                write!(f, "syntax error: {}", message)
            }
            PerlreError::MessageWithLocation(message, location) => {
                write!(
                    f,
                    "{}, at line {}, column {}",
                    message,
                    location.line + 1,
                    location.column + 1
                )
            }
            PerlreError::UnexpectedEndOfDocument(message) => {
                write!(f, "unexpected end of pattern: {}", message)
            }
            PerlreError::QueryFault(message) => {
                write!(f, "query fault: {}", message)
            }
        }
    }
}

impl std::error::Error for PerlreError {}
