// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::PerlreError;
use crate::location::Origin;

/// Parses the Perl fragment inside `(?{...})`, `(??{...})`, and `s///e`
/// replacements. The tree never interprets such fragments itself; a
/// collaborator may, and whatever it returns is stored on the element as
/// an opaque handle.
///
/// When the pattern was parsed with an [`Origin`] anchor, `anchor` is
/// that anchor resolved to the embedded-code element, so the
/// collaborator can report positions in the enclosing document.
///
/// A collaborator failure is a local defect: the embedded-code element is
/// tagged unknown and construction of the rest of the tree proceeds.
pub trait CodeParser: Send + Sync {
    fn parse(
        &self,
        fragment: &str,
        anchor: Option<Origin>,
    ) -> Result<Arc<dyn CodeDocument>, PerlreError>;
}

/// The opaque result of parsing an embedded fragment.
pub trait CodeDocument: Debug + Send + Sync {
    /// The fragment text the document was built from.
    fn source(&self) -> &str;
}

/// The do-nothing collaborator: keeps the fragment verbatim.
#[derive(Debug, Default)]
pub struct VerbatimCode;

#[derive(Debug)]
struct VerbatimDocument {
    text: String,
}

impl CodeDocument for VerbatimDocument {
    fn source(&self) -> &str {
        &self.text
    }
}

impl CodeParser for VerbatimCode {
    fn parse(
        &self,
        fragment: &str,
        _anchor: Option<Origin>,
    ) -> Result<Arc<dyn CodeDocument>, PerlreError> {
        Ok(Arc::new(VerbatimDocument {
            text: fragment.to_owned(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{CodeParser, VerbatimCode};

    #[test]
    fn test_verbatim_collaborator() {
        let parser = VerbatimCode;
        let document = parser.parse(" $count++ ", None).unwrap();
        assert_eq!(document.source(), " $count++ ");
    }
}
