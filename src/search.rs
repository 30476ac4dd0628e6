// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Read-only queries over a finished tree.
//!
//! A criterion is asked about every element the walk reaches and
//! answers with one of three outcomes: take the element and keep going,
//! skip it but keep going, or skip its whole subtree. String criteria
//! match kind tags; closures can ask the tree anything.

use crate::element::ElementId;
use crate::error::PerlreError;
use crate::regexp::Regexp;

/// What a criterion says about one element.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FindOutcome {
    /// Collect this element and walk into its children.
    Accept,
    /// Skip this element but walk into its children.
    RejectRecurse,
    /// Skip this element and its whole subtree.
    RejectPrune,
}

/// A search criterion. Implemented for kind-tag strings and for
/// fallible predicates; an `Err` from a predicate aborts the query with
/// no partial result.
pub trait Criterion {
    fn assess(&mut self, regexp: &Regexp, element: ElementId)
        -> Result<FindOutcome, PerlreError>;
}

impl Criterion for &str {
    fn assess(
        &mut self,
        regexp: &Regexp,
        element: ElementId,
    ) -> Result<FindOutcome, PerlreError> {
        if tag_matches(self, regexp.tag(element)) {
            Ok(FindOutcome::Accept)
        } else {
            Ok(FindOutcome::RejectRecurse)
        }
    }
}

impl<F> Criterion for F
where
    F: FnMut(&Regexp, ElementId) -> Result<FindOutcome, PerlreError>,
{
    fn assess(
        &mut self,
        regexp: &Regexp,
        element: ElementId,
    ) -> Result<FindOutcome, PerlreError> {
        self(regexp, element)
    }
}

/// A tag criterion matches the full tag or any suffix that starts at a
/// `::` boundary: `"literal"` matches `"token::literal"`, but
/// `"capture"` does not match `"structure::named_capture"`.
pub(crate) fn tag_matches(criterion: &str, tag: &str) -> bool {
    if criterion == tag {
        return true;
    }
    tag.len() > criterion.len()
        && tag.ends_with(criterion)
        && tag[..tag.len() - criterion.len()].ends_with("::")
}

/// Pre-order walk over the descendants of `start` (`start` itself is
/// not assessed), collecting accepted elements.
pub(crate) fn find_all<C: Criterion>(
    regexp: &Regexp,
    start: ElementId,
    criterion: &mut C,
) -> Result<Vec<ElementId>, PerlreError> {
    let mut found = Vec::new();
    let mut stack: Vec<ElementId> = regexp.children(start).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let outcome = criterion.assess(regexp, id)?;
        if outcome == FindOutcome::Accept {
            found.push(id);
        }
        if outcome != FindOutcome::RejectPrune {
            for child in regexp.children(id).iter().rev() {
                stack.push(*child);
            }
        }
    }
    Ok(found)
}

/// Like `find_all`, stopping at the first accepted element.
pub(crate) fn find_first<C: Criterion>(
    regexp: &Regexp,
    start: ElementId,
    criterion: &mut C,
) -> Result<Option<ElementId>, PerlreError> {
    let mut stack: Vec<ElementId> = regexp.children(start).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let outcome = criterion.assess(regexp, id)?;
        if outcome == FindOutcome::Accept {
            return Ok(Some(id));
        }
        if outcome != FindOutcome::RejectPrune {
            for child in regexp.children(id).iter().rev() {
                stack.push(*child);
            }
        }
    }
    Ok(None)
}

/// The parents of the accepted elements, first-seen order, each parent
/// reported once.
pub(crate) fn find_parents<C: Criterion>(
    regexp: &Regexp,
    start: ElementId,
    criterion: &mut C,
) -> Result<Vec<ElementId>, PerlreError> {
    let found = find_all(regexp, start, criterion)?;
    let mut parents = Vec::new();
    for id in found {
        if let Some(parent) = regexp.parent(id) {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }
    Ok(parents)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::tag_matches;

    #[test]
    fn test_tag_matching() {
        // Full tags.
        assert!(tag_matches("token::literal", "token::literal"));
        assert!(tag_matches("structure::class", "structure::class"));
        assert!(tag_matches("unknown", "unknown"));

        // Boundary suffixes.
        assert!(tag_matches("literal", "token::literal"));
        assert!(tag_matches("class", "structure::class"));
        assert!(tag_matches("named_capture", "structure::named_capture"));

        // Partial words do not cross the boundary.
        assert!(!tag_matches("capture", "structure::named_capture"));
        assert!(!tag_matches("iteral", "token::literal"));
        assert!(!tag_matches("token", "token::literal"));

        // No cross-kind surprises.
        assert!(!tag_matches("token::literal", "structure::class"));
        assert!(!tag_matches("", "token::literal"));
    }
}
