// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Builds the element tree out of the token stream.
//!
//! The builder keeps a stack of open structures. An open delimiter
//! starts a structure and pushes it; the matching close attaches inside
//! and pops it. Tokens in between attach to whatever is on top. Nothing
//! here fails: delimiters that never find their mate are reblessed to
//! Unknown where they stand, and the rest of the stream keeps its shape.

use std::mem;
use std::sync::Arc;

use crate::code::CodeParser;
use crate::element::{Diagnostic, ElementData, ElementId, ElementKind, StructureKind};
use crate::error::PerlreError;
use crate::location::{Location, Origin};
use crate::modifier::Modifiers;
use crate::token::{GroupKind, Token, TokenKind};
use crate::tokenizer::{scan_literal_parts, scan_pattern};

/// Structures deeper than this are refused; the open delimiter that
/// would cross the line becomes a defect instead.
pub(crate) const MAX_GROUP_DEPTH: usize = 64;

const PAREN_KINDS: &[StructureKind] = &[
    StructureKind::Capture,
    StructureKind::NamedCapture,
    StructureKind::NonCapture,
    StructureKind::Atomic,
    StructureKind::Lookahead,
    StructureKind::LookaheadNegative,
    StructureKind::Lookbehind,
    StructureKind::LookbehindNegative,
    StructureKind::BranchReset,
];

/// Everything the parse settles: the arena, the landmark elements, the
/// defects, and the capture bookkeeping.
#[derive(Debug)]
pub(crate) struct TreeOutcome {
    pub elements: Vec<ElementData>,
    pub root: ElementId,
    pub main: ElementId,
    pub replacement: Option<ElementId>,
    pub modifier: ElementId,
    pub diagnostics: Vec<Diagnostic>,
    pub flags: Modifiers,
    pub capture_count: u32,
    pub capture_names: Vec<String>,
}

/// Build the tree for a bare pattern. The synthetic modifier element
/// carries no text; it exists so the tree has the same landmarks as a
/// full literal.
pub(crate) fn build_bare(
    pattern: &str,
    modifiers: Modifiers,
    code_parser: Option<&Arc<dyn CodeParser>>,
    origin: Option<&Origin>,
) -> TreeOutcome {
    let stream = scan_pattern(pattern, modifiers);

    let mut builder = TreeBuilder::new(code_parser, origin);
    builder.diagnostics.extend(stream.diagnostics);

    let main = builder.begin_base(StructureKind::Main, Location::new_position(0, 0, 0));
    for token in stream.tokens {
        builder.feed(token);
    }
    builder.unwind_open();
    builder.end_base();

    let modifier_token = Token::new(TokenKind::Modifier, String::new(), stream.end);
    let modifier = builder.attach_token(modifier_token);

    builder.finish(main, None, modifier, modifiers)
}

/// Build the tree for a complete literal.
pub(crate) fn build_literal(
    source: &str,
    defaults: Modifiers,
    code_parser: Option<&Arc<dyn CodeParser>>,
    origin: Option<&Origin>,
) -> Result<TreeOutcome, PerlreError> {
    let parts = scan_literal_parts(source, defaults)?;

    let mut builder = TreeBuilder::new(code_parser, origin);
    builder.diagnostics.extend(parts.diagnostics);

    if let Some(token) = parts.operator {
        builder.attach_token(token);
    }
    if let Some(token) = parts.gap {
        builder.attach_token(token);
    }

    // The match part. Its boundary delimiters belong to the structure
    // itself, so they bypass the group logic: `qr(a)` must not read the
    // boundary parentheses as a capture.
    let mut match_tokens = parts.match_tokens.into_iter();
    let open_token = match_tokens.next();
    let main_start = open_token
        .as_ref()
        .map(|token| token.range)
        .unwrap_or(parts.end);
    let main = builder.begin_base(StructureKind::Main, main_start);
    if let Some(token) = open_token {
        builder.attach_token(token);
    }
    let mut body: Vec<Token> = match_tokens.collect();
    let close_token = if parts.match_closed { body.pop() } else { None };
    for token in body {
        builder.feed(token);
    }
    builder.unwind_open();
    if let Some(token) = close_token {
        builder.attach_token(token);
    }
    builder.end_base();
    if !parts.match_closed {
        builder.elements[main.index()]
            .rebless_unknown("missing delimiter to close the pattern");
    }

    if let Some(token) = parts.between {
        builder.attach_token(token);
    }

    // The replacement part of a substitution. It is double-quotish
    // text, so its tokens attach flat.
    let mut replacement = None;
    if let Some(tokens) = parts.replacement_tokens {
        let mut iter = tokens.into_iter();
        let open2 = if parts.replacement_delimited {
            iter.next()
        } else {
            None
        };
        let mut rest: Vec<Token> = iter.collect();
        let close2 = if parts.replacement_closed {
            rest.pop()
        } else {
            None
        };
        let start = open2
            .as_ref()
            .map(|token| token.range)
            .or_else(|| rest.first().map(|token| token.range))
            .or_else(|| close2.as_ref().map(|token| token.range))
            .unwrap_or(parts.end);
        let id = builder.begin_base(StructureKind::Replacement, start);
        if let Some(token) = open2 {
            builder.attach_token(token);
        }
        for token in rest {
            builder.attach_token(token);
        }
        if let Some(token) = close2 {
            builder.attach_token(token);
        }
        builder.end_base();
        if !parts.replacement_closed {
            builder.elements[id.index()]
                .rebless_unknown("missing delimiter to close the replacement");
        }
        replacement = Some(id);
    } else if parts.replacement_expected {
        let id = builder.begin_base(StructureKind::Replacement, parts.end);
        builder.end_base();
        builder.elements[id.index()].rebless_unknown("substitution with no replacement part");
        replacement = Some(id);
    }

    let modifier_token = parts
        .modifier
        .unwrap_or_else(|| Token::new(TokenKind::Modifier, String::new(), parts.end));
    let modifier = builder.attach_token(modifier_token);

    Ok(builder.finish(main, replacement, modifier, parts.flags))
}

struct TreeBuilder<'a> {
    elements: Vec<ElementData>,
    /// The innermost entry is the attachment point.
    open: Vec<ElementId>,
    /// Frames at or below this depth (root, Main, Replacement) are
    /// never closed by in-pattern delimiters.
    base_depth: usize,
    diagnostics: Vec<Diagnostic>,
    code_parser: Option<&'a Arc<dyn CodeParser>>,
    origin: Option<&'a Origin>,
}

impl<'a> TreeBuilder<'a> {
    fn new(code_parser: Option<&'a Arc<dyn CodeParser>>, origin: Option<&'a Origin>) -> Self {
        let root = ElementData::container(ElementKind::Root, Location::new_position(0, 0, 0));
        Self {
            elements: vec![root],
            open: vec![ElementId(0)],
            base_depth: 1,
            diagnostics: Vec::new(),
            code_parser,
            origin,
        }
    }

    fn top(&self) -> ElementId {
        self.open.last().copied().unwrap_or(ElementId(0))
    }

    fn alloc(&mut self, data: ElementData) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        self.elements.push(data);
        id
    }

    fn attach_token(&mut self, token: Token) -> ElementId {
        let parent = self.top();
        let is_code = token.kind == TokenKind::Code;
        let data = ElementData::from_token(token, Some(parent));
        let id = self.alloc(data);
        self.elements[parent.index()].children.push(id);
        if is_code {
            self.parse_code(id);
        }
        id
    }

    /// Hand an embedded-code fragment to the collaborator, if one is
    /// configured. A refusal is a defect of that element, not of the
    /// parse.
    fn parse_code(&mut self, id: ElementId) {
        let parser = match self.code_parser {
            Some(parser) => parser,
            None => return,
        };
        let fragment = code_fragment(&self.elements[id.index()].content);
        let anchor = self
            .origin
            .map(|origin| origin.resolve(self.elements[id.index()].span));
        match parser.parse(&fragment, anchor) {
            Ok(document) => {
                self.elements[id.index()].code = Some(document);
            }
            Err(error) => {
                let message = format!("embedded code rejected: {}", error);
                let range = self.elements[id.index()].span;
                self.diagnostics.push(Diagnostic {
                    message: message.clone(),
                    range,
                });
                self.elements[id.index()].rebless_unknown(message);
            }
        }
    }

    fn begin_base(&mut self, kind: StructureKind, start: Location) -> ElementId {
        let parent = self.top();
        let mut data = ElementData::container(ElementKind::Structure(kind), start);
        data.parent = Some(parent);
        let id = self.alloc(data);
        self.elements[parent.index()].children.push(id);
        self.open.push(id);
        self.base_depth = self.open.len();
        id
    }

    fn end_base(&mut self) {
        if self.open.len() > 1 {
            self.open.pop();
        }
        self.base_depth = self.open.len();
    }

    fn feed(&mut self, token: Token) {
        match token.kind.clone() {
            TokenKind::Delimiter => match token.content.as_str() {
                "(" => self.open_group(token),
                "[" => self.open_structure(StructureKind::Class, token),
                "(?[" => self.open_structure(StructureKind::RegexSet, token),
                ")" => self.close_structure(token, PAREN_KINDS),
                "]" => self.close_structure(token, &[StructureKind::Class]),
                "])" => self.close_structure(token, &[StructureKind::RegexSet]),
                _ => {
                    self.attach_token(token);
                }
            },
            TokenKind::GroupType(group) => self.apply_group_type(group, token),
            _ => {
                self.attach_token(token);
            }
        }
    }

    fn open_group(&mut self, token: Token) {
        if self.open.len() - self.base_depth >= MAX_GROUP_DEPTH {
            let message = "group nesting is too deep".to_owned();
            self.diagnostics.push(Diagnostic {
                message: message.clone(),
                range: token.range,
            });
            let unknown = Token::unknown(token.content, token.range, message);
            self.attach_token(unknown);
            return;
        }
        // Parentheses inside `(?[ ... ])` group set expressions; they do
        // not capture.
        let kind = if self.in_regex_set() {
            StructureKind::NonCapture
        } else {
            StructureKind::Capture
        };
        self.open_structure(kind, token);
    }

    fn in_regex_set(&self) -> bool {
        for id in self.open[self.base_depth..].iter().rev() {
            if self.elements[id.index()].is_structure(StructureKind::RegexSet) {
                return true;
            }
        }
        false
    }

    fn open_structure(&mut self, kind: StructureKind, token: Token) {
        let parent = self.top();
        let mut data = ElementData::container(ElementKind::Structure(kind), token.range);
        data.parent = Some(parent);
        let id = self.alloc(data);
        self.elements[parent.index()].children.push(id);
        self.open.push(id);
        self.attach_token(token);
    }

    /// A group-type token right after `(` styles the structure the
    /// parenthesis opened. Anywhere else it is just a token.
    fn apply_group_type(&mut self, group: GroupKind, token: Token) {
        let top = self.top();
        let fresh = {
            let data = &self.elements[top.index()];
            data.is_structure(StructureKind::Capture) && data.children.len() == 1
        };
        if fresh {
            let kind = match &group {
                GroupKind::NonCapture => StructureKind::NonCapture,
                GroupKind::NamedCapture(_) => StructureKind::NamedCapture,
                GroupKind::Lookahead => StructureKind::Lookahead,
                GroupKind::LookaheadNegative => StructureKind::LookaheadNegative,
                GroupKind::Lookbehind => StructureKind::Lookbehind,
                GroupKind::LookbehindNegative => StructureKind::LookbehindNegative,
                GroupKind::Atomic => StructureKind::Atomic,
                GroupKind::BranchReset => StructureKind::BranchReset,
            };
            self.elements[top.index()].kind = ElementKind::Structure(kind);
            if let GroupKind::NamedCapture(name) = &group {
                self.elements[top.index()].capture_name = Some(name.clone());
            }
        }
        self.attach_token(token);
    }

    fn close_structure(&mut self, token: Token, kinds: &[StructureKind]) {
        let top = self.top();
        let closable = self.open.len() > self.base_depth
            && kinds
                .iter()
                .any(|kind| self.elements[top.index()].is_structure(*kind));
        if closable {
            self.attach_token(token);
            self.open.pop();
        } else {
            let message = format!("unmatched close delimiter '{}'", token.content);
            self.diagnostics.push(Diagnostic {
                message: message.clone(),
                range: token.range,
            });
            let unknown = Token::unknown(token.content, token.range, message);
            self.attach_token(unknown);
        }
    }

    /// Close out everything the pattern left open. The structure
    /// dissolves: its open delimiter becomes the defect and its other
    /// children move up to the parent, so `(a` yields exactly one
    /// Unknown with the `a` as its sibling.
    fn unwind_open(&mut self) {
        while self.open.len() > self.base_depth {
            if let Some(id) = self.open.pop() {
                self.splice_unclosed(id);
            }
        }
    }

    fn splice_unclosed(&mut self, id: ElementId) {
        let children = mem::take(&mut self.elements[id.index()].children);
        if let Some(first) = children.first() {
            let content = self.elements[first.index()].content.clone();
            let message = format!("unmatched open delimiter '{}'", content);
            let range = self.elements[first.index()].span;
            self.diagnostics.push(Diagnostic {
                message: message.clone(),
                range,
            });
            self.elements[first.index()].rebless_unknown(message);
        }

        let parent = match self.elements[id.index()].parent {
            Some(parent) => parent,
            None => return,
        };
        let slot = self.elements[parent.index()]
            .children
            .iter()
            .position(|child| *child == id);
        if let Some(slot) = slot {
            self.elements[parent.index()]
                .children
                .splice(slot..=slot, children.iter().copied());
        }
        for child in &children {
            self.elements[child.index()].parent = Some(parent);
        }
        // The dissolved structure stays in the arena but nothing points
        // at it any more.
    }

    /// Give every container the span of its children. Children always
    /// sit later in the arena than their parent, so one reverse sweep
    /// settles nested structures bottom-up.
    fn finish_spans(&mut self) {
        for index in (0..self.elements.len()).rev() {
            if self.elements[index].children.is_empty() {
                continue;
            }
            let first = self.elements[index].children[0];
            let last = match self.elements[index].children.last() {
                Some(last) => *last,
                None => continue,
            };
            let span = Location::from_range_pair(
                &self.elements[first.index()].span,
                &self.elements[last.index()].span,
            );
            self.elements[index].span = span;
        }
    }

    fn finish(
        mut self,
        main: ElementId,
        replacement: Option<ElementId>,
        modifier: ElementId,
        flags: Modifiers,
    ) -> TreeOutcome {
        self.finish_spans();
        let root = ElementId(0);
        let (capture_count, capture_names) = number_captures(&mut self.elements, root);
        TreeOutcome {
            elements: self.elements,
            root,
            main,
            replacement,
            modifier,
            diagnostics: self.diagnostics,
            flags,
            capture_count,
            capture_names,
        }
    }
}

/// Number the capture groups. The index is the position of the group's
/// opening delimiter in the text, nesting notwithstanding: a pre-order
/// walk over the tree visits the groups in exactly that order.
fn number_captures(elements: &mut [ElementData], root: ElementId) -> (u32, Vec<String>) {
    let mut stack = vec![root];
    let mut next = 1u32;
    let mut names: Vec<String> = Vec::new();

    while let Some(id) = stack.pop() {
        let capturing = matches!(
            elements[id.index()].kind,
            ElementKind::Structure(StructureKind::Capture)
                | ElementKind::Structure(StructureKind::NamedCapture)
        );
        if capturing {
            elements[id.index()].capture_index = Some(next);
            next += 1;
            if let Some(name) = &elements[id.index()].capture_name {
                if !names.iter().any(|existing| existing == name) {
                    names.push(name.clone());
                }
            }
        }
        for child in elements[id.index()].children.iter().rev() {
            stack.push(*child);
        }
    }

    (next - 1, names)
}

/// The text handed to the code collaborator: the brace block of a
/// `(?{...})` form, or the raw fragment of an `/e` replacement.
fn code_fragment(content: &str) -> String {
    if content.starts_with("(?") {
        match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if end >= start => content[start..=end].to_owned(),
            _ => content.to_owned(),
        }
    } else {
        content.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::{build_bare, build_literal, TreeOutcome};
    use crate::code::{CodeDocument, CodeParser, VerbatimCode};
    use crate::element::{ElementId, ElementKind, StructureKind};
    use crate::error::PerlreError;
    use crate::location::Origin;
    use crate::modifier::Modifiers;

    fn bare(pattern: &str) -> TreeOutcome {
        build_bare(pattern, Modifiers::empty(), None, None)
    }

    /// Flatten the tree to `(depth, tag, content)` rows for comparison.
    /// Containers report the concatenation of nothing (their text lives
    /// in their children), so only their tag matters.
    fn outline(outcome: &TreeOutcome) -> Vec<(usize, &'static str, String)> {
        let mut rows = Vec::new();
        let mut stack: Vec<(ElementId, usize)> = vec![(outcome.root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let element = &outcome.elements[id.index()];
            rows.push((depth, element.kind.tag(), element.content.clone()));
            for child in element.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        rows
    }

    fn unknown_rows(outcome: &TreeOutcome) -> Vec<(usize, &'static str, String)> {
        outline(outcome)
            .into_iter()
            .filter(|(_, tag, _)| *tag == "unknown")
            .collect()
    }

    #[test]
    fn test_build_plain_sequence() {
        let outcome = bare("a.c");
        assert_eq!(
            outline(&outcome),
            vec![
                (0, "root", String::new()),
                (1, "structure::main", String::new()),
                (2, "token::literal", "a".to_owned()),
                (2, "token::dot", ".".to_owned()),
                (2, "token::literal", "c".to_owned()),
                (1, "token::modifier", String::new()),
            ]
        );
    }

    #[test]
    fn test_build_nested_groups() {
        let outcome = bare("a(b(?:c[de]))");
        assert_eq!(
            outline(&outcome),
            vec![
                (0, "root", String::new()),
                (1, "structure::main", String::new()),
                (2, "token::literal", "a".to_owned()),
                (2, "structure::capture", String::new()),
                (3, "token::delimiter", "(".to_owned()),
                (3, "token::literal", "b".to_owned()),
                (3, "structure::non_capture", String::new()),
                (4, "token::delimiter", "(".to_owned()),
                (4, "token::group_type", "?:".to_owned()),
                (4, "token::literal", "c".to_owned()),
                (4, "structure::class", String::new()),
                (5, "token::delimiter", "[".to_owned()),
                (5, "token::literal", "d".to_owned()),
                (5, "token::literal", "e".to_owned()),
                (5, "token::delimiter", "]".to_owned()),
                (4, "token::delimiter", ")".to_owned()),
                (3, "token::delimiter", ")".to_owned()),
                (1, "token::modifier", String::new()),
            ]
        );
    }

    #[test]
    fn test_build_structure_kinds() {
        let outcome = bare("(?=a)(?<name>b)(?>c)(?|d)(?[ \\d ])");
        let kinds: Vec<_> = outcome.elements[outcome.main.index()]
            .children
            .iter()
            .map(|id| outcome.elements[id.index()].kind.tag())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "structure::lookahead",
                "structure::named_capture",
                "structure::atomic",
                "structure::branch_reset",
                "structure::regex_set",
            ]
        );
    }

    #[test]
    fn test_build_set_grouping_does_not_capture() {
        let outcome = bare("(?[ ( \\d + \\w ) ])");
        assert_eq!(outcome.capture_count, 0);
        let set = outcome.elements[outcome.main.index()]
            .children
            .iter()
            .copied()
            .find(|id| outcome.elements[id.index()].is_structure(StructureKind::RegexSet))
            .unwrap();
        let grouped = outcome.elements[set.index()]
            .children
            .iter()
            .any(|id| outcome.elements[id.index()].is_structure(StructureKind::NonCapture));
        assert!(grouped);
    }

    #[test]
    fn test_build_unmatched_open() {
        // The structure dissolves: one Unknown for the delimiter, the
        // content spliced up as its sibling.
        let outcome = bare("(a");
        assert_eq!(
            outline(&outcome),
            vec![
                (0, "root", String::new()),
                (1, "structure::main", String::new()),
                (2, "unknown", "(".to_owned()),
                (2, "token::literal", "a".to_owned()),
                (1, "token::modifier", String::new()),
            ]
        );
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn test_build_unmatched_close() {
        let outcome = bare("a)b");
        assert_eq!(
            unknown_rows(&outcome),
            vec![(2, "unknown", ")".to_owned())]
        );
    }

    #[test]
    fn test_build_unmatched_class() {
        let outcome = bare("[ab");
        assert_eq!(
            outline(&outcome),
            vec![
                (0, "root", String::new()),
                (1, "structure::main", String::new()),
                (2, "unknown", "[".to_owned()),
                (2, "token::literal", "a".to_owned()),
                (2, "token::literal", "b".to_owned()),
                (1, "token::modifier", String::new()),
            ]
        );
    }

    #[test]
    fn test_build_depth_ceiling() {
        // 64 nested groups are allowed; the 65th open delimiter is
        // refused where it stands.
        let deep = "(".repeat(65);
        let outcome = bare(&deep);
        let unknown = unknown_rows(&outcome);
        assert!(unknown
            .iter()
            .any(|(_, _, content)| content == "("));
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.message.contains("too deep")));
    }

    #[test]
    fn test_capture_numbering() {
        // Numbering follows the opening delimiters left to right, not
        // the nesting.
        let outcome = bare("(a)(?:b(c))(d)");
        let mut numbered: Vec<(u32, String)> = outcome
            .elements
            .iter()
            .filter_map(|element| {
                element
                    .capture_index
                    .map(|index| (index, element.kind.tag().to_owned()))
            })
            .collect();
        numbered.sort();
        assert_eq!(
            numbered,
            vec![
                (1, "structure::capture".to_owned()),
                (2, "structure::capture".to_owned()),
                (3, "structure::capture".to_owned()),
            ]
        );
        assert_eq!(outcome.capture_count, 3);
    }

    #[test]
    fn test_capture_names() {
        let outcome = bare("(?<year>\\d+)-(?'month'\\d+)(x)");
        assert_eq!(
            outcome.capture_names,
            vec!["year".to_owned(), "month".to_owned()]
        );
        assert_eq!(outcome.capture_count, 3);

        // Nested and unnamed groups interleave without disturbing the
        // lexical order.
        let outcome = bare("((?<inner>a))");
        let by_index: Vec<(u32, Option<String>)> = {
            let mut rows: Vec<_> = outcome
                .elements
                .iter()
                .filter_map(|element| {
                    element
                        .capture_index
                        .map(|index| (index, element.capture_name.clone()))
                })
                .collect();
            rows.sort();
            rows
        };
        assert_eq!(
            by_index,
            vec![(1, None), (2, Some("inner".to_owned()))]
        );
    }

    #[test]
    fn test_build_literal_landmarks() {
        let outcome = build_literal("s/a/b/g", Modifiers::empty(), None, None).unwrap();
        let root_children: Vec<_> = outcome.elements[outcome.root.index()]
            .children
            .iter()
            .map(|id| outcome.elements[id.index()].kind.tag())
            .collect();
        assert_eq!(
            root_children,
            vec![
                "token::delimiter",
                "structure::main",
                "structure::replacement",
                "token::modifier",
            ]
        );
        assert!(outcome.replacement.is_some());
        assert!(outcome.flags.contains(Modifiers::G));
    }

    #[test]
    fn test_build_literal_boundary_is_not_a_group() {
        // `qr(a)` delimits with parentheses; they are Main's own
        // delimiters, not a capture.
        let outcome = build_literal("qr(a)", Modifiers::empty(), None, None).unwrap();
        assert_eq!(outcome.capture_count, 0);
        let main = &outcome.elements[outcome.main.index()];
        assert!(main.is_structure(StructureKind::Main));
        assert_eq!(main.children.len(), 3);
    }

    #[test]
    fn test_build_literal_unterminated() {
        // The pattern part never closes: the whole Main goes Unknown,
        // children intact.
        let outcome = build_literal("m/abc", Modifiers::empty(), None, None).unwrap();
        let main = &outcome.elements[outcome.main.index()];
        assert_eq!(main.kind, ElementKind::Unknown);
        assert_eq!(main.children.len(), 4);
    }

    #[test]
    fn test_build_literal_missing_replacement() {
        let outcome = build_literal("s{a}", Modifiers::empty(), None, None).unwrap();
        let replacement = outcome.replacement.unwrap();
        assert_eq!(
            outcome.elements[replacement.index()].kind,
            ElementKind::Unknown
        );
        assert!(outcome.elements[replacement.index()].children.is_empty());
    }

    #[test]
    fn test_spans_cover_children() {
        let outcome = bare("a(bc)d");
        let capture = outcome.elements[outcome.main.index()]
            .children
            .iter()
            .copied()
            .find(|id| outcome.elements[id.index()].is_structure(StructureKind::Capture))
            .unwrap();
        let span = outcome.elements[capture.index()].span;
        assert_eq!(span.index, 1);
        assert_eq!(span.length, 4);
        let main_span = outcome.elements[outcome.main.index()].span;
        assert_eq!(main_span.index, 0);
        assert_eq!(main_span.length, 6);
    }

    #[test]
    fn test_code_collaborator() {
        let parser: Arc<dyn CodeParser> = Arc::new(VerbatimCode);
        let outcome = build_bare("a(?{ count() })b", Modifiers::empty(), Some(&parser), None);
        let code = outcome
            .elements
            .iter()
            .find(|element| element.kind == ElementKind::Token(crate::token::TokenKind::Code))
            .unwrap();
        let document = code.code.as_ref().unwrap();
        assert_eq!(document.source(), "{ count() }");
    }

    #[test]
    fn test_code_collaborator_refusal() {
        #[derive(Debug)]
        struct Refuser;

        impl CodeParser for Refuser {
            fn parse(
                &self,
                _fragment: &str,
                _anchor: Option<Origin>,
            ) -> Result<Arc<dyn CodeDocument>, PerlreError> {
                Err(PerlreError::QueryFault("no code allowed here".to_owned()))
            }
        }

        let parser: Arc<dyn CodeParser> = Arc::new(Refuser);
        let outcome = build_bare("a(?{ x })b", Modifiers::empty(), Some(&parser), None);
        assert_eq!(unknown_rows(&outcome).len(), 1);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.message.contains("no code allowed here")));
    }

    #[test]
    fn test_code_collaborator_anchor() {
        #[derive(Debug)]
        struct AnchorEcho;

        impl CodeParser for AnchorEcho {
            fn parse(
                &self,
                _fragment: &str,
                anchor: Option<Origin>,
            ) -> Result<Arc<dyn CodeDocument>, PerlreError> {
                Err(PerlreError::QueryFault(match anchor {
                    Some(anchor) => anchor.to_string(),
                    None => "no anchor".to_owned(),
                }))
            }
        }

        let parser: Arc<dyn CodeParser> = Arc::new(AnchorEcho);
        let origin = Origin::new(Some("lib/App.pm".to_owned()), 7, 30);

        // The code token starts two characters into the pattern.
        let outcome = build_bare(
            "ab(?{ x })",
            Modifiers::empty(),
            Some(&parser),
            Some(&origin),
        );
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.message.contains("lib/App.pm:7:32")));

        // On a later pattern line only the line offset carries over.
        let outcome = build_bare(
            "a\n(?{ x })",
            Modifiers::X,
            Some(&parser),
            Some(&origin),
        );
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.message.contains("lib/App.pm:8:1")));
    }
}
