// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::code::CodeDocument;
use crate::location::Location;
use crate::token::{Token, TokenKind};
use crate::version::VersionRange;
use crate::width::Width;

/// Index of an element in its tree's arena. Ids are only meaningful
/// within the tree that produced them.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The delimited containers a pattern is built from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StructureKind {
    /// The pattern proper, between the boundary delimiters.
    Main,
    /// The right-hand side of a substitution. When the literal uses a
    /// shared non-bracketed delimiter (`s/a/b/`), this container has no
    /// start delimiter of its own.
    Replacement,
    /// `( ... )`
    Capture,
    /// `(?<name> ... )` and its `?'name'` / `?P<name>` spellings.
    NamedCapture,
    /// `(?: ... )`, flagged groups, and plain grouping inside `(?[ ])`.
    NonCapture,
    /// `(?> ... )`
    Atomic,
    /// `(?= ... )`
    Lookahead,
    /// `(?! ... )`
    LookaheadNegative,
    /// `(?<= ... )`
    Lookbehind,
    /// `(?<! ... )`
    LookbehindNegative,
    /// `[ ... ]`
    Class,
    /// `(?[ ... ])`
    RegexSet,
    /// `(?| ... )`
    BranchReset,
}

/// What an element is. Every element in a tree is exactly one of these;
/// an element that failed locally is retagged `Unknown` in place,
/// keeping its text, position, and children.
#[derive(Debug, PartialEq, Clone)]
pub enum ElementKind {
    Token(TokenKind),
    Structure(StructureKind),
    /// The root of the tree, covering the whole input.
    Root,
    Unknown,
}

impl TokenKind {
    /// The stable tag used by tag-based searches.
    pub fn tag(&self) -> &'static str {
        match self {
            TokenKind::Literal => "token::literal",
            TokenKind::Dot => "token::dot",
            TokenKind::PresetCharSet => "token::preset_char_set",
            TokenKind::PosixCharClass => "token::posix_char_class",
            TokenKind::Assertion => "token::assertion",
            TokenKind::Quantifier { .. } => "token::quantifier",
            TokenKind::Operator => "token::operator",
            TokenKind::Delimiter => "token::delimiter",
            TokenKind::GroupType(_) => "token::group_type",
            TokenKind::Modifier => "token::modifier",
            TokenKind::Comment => "token::comment",
            TokenKind::Whitespace => "token::whitespace",
            TokenKind::Interpolation => "token::interpolation",
            TokenKind::Code => "token::code",
            TokenKind::Backreference => "token::backreference",
            TokenKind::Recursion => "token::recursion",
            TokenKind::Control => "token::control",
            TokenKind::Unknown => "unknown",
        }
    }
}

impl StructureKind {
    pub fn tag(&self) -> &'static str {
        match self {
            StructureKind::Main => "structure::main",
            StructureKind::Replacement => "structure::replacement",
            StructureKind::Capture => "structure::capture",
            StructureKind::NamedCapture => "structure::named_capture",
            StructureKind::NonCapture => "structure::non_capture",
            StructureKind::Atomic => "structure::atomic",
            StructureKind::Lookahead => "structure::lookahead",
            StructureKind::LookaheadNegative => "structure::lookahead_negative",
            StructureKind::Lookbehind => "structure::lookbehind",
            StructureKind::LookbehindNegative => "structure::lookbehind_negative",
            StructureKind::Class => "structure::class",
            StructureKind::RegexSet => "structure::regex_set",
            StructureKind::BranchReset => "structure::branch_reset",
        }
    }
}

impl ElementKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ElementKind::Token(kind) => kind.tag(),
            ElementKind::Structure(kind) => kind.tag(),
            ElementKind::Root => "root",
            ElementKind::Unknown => "unknown",
        }
    }
}

/// A defect recorded while building the tree. The element involved is
/// tagged `Unknown` in place; the diagnostic keeps the message and the
/// text range together for reporting.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub range: Location,
}

/// The arena slot behind an `ElementId`.
#[derive(Debug)]
pub(crate) struct ElementData {
    pub kind: ElementKind,
    /// Leaf text. Containers own no text; their content is the
    /// concatenation of their descendants.
    pub content: String,
    pub significant: bool,
    pub span: Location,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
    pub capture_index: Option<u32>,
    pub capture_name: Option<String>,
    pub message: Option<String>,
    /// The element's own contribution, before children are folded in.
    pub own_width: Width,
    pub own_versions: VersionRange,
    pub code: Option<Arc<dyn CodeDocument>>,
    pub width_cache: OnceCell<Width>,
    pub version_cache: OnceCell<VersionRange>,
}

impl ElementData {
    pub(crate) fn from_token(token: Token, parent: Option<ElementId>) -> Self {
        let kind = match token.kind {
            TokenKind::Unknown => ElementKind::Unknown,
            other => ElementKind::Token(other),
        };

        Self {
            kind,
            content: token.content,
            significant: token.significant,
            span: token.range,
            parent,
            children: Vec::new(),
            capture_index: None,
            capture_name: None,
            message: token.message,
            own_width: token.width,
            own_versions: token.versions,
            code: None,
            width_cache: OnceCell::new(),
            version_cache: OnceCell::new(),
        }
    }

    pub(crate) fn container(kind: ElementKind, start: Location) -> Self {
        Self {
            kind,
            content: String::new(),
            significant: true,
            span: Location::new_range(start.index, start.line, start.column, 0),
            parent: None,
            children: Vec::new(),
            capture_index: None,
            capture_name: None,
            message: None,
            own_width: Width::ZERO,
            own_versions: VersionRange::BASE,
            code: None,
            width_cache: OnceCell::new(),
            version_cache: OnceCell::new(),
        }
    }

    /// Retag the element as `Unknown`, keeping text, span, and children.
    /// Its own width and version contributions are withdrawn; whatever
    /// its children contribute still counts.
    pub(crate) fn rebless_unknown(&mut self, message: impl Into<String>) {
        self.kind = ElementKind::Unknown;
        self.own_width = Width::unknown();
        self.own_versions = VersionRange::BASE;
        self.message = Some(message.into());
    }

    pub(crate) fn is_structure(&self, kind: StructureKind) -> bool {
        self.kind == ElementKind::Structure(kind)
    }

    /// A copy for rebuilding a tree in a new arena: everything the
    /// element carries itself, with links cleared and caches fresh.
    pub(crate) fn clone_shape(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            content: self.content.clone(),
            significant: self.significant,
            span: self.span,
            parent: None,
            children: Vec::new(),
            capture_index: self.capture_index,
            capture_name: self.capture_name.clone(),
            message: self.message.clone(),
            own_width: self.own_width,
            own_versions: self.own_versions,
            code: self.code.clone(),
            width_cache: OnceCell::new(),
            version_cache: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{ElementData, ElementKind, StructureKind};
    use crate::location::Location;
    use crate::token::{Token, TokenKind};
    use crate::version::VersionRange;
    use crate::width::Width;

    #[test]
    fn test_tags() {
        assert_eq!(ElementKind::Token(TokenKind::Literal).tag(), "token::literal");
        assert_eq!(
            ElementKind::Structure(StructureKind::Class).tag(),
            "structure::class"
        );
        assert_eq!(
            ElementKind::Structure(StructureKind::LookbehindNegative).tag(),
            "structure::lookbehind_negative"
        );
        assert_eq!(ElementKind::Root.tag(), "root");
        assert_eq!(ElementKind::Unknown.tag(), "unknown");
    }

    #[test]
    fn test_unknown_tokens_become_unknown_elements() {
        let token = Token::unknown(
            "(".to_owned(),
            Location::new_range(0, 0, 0, 1),
            "unmatched open parenthesis",
        );
        let element = ElementData::from_token(token, None);

        assert_eq!(element.kind, ElementKind::Unknown);
        assert_eq!(element.content, "(");
        assert_eq!(
            element.message.as_deref(),
            Some("unmatched open parenthesis")
        );
    }

    #[test]
    fn test_rebless_withdraws_contributions() {
        let token = Token::new(
            TokenKind::PresetCharSet,
            "\\h".to_owned(),
            Location::new_range(0, 0, 0, 2),
        );
        let mut element = ElementData::from_token(token, None);
        assert_ne!(element.own_versions, VersionRange::BASE);

        element.rebless_unknown("out of place");
        assert_eq!(element.kind, ElementKind::Unknown);
        assert_eq!(element.own_width, Width::unknown());
        assert_eq!(element.own_versions, VersionRange::BASE);
        // The text is retained for the round-trip.
        assert_eq!(element.content, "\\h");
    }
}
