// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The parsed regex and its query surface.
//!
//! A `Regexp` owns every element of one parsed pattern in an arena;
//! `ElementId` values index into it. The tree always has the same
//! landmarks: a root covering the whole input, a main part holding the
//! pattern, an optional replacement part for substitutions, and a
//! modifier element (synthesized empty for a bare pattern).
//!
//! Construction never fails for defects local to one construct. Those
//! stay in the tree as `Unknown` elements with a message, and the
//! matching `Diagnostic` records are kept on the regex. Only input that
//! cannot produce a tree at all (an empty literal, an unsupported
//! operator word, an illegal delimiter) is rejected with an error.
//!
//! Width and version queries are computed on demand and cached per
//! element, so repeated queries over the same tree stay cheap.

use std::fmt;
use std::sync::Arc;

use crate::code::{CodeDocument, CodeParser};
use crate::element::{Diagnostic, ElementData, ElementId, ElementKind, StructureKind};
use crate::error::PerlreError;
use crate::lexer::{build_bare, build_literal, TreeOutcome};
use crate::location::{Location, Origin};
use crate::modifier::{allowed_letters, parse_trailing_run, Modifiers};
use crate::search::{self, Criterion};
use crate::token::TokenKind;
use crate::version::{PerlVersion, VersionRange};
use crate::width::Width;

/// Optional knobs for parsing. The plain entry points use the defaults.
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Modifier letters assumed before the pattern's own, e.g. `"x"`
    /// for patterns lifted out of `use re '/x'` code. The pattern's own
    /// trailing modifiers are applied on top.
    pub default_modifiers: Option<String>,
    /// Recorded on the regex for the caller's benefit; the parser
    /// itself works on characters and never re-decodes.
    pub encoding: Option<String>,
    /// Where the literal sits in its source file. When set, element
    /// positions can be resolved back to file coordinates.
    pub origin: Option<Origin>,
    /// A collaborator for the Perl fragments inside `(?{...})`,
    /// `(??{...})`, and `s///e` replacements.
    pub code_parser: Option<Arc<dyn CodeParser>>,
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("default_modifiers", &self.default_modifiers)
            .field("encoding", &self.encoding)
            .field("origin", &self.origin)
            .field("code_parser", &self.code_parser.is_some())
            .finish()
    }
}

// Caller-supplied modifier strings accept every letter the crate knows;
// letters with no meaning are ignored rather than reported, since they
// come from configuration, not from pattern text.
fn fold_modifier_text(base: Modifiers, text: &str) -> Modifiers {
    base.apply(parse_trailing_run(text, allowed_letters(Some("s"))).change)
}

/// A structural parse of one Perl regular expression.
#[derive(Debug)]
pub struct Regexp {
    source: String,
    encoding: Option<String>,
    origin: Option<Origin>,
    elements: Vec<ElementData>,
    root: ElementId,
    main: ElementId,
    replacement: Option<ElementId>,
    modifier: Option<ElementId>,
    diagnostics: Vec<Diagnostic>,
    flags: Modifiers,
    capture_count: u32,
    capture_names: Vec<String>,
}

impl Regexp {
    /// Parse bare pattern text, as found between the delimiters of a
    /// match. `modifiers` holds the trailing letters that would follow
    /// the close delimiter (`"i"`, `"msx"`, or `""`).
    pub fn parse(pattern: &str, modifiers: &str) -> Result<Self, PerlreError> {
        Self::parse_with(pattern, modifiers, ParseOptions::default())
    }

    pub fn parse_with(
        pattern: &str,
        modifiers: &str,
        options: ParseOptions,
    ) -> Result<Self, PerlreError> {
        let mut flags = Modifiers::empty();
        if let Some(defaults) = &options.default_modifiers {
            flags = fold_modifier_text(flags, defaults);
        }
        flags = fold_modifier_text(flags, modifiers);

        let outcome = build_bare(
            pattern,
            flags,
            options.code_parser.as_ref(),
            options.origin.as_ref(),
        );
        Ok(Self::from_outcome(pattern.to_owned(), outcome, options))
    }

    /// Parse a complete literal: `/.../`, `m{...}`, `qr'...'`, or
    /// `s/.../.../` with any trailing modifiers. Transliterations
    /// (`tr///`, `y///`) are not regexes and are rejected.
    pub fn parse_literal(source: &str) -> Result<Self, PerlreError> {
        Self::parse_literal_with(source, ParseOptions::default())
    }

    pub fn parse_literal_with(
        source: &str,
        options: ParseOptions,
    ) -> Result<Self, PerlreError> {
        let mut defaults = Modifiers::empty();
        if let Some(text) = &options.default_modifiers {
            defaults = fold_modifier_text(defaults, text);
        }

        let outcome = build_literal(
            source,
            defaults,
            options.code_parser.as_ref(),
            options.origin.as_ref(),
        )?;
        Ok(Self::from_outcome(source.to_owned(), outcome, options))
    }

    fn from_outcome(source: String, outcome: TreeOutcome, options: ParseOptions) -> Self {
        Self {
            source,
            encoding: options.encoding,
            origin: options.origin,
            elements: outcome.elements,
            root: outcome.root,
            main: outcome.main,
            replacement: outcome.replacement,
            modifier: Some(outcome.modifier),
            diagnostics: outcome.diagnostics,
            flags: outcome.flags,
            capture_count: outcome.capture_count,
            capture_names: outcome.capture_names,
        }
    }

    // ---- the tree's landmarks ----

    /// The element covering the whole input.
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// The structure holding the pattern itself, boundary delimiters
    /// included. Retagged `Unknown` when the literal was never closed.
    pub fn match_part(&self) -> ElementId {
        self.main
    }

    /// The replacement structure of a substitution.
    pub fn replacement_part(&self) -> Option<ElementId> {
        self.replacement
    }

    /// The trailing-modifier element. Always present after a parse,
    /// but gone from a stripped tree when it carried no text.
    pub fn modifier_part(&self) -> Option<ElementId> {
        self.modifier
    }

    /// The input text as given.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// The effective modifier set: defaults, trailing letters, and the
    /// caret reset folded together.
    pub fn modifiers(&self) -> Modifiers {
        self.flags
    }

    /// The defects recorded while parsing, in scan order. Each one also
    /// left an `Unknown` element behind.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// How many capturing groups the pattern has. Numbering is by
    /// position of the opening parenthesis, so this is also the highest
    /// capture index.
    pub fn capture_count(&self) -> u32 {
        self.capture_count
    }

    /// The distinct capture names, in order of first appearance.
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    // ---- per-element accessors ----

    pub fn kind(&self, id: ElementId) -> &ElementKind {
        &self.elements[id.index()].kind
    }

    /// The stable kind tag, e.g. `"token::literal"` or
    /// `"structure::class"`.
    pub fn tag(&self, id: ElementId) -> &'static str {
        self.elements[id.index()].kind.tag()
    }

    /// The element's text. A token answers its own text; a container
    /// answers the concatenation of its leaves, so the root round-trips
    /// the input.
    pub fn content(&self, id: ElementId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let data = &self.elements[current.index()];
            if data.children.is_empty() {
                out.push_str(&data.content);
            } else {
                for child in data.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    /// Whether the element matters to the pattern's meaning. False for
    /// whitespace and comments under free-form layout, and for the
    /// synthetic empty modifier.
    pub fn is_significant(&self, id: ElementId) -> bool {
        self.elements[id.index()].significant
    }

    /// The element's position within the input, 0-based.
    pub fn span(&self, id: ElementId) -> Location {
        self.elements[id.index()].span
    }

    /// The element's position in the source file the literal came from,
    /// provided an origin was given at parse time.
    pub fn resolved_location(&self, id: ElementId) -> Option<Origin> {
        let origin = self.origin.as_ref()?;
        Some(origin.resolve(self.elements[id.index()].span))
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        &self.elements[id.index()].children
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.index()].parent
    }

    /// The group number of a capturing structure.
    pub fn capture_index(&self, id: ElementId) -> Option<u32> {
        self.elements[id.index()].capture_index
    }

    /// The name of a named capturing structure.
    pub fn capture_name(&self, id: ElementId) -> Option<&str> {
        self.elements[id.index()].capture_name.as_deref()
    }

    /// What went wrong, for an `Unknown` element.
    pub fn message(&self, id: ElementId) -> Option<&str> {
        self.elements[id.index()].message.as_deref()
    }

    /// The collaborator's document for an embedded-code element.
    pub fn code_document(&self, id: ElementId) -> Option<&dyn CodeDocument> {
        self.elements[id.index()].code.as_deref()
    }

    // ---- aggregate queries ----

    /// How many characters the element can match.
    ///
    /// Lookarounds match zero characters regardless of their contents,
    /// a bracketed class or extended set exactly one. A quantifier
    /// scales the sibling before it; alternation takes the shortest
    /// minimum and longest maximum over the branches, leaving branches
    /// with undetermined width out of the reduction. An `Unknown`
    /// element is undetermined, and makes every sequence around it
    /// undetermined.
    pub fn width(&self, id: ElementId) -> Width {
        if let Some(width) = self.elements[id.index()].width_cache.get() {
            return *width;
        }

        // Children first, so every fold sees its children cached.
        let mut stack = vec![(id, false)];
        while let Some((current, ready)) = stack.pop() {
            let data = &self.elements[current.index()];
            if data.width_cache.get().is_some() {
                continue;
            }
            if ready {
                let _ = data.width_cache.set(self.fold_width(current));
            } else {
                stack.push((current, true));
                for child in data.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }

        self.elements[id.index()]
            .width_cache
            .get()
            .copied()
            .unwrap_or_else(Width::unknown)
    }

    fn fold_width(&self, id: ElementId) -> Width {
        let data = &self.elements[id.index()];
        match &data.kind {
            ElementKind::Token(_) => data.own_width,
            ElementKind::Unknown => Width::unknown(),
            // The root answers for the pattern: the operator word,
            // modifiers, and any replacement consume nothing of the
            // matched string.
            ElementKind::Root => self.elements[self.main.index()]
                .width_cache
                .get()
                .copied()
                .unwrap_or_else(Width::unknown),
            ElementKind::Structure(kind) => match kind {
                StructureKind::Lookahead
                | StructureKind::LookaheadNegative
                | StructureKind::Lookbehind
                | StructureKind::LookbehindNegative
                | StructureKind::Replacement => Width::ZERO,
                StructureKind::Class | StructureKind::RegexSet => Width::fixed(1),
                StructureKind::Main
                | StructureKind::Capture
                | StructureKind::NamedCapture
                | StructureKind::NonCapture
                | StructureKind::Atomic
                | StructureKind::BranchReset => self.sequence_width(data),
            },
        }
    }

    fn sequence_width(&self, data: &ElementData) -> Width {
        let mut branches: Vec<Width> = Vec::new();
        let mut settled = Width::ZERO;
        // The most recent atom, kept aside so a quantifier can scale it.
        let mut pending: Option<Width> = None;

        for child in &data.children {
            let element = &self.elements[child.index()];
            if !element.significant {
                continue;
            }
            match &element.kind {
                ElementKind::Token(TokenKind::Operator) if element.content == "|" => {
                    branches.push(settled + pending.take().unwrap_or(Width::ZERO));
                    settled = Width::ZERO;
                }
                ElementKind::Token(TokenKind::Quantifier { min, max, .. }) => {
                    let repeat = Width {
                        min: Some(*min),
                        max: Some(*max),
                    };
                    pending = Some(pending.take().unwrap_or(Width::ZERO) * repeat);
                }
                _ => {
                    settled = settled + pending.take().unwrap_or(Width::ZERO);
                    pending = Some(
                        element
                            .width_cache
                            .get()
                            .copied()
                            .unwrap_or_else(Width::unknown),
                    );
                }
            }
        }
        branches.push(settled + pending.take().unwrap_or(Width::ZERO));

        let mut folded = branches[0];
        for branch in &branches[1..] {
            folded = folded | *branch;
        }
        folded
    }

    /// The interpreter releases that accept the element and everything
    /// under it: introduced at the newest of the floors, removed at the
    /// earliest removal.
    pub fn versions(&self, id: ElementId) -> VersionRange {
        if let Some(range) = self.elements[id.index()].version_cache.get() {
            return *range;
        }

        let mut stack = vec![(id, false)];
        while let Some((current, ready)) = stack.pop() {
            let data = &self.elements[current.index()];
            if data.version_cache.get().is_some() {
                continue;
            }
            if ready {
                let mut folded = data.own_versions;
                for child in &data.children {
                    let range = self.elements[child.index()]
                        .version_cache
                        .get()
                        .copied()
                        .unwrap_or(VersionRange::BASE);
                    folded = folded.join(range);
                }
                let _ = data.version_cache.set(folded);
            } else {
                stack.push((current, true));
                for child in data.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }

        self.elements[id.index()]
            .version_cache
            .get()
            .copied()
            .unwrap_or(VersionRange::BASE)
    }

    /// The release the element (with its contents) first appeared in.
    pub fn introduced(&self, id: ElementId) -> PerlVersion {
        self.versions(id).introduced
    }

    /// The release that dropped the element's oldest-dying construct,
    /// if any of them was ever removed.
    pub fn removed(&self, id: ElementId) -> Option<PerlVersion> {
        self.versions(id).removed
    }

    /// Whether the given interpreter release accepts the whole regex.
    pub fn accepts(&self, version: PerlVersion) -> bool {
        self.versions(self.root).accepts(version)
    }

    /// How many elements failed to parse. Zero means the input was
    /// understood completely.
    pub fn failures(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let data = &self.elements[id.index()];
            if data.kind == ElementKind::Unknown {
                count += 1;
            }
            stack.extend(data.children.iter().copied());
        }
        count
    }

    // ---- searches ----

    /// Every descendant of the root the criterion accepts, in document
    /// order. The criterion is a kind tag (full, or any `::`-boundary
    /// suffix) or a fallible predicate.
    pub fn find<C: Criterion>(&self, mut criterion: C) -> Result<Vec<ElementId>, PerlreError> {
        search::find_all(self, self.root, &mut criterion)
    }

    /// Like `find`, walking only the subtree under `start`. `start`
    /// itself is not a candidate.
    pub fn find_from<C: Criterion>(
        &self,
        start: ElementId,
        mut criterion: C,
    ) -> Result<Vec<ElementId>, PerlreError> {
        search::find_all(self, start, &mut criterion)
    }

    pub fn find_first<C: Criterion>(
        &self,
        mut criterion: C,
    ) -> Result<Option<ElementId>, PerlreError> {
        search::find_first(self, self.root, &mut criterion)
    }

    pub fn find_first_from<C: Criterion>(
        &self,
        start: ElementId,
        mut criterion: C,
    ) -> Result<Option<ElementId>, PerlreError> {
        search::find_first(self, start, &mut criterion)
    }

    /// The parents of the accepted elements, each reported once, in
    /// first-seen order.
    pub fn find_parents<C: Criterion>(
        &self,
        mut criterion: C,
    ) -> Result<Vec<ElementId>, PerlreError> {
        search::find_parents(self, self.root, &mut criterion)
    }

    pub fn find_parents_from<C: Criterion>(
        &self,
        start: ElementId,
        mut criterion: C,
    ) -> Result<Vec<ElementId>, PerlreError> {
        search::find_parents(self, start, &mut criterion)
    }

    // ---- derived trees ----

    /// A copy of the regex without its insignificant elements. The
    /// element ids of the copy are its own; spans still point into the
    /// original text. Stripping an already-stripped tree changes
    /// nothing.
    pub fn strip_insignificant(&self) -> Regexp {
        let mut elements: Vec<ElementData> = Vec::new();
        let mut remap: Vec<Option<ElementId>> = vec![None; self.elements.len()];

        let mut stack = vec![self.root];
        while let Some(old_id) = stack.pop() {
            let old = &self.elements[old_id.index()];
            if !old.significant {
                continue;
            }

            let new_id = ElementId(elements.len() as u32);
            remap[old_id.index()] = Some(new_id);

            let mut copy = old.clone_shape();
            copy.parent = old.parent.and_then(|parent| remap[parent.index()]);
            if let Some(parent) = copy.parent {
                elements[parent.index()].children.push(new_id);
            }
            elements.push(copy);

            for child in old.children.iter().rev() {
                stack.push(*child);
            }
        }

        let root = remap[self.root.index()].unwrap_or(ElementId(0));
        Regexp {
            source: self.source.clone(),
            encoding: self.encoding.clone(),
            origin: self.origin.clone(),
            elements,
            root,
            main: remap[self.main.index()].unwrap_or(root),
            replacement: self.replacement.and_then(|id| remap[id.index()]),
            modifier: self.modifier.and_then(|id| remap[id.index()]),
            diagnostics: self.diagnostics.clone(),
            flags: self.flags,
            capture_count: self.capture_count,
            capture_names: self.capture_names.clone(),
        }
    }
}

/// Prints the text the tree stands for, which for a fresh parse is the
/// input itself.
impl fmt::Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content(self.root))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::{ParseOptions, Regexp};
    use crate::code::VerbatimCode;
    use crate::element::ElementId;
    use crate::error::PerlreError;
    use crate::location::Origin;
    use crate::modifier::Modifiers;
    use crate::search::FindOutcome;
    use crate::version::{
        V5_000, V5_005, V5_006, V5_009005, V5_013002, V5_021008, V5_023000, V5_023008,
    };
    use crate::width::Width;

    fn every_element(regexp: &Regexp) -> Vec<ElementId> {
        let mut all = vec![regexp.root()];
        all.extend(
            regexp
                .find(|_: &Regexp, _: ElementId| -> Result<FindOutcome, PerlreError> {
                    Ok(FindOutcome::Accept)
                })
                .unwrap(),
        );
        all
    }

    #[test]
    fn test_round_trip() {
        for source in [
            "/ab/i",
            "qr{x{2,4}}msx",
            "s/a/b/g",
            "m'no $x'",
            "s{find} {replace}e",
            "m/a # note\nb/x",
            "/(?<year>\\d{4})-(?<month>\\d{2})/n",
            "m,comma,",
        ] {
            let regexp = Regexp::parse_literal(source).unwrap();
            assert_eq!(regexp.to_string(), source);
            assert_eq!(regexp.source(), source);
            assert_eq!(regexp.failures(), 0, "failures in {}", source);
        }

        for pattern in ["", "a(?:b|c)*d", "x [y] # layout\nz"] {
            let regexp = Regexp::parse(pattern, "x").unwrap();
            assert_eq!(regexp.to_string(), pattern);
        }
    }

    #[test]
    fn test_landmarks() {
        let regexp = Regexp::parse_literal("s/cat/dog/gi").unwrap();
        assert_eq!(regexp.tag(regexp.root()), "root");
        assert_eq!(regexp.content(regexp.match_part()), "/cat/");
        assert_eq!(
            regexp.content(regexp.replacement_part().unwrap()),
            "dog/"
        );
        assert_eq!(
            regexp.content(regexp.modifier_part().unwrap()),
            "gi"
        );
        assert_eq!(regexp.modifiers(), Modifiers::G | Modifiers::I);

        // A bare parse has the same landmarks; the modifier is an empty
        // placeholder.
        let bare = Regexp::parse("ab", "").unwrap();
        assert_eq!(bare.content(bare.match_part()), "ab");
        assert_eq!(bare.replacement_part(), None);
        assert_eq!(bare.content(bare.modifier_part().unwrap()), "");
        assert!(!bare.is_significant(bare.modifier_part().unwrap()));
    }

    #[test]
    fn test_capture_numbering() {
        let regexp = Regexp::parse("(a)(?:b(c))(d)", "").unwrap();
        assert_eq!(regexp.capture_count(), 3);

        let captures = regexp.find("capture").unwrap();
        let indexes: Vec<Option<u32>> = captures
            .iter()
            .map(|id| regexp.capture_index(*id))
            .collect();
        assert_eq!(indexes, vec![Some(1), Some(2), Some(3)]);

        let contents: Vec<String> = captures
            .iter()
            .map(|id| regexp.content(*id))
            .collect();
        assert_eq!(contents, vec!["(a)", "(c)", "(d)"]);
    }

    #[test]
    fn test_capture_names() {
        let regexp = Regexp::parse("(?<y>(?<m>a))(?'z'b)", "").unwrap();
        assert_eq!(regexp.capture_count(), 3);
        assert_eq!(regexp.capture_names(), ["y", "m", "z"]);

        let named = regexp.find("named_capture").unwrap();
        assert_eq!(regexp.capture_name(named[0]), Some("y"));
        assert_eq!(regexp.capture_index(named[0]), Some(1));
        assert_eq!(regexp.capture_name(named[1]), Some("m"));
        assert_eq!(regexp.capture_index(named[1]), Some(2));
    }

    #[test]
    fn test_capture_numbering_in_branch_reset() {
        // Numbering is by position of the opening parenthesis; a
        // branch-reset group does not restart it.
        let regexp = Regexp::parse("(?|(a)|(b))(c)", "").unwrap();
        assert_eq!(regexp.capture_count(), 3);
        let captures = regexp.find("structure::capture").unwrap();
        let indexes: Vec<Option<u32>> = captures
            .iter()
            .map(|id| regexp.capture_index(*id))
            .collect();
        assert_eq!(indexes, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_widths() {
        let width_of = |pattern: &str| {
            let regexp = Regexp::parse(pattern, "").unwrap();
            regexp.width(regexp.root())
        };

        assert_eq!(width_of(""), Width::ZERO);
        assert_eq!(width_of("abc"), Width::fixed(3));
        assert_eq!(width_of("ab|c"), Width::range(1, 2));
        assert_eq!(width_of("a+"), Width::at_least(1));
        assert_eq!(width_of("(a+)|b"), Width::at_least(1));
        assert_eq!(width_of("a{2,4}b"), Width::range(3, 5));
        assert_eq!(width_of("(ab){0,}"), Width::at_least(0));
        assert_eq!(width_of("(?=ab)c"), Width::fixed(1));
        assert_eq!(width_of("(?<!x)yz"), Width::fixed(2));
        assert_eq!(width_of("[abc]x"), Width::fixed(2));
        assert_eq!(width_of("\\R"), Width::range(1, 2));
        assert_eq!(width_of("\\X+"), Width::at_least(1));

        // Zero repeated without bound is still zero.
        assert_eq!(width_of("(?:)*"), Width::ZERO);

        // Undetermined atoms poison their own sequence only.
        assert_eq!(width_of("a\\1"), Width::unknown());
        assert_eq!(width_of("\\1|ab"), Width::fixed(2));
        assert_eq!(width_of("\\1|\\2"), Width::unknown());
        assert_eq!(width_of("$var"), Width::unknown());
    }

    #[test]
    fn test_substitution_widths() {
        let regexp = Regexp::parse_literal("s/a/longer/").unwrap();
        // The root answers for the pattern; the replacement consumes
        // nothing of the matched string.
        assert_eq!(regexp.width(regexp.root()), Width::fixed(1));
        assert_eq!(
            regexp.width(regexp.replacement_part().unwrap()),
            Width::ZERO
        );
    }

    #[test]
    fn test_version_floor_and_boundaries() {
        let plain = Regexp::parse("abc", "").unwrap();
        assert_eq!(plain.introduced(plain.root()), V5_000);
        assert_eq!(plain.removed(plain.root()), None);
        assert!(plain.accepts(V5_000));

        let named = Regexp::parse("(?<y>a)", "").unwrap();
        assert_eq!(named.introduced(named.root()), V5_009005);
        assert!(named.accepts(V5_009005));
        assert!(!named.accepts(V5_006));

        // `(?p{...})` existed only in a window of releases.
        let deprecated = Regexp::parse("(?p{ x })", "").unwrap();
        assert_eq!(deprecated.introduced(deprecated.root()), V5_005);
        assert_eq!(deprecated.removed(deprecated.root()), Some(V5_009005));
        assert!(deprecated.accepts(V5_005));
        assert!(deprecated.accepts(V5_006));
        assert!(!deprecated.accepts(V5_009005));

        // The earliest removal wins.
        let combined = Regexp::parse("(?p{x})\\C", "").unwrap();
        assert_eq!(combined.removed(combined.root()), Some(V5_009005));

        let single = Regexp::parse("\\C", "").unwrap();
        assert_eq!(single.removed(single.root()), Some(V5_023000));
    }

    #[test]
    fn test_modifier_versions() {
        let returning = Regexp::parse_literal("s/a/b/r").unwrap();
        assert_eq!(returning.introduced(returning.root()), V5_013002);

        let strict = Regexp::parse_literal("m/a/xx").unwrap();
        assert_eq!(strict.introduced(strict.root()), V5_023008);

        let nocapture = Regexp::parse_literal("m/a/n").unwrap();
        assert!(nocapture.accepts(V5_021008));
        assert!(!nocapture.accepts(V5_013002));
    }

    #[test]
    fn test_version_monotonicity() {
        let regexp = Regexp::parse("(?<y>\\h)x(?:[[:alpha:]])", "").unwrap();
        let ceiling = regexp.introduced(regexp.root());
        for id in every_element(&regexp) {
            assert!(
                regexp.introduced(id) <= ceiling,
                "element {:?} newer than its root",
                regexp.tag(id)
            );
        }
    }

    #[test]
    fn test_unmatched_open_is_local() {
        let regexp = Regexp::parse("(a", "").unwrap();
        assert_eq!(regexp.to_string(), "(a");
        assert_eq!(regexp.failures(), 1);
        assert_eq!(regexp.diagnostics().len(), 1);

        let unknowns = regexp.find("unknown").unwrap();
        assert_eq!(unknowns.len(), 1);
        assert_eq!(regexp.content(unknowns[0]), "(");
        assert!(regexp.message(unknowns[0]).unwrap().contains("'('"));
    }

    #[test]
    fn test_unknown_modifier_letters_are_local() {
        let regexp = Regexp::parse_literal("/a/iz").unwrap();
        // The letters it does know still apply.
        assert!(regexp.modifiers().contains(Modifiers::I));
        assert_eq!(regexp.failures(), 1);
        let unknowns = regexp.find("unknown").unwrap();
        assert_eq!(regexp.content(unknowns[0]), "iz");
    }

    #[test]
    fn test_find_by_tag() {
        let regexp = Regexp::parse("a[bc]d(?:e)", "").unwrap();

        let by_full = regexp.find("token::literal").unwrap();
        let by_suffix = regexp.find("literal").unwrap();
        assert_eq!(by_full, by_suffix);
        let contents: Vec<String> =
            by_full.iter().map(|id| regexp.content(*id)).collect();
        assert_eq!(contents, vec!["a", "b", "c", "d", "e"]);

        let classes = regexp.find("structure::class").unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(regexp.content(classes[0]), "[bc]");

        assert_eq!(regexp.find_first("class").unwrap(), Some(classes[0]));
        assert_eq!(regexp.find("structure::atomic").unwrap(), vec![]);

        // A suffix has to start at a `::` boundary.
        assert_eq!(
            Regexp::parse("(?<n>a)", "")
                .unwrap()
                .find("capture")
                .unwrap(),
            vec![]
        );
    }

    #[test]
    fn test_find_prune_and_recurse() {
        let regexp = Regexp::parse("a[bc]d", "").unwrap();

        let recursing = regexp
            .find(|r: &Regexp, id: ElementId| -> Result<FindOutcome, PerlreError> {
                Ok(match r.tag(id) {
                    "token::literal" => FindOutcome::Accept,
                    _ => FindOutcome::RejectRecurse,
                })
            })
            .unwrap();
        let seen: Vec<String> = recursing.iter().map(|id| regexp.content(*id)).collect();
        assert_eq!(seen, vec!["a", "b", "c", "d"]);

        let pruning = regexp
            .find(|r: &Regexp, id: ElementId| -> Result<FindOutcome, PerlreError> {
                Ok(match r.tag(id) {
                    "structure::class" => FindOutcome::RejectPrune,
                    "token::literal" => FindOutcome::Accept,
                    _ => FindOutcome::RejectRecurse,
                })
            })
            .unwrap();
        let seen: Vec<String> = pruning.iter().map(|id| regexp.content(*id)).collect();
        assert_eq!(seen, vec!["a", "d"]);
    }

    #[test]
    fn test_find_predicate_failure_aborts() {
        let regexp = Regexp::parse("a[bc]d", "").unwrap();
        let outcome =
            regexp.find(|r: &Regexp, id: ElementId| -> Result<FindOutcome, PerlreError> {
                if r.tag(id) == "structure::class" {
                    Err(PerlreError::QueryFault("no classes today".to_owned()))
                } else {
                    Ok(FindOutcome::Accept)
                }
            });
        assert_eq!(
            outcome,
            Err(PerlreError::QueryFault("no classes today".to_owned()))
        );
    }

    #[test]
    fn test_find_parents() {
        let regexp = Regexp::parse("a[bc]d", "").unwrap();
        let parents = regexp.find_parents("token::literal").unwrap();
        let class = regexp.find_first("class").unwrap().unwrap();
        assert_eq!(parents, vec![regexp.match_part(), class]);
    }

    #[test]
    fn test_find_from_subtree() {
        let regexp = Regexp::parse("a[bc]d", "").unwrap();
        let class = regexp.find_first("class").unwrap().unwrap();
        let inside = regexp.find_from(class, "literal").unwrap();
        let contents: Vec<String> =
            inside.iter().map(|id| regexp.content(*id)).collect();
        assert_eq!(contents, vec!["b", "c"]);
    }

    #[test]
    fn test_strip_insignificant() {
        let regexp = Regexp::parse_literal("m/a # note\nb/x").unwrap();
        let stripped = regexp.strip_insignificant();
        assert_eq!(stripped.to_string(), "m/ab/x");
        assert_eq!(stripped.modifiers(), regexp.modifiers());
        assert_eq!(stripped.find("comment").unwrap(), vec![]);
        assert_eq!(stripped.find("whitespace").unwrap(), vec![]);
        // The original is untouched.
        assert_eq!(regexp.to_string(), "m/a # note\nb/x");

        // Stripping again changes nothing.
        let again = stripped.strip_insignificant();
        assert_eq!(again.to_string(), stripped.to_string());
        assert_eq!(
            every_element(&again).len(),
            every_element(&stripped).len()
        );
    }

    #[test]
    fn test_strip_drops_placeholder_modifier() {
        let regexp = Regexp::parse("a b", "x").unwrap();
        let stripped = regexp.strip_insignificant();
        assert_eq!(stripped.to_string(), "ab");
        assert_eq!(stripped.modifier_part(), None);
        // Aggregates survive the rebuild.
        assert_eq!(stripped.width(stripped.root()), Width::fixed(2));
        assert!(stripped.modifiers().contains(Modifiers::X));
    }

    #[test]
    fn test_resolved_locations() {
        let options = ParseOptions {
            origin: Some(Origin::new(Some("lib/Foo.pm".to_owned()), 10, 5)),
            ..ParseOptions::default()
        };
        let regexp = Regexp::parse_with("ab\ncd", "", options).unwrap();
        let literals = regexp.find("literal").unwrap();

        // Same line as the anchor: columns add up.
        assert_eq!(
            regexp.resolved_location(literals[0]),
            Some(Origin::new(Some("lib/Foo.pm".to_owned()), 10, 5))
        );
        // A later line starts its own column count.
        let on_second_line = literals
            .iter()
            .copied()
            .find(|id| regexp.content(*id) == "c")
            .unwrap();
        assert_eq!(
            regexp.resolved_location(on_second_line),
            Some(Origin::new(Some("lib/Foo.pm".to_owned()), 11, 1))
        );

        let unanchored = Regexp::parse("ab", "").unwrap();
        assert_eq!(
            unanchored.resolved_location(unanchored.match_part()),
            None
        );
    }

    #[test]
    fn test_code_collaborator() {
        let options = ParseOptions {
            code_parser: Some(Arc::new(VerbatimCode)),
            ..ParseOptions::default()
        };
        let regexp = Regexp::parse_with("a(?{ hit() })b", "", options).unwrap();
        let code = regexp.find_first("code").unwrap().unwrap();
        assert_eq!(regexp.code_document(code).unwrap().source(), "{ hit() }");

        // Without a collaborator the fragment is still a code token,
        // just without a document.
        let plain = Regexp::parse("a(?{ hit() })b", "").unwrap();
        let code = plain.find_first("code").unwrap().unwrap();
        assert!(plain.code_document(code).is_none());
    }

    #[test]
    fn test_literal_rejections() {
        for source in ["", "qr", "m", "tr/a/b/", "y/a/b/", "qq{a}", "abc", "\\x/a/"] {
            let outcome = Regexp::parse_literal(source);
            assert!(
                matches!(outcome, Err(PerlreError::SyntaxIncorrect(_))),
                "{:?} should be rejected outright",
                source
            );
        }
        assert!(Regexp::parse_literal("tr/a/b/")
            .unwrap_err()
            .to_string()
            .contains("transliteration"));
    }

    #[test]
    fn test_default_modifiers_option() {
        let options = ParseOptions {
            default_modifiers: Some("x".to_owned()),
            ..ParseOptions::default()
        };
        let regexp = Regexp::parse_literal_with("/a b/i", options).unwrap();
        assert!(regexp.modifiers().contains(Modifiers::X));
        assert!(regexp.modifiers().contains(Modifiers::I));
        // The default made the layout insignificant.
        assert_eq!(regexp.find("whitespace").unwrap().len(), 1);
        assert_eq!(regexp.strip_insignificant().to_string(), "/ab/i");
    }

    #[test]
    fn test_encoding_is_recorded() {
        let options = ParseOptions {
            encoding: Some("iso-8859-1".to_owned()),
            ..ParseOptions::default()
        };
        let regexp = Regexp::parse_with("a", "", options).unwrap();
        assert_eq!(regexp.encoding(), Some("iso-8859-1"));
    }
}
