// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::location::Location;
use crate::version::{
    VersionRange, V5_005, V5_006, V5_009005, V5_011, V5_013003, V5_015008, V5_017008, V5_019005,
    V5_021009, V5_023000,
};
use crate::width::{Bound, Width};

/// Greediness of a quantifier.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Greed {
    Greedy,
    /// Trailing `?`: prefer the fewest repetitions.
    Lazy,
    /// Trailing `+`: no backtracking into the group.
    Possessive,
}

/// The specific `(?...` marker following an opening parenthesis.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum GroupKind {
    /// `?:`, and the flagged forms `?i-x:`, `?^u:`.
    NonCapture,
    /// `?<name>`, `?'name'`, or `?P<name>`.
    NamedCapture(String),
    /// `?=`
    Lookahead,
    /// `?!`
    LookaheadNegative,
    /// `?<=`
    Lookbehind,
    /// `?<!`
    LookbehindNegative,
    /// `?>`
    Atomic,
    /// `?|`
    BranchReset,
}

/// Everything the scanner can produce.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    /// One character of pattern text, possibly spelled as an escape
    /// (`a`, `\n`, `\x{263A}`, `\.`).
    Literal,
    /// `.`
    Dot,
    /// `\w`, `\d`, `\h`, `\R`, `\X`, `\C`, `\p{...}` and friends.
    PresetCharSet,
    /// `[:alpha:]` inside a bracketed class.
    PosixCharClass,
    /// `^`, `$`, `\b`, `\B`, `\A`, `\Z`, `\z`, `\G`, `\K`, `\b{gcb}`.
    Assertion,
    /// `*`, `+`, `?`, `{2}`, `{2,}`, `{2,5}`, with optional `?`/`+`.
    Quantifier { min: u64, max: Bound, greed: Greed },
    /// The alternation bar, the class range dash and negating caret,
    /// and the extended-class set operators.
    Operator,
    /// Structural parentheses and brackets, the boundary delimiters of a
    /// literal, the operator word (`m`, `qr`, `s`), and the extended
    /// class fences `(?[` / `])`.
    Delimiter,
    /// The group marker after an opening parenthesis.
    GroupType(GroupKind),
    /// Trailing modifier letters, or a standalone `(?i-x)` token.
    Modifier,
    /// `(?#...)`, or `#`-to-end-of-line under `/x`.
    Comment,
    Whitespace,
    /// `$name`, `@name`, `${...}`, `$1`, with `->` postfix chains.
    Interpolation,
    /// `(?{...})`, `(??{...})`, `(?p{...})`, or a whole `s///e`
    /// replacement.
    Code,
    /// `\1`, `\g{name}`, `\k<name>`, `(?P=name)`.
    Backreference,
    /// `(?1)`, `(?+1)`, `(?R)`, `(?&name)`, `(?P>name)`.
    Recursion,
    /// Case and quoting controls: `\Q \E \L \U \l \u \F`.
    Control,
    /// Anything that could not be recognized where it stood.
    Unknown,
}

/// A scanned token: the raw text, where it sits, and what it alone
/// contributes to the width and version queries.
#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub content: String,
    pub range: Location,
    pub significant: bool,
    pub width: Width,
    pub versions: VersionRange,
    pub message: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, content: String, range: Location) -> Self {
        let significant = match kind {
            TokenKind::Whitespace | TokenKind::Comment => false,
            // The synthetic modifier of a bare pattern has no text.
            TokenKind::Modifier => !content.is_empty(),
            _ => true,
        };
        let width = width_of(&kind, &content);
        let versions = versions_of(&kind, &content);

        Self {
            kind,
            content,
            range,
            significant,
            width,
            versions,
            message: None,
        }
    }

    /// A token for text that has no valid reading in its context.
    pub fn unknown(content: String, range: Location, message: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Unknown,
            content,
            range,
            significant: true,
            width: Width::unknown(),
            versions: VersionRange::BASE,
            message: Some(message.into()),
        }
    }
}

fn width_of(kind: &TokenKind, content: &str) -> Width {
    match kind {
        TokenKind::Literal | TokenKind::Dot | TokenKind::PosixCharClass => Width::fixed(1),
        TokenKind::PresetCharSet => match content.chars().nth(1) {
            // `\R` is one logical newline: LF, or the CR LF pair.
            Some('R') => Width::range(1, 2),
            // `\X` is a full extended grapheme cluster.
            Some('X') => Width::at_least(1),
            _ => Width::fixed(1),
        },
        TokenKind::Interpolation
        | TokenKind::Code
        | TokenKind::Backreference
        | TokenKind::Recursion
        | TokenKind::Unknown => Width::unknown(),
        _ => Width::ZERO,
    }
}

fn versions_of(kind: &TokenKind, content: &str) -> VersionRange {
    match kind {
        TokenKind::Literal => {
            if content.starts_with("\\x{") || content.starts_with("\\N{") {
                VersionRange::since(V5_006)
            } else if content.starts_with("\\o{") {
                VersionRange::since(V5_013003)
            } else {
                VersionRange::BASE
            }
        }
        TokenKind::PresetCharSet => match content.chars().nth(1) {
            Some('h' | 'H' | 'v' | 'V' | 'R') => VersionRange::since(V5_009005),
            Some('p' | 'P') => VersionRange::since(V5_006),
            Some('C') => VersionRange::new(V5_006, Some(V5_023000)),
            Some('N') => VersionRange::since(V5_011),
            _ => VersionRange::BASE,
        },
        TokenKind::PosixCharClass => VersionRange::since(V5_006),
        TokenKind::Assertion => {
            if content == "\\z" {
                VersionRange::since(V5_005)
            } else if content == "\\K" {
                VersionRange::since(V5_009005)
            } else if content.starts_with("\\b{") || content.starts_with("\\B{") {
                VersionRange::since(V5_021009)
            } else {
                VersionRange::BASE
            }
        }
        TokenKind::Quantifier { greed, .. } => {
            if *greed == Greed::Possessive {
                VersionRange::since(V5_009005)
            } else {
                VersionRange::BASE
            }
        }
        TokenKind::Delimiter => {
            if content == "(?[" {
                VersionRange::since(V5_017008)
            } else {
                VersionRange::BASE
            }
        }
        TokenKind::GroupType(group) => match group {
            GroupKind::NamedCapture(_) | GroupKind::BranchReset => {
                VersionRange::since(V5_009005)
            }
            GroupKind::Lookbehind | GroupKind::LookbehindNegative | GroupKind::Atomic => {
                VersionRange::since(V5_005)
            }
            _ => VersionRange::BASE,
        },
        TokenKind::Interpolation => {
            if has_postfix_deref(content) {
                VersionRange::since(V5_019005)
            } else {
                VersionRange::BASE
            }
        }
        TokenKind::Code => {
            let own = if content.starts_with("(??{") {
                VersionRange::since(V5_006)
            } else if content.starts_with("(?p{") {
                VersionRange::new(V5_005, Some(V5_009005))
            } else if content.starts_with("(?{") {
                VersionRange::since(V5_005)
            } else {
                // A replacement body under `/e`.
                VersionRange::BASE
            };
            if has_postfix_deref(content) {
                own.join(VersionRange::since(V5_019005))
            } else {
                own
            }
        }
        TokenKind::Backreference => {
            if content.starts_with("\\k") || content.starts_with("\\g") || content.starts_with("(?P=")
            {
                VersionRange::since(V5_009005)
            } else {
                VersionRange::BASE
            }
        }
        TokenKind::Recursion => VersionRange::since(V5_009005),
        TokenKind::Control => {
            if content == "\\F" {
                VersionRange::since(V5_015008)
            } else {
                VersionRange::BASE
            }
        }
        _ => VersionRange::BASE,
    }
}

/// Whether the text uses a postfix dereference such as `->@*` or
/// `->%{...}`. Plain `->[0]` / `->{key}` subscript chains do not count.
fn has_postfix_deref(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    for window_start in 0..chars.len() {
        if chars[window_start] != '-'
            || window_start + 2 >= chars.len()
            || chars[window_start + 1] != '>'
        {
            continue;
        }
        let mut next = window_start + 2;
        if !matches!(chars[next], '$' | '@' | '%' | '&') {
            continue;
        }
        next += 1;
        if next < chars.len() && chars[next] == '#' {
            next += 1;
        }
        if next < chars.len() && matches!(chars[next], '*' | '[' | '{') {
            return true;
        }
    }
    false
}
