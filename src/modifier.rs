// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use bitflags::bitflags;

use crate::version::{
    PerlVersion, V5_000, V5_004, V5_009005, V5_013002, V5_013006, V5_013010, V5_021008, V5_023008,
};

bitflags! {
    /// The modifier letters of a pattern, either trailing (`/.../imsx`)
    /// or scoped (`(?i-x:...)`). Doubled letters get their own flag:
    /// `xx` implies `x`, `aa` implies `a`, `ee` implies `e`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        /// `i`: case-insensitive matching.
        const I = 1 << 0;
        /// `m`: `^` and `$` also match at embedded newlines.
        const M = 1 << 1;
        /// `s`: `.` also matches a newline.
        const S = 1 << 2;
        /// `x`: unescaped whitespace and `#` comments are layout.
        const X = 1 << 3;
        /// `xx`: like `x`, and whitespace inside bracketed classes is
        /// layout as well.
        const XX = 1 << 4;
        /// `p`: preserve the text of the match in `${^PREMATCH}` etc.
        const P = 1 << 5;
        /// `g`: match globally.
        const G = 1 << 6;
        /// `c`: keep the current position after a failed `/g` match.
        const C = 1 << 7;
        /// `o`: compile the pattern once.
        const O = 1 << 8;
        /// `n`: plain parentheses do not capture.
        const N = 1 << 9;
        /// `a`: restrict the character-set semantics to ASCII.
        const A = 1 << 10;
        /// `aa`: additionally forbid ASCII/non-ASCII case folds.
        const AA = 1 << 11;
        /// `d`: the traditional default character-set semantics.
        const D = 1 << 12;
        /// `l`: run-time locale character-set semantics.
        const L = 1 << 13;
        /// `u`: Unicode character-set semantics.
        const U = 1 << 14;
        /// `e`: evaluate the replacement as code (`s///e`).
        const E = 1 << 15;
        /// `ee`: evaluate the replacement, then evaluate the result.
        const EE = 1 << 16;
        /// `r`: return the substituted copy instead of modifying in place.
        const R = 1 << 17;

        /// The mutually exclusive character-set semantics group.
        const CHARSET = Self::A.bits() | Self::AA.bits() | Self::D.bits()
            | Self::L.bits() | Self::U.bits();
    }
}

/// One scanned modifier run: letters to turn on, letters after a `-` to
/// turn off, and whether the run began with the `^` reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModifierChange {
    pub set: Modifiers,
    pub cleared: Modifiers,
    pub caret: bool,
}

impl ModifierChange {
    /// The release that understands every letter mentioned in the run.
    pub fn introduced(&self) -> PerlVersion {
        let mut version = (self.set | self.cleared).introduced();
        if self.caret {
            version = version.max(V5_013006);
        }
        version
    }
}

impl Modifiers {
    /// Apply a scanned run on top of the current set. `^` restarts from
    /// `d-imnsx`; setting any character-set letter displaces the rest of
    /// that group.
    pub fn apply(self, change: ModifierChange) -> Modifiers {
        let mut current = self;
        if change.caret {
            current -= Modifiers::I
                | Modifiers::M
                | Modifiers::S
                | Modifiers::X
                | Modifiers::XX
                | Modifiers::N
                | Modifiers::CHARSET;
            current |= Modifiers::D;
        }
        if change.set.intersects(Modifiers::CHARSET) {
            current -= Modifiers::CHARSET;
        }
        current |= change.set;
        current -= change.cleared;
        current
    }

    /// The release that understands every letter in the set.
    pub fn introduced(&self) -> PerlVersion {
        let mut version = V5_000;
        if self.contains(Modifiers::C) {
            version = version.max(V5_004);
        }
        if self.contains(Modifiers::P) {
            version = version.max(V5_009005);
        }
        if self.contains(Modifiers::R) {
            version = version.max(V5_013002);
        }
        if self.intersects(Modifiers::CHARSET) {
            version = version.max(V5_013010);
        }
        if self.contains(Modifiers::N) {
            version = version.max(V5_021008);
        }
        if self.contains(Modifiers::XX) {
            version = version.max(V5_023008);
        }
        version
    }
}

/// A scanned run plus the characters that did not map to a flag legal in
/// the given context. Unknown letters taint the token that carried them
/// but the known letters still take effect.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ModifierRun {
    pub change: ModifierChange,
    pub unknown: Vec<char>,
}

/// The letters a literal operator accepts after its close delimiter.
/// A bare `/.../` behaves like `m`.
pub(crate) fn allowed_letters(operator: Option<&str>) -> &'static str {
    match operator {
        None | Some("m") => "msixpogcnadlu",
        Some("qr") => "msixponadlu",
        Some("s") => "msixpogcenadlur",
        _ => "",
    }
}

// The letters legal inside `(?...)` and `(?...-...:` runs.
const GROUP_LETTERS: &str = "adlupimsxn";

fn fold_letter(target: &mut Modifiers, letter: char) -> bool {
    let flag = match letter {
        'i' => Modifiers::I,
        'm' => Modifiers::M,
        's' => Modifiers::S,
        'x' => {
            if target.contains(Modifiers::X) {
                Modifiers::XX
            } else {
                Modifiers::X
            }
        }
        'p' => Modifiers::P,
        'g' => Modifiers::G,
        'c' => Modifiers::C,
        'o' => Modifiers::O,
        'n' => Modifiers::N,
        'a' => {
            if target.contains(Modifiers::A) {
                Modifiers::AA
            } else {
                Modifiers::A
            }
        }
        'd' => Modifiers::D,
        'l' => Modifiers::L,
        'u' => Modifiers::U,
        'e' => {
            if target.contains(Modifiers::E) {
                Modifiers::EE
            } else {
                Modifiers::E
            }
        }
        'r' => Modifiers::R,
        _ => return false,
    };
    target.insert(flag);
    true
}

/// Scan a trailing run such as `msx` or `gimr`. Letters outside
/// `allowed` are collected as unknown.
pub(crate) fn parse_trailing_run(text: &str, allowed: &str) -> ModifierRun {
    let mut run = ModifierRun::default();
    for letter in text.chars() {
        if allowed.contains(letter) && fold_letter(&mut run.change.set, letter) {
            continue;
        }
        run.unknown.push(letter);
    }
    run
}

/// Scan the flag part of a `(?flags)`, `(?flags:`, or `(?flags-flags:`
/// group: an optional leading `^`, letters to set, one `-`, letters to
/// clear.
pub(crate) fn parse_group_run(text: &str) -> ModifierRun {
    let mut run = ModifierRun::default();
    let mut clearing = false;
    for (position, letter) in text.chars().enumerate() {
        match letter {
            '^' if position == 0 => run.change.caret = true,
            '-' if !clearing => clearing = true,
            _ => {
                let target = if clearing {
                    &mut run.change.cleared
                } else {
                    &mut run.change.set
                };
                if !(GROUP_LETTERS.contains(letter) && fold_letter(target, letter)) {
                    run.unknown.push(letter);
                }
            }
        }
    }
    run
}
