// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use perlre_tree::version::{V5_006, V5_009005, V5_023000};
use perlre_tree::width::Bound;
use perlre_tree::Regexp;

pub fn main() {
    widths();
    versions();
}

fn widths() {
    for pattern in ["abc", "ab|c", "colou?r", "a{2,4}\\d*", "(?=x)y", "\\R"] {
        let regexp = Regexp::parse(pattern, "").unwrap();
        let width = regexp.width(regexp.root());

        let min = match width.min {
            Some(count) => count.to_string(),
            None => "?".to_owned(),
        };
        let max = match width.max {
            Some(Bound::Finite(count)) => count.to_string(),
            Some(Bound::Infinite) => "inf".to_owned(),
            None => "?".to_owned(),
        };
        println!("{} matches {} to {} characters", pattern, min, max);
    }
    println!();
}

fn versions() {
    for source in ["/ab/", "/(?<y>a)/", "/\\C/", "s/a/b/r"] {
        let regexp = Regexp::parse_literal(source).unwrap();
        println!(
            "{} requires perl {}",
            source,
            regexp.introduced(regexp.root())
        );
        if let Some(removed) = regexp.removed(regexp.root()) {
            println!("  gone again in {}", removed);
        }
        for version in [V5_006, V5_009005, V5_023000] {
            println!("  {} accepts it: {}", version, regexp.accepts(version));
        }
    }
}
