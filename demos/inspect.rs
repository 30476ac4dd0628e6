// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use perlre_tree::element::ElementId;
use perlre_tree::Regexp;

pub fn main() {
    // A match with named captures.
    inspect("/(?<year>\\d{4})-(?<month>\\d{2})/n");

    // A substitution with separately bracketed parts.
    inspect("s{cat} {dog}ge");

    // A defective pattern: the parse still succeeds, the defect stays
    // local to the parenthesis that caused it.
    inspect("m/a(b/");
}

fn inspect(source: &str) {
    let regexp = Regexp::parse_literal(source).unwrap();
    println!("{}", regexp.source());
    print_element(&regexp, regexp.root(), 0);

    for diagnostic in regexp.diagnostics() {
        println!(
            "  defect at column {}: {}",
            diagnostic.range.column + 1,
            diagnostic.message
        );
    }

    for name in regexp.capture_names() {
        println!("  named capture: {}", name);
    }
    println!();
}

fn print_element(regexp: &Regexp, id: ElementId, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    let children = regexp.children(id);
    if children.is_empty() {
        println!("{}{} {:?}", indent, regexp.tag(id), regexp.content(id));
    } else {
        println!("{}{}", indent, regexp.tag(id));
        for child in children {
            print_element(regexp, *child, depth + 1);
        }
    }
}
