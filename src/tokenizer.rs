// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Turns pattern text into a flat token stream.
//!
//! Literals are framed first: operator word, delimited part(s), trailing
//! modifiers. The framing settles the effective modifiers, which the
//! body scan needs before it starts (`/x` changes what whitespace and
//! `#` mean). The body scan itself is a single pass, one character at a
//! time, with a cookie stack for the two contexts that re-interpret
//! characters wholesale: bracketed classes and `(?[ ... ])` sets.

use crate::charwithposition::{CharWithPosition, CharsWithPositionIter};
use crate::element::Diagnostic;
use crate::error::PerlreError;
use crate::location::Location;
use crate::modifier::{
    allowed_letters, parse_group_run, parse_trailing_run, Modifiers,
};
use crate::peekableiter::PeekableIter;
use crate::token::{Greed, GroupKind, Token, TokenKind};
use crate::version::VersionRange;
use crate::width::Bound;

const PEEK_DEPTH: usize = 4;

/// The flat output of a scan: every character of the input is covered by
/// exactly one token, in order. `end` is the zero-length position just
/// past the last character.
#[derive(Debug)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
    pub end: Location,
}

/// Scan a bare pattern (no operator, no boundary delimiters) under the
/// given modifiers.
pub fn scan_pattern(pattern: &str, modifiers: Modifiers) -> TokenStream {
    let mut upstream = pattern.chars();
    let chars: Vec<CharWithPosition> = CharsWithPositionIter::new(&mut upstream).collect();
    let end = end_of_input_position(&chars);
    let (tokens, diagnostics) = scan_part(&chars, modifiers, true, PartMode::Body);
    TokenStream {
        tokens,
        diagnostics,
        end,
    }
}

/// Scan a complete literal (`/.../i`, `m{...}`, `qr(...)`, `s/.../.../`).
pub fn scan_literal(source: &str) -> Result<TokenStream, PerlreError> {
    Ok(scan_literal_parts(source, Modifiers::empty())?.into_stream())
}

/// A literal broken into its roles. The lexer builds the tree parts
/// directly from this; `into_stream` flattens it for callers that want
/// the plain sequence.
#[derive(Debug)]
pub(crate) struct ScannedLiteral {
    pub operator: Option<Token>,
    pub gap: Option<Token>,
    pub match_tokens: Vec<Token>,
    pub match_closed: bool,
    pub between: Option<Token>,
    pub replacement_tokens: Option<Vec<Token>>,
    pub replacement_expected: bool,
    /// The replacement part opened with its own delimiter (bracketed
    /// substitutions); a shared-delimiter replacement has only a close.
    pub replacement_delimited: bool,
    pub replacement_closed: bool,
    pub modifier: Option<Token>,
    pub flags: Modifiers,
    pub diagnostics: Vec<Diagnostic>,
    pub end: Location,
}

impl ScannedLiteral {
    pub(crate) fn into_stream(self) -> TokenStream {
        let mut tokens = Vec::new();
        if let Some(token) = self.operator {
            tokens.push(token);
        }
        if let Some(token) = self.gap {
            tokens.push(token);
        }
        tokens.extend(self.match_tokens);
        if let Some(token) = self.between {
            tokens.push(token);
        }
        if let Some(part) = self.replacement_tokens {
            tokens.extend(part);
        }
        if let Some(token) = self.modifier {
            tokens.push(token);
        }
        TokenStream {
            tokens,
            diagnostics: self.diagnostics,
            end: self.end,
        }
    }
}

fn close_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

/// Find the close delimiter for a part starting at `index`. Escapes hide
/// the next character; bracketed delimiters nest. Returns the exclusive
/// end of the body and the index of the close delimiter when found.
fn find_close(
    chars: &[CharWithPosition],
    mut index: usize,
    open: char,
    close: char,
) -> (usize, Option<usize>) {
    let nesting = open != close;
    let mut depth = 1usize;
    while index < chars.len() {
        let c = chars[index].character;
        if c == '\\' {
            index += 2;
            continue;
        }
        if nesting && c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return (index, Some(index));
            }
        }
        index += 1;
    }
    (chars.len(), None)
}

/// Frame and scan a full literal. The only outright failures are an
/// empty literal, an operator with no delimiter to follow it, and an
/// operator this crate does not parse; everything else degrades to
/// in-stream defects.
pub(crate) fn scan_literal_parts(
    source: &str,
    defaults: Modifiers,
) -> Result<ScannedLiteral, PerlreError> {
    let mut upstream = source.chars();
    let chars: Vec<CharWithPosition> = CharsWithPositionIter::new(&mut upstream).collect();
    if chars.is_empty() {
        return Err(PerlreError::SyntaxIncorrect(
            "empty regex literal".to_owned(),
        ));
    }

    let mut index = 0usize;

    // Operator word.
    let first = chars[0].character;
    let mut operator_name: Option<String> = None;
    let operator = if first.is_ascii_lowercase() {
        let start = chars[0].position;
        let mut word = String::new();
        while index < chars.len() && chars[index].character.is_ascii_lowercase() {
            word.push(chars[index].character);
            index += 1;
        }
        match word.as_str() {
            "m" | "qr" | "s" => {}
            "tr" | "y" => {
                return Err(PerlreError::SyntaxIncorrect(format!(
                    "transliteration operator '{}' is not supported",
                    word
                )));
            }
            _ => {
                return Err(PerlreError::SyntaxIncorrect(format!(
                    "unrecognized pattern operator '{}'",
                    word
                )));
            }
        }
        let token = Token::new(
            TokenKind::Delimiter,
            word.clone(),
            Location::from_position_and_length(&start, word.chars().count()),
        );
        operator_name = Some(word);
        Some(token)
    } else if first.is_alphanumeric() || first == '\\' || first.is_whitespace() {
        return Err(PerlreError::SyntaxIncorrect(format!(
            "'{}' cannot start a regex literal",
            first
        )));
    } else {
        None
    };

    // Whitespace is tolerated between the operator word and its open
    // delimiter.
    let gap = if operator.is_some() {
        let gap_start = index;
        while index < chars.len() && chars[index].character.is_whitespace() {
            index += 1;
        }
        if index > gap_start {
            Some(whitespace_token(&chars[gap_start..index]))
        } else {
            None
        }
    } else {
        None
    };

    if index >= chars.len() {
        return Err(PerlreError::SyntaxIncorrect(
            "pattern operator with no delimiter".to_owned(),
        ));
    }
    let open_char = chars[index].character;
    if open_char.is_alphanumeric() || open_char == '\\' {
        return Err(PerlreError::SyntaxIncorrect(format!(
            "'{}' cannot delimit a regex literal",
            open_char
        )));
    }

    let open_index = index;
    let close_char = close_for(open_char);
    let body_start = open_index + 1;
    let (body_end, close_index) = find_close(&chars, body_start, open_char, close_char);
    let match_closed = close_index.is_some();

    // The replacement part of a substitution. With a bracketed first
    // part the second part brings its own pair of delimiters (possibly a
    // different pair); otherwise the close of the first part doubles as
    // its start.
    let replacement_expected = operator_name.as_deref() == Some("s");
    let mut between_range: Option<(usize, usize)> = None;
    let mut replacement: Option<(Option<usize>, usize, usize, Option<usize>, char)> = None;
    let mut replacement_missing = false;
    let mut tail_start = match close_index {
        Some(close) => close + 1,
        None => chars.len(),
    };

    if replacement_expected && match_closed {
        if open_char != close_char {
            // Bracketed: skip layout, then expect a fresh open delimiter.
            let mut cursor = tail_start;
            let ws_start = cursor;
            while cursor < chars.len() && chars[cursor].character.is_whitespace() {
                cursor += 1;
            }
            if cursor > ws_start {
                between_range = Some((ws_start, cursor));
            }
            if cursor < chars.len()
                && !chars[cursor].character.is_alphanumeric()
                && chars[cursor].character != '\\'
            {
                let open2 = chars[cursor].character;
                let close2 = close_for(open2);
                let body2_start = cursor + 1;
                let (body2_end, close2_index) = find_close(&chars, body2_start, open2, close2);
                replacement = Some((Some(cursor), body2_start, body2_end, close2_index, open2));
                tail_start = match close2_index {
                    Some(close) => close + 1,
                    None => chars.len(),
                };
            } else {
                replacement_missing = true;
                between_range = None;
                tail_start = ws_start;
            }
        } else {
            // Shared delimiter: `s/a/b/`.
            let body2_start = tail_start;
            let (body2_end, close2_index) = find_close(&chars, body2_start, open_char, close_char);
            replacement = Some((None, body2_start, body2_end, close2_index, open_char));
            tail_start = match close2_index {
                Some(close) => close + 1,
                None => chars.len(),
            };
        }
    } else if replacement_expected {
        replacement_missing = true;
    }

    let mut diagnostics = Vec::new();

    // Trailing modifiers: only meaningful when the final delimiter was
    // found; an unterminated literal has no tail.
    let literal_closed = match_closed
        && match replacement {
            Some((_, _, _, close2, _)) => close2.is_some(),
            None => !replacement_missing || !replacement_expected,
        };
    let mods_text: String = chars[tail_start.min(chars.len())..]
        .iter()
        .map(|c| c.character)
        .collect();
    let run = parse_trailing_run(&mods_text, allowed_letters(operator_name.as_deref()));
    let flags = defaults.apply(run.change);

    let modifier = if literal_closed || replacement_missing {
        let mods_range = if tail_start < chars.len() {
            Location::from_position_and_length(
                &chars[tail_start].position,
                chars.len() - tail_start,
            )
        } else {
            end_of_input_position(&chars)
        };
        if run.unknown.is_empty() {
            let mut token = Token::new(TokenKind::Modifier, mods_text, mods_range);
            token.versions = VersionRange::since(run.change.introduced());
            Some(token)
        } else {
            let letters: String = run.unknown.iter().collect();
            let message = format!(
                "unknown or inapplicable modifier letter(s) '{}'",
                letters
            );
            diagnostics.push(Diagnostic {
                message: message.clone(),
                range: mods_range,
            });
            Some(Token::unknown(mods_text, mods_range, message))
        }
    } else {
        None
    };

    // Scan the bodies now that the effective flags are known.
    let interpolation = open_char != '\'';
    let mut match_tokens = vec![delimiter_token(&chars[open_index])];
    let (body_tokens, body_diags) =
        scan_part(&chars[body_start..body_end], flags, interpolation, PartMode::Body);
    match_tokens.extend(body_tokens);
    diagnostics.extend(body_diags);
    if let Some(close) = close_index {
        match_tokens.push(delimiter_token(&chars[close]));
    } else {
        diagnostics.push(Diagnostic {
            message: format!("missing '{}' to close the pattern", close_char),
            range: chars[open_index].position,
        });
    }

    let between = between_range.map(|(start, end)| whitespace_token(&chars[start..end]));

    let mut replacement_closed = false;
    let mut replacement_delimited = false;
    let replacement_tokens = match replacement {
        Some((open2_index, body2_start, body2_end, close2_index, open2)) => {
            let mut part = Vec::new();
            if let Some(open2_at) = open2_index {
                part.push(delimiter_token(&chars[open2_at]));
                replacement_delimited = true;
            }
            if flags.contains(Modifiers::E) {
                // Under /e the whole replacement is one embedded-code
                // fragment.
                let body = &chars[body2_start..body2_end];
                let text: String = body.iter().map(|c| c.character).collect();
                let range = if let Some(first) = body.first() {
                    Location::from_position_and_length(&first.position, body.len())
                } else {
                    Location::new_range(
                        chars[body2_start.saturating_sub(1)].position.index + 1,
                        chars[body2_start.saturating_sub(1)].position.line,
                        chars[body2_start.saturating_sub(1)].position.column + 1,
                        0,
                    )
                };
                part.push(Token::new(TokenKind::Code, text, range));
            } else {
                let interpolate_replacement = open2 != '\'';
                let (tokens, diags) = scan_part(
                    &chars[body2_start..body2_end],
                    flags,
                    interpolate_replacement,
                    PartMode::Replacement,
                );
                part.extend(tokens);
                diagnostics.extend(diags);
            }
            if let Some(close2) = close2_index {
                part.push(delimiter_token(&chars[close2]));
                replacement_closed = true;
            } else {
                diagnostics.push(Diagnostic {
                    message: "missing delimiter to close the replacement".to_owned(),
                    range: chars[body2_start.saturating_sub(1)].position,
                });
            }
            Some(part)
        }
        None => {
            if replacement_missing {
                diagnostics.push(Diagnostic {
                    message: "substitution with no replacement part".to_owned(),
                    range: chars[chars.len() - 1].position,
                });
            }
            None
        }
    };

    Ok(ScannedLiteral {
        operator,
        gap,
        match_tokens,
        match_closed,
        between,
        replacement_tokens,
        replacement_expected,
        replacement_delimited,
        replacement_closed,
        modifier,
        flags,
        diagnostics,
        end: end_of_input_position(&chars),
    })
}

fn delimiter_token(c: &CharWithPosition) -> Token {
    Token::new(
        TokenKind::Delimiter,
        c.character.to_string(),
        Location::from_position_and_length(&c.position, 1),
    )
}

fn whitespace_token(chars: &[CharWithPosition]) -> Token {
    let text: String = chars.iter().map(|c| c.character).collect();
    let range = match chars.first() {
        Some(first) => Location::from_position_and_length(&first.position, chars.len()),
        None => Location::new_position(0, 0, 0),
    };
    Token::new(TokenKind::Whitespace, text, range)
}

fn end_of_input_position(chars: &[CharWithPosition]) -> Location {
    match chars.last() {
        Some(last) if last.character == '\n' => {
            Location::new_range(last.position.index + 1, last.position.line + 1, 0, 0)
        }
        Some(last) => Location::new_range(
            last.position.index + 1,
            last.position.line,
            last.position.column + 1,
            0,
        ),
        None => Location::new_range(0, 0, 0, 0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartMode {
    Body,
    Replacement,
}

#[derive(Debug)]
enum Cookie {
    CharClass { at_start: bool, negated: bool },
    RegexSet,
}

fn scan_part(
    chars: &[CharWithPosition],
    flags: Modifiers,
    interpolation: bool,
    mode: PartMode,
) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut upstream = chars.iter().copied();
    let mut scanner = PartScanner {
        upstream: PeekableIter::new(&mut upstream, PEEK_DEPTH),
        tokens: Vec::new(),
        diagnostics: Vec::new(),
        cookies: Vec::new(),
        scopes: vec![flags],
        interpolation,
    };
    scanner.run(mode);
    (scanner.tokens, scanner.diagnostics)
}

struct PartScanner<'a> {
    upstream: PeekableIter<'a, CharWithPosition>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    cookies: Vec<Cookie>,
    /// One frame per open group; the top frame holds the flags in
    /// effect at the current position.
    scopes: Vec<Modifiers>,
    interpolation: bool,
}

impl<'a> PartScanner<'a> {
    fn run(&mut self, mode: PartMode) {
        match mode {
            PartMode::Body => {
                while self.peek_char(0).is_some() {
                    match self.cookies.last() {
                        Some(Cookie::CharClass { .. }) => self.scan_in_class(),
                        Some(Cookie::RegexSet) => self.scan_in_set(),
                        None => self.scan_in_body(),
                    }
                }
            }
            PartMode::Replacement => {
                while self.peek_char(0).is_some() {
                    self.scan_in_replacement();
                }
            }
        }
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.upstream.peek(offset).map(|c| c.character)
    }

    fn pick(&mut self) -> Option<CharWithPosition> {
        self.upstream.next()
    }

    /// Consume one character, appending it to `text`. False at end of
    /// input.
    fn consume_into(&mut self, text: &mut String) -> bool {
        match self.pick() {
            Some(c) => {
                text.push(c.character);
                true
            }
            None => false,
        }
    }

    fn consume_while(&mut self, text: &mut String, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek_char(0) {
            if !predicate(c) {
                break;
            }
            text.push(c);
            self.pick();
        }
    }

    /// Consume a balanced `open`...`close` group, nested pairs included,
    /// with backslash hiding the next character. False when the input
    /// ends first (everything up to the end is consumed into `text`).
    fn consume_balanced(&mut self, text: &mut String, open: char, close: char) -> bool {
        let mut depth = 0usize;
        while let Some(c) = self.peek_char(0) {
            if c == '\\' {
                self.consume_into(text);
                if !self.consume_into(text) {
                    return false;
                }
                continue;
            }
            self.consume_into(text);
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return true;
                }
            }
        }
        false
    }

    fn push_token(&mut self, kind: TokenKind, content: String, start: &Location) {
        let range = Location::from_position_and_length(start, content.chars().count());
        self.tokens.push(Token::new(kind, content, range));
    }

    fn push_unknown(&mut self, content: String, start: &Location, message: &str) {
        let range = Location::from_position_and_length(start, content.chars().count());
        self.diagnostics.push(Diagnostic {
            message: message.to_owned(),
            range,
        });
        self.tokens.push(Token::unknown(content, range, message));
    }

    fn current_flags(&self) -> Modifiers {
        self.scopes.last().copied().unwrap_or_default()
    }

    fn push_scope(&mut self) {
        let top = self.current_flags();
        self.scopes.push(top);
    }

    fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn x_mode(&self) -> bool {
        self.current_flags().contains(Modifiers::X)
    }

    fn xx_mode(&self) -> bool {
        self.current_flags().contains(Modifiers::XX)
    }

    // ----- plain body context -------------------------------------------

    fn scan_in_body(&mut self) {
        let current = match self.upstream.peek(0) {
            Some(c) => *c,
            None => return,
        };
        let c = current.character;
        let start = current.position;

        match c {
            '\\' => self.scan_escape(false),
            '(' => self.scan_group(),
            ')' => {
                self.pick();
                self.push_token(TokenKind::Delimiter, ")".to_owned(), &start);
                self.pop_scope();
            }
            '[' => {
                self.pick();
                self.push_token(TokenKind::Delimiter, "[".to_owned(), &start);
                self.cookies.push(Cookie::CharClass {
                    at_start: true,
                    negated: false,
                });
            }
            '.' => {
                self.pick();
                self.push_token(TokenKind::Dot, ".".to_owned(), &start);
            }
            '^' => {
                self.pick();
                self.push_token(TokenKind::Assertion, "^".to_owned(), &start);
            }
            '$' if self.interpolation && self.interpolation_follows() => {
                self.scan_interpolation();
            }
            '$' => {
                self.pick();
                self.push_token(TokenKind::Assertion, "$".to_owned(), &start);
            }
            '@' if self.interpolation && self.interpolation_follows() => {
                self.scan_interpolation();
            }
            '|' => {
                self.pick();
                self.push_token(TokenKind::Operator, "|".to_owned(), &start);
            }
            '*' | '+' | '?' => self.scan_symbol_quantifier(),
            '{' => self.scan_brace_quantifier(),
            '#' if self.x_mode() => self.scan_line_comment(),
            _ if c.is_whitespace() && self.x_mode() => self.scan_whitespace_run(),
            _ => {
                self.pick();
                self.push_token(TokenKind::Literal, c.to_string(), &start);
            }
        }
    }

    fn scan_whitespace_run(&mut self) {
        let start = match self.upstream.peek(0) {
            Some(c) => c.position,
            None => return,
        };
        let mut text = String::new();
        self.consume_while(&mut text, |c| c.is_whitespace());
        self.push_token(TokenKind::Whitespace, text, &start);
    }

    fn scan_line_comment(&mut self) {
        let start = match self.upstream.peek(0) {
            Some(c) => c.position,
            None => return,
        };
        let mut text = String::new();
        self.consume_while(&mut text, |c| c != '\n');
        self.push_token(TokenKind::Comment, text, &start);
    }

    fn scan_symbol_quantifier(&mut self) {
        let first = match self.pick() {
            Some(c) => c,
            None => return,
        };
        let start = first.position;
        let mut text = first.character.to_string();
        let (min, max) = match first.character {
            '*' => (0, Bound::Infinite),
            '+' => (1, Bound::Infinite),
            _ => (0, Bound::Finite(1)),
        };
        let greed = self.scan_greed_mark(&mut text);
        self.push_token(TokenKind::Quantifier { min, max, greed }, text, &start);
    }

    fn scan_greed_mark(&mut self, text: &mut String) -> Greed {
        match self.peek_char(0) {
            Some('?') => {
                self.consume_into(text);
                Greed::Lazy
            }
            Some('+') => {
                self.consume_into(text);
                Greed::Possessive
            }
            _ => Greed::Greedy,
        }
    }

    /// `{` starts a quantifier only when the braces hold `n`, `n,`, or
    /// `n,m`. Anything else leaves every consumed character behind as a
    /// plain literal, which is what the interpreter does too.
    fn scan_brace_quantifier(&mut self) {
        let mut consumed: Vec<CharWithPosition> = Vec::new();
        match self.pick() {
            Some(c) => consumed.push(c),
            None => return,
        }

        let mut low = String::new();
        let mut high = String::new();
        let mut saw_comma = false;
        while let Some(c) = self.peek_char(0) {
            if c.is_ascii_digit() {
                if saw_comma {
                    high.push(c);
                } else {
                    low.push(c);
                }
            } else if c == ',' && !saw_comma {
                saw_comma = true;
            } else {
                break;
            }
            match self.pick() {
                Some(consumed_char) => consumed.push(consumed_char),
                None => break,
            }
        }

        let quantifier = if self.peek_char(0) == Some('}') && !low.is_empty() {
            match (low.parse::<u64>(), saw_comma, high.parse::<u64>()) {
                (Ok(min), false, _) => Some((min, Bound::Finite(min))),
                (Ok(min), true, _) if high.is_empty() => Some((min, Bound::Infinite)),
                (Ok(min), true, Ok(max)) => Some((min, Bound::Finite(max))),
                _ => None,
            }
        } else {
            None
        };

        match quantifier {
            Some((min, max)) => {
                if let Some(c) = self.pick() {
                    consumed.push(c); // '}'
                }
                let start = consumed[0].position;
                let mut text: String = consumed.iter().map(|c| c.character).collect();
                let greed = self.scan_greed_mark(&mut text);
                self.push_token(TokenKind::Quantifier { min, max, greed }, text, &start);
            }
            None => {
                for c in consumed {
                    self.push_token(TokenKind::Literal, c.character.to_string(), &c.position);
                }
            }
        }
    }

    // ----- groups ---------------------------------------------------------

    fn scan_group(&mut self) {
        let open = match self.pick() {
            Some(c) => c,
            None => return,
        };
        let start = open.position;

        if self.peek_char(0) != Some('?') {
            self.push_token(TokenKind::Delimiter, "(".to_owned(), &start);
            self.push_scope();
            return;
        }

        let mut text = String::from("(");
        self.consume_into(&mut text); // consume '?'

        match self.peek_char(0) {
            Some('#') => self.scan_comment_group(start, text),
            Some('{') => self.scan_code_group(start, text),
            Some('?') if self.peek_char(1) == Some('{') => {
                self.consume_into(&mut text); // consume '?'
                self.scan_code_group(start, text);
            }
            Some('p') if self.peek_char(1) == Some('{') => {
                self.consume_into(&mut text); // consume 'p'
                self.scan_code_group(start, text);
            }
            Some('P') => self.scan_python_group(start, text),
            Some('&') => {
                self.consume_into(&mut text); // consume '&'
                self.scan_recursion_name(start, text);
            }
            Some('R') | Some('0') if self.peek_char(1) == Some(')') => {
                self.consume_into(&mut text);
                self.consume_into(&mut text); // consume ')'
                self.push_token(TokenKind::Recursion, text, &start);
            }
            Some(c) if c.is_ascii_digit() => self.scan_recursion_number(start, text),
            Some('+') | Some('-')
                if matches!(self.peek_char(1), Some(d) if d.is_ascii_digit()) =>
            {
                self.consume_into(&mut text); // consume the sign
                self.scan_recursion_number(start, text);
            }
            Some('<') => match self.peek_char(1) {
                Some('=') => {
                    self.consume_into(&mut text);
                    self.consume_into(&mut text); // text == "(?<="
                    self.emit_group_type(&start, &text, GroupKind::Lookbehind, None);
                }
                Some('!') => {
                    self.consume_into(&mut text);
                    self.consume_into(&mut text); // text == "(?<!"
                    self.emit_group_type(&start, &text, GroupKind::LookbehindNegative, None);
                }
                Some(c) if c.is_alphabetic() || c == '_' => {
                    self.consume_into(&mut text); // consume '<'
                    self.scan_named_group(start, text, '>');
                }
                _ => {
                    self.consume_into(&mut text);
                    self.emit_group_unknown(&start, &text, "unrecognized group type");
                }
            },
            Some('\'') => {
                self.consume_into(&mut text); // consume the quote
                self.scan_named_group(start, text, '\'');
            }
            Some('=') => {
                self.consume_into(&mut text);
                self.emit_group_type(&start, &text, GroupKind::Lookahead, None);
            }
            Some('!') => {
                self.consume_into(&mut text);
                self.emit_group_type(&start, &text, GroupKind::LookaheadNegative, None);
            }
            Some('>') => {
                self.consume_into(&mut text);
                self.emit_group_type(&start, &text, GroupKind::Atomic, None);
            }
            Some(':') => {
                self.consume_into(&mut text);
                self.emit_group_type(&start, &text, GroupKind::NonCapture, None);
            }
            Some('|') => {
                self.consume_into(&mut text);
                self.emit_group_type(&start, &text, GroupKind::BranchReset, None);
            }
            Some('[') => {
                self.consume_into(&mut text); // text == "(?["
                self.push_token(TokenKind::Delimiter, text, &start);
                self.push_scope();
                self.cookies.push(Cookie::RegexSet);
            }
            Some(c) if c.is_ascii_lowercase() || c == '^' || c == '-' => {
                self.scan_flag_group(start, text);
            }
            Some(_) => {
                self.consume_into(&mut text);
                self.emit_group_unknown(&start, &text, "unrecognized group type");
            }
            None => {
                self.emit_group_unknown(&start, &text, "end of pattern inside a group type");
            }
        }
    }

    /// Emit the `(` delimiter and the group-type token that styles the
    /// structure the lexer will build. `full_text` includes the leading
    /// `(`, which gets its own token.
    fn emit_group_type(
        &mut self,
        start: &Location,
        full_text: &str,
        kind: GroupKind,
        floor: Option<VersionRange>,
    ) {
        self.push_token(TokenKind::Delimiter, "(".to_owned(), start);
        self.push_scope();

        let type_text: String = full_text.chars().skip(1).collect();
        let type_start = Location::new_position(start.index + 1, start.line, start.column + 1);
        let range = Location::from_position_and_length(&type_start, type_text.chars().count());
        let mut token = Token::new(TokenKind::GroupType(kind), type_text, range);
        if let Some(floor) = floor {
            token.versions = token.versions.join(floor);
        }
        self.tokens.push(token);
    }

    /// The garbage path for `(?` followed by something unrecognizable:
    /// the parenthesis still opens a group so the rest of the pattern
    /// keeps its shape, and the bad marker enters the stream as a
    /// defect.
    fn emit_group_unknown(&mut self, start: &Location, full_text: &str, message: &str) {
        self.push_token(TokenKind::Delimiter, "(".to_owned(), start);
        self.push_scope();

        let rest: String = full_text.chars().skip(1).collect();
        let rest_start = Location::new_position(start.index + 1, start.line, start.column + 1);
        let range = Location::from_position_and_length(&rest_start, rest.chars().count());
        self.diagnostics.push(Diagnostic {
            message: message.to_owned(),
            range,
        });
        self.tokens.push(Token::unknown(rest, range, message));
    }

    fn scan_comment_group(&mut self, start: Location, mut text: String) {
        // An inline comment runs to the first ')'; there is no escaping
        // inside it.
        self.consume_into(&mut text); // consume '#'
        self.consume_while(&mut text, |c| c != ')');
        if self.peek_char(0) == Some(')') {
            self.consume_into(&mut text);
            self.push_token(TokenKind::Comment, text, &start);
        } else {
            self.push_unknown(text, &start, "unterminated inline comment");
        }
    }

    fn scan_code_group(&mut self, start: Location, mut text: String) {
        if !self.consume_balanced(&mut text, '{', '}') {
            self.push_unknown(text, &start, "unterminated embedded code block");
            return;
        }
        if self.peek_char(0) == Some(')') {
            self.consume_into(&mut text);
            if matches!(self.cookies.last(), Some(Cookie::RegexSet)) {
                self.push_unknown(
                    text,
                    &start,
                    "embedded code is not valid inside an extended character class",
                );
            } else {
                self.push_token(TokenKind::Code, text, &start);
            }
        } else {
            self.push_unknown(text, &start, "embedded code block not closed by ')'");
        }
    }

    fn scan_python_group(&mut self, start: Location, mut text: String) {
        self.consume_into(&mut text); // consume 'P'
        match self.peek_char(0) {
            Some('<') => {
                self.consume_into(&mut text);
                self.scan_named_group(start, text, '>');
            }
            Some('=') | Some('>') => {
                let reference = self.peek_char(0) == Some('=');
                self.consume_into(&mut text);
                let name = self.consume_name(&mut text);
                if name.is_some() && self.peek_char(0) == Some(')') {
                    self.consume_into(&mut text);
                    let kind = if reference {
                        TokenKind::Backreference
                    } else {
                        TokenKind::Recursion
                    };
                    self.push_token(kind, text, &start);
                } else {
                    self.push_unknown(text, &start, "malformed named group reference");
                }
            }
            _ => {
                self.emit_group_unknown(&start, &text, "unrecognized group type");
            }
        }
    }

    fn scan_named_group(&mut self, start: Location, mut text: String, terminator: char) {
        let name = self.consume_name(&mut text);
        match name {
            Some(name) if self.peek_char(0) == Some(terminator) => {
                self.consume_into(&mut text);
                self.emit_group_type(&start, &text, GroupKind::NamedCapture(name), None);
            }
            _ => {
                self.emit_group_unknown(&start, &text, "malformed capture-group name");
            }
        }
    }

    fn scan_recursion_name(&mut self, start: Location, mut text: String) {
        let name = self.consume_name(&mut text);
        if name.is_some() && self.peek_char(0) == Some(')') {
            self.consume_into(&mut text);
            self.push_token(TokenKind::Recursion, text, &start);
        } else {
            self.push_unknown(text, &start, "malformed recursion group");
        }
    }

    fn scan_recursion_number(&mut self, start: Location, mut text: String) {
        self.consume_while(&mut text, |c| c.is_ascii_digit());
        if self.peek_char(0) == Some(')') {
            self.consume_into(&mut text);
            self.push_token(TokenKind::Recursion, text, &start);
        } else {
            self.push_unknown(text, &start, "malformed recursion group");
        }
    }

    fn scan_flag_group(&mut self, start: Location, mut text: String) {
        let mut run = String::new();
        while let Some(c) = self.peek_char(0) {
            if c.is_ascii_lowercase() || c == '^' || c == '-' {
                run.push(c);
                self.consume_into(&mut text);
            } else {
                break;
            }
        }

        match self.peek_char(0) {
            Some(':') => {
                self.consume_into(&mut text);
                let parsed = parse_group_run(&run);
                if parsed.unknown.is_empty() {
                    self.emit_group_type(
                        &start,
                        &text,
                        GroupKind::NonCapture,
                        Some(VersionRange::since(parsed.change.introduced())),
                    );
                } else {
                    let letters: String = parsed.unknown.iter().collect();
                    let message =
                        format!("unknown scoped modifier letter(s) '{}'", letters);
                    self.emit_group_unknown(&start, &text, &message);
                }
                // The known letters shape scanning either way.
                if let Some(top) = self.scopes.last_mut() {
                    *top = top.apply(parsed.change);
                }
            }
            Some(')') => {
                self.consume_into(&mut text);
                let parsed = parse_group_run(&run);
                if parsed.unknown.is_empty() && !run.is_empty() {
                    let range =
                        Location::from_position_and_length(&start, text.chars().count());
                    let mut token = Token::new(TokenKind::Modifier, text, range);
                    token.versions = VersionRange::since(parsed.change.introduced());
                    self.tokens.push(token);
                } else {
                    let message = if run.is_empty() {
                        "empty group modifier".to_owned()
                    } else {
                        let letters: String = parsed.unknown.iter().collect();
                        format!("unknown scoped modifier letter(s) '{}'", letters)
                    };
                    self.push_unknown(text, &start, &message);
                }
                // A standalone `(?i)` rewrites the flags of the scope it
                // sits in.
                if let Some(top) = self.scopes.last_mut() {
                    *top = top.apply(parsed.change);
                }
            }
            _ => {
                self.emit_group_unknown(&start, &text, "unrecognized group type");
            }
        }
    }

    fn consume_name(&mut self, text: &mut String) -> Option<String> {
        let mut name = String::new();
        match self.peek_char(0) {
            Some(c) if c.is_alphabetic() || c == '_' => {
                name.push(c);
                text.push(c);
                self.pick();
            }
            _ => return None,
        }
        while let Some(c) = self.peek_char(0) {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                text.push(c);
                self.pick();
            } else {
                break;
            }
        }
        Some(name)
    }

    // ----- escapes ----------------------------------------------------------

    fn scan_escape(&mut self, in_class: bool) {
        let backslash = match self.pick() {
            Some(c) => c,
            None => return,
        };
        let start = backslash.position;
        let mut text = String::from('\\');

        let next = match self.peek_char(0) {
            Some(c) => c,
            None => {
                self.push_unknown(text, &start, "dangling backslash at end of pattern");
                return;
            }
        };

        match next {
            '1'..='9' if !in_class => {
                self.consume_while(&mut text, |c| c.is_ascii_digit());
                self.push_token(TokenKind::Backreference, text, &start);
            }
            '0'..='7' if in_class => {
                // Octal inside a class, up to three digits: `[\1]` is
                // the character U+0001, not a backreference.
                let mut remaining = 3;
                while remaining > 0 && matches!(self.peek_char(0), Some('0'..='7')) {
                    self.consume_into(&mut text);
                    remaining -= 1;
                }
                self.push_token(TokenKind::Literal, text, &start);
            }
            '0' => {
                self.consume_into(&mut text);
                let mut remaining = 2;
                while remaining > 0 && matches!(self.peek_char(0), Some('0'..='7')) {
                    self.consume_into(&mut text);
                    remaining -= 1;
                }
                self.push_token(TokenKind::Literal, text, &start);
            }
            'g' if !in_class => {
                self.consume_into(&mut text);
                match self.peek_char(0) {
                    Some('{') => {
                        if self.consume_balanced(&mut text, '{', '}') {
                            self.push_token(TokenKind::Backreference, text, &start);
                        } else {
                            self.push_unknown(text, &start, "unterminated \\g backreference");
                        }
                    }
                    Some('-') | Some('+') => {
                        self.consume_into(&mut text);
                        if matches!(self.peek_char(0), Some(c) if c.is_ascii_digit()) {
                            self.consume_while(&mut text, |c| c.is_ascii_digit());
                            self.push_token(TokenKind::Backreference, text, &start);
                        } else {
                            self.push_unknown(text, &start, "malformed \\g backreference");
                        }
                    }
                    Some(c) if c.is_ascii_digit() => {
                        self.consume_while(&mut text, |c| c.is_ascii_digit());
                        self.push_token(TokenKind::Backreference, text, &start);
                    }
                    _ => {
                        self.push_unknown(text, &start, "malformed \\g backreference");
                    }
                }
            }
            'k' if !in_class => {
                self.consume_into(&mut text);
                let closed = match self.peek_char(0) {
                    Some('<') => self.consume_bracketed_name(&mut text, '>'),
                    Some('\'') => self.consume_bracketed_name(&mut text, '\''),
                    Some('{') => self.consume_balanced(&mut text, '{', '}'),
                    _ => false,
                };
                if closed {
                    self.push_token(TokenKind::Backreference, text, &start);
                } else {
                    self.push_unknown(text, &start, "malformed \\k backreference");
                }
            }
            'b' | 'B' => {
                self.consume_into(&mut text);
                if in_class {
                    // `[\b]` is the backspace character.
                    self.push_token(TokenKind::Literal, text, &start);
                } else if self.peek_char(0) == Some('{') {
                    if self.consume_balanced(&mut text, '{', '}') {
                        self.push_token(TokenKind::Assertion, text, &start);
                    } else {
                        self.push_unknown(text, &start, "unterminated boundary assertion");
                    }
                } else {
                    self.push_token(TokenKind::Assertion, text, &start);
                }
            }
            'A' | 'Z' | 'z' | 'G' | 'K' if !in_class => {
                self.consume_into(&mut text);
                self.push_token(TokenKind::Assertion, text, &start);
            }
            'Q' | 'E' | 'L' | 'U' | 'l' | 'u' | 'F' => {
                self.consume_into(&mut text);
                self.push_token(TokenKind::Control, text, &start);
            }
            'd' | 'D' | 's' | 'S' | 'w' | 'W' | 'h' | 'H' | 'v' | 'V' => {
                self.consume_into(&mut text);
                self.push_token(TokenKind::PresetCharSet, text, &start);
            }
            'R' | 'X' | 'C' if !in_class => {
                self.consume_into(&mut text);
                self.push_token(TokenKind::PresetCharSet, text, &start);
            }
            'N' => {
                self.consume_into(&mut text);
                if self.peek_char(0) == Some('{')
                    && !matches!(self.peek_char(1), Some(c) if c.is_ascii_digit())
                {
                    // `\N{NAME}` or `\N{U+263A}`: one named character.
                    // `\N{3}` is bare `\N` with a quantifier, so the
                    // braces are left for the quantifier scan.
                    if self.consume_balanced(&mut text, '{', '}') {
                        self.push_token(TokenKind::Literal, text, &start);
                    } else {
                        self.push_unknown(text, &start, "unterminated \\N{} escape");
                    }
                } else if in_class {
                    self.push_unknown(
                        text,
                        &start,
                        "bare \\N is not valid inside a character class",
                    );
                } else {
                    self.push_token(TokenKind::PresetCharSet, text, &start);
                }
            }
            'p' | 'P' => {
                self.consume_into(&mut text);
                match self.peek_char(0) {
                    Some('{') => {
                        if self.consume_balanced(&mut text, '{', '}') {
                            self.push_token(TokenKind::PresetCharSet, text, &start);
                        } else {
                            self.push_unknown(text, &start, "unterminated character property");
                        }
                    }
                    Some(c) if c.is_alphabetic() => {
                        self.consume_into(&mut text);
                        self.push_token(TokenKind::PresetCharSet, text, &start);
                    }
                    _ => {
                        self.push_unknown(text, &start, "malformed character property");
                    }
                }
            }
            'x' => {
                self.consume_into(&mut text);
                if self.peek_char(0) == Some('{') {
                    if self.consume_balanced(&mut text, '{', '}') {
                        self.push_token(TokenKind::Literal, text, &start);
                    } else {
                        self.push_unknown(text, &start, "unterminated \\x{} escape");
                    }
                } else {
                    let mut remaining = 2;
                    while remaining > 0
                        && matches!(self.peek_char(0), Some(c) if c.is_ascii_hexdigit())
                    {
                        self.consume_into(&mut text);
                        remaining -= 1;
                    }
                    self.push_token(TokenKind::Literal, text, &start);
                }
            }
            'o' => {
                self.consume_into(&mut text);
                if self.peek_char(0) == Some('{') {
                    if self.consume_balanced(&mut text, '{', '}') {
                        self.push_token(TokenKind::Literal, text, &start);
                    } else {
                        self.push_unknown(text, &start, "unterminated \\o{} escape");
                    }
                } else {
                    self.push_unknown(text, &start, "\\o escape requires braces");
                }
            }
            'c' => {
                self.consume_into(&mut text);
                if self.consume_into(&mut text) {
                    self.push_token(TokenKind::Literal, text, &start);
                } else {
                    self.push_unknown(text, &start, "dangling \\c escape");
                }
            }
            _ => {
                // Identity escapes, character escapes like `\t`, and
                // unrecognized alphabetics, which the interpreter passes
                // through with a warning.
                self.consume_into(&mut text);
                self.push_token(TokenKind::Literal, text, &start);
            }
        }
    }

    fn consume_bracketed_name(&mut self, text: &mut String, terminator: char) -> bool {
        self.consume_into(text); // the opening bracket or quote
        self.consume_while(text, |c| c.is_alphanumeric() || c == '_' || c == '-');
        if self.peek_char(0) == Some(terminator) {
            self.consume_into(text);
            true
        } else {
            false
        }
    }

    // ----- interpolation ------------------------------------------------

    /// Whether the sigil at peek(0) starts an interpolation rather than
    /// an anchor (`$`) or a plain literal (`@`).
    fn interpolation_follows(&self) -> bool {
        let next = self.peek_char(1);
        match self.peek_char(0) {
            Some('$') => matches!(
                next,
                Some(c) if c.is_alphanumeric()
                    || matches!(c, '_' | '{' | '^' | '&' | '`' | '\'' | '+' | '.')
            ),
            Some('@') => matches!(
                next,
                Some(c) if c.is_alphabetic() || matches!(c, '_' | '{' | '-' | '+')
            ),
            _ => false,
        }
    }

    fn scan_interpolation(&mut self) {
        let sigil = match self.pick() {
            Some(c) => c,
            None => return,
        };
        let start = sigil.position;
        let mut text = sigil.character.to_string();

        match self.peek_char(0) {
            Some('{') => {
                if !self.consume_balanced(&mut text, '{', '}') {
                    self.push_unknown(text, &start, "unterminated interpolation block");
                    return;
                }
            }
            Some(c) if c.is_ascii_digit() => {
                self.consume_while(&mut text, |c| c.is_ascii_digit());
            }
            Some('^') => {
                self.consume_into(&mut text);
                if matches!(self.peek_char(0), Some(c) if c.is_alphabetic()) {
                    self.consume_into(&mut text);
                }
            }
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.consume_identifier(&mut text);
            }
            Some(c) if sigil.character == '$' && matches!(c, '&' | '`' | '\'' | '+' | '.') => {
                self.consume_into(&mut text);
            }
            Some(c) if sigil.character == '@' && matches!(c, '-' | '+') => {
                self.consume_into(&mut text);
            }
            _ => {
                // Nothing interpolatable after all.
                self.push_token(TokenKind::Literal, text, &start);
                return;
            }
        }

        // Arrow chains: `->[...]` and `->{...}` subscripts, and postfix
        // dereference (`->@*`, `->%{...}`), are part of the expression.
        loop {
            if self.peek_char(0) != Some('-') || self.peek_char(1) != Some('>') {
                break;
            }
            match self.peek_char(2) {
                Some('[') => {
                    self.consume_into(&mut text);
                    self.consume_into(&mut text);
                    if !self.consume_balanced(&mut text, '[', ']') {
                        self.push_unknown(text, &start, "unterminated subscript");
                        return;
                    }
                }
                Some('{') => {
                    self.consume_into(&mut text);
                    self.consume_into(&mut text);
                    if !self.consume_balanced(&mut text, '{', '}') {
                        self.push_unknown(text, &start, "unterminated subscript");
                        return;
                    }
                }
                Some('$') | Some('@') | Some('%') | Some('&') => {
                    self.consume_into(&mut text);
                    self.consume_into(&mut text);
                    self.consume_into(&mut text); // the sigil
                    if self.peek_char(0) == Some('#') {
                        self.consume_into(&mut text);
                    }
                    match self.peek_char(0) {
                        Some('*') => {
                            self.consume_into(&mut text);
                        }
                        Some('[') => {
                            if !self.consume_balanced(&mut text, '[', ']') {
                                self.push_unknown(text, &start, "unterminated slice");
                                return;
                            }
                        }
                        Some('{') => {
                            if !self.consume_balanced(&mut text, '{', '}') {
                                self.push_unknown(text, &start, "unterminated slice");
                                return;
                            }
                        }
                        _ => break,
                    }
                }
                _ => break,
            }
        }

        self.push_token(TokenKind::Interpolation, text, &start);
    }

    fn consume_identifier(&mut self, text: &mut String) {
        self.consume_while(text, |c| c.is_alphanumeric() || c == '_');
        // Package-qualified names: `$Foo::bar`.
        while self.peek_char(0) == Some(':') && self.peek_char(1) == Some(':') {
            self.consume_into(text);
            self.consume_into(text);
            self.consume_while(text, |c| c.is_alphanumeric() || c == '_');
        }
    }

    // ----- bracketed class context ----------------------------------------

    fn set_class_state(&mut self, at_start: bool, negated: bool) {
        if let Some(Cookie::CharClass {
            at_start: a,
            negated: n,
        }) = self.cookies.last_mut()
        {
            *a = at_start;
            *n = negated;
        }
    }

    fn scan_in_class(&mut self) {
        let current = match self.upstream.peek(0) {
            Some(c) => *c,
            None => return,
        };
        let c = current.character;
        let start = current.position;
        let (at_start, negated) = match self.cookies.last() {
            Some(Cookie::CharClass { at_start, negated }) => (*at_start, *negated),
            _ => (false, false),
        };

        match c {
            ']' if at_start => {
                // `[]a]` and `[^]a]`: the bracket is the first member.
                self.pick();
                self.push_token(TokenKind::Literal, "]".to_owned(), &start);
                self.set_class_state(false, negated);
            }
            ']' => {
                self.pick();
                self.push_token(TokenKind::Delimiter, "]".to_owned(), &start);
                self.cookies.pop();
            }
            '^' if at_start && !negated => {
                self.pick();
                self.push_token(TokenKind::Operator, "^".to_owned(), &start);
                self.set_class_state(true, true);
            }
            '-' if !at_start && !matches!(self.peek_char(1), Some(']') | None) => {
                self.pick();
                self.push_token(TokenKind::Operator, "-".to_owned(), &start);
                self.set_class_state(false, negated);
            }
            '[' if self.peek_char(1) == Some(':') => {
                self.scan_posix_class();
                self.set_class_state(false, negated);
            }
            '\\' => {
                self.scan_escape(true);
                self.set_class_state(false, negated);
            }
            '$' | '@' if self.interpolation && self.interpolation_follows() => {
                self.scan_interpolation();
                self.set_class_state(false, negated);
            }
            _ if c.is_whitespace() && self.xx_mode() => {
                self.scan_whitespace_run();
            }
            _ => {
                self.pick();
                self.push_token(TokenKind::Literal, c.to_string(), &start);
                self.set_class_state(false, negated);
            }
        }
    }

    fn scan_posix_class(&mut self) {
        let first = match self.pick() {
            Some(c) => c,
            None => return,
        };
        let start = first.position;
        let mut text = first.character.to_string(); // '['
        self.consume_into(&mut text); // ':'
        if self.peek_char(0) == Some('^') {
            self.consume_into(&mut text);
        }
        self.consume_while(&mut text, |c| c.is_alphabetic());
        if self.peek_char(0) == Some(':') && self.peek_char(1) == Some(']') {
            self.consume_into(&mut text);
            self.consume_into(&mut text);
            self.push_token(TokenKind::PosixCharClass, text, &start);
        } else {
            self.push_unknown(text, &start, "malformed POSIX character class");
        }
    }

    // ----- extended class (regex set) context ------------------------------

    fn scan_in_set(&mut self) {
        let current = match self.upstream.peek(0) {
            Some(c) => *c,
            None => return,
        };
        let c = current.character;
        let start = current.position;

        match c {
            _ if c.is_whitespace() => self.scan_whitespace_run(),
            '#' => self.scan_line_comment(),
            '[' if self.peek_char(1) == Some(':') => self.scan_posix_class(),
            '[' => {
                self.pick();
                self.push_token(TokenKind::Delimiter, "[".to_owned(), &start);
                self.cookies.push(Cookie::CharClass {
                    at_start: true,
                    negated: false,
                });
            }
            ']' if self.peek_char(1) == Some(')') => {
                self.pick();
                self.pick();
                self.push_token(TokenKind::Delimiter, "])".to_owned(), &start);
                self.cookies.pop();
                self.pop_scope();
            }
            ']' => {
                self.pick();
                self.push_unknown(
                    "]".to_owned(),
                    &start,
                    "unmatched ']' inside extended character class",
                );
            }
            '(' if self.peek_char(1) == Some('?') && self.peek_char(2) == Some('{') => {
                // Embedded code has no meaning here; consume the block so
                // the defect stays a single token.
                let open = match self.pick() {
                    Some(c) => c,
                    None => return,
                };
                let mut text = String::from(open.character);
                self.consume_into(&mut text); // '?'
                self.scan_code_group(open.position, text);
            }
            '(' => {
                self.pick();
                self.push_token(TokenKind::Delimiter, "(".to_owned(), &start);
                self.push_scope();
            }
            ')' => {
                self.pick();
                self.push_token(TokenKind::Delimiter, ")".to_owned(), &start);
                self.pop_scope();
            }
            '&' | '+' | '-' | '^' | '|' | '!' => {
                self.pick();
                self.push_token(TokenKind::Operator, c.to_string(), &start);
            }
            // The set is a character-class context: `\b` is a backspace
            // here, digits are octal.
            '\\' => self.scan_escape(true),
            '$' | '@' if self.interpolation && self.interpolation_follows() => {
                self.scan_interpolation();
            }
            _ => {
                self.pick();
                self.push_unknown(
                    c.to_string(),
                    &start,
                    "literal characters must be bracketed inside an extended character class",
                );
            }
        }
    }

    // ----- replacement context ----------------------------------------------

    fn scan_in_replacement(&mut self) {
        let current = match self.upstream.peek(0) {
            Some(c) => *c,
            None => return,
        };
        let c = current.character;
        let start = current.position;

        match c {
            '\\' => self.scan_replacement_escape(),
            '$' | '@' if self.interpolation && self.interpolation_follows() => {
                self.scan_interpolation();
            }
            _ => {
                self.pick();
                self.push_token(TokenKind::Literal, c.to_string(), &start);
            }
        }
    }

    /// The replacement is double-quotish text, not a pattern: escapes
    /// are string escapes, and `\1` is an old-style group reference.
    fn scan_replacement_escape(&mut self) {
        let backslash = match self.pick() {
            Some(c) => c,
            None => return,
        };
        let start = backslash.position;
        let mut text = String::from('\\');

        match self.peek_char(0) {
            None => {
                self.push_unknown(text, &start, "dangling backslash at end of replacement");
            }
            Some('Q' | 'E' | 'L' | 'U' | 'l' | 'u' | 'F') => {
                self.consume_into(&mut text);
                self.push_token(TokenKind::Control, text, &start);
            }
            Some('1'..='9') => {
                self.consume_while(&mut text, |c| c.is_ascii_digit());
                self.push_token(TokenKind::Backreference, text, &start);
            }
            Some('x' | 'o' | 'N') => {
                let braced = self.peek_char(1) == Some('{');
                self.consume_into(&mut text);
                if braced {
                    if self.consume_balanced(&mut text, '{', '}') {
                        self.push_token(TokenKind::Literal, text, &start);
                    } else {
                        self.push_unknown(text, &start, "unterminated escape");
                    }
                } else {
                    // Only `\x` takes bare digits; `\o` and `\N` require
                    // braces in string context.
                    if text.ends_with('x') {
                        let mut remaining = 2;
                        while remaining > 0
                            && matches!(self.peek_char(0), Some(c) if c.is_ascii_hexdigit())
                        {
                            self.consume_into(&mut text);
                            remaining -= 1;
                        }
                    }
                    self.push_token(TokenKind::Literal, text, &start);
                }
            }
            Some(_) => {
                self.consume_into(&mut text);
                self.push_token(TokenKind::Literal, text, &start);
            }
        }
    }
}
