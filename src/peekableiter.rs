// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::collections::VecDeque;

/// An iterator adapter with a fixed lookahead window.
///
/// `peek(0)` is the item the next `next()` call will return, `peek(1)`
/// the one after it, and so on up to `lookahead - 1`. The window is
/// filled eagerly so peeking never needs mutable access.
pub struct PeekableIter<'a, T> {
    upstream: &'a mut dyn Iterator<Item = T>,
    buffer: VecDeque<T>,
    lookahead: usize,
}

impl<'a, T> PeekableIter<'a, T> {
    pub fn new(upstream: &'a mut dyn Iterator<Item = T>, lookahead: usize) -> Self {
        let mut buffer = VecDeque::with_capacity(lookahead + 1);
        for _ in 0..lookahead {
            match upstream.next() {
                Some(item) => buffer.push_back(item),
                None => break,
            }
        }

        Self {
            upstream,
            buffer,
            lookahead,
        }
    }

    /// Look at the item `offset` places ahead without consuming anything.
    pub fn peek(&self, offset: usize) -> Option<&T> {
        debug_assert!(offset < self.lookahead);
        self.buffer.get(offset)
    }
}

impl<T> Iterator for PeekableIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        // Top the window back up before handing out the front item.
        if let Some(item) = self.upstream.next() {
            self.buffer.push_back(item);
        }
        self.buffer.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::PeekableIter;

    #[test]
    fn test_peek_and_next() {
        let mut chars = "abcde".chars();
        let mut iter = PeekableIter::new(&mut chars, 3);

        assert_eq!(iter.peek(0), Some(&'a'));
        assert_eq!(iter.peek(1), Some(&'b'));
        assert_eq!(iter.peek(2), Some(&'c'));

        assert_eq!(iter.next(), Some('a'));
        assert_eq!(iter.peek(0), Some(&'b'));
        assert_eq!(iter.peek(2), Some(&'d'));

        assert_eq!(iter.next(), Some('b'));
        assert_eq!(iter.next(), Some('c'));
        assert_eq!(iter.next(), Some('d'));

        // The window shrinks once the upstream runs dry.
        assert_eq!(iter.peek(0), Some(&'e'));
        assert_eq!(iter.peek(1), None);

        assert_eq!(iter.next(), Some('e'));
        assert_eq!(iter.peek(0), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_short_upstream() {
        let mut chars = "x".chars();
        let mut iter = PeekableIter::new(&mut chars, 3);

        assert_eq!(iter.peek(0), Some(&'x'));
        assert_eq!(iter.peek(1), None);
        assert_eq!(iter.next(), Some('x'));
        assert_eq!(iter.next(), None);
    }
}
