//! Numeric-aware string ordering
//!
//! Runs of ASCII digits compare by numeric value, everything else compares
//! character by character, so `"2"` sorts before `"10"` and `"ch9"` before
//! `"ch10"`. Strings that are equal under this ordering (e.g. `"01"` and `"1"`)
//! fall back to plain byte order, keeping the result a total order.

use std::cmp::Ordering;

/// A maximal run of digits or non-digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

/// Iterator over the chunks of a string
struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map_or(self.rest.len(), |(idx, _)| idx);

        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;

        Some(if digits {
            Chunk::Digits(head)
        } else {
            Chunk::Text(head)
        })
    }
}

fn compare_digits(left: &str, right: &str) -> Ordering {
    let l = left.trim_start_matches('0');
    let r = right.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

fn compare_chunks(left: Chunk<'_>, right: Chunk<'_>) -> Ordering {
    match (left, right) {
        (Chunk::Digits(l), Chunk::Digits(r)) => compare_digits(l, r),
        (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        (Chunk::Text(l), Chunk::Text(r)) => l.cmp(r),
    }
}

/// Compare two strings in natural order
#[must_use]
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let mut lhs = Chunks { rest: left };
    let mut rhs = Chunks { rest: right };

    loop {
        match (lhs.next(), rhs.next()) {
            (None, None) => return left.cmp(right),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_chunks(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            },
        }
    }
}
