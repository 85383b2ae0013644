//! Turns text into collation elements.
//!
//! The iterator reads code points from a `CodePointSource`, which is either a raw text
//! source or an `FcdSource` wrapping one. All CEs produced so far stay in a buffer, so
//! that comparison can run one pass per level over them.

use std::collections::VecDeque;

use crate::collation::{make_ce, COMMON_SEC_AND_TER_CE, NO_CE};
use crate::data::{hardcoded_ce, implicit_ce, CollationData, Contraction, Mapping};
use crate::normalizer::{ccc, decompose};
use crate::text::CodePointSource;

/// Longest digit run written as one numeric primary sequence.
const MAX_NUMERIC_SEGMENT: usize = 254;

pub(crate) struct CollationIterator<'d, S> {
    data: &'d CollationData,
    source: S,
    /// Code points read ahead of the current position.
    pending: VecDeque<u32>,
    ces: Vec<u64>,
    ces_index: usize,
    numeric: bool,
}

impl<'d, S: CodePointSource> CollationIterator<'d, S> {
    pub(crate) fn new(data: &'d CollationData, source: S, numeric: bool) -> Self {
        Self {
            data,
            source,
            pending: VecDeque::new(),
            ces: Vec::new(),
            ces_index: 0,
            numeric,
        }
    }

    /// The next CE, or `NO_CE` at the end of the text.
    pub(crate) fn next_ce(&mut self) -> u64 {
        if self.ces_index == self.ces.len() {
            self.fetch_next_ces();
        }
        let ce = self.ces[self.ces_index];
        self.ces_index += 1;
        ce
    }

    /// A CE already returned by `next_ce`, by its index since the start or the last clear.
    pub(crate) fn get_ce(&self, i: usize) -> u64 {
        self.ces[i]
    }

    /// Replaces the CE most recently returned by `next_ce`.
    pub(crate) fn set_current_ce(&mut self, ce: u64) {
        self.ces[self.ces_index - 1] = ce;
    }

    /// Drops the buffered CEs once all of them have been returned.
    pub(crate) fn clear_ces_if_none_remaining(&mut self) {
        if self.ces_index == self.ces.len() {
            self.ces.clear();
            self.ces_index = 0;
        }
    }

    /// All CEs up to but not including `NO_CE`.
    pub(crate) fn fetch_ces(&mut self) -> Vec<u64> {
        let mut out = Vec::new();
        loop {
            let ce = self.next_ce();
            if ce == NO_CE {
                return out;
            }
            out.push(ce);
        }
    }

    //
    // Reading code points
    //

    fn next_code_point(&mut self) -> Option<u32> {
        match self.pending.pop_front() {
            Some(c) => Some(c),
            None => self.source.next_code_point(),
        }
    }

    /// Code point `i` positions ahead, read into `pending` as needed. A code point that
    /// would be decomposed anyway is decomposed in place so that contractions can match
    /// its parts.
    fn peek(&mut self, i: usize) -> Option<u32> {
        while self.pending.len() <= i {
            let c = self.source.next_code_point()?;
            self.pending.push_back(c);
        }
        let c = self.pending[i];
        if self.data.lookup(c).is_none() {
            if let Some(d) = decompose(c) {
                self.pending.remove(i);
                for (k, &d) in d.iter().enumerate() {
                    self.pending.insert(i + k, d);
                }
                return Some(self.pending[i]);
            }
        }
        Some(c)
    }

    //
    // CE production
    //

    /// Appends at least one CE for the next code point(s), or `NO_CE` at the end.
    fn fetch_next_ces(&mut self) {
        let data = self.data;
        loop {
            let c = match self.next_code_point() {
                Some(c) => c,
                None => {
                    self.ces.push(NO_CE);
                    return;
                }
            };
            if let Some(ce) = hardcoded_ce(c) {
                self.ces.push(ce);
                return;
            }
            match data.lookup(c) {
                Some(Mapping::Digit { value, ce }) => {
                    if self.numeric {
                        self.append_numeric_ces(*value);
                    } else {
                        self.ces.push(*ce);
                    }
                    return;
                }
                Some(Mapping::Contraction(contraction)) => {
                    if self.append_contraction_ces(c, contraction) {
                        return;
                    }
                }
                Some(mapping) => {
                    self.ces.extend_from_slice(mapping.ces());
                    return;
                }
                None => {
                    if !self.decompose_or_implicit(c) {
                        return;
                    }
                }
            }
        }
    }

    /// Queues the decomposition of an unmapped code point and returns true, or appends
    /// its implicit CE and returns false.
    fn decompose_or_implicit(&mut self, c: u32) -> bool {
        match decompose(c) {
            Some(d) => {
                for &d in d.iter().rev() {
                    self.pending.push_front(d);
                }
                true
            }
            None => {
                self.ces.push(implicit_ce(c));
                false
            }
        }
    }

    /// Matches the longest suffix after the starter `c`. Returns false if the starter
    /// decomposed and the caller must continue reading.
    fn append_contraction_ces(&mut self, c: u32, contraction: &'d Contraction) -> bool {
        let mut suffix: Vec<u32> = Vec::new();
        let mut best: Option<(usize, &'d Mapping)> = None;

        // Contiguous match.
        while let Some(next) = self.peek(suffix.len()) {
            suffix.push(next);
            if !contraction.has_prefix(&suffix) {
                suffix.pop();
                break;
            }
            if let Some(m) = contraction.get(&suffix) {
                best = Some((suffix.len(), m));
            }
        }
        let contiguous = best.map_or(0, |(len, _)| len);
        suffix.truncate(contiguous);

        // Discontiguous match over following non-starters. A mark is skipped, and stays
        // in the text, when it does not extend the match or is blocked by a skipped mark
        // of the same or higher combining class.
        let mut consumed: Vec<usize> = Vec::new();
        let mut max_skipped_cc = 0u8;
        let mut i = contiguous;
        while let Some(next) = self.peek(i) {
            let cc = ccc(next);
            if cc == 0 {
                break;
            }
            if max_skipped_cc < cc {
                suffix.push(next);
                if let Some(m) = contraction.get(&suffix) {
                    best = Some((suffix.len(), m));
                    consumed.push(i);
                    i += 1;
                    continue;
                }
                suffix.pop();
            }
            max_skipped_cc = max_skipped_cc.max(cc);
            i += 1;
        }

        match best {
            Some((_, mapping)) => {
                for &k in consumed.iter().rev() {
                    self.pending.remove(k);
                }
                for _ in 0..contiguous {
                    self.pending.pop_front();
                }
                self.ces.extend_from_slice(mapping.ces());
                true
            }
            None => match &contraction.default {
                Some(mapping) => {
                    self.ces.extend_from_slice(mapping.ces());
                    true
                }
                None => !self.decompose_or_implicit(c),
            },
        }
    }

    //
    // Numeric collation
    //

    fn append_numeric_ces(&mut self, first: u8) {
        let mut digits = vec![first];
        loop {
            let next = match self.peek(0) {
                Some(c) => c,
                None => break,
            };
            match self.data.lookup(next) {
                Some(Mapping::Digit { value, .. }) => {
                    digits.push(*value);
                    self.pending.pop_front();
                }
                _ => break,
            }
        }

        let mut pos = 0;
        loop {
            while pos < digits.len() - 1 && digits[pos] == 0 {
                pos += 1;
            }
            let segment_length = (digits.len() - pos).min(MAX_NUMERIC_SEGMENT);
            self.append_numeric_segment_ces(&digits[pos..pos + segment_length]);
            pos += segment_length;
            if pos >= digits.len() {
                break;
            }
        }
    }

    /// Encodes a digit string without leading zeros as one or more primaries that sort in
    /// numeric order.
    fn append_numeric_segment_ces(&mut self, digits: &[u8]) {
        let numeric_primary = self.data.numeric_primary();
        let ce = |p: u32| make_ce(p, COMMON_SEC_AND_TER_CE);

        if digits.len() <= 7 {
            let mut value = digits.iter().fold(0u32, |v, &d| v * 10 + u32::from(d));

            // Second primary byte:
            //   2..75    two-byte primaries for 0..73
            //   76..115  three-byte primaries for 74..10233
            //   116..131 four-byte primaries for 10234..1042489
            //   132..255 digit pairs for anything larger
            let mut first_byte = 2;
            let mut num_bytes = 74;
            if value < num_bytes {
                self.ces.push(ce(numeric_primary | ((first_byte + value) << 16)));
                return;
            }
            value -= num_bytes;
            first_byte += num_bytes;
            num_bytes = 40;
            if value < num_bytes * 254 {
                let p = numeric_primary
                    | ((first_byte + value / 254) << 16)
                    | ((2 + value % 254) << 8);
                self.ces.push(ce(p));
                return;
            }
            value -= num_bytes * 254;
            first_byte += num_bytes;
            num_bytes = 16;
            if value < num_bytes * 254 * 254 {
                let mut p = numeric_primary | (2 + value % 254);
                value /= 254;
                p |= (2 + value % 254) << 8;
                value /= 254;
                p |= (first_byte + value % 254) << 16;
                self.ces.push(ce(p));
                return;
            }
        }

        // The second byte counts the digit pairs, 4 pairs -> 132 up to 127 pairs -> 255.
        // Trailing 00 pairs are omitted and the last pair is decremented so that a
        // shorter pair sequence sorts before its extensions.
        let mut length = digits.len();
        let num_pairs = ((length + 1) / 2) as u32;
        let mut p = numeric_primary | ((132 - 4 + num_pairs) << 16);
        while digits[length - 1] == 0 && digits[length - 2] == 0 {
            length -= 2;
        }

        let (mut pair, mut pos) = if length % 2 == 1 {
            (u32::from(digits[0]), 1)
        } else {
            (u32::from(digits[0]) * 10 + u32::from(digits[1]), 2)
        };
        pair = 11 + 2 * pair;

        let mut shift = 8;
        while pos < length {
            if shift == 0 {
                p |= pair;
                self.ces.push(ce(p));
                p = numeric_primary;
                shift = 16;
            } else {
                p |= pair << shift;
                shift -= 8;
            }
            pair = 11 + 2 * (u32::from(digits[pos]) * 10 + u32::from(digits[pos + 1]));
            pos += 2;
        }
        p |= (pair - 1) << shift;
        self.ces.push(ce(p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collation::{primary, secondary, MERGE_SEPARATOR_CE};
    use crate::normalizer::FcdSource;
    use crate::root;
    use crate::text::Utf16Source;
    use pretty_assertions::assert_eq;

    fn ces_of(data: &CollationData, s: &str, numeric: bool) -> Vec<u64> {
        let text: Vec<u16> = s.encode_utf16().collect();
        let mut iter = CollationIterator::new(data, FcdSource::new(Utf16Source::new(&text)), numeric);
        iter.fetch_ces()
    }

    #[test]
    fn precomposed_equals_decomposed() {
        let data = root::root_data().unwrap();
        assert_eq!(ces_of(data, "é", false), ces_of(data, "e\u{301}", false));
        assert_eq!(ces_of(data, "ệ", false), ces_of(data, "e\u{323}\u{302}", false));
        // Not FCD: the FCD check reorders the marks.
        assert_eq!(ces_of(data, "é\u{323}", false), ces_of(data, "e\u{323}\u{301}", false));
    }

    #[test]
    fn end_and_separators() {
        let data = root::root_data().unwrap();
        let text = [0xfffe_u16];
        let mut iter = CollationIterator::new(data, Utf16Source::new(&text), false);
        assert_eq!(iter.next_ce(), MERGE_SEPARATOR_CE);
        assert_eq!(iter.next_ce(), NO_CE);
        assert_eq!(iter.get_ce(0), MERGE_SEPARATOR_CE);
    }

    #[test]
    fn ignorables_produce_zero_ces() {
        let data = root::root_data().unwrap();
        let ces = ces_of(data, "a\u{ad}b", false);
        assert_eq!(ces.len(), 3);
        assert_eq!(ces[1], 0);
    }

    #[test]
    fn implicit_weights_for_han() {
        let data = root::root_data().unwrap();
        let ces = ces_of(data, "\u{4e00}\u{4e01}", false);
        assert_eq!(ces.len(), 2);
        assert_eq!(primary(ces[0]) >> 24, 0xe0);
        assert!(primary(ces[0]) < primary(ces[1]));
    }

    #[test]
    fn numeric_primaries() {
        let data = root::root_data().unwrap();
        let p = |s: &str| -> Vec<u32> { ces_of(data, s, true).into_iter().map(primary).collect() };
        assert_eq!(p("7"), vec![0x0a09_0000]);
        assert_eq!(p("007"), p("7"));
        assert_eq!(p("0"), vec![0x0a02_0000]);
        assert!(p("9") < p("10"));
        assert!(p("73") < p("74"));
        assert_eq!(p("74"), vec![0x0a4c_0200]);
        assert!(p("10233") < p("10234"));
        assert!(p("1042489") < p("1042490"));
        assert!(p("99999999") < p("100000000"));
        assert!(p("12345678901234") < p("12345678901235"));
        // Trailing zero pairs are dropped, so 10^8 is a single primary.
        assert_eq!(p("100000000").len(), 1);
    }

    #[test]
    fn digits_without_numeric_mode() {
        let data = root::root_data().unwrap();
        let ces = ces_of(data, "12", false);
        assert_eq!(ces.len(), 2);
        assert!(primary(ces[0]) < primary(ces[1]));
        assert_eq!(secondary(ces[0]), 0x0500);
    }

    #[test]
    fn buffer_can_be_cleared() {
        let data = root::root_data().unwrap();
        let text: Vec<u16> = "ab".encode_utf16().collect();
        let mut iter = CollationIterator::new(data, Utf16Source::new(&text), false);
        let a = iter.next_ce();
        iter.clear_ces_if_none_remaining();
        let b = iter.next_ce();
        assert_eq!(iter.get_ce(0), b);
        iter.set_current_ce(a);
        assert_eq!(iter.get_ce(0), a);
    }
}
