use serde::{Deserialize, Serialize};

use crate::string_span::{SpanCondition, UnicodeSetStringSpan};
use crate::text::{decode_utf8, previous_utf8, utf16_code_point_at};

/// A set of code points, stored as sorted inclusive ranges, plus a set of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnicodeSet {
    ranges: Vec<(u32, u32)>,
    strings: Vec<String>,
}

impl UnicodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_range(start: u32, end: u32) -> Self {
        let mut set = Self::new();
        set.add_range(start, end);
        set
    }

    pub fn add(&mut self, c: u32) {
        self.add_range(c, c);
    }

    pub fn add_range(&mut self, start: u32, end: u32) {
        if start > end || start > 0x10ffff {
            return;
        }
        let end = end.min(0x10ffff);
        // First range that could touch [start, end].
        let i = self.ranges.partition_point(|&(_, e)| e.saturating_add(1) < start);
        let mut j = i;
        let mut lo = start;
        let mut hi = end;
        while j < self.ranges.len() && self.ranges[j].0 <= end.saturating_add(1) {
            lo = lo.min(self.ranges[j].0);
            hi = hi.max(self.ranges[j].1);
            j += 1;
        }
        self.ranges.splice(i..j, std::iter::once((lo, hi)));
    }

    /// Adds a string. Single code point strings are added as code points.
    pub fn add_string(&mut self, s: &str) {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => {}
            (Some(c), None) => self.add(c as u32),
            _ => {
                if let Err(i) = self.strings.binary_search_by(|t| t.as_str().cmp(s)) {
                    self.strings.insert(i, s.to_owned());
                }
            }
        }
    }

    pub fn add_all(&mut self, other: &UnicodeSet) {
        for &(s, e) in &other.ranges {
            self.add_range(s, e);
        }
        for s in &other.strings {
            self.add_string(s);
        }
    }

    /// Inverts the code points over 0..=10FFFF. Strings are kept.
    pub fn complement(&mut self) {
        let mut inverted = Vec::with_capacity(self.ranges.len() + 1);
        let mut next = 0;
        for &(s, e) in &self.ranges {
            if s > next {
                inverted.push((next, s - 1));
            }
            next = e + 1;
        }
        if next <= 0x10ffff {
            inverted.push((next, 0x10ffff));
        }
        self.ranges = inverted;
    }

    pub fn contains(&self, c: u32) -> bool {
        let i = self.ranges.partition_point(|&(_, e)| e < c);
        i < self.ranges.len() && self.ranges[i].0 <= c
    }

    pub fn contains_string(&self, s: &str) -> bool {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => false,
            (Some(c), None) => self.contains(c as u32),
            _ => self.strings.binary_search_by(|t| t.as_str().cmp(s)).is_ok(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.strings.is_empty()
    }

    /// Number of code points plus number of strings.
    pub fn size(&self) -> usize {
        let cps: u32 = self.ranges.iter().map(|&(s, e)| e - s + 1).sum();
        cps as usize + self.strings.len()
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn code_points(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|&(s, e)| s..=e)
    }

    /// The same set without its strings.
    pub(crate) fn code_point_set(&self) -> UnicodeSet {
        Self {
            ranges: self.ranges.clone(),
            strings: Vec::new(),
        }
    }

    //
    // Code point spans
    //

    pub(crate) fn span_code_points_utf16(&self, s: &[u16], contained: bool) -> usize {
        let mut pos = 0;
        while pos < s.len() {
            let c = utf16_code_point_at(s, pos);
            if self.contains(c) != contained {
                break;
            }
            pos += if c > 0xffff { 2 } else { 1 };
        }
        pos
    }

    pub(crate) fn span_back_code_points_utf16(&self, s: &[u16], contained: bool) -> usize {
        let mut pos = s.len();
        while pos > 0 {
            let (c, len) = code_point_before_utf16(s, pos);
            if self.contains(c) != contained {
                break;
            }
            pos -= len;
        }
        pos
    }

    pub(crate) fn span_code_points_utf8(&self, s: &[u8], contained: bool) -> usize {
        let mut pos = 0;
        while pos < s.len() {
            let (c, len) = decode_utf8(s, pos);
            if self.contains(c) != contained {
                break;
            }
            pos += len;
        }
        pos
    }

    pub(crate) fn span_back_code_points_utf8(&self, s: &[u8], contained: bool) -> usize {
        let mut pos = s.len();
        while pos > 0 {
            let (c, start) = previous_utf8(s, pos);
            if self.contains(c) != contained {
                break;
            }
            pos = start;
        }
        pos
    }

    //
    // Spans including strings
    //

    /// Length of the initial part of `s` that matches the condition.
    pub fn span(&self, s: &[u16], condition: SpanCondition) -> usize {
        if self.strings.is_empty() {
            return self.span_code_points_utf16(s, condition != SpanCondition::NotContained);
        }
        UnicodeSetStringSpan::new(self).span(s, condition)
    }

    /// Start of the final part of `s` that matches the condition.
    pub fn span_back(&self, s: &[u16], condition: SpanCondition) -> usize {
        if self.strings.is_empty() {
            return self.span_back_code_points_utf16(s, condition != SpanCondition::NotContained);
        }
        UnicodeSetStringSpan::new(self).span_back(s, condition)
    }

    pub fn span_utf8(&self, s: &[u8], condition: SpanCondition) -> usize {
        if self.strings.is_empty() {
            return self.span_code_points_utf8(s, condition != SpanCondition::NotContained);
        }
        UnicodeSetStringSpan::new(self).span_utf8(s, condition)
    }

    pub fn span_back_utf8(&self, s: &[u8], condition: SpanCondition) -> usize {
        if self.strings.is_empty() {
            return self
                .span_back_code_points_utf8(s, condition != SpanCondition::NotContained);
        }
        UnicodeSetStringSpan::new(self).span_back_utf8(s, condition)
    }
}

/// Code point ending at `pos` and its length in code units.
pub(crate) fn code_point_before_utf16(s: &[u16], pos: usize) -> (u32, usize) {
    let c = u32::from(s[pos - 1]);
    if (0xdc00..0xe000).contains(&c) && pos >= 2 {
        let lead = u32::from(s[pos - 2]);
        if (0xd800..0xdc00).contains(&lead) {
            return (0x10000 + ((lead - 0xd800) << 10) + (c - 0xdc00), 2);
        }
    }
    (c, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ranges_merge() {
        let mut set = UnicodeSet::new();
        set.add_range(0x61, 0x63);
        set.add_range(0x70, 0x72);
        set.add(0x64);
        set.add(0x6f);
        assert_eq!(set.ranges(), &[(0x61, 0x64), (0x6f, 0x72)]);
        set.add_range(0x65, 0x6e);
        assert_eq!(set.ranges(), &[(0x61, 0x72)]);
        assert!(set.contains(0x6a));
        assert!(!set.contains(0x73));
        assert_eq!(set.size(), 0x12);
    }

    #[test]
    fn complement_inverts_code_points() {
        let mut set = UnicodeSet::from_range(0, 0x40);
        set.add_range(0x100, 0x10ffff);
        set.add_string("ab");
        set.complement();
        assert_eq!(set.ranges(), &[(0x41, 0xff)]);
        assert_eq!(set.strings(), &["ab".to_owned()]);
        set.complement();
        assert_eq!(set.ranges(), &[(0, 0x40), (0x100, 0x10ffff)]);
    }

    #[test]
    fn strings_are_kept_apart() {
        let mut set = UnicodeSet::new();
        set.add_string("ch");
        set.add_string("x");
        set.add_string("ch");
        assert_eq!(set.strings(), &["ch".to_owned()]);
        assert!(set.contains_string("ch"));
        assert!(set.contains_string("x"));
        assert!(!set.contains_string("c"));
        assert_eq!(set.size(), 2);
    }

    #[test]
    fn code_point_spans() {
        let set = UnicodeSet::from_range(0x61, 0x7a);
        let s: Vec<u16> = "abc12de".encode_utf16().collect();
        assert_eq!(set.span(&s, SpanCondition::Contained), 3);
        assert_eq!(set.span_back(&s, SpanCondition::Contained), 5);
        assert_eq!(set.span(&s[3..], SpanCondition::NotContained), 2);
        assert_eq!(set.span_utf8(b"abc12de", SpanCondition::Simple), 3);
        assert_eq!(set.span_back_utf8(b"abc12de", SpanCondition::Simple), 5);
    }

    #[test]
    fn supplementary_code_points_span_as_units() {
        let set = UnicodeSet::from_range(0x1f600, 0x1f64f);
        let s: Vec<u16> = "😀😁a".encode_utf16().collect();
        assert_eq!(set.span(&s, SpanCondition::Contained), 4);
        assert_eq!(set.span_back(&s[..4], SpanCondition::Contained), 0);
    }
}
