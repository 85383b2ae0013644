//! Spans over text governed by a set that contains multi-code point strings as well as
//! code points.
//!
//! A span while contained must account for strings that overlap the code point span
//! around them, and for several strings that match at the same position with different
//! lengths. Candidate resume offsets are kept in an `OffsetList` and all of them are tried.
//! The longest-match condition keeps only the longest string match at each step.

use crate::text::{decode_utf8, is_lead, is_trail, is_utf8_trail, previous_utf8};
use crate::uniset::{code_point_before_utf16, UnicodeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanCondition {
    /// Span while the code points are not in the set and no set string starts here.
    NotContained,
    /// Span while the text can be covered by set elements, trying every overlap.
    Contained,
    /// Span while the text can be covered by set elements, taking the longest string
    /// match at each step.
    Simple,
}

/// Span length of the string's own code point prefix or suffix, when that is at least
/// this long.
const LONG_SPAN: u8 = 0xfe;
/// Marks a string that is irrelevant because all its code points are in the set.
const ALL_CP_CONTAINED: u8 = 0xff;

fn make_span_length_byte(len: usize) -> u8 {
    if len < usize::from(LONG_SPAN) {
        len as u8
    } else {
        LONG_SPAN
    }
}

//
// OffsetList
//

/// Offsets from the current position where matching should be retried, as a circular
/// buffer of flags.
struct OffsetList {
    list: Vec<bool>,
    length: usize,
    start: usize,
}

impl OffsetList {
    fn new(max_length: usize) -> Self {
        Self {
            list: vec![false; max_length.max(16)],
            length: 0,
            start: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn index(&self, offset: usize) -> usize {
        let i = self.start + offset;
        if i >= self.list.len() {
            i - self.list.len()
        } else {
            i
        }
    }

    /// Moves the current position by `delta`, dropping an offset equal to it.
    /// No stored offset may be lower than `delta`.
    fn shift(&mut self, delta: usize) {
        let i = self.index(delta);
        if self.list[i] {
            self.list[i] = false;
            self.length -= 1;
        }
        self.start = i;
    }

    fn add_offset(&mut self, offset: usize) {
        let i = self.index(offset);
        self.list[i] = true;
        self.length += 1;
    }

    fn contains_offset(&self, offset: usize) -> bool {
        self.list[self.index(offset)]
    }

    /// Removes the lowest offset and moves the position to it. The list must not be empty.
    fn pop_minimum(&mut self) -> usize {
        let capacity = self.list.len();
        let mut i = self.start + 1;
        while i < capacity {
            if self.list[i] {
                self.list[i] = false;
                self.length -= 1;
                let result = i - self.start;
                self.start = i;
                return result;
            }
            i += 1;
        }
        let result = capacity - self.start;
        let mut i = 0;
        while !self.list[i] {
            i += 1;
        }
        self.list[i] = false;
        self.length -= 1;
        self.start = i;
        result + i
    }
}

//
// Per-string data
//

struct SpanString {
    utf16: Vec<u16>,
    utf8: Vec<u8>,
    span: u8,
    span_back: u8,
    span_utf8: u8,
    span_back_utf8: u8,
}

impl SpanString {
    fn is_relevant(&self) -> bool {
        self.span != ALL_CP_CONTAINED
    }
}

pub struct UnicodeSetStringSpan {
    span_set: UnicodeSet,
    /// The code point set plus the first and last code points of each relevant string.
    span_not_set: UnicodeSet,
    strings: Vec<SpanString>,
    max_length16: usize,
    max_length8: usize,
}

impl UnicodeSetStringSpan {
    pub fn new(set: &UnicodeSet) -> Self {
        let span_set = set.code_point_set();
        let mut span_not_set = span_set.clone();
        let mut strings = Vec::with_capacity(set.strings().len());
        let mut max_length16 = 0;
        let mut max_length8 = 0;

        for s in set.strings() {
            let utf16: Vec<u16> = s.encode_utf16().collect();
            let utf8 = s.as_bytes().to_vec();
            let span_length = span_set.span_code_points_utf16(&utf16, true);

            if span_length < utf16.len() {
                max_length16 = max_length16.max(utf16.len());
                max_length8 = max_length8.max(utf8.len());

                let span_back = utf16.len() - span_set.span_back_code_points_utf16(&utf16, true);
                let span_utf8 = span_set.span_code_points_utf8(&utf8, true);
                let span_back_utf8 = utf8.len() - span_set.span_back_code_points_utf8(&utf8, true);

                if let Some(first) = s.chars().next() {
                    span_not_set.add(first as u32);
                }
                if let Some(last) = s.chars().next_back() {
                    span_not_set.add(last as u32);
                }

                strings.push(SpanString {
                    utf16,
                    utf8,
                    span: make_span_length_byte(span_length),
                    span_back: make_span_length_byte(span_back),
                    span_utf8: make_span_length_byte(span_utf8),
                    span_back_utf8: make_span_length_byte(span_back_utf8),
                });
            } else {
                strings.push(SpanString {
                    utf16,
                    utf8,
                    span: ALL_CP_CONTAINED,
                    span_back: ALL_CP_CONTAINED,
                    span_utf8: ALL_CP_CONTAINED,
                    span_back_utf8: ALL_CP_CONTAINED,
                });
            }
        }

        Self {
            span_set,
            span_not_set,
            strings,
            max_length16,
            max_length8,
        }
    }

    /// True if any string can change a span result.
    pub fn needs_string_span(&self) -> bool {
        self.max_length16 != 0
    }

    //
    // UTF-16
    //

    pub fn span(&self, s: &[u16], condition: SpanCondition) -> usize {
        if condition == SpanCondition::NotContained {
            return self.span_not(s);
        }
        let length = s.len();
        let mut span_length = self.span_set.span_code_points_utf16(s, true);
        if span_length == length {
            return length;
        }

        let longest = condition == SpanCondition::Simple;
        let mut offsets = OffsetList::new(self.max_length16);
        let mut pos = span_length;
        let mut rest = length - pos;

        loop {
            let mut max_inc: Option<usize> = if longest { Some(0) } else { None };
            for string in &self.strings {
                if !string.is_relevant() {
                    continue;
                }
                let s16 = &string.utf16;
                let length16 = s16.len();
                let mut overlap = if string.span == LONG_SPAN {
                    // Length of the string minus its last code point.
                    length16 - code_point_before_utf16(s16, length16).1
                } else {
                    usize::from(string.span)
                };
                overlap = overlap.min(span_length);
                let mut inc = length16 - overlap;
                loop {
                    if inc > rest {
                        break;
                    }
                    let fresh = match max_inc {
                        Some(m) => inc > m,
                        None => !offsets.contains_offset(inc),
                    };
                    if fresh && matches16_cpb(s, pos - overlap, s16) {
                        if inc == rest {
                            return length;
                        }
                        match max_inc {
                            Some(_) => max_inc = Some(inc),
                            None => offsets.add_offset(inc),
                        }
                    }
                    if overlap == 0 {
                        break;
                    }
                    overlap -= 1;
                    inc += 1;
                }
            }

            if let Some(m) = max_inc.filter(|&m| m > 0) {
                pos += m;
                rest -= m;
                span_length = 0;
                continue;
            }

            if span_length != 0 || pos == 0 {
                if offsets.is_empty() {
                    return pos;
                }
            } else if offsets.is_empty() {
                span_length = self.span_set.span_code_points_utf16(&s[pos..], true);
                pos += span_length;
                if pos == length || span_length == 0 {
                    return pos;
                }
                rest -= span_length;
                continue;
            } else {
                let one = span_one_utf16(&self.span_set, &s[pos..]);
                if one > 0 {
                    let one = one as usize;
                    if one == rest {
                        return length;
                    }
                    pos += one;
                    rest -= one;
                    offsets.shift(one);
                    span_length = 0;
                    continue;
                }
            }

            pos += offsets.pop_minimum();
            rest = length - pos;
            span_length = 0;
        }
    }

    pub fn span_back(&self, s: &[u16], condition: SpanCondition) -> usize {
        if condition == SpanCondition::NotContained {
            return self.span_not_back(s);
        }
        let length = s.len();
        let mut pos = self.span_set.span_back_code_points_utf16(s, true);
        if pos == 0 {
            return 0;
        }
        let mut span_length = length - pos;

        let longest = condition == SpanCondition::Simple;
        let mut offsets = OffsetList::new(self.max_length16);

        loop {
            let mut max_dec: Option<usize> = if longest { Some(0) } else { None };
            for string in &self.strings {
                if !string.is_relevant() {
                    continue;
                }
                let s16 = &string.utf16;
                let length16 = s16.len();
                let mut overlap = if string.span_back == LONG_SPAN {
                    // Length of the string minus its first code point.
                    let first = if length16 >= 2
                        && is_lead(u32::from(s16[0]))
                        && is_trail(u32::from(s16[1]))
                    {
                        2
                    } else {
                        1
                    };
                    length16 - first
                } else {
                    usize::from(string.span_back)
                };
                overlap = overlap.min(span_length);
                let mut dec = length16 - overlap;
                loop {
                    if dec > pos {
                        break;
                    }
                    let fresh = match max_dec {
                        Some(m) => dec > m,
                        None => !offsets.contains_offset(dec),
                    };
                    if fresh && matches16_cpb(s, pos - dec, s16) {
                        if dec == pos {
                            return 0;
                        }
                        match max_dec {
                            Some(_) => max_dec = Some(dec),
                            None => offsets.add_offset(dec),
                        }
                    }
                    if overlap == 0 {
                        break;
                    }
                    overlap -= 1;
                    dec += 1;
                }
            }

            if let Some(m) = max_dec.filter(|&m| m > 0) {
                pos -= m;
                span_length = 0;
                continue;
            }

            if span_length != 0 || pos == length {
                if offsets.is_empty() {
                    return pos;
                }
            } else if offsets.is_empty() {
                let old_pos = pos;
                pos = self.span_set.span_back_code_points_utf16(&s[..old_pos], true);
                span_length = old_pos - pos;
                if pos == 0 || span_length == 0 {
                    return pos;
                }
                continue;
            } else {
                let one = span_one_back_utf16(&self.span_set, &s[..pos]);
                if one > 0 {
                    let one = one as usize;
                    if one == pos {
                        return 0;
                    }
                    pos -= one;
                    offsets.shift(one);
                    span_length = 0;
                    continue;
                }
            }

            pos -= offsets.pop_minimum();
            span_length = 0;
        }
    }

    fn span_not(&self, s: &[u16]) -> usize {
        let length = s.len();
        let mut pos = 0;
        let mut rest = length;
        loop {
            let i = self.span_not_set.span_code_points_utf16(&s[pos..], false);
            if i == rest {
                return length;
            }
            pos += i;
            rest -= i;

            for string in self.strings.iter().filter(|t| t.is_relevant()) {
                if string.utf16.len() <= rest && matches16_cpb(s, pos, &string.utf16) {
                    return pos;
                }
            }

            let one = span_one_utf16(&self.span_set, &s[pos..]);
            if one > 0 {
                return pos;
            }
            let one = one.unsigned_abs() as usize;
            pos += one;
            rest -= one;
            if rest == 0 {
                return length;
            }
        }
    }

    fn span_not_back(&self, s: &[u16]) -> usize {
        let mut pos = s.len();
        loop {
            pos = self.span_not_set.span_back_code_points_utf16(&s[..pos], false);
            if pos == 0 {
                return 0;
            }

            for string in self.strings.iter().filter(|t| t.is_relevant()) {
                let length16 = string.utf16.len();
                if length16 <= pos && matches16_cpb(s, pos - length16, &string.utf16) {
                    return pos;
                }
            }

            let one = span_one_back_utf16(&self.span_set, &s[..pos]);
            if one > 0 {
                return pos;
            }
            pos -= one.unsigned_abs() as usize;
            if pos == 0 {
                return 0;
            }
        }
    }

    //
    // UTF-8
    //

    pub fn span_utf8(&self, s: &[u8], condition: SpanCondition) -> usize {
        if condition == SpanCondition::NotContained {
            return self.span_not_utf8(s);
        }
        let length = s.len();
        let mut span_length = self.span_set.span_code_points_utf8(s, true);
        if span_length == length {
            return length;
        }

        let longest = condition == SpanCondition::Simple;
        let mut offsets = OffsetList::new(self.max_length8);
        let mut pos = span_length;
        let mut rest = length - pos;

        loop {
            let mut max_inc: Option<usize> = if longest { Some(0) } else { None };
            for string in &self.strings {
                if string.span_utf8 == ALL_CP_CONTAINED {
                    continue;
                }
                let s8 = &string.utf8;
                let length8 = s8.len();
                let mut overlap = if string.span_utf8 == LONG_SPAN {
                    // Length of the string minus its last code point.
                    previous_utf8(s8, length8).1
                } else {
                    usize::from(string.span_utf8)
                };
                overlap = overlap.min(span_length);
                let mut inc = length8 - overlap;
                loop {
                    if inc > rest {
                        break;
                    }
                    let fresh = match max_inc {
                        Some(m) => inc > m,
                        None => !offsets.contains_offset(inc),
                    };
                    if !is_utf8_trail(s[pos - overlap])
                        && fresh
                        && &s[pos - overlap..pos - overlap + length8] == s8.as_slice()
                    {
                        if inc == rest {
                            return length;
                        }
                        match max_inc {
                            Some(_) => max_inc = Some(inc),
                            None => offsets.add_offset(inc),
                        }
                    }
                    if overlap == 0 {
                        break;
                    }
                    overlap -= 1;
                    inc += 1;
                }
            }

            if let Some(m) = max_inc.filter(|&m| m > 0) {
                pos += m;
                rest -= m;
                span_length = 0;
                continue;
            }

            if span_length != 0 || pos == 0 {
                if offsets.is_empty() {
                    return pos;
                }
            } else if offsets.is_empty() {
                span_length = self.span_set.span_code_points_utf8(&s[pos..], true);
                pos += span_length;
                if pos == length || span_length == 0 {
                    return pos;
                }
                rest -= span_length;
                continue;
            } else {
                let one = span_one_utf8(&self.span_set, &s[pos..]);
                if one > 0 {
                    let one = one as usize;
                    if one == rest {
                        return length;
                    }
                    pos += one;
                    rest -= one;
                    offsets.shift(one);
                    span_length = 0;
                    continue;
                }
            }

            pos += offsets.pop_minimum();
            rest = length - pos;
            span_length = 0;
        }
    }

    pub fn span_back_utf8(&self, s: &[u8], condition: SpanCondition) -> usize {
        if condition == SpanCondition::NotContained {
            return self.span_not_back_utf8(s);
        }
        let length = s.len();
        let mut pos = self.span_set.span_back_code_points_utf8(s, true);
        if pos == 0 {
            return 0;
        }
        let mut span_length = length - pos;

        let longest = condition == SpanCondition::Simple;
        let mut offsets = OffsetList::new(self.max_length8);

        loop {
            let mut max_dec: Option<usize> = if longest { Some(0) } else { None };
            for string in &self.strings {
                if string.span_back_utf8 == ALL_CP_CONTAINED {
                    continue;
                }
                let s8 = &string.utf8;
                let length8 = s8.len();
                let mut overlap = if string.span_back_utf8 == LONG_SPAN {
                    // Length of the string minus its first code point.
                    length8 - decode_utf8(s8, 0).1
                } else {
                    usize::from(string.span_back_utf8)
                };
                overlap = overlap.min(span_length);
                let mut dec = length8 - overlap;
                loop {
                    if dec > pos {
                        break;
                    }
                    let fresh = match max_dec {
                        Some(m) => dec > m,
                        None => !offsets.contains_offset(dec),
                    };
                    if !is_utf8_trail(s[pos - dec])
                        && fresh
                        && &s[pos - dec..pos - dec + length8] == s8.as_slice()
                    {
                        if dec == pos {
                            return 0;
                        }
                        match max_dec {
                            Some(_) => max_dec = Some(dec),
                            None => offsets.add_offset(dec),
                        }
                    }
                    if overlap == 0 {
                        break;
                    }
                    overlap -= 1;
                    dec += 1;
                }
            }

            if let Some(m) = max_dec.filter(|&m| m > 0) {
                pos -= m;
                span_length = 0;
                continue;
            }

            if span_length != 0 || pos == length {
                if offsets.is_empty() {
                    return pos;
                }
            } else if offsets.is_empty() {
                let old_pos = pos;
                pos = self.span_set.span_back_code_points_utf8(&s[..old_pos], true);
                span_length = old_pos - pos;
                if pos == 0 || span_length == 0 {
                    return pos;
                }
                continue;
            } else {
                let one = span_one_back_utf8(&self.span_set, &s[..pos]);
                if one > 0 {
                    let one = one as usize;
                    if one == pos {
                        return 0;
                    }
                    pos -= one;
                    offsets.shift(one);
                    span_length = 0;
                    continue;
                }
            }

            pos -= offsets.pop_minimum();
            span_length = 0;
        }
    }

    fn span_not_utf8(&self, s: &[u8]) -> usize {
        let length = s.len();
        let mut pos = 0;
        let mut rest = length;
        loop {
            let i = self.span_not_set.span_code_points_utf8(&s[pos..], false);
            if i == rest {
                return length;
            }
            pos += i;
            rest -= i;

            for string in self.strings.iter().filter(|t| t.is_relevant()) {
                let s8 = &string.utf8;
                if s8.len() <= rest && &s[pos..pos + s8.len()] == s8.as_slice() {
                    return pos;
                }
            }

            let one = span_one_utf8(&self.span_set, &s[pos..]);
            if one > 0 {
                return pos;
            }
            let one = one.unsigned_abs() as usize;
            pos += one;
            rest -= one;
            if rest == 0 {
                return length;
            }
        }
    }

    fn span_not_back_utf8(&self, s: &[u8]) -> usize {
        let mut pos = s.len();
        loop {
            pos = self.span_not_set.span_back_code_points_utf8(&s[..pos], false);
            if pos == 0 {
                return 0;
            }

            for string in self.strings.iter().filter(|t| t.is_relevant()) {
                let s8 = &string.utf8;
                if s8.len() <= pos && &s[pos - s8.len()..pos] == s8.as_slice() {
                    return pos;
                }
            }

            let one = span_one_back_utf8(&self.span_set, &s[..pos]);
            if one > 0 {
                return pos;
            }
            pos -= one.unsigned_abs() as usize;
            if pos == 0 {
                return 0;
            }
        }
    }
}

/// Compares `t` with the text at `start`, rejecting a match whose either end falls inside a
/// surrogate pair.
fn matches16_cpb(s: &[u16], start: usize, t: &[u16]) -> bool {
    let limit = start + t.len();
    &s[start..limit] == t
        && !(start > 0 && is_lead(u32::from(s[start - 1])) && is_trail(u32::from(s[start])))
        && !(limit < s.len() && is_lead(u32::from(s[limit - 1])) && is_trail(u32::from(s[limit])))
}

/// Length of the first code point, positive if the set contains it, negative otherwise.
fn span_one_utf16(set: &UnicodeSet, s: &[u16]) -> isize {
    let c = u32::from(s[0]);
    if is_lead(c) && s.len() >= 2 && is_trail(u32::from(s[1])) {
        let cp = 0x10000 + ((c - 0xd800) << 10) + (u32::from(s[1]) - 0xdc00);
        return if set.contains(cp) { 2 } else { -2 };
    }
    if set.contains(c) {
        1
    } else {
        -1
    }
}

fn span_one_back_utf16(set: &UnicodeSet, s: &[u16]) -> isize {
    let (c, len) = code_point_before_utf16(s, s.len());
    let len = len as isize;
    if set.contains(c) {
        len
    } else {
        -len
    }
}

fn span_one_utf8(set: &UnicodeSet, s: &[u8]) -> isize {
    let (c, len) = decode_utf8(s, 0);
    let len = len as isize;
    if set.contains(c) {
        len
    } else {
        -len
    }
}

fn span_one_back_utf8(set: &UnicodeSet, s: &[u8]) -> isize {
    let (c, start) = previous_utf8(s, s.len());
    let len = (s.len() - start) as isize;
    if set.contains(c) {
        len
    } else {
        -len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with(ranges: &[(char, char)], strings: &[&str]) -> UnicodeSet {
        let mut set = UnicodeSet::new();
        for &(a, b) in ranges {
            set.add_range(a as u32, b as u32);
        }
        for s in strings {
            set.add_string(s);
        }
        set
    }

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn offset_list_pops_in_order() {
        let mut list = OffsetList::new(4);
        list.add_offset(3);
        list.add_offset(1);
        assert!(list.contains_offset(3));
        assert_eq!(list.pop_minimum(), 1);
        // Offsets are now relative to the popped one.
        assert!(list.contains_offset(2));
        assert_eq!(list.pop_minimum(), 2);
        assert!(list.is_empty());

        list.add_offset(2);
        list.shift(2);
        assert!(list.is_empty());
    }

    #[test]
    fn contained_span_uses_strings() {
        let set = set_with(&[('a', 'b')], &["cd", "bcx"]);
        let span = UnicodeSetStringSpan::new(&set);
        assert!(span.needs_string_span());
        // "ab" then "cd" then "a"; "e" stops the span.
        let s = utf16("abcdae");
        assert_eq!(span.span(&s, SpanCondition::Contained), 5);
        assert_eq!(span.span_utf8(b"abcdae", SpanCondition::Contained), 5);
        assert_eq!(span.span_back(&s[..5], SpanCondition::Contained), 0);
        assert_eq!(span.span_back_utf8(b"abcda", SpanCondition::Contained), 0);
    }

    #[test]
    fn contained_span_tries_all_overlaps() {
        // "ab" + "cd" covers the text, the longest match "abc" does not.
        let set = set_with(&[], &["ab", "abc", "cd"]);
        let s = utf16("abcd");
        assert_eq!(set.span(&s, SpanCondition::Contained), 4);
        assert_eq!(set.span(&s, SpanCondition::Simple), 3);
        assert_eq!(set.span_back(&s, SpanCondition::Contained), 0);
        assert_eq!(set.span_utf8(b"abcd", SpanCondition::Contained), 4);
        assert_eq!(set.span_utf8(b"abcd", SpanCondition::Simple), 3);
    }

    #[test]
    fn strings_may_start_inside_the_code_point_span() {
        let set = set_with(&[('a', 'b')], &["bcd", "de"]);
        let s = utf16("abcdefg");
        assert_eq!(set.span(&s, SpanCondition::Contained), 4);
        assert_eq!(set.span_back(&s[..4], SpanCondition::Contained), 0);
    }

    #[test]
    fn not_contained_stops_before_strings() {
        let set = set_with(&[('x', 'x')], &["ab"]);
        let s = utf16("zzabx");
        assert_eq!(set.span(&s, SpanCondition::NotContained), 2);
        assert_eq!(set.span_utf8(b"zzabx", SpanCondition::NotContained), 2);
        // A lone "a" is not a set element.
        let s = utf16("zzaq");
        assert_eq!(set.span(&s, SpanCondition::NotContained), 4);
        // Backwards: "ab" ends at 4.
        let s = utf16("abzz");
        assert_eq!(set.span_back(&s, SpanCondition::NotContained), 2);
        assert_eq!(set.span_back(&utf16("qqq"), SpanCondition::NotContained), 0);
        assert_eq!(set.span_back_utf8(b"qqq", SpanCondition::NotContained), 0);
    }

    #[test]
    fn irrelevant_strings_are_skipped() {
        let set = set_with(&[('a', 'c')], &["ab", "ca"]);
        let span = UnicodeSetStringSpan::new(&set);
        assert!(!span.needs_string_span());
        assert_eq!(span.span(&utf16("abcab!"), SpanCondition::Contained), 5);
    }

    #[test]
    fn utf8_and_utf16_agree() {
        let set = set_with(&[('a', 'c'), ('é', 'é')], &["dé", "éf", "😀x"]);
        let samples = ["abdéfc", "éf😀xa", "dédé", "ab😀", "zzdé", "cdéfg😀x"];
        for text in samples {
            let s16 = utf16(text);
            for cond in [
                SpanCondition::Contained,
                SpanCondition::Simple,
                SpanCondition::NotContained,
            ] {
                let n16 = set.span(&s16, cond);
                let n8 = set.span_utf8(text.as_bytes(), cond);
                let prefix16 = String::from_utf16(&s16[..n16]).unwrap();
                assert_eq!(prefix16, &text[..n8], "{text} {cond:?}");

                let b16 = set.span_back(&s16, cond);
                let b8 = set.span_back_utf8(text.as_bytes(), cond);
                let suffix16 = String::from_utf16(&s16[b16..]).unwrap();
                assert_eq!(suffix16, &text[b8..], "{text} {cond:?} back");
            }
        }
    }
}
