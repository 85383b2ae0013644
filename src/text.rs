//! Text sources: UTF-16 and UTF-8 buffers and an abstract code unit iterator, all read
//! forward as code points.

pub trait CodePointSource {
    fn next_code_point(&mut self) -> Option<u32>;
}

/// A bidirectional UTF-16 code unit iterator.
pub trait UCharIterator {
    fn index(&self) -> usize;
    fn move_to(&mut self, index: usize);
    fn next_unit(&mut self) -> Option<u16>;
    fn previous_unit(&mut self) -> Option<u16>;
}

#[inline]
pub(crate) fn is_lead(u: u32) -> bool {
    (0xd800..0xdc00).contains(&u)
}

#[inline]
pub(crate) fn is_trail(u: u32) -> bool {
    (0xdc00..0xe000).contains(&u)
}

#[inline]
pub(crate) fn is_surrogate(u: u32) -> bool {
    (0xd800..0xe000).contains(&u)
}

#[inline]
fn combine(lead: u32, trail: u32) -> u32 {
    0x10000 + ((lead - 0xd800) << 10) + (trail - 0xdc00)
}

//
// UTF-16
//

pub struct Utf16Source<'a> {
    text: &'a [u16],
    pos: usize,
}

impl<'a> Utf16Source<'a> {
    pub fn new(text: &'a [u16]) -> Self {
        Self { text, pos: 0 }
    }

    pub fn starting_at(text: &'a [u16], pos: usize) -> Self {
        Self { text, pos }
    }
}

impl CodePointSource for Utf16Source<'_> {
    fn next_code_point(&mut self) -> Option<u32> {
        let u = u32::from(*self.text.get(self.pos)?);
        self.pos += 1;
        if is_lead(u) {
            if let Some(&t) = self.text.get(self.pos) {
                let t = u32::from(t);
                if is_trail(t) {
                    self.pos += 1;
                    return Some(combine(u, t));
                }
            }
        }
        Some(u)
    }
}

/// Code point at `pos`, with unpaired surrogates returned as themselves.
pub(crate) fn utf16_code_point_at(text: &[u16], pos: usize) -> u32 {
    Utf16Source::starting_at(text, pos)
        .next_code_point()
        .unwrap_or(0)
}

//
// UTF-8
//

pub struct Utf8Source<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Utf8Source<'a> {
    pub fn new(text: &'a [u8]) -> Self {
        Self { text, pos: 0 }
    }
}

impl CodePointSource for Utf8Source<'_> {
    fn next_code_point(&mut self) -> Option<u32> {
        if self.pos >= self.text.len() {
            return None;
        }
        let (c, len) = decode_utf8(self.text, self.pos);
        self.pos += len;
        Some(c)
    }
}

#[inline]
pub(crate) fn is_utf8_trail(b: u8) -> bool {
    b & 0xc0 == 0x80
}

/// Decodes one code point at `pos`. Ill-formed sequences yield U+FFFD and consume their
/// maximal subpart.
pub(crate) fn decode_utf8(text: &[u8], pos: usize) -> (u32, usize) {
    let b0 = text[pos];
    if b0 < 0x80 {
        return (u32::from(b0), 1);
    }
    let (len, min, mut c) = match b0 {
        0xc2..=0xdf => (2, 0x80, u32::from(b0 & 0x1f)),
        0xe0..=0xef => (3, 0x800, u32::from(b0 & 0xf)),
        0xf0..=0xf4 => (4, 0x10000, u32::from(b0 & 0x7)),
        _ => return (0xfffd, 1),
    };
    let mut i = 1;
    while i < len {
        match text.get(pos + i) {
            Some(&b) if is_utf8_trail(b) => {
                c = (c << 6) | u32::from(b & 0x3f);
                // Reject overlongs, surrogates and values past U+10FFFF as early as possible.
                if i == 1 {
                    let bad = match b0 {
                        0xe0 => b < 0xa0,
                        0xed => b > 0x9f,
                        0xf0 => b < 0x90,
                        0xf4 => b > 0x8f,
                        _ => false,
                    };
                    if bad {
                        return (0xfffd, 1);
                    }
                }
                i += 1;
            }
            _ => return (0xfffd, i),
        }
    }
    if c < min {
        return (0xfffd, len);
    }
    (c, len)
}

/// Code point ending right before `pos`, and its start offset.
pub(crate) fn previous_utf8(text: &[u8], pos: usize) -> (u32, usize) {
    let mut start = pos - 1;
    let floor = pos.saturating_sub(4);
    while start > floor && is_utf8_trail(text[start]) {
        start -= 1;
    }
    let (c, len) = decode_utf8(text, start);
    if start + len == pos {
        (c, start)
    } else {
        (0xfffd, pos - 1)
    }
}

//
// UCharIterator
//

/// Iterates over a UTF-16 slice.
pub struct Utf16Iter<'a> {
    text: &'a [u16],
    pos: usize,
}

impl<'a> Utf16Iter<'a> {
    pub fn new(text: &'a [u16]) -> Self {
        Self { text, pos: 0 }
    }
}

impl UCharIterator for Utf16Iter<'_> {
    fn index(&self) -> usize {
        self.pos
    }

    fn move_to(&mut self, index: usize) {
        self.pos = index.min(self.text.len());
    }

    fn next_unit(&mut self) -> Option<u16> {
        let u = *self.text.get(self.pos)?;
        self.pos += 1;
        Some(u)
    }

    fn previous_unit(&mut self) -> Option<u16> {
        if self.pos == 0 {
            return None;
        }
        self.pos -= 1;
        Some(self.text[self.pos])
    }
}

pub(crate) struct IterSource<'a> {
    iter: &'a mut dyn UCharIterator,
}

impl<'a> IterSource<'a> {
    pub(crate) fn new(iter: &'a mut dyn UCharIterator) -> Self {
        Self { iter }
    }
}

impl CodePointSource for IterSource<'_> {
    fn next_code_point(&mut self) -> Option<u32> {
        let u = u32::from(self.iter.next_unit()?);
        if is_lead(u) {
            match self.iter.next_unit() {
                Some(t) if is_trail(u32::from(t)) => return Some(combine(u, u32::from(t))),
                Some(_) => {
                    self.iter.previous_unit();
                }
                None => {}
            }
        }
        Some(u)
    }
}

/// Code points of an already decoded buffer.
pub(crate) struct CodePointSlice<'a> {
    cps: &'a [u32],
    pos: usize,
}

impl<'a> CodePointSlice<'a> {
    pub(crate) fn new(cps: &'a [u32]) -> Self {
        Self { cps, pos: 0 }
    }
}

impl CodePointSource for CodePointSlice<'_> {
    fn next_code_point(&mut self) -> Option<u32> {
        let c = *self.cps.get(self.pos)?;
        self.pos += 1;
        Some(c)
    }
}

pub(crate) fn collect_code_points(mut source: impl CodePointSource) -> Vec<u32> {
    let mut out = Vec::new();
    while let Some(c) = source.next_code_point() {
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_pairs_and_lone_surrogates() {
        let text = [0x61, 0xd83d, 0xde00, 0xdc00, 0xd800];
        let cps = collect_code_points(Utf16Source::new(&text));
        assert_eq!(cps, vec![0x61, 0x1f600, 0xdc00, 0xd800]);
    }

    #[test]
    fn utf8_ill_formed_becomes_fffd() {
        let text = b"a\xc3\xa9\xe0\x80z\xf0\x9f\x98\x80\xff";
        let cps = collect_code_points(Utf8Source::new(text));
        assert_eq!(cps, vec![0x61, 0xe9, 0xfffd, 0xfffd, 0x7a, 0x1f600, 0xfffd]);
    }

    #[test]
    fn utf8_previous_code_point() {
        let text = "aé😀".as_bytes();
        let (c, start) = previous_utf8(text, text.len());
        assert_eq!((c, start), (0x1f600, 3));
        let (c, start) = previous_utf8(text, 3);
        assert_eq!((c, start), (0xe9, 1));
    }

    #[test]
    fn iterator_source_reads_pairs() {
        let text = [0x62, 0xd83d, 0xde00, 0xd83d];
        let mut it = Utf16Iter::new(&text);
        let cps = collect_code_points(IterSource::new(&mut it));
        assert_eq!(cps, vec![0x62, 0x1f600, 0xd83d]);
        assert_eq!(it.index(), 4);
        assert_eq!(it.previous_unit(), Some(0xd83d));
    }
}
