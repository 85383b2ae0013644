//! The parts of canonical normalization that collation needs: combining classes, FCD
//! checking, and NFD of code point buffers that may contain lone surrogates.

use std::collections::VecDeque;

use unicode_canonical_combining_class::get_canonical_combining_class as get_ccc;
use unicode_normalization::char::decompose_canonical;
use unicode_normalization::UnicodeNormalization;

use crate::text::{is_surrogate, CodePointSource};

pub(crate) fn ccc(c: u32) -> u8 {
    if c < 0x300 {
        return 0;
    }
    match char::from_u32(c) {
        Some(ch) => get_ccc(ch) as u8,
        None => 0,
    }
}

/// Full canonical decomposition, or `None` if `c` has none.
pub(crate) fn decompose(c: u32) -> Option<Vec<u32>> {
    if c < 0xc0 {
        return None;
    }
    let ch = char::from_u32(c)?;
    let mut out = Vec::new();
    decompose_canonical(ch, |d| out.push(d as u32));
    if out.len() == 1 && out[0] == c {
        None
    } else {
        Some(out)
    }
}

/// Combining class of the first and last code points of the decomposition.
pub(crate) fn fcd16(c: u32) -> (u8, u8) {
    if c < 0xc0 {
        return (0, 0);
    }
    match decompose(c) {
        Some(d) => (ccc(d[0]), ccc(d[d.len() - 1])),
        None => {
            let cc = ccc(c);
            (cc, cc)
        }
    }
}

pub(crate) fn lccc(c: u32) -> u8 {
    fcd16(c).0
}

/// NFD of a code point buffer. Lone surrogates are kept and act as starters.
pub(crate) fn nfd(cps: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(cps.len());
    let mut run = String::new();
    for &c in cps {
        match char::from_u32(c) {
            Some(ch) => run.push(ch),
            None => {
                out.extend(run.nfd().map(|d| d as u32));
                run.clear();
                out.push(c);
            }
        }
    }
    out.extend(run.nfd().map(|d| d as u32));
    out
}

/// Length of the prefix that is certainly in NFD, backed up to the last starter before
/// the first code point that needs work.
pub(crate) fn nfd_quick_check_prefix(cps: &[u32]) -> usize {
    let mut last_starter = 0;
    let mut prev_cc = 0;
    for (i, &c) in cps.iter().enumerate() {
        let cc = ccc(c);
        if decompose(c).is_some() || (cc != 0 && cc < prev_cc) {
            return last_starter;
        }
        if cc == 0 {
            last_starter = i;
        }
        prev_cc = cc;
    }
    cps.len()
}

/// Passes text through unchanged where it is FCD, and emits the NFD of any segment that
/// is not. A segment starts at each code point whose decomposition starts with a starter.
pub(crate) struct FcdSource<S> {
    inner: S,
    peeked: Option<u32>,
    out: VecDeque<u32>,
}

impl<S: CodePointSource> FcdSource<S> {
    pub(crate) fn new(mut inner: S) -> Self {
        let peeked = inner.next_code_point();
        Self {
            inner,
            peeked,
            out: VecDeque::new(),
        }
    }

    fn fill_segment(&mut self) {
        let first = match self.peeked.take() {
            Some(c) => c,
            None => return,
        };
        let mut segment = vec![first];
        let mut is_fcd = true;
        let mut prev_tccc = fcd16(first).1;
        loop {
            self.peeked = self.inner.next_code_point();
            let c = match self.peeked {
                Some(c) => c,
                None => break,
            };
            let (lead, trail) = fcd16(c);
            if lead == 0 {
                break;
            }
            if lead < prev_tccc {
                is_fcd = false;
            }
            prev_tccc = trail;
            segment.push(c);
        }
        if is_fcd {
            self.out.extend(segment);
        } else {
            self.out.extend(nfd(&segment));
        }
    }
}

impl<S: CodePointSource> CodePointSource for FcdSource<S> {
    fn next_code_point(&mut self) -> Option<u32> {
        if self.out.is_empty() {
            self.fill_segment();
        }
        self.out.pop_front()
    }
}

/// Reads FCD text and decomposes single code points on request.
pub(crate) struct NfdIterator<S> {
    source: S,
    decomposition: Vec<u32>,
    index: usize,
}

impl<S: CodePointSource> NfdIterator<S> {
    pub(crate) fn new(source: S) -> Self {
        Self {
            source,
            decomposition: Vec::new(),
            index: 0,
        }
    }

    pub(crate) fn next_code_point(&mut self) -> Option<u32> {
        if self.index < self.decomposition.len() {
            let c = self.decomposition[self.index];
            self.index += 1;
            return Some(c);
        }
        self.decomposition.clear();
        self.index = 0;
        self.source.next_code_point()
    }

    /// Replaces `c`, just returned by `next_code_point`, with the first code point of its
    /// decomposition.
    pub(crate) fn next_decomposed_code_point(&mut self, c: u32) -> u32 {
        if self.index > 0 || is_surrogate(c) {
            return c;
        }
        match decompose(c) {
            Some(d) => {
                self.decomposition = d;
                self.index = 1;
                self.decomposition[0]
            }
            None => c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{collect_code_points, CodePointSlice};

    #[test]
    fn combining_classes() {
        assert_eq!(ccc(0x61), 0);
        assert_eq!(ccc(0x301), 230);
        assert_eq!(ccc(0x323), 220);
        assert_eq!(fcd16(0xe9), (0, 230));
        assert_eq!(fcd16(0x1e0b), (0, 230));
        assert_eq!(lccc(0x344), 230);
    }

    #[test]
    fn fcd_text_passes_through() {
        let text = [0x61, 0xe9, 0x323, 0x62];
        let cps = collect_code_points(FcdSource::new(CodePointSlice::new(&text)));
        // e-acute then dot below is not FCD: tccc 230 > lccc 220.
        assert_eq!(cps, vec![0x61, 0x65, 0x323, 0x301, 0x62]);

        let text = [0x61, 0x301, 0x62];
        let cps = collect_code_points(FcdSource::new(CodePointSlice::new(&text)));
        assert_eq!(cps, text.to_vec());
    }

    #[test]
    fn nfd_keeps_lone_surrogates() {
        let cps = nfd(&[0xd800, 0xe9, 0xdc00]);
        assert_eq!(cps, vec![0xd800, 0x65, 0x301, 0xdc00]);
    }

    #[test]
    fn quick_check_prefix_backs_up_to_starter() {
        assert_eq!(nfd_quick_check_prefix(&[0x61, 0x62]), 2);
        assert_eq!(nfd_quick_check_prefix(&[0x61, 0x62, 0xe9]), 1);
        assert_eq!(nfd_quick_check_prefix(&[0x61, 0x301, 0x323]), 0);
    }

    #[test]
    fn lazy_decomposition() {
        let text = [0xe9, 0x62];
        let mut it = NfdIterator::new(CodePointSlice::new(&text));
        let c = it.next_code_point().unwrap();
        assert_eq!(it.next_decomposed_code_point(c), 0x65);
        assert_eq!(it.next_code_point(), Some(0x301));
        assert_eq!(it.next_code_point(), Some(0x62));
        assert_eq!(it.next_code_point(), None);
    }
}
