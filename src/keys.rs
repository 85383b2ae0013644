//! Sort key generation.
//!
//! A key is the primary weights, then for each further level a 01 separator and that
//! level's weights, then optionally the identical level, then a 00 terminator. Runs of
//! common weights are compressed on all levels above the primary.

use crate::bocsu::write_identical_level_run;
use crate::collation::{
    Level, CASE_LEVEL_FLAG, COMMON_WEIGHT16, LEVEL_SEPARATOR_BYTE,
    MERGE_SEPARATOR_BYTE, MERGE_SEPARATOR_PRIMARY, NO_CE_PRIMARY, NO_CE_WEIGHT16,
    PRIMARY_COMPRESSION_HIGH_BYTE, PRIMARY_COMPRESSION_LOW_BYTE, PRIMARY_LEVEL_FLAG,
    QUATERNARY_LEVEL_FLAG, SECONDARY_LEVEL_FLAG, TERTIARY_LEVEL_FLAG,
};
use crate::error::CollationError;
use crate::iter::CollationIterator;
use crate::normalizer::{nfd, nfd_quick_check_prefix};
use crate::settings::{CollationSettings, Strength};
use crate::text::CodePointSource;

const SEC_COMMON_LOW: u32 = 5;
const SEC_COMMON_MIDDLE: u32 = 0x25;
const SEC_COMMON_HIGH: u32 = 0x45;
const SEC_COMMON_MAX_COUNT: u32 = 0x21;

const CASE_LOWER_FIRST_COMMON_LOW: u32 = 1;
const CASE_LOWER_FIRST_COMMON_MIDDLE: u32 = 7;
const CASE_LOWER_FIRST_COMMON_HIGH: u32 = 13;
const CASE_LOWER_FIRST_COMMON_MAX_COUNT: u32 = 7;

const CASE_UPPER_FIRST_COMMON_LOW: u32 = 3;
const CASE_UPPER_FIRST_COMMON_MAX_COUNT: u32 = 13;

const TER_ONLY_COMMON_LOW: u32 = 5;
const TER_ONLY_COMMON_MIDDLE: u32 = 0x65;
const TER_ONLY_COMMON_HIGH: u32 = 0xc5;
const TER_ONLY_COMMON_MAX_COUNT: u32 = 0x61;

const TER_LOWER_FIRST_COMMON_LOW: u32 = 5;
const TER_LOWER_FIRST_COMMON_MIDDLE: u32 = 0x25;
const TER_LOWER_FIRST_COMMON_HIGH: u32 = 0x45;
const TER_LOWER_FIRST_COMMON_MAX_COUNT: u32 = 0x21;

const TER_UPPER_FIRST_COMMON_LOW: u32 = 0x85;
const TER_UPPER_FIRST_COMMON_MIDDLE: u32 = 0xa5;
const TER_UPPER_FIRST_COMMON_HIGH: u32 = 0xc5;
const TER_UPPER_FIRST_COMMON_MAX_COUNT: u32 = 0x21;

const QUAT_COMMON_LOW: u32 = 0x1c;
const QUAT_COMMON_MIDDLE: u32 = 0x8c;
const QUAT_COMMON_HIGH: u32 = 0xfc;
const QUAT_COMMON_MAX_COUNT: u32 = 0x71;
/// Written before shifted primaries whose lead byte would collide with the common range.
const QUAT_SHIFTED_LIMIT_BYTE: u32 = QUAT_COMMON_LOW - 1;

/// Levels written for each strength, before the case level is added.
fn level_mask(strength: Strength) -> u32 {
    match strength {
        Strength::Primary => PRIMARY_LEVEL_FLAG,
        Strength::Secondary => PRIMARY_LEVEL_FLAG | SECONDARY_LEVEL_FLAG,
        Strength::Tertiary => PRIMARY_LEVEL_FLAG | SECONDARY_LEVEL_FLAG | TERTIARY_LEVEL_FLAG,
        Strength::Quaternary | Strength::Identical => {
            PRIMARY_LEVEL_FLAG | SECONDARY_LEVEL_FLAG | TERTIARY_LEVEL_FLAG | QUATERNARY_LEVEL_FLAG
        }
    }
}

//
// Byte sink
//

enum SinkBuffer<'a> {
    Growable(&'a mut Vec<u8>),
    Fixed(&'a mut [u8]),
}

/// Destination of sort key bytes.
///
/// A growable sink appends to a vector. A fixed sink writes into a slice and counts,
/// without storing, what does not fit, so that callers learn the full length.
pub struct SortKeyByteSink<'a> {
    buffer: SinkBuffer<'a>,
    /// Bytes still to be dropped before anything is stored.
    ignore: usize,
    appended: usize,
    /// Level separators at the end of what was appended so far.
    trailing_separators: usize,
    ok: bool,
}

impl<'a> SortKeyByteSink<'a> {
    pub fn growable(buffer: &'a mut Vec<u8>) -> Self {
        Self {
            buffer: SinkBuffer::Growable(buffer),
            ignore: 0,
            appended: 0,
            trailing_separators: 0,
            ok: true,
        }
    }

    pub fn fixed(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer: SinkBuffer::Fixed(buffer),
            ignore: 0,
            appended: 0,
            trailing_separators: 0,
            ok: true,
        }
    }

    /// Drops the next `n` appended bytes. Used to resume a key in the middle of a level.
    pub(crate) fn ignore_bytes(&mut self, n: usize) {
        self.ignore = n;
    }

    pub fn append(&mut self, bytes: &[u8]) {
        let mut bytes = bytes;
        if self.ignore > 0 {
            let skip = self.ignore.min(bytes.len());
            self.ignore -= skip;
            bytes = &bytes[skip..];
        }
        if bytes.is_empty() {
            return;
        }
        let start = self.appended;
        self.appended += bytes.len();
        let separators = bytes.iter().rev().take_while(|&&b| b == LEVEL_SEPARATOR_BYTE).count();
        if separators == bytes.len() {
            self.trailing_separators += separators;
        } else {
            self.trailing_separators = separators;
        }
        match &mut self.buffer {
            SinkBuffer::Growable(v) => {
                if !self.ok {
                    return;
                }
                if v.try_reserve(bytes.len()).is_err() {
                    self.ok = false;
                    return;
                }
                v.extend_from_slice(bytes);
            }
            SinkBuffer::Fixed(buf) => {
                if start < buf.len() {
                    let n = (buf.len() - start).min(bytes.len());
                    buf[start..start + n].copy_from_slice(&bytes[..n]);
                }
            }
        }
    }

    pub fn append_byte(&mut self, b: u8) {
        self.append(&[b]);
    }

    fn capacity(&self) -> usize {
        match &self.buffer {
            SinkBuffer::Growable(_) => usize::MAX,
            SinkBuffer::Fixed(buf) => buf.len(),
        }
    }

    /// Bytes that can still be appended without overflowing, counting ignored ones.
    pub fn remaining_capacity(&self) -> usize {
        self.ignore
            .saturating_add(self.capacity())
            .saturating_sub(self.appended)
    }

    pub fn overflowed(&self) -> bool {
        self.appended > self.capacity()
    }

    /// Total bytes appended, whether stored or not, minus the ignored ones.
    pub fn number_of_bytes_appended(&self) -> usize {
        self.appended
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Finishes a whole key: the separators of empty trailing levels are dropped and a 00
    /// terminator is written. No weight byte is 01, so trailing 01 bytes are always such
    /// separators. Returns the key length.
    pub(crate) fn terminate_key(mut self) -> Result<usize, CollationError> {
        let length = self.appended - self.trailing_separators;
        match &mut self.buffer {
            SinkBuffer::Growable(v) => {
                let keep = v.len() - self.trailing_separators.min(v.len());
                v.truncate(keep);
                if self.ok && v.try_reserve(1).is_ok() {
                    v.push(0);
                } else {
                    self.ok = false;
                }
            }
            SinkBuffer::Fixed(buf) => {
                if length < buf.len() {
                    buf[length] = 0;
                }
            }
        }
        if self.ok {
            Ok(length + 1)
        } else {
            Err(CollationError::MemoryAllocation)
        }
    }
}

//
// Level buffers
//

/// Weights of one level above the primary, collected until the level is written.
struct SortKeyLevel {
    buffer: Vec<u8>,
    ok: bool,
}

impl SortKeyLevel {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            ok: true,
        }
    }

    fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn reserve(&mut self, n: usize) -> bool {
        if self.ok && self.buffer.try_reserve(n).is_err() {
            self.ok = false;
        }
        self.ok
    }

    fn append_byte(&mut self, b: u32) {
        if self.reserve(1) {
            self.buffer.push(b as u8);
        }
    }

    fn append_weight16(&mut self, w: u32) {
        let b0 = (w >> 8) as u8;
        let b1 = w as u8;
        if self.reserve(2) {
            self.buffer.push(b0);
            if b1 != 0 {
                self.buffer.push(b1);
            }
        }
    }

    fn append_weight32(&mut self, w: u32) {
        let bytes = w.to_be_bytes();
        let len = if bytes[1] == 0 {
            1
        } else if bytes[2] == 0 {
            2
        } else if bytes[3] == 0 {
            3
        } else {
            4
        };
        if self.reserve(len) {
            self.buffer.extend_from_slice(&bytes[..len]);
        }
    }

    /// Appends the bytes of a weight in reverse order; the level is reversed again later.
    fn append_reverse_weight16(&mut self, w: u32) {
        let b0 = (w >> 8) as u8;
        let b1 = w as u8;
        if self.reserve(2) {
            if b1 != 0 {
                self.buffer.push(b1);
            }
            self.buffer.push(b0);
        }
    }

    /// Writes the level without its trailing end-of-level byte.
    fn append_to(&self, sink: &mut SortKeyByteSink) {
        if let Some((_, body)) = self.buffer.split_last() {
            sink.append(body);
        }
    }
}

//
// Level callbacks
//

/// Consulted before each level above the primary is written; returning false stops the
/// key there.
pub(crate) trait LevelCallback {
    fn need_to_write(&mut self, _level: Level, _sink: &SortKeyByteSink) -> bool {
        true
    }
}

pub(crate) struct WriteAllLevels;

impl LevelCallback for WriteAllLevels {}

/// Remembers the last level started before the destination filled up.
pub(crate) struct PartLevelCallback {
    level: Level,
    level_capacity: usize,
}

impl PartLevelCallback {
    pub(crate) fn new(sink: &SortKeyByteSink) -> Self {
        Self {
            level: Level::Primary,
            level_capacity: sink.remaining_capacity(),
        }
    }

    /// The level in progress when the sink overflowed.
    pub(crate) fn level(&self) -> Level {
        self.level
    }

    /// Bytes of that level which made it into the destination.
    pub(crate) fn level_capacity(&self) -> usize {
        self.level_capacity
    }
}

impl LevelCallback for PartLevelCallback {
    fn need_to_write(&mut self, level: Level, sink: &SortKeyByteSink) -> bool {
        if !sink.overflowed() {
            self.level = level;
            self.level_capacity = sink.remaining_capacity();
            true
        } else {
            false
        }
    }
}

//
// Writers
//

/// Writes the primary through quaternary levels requested by `settings`, starting at
/// `min_level`. With `preflight` off, stops as soon as the primary level overflows a
/// fixed sink.
pub(crate) fn write_sort_key_up_to_quaternary<S: CodePointSource>(
    iter: &mut CollationIterator<S>,
    compressible: &[bool],
    settings: &CollationSettings,
    sink: &mut SortKeyByteSink,
    min_level: Level,
    callback: &mut dyn LevelCallback,
    preflight: bool,
) -> Result<(), CollationError> {
    let options = settings.options;
    let strength = settings.strength();
    let mut levels = level_mask(strength);
    if options & CollationSettings::CASE_LEVEL != 0 {
        levels |= CASE_LEVEL_FLAG;
    }
    levels &= !((1u32 << min_level as u32) - 1);
    if levels == 0 {
        return Ok(());
    }

    let variable_top = if options & CollationSettings::ALTERNATE_MASK == 0 {
        0
    } else {
        // +1 so that "<" works and primary ignorables test out early.
        settings.variable_top() + 1
    };
    let tertiary_mask = settings.tertiary_mask();
    let backward = options & CollationSettings::BACKWARD_SECONDARY != 0;
    let upper_first = options & CollationSettings::UPPER_FIRST != 0;
    let shifted = options & CollationSettings::ALTERNATE_MASK != 0;

    let mut cases = SortKeyLevel::new();
    let mut secondaries = SortKeyLevel::new();
    let mut tertiaries = SortKeyLevel::new();
    let mut quaternaries = SortKeyLevel::new();

    let mut prev_reordered_primary = 0u32;
    let mut common_cases = 0u32;
    let mut common_secondaries = 0u32;
    let mut common_tertiaries = 0u32;
    let mut common_quaternaries = 0u32;

    let mut prev_secondary = 0u32;
    let mut sec_segment_start = 0usize;

    loop {
        iter.clear_ces_if_none_remaining();
        let mut ce = iter.next_ce();
        let mut p = (ce >> 32) as u32;
        if p < variable_top && p > MERGE_SEPARATOR_PRIMARY {
            // Variable CEs go to the quaternary level, along with any that follow. Primary
            // ignorables after them are dropped.
            if common_quaternaries != 0 {
                common_quaternaries -= 1;
                while common_quaternaries >= QUAT_COMMON_MAX_COUNT {
                    quaternaries.append_byte(QUAT_COMMON_MIDDLE);
                    common_quaternaries -= QUAT_COMMON_MAX_COUNT;
                }
                // Shifted primaries sort below the common weight.
                quaternaries.append_byte(QUAT_COMMON_LOW + common_quaternaries);
                common_quaternaries = 0;
            }
            loop {
                if levels & QUATERNARY_LEVEL_FLAG != 0 {
                    if settings.has_reordering() {
                        p = settings.reorder(p);
                    }
                    if p >> 24 >= QUAT_SHIFTED_LIMIT_BYTE {
                        quaternaries.append_byte(QUAT_SHIFTED_LIMIT_BYTE);
                    }
                    quaternaries.append_weight32(p);
                }
                loop {
                    ce = iter.next_ce();
                    p = (ce >> 32) as u32;
                    if p != 0 {
                        break;
                    }
                }
                if !(p < variable_top && p > MERGE_SEPARATOR_PRIMARY) {
                    break;
                }
            }
        }

        // Not variable: a primary ignorable, NO_CE, the merge separator or a regular CE.
        if p > NO_CE_PRIMARY && levels & PRIMARY_LEVEL_FLAG != 0 {
            // Compressibility goes by the lead byte before reordering.
            let is_compressible = compressible[(p >> 24) as usize];
            if settings.has_reordering() {
                p = settings.reorder(p);
            }
            let p1 = p >> 24;
            if !is_compressible || p1 != prev_reordered_primary >> 24 {
                if prev_reordered_primary != 0 {
                    if p < prev_reordered_primary {
                        // No terminator at the end of the level or before a merge separator.
                        if p1 > u32::from(MERGE_SEPARATOR_BYTE) {
                            sink.append_byte(PRIMARY_COMPRESSION_LOW_BYTE);
                        }
                    } else {
                        sink.append_byte(PRIMARY_COMPRESSION_HIGH_BYTE);
                    }
                }
                sink.append_byte(p1 as u8);
                prev_reordered_primary = if is_compressible { p } else { 0 };
            }
            let bytes = p.to_be_bytes();
            if bytes[1] != 0 {
                let len = if bytes[2] == 0 {
                    1
                } else if bytes[3] == 0 {
                    2
                } else {
                    3
                };
                sink.append(&bytes[1..1 + len]);
            }
            // The caller needs no length when the key is cut off, so stop here.
            if !preflight && sink.overflowed() {
                return if sink.is_ok() {
                    Ok(())
                } else {
                    Err(CollationError::MemoryAllocation)
                };
            }
        }

        let lower32 = ce as u32;
        if lower32 == 0 {
            continue;
        }

        if levels & SECONDARY_LEVEL_FLAG != 0 {
            let s = lower32 >> 16;
            if s == 0 {
                // secondary ignorable
            } else if s == COMMON_WEIGHT16 && (!backward || p != MERGE_SEPARATOR_PRIMARY) {
                common_secondaries += 1;
            } else if !backward {
                if common_secondaries != 0 {
                    common_secondaries -= 1;
                    while common_secondaries >= SEC_COMMON_MAX_COUNT {
                        secondaries.append_byte(SEC_COMMON_MIDDLE);
                        common_secondaries -= SEC_COMMON_MAX_COUNT;
                    }
                    let b = if s < COMMON_WEIGHT16 {
                        SEC_COMMON_LOW + common_secondaries
                    } else {
                        SEC_COMMON_HIGH - common_secondaries
                    };
                    secondaries.append_byte(b);
                    common_secondaries = 0;
                }
                secondaries.append_weight16(s);
            } else {
                if common_secondaries != 0 {
                    common_secondaries -= 1;
                    // Reversed: the remainder first, then the full runs.
                    let remainder = common_secondaries % SEC_COMMON_MAX_COUNT;
                    let b = if prev_secondary < COMMON_WEIGHT16 {
                        SEC_COMMON_LOW + remainder
                    } else {
                        SEC_COMMON_HIGH - remainder
                    };
                    secondaries.append_byte(b);
                    common_secondaries -= remainder;
                    while common_secondaries > 0 {
                        secondaries.append_byte(SEC_COMMON_MIDDLE);
                        common_secondaries -= SEC_COMMON_MAX_COUNT;
                    }
                }
                if 0 < p && p <= MERGE_SEPARATOR_PRIMARY {
                    // End of a segment: reverse it in place.
                    if secondaries.ok && sec_segment_start < secondaries.buffer.len() {
                        secondaries.buffer[sec_segment_start..].reverse();
                    }
                    secondaries.append_byte(if p == NO_CE_PRIMARY {
                        u32::from(LEVEL_SEPARATOR_BYTE)
                    } else {
                        u32::from(MERGE_SEPARATOR_BYTE)
                    });
                    prev_secondary = 0;
                    sec_segment_start = secondaries.buffer.len();
                } else {
                    secondaries.append_reverse_weight16(s);
                    prev_secondary = s;
                }
            }
        }

        if levels & CASE_LEVEL_FLAG != 0 {
            // At primary strength the case of primary ignorables is ignored, otherwise the
            // case of secondary ignorables.
            let ignore = if strength == Strength::Primary {
                p == 0
            } else {
                lower32 <= 0xffff
            };
            if !ignore {
                let mut c = (lower32 >> 8) & 0xff;
                let separator = u32::from(LEVEL_SEPARATOR_BYTE);
                if c & 0xc0 == 0 && c > separator {
                    common_cases += 1;
                } else {
                    if !upper_first {
                        // Nibbles: common 1..7..13, mixed 14, upper 15. A level of only
                        // common weights needs nothing at all.
                        if common_cases != 0 && (c > separator || !cases.is_empty()) {
                            common_cases -= 1;
                            while common_cases >= CASE_LOWER_FIRST_COMMON_MAX_COUNT {
                                cases.append_byte(CASE_LOWER_FIRST_COMMON_MIDDLE << 4);
                                common_cases -= CASE_LOWER_FIRST_COMMON_MAX_COUNT;
                            }
                            let b = if c <= separator {
                                CASE_LOWER_FIRST_COMMON_LOW + common_cases
                            } else {
                                CASE_LOWER_FIRST_COMMON_HIGH - common_cases
                            };
                            cases.append_byte(b << 4);
                            common_cases = 0;
                        }
                        if c > separator {
                            c = (CASE_LOWER_FIRST_COMMON_HIGH + (c >> 6)) << 4;
                        }
                    } else {
                        // Nibbles: common 3..15, mixed 2, upper 1.
                        if common_cases != 0 {
                            common_cases -= 1;
                            while common_cases >= CASE_UPPER_FIRST_COMMON_MAX_COUNT {
                                cases.append_byte(CASE_UPPER_FIRST_COMMON_LOW << 4);
                                common_cases -= CASE_UPPER_FIRST_COMMON_MAX_COUNT;
                            }
                            cases.append_byte((CASE_UPPER_FIRST_COMMON_LOW + common_cases) << 4);
                            common_cases = 0;
                        }
                        if c > separator {
                            c = (CASE_UPPER_FIRST_COMMON_LOW - (c >> 6)) << 4;
                        }
                    }
                    cases.append_byte(c);
                }
            }
        }

        if levels & TERTIARY_LEVEL_FLAG != 0 {
            let mut t = lower32 & tertiary_mask;
            if t == COMMON_WEIGHT16 {
                common_tertiaries += 1;
            } else if tertiary_mask & 0x8000 == 0 {
                // No case bits: move lead bytes 06..3F to C6..FF.
                if common_tertiaries != 0 {
                    common_tertiaries -= 1;
                    while common_tertiaries >= TER_ONLY_COMMON_MAX_COUNT {
                        tertiaries.append_byte(TER_ONLY_COMMON_MIDDLE);
                        common_tertiaries -= TER_ONLY_COMMON_MAX_COUNT;
                    }
                    let b = if t < COMMON_WEIGHT16 {
                        TER_ONLY_COMMON_LOW + common_tertiaries
                    } else {
                        TER_ONLY_COMMON_HIGH - common_tertiaries
                    };
                    tertiaries.append_byte(b);
                    common_tertiaries = 0;
                }
                if t > COMMON_WEIGHT16 {
                    t += 0xc000;
                }
                tertiaries.append_weight16(t);
            } else if !upper_first {
                // Lower first: move lead bytes 06..BF to 46..FF.
                if common_tertiaries != 0 {
                    common_tertiaries -= 1;
                    while common_tertiaries >= TER_LOWER_FIRST_COMMON_MAX_COUNT {
                        tertiaries.append_byte(TER_LOWER_FIRST_COMMON_MIDDLE);
                        common_tertiaries -= TER_LOWER_FIRST_COMMON_MAX_COUNT;
                    }
                    let b = if t < COMMON_WEIGHT16 {
                        TER_LOWER_FIRST_COMMON_LOW + common_tertiaries
                    } else {
                        TER_LOWER_FIRST_COMMON_HIGH - common_tertiaries
                    };
                    tertiaries.append_byte(b);
                    common_tertiaries = 0;
                }
                if t > COMMON_WEIGHT16 {
                    t += 0x4000;
                }
                tertiaries.append_weight16(t);
            } else {
                // Upper first:
                //   separator 01 stays, lowercase 02..04 -> 82..84, common 05 -> 85..C5,
                //   lowercase 06..3F -> C6..FF, mixed 42..7F stays, uppercase 82..BF -> 02..3F,
                //   tertiary CEs 86..BF -> C6..FF.
                if t <= NO_CE_WEIGHT16 {
                    // separator
                } else if lower32 > 0xffff {
                    t ^= 0xc000;
                    if t < TER_UPPER_FIRST_COMMON_HIGH << 8 {
                        t -= 0x4000;
                    }
                } else {
                    t += 0x4000;
                }
                if common_tertiaries != 0 {
                    common_tertiaries -= 1;
                    while common_tertiaries >= TER_UPPER_FIRST_COMMON_MAX_COUNT {
                        tertiaries.append_byte(TER_UPPER_FIRST_COMMON_MIDDLE);
                        common_tertiaries -= TER_UPPER_FIRST_COMMON_MAX_COUNT;
                    }
                    let b = if t < TER_UPPER_FIRST_COMMON_LOW << 8 {
                        TER_UPPER_FIRST_COMMON_LOW + common_tertiaries
                    } else {
                        TER_UPPER_FIRST_COMMON_HIGH - common_tertiaries
                    };
                    tertiaries.append_byte(b);
                    common_tertiaries = 0;
                }
                tertiaries.append_weight16(t);
            }
        }

        if levels & QUATERNARY_LEVEL_FLAG != 0 {
            let mut q = lower32 & 0xffff;
            if q & 0xc0 == 0 && q > NO_CE_WEIGHT16 {
                common_quaternaries += 1;
            } else if q == NO_CE_WEIGHT16 && !shifted && quaternaries.is_empty() {
                // Only common weights, which the tertiary level already accounts for.
                quaternaries.append_byte(u32::from(LEVEL_SEPARATOR_BYTE));
            } else {
                q = if q == NO_CE_WEIGHT16 {
                    u32::from(LEVEL_SEPARATOR_BYTE)
                } else {
                    0xfc + ((q >> 6) & 3)
                };
                if common_quaternaries != 0 {
                    common_quaternaries -= 1;
                    while common_quaternaries >= QUAT_COMMON_MAX_COUNT {
                        quaternaries.append_byte(QUAT_COMMON_MIDDLE);
                        common_quaternaries -= QUAT_COMMON_MAX_COUNT;
                    }
                    let b = if q < QUAT_COMMON_LOW {
                        QUAT_COMMON_LOW + common_quaternaries
                    } else {
                        QUAT_COMMON_HIGH - common_quaternaries
                    };
                    quaternaries.append_byte(b);
                    common_quaternaries = 0;
                }
                quaternaries.append_byte(q);
            }
        }

        if lower32 >> 24 == u32::from(LEVEL_SEPARATOR_BYTE) {
            break; // NO_CE
        }
    }

    let mut ok = true;
    if levels & SECONDARY_LEVEL_FLAG != 0 {
        if !callback.need_to_write(Level::Secondary, sink) {
            return Ok(());
        }
        ok &= secondaries.ok;
        sink.append_byte(LEVEL_SEPARATOR_BYTE);
        secondaries.append_to(sink);
    }

    if levels & CASE_LEVEL_FLAG != 0 {
        if !callback.need_to_write(Level::Case, sink) {
            return Ok(());
        }
        ok &= cases.ok;
        sink.append_byte(LEVEL_SEPARATOR_BYTE);
        // Pairs of nibbles become one byte, except that the separator stays as is.
        let length = cases.buffer.len().saturating_sub(1);
        let mut b = 0u8;
        for &c in &cases.buffer[..length] {
            if b == 0 {
                b = c;
            } else {
                sink.append_byte(b | (c >> 4));
                b = 0;
            }
        }
        if b != 0 {
            sink.append_byte(b);
        }
    }

    if levels & TERTIARY_LEVEL_FLAG != 0 {
        if !callback.need_to_write(Level::Tertiary, sink) {
            return Ok(());
        }
        ok &= tertiaries.ok;
        sink.append_byte(LEVEL_SEPARATOR_BYTE);
        tertiaries.append_to(sink);
    }

    if levels & QUATERNARY_LEVEL_FLAG != 0 {
        if !callback.need_to_write(Level::Quaternary, sink) {
            return Ok(());
        }
        ok &= quaternaries.ok;
        sink.append_byte(LEVEL_SEPARATOR_BYTE);
        quaternaries.append_to(sink);
    }

    if ok && sink.is_ok() {
        Ok(())
    } else {
        Err(CollationError::MemoryAllocation)
    }
}

/// Writes the identical level: a separator, then the text in NFD as BOCSU. The prefix
/// that is already in NFD is written without normalizing it.
pub(crate) fn write_identical_level(cps: &[u32], sink: &mut SortKeyByteSink) {
    let qc_yes = nfd_quick_check_prefix(cps);
    sink.append_byte(LEVEL_SEPARATOR_BYTE);
    let mut bytes = Vec::with_capacity(cps.len() + cps.len() / 2);
    let prev = write_identical_level_run(0, &cps[..qc_yes], &mut bytes);
    if qc_yes < cps.len() {
        write_identical_level_run(prev, &nfd(&cps[qc_yes..]), &mut bytes);
    }
    sink.append(&bytes);
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::root;
    use crate::settings::AlternateHandling;
    use crate::text::CodePointSlice;

    fn key(settings: &CollationSettings, text: &str) -> Vec<u8> {
        let data = root::root_data().unwrap();
        let cps: Vec<u32> = text.chars().map(u32::from).collect();
        let mut iter = CollationIterator::new(data, CodePointSlice::new(&cps), settings.is_numeric());
        let mut out = Vec::new();
        let mut sink = SortKeyByteSink::growable(&mut out);
        write_sort_key_up_to_quaternary(
            &mut iter,
            data.compressible_bytes(),
            settings,
            &mut sink,
            Level::Primary,
            &mut WriteAllLevels,
            true,
        )
        .unwrap();
        out
    }

    fn default_settings() -> CollationSettings {
        CollationSettings::new(root::root_data().unwrap())
    }

    #[test]
    fn fixed_sink_counts_past_capacity() {
        let mut buf = [0u8; 3];
        let mut sink = SortKeyByteSink::fixed(&mut buf);
        sink.append(&[1, 2]);
        assert!(!sink.overflowed());
        sink.append(&[3, 4, 5]);
        assert!(sink.overflowed());
        assert_eq!(sink.number_of_bytes_appended(), 5);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn ignored_bytes_are_not_stored() {
        let mut buf = [0u8; 4];
        let mut sink = SortKeyByteSink::fixed(&mut buf);
        sink.ignore_bytes(3);
        assert_eq!(sink.remaining_capacity(), 7);
        sink.append(&[1, 2]);
        sink.append(&[3, 4, 5]);
        assert_eq!(sink.number_of_bytes_appended(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[test]
    fn level_weights_drop_zero_bytes() {
        let mut level = SortKeyLevel::new();
        level.append_weight16(0x0500);
        level.append_weight16(0x8a12);
        level.append_weight32(0x2910_0000);
        level.append_reverse_weight16(0x8a12);
        assert_eq!(level.buffer, vec![0x05, 0x8a, 0x12, 0x29, 0x10, 0x12, 0x8a]);
    }

    #[test]
    fn empty_text_has_only_separators() {
        let settings = default_settings();
        // Secondary and tertiary separators, each level empty.
        assert_eq!(key(&settings, ""), vec![1, 1]);
    }

    #[test]
    fn common_weights_are_compressed() {
        let settings = default_settings();
        let short = key(&settings, "ab");
        let long = key(&settings, "abababab");
        let levels: Vec<&[u8]> = long.split(|&b| b == 1).collect();
        // Eight common secondaries become a single byte.
        assert_eq!(levels[1].len(), 1);
        assert_eq!(levels[2].len(), 1);
        assert!(short < long);
    }

    #[test]
    fn keys_order_like_weights() {
        let settings = default_settings();
        let words = ["a", "A", "á", "ab", "b", "ç", "cote", "coté", "côte", "côté"];
        for pair in words.windows(2) {
            let (a, b) = (key(&settings, pair[0]), key(&settings, pair[1]));
            assert!(a < b, "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn backward_secondary_reverses_accents() {
        let mut settings = default_settings();
        settings.set_flag(CollationSettings::BACKWARD_SECONDARY, Some(true), 0);
        assert!(key(&settings, "côte") < key(&settings, "coté"));
        assert!(key(&settings, "cote") < key(&settings, "côte"));
    }

    #[test]
    fn shifted_keys_have_quaternary_level() {
        let mut settings = default_settings();
        settings.set_strength(Some(Strength::Quaternary), 0);
        settings.set_alternate_handling(Some(AlternateHandling::Shifted), 0);
        let with_hyphen = key(&settings, "a-b");
        let plain = key(&settings, "ab");
        let primary = |k: &[u8]| k.split(|&b| b == 1).next().map(<[u8]>::to_vec);
        assert_eq!(primary(&with_hyphen), primary(&plain));
        assert!(plain > with_hyphen);
    }

    #[test]
    fn long_common_quaternary_runs_before_shifted_primaries() {
        let mut settings = default_settings();
        settings.set_strength(Some(Strength::Quaternary), 0);
        settings.set_alternate_handling(Some(AlternateHandling::Shifted), 0);
        let quaternary = |k: &[u8]| k.split(|&b| b == 1).nth(3).map(<[u8]>::to_vec);
        for run in [27, 28, 29, 112, 113, 114, 115, 240] {
            // At position `run` one string has a letter and the other a hyphen, which
            // sorts lower at the quaternary level.
            let letters = key(&settings, &"a".repeat(run + 2));
            let hyphen = key(&settings, &format!("{}-aa", "a".repeat(run)));
            assert!(hyphen < letters, "run of {run}");
            // A middle byte per full count, then the rest of the run below the common weight.
            let full = (run - 1) / 0x71;
            let mut expected = vec![0x8c; full];
            expected.push(0x1c + ((run - 1) % 0x71) as u8);
            assert_eq!(quaternary(&hyphen).unwrap()[..=full], expected[..], "run of {run}");
        }
    }

    #[test]
    fn identical_level_is_nfd() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_identical_level(&[0x63, 0xf4], &mut SortKeyByteSink::growable(&mut a));
        write_identical_level(&[0x63, 0x6f, 0x302], &mut SortKeyByteSink::growable(&mut b));
        assert_eq!(a, b);
        assert_eq!(a[0], 1);
    }
}
