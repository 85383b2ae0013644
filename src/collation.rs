//! Collation element layout and shared constants.
//!
//! A CE is a 64-bit value: primary weight in the high 32 bits, then a 16-bit secondary
//! weight, then two case bits and a 14-bit tertiary weight.

/// Sentinel returned at the end of a CE stream. Primary 1 and secondary/tertiary 0x0100
/// sort lower than any real weight at every level.
pub const NO_CE: u64 = 0x1_0100_0100;
pub const NO_CE_PRIMARY: u32 = 1;
pub const NO_CE_WEIGHT16: u32 = 0x0100;

/// CE of U+FFFE, lowest real weights on every level.
pub const MERGE_SEPARATOR_PRIMARY: u32 = 0x0200_0000;
pub const MERGE_SEPARATOR_LOWER32: u32 = 0x0200_0200;
pub const MERGE_SEPARATOR_CE: u64 = ((MERGE_SEPARATOR_PRIMARY as u64) << 32) | MERGE_SEPARATOR_LOWER32 as u64;

/// CE of U+FFFF.
pub const MAX_PRIMARY: u32 = 0xffff_0000;
pub const MAX_PRIMARY_CE: u64 = ((MAX_PRIMARY as u64) << 32) | COMMON_SEC_AND_TER_CE as u64;

pub const COMMON_BYTE: u32 = 5;
pub const COMMON_WEIGHT16: u32 = 0x0500;
pub const COMMON_SEC_AND_TER_CE: u32 = 0x0500_0500;

pub const LEVEL_SEPARATOR_BYTE: u8 = 1;
pub const MERGE_SEPARATOR_BYTE: u8 = 2;
pub const PRIMARY_COMPRESSION_LOW_BYTE: u8 = 3;
pub const PRIMARY_COMPRESSION_HIGH_BYTE: u8 = 0xff;

pub const ONLY_TERTIARY_MASK: u32 = 0x3f3f;
pub const CASE_AND_TERTIARY_MASK: u32 = 0xff3f;

/// Code points up to this value are covered by the fast Latin table.
pub const LATIN_MAX: u32 = 0x17f;
pub const LATIN_MAX_UTF8_LEAD: u8 = 0xc5;

/// Comparison and sort-key levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Primary = 0,
    Secondary = 1,
    Case = 2,
    Tertiary = 3,
    Quaternary = 4,
    Identical = 5,
    Zero = 6,
}

impl Level {
    pub(crate) fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Level::Primary,
            1 => Level::Secondary,
            2 => Level::Case,
            3 => Level::Tertiary,
            4 => Level::Quaternary,
            5 => Level::Identical,
            6 => Level::Zero,
            _ => return None,
        })
    }
}

pub const PRIMARY_LEVEL_FLAG: u32 = 1;
pub const SECONDARY_LEVEL_FLAG: u32 = 2;
pub const CASE_LEVEL_FLAG: u32 = 4;
pub const TERTIARY_LEVEL_FLAG: u32 = 8;
pub const QUATERNARY_LEVEL_FLAG: u32 = 0x10;

#[inline]
pub fn primary(ce: u64) -> u32 {
    (ce >> 32) as u32
}

#[inline]
pub fn lower32(ce: u64) -> u32 {
    ce as u32
}

#[inline]
pub fn secondary(ce: u64) -> u32 {
    (ce as u32) >> 16
}

#[inline]
pub fn make_ce(p: u32, lower32: u32) -> u64 {
    (u64::from(p) << 32) | u64::from(lower32)
}

/// Number of non-zero bytes in a primary, counted from the top.
pub fn primary_length(p: u32) -> usize {
    if p & 0xff != 0 {
        4
    } else if p & 0xff00 != 0 {
        3
    } else if p & 0xff_0000 != 0 {
        2
    } else if p != 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ce_is_lowest_real_weight() {
        assert_eq!(primary(NO_CE), NO_CE_PRIMARY);
        assert_eq!(secondary(NO_CE), NO_CE_WEIGHT16);
        assert_eq!(lower32(NO_CE) & 0xffff, NO_CE_WEIGHT16);
        assert!(primary(NO_CE) < MERGE_SEPARATOR_PRIMARY);
        assert!(secondary(MERGE_SEPARATOR_CE) < COMMON_WEIGHT16);
    }

    #[test]
    fn primary_lengths() {
        assert_eq!(primary_length(0), 0);
        assert_eq!(primary_length(0x2900_0000), 1);
        assert_eq!(primary_length(0x2910_0000), 2);
        assert_eq!(primary_length(0xe002_0300), 3);
        assert_eq!(primary_length(0xfe02_0304), 4);
    }

    #[test]
    fn levels_roundtrip_through_state_words() {
        for v in 0..7 {
            assert_eq!(Level::from_u32(v).map(|l| l as u32), Some(v));
        }
        assert_eq!(Level::from_u32(7), None);
    }
}
