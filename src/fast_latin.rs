//! Fast path for comparing text made of Latin-1 and Latin Extended-A letters,
//! punctuation and symbols.
//!
//! Each code point up to `LATIN_MAX` has up to two mini CEs of 16 bits: an 8-bit primary
//! rank and 4-bit secondary and tertiary ranks. Ranks preserve the order of the full
//! weights, so comparing minis level by level gives the same result as comparing CEs.
//! Anything the minis cannot express is marked `BAIL` and sent down the full path.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::collation::{lower32, primary, secondary, LATIN_MAX, ONLY_TERTIARY_MASK};
use crate::data::{CollationData, Mapping};
use crate::error::CollationError;
use crate::iter::CollationIterator;
use crate::normalizer::decompose;
use crate::settings::{reorder_code, AlternateHandling, CollationSettings, Strength};
use crate::text::{is_utf8_trail, CodePointSlice};

pub(crate) const BAIL: u32 = 0xffff_ffff;

const MAX_PRIMARY_RANK: usize = 0xff;
const MAX_LOWER_RANK: usize = 0xf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastLatinTable {
    /// Full primary for each primary rank, rank 1 first.
    primaries: Vec<u32>,
    /// First mini in the high half, second mini (or 0) in the low half.
    entries: Vec<u32>,
}

struct Bail;

//
// Building
//

impl FastLatinTable {
    /// Builds the table by running the CE iterator over each code point. `None` if the
    /// data has no Latin group.
    pub(crate) fn build(data: &CollationData) -> Option<Self> {
        let latin = data.group_index(reorder_code::LATIN)?;
        let latin_last_byte = u32::from(data.groups()[latin].last_byte);
        let variable_last_byte = data
            .group_index(reorder_code::CURRENCY)
            .map_or(0, |i| u32::from(data.groups()[i].last_byte));

        let mut per_code_point: Vec<Option<Vec<u64>>> = Vec::with_capacity(LATIN_MAX as usize + 1);
        for c in 0..=LATIN_MAX {
            per_code_point.push(Self::usable_ces(data, c, latin_last_byte, variable_last_byte));
        }

        let mut primaries: Vec<u32> = Vec::new();
        let mut secondaries: Vec<u32> = Vec::new();
        let mut tertiaries: Vec<u32> = Vec::new();
        for ces in per_code_point.iter().flatten() {
            for &ce in ces {
                if primary(ce) != 0 {
                    primaries.push(primary(ce));
                }
                secondaries.push(secondary(ce));
                tertiaries.push(lower32(ce) & ONLY_TERTIARY_MASK);
            }
        }
        for v in [&mut primaries, &mut secondaries, &mut tertiaries] {
            v.sort_unstable();
            v.dedup();
        }
        primaries.truncate(MAX_PRIMARY_RANK);
        secondaries.truncate(MAX_LOWER_RANK);
        tertiaries.truncate(MAX_LOWER_RANK);

        let rank = |values: &[u32], v: u32| values.binary_search(&v).ok().map(|i| i as u32 + 1);
        let mini = |ce: u64| -> Option<u32> {
            let p = match primary(ce) {
                0 => 0,
                p => rank(&primaries, p)?,
            };
            let s = rank(&secondaries, secondary(ce))?;
            let t = rank(&tertiaries, lower32(ce) & ONLY_TERTIARY_MASK)?;
            Some((p << 8) | (s << 4) | t)
        };

        let mut entries = Vec::with_capacity(per_code_point.len());
        for ces in &per_code_point {
            let entry = match ces.as_deref() {
                None => BAIL,
                Some([]) => 0,
                Some([a]) => mini(*a).map_or(BAIL, |m| m << 16),
                Some([a, b]) => match (mini(*a), mini(*b)) {
                    (Some(m1), Some(m2)) => (m1 << 16) | m2,
                    _ => BAIL,
                },
                Some(_) => BAIL,
            };
            entries.push(entry);
        }

        log::debug!(
            "fast Latin table: {} primaries, {} bailing code points",
            primaries.len(),
            entries.iter().filter(|&&e| e == BAIL).count()
        );

        Some(Self { primaries, entries })
    }

    /// Non-ignorable CEs of `c` when they fit the mini format, `None` to bail.
    fn usable_ces(
        data: &CollationData,
        c: u32,
        latin_last_byte: u32,
        variable_last_byte: u32,
    ) -> Option<Vec<u64>> {
        let is_starter_of_contraction =
            |cp: u32| matches!(data.lookup(cp), Some(Mapping::Contraction(_)));
        if is_starter_of_contraction(c) {
            return None;
        }
        if data.lookup(c).is_none() {
            if let Some(d) = decompose(c) {
                if d.iter().any(|&cp| is_starter_of_contraction(cp)) {
                    return None;
                }
            }
        }

        let text = [c];
        let mut iter = CollationIterator::new(data, CodePointSlice::new(&text), false);
        let ces: Vec<u64> = iter.fetch_ces().into_iter().filter(|&ce| ce != 0).collect();
        if ces.len() > 2 {
            return None;
        }
        for (i, &ce) in ces.iter().enumerate() {
            let p = primary(ce);
            if p >> 24 > latin_last_byte {
                return None;
            }
            if p == 0 {
                // Primary ignorables are fine only as the second CE after a CE that can
                // never be variable.
                if i == 0 || primary(ces[0]) >> 24 <= variable_last_byte || secondary(ce) == 0 {
                    return None;
                }
            }
        }
        Some(ces)
    }

    pub(crate) fn validate(&self) -> Result<(), CollationError> {
        if self.entries.len() != LATIN_MAX as usize + 1 {
            return Err(CollationError::InvalidData(format!(
                "fast Latin table has {} entries",
                self.entries.len()
            )));
        }
        if self.primaries.len() > MAX_PRIMARY_RANK {
            return Err(CollationError::InvalidData(format!(
                "fast Latin table has {} primaries",
                self.primaries.len()
            )));
        }
        Ok(())
    }

    /// Number of mini primaries at or below `variable_top`.
    fn mini_variable_top(&self, variable_top: u32) -> u32 {
        self.primaries.partition_point(|&p| p <= variable_top) as u32
    }

    /// Lead bytes of the primaries the table uses, ascending.
    fn lead_bytes(&self) -> Vec<u8> {
        let mut leads: Vec<u8> = self.primaries.iter().map(|&p| (p >> 24) as u8).collect();
        leads.dedup();
        leads
    }
}

//
// Options
//

/// Options word for `compare_utf16`/`compare_utf8`, or -1 when the settings rule out the
/// fast path: `(mini variable top << 8) | shifted`.
pub(crate) fn fast_latin_options(data: &CollationData, settings: &CollationSettings) -> i32 {
    let table = match data.fast_latin() {
        Some(t) => t,
        None => return -1,
    };
    let blocking = CollationSettings::CASE_LEVEL
        | CollationSettings::CASE_FIRST
        | CollationSettings::BACKWARD_SECONDARY
        | CollationSettings::NUMERIC;
    if settings.options & blocking != 0 {
        return -1;
    }
    let shifted = settings.alternate_handling() == AlternateHandling::Shifted;
    if shifted && settings.strength() >= Strength::Quaternary {
        return -1;
    }
    if settings.has_reordering() {
        let leads = table.lead_bytes();
        let reordered: Vec<u32> = leads
            .iter()
            .map(|&b| settings.reorder(u32::from(b) << 24))
            .collect();
        if reordered.windows(2).any(|w| w[0] >= w[1]) {
            log::debug!("reordering breaks the fast Latin primary order");
            return -1;
        }
    }
    if shifted {
        ((table.mini_variable_top(settings.variable_top()) as i32) << 8) | 1
    } else {
        0
    }
}

//
// Comparison
//

enum Units<'a> {
    Utf16(&'a [u16]),
    Utf8(&'a [u8]),
}

struct Minis<'a> {
    entries: &'a [u32],
    units: &'a Units<'a>,
    pos: usize,
    second: u32,
}

impl<'a> Minis<'a> {
    fn new(table: &'a FastLatinTable, units: &'a Units<'a>) -> Self {
        Self {
            entries: &table.entries,
            units,
            pos: 0,
            second: 0,
        }
    }

    fn next_code_point(&mut self) -> Result<Option<u32>, Bail> {
        match self.units {
            Units::Utf16(s) => {
                let u = match s.get(self.pos) {
                    Some(&u) => u32::from(u),
                    None => return Ok(None),
                };
                if u > LATIN_MAX {
                    return Err(Bail);
                }
                self.pos += 1;
                Ok(Some(u))
            }
            Units::Utf8(s) => {
                let b = match s.get(self.pos) {
                    Some(&b) => b,
                    None => return Ok(None),
                };
                if b < 0x80 {
                    self.pos += 1;
                    return Ok(Some(u32::from(b)));
                }
                match s.get(self.pos + 1) {
                    Some(&t) if (0xc2..=0xc5).contains(&b) && is_utf8_trail(t) => {
                        self.pos += 2;
                        Ok(Some((u32::from(b & 0x1f) << 6) | u32::from(t & 0x3f)))
                    }
                    _ => Err(Bail),
                }
            }
        }
    }

    fn next(&mut self) -> Result<Option<u32>, Bail> {
        if self.second != 0 {
            let m = self.second;
            self.second = 0;
            return Ok(Some(m));
        }
        loop {
            let c = match self.next_code_point()? {
                Some(c) => c,
                None => return Ok(None),
            };
            match self.entries[c as usize] {
                BAIL => return Err(Bail),
                0 => continue,
                entry => {
                    self.second = entry & 0xffff;
                    return Ok(Some(entry >> 16));
                }
            }
        }
    }

    /// Next mini that carries a weight at a level, skipping shifted variable minis.
    fn next_weighted(&mut self, variable_top: Option<u32>, level_of: fn(u32) -> u32) -> Result<u32, Bail> {
        loop {
            let mini = match self.next()? {
                Some(m) => m,
                None => return Ok(0),
            };
            let p = mini >> 8;
            if let Some(top) = variable_top {
                if p != 0 && p <= top {
                    continue;
                }
            }
            let w = level_of(mini);
            if w != 0 {
                return Ok(w);
            }
        }
    }
}

fn compare_units(
    table: &FastLatinTable,
    options: i32,
    strength: Strength,
    left: &Units,
    right: &Units,
) -> Option<Ordering> {
    let variable_top = if options & 1 != 0 {
        Some((options >> 8) as u32)
    } else {
        None
    };

    let levels: [(Strength, fn(u32) -> u32); 3] = [
        (Strength::Primary, |m| m >> 8),
        (Strength::Secondary, |m| (m >> 4) & 0xf),
        (Strength::Tertiary, |m| m & 0xf),
    ];

    for (level, level_of) in levels {
        if strength < level {
            break;
        }
        let mut l = Minis::new(table, left);
        let mut r = Minis::new(table, right);
        loop {
            let lw = l.next_weighted(variable_top, level_of).ok()?;
            let rw = r.next_weighted(variable_top, level_of).ok()?;
            if lw != rw {
                return Some(lw.cmp(&rw));
            }
            if lw == 0 {
                break;
            }
        }
    }
    Some(Ordering::Equal)
}

/// Compares two UTF-16 suffixes. `None` means the fast path cannot decide.
pub(crate) fn compare_utf16(
    table: &FastLatinTable,
    options: i32,
    strength: Strength,
    left: &[u16],
    right: &[u16],
) -> Option<Ordering> {
    compare_units(table, options, strength, &Units::Utf16(left), &Units::Utf16(right))
}

pub(crate) fn compare_utf8(
    table: &FastLatinTable,
    options: i32,
    strength: Strength,
    left: &[u8],
    right: &[u8],
) -> Option<Ordering> {
    compare_units(table, options, strength, &Units::Utf8(left), &Units::Utf8(right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root;

    fn table() -> &'static FastLatinTable {
        root::root_data().unwrap().fast_latin().unwrap()
    }

    fn cmp16(options: i32, strength: Strength, a: &str, b: &str) -> Option<Ordering> {
        let a: Vec<u16> = a.encode_utf16().collect();
        let b: Vec<u16> = b.encode_utf16().collect();
        compare_utf16(table(), options, strength, &a, &b)
    }

    #[test]
    fn letters_have_entries() {
        let t = table();
        assert_ne!(t.entries['a' as usize], BAIL);
        assert_ne!(t.entries['Z' as usize], BAIL);
        // e-acute is e plus a primary-ignorable accent.
        let e_acute = t.entries[0xe9];
        assert_ne!(e_acute, BAIL);
        assert_ne!(e_acute & 0xffff, 0);
        // Controls are ignorable.
        assert_eq!(t.entries[0x01], 0);
        // Micro sign is Greek and out of range.
        assert_eq!(t.entries[0xb5], BAIL);
    }

    #[test]
    fn truncated_table_is_invalid() {
        let mut t = table().clone();
        assert_eq!(t.validate(), Ok(()));
        t.entries.truncate(0x80);
        assert!(matches!(t.validate(), Err(CollationError::InvalidData(_))));
    }

    #[test]
    fn levels() {
        assert_eq!(cmp16(0, Strength::Tertiary, "a", "b"), Some(Ordering::Less));
        assert_eq!(cmp16(0, Strength::Tertiary, "b", "a"), Some(Ordering::Greater));
        assert_eq!(cmp16(0, Strength::Tertiary, "ab", "a"), Some(Ordering::Greater));
        assert_eq!(cmp16(0, Strength::Tertiary, "cote", "côte"), Some(Ordering::Less));
        assert_eq!(cmp16(0, Strength::Tertiary, "cote", "Cote"), Some(Ordering::Less));
        assert_eq!(cmp16(0, Strength::Secondary, "cote", "Cote"), Some(Ordering::Equal));
        assert_eq!(cmp16(0, Strength::Primary, "côte", "cote"), Some(Ordering::Equal));
    }

    #[test]
    fn bails_outside_latin() {
        assert_eq!(cmp16(0, Strength::Tertiary, "a\u{3b1}", "a\u{3b2}"), None);
        assert_eq!(cmp16(0, Strength::Tertiary, "a\u{301}", "a"), None);
    }

    #[test]
    fn utf8_matches_utf16() {
        let pairs = [("résumé", "resume"), ("Ärger", "arger"), ("ſ", "s"), ("x", "xy")];
        for (a, b) in pairs {
            let r8 = compare_utf8(table(), 0, Strength::Tertiary, a.as_bytes(), b.as_bytes());
            assert_eq!(r8, cmp16(0, Strength::Tertiary, a, b), "{a} {b}");
        }
    }

    #[test]
    fn shifted_ignores_punctuation() {
        let data = root::root_data().unwrap();
        let mut settings = CollationSettings::new(data);
        settings.set_alternate_handling(Some(AlternateHandling::Shifted), 0);
        let options = fast_latin_options(data, &settings);
        assert!(options > 0);
        assert_eq!(cmp16(options, Strength::Tertiary, "a-b", "ab"), Some(Ordering::Equal));
        assert_eq!(cmp16(0, Strength::Tertiary, "a-b", "ab"), Some(Ordering::Less));
    }

    #[test]
    fn options_disabled_by_settings() {
        let data = root::root_data().unwrap();
        let mut settings = CollationSettings::new(data);
        assert_eq!(fast_latin_options(data, &settings), 0);
        settings.set_flag(CollationSettings::NUMERIC, Some(true), 0);
        assert_eq!(fast_latin_options(data, &settings), -1);
    }
}
