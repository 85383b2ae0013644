use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collation::{make_ce, COMMON_SEC_AND_TER_CE, MAX_PRIMARY_CE, MERGE_SEPARATOR_CE};
use crate::error::CollationError;
use crate::fast_latin::FastLatinTable;
use crate::normalizer::{ccc, lccc};
use crate::settings::reorder_code;
use crate::text::is_surrogate;
use crate::uniset::UnicodeSet;

//
// Structs etc.
//

/// What a code point (or a contraction suffix) maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mapping {
    Ce(u64),
    Expansion(Vec<u64>),
    /// A decimal digit: its CE when numeric collation is off, its value when on.
    Digit { value: u8, ce: u64 },
    Contraction(Box<Contraction>),
}

impl Mapping {
    /// CEs of a non-contraction mapping.
    pub(crate) fn ces(&self) -> &[u64] {
        match self {
            Mapping::Ce(ce) | Mapping::Digit { ce, .. } => std::slice::from_ref(ce),
            Mapping::Expansion(ces) => ces,
            Mapping::Contraction(c) => c.default.as_ref().map_or(&[], |m| m.ces()),
        }
    }
}

/// Mappings for a starter followed by suffixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contraction {
    /// Mapping for the starter alone. `None` when the starter has no mapping of its own
    /// and decomposes or takes an implicit weight.
    pub default: Option<Mapping>,
    /// Suffix code points (without the starter), sorted.
    pub suffixes: Vec<(Vec<u32>, Mapping)>,
}

impl Contraction {
    pub(crate) fn get(&self, suffix: &[u32]) -> Option<&Mapping> {
        self.suffixes
            .binary_search_by(|(s, _)| s.as_slice().cmp(suffix))
            .ok()
            .map(|i| &self.suffixes[i].1)
    }

    /// True if some suffix starts with `prefix`.
    pub(crate) fn has_prefix(&self, prefix: &[u32]) -> bool {
        let i = self
            .suffixes
            .partition_point(|(s, _)| s.as_slice() < prefix);
        i < self.suffixes.len() && self.suffixes[i].0.starts_with(prefix)
    }

    pub(crate) fn insert(&mut self, suffix: Vec<u32>, mapping: Mapping) {
        match self
            .suffixes
            .binary_search_by(|(s, _)| s.as_slice().cmp(&suffix))
        {
            Ok(i) => self.suffixes[i].1 = mapping,
            Err(i) => self.suffixes.insert(i, (suffix, mapping)),
        }
    }
}

/// A reordering group: one or more reorder codes sharing a range of primary lead bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptGroup {
    pub codes: Vec<i32>,
    pub first_byte: u8,
    pub last_byte: u8,
}

impl ScriptGroup {
    pub fn is_special(&self) -> bool {
        self.codes
            .iter()
            .any(|&c| (reorder_code::FIRST..reorder_code::LIMIT).contains(&c))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollationData {
    pub(crate) mappings: HashMap<u32, Mapping>,
    /// Code points that may be part of a multi-code point unit when read backwards.
    pub(crate) unsafe_backward: UnicodeSet,
    /// Indexed by primary lead byte.
    pub(crate) compressible: Vec<bool>,
    pub(crate) groups: Vec<ScriptGroup>,
    /// Lead byte of numeric-collation primaries, in the top byte.
    pub(crate) numeric_primary: u32,
    pub(crate) fast_latin: Option<FastLatinTable>,
    #[serde(skip)]
    pub(crate) base: Option<Arc<CollationData>>,
}

//
// Implicit weights
//

pub(crate) const FFFD_PRIMARY: u32 = 0xfffd_0000;
pub(crate) const UNASSIGNED_IMPLICIT_BYTE: u32 = 0xfe;

const IMPLICIT_RANGES: [(u32, u32, u32); 17] = [
    // CJK unified ideographs, core block and compatibility block
    (0x4e00, 0x9fff, 0xe0),
    (0xfa0e, 0xfa0f, 0xe0),
    (0xfa11, 0xfa11, 0xe0),
    (0xfa13, 0xfa14, 0xe0),
    (0xfa1f, 0xfa1f, 0xe0),
    (0xfa21, 0xfa21, 0xe0),
    (0xfa23, 0xfa24, 0xe0),
    (0xfa27, 0xfa29, 0xe0),
    // CJK extensions
    (0x3400, 0x4dbf, 0xe1),
    (0x20000, 0x2a6df, 0xe1),
    (0x2a700, 0x2ee5d, 0xe1),
    (0x30000, 0x323af, 0xe1),
    // Tangut
    (0x17000, 0x187ff, 0xe2),
    (0x18800, 0x18aff, 0xe2),
    (0x18d00, 0x18d8f, 0xe2),
    // Nushu
    (0x1b170, 0x1b2ff, 0xe3),
    // Khitan small script
    (0x18b00, 0x18cff, 0xe4),
];

/// Primary weight for a code point without an explicit mapping: a lead byte for its
/// block and three bytes that order by code point.
pub fn implicit_primary(c: u32) -> u32 {
    let lead = IMPLICIT_RANGES
        .iter()
        .find(|&&(start, end, _)| start <= c && c <= end)
        .map_or(UNASSIGNED_IMPLICIT_BYTE, |&(_, _, lead)| lead);

    let b3 = c % 254 + 2;
    let b2 = (c / 254) % 254 + 2;
    let b1 = c / (254 * 254) + 2;

    (lead << 24) | (b1 << 16) | (b2 << 8) | b3
}

pub(crate) fn implicit_ce(c: u32) -> u64 {
    make_ce(implicit_primary(c), COMMON_SEC_AND_TER_CE)
}

/// CEs that never come from a table.
pub(crate) fn hardcoded_ce(c: u32) -> Option<u64> {
    match c {
        0xfffe => Some(MERGE_SEPARATOR_CE),
        0xffff => Some(MAX_PRIMARY_CE),
        0xfffd => Some(make_ce(FFFD_PRIMARY, COMMON_SEC_AND_TER_CE)),
        _ if is_surrogate(c) => Some(make_ce(FFFD_PRIMARY, COMMON_SEC_AND_TER_CE)),
        _ => None,
    }
}

impl CollationData {
    pub(crate) fn new() -> Self {
        Self {
            compressible: vec![false; 256],
            ..Self::default()
        }
    }

    /// Own mapping, then the base's.
    pub fn lookup(&self, c: u32) -> Option<&Mapping> {
        match self.mappings.get(&c) {
            Some(m) => Some(m),
            None => self.base.as_ref().and_then(|b| b.lookup(c)),
        }
    }

    pub(crate) fn own_mapping(&self, c: u32) -> Option<&Mapping> {
        self.mappings.get(&c)
    }

    pub fn base(&self) -> Option<&Arc<CollationData>> {
        self.base.as_ref()
    }

    pub(crate) fn set_base(&mut self, base: Arc<CollationData>) {
        self.base = Some(base);
    }

    /// Code points mapped by this data itself, not by its base.
    pub(crate) fn own_code_points(&self) -> impl Iterator<Item = (u32, &Mapping)> {
        self.mappings.iter().map(|(&c, m)| (c, m))
    }

    pub fn is_compressible(&self, lead_byte: u32) -> bool {
        self.compressible
            .get(lead_byte as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Checks the tables that the key writer and the fast path index by lead byte or
    /// code point.
    pub(crate) fn validate(&self) -> Result<(), CollationError> {
        if self.compressible.len() != 256 {
            return Err(CollationError::InvalidData(format!(
                "{} compressible flags instead of one per lead byte",
                self.compressible.len()
            )));
        }
        if let Some(g) = self.groups.iter().find(|g| g.first_byte > g.last_byte) {
            return Err(CollationError::InvalidData(format!(
                "script group {:?} has lead bytes {:02X}..{:02X}",
                g.codes, g.first_byte, g.last_byte
            )));
        }
        match &self.fast_latin {
            Some(table) => table.validate(),
            None => Ok(()),
        }
    }

    pub(crate) fn compressible_bytes(&self) -> &[bool] {
        &self.compressible
    }

    pub fn numeric_primary(&self) -> u32 {
        self.numeric_primary
    }

    pub fn is_digit(&self, c: u32) -> bool {
        matches!(self.lookup(c), Some(Mapping::Digit { .. }))
    }

    /// True if `c` can be the continuation of a unit that started before it, so that
    /// comparison must not start at `c`.
    pub fn is_unsafe_backward(&self, c: u32, numeric: bool) -> bool {
        if self.unsafe_backward.contains(c) || is_surrogate(c) {
            return true;
        }
        if let Some(base) = &self.base {
            if base.unsafe_backward.contains(c) {
                return true;
            }
        }
        if ccc(c) != 0 || lccc(c) != 0 {
            return true;
        }
        numeric && self.is_digit(c)
    }

    pub(crate) fn fast_latin(&self) -> Option<&FastLatinTable> {
        self.fast_latin.as_ref()
    }

    //
    // Groups
    //

    pub fn groups(&self) -> &[ScriptGroup] {
        if self.groups.is_empty() {
            if let Some(base) = &self.base {
                return base.groups();
            }
        }
        &self.groups
    }

    pub fn group_index(&self, code: i32) -> Option<usize> {
        self.groups().iter().position(|g| g.codes.contains(&code))
    }

    /// Index of the group that owns the lead byte of `p`.
    pub fn group_for_primary(&self, p: u32) -> Option<usize> {
        let lead = (p >> 24) as u8;
        self.groups()
            .iter()
            .position(|g| g.first_byte <= lead && lead <= g.last_byte)
    }

    /// The highest primary weight in the group with this code, or 0 if unknown.
    pub fn last_primary_for_group(&self, code: i32) -> u32 {
        match self.group_index(code) {
            Some(i) => ((u32::from(self.groups()[i].last_byte) + 1) << 24) - 1,
            None => 0,
        }
    }

    /// All reorder codes that share a group with `code`.
    pub fn equivalent_reorder_codes(&self, code: i32) -> Vec<i32> {
        match self.group_index(code) {
            Some(i) => self.groups()[i].codes.clone(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collation::primary;

    #[test]
    fn implicit_primaries_order_by_code_point() {
        let han = [0x4e00, 0x4e01, 0x9fff, 0xfa0e];
        for w in han.windows(2) {
            assert!(implicit_primary(w[0]) < implicit_primary(w[1]));
        }
        assert_eq!(implicit_primary(0x4e00) >> 24, 0xe0);
        assert_eq!(implicit_primary(0x3400) >> 24, 0xe1);
        assert_eq!(implicit_primary(0x20000) >> 24, 0xe1);
        assert_eq!(implicit_primary(0x17000) >> 24, 0xe2);
        assert_eq!(implicit_primary(0x1b170) >> 24, 0xe3);
        assert_eq!(implicit_primary(0x18b00) >> 24, 0xe4);
        assert_eq!(implicit_primary(0x0e01) >> 24, 0xfe);
        // Core Han sorts before the extensions.
        assert!(implicit_primary(0x9fff) < implicit_primary(0x3400));
    }

    #[test]
    fn implicit_primaries_have_no_zero_bytes() {
        for c in [0, 1, 253, 254, 255, 0x10000, 0x10ffff] {
            let p = implicit_primary(c);
            assert!(p.to_be_bytes().iter().all(|&b| b >= 2), "{c:x}");
        }
    }

    #[test]
    fn short_compressible_table_is_invalid() {
        let mut data = CollationData::new();
        assert_eq!(data.validate(), Ok(()));
        data.compressible.truncate(0x2a);
        assert!(matches!(data.validate(), Err(CollationError::InvalidData(_))));
    }

    #[test]
    fn hardcoded_weights() {
        assert_eq!(hardcoded_ce(0xfffe), Some(MERGE_SEPARATOR_CE));
        assert_eq!(hardcoded_ce(0xffff), Some(MAX_PRIMARY_CE));
        assert_eq!(hardcoded_ce(0xd800).map(primary), Some(FFFD_PRIMARY));
        assert_eq!(hardcoded_ce(0x61), None);
    }

    #[test]
    fn contraction_suffix_lookup() {
        let mut c = Contraction::default();
        c.insert(vec![0x68], Mapping::Ce(1));
        c.insert(vec![0x68, 0x301], Mapping::Ce(2));
        c.insert(vec![0x6c], Mapping::Ce(3));
        assert_eq!(c.get(&[0x68]), Some(&Mapping::Ce(1)));
        assert!(c.has_prefix(&[0x68]));
        assert!(c.has_prefix(&[0x68, 0x301]));
        assert!(!c.has_prefix(&[0x69]));
        assert_eq!(c.get(&[0x6d]), None);
    }

    #[test]
    fn root_groups() {
        let data = crate::root::root_data().unwrap();
        assert_eq!(
            data.last_primary_for_group(reorder_code::PUNCTUATION),
            0x07ff_ffff
        );
        assert_eq!(
            data.equivalent_reorder_codes(reorder_code::COPTIC),
            vec![reorder_code::GREEK, reorder_code::COPTIC]
        );
        assert!(data.groups()[0].is_special());
        assert_eq!(data.group_for_primary(0x2910_0000), data.group_index(reorder_code::LATIN));
        assert!(data.is_unsafe_backward(0x301, false));
        assert!(!data.is_unsafe_backward(0x61, false));
        assert!(data.is_unsafe_backward(0x31, true));
    }
}
