use serde::{Deserialize, Serialize};

use crate::collation::{CASE_AND_TERTIARY_MASK, ONLY_TERTIARY_MASK};
use crate::data::CollationData;
use crate::error::CollationError;

//
// Enums
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strength {
    Primary = 0,
    Secondary = 1,
    Tertiary = 2,
    Quaternary = 3,
    Identical = 15,
}

impl Strength {
    fn from_bits(v: u32) -> Self {
        match v {
            0 => Strength::Primary,
            1 => Strength::Secondary,
            2 => Strength::Tertiary,
            3 => Strength::Quaternary,
            _ => Strength::Identical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlternateHandling {
    NonIgnorable,
    Shifted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseFirst {
    Off,
    LowerFirst,
    UpperFirst,
}

/// The last group whose primaries count as variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaxVariable {
    Space = 0,
    Punctuation = 1,
    Symbol = 2,
    Currency = 3,
}

impl MaxVariable {
    fn from_bits(v: u32) -> Self {
        match v {
            0 => MaxVariable::Space,
            1 => MaxVariable::Punctuation,
            2 => MaxVariable::Symbol,
            _ => MaxVariable::Currency,
        }
    }

    pub fn reorder_code(self) -> i32 {
        reorder_code::FIRST + self as i32
    }

    /// The special group code for space, punctuation, symbols or currency.
    pub fn from_reorder_code(code: i32) -> Option<Self> {
        match code {
            reorder_code::SPACE => Some(MaxVariable::Space),
            reorder_code::PUNCTUATION => Some(MaxVariable::Punctuation),
            reorder_code::SYMBOL => Some(MaxVariable::Symbol),
            reorder_code::CURRENCY => Some(MaxVariable::Currency),
            _ => None,
        }
    }
}

/// Reorder codes: special groups plus script codes.
pub mod reorder_code {
    pub const DEFAULT: i32 = -1;
    pub const NONE: i32 = 103;
    pub const OTHERS: i32 = 103;
    pub const SPACE: i32 = 0x1000;
    pub const FIRST: i32 = SPACE;
    pub const PUNCTUATION: i32 = 0x1001;
    pub const SYMBOL: i32 = 0x1002;
    pub const CURRENCY: i32 = 0x1003;
    pub const DIGIT: i32 = 0x1004;
    pub const LIMIT: i32 = 0x1005;

    pub const COPTIC: i32 = 7;
    pub const CYRILLIC: i32 = 8;
    pub const GREEK: i32 = 14;
    pub const HAN: i32 = 17;
    pub const LATIN: i32 = 25;
    pub const NUSHU: i32 = 150;
    pub const TANGUT: i32 = 154;
    pub const KHITAN_SMALL_SCRIPT: i32 = 191;
}

//
// Settings
//

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollationSettings {
    pub(crate) options: u32,
    /// Last primary weight treated as variable.
    pub(crate) variable_top: u32,
    pub(crate) reorder_codes: Vec<i32>,
    /// Empty, or a 256-entry lead byte permutation.
    pub(crate) reorder_table: Vec<u8>,
}

impl CollationSettings {
    pub const CHECK_FCD: u32 = 1;
    pub const NUMERIC: u32 = 2;
    pub const SHIFTED: u32 = 4;
    pub const ALTERNATE_MASK: u32 = 0xc;
    pub const MAX_VARIABLE_SHIFT: u32 = 4;
    pub const MAX_VARIABLE_MASK: u32 = 0x70;
    pub const UPPER_FIRST: u32 = 0x100;
    pub const CASE_FIRST: u32 = 0x200;
    pub const CASE_FIRST_AND_UPPER_MASK: u32 = Self::CASE_FIRST | Self::UPPER_FIRST;
    pub const CASE_LEVEL: u32 = 0x400;
    pub const BACKWARD_SECONDARY: u32 = 0x800;
    pub const STRENGTH_SHIFT: u32 = 12;
    pub const STRENGTH_MASK: u32 = 0xf000;

    pub(crate) const DEFAULT_OPTIONS: u32 = ((Strength::Tertiary as u32) << Self::STRENGTH_SHIFT)
        | ((MaxVariable::Punctuation as u32) << Self::MAX_VARIABLE_SHIFT)
        | Self::CHECK_FCD;

    pub(crate) fn new(data: &CollationData) -> Self {
        Self {
            options: Self::DEFAULT_OPTIONS,
            variable_top: data.last_primary_for_group(MaxVariable::Punctuation.reorder_code()),
            reorder_codes: Vec::new(),
            reorder_table: Vec::new(),
        }
    }

    /// Like `clone`, but reports allocation failure.
    pub(crate) fn try_clone(&self) -> Result<Self, CollationError> {
        let mut copy = Self {
            options: self.options,
            variable_top: self.variable_top,
            reorder_codes: Vec::new(),
            reorder_table: Vec::new(),
        };
        copy.copy_reordering_from(self)?;
        Ok(copy)
    }

    pub(crate) fn copy_reordering_from(&mut self, other: &Self) -> Result<(), CollationError> {
        let mut codes = Vec::new();
        codes.try_reserve_exact(other.reorder_codes.len())?;
        codes.extend_from_slice(&other.reorder_codes);
        let mut table = Vec::new();
        table.try_reserve_exact(other.reorder_table.len())?;
        table.extend_from_slice(&other.reorder_table);
        self.reorder_codes = codes;
        self.reorder_table = table;
        Ok(())
    }

    pub fn strength(&self) -> Strength {
        Strength::from_bits((self.options & Self::STRENGTH_MASK) >> Self::STRENGTH_SHIFT)
    }

    pub(crate) fn set_strength(&mut self, value: Option<Strength>, default_options: u32) {
        let bits = match value {
            Some(s) => (s as u32) << Self::STRENGTH_SHIFT,
            None => default_options & Self::STRENGTH_MASK,
        };
        self.options = (self.options & !Self::STRENGTH_MASK) | bits;
    }

    pub(crate) fn set_flag(&mut self, bit: u32, value: Option<bool>, default_options: u32) {
        let on = value.unwrap_or(default_options & bit != 0);
        if on {
            self.options |= bit;
        } else {
            self.options &= !bit;
        }
    }

    pub fn flag(&self, bit: u32) -> bool {
        self.options & bit != 0
    }

    pub fn is_numeric(&self) -> bool {
        self.flag(Self::NUMERIC)
    }

    pub fn dont_check_fcd(&self) -> bool {
        !self.flag(Self::CHECK_FCD)
    }

    pub fn has_backward_secondary(&self) -> bool {
        self.flag(Self::BACKWARD_SECONDARY)
    }

    pub fn alternate_handling(&self) -> AlternateHandling {
        if self.options & Self::ALTERNATE_MASK != 0 {
            AlternateHandling::Shifted
        } else {
            AlternateHandling::NonIgnorable
        }
    }

    pub(crate) fn set_alternate_handling(
        &mut self,
        value: Option<AlternateHandling>,
        default_options: u32,
    ) {
        let bits = match value {
            Some(AlternateHandling::Shifted) => Self::SHIFTED,
            Some(AlternateHandling::NonIgnorable) => 0,
            None => default_options & Self::ALTERNATE_MASK,
        };
        self.options = (self.options & !Self::ALTERNATE_MASK) | bits;
    }

    pub fn case_first(&self) -> CaseFirst {
        match self.options & Self::CASE_FIRST_AND_UPPER_MASK {
            0 => CaseFirst::Off,
            Self::CASE_FIRST => CaseFirst::LowerFirst,
            _ => CaseFirst::UpperFirst,
        }
    }

    pub(crate) fn set_case_first(&mut self, value: Option<CaseFirst>, default_options: u32) {
        let bits = match value {
            Some(CaseFirst::Off) => 0,
            Some(CaseFirst::LowerFirst) => Self::CASE_FIRST,
            Some(CaseFirst::UpperFirst) => Self::CASE_FIRST_AND_UPPER_MASK,
            None => default_options & Self::CASE_FIRST_AND_UPPER_MASK,
        };
        self.options = (self.options & !Self::CASE_FIRST_AND_UPPER_MASK) | bits;
    }

    pub fn max_variable(&self) -> MaxVariable {
        MaxVariable::from_bits((self.options & Self::MAX_VARIABLE_MASK) >> Self::MAX_VARIABLE_SHIFT)
    }

    pub(crate) fn set_max_variable(&mut self, value: MaxVariable, variable_top: u32) {
        self.options = (self.options & !Self::MAX_VARIABLE_MASK)
            | ((value as u32) << Self::MAX_VARIABLE_SHIFT);
        self.variable_top = variable_top;
    }

    pub fn variable_top(&self) -> u32 {
        self.variable_top
    }

    /// Tertiary weights include the case bits only when case-first is on without case level.
    pub fn tertiary_mask(&self) -> u32 {
        if self.options & (Self::CASE_LEVEL | Self::CASE_FIRST) == Self::CASE_FIRST {
            CASE_AND_TERTIARY_MASK
        } else {
            ONLY_TERTIARY_MASK
        }
    }

    pub fn has_reordering(&self) -> bool {
        !self.reorder_table.is_empty()
    }

    #[inline]
    pub fn reorder(&self, p: u32) -> u32 {
        if self.reorder_table.is_empty() || p == 0 {
            return p;
        }
        let b = self.reorder_table[(p >> 24) as usize];
        (u32::from(b) << 24) | (p & 0xff_ffff)
    }

    pub fn reorder_codes(&self) -> &[i32] {
        &self.reorder_codes
    }

    /// Builds the lead byte permutation. Listed groups move to the front in list order;
    /// groups listed after `OTHERS` move to the end.
    pub(crate) fn set_reordering(
        &mut self,
        data: &CollationData,
        codes: &[i32],
    ) -> Result<(), CollationError> {
        if codes.is_empty() || (codes.len() == 1 && codes[0] == reorder_code::NONE) {
            self.reorder_codes = Vec::new();
            self.reorder_table = Vec::new();
            return Ok(());
        }

        let groups = data.groups();
        let mut head: Vec<usize> = Vec::new();
        let mut tail: Vec<usize> = Vec::new();
        let mut seen_others = false;

        for &code in codes {
            if code == reorder_code::OTHERS {
                if seen_others {
                    return Err(CollationError::IllegalArgument("duplicate reorder code"));
                }
                seen_others = true;
                continue;
            }
            let index = data
                .group_index(code)
                .ok_or(CollationError::IllegalArgument("unknown reorder code"))?;
            if head.contains(&index) || tail.contains(&index) {
                return Err(CollationError::IllegalArgument("duplicate reorder code"));
            }
            if seen_others {
                tail.push(index);
            } else {
                head.push(index);
            }
        }

        // Special groups only move within the special range in front of the scripts.
        let is_special = |i: &usize| groups[*i].is_special();
        let mut order: Vec<usize> = head.iter().copied().filter(is_special).collect();
        order.extend(tail.iter().copied().filter(is_special));
        let unlisted: Vec<usize> = (0..groups.len())
            .filter(|i| is_special(i) && !order.contains(i))
            .collect();
        order.extend(unlisted);
        order.extend(head.iter().copied().filter(|i| !is_special(i)));
        order.extend(
            (0..groups.len()).filter(|i| !is_special(i) && !head.contains(i) && !tail.contains(i)),
        );
        order.extend(tail.iter().copied().filter(|i| !is_special(i)));

        let mut slots: Vec<u8> = groups
            .iter()
            .flat_map(|g| g.first_byte..=g.last_byte)
            .collect();
        slots.sort_unstable();

        let mut table: Vec<u8> = Vec::new();
        table.try_reserve_exact(256)?;
        table.extend(0..=255u8);
        let mut next = slots.iter();
        for index in order {
            let group = &groups[index];
            for b in group.first_byte..=group.last_byte {
                if let Some(&slot) = next.next() {
                    table[b as usize] = slot;
                }
            }
        }

        let mut new_codes = Vec::new();
        new_codes.try_reserve_exact(codes.len())?;
        new_codes.extend_from_slice(codes);

        self.reorder_codes = new_codes;
        self.reorder_table = if table.iter().enumerate().all(|(i, &b)| i == b as usize) {
            Vec::new()
        } else {
            table
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root;

    #[test]
    fn default_options() {
        let data = root::root_data().unwrap();
        let s = CollationSettings::new(data);
        assert_eq!(s.strength(), Strength::Tertiary);
        assert_eq!(s.alternate_handling(), AlternateHandling::NonIgnorable);
        assert_eq!(s.case_first(), CaseFirst::Off);
        assert_eq!(s.max_variable(), MaxVariable::Punctuation);
        assert!(!s.dont_check_fcd());
        assert_eq!(s.tertiary_mask(), ONLY_TERTIARY_MASK);
        assert_eq!(s.variable_top(), 0x07ff_ffff);
    }

    #[test]
    fn case_first_widens_tertiary_mask() {
        let data = root::root_data().unwrap();
        let mut s = CollationSettings::new(data);
        s.set_case_first(Some(CaseFirst::UpperFirst), 0);
        assert_eq!(s.tertiary_mask(), CASE_AND_TERTIARY_MASK);
        s.set_flag(CollationSettings::CASE_LEVEL, Some(true), 0);
        assert_eq!(s.tertiary_mask(), ONLY_TERTIARY_MASK);
    }

    #[test]
    fn reordering_moves_groups_to_front() {
        let data = root::root_data().unwrap();
        let mut s = CollationSettings::new(data);
        s.set_reordering(data, &[reorder_code::GREEK, reorder_code::LATIN])
            .unwrap();
        assert!(s.has_reordering());

        let greek = s.reorder(0x2b10_0000);
        let latin = s.reorder(0x2910_0000);
        let digit = s.reorder(0x0a10_0000);
        let cyrillic = s.reorder(0x2d10_0000);
        assert!(digit < greek);
        assert!(greek < latin);
        assert!(latin < cyrillic);
        // Merge separator and implicit unassigned bytes stay put.
        assert_eq!(s.reorder(0x0200_0000), 0x0200_0000);
        assert_eq!(s.reorder(0xfe02_0304), 0xfe02_0304);
    }

    #[test]
    fn max_variable_codes() {
        for mv in [
            MaxVariable::Space,
            MaxVariable::Punctuation,
            MaxVariable::Symbol,
            MaxVariable::Currency,
        ] {
            assert_eq!(MaxVariable::from_reorder_code(mv.reorder_code()), Some(mv));
        }
        assert_eq!(MaxVariable::from_reorder_code(reorder_code::DIGIT), None);
    }

    #[test]
    fn try_clone_copies_reordering() {
        let data = root::root_data().unwrap();
        let mut s = CollationSettings::new(data);
        s.set_reordering(data, &[reorder_code::CYRILLIC]).unwrap();
        assert_eq!(s.try_clone().unwrap(), s);
    }

    #[test]
    fn reordering_rejects_bad_codes() {
        let data = root::root_data().unwrap();
        let mut s = CollationSettings::new(data);
        assert!(s.set_reordering(data, &[4242]).is_err());
        assert!(s
            .set_reordering(data, &[reorder_code::LATIN, reorder_code::LATIN])
            .is_err());
        assert!(!s.has_reordering());
    }

    #[test]
    fn identity_reordering_keeps_codes_but_no_table() {
        let data = root::root_data().unwrap();
        let mut s = CollationSettings::new(data);
        s.set_reordering(data, &[reorder_code::SPACE]).unwrap();
        assert_eq!(s.reorder_codes(), &[reorder_code::SPACE]);
        assert!(!s.has_reordering());
    }
}
