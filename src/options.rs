use serde::{Deserialize, Serialize};

use crate::settings::{AlternateHandling, CaseFirst, MaxVariable, Strength};

/// Settable collation attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Backward secondary weights, as in Canadian French.
    FrenchCollation = 0,
    AlternateHandling = 1,
    CaseFirst = 2,
    CaseLevel = 3,
    /// FCD checking of the input; turning it off requires input that is already FCD.
    NormalizationMode = 4,
    Strength = 5,
    /// Deprecated; only `Off` is accepted.
    HiraganaQuaternaryMode = 6,
    NumericCollation = 7,
}

impl Attribute {
    pub(crate) fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Bit in the explicit-attribute mask for the variable top, next to the attributes.
pub(crate) const VARIABLE_TOP_BIT: u32 = 1 << 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    /// The tailoring's default.
    Default,
    Primary,
    Secondary,
    Tertiary,
    Quaternary,
    Identical,
    Off,
    On,
    Shifted,
    NonIgnorable,
    LowerFirst,
    UpperFirst,
}

impl AttributeValue {
    pub(crate) fn from_strength(s: Strength) -> Self {
        match s {
            Strength::Primary => Self::Primary,
            Strength::Secondary => Self::Secondary,
            Strength::Tertiary => Self::Tertiary,
            Strength::Quaternary => Self::Quaternary,
            Strength::Identical => Self::Identical,
        }
    }

    /// `Some(None)` for `Default`; `None` for a value that is not a strength.
    pub(crate) fn to_strength(self) -> Option<Option<Strength>> {
        Some(match self {
            Self::Default => None,
            Self::Primary => Some(Strength::Primary),
            Self::Secondary => Some(Strength::Secondary),
            Self::Tertiary => Some(Strength::Tertiary),
            Self::Quaternary => Some(Strength::Quaternary),
            Self::Identical => Some(Strength::Identical),
            _ => return None,
        })
    }

    pub(crate) fn from_bool(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }

    pub(crate) fn to_bool(self) -> Option<Option<bool>> {
        Some(match self {
            Self::Default => None,
            Self::On => Some(true),
            Self::Off => Some(false),
            _ => return None,
        })
    }

    pub(crate) fn from_alternate(a: AlternateHandling) -> Self {
        match a {
            AlternateHandling::NonIgnorable => Self::NonIgnorable,
            AlternateHandling::Shifted => Self::Shifted,
        }
    }

    pub(crate) fn to_alternate(self) -> Option<Option<AlternateHandling>> {
        Some(match self {
            Self::Default => None,
            Self::NonIgnorable => Some(AlternateHandling::NonIgnorable),
            Self::Shifted => Some(AlternateHandling::Shifted),
            _ => return None,
        })
    }

    /// Letter for the value in a short definition string.
    pub(crate) fn short_letter(self) -> char {
        match self {
            Self::Default => 'D',
            Self::Primary => '1',
            Self::Secondary => '2',
            Self::Tertiary => '3',
            Self::Quaternary => '4',
            Self::Identical => 'I',
            Self::Off => 'X',
            Self::On => 'O',
            Self::Shifted => 'S',
            Self::NonIgnorable => 'N',
            Self::LowerFirst => 'L',
            Self::UpperFirst => 'U',
        }
    }

    pub(crate) fn from_case_first(c: CaseFirst) -> Self {
        match c {
            CaseFirst::Off => Self::Off,
            CaseFirst::LowerFirst => Self::LowerFirst,
            CaseFirst::UpperFirst => Self::UpperFirst,
        }
    }

    pub(crate) fn to_case_first(self) -> Option<Option<CaseFirst>> {
        Some(match self {
            Self::Default => None,
            Self::Off => Some(CaseFirst::Off),
            Self::LowerFirst => Some(CaseFirst::LowerFirst),
            Self::UpperFirst => Some(CaseFirst::UpperFirst),
            _ => return None,
        })
    }
}

/// Which rules `RuleBasedCollator::rules_with` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOption {
    /// Only the tailoring's own table.
    TailoringOnly,
    /// The root table followed by the tailoring's table.
    Full,
}

/// Settings to apply when constructing a collator. `None` keeps the tailoring default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CollatorOptions {
    pub strength: Option<Strength>,
    pub alternate_handling: Option<AlternateHandling>,
    pub case_first: Option<CaseFirst>,
    pub case_level: Option<bool>,
    pub numeric: Option<bool>,
    pub backward_secondary: Option<bool>,
    pub check_fcd: Option<bool>,
    pub max_variable: Option<MaxVariable>,
    pub reorder_codes: Option<Vec<i32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_conversions() {
        assert_eq!(AttributeValue::Tertiary.to_strength(), Some(Some(Strength::Tertiary)));
        assert_eq!(AttributeValue::Default.to_strength(), Some(None));
        assert_eq!(AttributeValue::On.to_strength(), None);
        assert_eq!(AttributeValue::Shifted.to_bool(), None);
        assert_eq!(
            AttributeValue::from_case_first(CaseFirst::UpperFirst).to_case_first(),
            Some(Some(CaseFirst::UpperFirst))
        );
    }

    #[test]
    fn options_survive_a_binary_image() {
        let opts = CollatorOptions {
            strength: Some(Strength::Secondary),
            numeric: Some(true),
            ..CollatorOptions::default()
        };
        let bytes = bincode::serialize(&opts).unwrap();
        let back: CollatorOptions = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, opts);
    }
}
