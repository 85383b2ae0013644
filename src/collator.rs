//! The collator: settings on top of a shared tailoring, string comparison and sort keys.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::collation::{Level, LATIN_MAX, LATIN_MAX_UTF8_LEAD, NO_CE};
use crate::compare::compare_up_to_quaternary;
use crate::data::CollationData;
use crate::element_iter::CollationElementIterator;
use crate::error::CollationError;
use crate::fast_latin::{self, fast_latin_options};
use crate::iter::CollationIterator;
use crate::keys::{
    write_identical_level, write_sort_key_up_to_quaternary, PartLevelCallback, SortKeyByteSink,
    WriteAllLevels,
};
use crate::normalizer::{FcdSource, NfdIterator};
use crate::options::{Attribute, AttributeValue, CollatorOptions, RuleOption, VARIABLE_TOP_BIT};
use crate::root;
use crate::sets;
use crate::settings::{
    reorder_code, AlternateHandling, CaseFirst, CollationSettings, MaxVariable, Strength,
};
use crate::tailoring::CollationTailoring;
use crate::text::{
    collect_code_points, decode_utf8, is_utf8_trail, previous_utf8, CodePointSlice, CodePointSource,
    IterSource, UCharIterator, Utf16Source, Utf8Source,
};
use crate::uniset::UnicodeSet;

//
// Structs etc.
//

/// Which locale `RuleBasedCollator::locale` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocaleKind {
    /// The locale that was requested, in canonical form.
    Valid,
    /// The locale whose data is used.
    Actual,
}

/// The collator's settings: the tailoring's defaults until the first change, then a copy.
#[derive(Debug, Clone)]
enum SettingsSlot {
    Default,
    Owned(Box<CollationSettings>),
}

impl SettingsSlot {
    fn get<'a>(&'a self, defaults: &'a CollationSettings) -> &'a CollationSettings {
        match self {
            SettingsSlot::Default => defaults,
            SettingsSlot::Owned(settings) => settings,
        }
    }

    fn make_owned_if_needed(
        &mut self,
        defaults: &CollationSettings,
    ) -> Result<&mut CollationSettings, CollationError> {
        if let SettingsSlot::Default = self {
            *self = SettingsSlot::Owned(Box::new(defaults.try_clone()?));
        }
        match self {
            SettingsSlot::Owned(settings) => Ok(settings),
            SettingsSlot::Default => Err(CollationError::MemoryAllocation),
        }
    }
}

/// A validated attribute change, applied once the settings are owned.
enum Change {
    Flag(u32, Option<bool>),
    Alternate(Option<AlternateHandling>),
    CaseFirst(Option<CaseFirst>),
    Strength(Option<Strength>),
    Nothing,
}

#[derive(Debug, Clone)]
pub struct RuleBasedCollator {
    tailoring: Arc<CollationTailoring>,
    settings: SettingsSlot,
    valid_locale: String,
    /// Attributes set explicitly rather than inherited, by `Attribute::bit`.
    explicit_attributes: u32,
    /// Cached `fast_latin_options` for the current settings.
    fast_latin_options: i32,
}

/// A sort key with byte-wise ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollationKey {
    bytes: Vec<u8>,
}

impl CollationKey {
    /// The key bytes, including the 00 terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn compare_to(&self, other: &CollationKey) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

//
// Construction
//

impl RuleBasedCollator {
    fn from_tailoring(tailoring: Arc<CollationTailoring>, valid_locale: String) -> Self {
        let fast_latin_options = fast_latin_options(&tailoring.data, &tailoring.settings);
        Self {
            tailoring,
            settings: SettingsSlot::Default,
            valid_locale,
            explicit_attributes: 0,
            fast_latin_options,
        }
    }

    pub fn try_new_root() -> Result<Self, CollationError> {
        Ok(Self::from_tailoring(root::root()?, "root".to_string()))
    }

    /// The collator for `locale`, falling back to less specific locales and then the root.
    pub fn try_new(locale: &str) -> Result<Self, CollationError> {
        let (tailoring, valid_locale) = root::tailoring_for_locale(locale)?;
        Ok(Self::from_tailoring(tailoring, valid_locale))
    }

    pub fn try_new_with_options(
        locale: &str,
        options: &CollatorOptions,
    ) -> Result<Self, CollationError> {
        let mut collator = Self::try_new(locale)?;
        collator.apply_options(options)?;
        Ok(collator)
    }

    /// A collator for a weight table that tailors the root.
    pub fn try_new_from_table(table: &str) -> Result<Self, CollationError> {
        let root = root::root()?;
        let tailoring = CollationTailoring::from_table(table, Some(&*root), "")?;
        Ok(Self::from_tailoring(Arc::new(tailoring), String::new()))
    }

    /// A collator for a tailoring serialized with `to_binary`.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CollationError> {
        let tailoring = CollationTailoring::from_binary(bytes)?;
        let valid_locale = tailoring.locale.clone();
        Ok(Self::from_tailoring(Arc::new(tailoring), valid_locale))
    }

    /// Serializes the tailoring. Settings changed on this collator are not included.
    pub fn to_binary(&self) -> Result<Vec<u8>, CollationError> {
        self.tailoring.to_binary()
    }

    fn apply_options(&mut self, options: &CollatorOptions) -> Result<(), CollationError> {
        if let Some(s) = options.strength {
            self.set_attribute(Attribute::Strength, AttributeValue::from_strength(s))?;
        }
        if let Some(a) = options.alternate_handling {
            self.set_attribute(Attribute::AlternateHandling, AttributeValue::from_alternate(a))?;
        }
        if let Some(c) = options.case_first {
            self.set_attribute(Attribute::CaseFirst, AttributeValue::from_case_first(c))?;
        }
        let flags = [
            (Attribute::CaseLevel, options.case_level),
            (Attribute::NumericCollation, options.numeric),
            (Attribute::FrenchCollation, options.backward_secondary),
            (Attribute::NormalizationMode, options.check_fcd),
        ];
        for (attr, value) in flags {
            if let Some(on) = value {
                self.set_attribute(attr, AttributeValue::from_bool(on))?;
            }
        }
        if let Some(mv) = options.max_variable {
            self.set_max_variable(Some(mv))?;
        }
        if let Some(codes) = &options.reorder_codes {
            self.set_reorder_codes(codes)?;
        }
        Ok(())
    }

    //
    // Accessors
    //

    fn data(&self) -> &CollationData {
        &self.tailoring.data
    }

    pub fn settings(&self) -> &CollationSettings {
        self.settings.get(&self.tailoring.settings)
    }

    pub fn strength(&self) -> Strength {
        self.settings().strength()
    }

    pub fn rules(&self) -> &str {
        self.tailoring.rules()
    }

    /// The tailoring's table, or the root table followed by it.
    pub fn rules_with(&self, option: RuleOption) -> String {
        match option {
            RuleOption::TailoringOnly => self.rules().to_string(),
            RuleOption::Full => {
                let root = root::root_rules();
                let mut rules = String::with_capacity(root.len() + self.rules().len());
                rules.push_str(root);
                rules.push_str(self.rules());
                rules
            }
        }
    }

    /// A short description of the explicitly set attributes and the locale whose data the
    /// collator uses, such as `AS_LFR_RCA_S2`. Items are sorted by their letter.
    /// `locale` replaces the collator's own locale when given.
    pub fn short_definition(&self, locale: Option<&str>) -> Result<String, CollationError> {
        let data_locale = match locale {
            Some(l) => root::tailoring_for_locale(l)?.0.locale().to_string(),
            None => self.tailoring.locale().to_string(),
        };
        let data_locale = if data_locale.is_empty() { "root".to_string() } else { data_locale };
        let subtags = LocaleSubtags::parse(&data_locale);

        let mut items: Vec<(char, String)> = Vec::new();
        let attributes = [
            ('A', Attribute::AlternateHandling),
            ('C', Attribute::CaseFirst),
            ('D', Attribute::NumericCollation),
            ('E', Attribute::CaseLevel),
            ('F', Attribute::FrenchCollation),
            ('N', Attribute::NormalizationMode),
            ('S', Attribute::Strength),
        ];
        for (letter, attr) in attributes {
            if self.has_explicit_attribute(attr) {
                items.push((letter, self.attribute(attr).short_letter().to_string()));
            }
        }
        let locale_parts = [
            ('L', subtags.language),
            ('R', subtags.region),
            ('V', subtags.variant),
            ('Z', subtags.script),
        ];
        for (letter, value) in locale_parts {
            if !value.is_empty() {
                items.push((letter, value.to_ascii_uppercase()));
            }
        }
        items.sort_by_key(|&(letter, _)| letter);
        let items: Vec<String> = items.iter().map(|(l, v)| format!("{l}{v}")).collect();
        Ok(items.join("_"))
    }

    pub fn locale(&self, kind: LocaleKind) -> &str {
        match kind {
            LocaleKind::Valid => &self.valid_locale,
            LocaleKind::Actual => self.tailoring.locale(),
        }
    }

    pub fn version(&self) -> [u8; 4] {
        self.tailoring.version()
    }

    pub fn has_explicit_attribute(&self, attr: Attribute) -> bool {
        self.explicit_attributes & attr.bit() != 0
    }

    pub fn has_explicit_variable_top(&self) -> bool {
        self.explicit_attributes & VARIABLE_TOP_BIT != 0
    }

    fn mark_explicit(&mut self, bit: u32, explicit: bool) {
        if explicit {
            self.explicit_attributes |= bit;
        } else {
            self.explicit_attributes &= !bit;
        }
    }

    fn refresh_fast_latin_options(&mut self) {
        self.fast_latin_options = fast_latin_options(&self.tailoring.data, self.settings());
    }

    //
    // Attributes
    //

    pub fn attribute(&self, attr: Attribute) -> AttributeValue {
        let s = self.settings();
        match attr {
            Attribute::FrenchCollation => AttributeValue::from_bool(s.has_backward_secondary()),
            Attribute::AlternateHandling => AttributeValue::from_alternate(s.alternate_handling()),
            Attribute::CaseFirst => AttributeValue::from_case_first(s.case_first()),
            Attribute::CaseLevel => AttributeValue::from_bool(s.flag(CollationSettings::CASE_LEVEL)),
            Attribute::NormalizationMode => AttributeValue::from_bool(!s.dont_check_fcd()),
            Attribute::Strength => AttributeValue::from_strength(s.strength()),
            Attribute::HiraganaQuaternaryMode => AttributeValue::Off,
            Attribute::NumericCollation => AttributeValue::from_bool(s.is_numeric()),
        }
    }

    /// Sets an attribute. `AttributeValue::Default` restores the tailoring's value.
    pub fn set_attribute(
        &mut self,
        attr: Attribute,
        value: AttributeValue,
    ) -> Result<(), CollationError> {
        let bad = || CollationError::IllegalArgument("value does not apply to this attribute");
        let change = match attr {
            Attribute::FrenchCollation => Change::Flag(
                CollationSettings::BACKWARD_SECONDARY,
                value.to_bool().ok_or_else(bad)?,
            ),
            Attribute::AlternateHandling => Change::Alternate(value.to_alternate().ok_or_else(bad)?),
            Attribute::CaseFirst => Change::CaseFirst(value.to_case_first().ok_or_else(bad)?),
            Attribute::CaseLevel => {
                Change::Flag(CollationSettings::CASE_LEVEL, value.to_bool().ok_or_else(bad)?)
            }
            Attribute::NormalizationMode => {
                Change::Flag(CollationSettings::CHECK_FCD, value.to_bool().ok_or_else(bad)?)
            }
            Attribute::Strength => Change::Strength(value.to_strength().ok_or_else(bad)?),
            Attribute::HiraganaQuaternaryMode => match value {
                AttributeValue::Off | AttributeValue::Default => Change::Nothing,
                _ => return Err(bad()),
            },
            Attribute::NumericCollation => {
                Change::Flag(CollationSettings::NUMERIC, value.to_bool().ok_or_else(bad)?)
            }
        };

        if value == self.attribute(attr) {
            self.mark_explicit(attr.bit(), true);
            return Ok(());
        }
        if matches!(self.settings, SettingsSlot::Default) && value == AttributeValue::Default {
            self.mark_explicit(attr.bit(), false);
            return Ok(());
        }

        let defaults = &self.tailoring.settings;
        let default_options = defaults.options;
        let settings = self.settings.make_owned_if_needed(defaults)?;
        match change {
            Change::Flag(bit, on) => settings.set_flag(bit, on, default_options),
            Change::Alternate(a) => settings.set_alternate_handling(a, default_options),
            Change::CaseFirst(c) => settings.set_case_first(c, default_options),
            Change::Strength(s) => settings.set_strength(s, default_options),
            Change::Nothing => {}
        }
        self.refresh_fast_latin_options();
        self.mark_explicit(attr.bit(), value != AttributeValue::Default);
        log::trace!("collation attribute {attr:?} set to {value:?}");
        Ok(())
    }

    pub fn max_variable(&self) -> MaxVariable {
        self.settings().max_variable()
    }

    /// Makes all primaries up to the end of `group` variable. `None` restores the
    /// tailoring's group.
    pub fn set_max_variable(&mut self, group: Option<MaxVariable>) -> Result<(), CollationError> {
        if group == Some(self.max_variable()) {
            self.mark_explicit(VARIABLE_TOP_BIT, true);
            return Ok(());
        }
        if matches!(self.settings, SettingsSlot::Default) && group.is_none() {
            self.mark_explicit(VARIABLE_TOP_BIT, false);
            return Ok(());
        }

        let target = group.unwrap_or_else(|| self.tailoring.settings.max_variable());
        let variable_top = self.data().last_primary_for_group(target.reorder_code());
        if variable_top == 0 {
            return Err(CollationError::InvalidData(
                "collation data lacks a variable group".to_string(),
            ));
        }
        let settings = self.settings.make_owned_if_needed(&self.tailoring.settings)?;
        settings.set_max_variable(target, variable_top);
        self.refresh_fast_latin_options();
        self.mark_explicit(VARIABLE_TOP_BIT, group.is_some());
        Ok(())
    }

    pub fn variable_top(&self) -> u32 {
        self.settings().variable_top()
    }

    /// Sets the variable top to the end of the group containing the primary weight of
    /// `s`, which must map to exactly one collation element. Returns the new variable top.
    pub fn set_variable_top_str(&mut self, s: &str) -> Result<u32, CollationError> {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.set_variable_top_utf16(&units)
    }

    pub fn set_variable_top_utf16(&mut self, s: &[u16]) -> Result<u32, CollationError> {
        if s.is_empty() {
            return Err(CollationError::IllegalArgument("empty variable top string"));
        }
        let settings = self.settings();
        let numeric = settings.is_numeric();
        let (ce1, ce2) = if settings.dont_check_fcd() {
            let mut iter = CollationIterator::new(self.data(), Utf16Source::new(s), numeric);
            (iter.next_ce(), iter.next_ce())
        } else {
            let source = FcdSource::new(Utf16Source::new(s));
            let mut iter = CollationIterator::new(self.data(), source, numeric);
            (iter.next_ce(), iter.next_ce())
        };
        if ce1 == NO_CE || ce2 != NO_CE {
            return Err(CollationError::CeNotFound);
        }
        self.set_variable_top((ce1 >> 32) as u32)?;
        Ok(self.variable_top())
    }

    /// Sets the variable top from a primary weight, pinned to the end of its group. Only
    /// the space, punctuation, symbol and currency groups can end the variable range.
    pub fn set_variable_top(&mut self, primary: u32) -> Result<(), CollationError> {
        let mut variable_top = primary;
        if variable_top != self.variable_top() {
            let data = self.data();
            let max_variable = data
                .group_for_primary(variable_top)
                .and_then(|i| data.groups()[i].codes.first().copied())
                .and_then(MaxVariable::from_reorder_code)
                .ok_or_else(|| {
                    log::warn!("variable top {primary:#010x} is not in a variable group");
                    CollationError::Unsupported("variable top outside the variable groups")
                })?;
            variable_top = data.last_primary_for_group(max_variable.reorder_code());
            if variable_top != self.variable_top() {
                let settings = self.settings.make_owned_if_needed(&self.tailoring.settings)?;
                settings.set_max_variable(max_variable, variable_top);
                self.refresh_fast_latin_options();
            }
        }
        let is_default = variable_top == self.tailoring.settings.variable_top();
        self.mark_explicit(VARIABLE_TOP_BIT, !is_default);
        Ok(())
    }

    //
    // Reordering
    //

    pub fn reorder_codes(&self) -> &[i32] {
        self.settings().reorder_codes()
    }

    /// Copies the reorder codes into `dest`, returning their number. An empty `dest`
    /// only measures.
    pub fn reorder_codes_into(&self, dest: &mut [i32]) -> Result<usize, CollationError> {
        let codes = self.reorder_codes();
        if dest.is_empty() {
            return Ok(codes.len());
        }
        if dest.len() < codes.len() {
            return Err(CollationError::BufferOverflow {
                needed: codes.len(),
            });
        }
        dest[..codes.len()].copy_from_slice(codes);
        Ok(codes.len())
    }

    /// Reorders script and special groups. `[reorder_code::DEFAULT]` restores the
    /// tailoring's order, `[]` or `[reorder_code::NONE]` removes any reordering.
    pub fn set_reorder_codes(&mut self, codes: &[i32]) -> Result<(), CollationError> {
        let codes = if codes == [reorder_code::NONE] {
            &[][..]
        } else {
            codes
        };
        if codes == self.reorder_codes() {
            return Ok(());
        }
        if codes == [reorder_code::DEFAULT] {
            if let SettingsSlot::Owned(settings) = &mut self.settings {
                settings.copy_reordering_from(&self.tailoring.settings)?;
                self.refresh_fast_latin_options();
            }
            return Ok(());
        }
        let settings = self.settings.make_owned_if_needed(&self.tailoring.settings)?;
        settings.set_reordering(&self.tailoring.data, codes)?;
        self.refresh_fast_latin_options();
        Ok(())
    }

    /// The reorder codes that share a group with `code`, `code` included.
    pub fn equivalent_reorder_codes(&self, code: i32) -> Result<Vec<i32>, CollationError> {
        let codes = self.data().equivalent_reorder_codes(code);
        if codes.is_empty() {
            return Err(CollationError::IllegalArgument("unknown reorder code"));
        }
        Ok(codes)
    }

    //
    // Data inspection
    //

    /// Code points and strings the tailoring maps differently from the root.
    pub fn tailored_set(&self) -> UnicodeSet {
        sets::tailored_set(self.data())
    }

    /// Contraction strings, and code points or strings with more than one element.
    pub fn contractions_and_expansions(&self) -> (UnicodeSet, UnicodeSet) {
        sets::contractions_and_expansions(self.data())
    }

    /// The collation elements of `s` under the current numeric and normalization settings.
    pub fn collation_elements(&self, s: &str) -> Vec<u64> {
        let settings = self.settings();
        let numeric = settings.is_numeric();
        if settings.dont_check_fcd() {
            CollationIterator::new(self.data(), Utf8Source::new(s.as_bytes()), numeric).fetch_ces()
        } else {
            let source = FcdSource::new(Utf8Source::new(s.as_bytes()));
            CollationIterator::new(self.data(), source, numeric).fetch_ces()
        }
    }

    /// Most elements any expansion ending in `ce` produces, at least 1.
    pub fn max_expansion(&self, ce: u64) -> usize {
        self.tailoring.max_expansion(ce)
    }

    /// An iterator over the 32-bit collation orders of `text`, in either direction.
    pub fn collation_element_iterator(&self, text: &str) -> CollationElementIterator<'_> {
        CollationElementIterator::new(self, text)
    }
}

/// The parts of a canonical locale id, for short definition strings.
struct LocaleSubtags<'a> {
    language: &'a str,
    script: &'a str,
    region: &'a str,
    variant: &'a str,
}

impl<'a> LocaleSubtags<'a> {
    fn parse(id: &'a str) -> Self {
        let mut parts = id.split('-');
        let mut subtags = Self {
            language: parts.next().unwrap_or_default(),
            script: "",
            region: "",
            variant: "",
        };
        let mut rest = parts.peekable();
        if let Some(&s) = rest.peek() {
            if s.len() == 4 && s.bytes().all(|b| b.is_ascii_alphabetic()) {
                subtags.script = s;
                rest.next();
            }
        }
        if let Some(&r) = rest.peek() {
            let alpha = r.len() == 2 && r.bytes().all(|b| b.is_ascii_alphabetic());
            let digits = r.len() == 3 && r.bytes().all(|b| b.is_ascii_digit());
            if alpha || digits {
                subtags.region = r;
                rest.next();
            }
        }
        if let Some(v) = rest.next() {
            subtags.variant = v;
        }
        subtags
    }
}

//
// Comparison
//

fn compare_nfd<L: CodePointSource, R: CodePointSource>(
    mut left: NfdIterator<L>,
    mut right: NfdIterator<R>,
) -> Ordering {
    loop {
        let l = left.next_code_point();
        let r = right.next_code_point();
        if l == r {
            if l.is_none() {
                return Ordering::Equal;
            }
            continue;
        }
        // The end of the text sorts first, then the merge separator.
        let l = match l {
            None => -2,
            Some(0xfffe) => -1,
            Some(c) => left.next_decomposed_code_point(c) as i32,
        };
        let r = match r {
            None => -2,
            Some(0xfffe) => -1,
            Some(c) => right.next_decomposed_code_point(c) as i32,
        };
        match l.cmp(&r) {
            Ordering::Equal => {}
            order => return order,
        }
    }
}

impl RuleBasedCollator {
    fn compare_up_to_quaternary_from<L: CodePointSource, R: CodePointSource>(
        &self,
        left: L,
        right: R,
    ) -> Ordering {
        let settings = self.settings();
        let data = self.data();
        let numeric = settings.is_numeric();
        if settings.dont_check_fcd() {
            let mut l = CollationIterator::new(data, left, numeric);
            let mut r = CollationIterator::new(data, right, numeric);
            compare_up_to_quaternary(&mut l, &mut r, settings)
        } else {
            let mut l = CollationIterator::new(data, FcdSource::new(left), numeric);
            let mut r = CollationIterator::new(data, FcdSource::new(right), numeric);
            compare_up_to_quaternary(&mut l, &mut r, settings)
        }
    }

    fn compare_identical_from<L: CodePointSource, R: CodePointSource>(
        &self,
        left: L,
        right: R,
    ) -> Ordering {
        if self.settings().dont_check_fcd() {
            compare_nfd(NfdIterator::new(left), NfdIterator::new(right))
        } else {
            compare_nfd(
                NfdIterator::new(FcdSource::new(left)),
                NfdIterator::new(FcdSource::new(right)),
            )
        }
    }

    /// Length of the common prefix the comparison may skip, or `None` if the texts are
    /// identical.
    fn skippable_prefix<T: PartialEq>(&self, left: &[T], right: &[T]) -> Option<usize> {
        let prefix = left.iter().zip(right).take_while(|(l, r)| l == r).count();
        if prefix == left.len() && prefix == right.len() {
            return None;
        }
        if self.settings().has_backward_secondary() {
            // Backward secondaries of the suffixes are followed by those of the prefix. If
            // one suffix starts with a primary ignorable that is safe to start at, the
            // prefix weights can decide, so the prefix cannot be skipped.
            return Some(0);
        }
        Some(prefix)
    }

    pub fn compare(&self, left: &str, right: &str) -> Ordering {
        self.compare_utf8(left.as_bytes(), right.as_bytes())
    }

    pub fn compare_utf16(&self, left: &[u16], right: &[u16]) -> Ordering {
        if std::ptr::eq(left, right) {
            return Ordering::Equal;
        }
        let mut prefix = match self.skippable_prefix(left, right) {
            Some(p) => p,
            None => return Ordering::Equal,
        };

        let settings = self.settings();
        let data = self.data();
        let numeric = settings.is_numeric();
        if prefix > 0 {
            let is_unsafe_at =
                |s: &[u16], i: usize| i < s.len() && data.is_unsafe_backward(u32::from(s[i]), numeric);
            if is_unsafe_at(left, prefix) || is_unsafe_at(right, prefix) {
                // Back up to the start of a contraction or combining sequence.
                loop {
                    prefix -= 1;
                    if prefix == 0 || !is_unsafe_at(left, prefix) {
                        break;
                    }
                }
            }
        }

        let (left, right) = (&left[prefix..], &right[prefix..]);
        let is_latin = |s: &[u16]| s.first().map_or(true, |&u| u32::from(u) <= LATIN_MAX);
        let fast = match data.fast_latin() {
            Some(table) if self.fast_latin_options >= 0 && is_latin(left) && is_latin(right) => {
                fast_latin::compare_utf16(table, self.fast_latin_options, settings.strength(), left, right)
            }
            _ => None,
        };
        let result = match fast {
            Some(order) => order,
            None => {
                log::trace!("UTF-16 comparison from offset {prefix} uses the full iterators");
                self.compare_up_to_quaternary_from(Utf16Source::new(left), Utf16Source::new(right))
            }
        };
        if result != Ordering::Equal || settings.strength() < Strength::Identical {
            return result;
        }
        self.compare_identical_from(Utf16Source::new(left), Utf16Source::new(right))
    }

    /// Compares only the first `length` units of each text, or all of a shorter one.
    pub fn compare_utf16_prefix(&self, left: &[u16], right: &[u16], length: usize) -> Ordering {
        let left = &left[..length.min(left.len())];
        let right = &right[..length.min(right.len())];
        self.compare_utf16(left, right)
    }

    /// Compares UTF-16 texts given with lengths, where -1 means up to the first NUL unit
    /// (or the end of the slice).
    pub fn compare_utf16_with_len(
        &self,
        left: &[u16],
        left_len: i32,
        right: &[u16],
        right_len: i32,
    ) -> Result<Ordering, CollationError> {
        fn bounded(s: &[u16], len: i32) -> Result<&[u16], CollationError> {
            match len {
                -1 => Ok(&s[..s.iter().position(|&u| u == 0).unwrap_or(s.len())]),
                n if n < 0 => Err(CollationError::IllegalArgument("negative text length")),
                n => s
                    .get(..n as usize)
                    .ok_or(CollationError::IllegalArgument("text length past the buffer")),
            }
        }
        let left = bounded(left, left_len)?;
        let right = bounded(right, right_len)?;
        Ok(self.compare_utf16(left, right))
    }

    pub fn compare_utf8(&self, left: &[u8], right: &[u8]) -> Ordering {
        if std::ptr::eq(left, right) {
            return Ordering::Equal;
        }
        let mut prefix = match self.skippable_prefix(left, right) {
            Some(p) => p,
            None => return Ordering::Equal,
        };

        let settings = self.settings();
        let data = self.data();
        let numeric = settings.is_numeric();
        if prefix > 0 {
            let is_trail_at = |s: &[u8], i: usize| i < s.len() && is_utf8_trail(s[i]);
            if is_trail_at(left, prefix) || is_trail_at(right, prefix) {
                // The texts differ inside a code point: back up to its lead byte.
                loop {
                    prefix -= 1;
                    if prefix == 0 || !is_utf8_trail(left[prefix]) {
                        break;
                    }
                }
            }
            let is_unsafe_at = |s: &[u8], i: usize| {
                i < s.len() && data.is_unsafe_backward(decode_utf8(s, i).0, numeric)
            };
            if is_unsafe_at(left, prefix) || is_unsafe_at(right, prefix) {
                loop {
                    let (c, start) = previous_utf8(left, prefix);
                    prefix = start;
                    if prefix == 0 || !data.is_unsafe_backward(c, numeric) {
                        break;
                    }
                }
                while prefix > 0 && is_utf8_trail(left[prefix]) {
                    prefix -= 1;
                }
            }
        }

        let (left, right) = (&left[prefix..], &right[prefix..]);
        let is_latin = |s: &[u8]| s.first().map_or(true, |&b| b <= LATIN_MAX_UTF8_LEAD);
        let fast = match data.fast_latin() {
            Some(table) if self.fast_latin_options >= 0 && is_latin(left) && is_latin(right) => {
                fast_latin::compare_utf8(table, self.fast_latin_options, settings.strength(), left, right)
            }
            _ => None,
        };
        let result = match fast {
            Some(order) => order,
            None => {
                log::trace!("UTF-8 comparison from offset {prefix} uses the full iterators");
                self.compare_up_to_quaternary_from(Utf8Source::new(left), Utf8Source::new(right))
            }
        };
        if result != Ordering::Equal || settings.strength() < Strength::Identical {
            return result;
        }
        self.compare_identical_from(Utf8Source::new(left), Utf8Source::new(right))
    }

    /// Compares the texts of two iterators from their current positions.
    pub fn compare_iter(
        &self,
        left: &mut dyn UCharIterator,
        right: &mut dyn UCharIterator,
    ) -> Ordering {
        let settings = self.settings();
        let data = self.data();
        let numeric = settings.is_numeric();
        let (left_start, right_start) = (left.index(), right.index());

        let mut prefix = 0;
        let (left_unit, right_unit) = loop {
            let l = left.next_unit();
            let r = right.next_unit();
            if l != r {
                break (l, r);
            }
            if l.is_none() {
                return Ordering::Equal;
            }
            prefix += 1;
        };
        // Step back over the units that differed.
        if left_unit.is_some() {
            left.previous_unit();
        }
        if right_unit.is_some() {
            right.previous_unit();
        }

        if settings.has_backward_secondary() {
            left.move_to(left_start);
            right.move_to(right_start);
            prefix = 0;
        }
        if prefix > 0 {
            let is_unsafe = |u: Option<u16>| u.map_or(false, |u| data.is_unsafe_backward(u32::from(u), numeric));
            if is_unsafe(left_unit) || is_unsafe(right_unit) {
                loop {
                    prefix -= 1;
                    let u = left.previous_unit();
                    right.previous_unit();
                    if prefix == 0 || !is_unsafe(u) {
                        break;
                    }
                }
            }
        }

        let result = self.compare_up_to_quaternary_from(IterSource::new(left), IterSource::new(right));
        if result != Ordering::Equal || settings.strength() < Strength::Identical {
            return result;
        }
        left.move_to(left_start + prefix);
        right.move_to(right_start + prefix);
        self.compare_identical_from(IterSource::new(left), IterSource::new(right))
    }

    pub fn equals(&self, left: &str, right: &str) -> bool {
        self.compare(left, right) == Ordering::Equal
    }
}

//
// Sort keys
//

impl RuleBasedCollator {
    fn write_key_levels(
        &self,
        cps: &[u32],
        sink: &mut SortKeyByteSink,
    ) -> Result<(), CollationError> {
        let settings = self.settings();
        let data = self.data();
        let numeric = settings.is_numeric();
        let compressible = data.compressible_bytes();
        if settings.dont_check_fcd() {
            let mut iter = CollationIterator::new(data, CodePointSlice::new(cps), numeric);
            write_sort_key_up_to_quaternary(
                &mut iter,
                compressible,
                settings,
                sink,
                Level::Primary,
                &mut WriteAllLevels,
                true,
            )?;
        } else {
            let source = FcdSource::new(CodePointSlice::new(cps));
            let mut iter = CollationIterator::new(data, source, numeric);
            write_sort_key_up_to_quaternary(
                &mut iter,
                compressible,
                settings,
                sink,
                Level::Primary,
                &mut WriteAllLevels,
                true,
            )?;
        }
        if settings.strength() == Strength::Identical {
            write_identical_level(cps, sink);
        }
        Ok(())
    }

    fn sort_key_for(&self, cps: &[u32]) -> Result<Vec<u8>, CollationError> {
        let mut key = Vec::new();
        let mut sink = SortKeyByteSink::growable(&mut key);
        self.write_key_levels(cps, &mut sink)?;
        sink.terminate_key()?;
        Ok(key)
    }

    /// The sort key of `s`, ending with a 00 byte. Keys compare byte-wise in the same order
    /// as `compare`.
    pub fn sort_key(&self, s: &str) -> Result<Vec<u8>, CollationError> {
        let cps: Vec<u32> = s.chars().map(u32::from).collect();
        self.sort_key_for(&cps)
    }

    pub fn sort_key_utf16(&self, s: &[u16]) -> Result<Vec<u8>, CollationError> {
        self.sort_key_for(&collect_code_points(Utf16Source::new(s)))
    }

    /// Writes the sort key of `s` into `dest` and returns its length. An empty `dest`
    /// only measures; a short one receives as much of the key as fits and the error
    /// reports the length needed.
    pub fn write_sort_key(&self, s: &[u16], dest: &mut [u8]) -> Result<usize, CollationError> {
        let cps = collect_code_points(Utf16Source::new(s));
        let capacity = dest.len();
        let mut sink = SortKeyByteSink::fixed(dest);
        self.write_key_levels(&cps, &mut sink)?;
        let length = sink.terminate_key()?;
        if capacity > 0 && length > capacity {
            return Err(CollationError::BufferOverflow { needed: length });
        }
        Ok(length)
    }

    pub fn collation_key(&self, s: &str) -> Result<CollationKey, CollationError> {
        Ok(CollationKey {
            bytes: self.sort_key(s)?,
        })
    }

    /// Writes the next `dest.len()` bytes of the sort key of the iterator's text, which is
    /// read from its start. `state` starts as `[0, 0]` and carries the position between
    /// calls. Returns the number of bytes written; fewer than `dest.len()` means the key
    /// is complete and the rest of `dest` is zeroed.
    pub fn next_sort_key_part(
        &self,
        iter: &mut dyn UCharIterator,
        state: &mut [u32; 2],
        dest: &mut [u8],
    ) -> Result<usize, CollationError> {
        let count = dest.len();
        if count == 0 {
            return Ok(0);
        }
        let mut level = Level::from_u32(state[0])
            .ok_or(CollationError::IllegalArgument("bad sort key part state"))?;
        let settings = self.settings();
        let data = self.data();
        let numeric = settings.is_numeric();

        let mut sink = SortKeyByteSink::fixed(dest);
        sink.ignore_bytes(state[1] as usize);
        iter.move_to(0);

        if level <= Level::Quaternary {
            let mut callback = PartLevelCallback::new(&sink);
            let compressible = data.compressible_bytes();
            if settings.dont_check_fcd() {
                let mut ci = CollationIterator::new(data, IterSource::new(iter), numeric);
                write_sort_key_up_to_quaternary(
                    &mut ci,
                    compressible,
                    settings,
                    &mut sink,
                    level,
                    &mut callback,
                    false,
                )?;
            } else {
                let source = FcdSource::new(IterSource::new(iter));
                let mut ci = CollationIterator::new(data, source, numeric);
                write_sort_key_up_to_quaternary(
                    &mut ci,
                    compressible,
                    settings,
                    &mut sink,
                    level,
                    &mut callback,
                    false,
                )?;
            }
            if sink.number_of_bytes_appended() > count {
                *state = [callback.level() as u32, callback.level_capacity() as u32];
                return Ok(count);
            }
            level = Level::Identical;
        }

        if level == Level::Identical && settings.strength() == Strength::Identical {
            let level_capacity = sink.remaining_capacity();
            iter.move_to(0);
            let cps = collect_code_points(IterSource::new(iter));
            write_identical_level(&cps, &mut sink);
            if sink.number_of_bytes_appended() > count {
                *state = [Level::Identical as u32, level_capacity as u32];
                return Ok(count);
            }
        }

        *state = [Level::Zero as u32, 0];
        let length = sink.number_of_bytes_appended();
        dest[length..].fill(0);
        Ok(length)
    }
}

//
// Equality
//

impl PartialEq for RuleBasedCollator {
    fn eq(&self, other: &Self) -> bool {
        if self.settings() != other.settings() {
            return false;
        }
        if Arc::ptr_eq(&self.tailoring.data, &other.tailoring.data) {
            return true;
        }
        let (this_root, other_root) = (self.tailoring.is_root(), other.tailoring.is_root());
        if this_root != other_root {
            return false;
        }
        let has_rules = |t: &CollationTailoring| t.is_root() || !t.rules.is_empty();
        if has_rules(&*self.tailoring) && has_rules(&*other.tailoring) && self.rules() == other.rules()
        {
            return true;
        }
        self.tailored_set() == other.tailored_set()
    }
}

impl Eq for RuleBasedCollator {}

impl Hash for RuleBasedCollator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.settings().hash(state);
        if !self.tailoring.is_root() {
            self.tailored_set().hash(state);
        }
    }
}
