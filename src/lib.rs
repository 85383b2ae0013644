//! Locale-sensitive string comparison and sort keys.
//!
//! A [`RuleBasedCollator`] combines a shared [`CollationTailoring`] (weights for the root
//! or one locale) with its own copy-on-write [`CollationSettings`].
//!
//! ```
//! use std::cmp::Ordering;
//! use unicol_engine::RuleBasedCollator;
//!
//! let cs = RuleBasedCollator::try_new("cs-CZ").unwrap();
//! assert_eq!(cs.compare("chata", "hrad"), Ordering::Greater);
//! ```

mod bocsu;
mod builder;
mod collation;
mod collator;
mod compare;
mod data;
mod element_iter;
mod error;
mod fast_latin;
mod iter;
mod keys;
mod normalizer;
mod options;
mod root;
mod sets;
mod settings;
mod string_span;
mod tailoring;
mod text;
mod uniset;

pub use collation::Level;
pub use collator::{CollationKey, LocaleKind, RuleBasedCollator};
pub use data::{CollationData, Contraction, Mapping, ScriptGroup};
pub use element_iter::CollationElementIterator;
pub use error::CollationError;
pub use options::{Attribute, AttributeValue, CollatorOptions, RuleOption};
pub use root::{available_locales, root};
pub use settings::{
    reorder_code, AlternateHandling, CaseFirst, CollationSettings, MaxVariable, Strength,
};
pub use string_span::{SpanCondition, UnicodeSetStringSpan};
pub use tailoring::CollationTailoring;
pub use text::{UCharIterator, Utf16Iter};
pub use uniset::UnicodeSet;
