use std::collections::HashMap;
use std::sync::Arc;

use bincode::Options;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::builder::{build_data, parse_table};
use crate::data::{CollationData, Mapping};
use crate::error::CollationError;
use crate::root;
use crate::settings::{AlternateHandling, CollationSettings};

/// Immutable collation data and default settings for one locale, shared by all
/// collators built for it.
#[derive(Debug)]
pub struct CollationTailoring {
    pub(crate) data: Arc<CollationData>,
    pub(crate) settings: CollationSettings,
    pub(crate) rules: String,
    pub(crate) locale: String,
    /// Root major and minor, then tailoring major and minor.
    pub(crate) version: [u8; 4],
    max_expansions: OnceCell<HashMap<u64, usize>>,
}

#[derive(Serialize, Deserialize)]
struct TailoringImage {
    data: CollationData,
    settings: CollationSettings,
    rules: String,
    locale: String,
    version: [u8; 4],
    has_base: bool,
}

impl CollationTailoring {
    /// Builds a tailoring from a weight table. Without a base, the table is the root.
    pub(crate) fn from_table(
        text: &str,
        base: Option<&CollationTailoring>,
        locale: &str,
    ) -> Result<Self, CollationError> {
        let table = parse_table(text)?;
        let data = build_data(&table, base.map(|b| &b.data))?;

        let mut settings = match base {
            Some(b) => b.settings.clone(),
            None => CollationSettings::new(&data),
        };
        let defaults = settings.options;
        let options = &table.options;
        if options.backwards {
            settings.set_flag(CollationSettings::BACKWARD_SECONDARY, Some(true), defaults);
        }
        if options.case_first.is_some() {
            settings.set_case_first(options.case_first, defaults);
        }
        if options.shifted {
            settings.set_alternate_handling(Some(AlternateHandling::Shifted), defaults);
        }
        if options.numeric {
            settings.set_flag(CollationSettings::NUMERIC, Some(true), defaults);
        }
        if options.case_level {
            settings.set_flag(CollationSettings::CASE_LEVEL, Some(true), defaults);
        }
        if !options.reorder.is_empty() {
            settings.set_reordering(&data, &options.reorder)?;
        }

        let root_version = base.map_or([table.version[0], table.version[1]], |b| {
            [b.version[0], b.version[1]]
        });
        let tailoring_version = if base.is_some() { table.version } else { [0, 0] };

        Ok(Self {
            data: Arc::new(data),
            settings,
            rules: if base.is_some() { text.to_string() } else { String::new() },
            locale: locale.to_string(),
            version: [
                root_version[0],
                root_version[1],
                tailoring_version[0],
                tailoring_version[1],
            ],
            max_expansions: OnceCell::new(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.data.base().is_none()
    }

    pub fn data(&self) -> &CollationData {
        &self.data
    }

    pub fn settings(&self) -> &CollationSettings {
        &self.settings
    }

    pub fn rules(&self) -> &str {
        &self.rules
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn version(&self) -> [u8; 4] {
        self.version
    }

    /// Longest expansion ending in `ce`, or 1.
    pub fn max_expansion(&self, ce: u64) -> usize {
        let table = self
            .max_expansions
            .get_or_init(|| compute_max_expansions(&self.data));
        table.get(&ce).copied().unwrap_or(1)
    }

    //
    // Binary form
    //

    /// Serializes the tailoring's own data and settings. The root data of a tailoring is
    /// not included.
    pub fn to_binary(&self) -> Result<Vec<u8>, CollationError> {
        let image = TailoringImage {
            data: (*self.data).clone(),
            settings: self.settings.clone(),
            rules: self.rules.clone(),
            locale: self.locale.clone(),
            version: self.version,
            has_base: !self.is_root(),
        };
        Ok(bincode::serialize(&image)?)
    }

    /// Loads an image written by `to_binary`. Images with tables of the wrong size are
    /// rejected here, before anything can index into them.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CollationError> {
        // Same encoding as `bincode::serialize`, but no length prefix may claim more
        // bytes than the image has.
        let image: TailoringImage = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(bytes.len() as u64)
            .deserialize(bytes)?;
        image.data.validate()?;
        let reorder_len = image.settings.reorder_table.len();
        if reorder_len != 0 && reorder_len != 256 {
            return Err(CollationError::InvalidData(format!(
                "reorder table has {reorder_len} entries"
            )));
        }
        let mut data = image.data;
        if image.has_base {
            let root = root::root()?;
            data.set_base(Arc::clone(&root.data));
        }
        log::debug!(
            "loaded {} byte collation image for {:?}",
            bytes.len(),
            image.locale
        );
        Ok(Self {
            data: Arc::new(data),
            settings: image.settings,
            rules: image.rules,
            locale: image.locale,
            version: image.version,
            max_expansions: OnceCell::new(),
        })
    }
}

fn record_expansions(data: &CollationData, out: &mut HashMap<u64, usize>) {
    fn record(mapping: &Mapping, out: &mut HashMap<u64, usize>) {
        match mapping {
            Mapping::Expansion(ces) => {
                if let Some(&last) = ces.last() {
                    let entry = out.entry(last).or_insert(1);
                    *entry = (*entry).max(ces.len());
                }
            }
            Mapping::Contraction(c) => {
                if let Some(default) = &c.default {
                    record(default, out);
                }
                for (_, m) in &c.suffixes {
                    record(m, out);
                }
            }
            Mapping::Ce(_) | Mapping::Digit { .. } => {}
        }
    }
    for (_, mapping) in data.own_code_points() {
        record(mapping, out);
    }
}

fn compute_max_expansions(data: &CollationData) -> HashMap<u64, usize> {
    let mut out = HashMap::new();
    if let Some(base) = data.base() {
        record_expansions(base, &mut out);
    }
    record_expansions(data, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{CaseFirst, Strength};

    #[test]
    fn root_version_and_rules() {
        let root = root::root().unwrap();
        assert!(root.is_root());
        assert_eq!(root.version(), [1, 0, 0, 0]);
        assert_eq!(root.rules(), "");
        assert_eq!(root.locale(), "root");
    }

    #[test]
    fn tailoring_options_become_default_settings() {
        let root = root::root().unwrap();
        let table = "@version 3.1\n@upper-first\n@shifted\n@reorder Grek\n";
        let t = CollationTailoring::from_table(table, Some(&*root), "xx").unwrap();
        assert!(!t.is_root());
        assert_eq!(t.version(), [1, 0, 3, 1]);
        assert_eq!(t.rules(), table);
        assert_eq!(t.settings.case_first(), CaseFirst::UpperFirst);
        assert_eq!(t.settings.alternate_handling(), AlternateHandling::Shifted);
        assert_eq!(t.settings.strength(), Strength::Tertiary);
        assert!(t.settings.has_reordering());
    }

    #[test]
    fn max_expansion_of_sharp_s() {
        let root = root::root().unwrap();
        let ce = 0x297c_0000_0500_1f00;
        assert_eq!(root.max_expansion(ce), 2);
        assert_eq!(root.max_expansion(0x2910_0000_0500_0500), 1);
    }

    #[test]
    fn binary_image_reattaches_the_root() {
        let t = root::tailoring_for_locale("cs").unwrap().0;
        let bytes = t.to_binary().unwrap();
        let loaded = CollationTailoring::from_binary(&bytes).unwrap();
        assert!(!loaded.is_root());
        assert_eq!(loaded.locale(), "cs");
        assert_eq!(loaded.version(), t.version());
        assert_eq!(loaded.data.lookup(0x61), t.data.lookup(0x61));
        assert_eq!(loaded.data.own_mapping(0x63), t.data.own_mapping(0x63));
    }

    #[test]
    fn garbage_images_are_rejected() {
        assert!(matches!(
            CollationTailoring::from_binary(&[1, 2, 3]),
            Err(CollationError::InvalidData(_))
        ));
        // A map length far beyond the end of the image.
        assert!(matches!(
            CollationTailoring::from_binary(&[0xff; 16]),
            Err(CollationError::InvalidData(_))
        ));
    }

    fn reencode(t: &CollationTailoring, edit: impl FnOnce(&mut TailoringImage)) -> Vec<u8> {
        let mut image: TailoringImage = bincode::deserialize(&t.to_binary().unwrap()).unwrap();
        edit(&mut image);
        bincode::serialize(&image).unwrap()
    }

    #[test]
    fn images_with_short_tables_are_rejected() {
        let root = root::root().unwrap();
        let cs = root::tailoring_for_locale("cs").unwrap().0;

        let unchanged = reencode(&root, |_| {});
        assert!(CollationTailoring::from_binary(&unchanged).is_ok());

        let short_compressible = reencode(&root, |image| image.data.compressible.truncate(0x20));
        assert!(matches!(
            CollationTailoring::from_binary(&short_compressible),
            Err(CollationError::InvalidData(_))
        ));

        let short_reorder = reencode(&cs, |image| image.settings.reorder_table = vec![0; 12]);
        assert!(matches!(
            CollationTailoring::from_binary(&short_reorder),
            Err(CollationError::InvalidData(_))
        ));
    }
}
