//! The root collation and the built-in locale tailorings, built on first use.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};

use crate::data::CollationData;
use crate::error::CollationError;
use crate::tailoring::CollationTailoring;

//
// Static/const
//

static ROOT_TABLE: &str = include_str!("tables/root.txt");

static TAILORING_TABLES: [(&str, &str); 3] = [
    ("cs", include_str!("tables/cs.txt")),
    ("da", include_str!("tables/da.txt")),
    ("fr-CA", include_str!("tables/fr_CA.txt")),
];

static ROOT: Lazy<Result<Arc<CollationTailoring>, CollationError>> = Lazy::new(|| {
    let root = CollationTailoring::from_table(ROOT_TABLE, None, "root")?;
    log::debug!("root collation version {:?} ready", root.version());
    Ok(Arc::new(root))
});

type TailoringCell = OnceCell<Result<Arc<CollationTailoring>, CollationError>>;

static TAILORINGS: Lazy<HashMap<&'static str, TailoringCell>> = Lazy::new(|| {
    TAILORING_TABLES
        .iter()
        .map(|&(locale, _)| (locale, OnceCell::new()))
        .collect()
});

//
// Access
//

pub fn root() -> Result<Arc<CollationTailoring>, CollationError> {
    ROOT.as_ref().map(Arc::clone).map_err(Clone::clone)
}

/// The root weight table as text.
pub(crate) fn root_rules() -> &'static str {
    ROOT_TABLE
}

pub(crate) fn root_data() -> Result<&'static CollationData, CollationError> {
    match &*ROOT {
        Ok(root) => Ok(&root.data),
        Err(e) => Err(e.clone()),
    }
}

/// Locales with their own tables, plus "root".
pub fn available_locales() -> Vec<&'static str> {
    let mut locales: Vec<&str> = TAILORING_TABLES.iter().map(|&(l, _)| l).collect();
    locales.push("root");
    locales.sort_unstable();
    locales
}

/// Canonical form of a locale id: `_` becomes `-`, extensions are dropped, the language
/// is lowercased and a region is uppercased.
fn canonicalize(locale: &str) -> String {
    let locale = locale.replace('_', "-");
    let mut parts: Vec<String> = Vec::new();
    for (i, part) in locale.split('-').enumerate() {
        if part.is_empty() || (i > 0 && part.len() == 1) {
            // "-u-..." and "-x-..." extensions.
            break;
        }
        parts.push(if i == 0 {
            part.to_ascii_lowercase()
        } else if part.len() == 2 {
            part.to_ascii_uppercase()
        } else if part.len() == 4 {
            let mut s = part.to_ascii_lowercase();
            s[..1].make_ascii_uppercase();
            s
        } else {
            part.to_string()
        });
    }
    parts.join("-")
}

fn load(locale: &'static str, table: &str) -> Result<Arc<CollationTailoring>, CollationError> {
    let root = root()?;
    let tailoring = CollationTailoring::from_table(table, Some(&*root), locale)?;
    log::debug!("built collation tailoring for {locale}");
    Ok(Arc::new(tailoring))
}

/// Finds the tailoring for `locale`, dropping trailing subtags until one matches. Returns
/// the tailoring and the canonical form of the requested locale.
pub(crate) fn tailoring_for_locale(
    locale: &str,
) -> Result<(Arc<CollationTailoring>, String), CollationError> {
    let requested = canonicalize(locale);
    let mut candidate = requested.clone();

    loop {
        if candidate.is_empty() || candidate == "root" || candidate == "und" {
            if requested != candidate {
                log::debug!("collation locale {requested:?} falls back to root");
            }
            return Ok((root()?, requested));
        }
        if let Some(&(name, table)) = TAILORING_TABLES.iter().find(|(l, _)| *l == candidate) {
            if let Some(cell) = TAILORINGS.get(name) {
                let tailoring = cell.get_or_init(|| load(name, table)).clone()?;
                if requested != candidate {
                    log::debug!("collation locale {requested:?} falls back to {candidate:?}");
                }
                return Ok((tailoring, requested));
            }
        }
        match candidate.rfind('-') {
            Some(i) => candidate.truncate(i),
            None => candidate.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_locale_ids() {
        assert_eq!(canonicalize("fr_ca"), "fr-CA");
        assert_eq!(canonicalize("EN-latn-us"), "en-Latn-US");
        assert_eq!(canonicalize("da-u-co-standard"), "da");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn fallback_strips_subtags() {
        let (t, requested) = tailoring_for_locale("cs-CZ").unwrap();
        assert_eq!(t.locale(), "cs");
        assert_eq!(requested, "cs-CZ");

        let (t, _) = tailoring_for_locale("fr_CA").unwrap();
        assert_eq!(t.locale(), "fr-CA");

        for id in ["fr", "fr-FR", "", "root", "und", "xx-YY"] {
            let (t, _) = tailoring_for_locale(id).unwrap();
            assert!(t.is_root(), "{id}");
        }
    }

    #[test]
    fn tailorings_are_shared() {
        let a = tailoring_for_locale("da").unwrap().0;
        let b = tailoring_for_locale("da-DK").unwrap().0;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&root().unwrap(), &root().unwrap()));
    }

    #[test]
    fn locales_list_root() {
        assert_eq!(available_locales(), vec!["cs", "da", "fr-CA", "root"]);
    }
}
