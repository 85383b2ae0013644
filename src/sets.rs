//! Code point and string sets derived from collation data.

use std::collections::HashSet;

use crate::data::{CollationData, Mapping};
use crate::uniset::UnicodeSet;

fn to_string(cps: impl IntoIterator<Item = u32>) -> String {
    cps.into_iter().filter_map(char::from_u32).collect()
}

fn add_sequence(set: &mut UnicodeSet, starter: u32, suffix: &[u32]) {
    let s = to_string(std::iter::once(starter).chain(suffix.iter().copied()));
    set.add_string(&s);
}

/// Code points and strings whose mappings differ from the root. Empty for the root.
pub(crate) fn tailored_set(data: &CollationData) -> UnicodeSet {
    let mut set = UnicodeSet::new();
    let base = match data.base() {
        Some(base) => base,
        None => return set,
    };

    for (c, mapping) in data.own_code_points() {
        let inherited = base.lookup(c);
        match mapping {
            Mapping::Contraction(contraction) => {
                let (base_default, base_contraction) = match inherited {
                    Some(Mapping::Contraction(b)) => (b.default.as_ref(), Some(b)),
                    other => (other, None),
                };
                if contraction.default.as_ref() != base_default {
                    set.add(c);
                }
                for (suffix, m) in &contraction.suffixes {
                    if base_contraction.and_then(|b| b.get(suffix)) != Some(m) {
                        add_sequence(&mut set, c, suffix);
                    }
                }
            }
            _ => {
                if inherited != Some(mapping) {
                    set.add(c);
                }
            }
        }
    }
    set
}

fn collect_contractions_and_expansions(
    data: &CollationData,
    seen: &mut HashSet<u32>,
    contractions: &mut UnicodeSet,
    expansions: &mut UnicodeSet,
) {
    for (c, mapping) in data.own_code_points() {
        if !seen.insert(c) {
            continue;
        }
        match mapping {
            Mapping::Contraction(contraction) => {
                if contraction.default.as_ref().map_or(0, |m| m.ces().len()) > 1 {
                    expansions.add(c);
                }
                for (suffix, m) in &contraction.suffixes {
                    add_sequence(contractions, c, suffix);
                    if m.ces().len() > 1 {
                        add_sequence(expansions, c, suffix);
                    }
                }
            }
            Mapping::Expansion(ces) if ces.len() > 1 => expansions.add(c),
            _ => {}
        }
    }
}

/// Strings that are contractions, and code points or strings that map to more than one
/// collation element. A tailoring's own mappings hide the root's for the same starter.
pub(crate) fn contractions_and_expansions(data: &CollationData) -> (UnicodeSet, UnicodeSet) {
    let mut contractions = UnicodeSet::new();
    let mut expansions = UnicodeSet::new();
    let mut seen = HashSet::new();
    collect_contractions_and_expansions(data, &mut seen, &mut contractions, &mut expansions);
    if let Some(base) = data.base() {
        collect_contractions_and_expansions(base, &mut seen, &mut contractions, &mut expansions);
    }
    (contractions, expansions)
}
