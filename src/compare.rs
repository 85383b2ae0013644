//! Level-by-level comparison of two CE streams.

use std::cmp::Ordering;

use crate::collation::{MERGE_SEPARATOR_PRIMARY, NO_CE_PRIMARY, NO_CE_WEIGHT16};
use crate::iter::CollationIterator;
use crate::settings::{AlternateHandling, CollationSettings, Strength};
use crate::text::CodePointSource;

/// Reads primaries until a non-ignorable, non-variable one. Variable CEs are reduced to
/// their primary for the quaternary level and the primary ignorables after them are
/// cleared.
fn next_primary<S: CodePointSource>(
    iter: &mut CollationIterator<S>,
    variable_top: u32,
    any_variable: &mut bool,
) -> u32 {
    loop {
        let mut ce = iter.next_ce();
        let mut p = (ce >> 32) as u32;
        if p < variable_top && p > MERGE_SEPARATOR_PRIMARY {
            *any_variable = true;
            loop {
                iter.set_current_ce(ce & 0xffff_ffff_0000_0000);
                loop {
                    ce = iter.next_ce();
                    p = (ce >> 32) as u32;
                    if p == 0 {
                        iter.set_current_ce(0);
                    } else {
                        break;
                    }
                }
                if !(p < variable_top && p > MERGE_SEPARATOR_PRIMARY) {
                    break;
                }
            }
        }
        if p != 0 {
            return p;
        }
    }
}

pub(crate) fn compare_up_to_quaternary<L: CodePointSource, R: CodePointSource>(
    left: &mut CollationIterator<L>,
    right: &mut CollationIterator<R>,
    settings: &CollationSettings,
) -> Ordering {
    let options = settings.options;
    let variable_top = match settings.alternate_handling() {
        AlternateHandling::NonIgnorable => 0,
        // +1 so that "<" works and primary ignorables test out early.
        AlternateHandling::Shifted => settings.variable_top() + 1,
    };
    let mut any_variable = false;

    // Primary level; this also fills both CE buffers.
    loop {
        let mut lp = next_primary(left, variable_top, &mut any_variable);
        let mut rp = next_primary(right, variable_top, &mut any_variable);
        if lp != rp {
            if settings.has_reordering() {
                lp = settings.reorder(lp);
                rp = settings.reorder(rp);
            }
            return lp.cmp(&rp);
        }
        if lp == NO_CE_PRIMARY {
            break;
        }
    }

    let strength = settings.strength();

    if strength >= Strength::Secondary {
        let result = if settings.has_backward_secondary() {
            compare_backward_secondary(left, right)
        } else {
            compare_secondary(left, right)
        };
        if result != Ordering::Equal {
            return result;
        }
    }

    if options & CollationSettings::CASE_LEVEL != 0 {
        let result = compare_case_level(left, right, strength, options);
        if result != Ordering::Equal {
            return result;
        }
    }
    if strength <= Strength::Secondary {
        return Ordering::Equal;
    }

    let tertiary_mask = settings.tertiary_mask();
    let upper_first = tertiary_mask & 0x8000 != 0 && options & CollationSettings::UPPER_FIRST != 0;
    let mut any_quaternaries = 0u32;
    let (mut li, mut ri) = (0, 0);
    loop {
        let (ll, mut lt) = next_tertiary(left, &mut li, tertiary_mask, &mut any_quaternaries);
        let (rl, mut rt) = next_tertiary(right, &mut ri, tertiary_mask, &mut any_quaternaries);
        if lt != rt {
            if upper_first {
                lt = flip_case_for_upper_first(lt, ll);
                rt = flip_case_for_upper_first(rt, rl);
            }
            return lt.cmp(&rt);
        }
        if lt == NO_CE_WEIGHT16 {
            break;
        }
    }
    if strength <= Strength::Tertiary {
        return Ordering::Equal;
    }

    if !any_variable && any_quaternaries & 0xc0 == 0 {
        return Ordering::Equal;
    }

    let (mut li, mut ri) = (0, 0);
    loop {
        let mut lq;
        loop {
            let ce = left.get_ce(li);
            li += 1;
            lq = quaternary_weight(ce);
            if lq != 0 {
                break;
            }
        }
        let mut rq;
        loop {
            let ce = right.get_ce(ri);
            ri += 1;
            rq = quaternary_weight(ce);
            if rq != 0 {
                break;
            }
        }
        if lq != rq {
            if settings.has_reordering() {
                lq = settings.reorder(lq);
                rq = settings.reorder(rq);
            }
            return lq.cmp(&rq);
        }
        if lq == NO_CE_PRIMARY {
            break;
        }
    }
    Ordering::Equal
}

/// Lower 32 bits and masked tertiary weight of the next CE that has one.
fn next_tertiary<S: CodePointSource>(
    iter: &CollationIterator<S>,
    i: &mut usize,
    mask: u32,
    any_quaternaries: &mut u32,
) -> (u32, u32) {
    loop {
        let lower = iter.get_ce(*i) as u32;
        *i += 1;
        *any_quaternaries |= lower;
        let t = lower & mask;
        if t != 0 {
            return (lower, t);
        }
    }
}

/// Inverts the case bits of regular CEs. NO_CE passes through and tertiary CEs keep
/// their artificial uppercase above everything else.
fn flip_case_for_upper_first(t: u32, lower32: u32) -> u32 {
    if t <= NO_CE_WEIGHT16 {
        t
    } else if lower32 > 0xffff {
        t ^ 0xc000
    } else {
        t + 0x4000
    }
}

/// Variable CEs and `NO_CE` compare by primary; regular CEs keep only their quaternary
/// bits, above any primary.
fn quaternary_weight(ce: u64) -> u32 {
    let q = (ce as u32) & 0xffff;
    if q <= NO_CE_WEIGHT16 {
        (ce >> 32) as u32
    } else {
        q | 0xffff_ff3f
    }
}

fn compare_secondary<L: CodePointSource, R: CodePointSource>(
    left: &mut CollationIterator<L>,
    right: &mut CollationIterator<R>,
) -> Ordering {
    let (mut li, mut ri) = (0, 0);
    loop {
        let mut ls;
        loop {
            ls = (left.get_ce(li) as u32) >> 16;
            li += 1;
            if ls != 0 {
                break;
            }
        }
        let mut rs;
        loop {
            rs = (right.get_ce(ri) as u32) >> 16;
            ri += 1;
            if rs != 0 {
                break;
            }
        }
        if ls != rs {
            return ls.cmp(&rs);
        }
        if ls == NO_CE_WEIGHT16 {
            return Ordering::Equal;
        }
    }
}

/// Secondary weights compared from the end of each segment. Segments are separated by
/// the merge separator, and both texts have the same number of them once the primary
/// level is equal.
fn compare_backward_secondary<L: CodePointSource, R: CodePointSource>(
    left: &mut CollationIterator<L>,
    right: &mut CollationIterator<R>,
) -> Ordering {
    let (mut left_start, mut right_start) = (0, 0);
    loop {
        let (left_limit, p) = segment_limit(left, left_start);
        let (right_limit, _) = segment_limit(right, right_start);

        let (mut li, mut ri) = (left_limit, right_limit);
        loop {
            let mut ls = 0;
            while ls == 0 && li > left_start {
                li -= 1;
                ls = (left.get_ce(li) as u32) >> 16;
            }
            let mut rs = 0;
            while rs == 0 && ri > right_start {
                ri -= 1;
                rs = (right.get_ce(ri) as u32) >> 16;
            }
            if ls != rs {
                return ls.cmp(&rs);
            }
            if ls == 0 {
                break;
            }
        }

        if p == NO_CE_PRIMARY {
            return Ordering::Equal;
        }
        left_start = left_limit + 1;
        right_start = right_limit + 1;
    }
}

/// Index of the next merge separator or `NO_CE` at or after `start`, and its primary.
fn segment_limit<S: CodePointSource>(iter: &CollationIterator<S>, start: usize) -> (usize, u32) {
    let mut limit = start;
    loop {
        let p = (iter.get_ce(limit) >> 32) as u32;
        if p > MERGE_SEPARATOR_PRIMARY || p == 0 {
            limit += 1;
        } else {
            return (limit, p);
        }
    }
}

/// Case bits of each CE that has weights on the level above: primary CEs at primary
/// strength, otherwise all but secondary ignorables. Variable CEs were reduced to a
/// primary and have no case.
fn compare_case_level<L: CodePointSource, R: CodePointSource>(
    left: &mut CollationIterator<L>,
    right: &mut CollationIterator<R>,
    strength: Strength,
    options: u32,
) -> Ordering {
    fn next_case<S: CodePointSource>(
        iter: &CollationIterator<S>,
        i: &mut usize,
        strength: Strength,
    ) -> u32 {
        loop {
            let ce = iter.get_ce(*i);
            *i += 1;
            let lower = ce as u32;
            let skip = if strength == Strength::Primary {
                (ce >> 32) == 0 || lower == 0
            } else {
                lower <= 0xffff
            };
            if !skip {
                return lower;
            }
        }
    }

    let (mut li, mut ri) = (0, 0);
    loop {
        let ll = next_case(left, &mut li, strength);
        let rl = next_case(right, &mut ri, strength);
        let (lc, rc) = (ll & 0xc000, rl & 0xc000);
        if lc != rc {
            return if options & CollationSettings::UPPER_FIRST == 0 {
                lc.cmp(&rc)
            } else {
                rc.cmp(&lc)
            };
        }
        if ll >> 16 == NO_CE_WEIGHT16 {
            return Ordering::Equal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::FcdSource;
    use crate::root;
    use crate::settings::CaseFirst;
    use crate::text::Utf16Source;

    fn compare(settings: &CollationSettings, a: &str, b: &str) -> Ordering {
        let data = root::root_data().unwrap();
        let a: Vec<u16> = a.encode_utf16().collect();
        let b: Vec<u16> = b.encode_utf16().collect();
        let mut l = CollationIterator::new(data, FcdSource::new(Utf16Source::new(&a)), false);
        let mut r = CollationIterator::new(data, FcdSource::new(Utf16Source::new(&b)), false);
        compare_up_to_quaternary(&mut l, &mut r, settings)
    }

    fn default_settings() -> CollationSettings {
        CollationSettings::new(root::root_data().unwrap())
    }

    #[test]
    fn three_levels() {
        let s = default_settings();
        assert_eq!(compare(&s, "a", "b"), Ordering::Less);
        assert_eq!(compare(&s, "cote", "côte"), Ordering::Less);
        assert_eq!(compare(&s, "côte", "Cote"), Ordering::Greater);
        assert_eq!(compare(&s, "cote", "Cote"), Ordering::Less);
        assert_eq!(compare(&s, "a", "a\u{ad}"), Ordering::Equal);
    }

    #[test]
    fn backward_secondary() {
        let mut s = default_settings();
        s.set_flag(CollationSettings::BACKWARD_SECONDARY, Some(true), 0);
        // Accents compare from the end: "cotê" has its accent last.
        assert_eq!(compare(&s, "côte", "coté"), Ordering::Less);
        let forward = default_settings();
        assert_eq!(compare(&forward, "côte", "coté"), Ordering::Greater);
        // Segments around U+FFFE are reversed separately.
        assert_eq!(compare(&s, "é\u{fffe}e", "e\u{fffe}é"), Ordering::Greater);
    }

    #[test]
    fn case_level_and_case_first() {
        let mut s = default_settings();
        s.set_strength(Some(Strength::Primary), 0);
        s.set_flag(CollationSettings::CASE_LEVEL, Some(true), 0);
        assert_eq!(compare(&s, "a", "A"), Ordering::Less);
        assert_eq!(compare(&s, "a", "á"), Ordering::Equal);

        s.set_case_first(Some(CaseFirst::UpperFirst), 0);
        assert_eq!(compare(&s, "a", "A"), Ordering::Greater);

        let mut t = default_settings();
        t.set_case_first(Some(CaseFirst::UpperFirst), 0);
        assert_eq!(compare(&t, "a", "A"), Ordering::Greater);
        assert_eq!(compare(&t, "ab", "Ab"), Ordering::Greater);
    }

    #[test]
    fn shifted_quaternary() {
        let mut s = default_settings();
        s.set_alternate_handling(Some(AlternateHandling::Shifted), 0);
        assert_eq!(compare(&s, "a-b", "ab"), Ordering::Equal);
        s.set_strength(Some(Strength::Quaternary), 0);
        assert_eq!(compare(&s, "a-b", "ab"), Ordering::Less);
        assert_eq!(compare(&s, "a b", "a-b"), Ordering::Less);
        assert_eq!(compare(&s, "ab", "ab"), Ordering::Equal);
    }
}
