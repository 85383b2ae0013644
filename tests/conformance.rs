use std::cmp::Ordering;

use unicol_engine::{
    Attribute, AttributeValue, RuleBasedCollator, SpanCondition, UnicodeSet, Utf16Iter,
};

fn ordered_strings(name: &str) -> Vec<String> {
    let path = format!("{}/test-data/{name}", env!("CARGO_MANIFEST_DIR"));
    let test_data = std::fs::read_to_string(path).unwrap();

    let mut strings = Vec::new();
    for line in test_data.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let test_string: String = line
            .split(' ')
            .map(|s| char::from_u32(u32::from_str_radix(s, 16).unwrap()).unwrap())
            .collect();
        strings.push(test_string);
    }
    strings
}

fn conformance(collator: &RuleBasedCollator, strings: &[String]) {
    let mut max_sk: Vec<u8> = Vec::new();

    for (i, s) in strings.iter().enumerate() {
        let sk = collator.sort_key(s).unwrap();
        assert_ne!(sk.cmp(&max_sk), Ordering::Less, "sort key of line {i}: {s:?}");

        if i > 0 {
            let prev = &strings[i - 1];
            let order = collator.compare(prev, s);
            assert_ne!(order, Ordering::Greater, "{prev:?} vs {s:?}");
            assert_eq!(collator.compare(s, prev), order.reverse(), "{s:?} vs {prev:?}");
            assert_eq!(order, max_sk.cmp(&sk), "keys of {prev:?} and {s:?}");

            let (l, r): (Vec<u16>, Vec<u16>) =
                (prev.encode_utf16().collect(), s.encode_utf16().collect());
            assert_eq!(collator.compare_utf16(&l, &r), order, "UTF-16 {prev:?} vs {s:?}");
            let (mut li, mut ri) = (Utf16Iter::new(&l), Utf16Iter::new(&r));
            assert_eq!(collator.compare_iter(&mut li, &mut ri), order, "iter {prev:?} vs {s:?}");
        }

        max_sk = sk;
    }
}

#[test]
fn root_non_ignorable() {
    let collator = RuleBasedCollator::try_new_root().unwrap();
    conformance(&collator, &ordered_strings("root_ordered.txt"));
}

#[test]
fn root_shifted() {
    let mut collator = RuleBasedCollator::try_new_root().unwrap();
    collator
        .set_attribute(Attribute::AlternateHandling, AttributeValue::Shifted)
        .unwrap();
    collator
        .set_attribute(Attribute::Strength, AttributeValue::Quaternary)
        .unwrap();
    conformance(&collator, &ordered_strings("root_ordered.txt"));
}

#[test]
fn root_identical() {
    let mut collator = RuleBasedCollator::try_new_root().unwrap();
    collator
        .set_attribute(Attribute::Strength, AttributeValue::Identical)
        .unwrap();
    conformance(&collator, &ordered_strings("root_ordered.txt"));
}

#[test]
fn root_without_fcd_check() {
    // The data has only characters that are already in FCD.
    let mut collator = RuleBasedCollator::try_new_root().unwrap();
    collator
        .set_attribute(Attribute::NormalizationMode, AttributeValue::Off)
        .unwrap();
    conformance(&collator, &ordered_strings("root_ordered.txt"));
}

#[test]
fn total_order_over_all_pairs() {
    let collator = RuleBasedCollator::try_new("fr-CA").unwrap();
    let strings = ordered_strings("root_ordered.txt");
    for a in &strings {
        assert_eq!(collator.compare(a, a), Ordering::Equal);
        for b in &strings {
            let ab = collator.compare(a, b);
            assert_eq!(collator.compare(b, a), ab.reverse(), "{a:?} vs {b:?}");
            let ka = collator.sort_key(a).unwrap();
            let kb = collator.sort_key(b).unwrap();
            assert_eq!(ka.cmp(&kb), ab, "keys of {a:?} and {b:?}");
        }
    }
}

#[test]
fn french_accent_order() {
    let fr = RuleBasedCollator::try_new("fr_CA").unwrap();
    assert_eq!(fr.compare("côte", "cote"), Ordering::Greater);
    assert_eq!(fr.compare("coté", "côte"), Ordering::Greater);
    assert_eq!(fr.compare("cote", "Cote"), Ordering::Less);

    let mut secondary = fr.clone();
    secondary
        .set_attribute(Attribute::Strength, AttributeValue::Secondary)
        .unwrap();
    assert_eq!(secondary.compare("cote", "Cote"), Ordering::Equal);
}

#[test]
fn tailored_sets_span_text() {
    let cs = RuleBasedCollator::try_new("cs").unwrap();
    let set: UnicodeSet = cs.tailored_set();
    let text: Vec<u16> = "chCHx".encode_utf16().collect();
    assert_eq!(set.span(&text, SpanCondition::Contained), 4);
    assert_eq!(set.span_utf8(b"chCHx", SpanCondition::Contained), 4);
    assert_eq!(set.span(&text, SpanCondition::NotContained), 0);
}

/// Strings with runs of common weights that end right around the points where the key
/// writer starts a new compression byte.
fn long_runs() -> Vec<String> {
    let mut strings = Vec::new();
    for run in [1, 27, 28, 29, 32, 33, 34, 96, 97, 98, 113, 114, 115] {
        let a = "a".repeat(run);
        strings.push(a.clone());
        strings.push(format!("{a}-a"));
        strings.push(format!("{a}-"));
        strings.push(format!("-{a}"));
        strings.push(format!("{a}\u{e9}"));
        strings.push(format!("{a}1a"));
        strings.push(format!("{a}A"));
        strings.push(format!("{a}\u{e0}a"));
        strings.push("\u{e9}".repeat(run));
        strings.push(format!("{}e", "\u{e9}".repeat(run)));
    }
    strings
}

fn keys_order_like_compare(collator: &RuleBasedCollator, strings: &[String]) {
    let keys: Vec<Vec<u8>> = strings
        .iter()
        .map(|s| collator.sort_key(s).unwrap())
        .collect();
    for (a, ka) in strings.iter().zip(&keys) {
        for (b, kb) in strings.iter().zip(&keys) {
            let order = collator.compare(a, b);
            assert_eq!(ka.cmp(kb), order, "{a:?} vs {b:?}");
        }
    }
}

#[test]
fn long_runs_shifted_quaternary() {
    let mut collator = RuleBasedCollator::try_new_root().unwrap();
    collator
        .set_attribute(Attribute::AlternateHandling, AttributeValue::Shifted)
        .unwrap();
    collator
        .set_attribute(Attribute::Strength, AttributeValue::Quaternary)
        .unwrap();
    keys_order_like_compare(&collator, &long_runs());
}

#[test]
fn long_runs_non_ignorable_identical() {
    let mut collator = RuleBasedCollator::try_new_root().unwrap();
    collator
        .set_attribute(Attribute::Strength, AttributeValue::Identical)
        .unwrap();
    keys_order_like_compare(&collator, &long_runs());
}

#[test]
fn long_runs_backward_secondary() {
    let collator = RuleBasedCollator::try_new("fr-CA").unwrap();
    keys_order_like_compare(&collator, &long_runs());

    let mut upper_first = RuleBasedCollator::try_new("da").unwrap();
    upper_first
        .set_attribute(Attribute::FrenchCollation, AttributeValue::On)
        .unwrap();
    keys_order_like_compare(&upper_first, &long_runs());
}
