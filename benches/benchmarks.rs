use criterion::{criterion_group, criterion_main, Criterion};
use std::cmp::Ordering;
use unicol_engine::{Attribute, AttributeValue, RuleBasedCollator};

fn ordered_strings() -> Vec<String> {
    let test_data = std::fs::read_to_string("test-data/root_ordered.txt").unwrap();

    test_data
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.split(' ')
                .map(|s| char::from_u32(u32::from_str_radix(s, 16).unwrap()).unwrap())
                .collect()
        })
        .collect()
}

fn sort_keys(collator: &RuleBasedCollator, strings: &[String]) {
    let mut max_sk: Vec<u8> = Vec::new();

    for s in strings {
        let sk = collator.sort_key(s).unwrap();
        if sk < max_sk {
            panic!();
        }
        max_sk = sk;
    }
}

fn compare_neighbors(collator: &RuleBasedCollator, strings: &[String]) {
    for pair in strings.windows(2) {
        if collator.compare(&pair[0], &pair[1]) == Ordering::Greater {
            panic!();
        }
    }
}

fn root_compare(c: &mut Criterion) {
    let collator = RuleBasedCollator::try_new_root().unwrap();
    let strings = ordered_strings();
    c.bench_function("root, compare", |b| {
        b.iter(|| compare_neighbors(&collator, &strings))
    });
}

fn root_sort_keys(c: &mut Criterion) {
    let collator = RuleBasedCollator::try_new_root().unwrap();
    let strings = ordered_strings();
    c.bench_function("root, sort keys", |b| {
        b.iter(|| sort_keys(&collator, &strings))
    });
}

fn shifted_compare(c: &mut Criterion) {
    let mut collator = RuleBasedCollator::try_new_root().unwrap();
    collator
        .set_attribute(Attribute::AlternateHandling, AttributeValue::Shifted)
        .unwrap();
    let strings = ordered_strings();
    c.bench_function("root shifted, compare", |b| {
        b.iter(|| compare_neighbors(&collator, &strings))
    });
}

fn latin_words(c: &mut Criterion) {
    let collator = RuleBasedCollator::try_new_root().unwrap();
    let words = ["résumé", "resume", "Resume", "résister", "rester", "Reste"];
    c.bench_function("root, Latin words", |b| {
        b.iter(|| {
            let mut sorted = words;
            sorted.sort_by(|a, b| collator.compare(a, b));
            sorted
        })
    });
}

criterion_group!(benches, root_compare, root_sort_keys, shifted_compare, latin_words);
criterion_main!(benches);
