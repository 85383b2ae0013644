//! Compiles text weight tables into [`CollationData`].
//!
//! A table has one mapping per line:
//!
//! ```text
//! 0063 0068 ; [.293D.05.05]              # a contraction
//! 00DF      ; [.297C.05.1F][.297C.05.1F] # an expansion
//! 0030      ; [.0A10.05.05] ; 0          # a decimal digit
//! 0000..0008 ; [.0000.00.00]             # a range of ignorables
//! ```
//!
//! and `@` directives for the version, script groups and default settings.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::collation::{make_ce, primary, primary_length, COMMON_BYTE};
use crate::data::{CollationData, Contraction, Mapping, ScriptGroup};
use crate::error::CollationError;
use crate::fast_latin::FastLatinTable;
use crate::normalizer::nfd;
use crate::settings::{reorder_code, CaseFirst};
use crate::text::is_surrogate;

macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: OnceCell<Regex> = OnceCell::new();
        RE.get_or_init(|| Regex::new($re).unwrap())
    }};
}

//
// Parsed tables
//

/// Default settings requested by a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TableOptions {
    pub(crate) backwards: bool,
    pub(crate) case_first: Option<CaseFirst>,
    pub(crate) shifted: bool,
    pub(crate) numeric: bool,
    pub(crate) case_level: bool,
    pub(crate) reorder: Vec<i32>,
}

#[derive(Debug, Clone)]
struct Entry {
    line: usize,
    cps: Vec<u32>,
    mapping: Mapping,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ParsedTable {
    entries: Vec<Entry>,
    groups: Vec<ScriptGroup>,
    compressible: Vec<u8>,
    numeric_primary: Option<u32>,
    pub(crate) version: [u8; 2],
    pub(crate) options: TableOptions,
}

fn invalid(line: usize, what: impl Display) -> CollationError {
    log::warn!("weight table line {line}: {what}");
    CollationError::InvalidData(format!("line {line}: {what}"))
}

/// Reorder code for a group name in `@group` and `@reorder` lines.
fn reorder_code_for_name(name: &str) -> Option<i32> {
    Some(match name {
        "space" => reorder_code::SPACE,
        "punct" => reorder_code::PUNCTUATION,
        "symbol" => reorder_code::SYMBOL,
        "currency" => reorder_code::CURRENCY,
        "digit" => reorder_code::DIGIT,
        "others" | "Zzzz" => reorder_code::OTHERS,
        "Latn" => reorder_code::LATIN,
        "Grek" => reorder_code::GREEK,
        "Copt" => reorder_code::COPTIC,
        "Cyrl" => reorder_code::CYRILLIC,
        "Hani" => reorder_code::HAN,
        "Tang" => reorder_code::TANGUT,
        "Nshu" => reorder_code::NUSHU,
        "Kits" => reorder_code::KHITAN_SMALL_SCRIPT,
        _ => return None,
    })
}

fn parse_hex_byte(line: usize, s: &str) -> Result<u8, CollationError> {
    if s.len() != 2 {
        return Err(invalid(line, format!("expected a hex byte, found {s:?}")));
    }
    u8::from_str_radix(s, 16).map_err(|_| invalid(line, format!("bad hex byte {s:?}")))
}

fn parse_code_point(line: usize, s: &str) -> Result<u32, CollationError> {
    let re = regex!(r"^[\dA-F]{4,6}$");
    if !re.is_match(s) {
        return Err(invalid(line, format!("bad code point {s:?}")));
    }
    let c = u32::from_str_radix(s, 16).map_err(|_| invalid(line, "bad code point"))?;
    if c > 0x10_ffff || is_surrogate(c) {
        return Err(invalid(line, format!("{c:04X} is not a scalar value")));
    }
    if (0xfffd..=0xffff).contains(&c) {
        return Err(invalid(line, format!("{c:04X} has a fixed weight")));
    }
    Ok(c)
}

/// Either `XXXX..YYYY` or a space-separated code point sequence.
fn parse_code_points(line: usize, field: &str) -> Result<Vec<Vec<u32>>, CollationError> {
    if let Some((start, end)) = field.split_once("..") {
        let start = parse_code_point(line, start.trim())?;
        let end = parse_code_point(line, end.trim())?;
        if start > end {
            return Err(invalid(line, "empty code point range"));
        }
        return Ok((start..=end).map(|c| vec![c]).collect());
    }

    let cps = field
        .split_whitespace()
        .map(|s| parse_code_point(line, s))
        .collect::<Result<Vec<u32>, _>>()?;
    if cps.is_empty() {
        return Err(invalid(line, "no code points"));
    }
    Ok(vec![cps])
}

/// Left-aligned primary: "29" is 0x29000000, "0A10" is 0x0A100000.
fn parse_primary(line: usize, hex: &str) -> Result<u32, CollationError> {
    if hex.is_empty() || hex.len() % 2 != 0 || hex.len() > 8 {
        return Err(invalid(line, format!("bad primary {hex:?}")));
    }
    let value = u32::from_str_radix(hex, 16).map_err(|_| invalid(line, "bad primary"))?;
    let p = value << (32 - 4 * hex.len() as u32);
    if p == 0 {
        return Ok(0);
    }
    let bytes = p.to_be_bytes();
    if bytes[..primary_length(p)].iter().any(|&b| b < 2) {
        return Err(invalid(line, format!("primary {p:08X} has a byte below 02")));
    }
    Ok(p)
}

fn parse_ces(line: usize, field: &str) -> Result<Vec<u64>, CollationError> {
    let re_ce = regex!(r"\[([*.])([\dA-F]*)\.([\dA-F]{2})\.([\dA-F]{2})\]");
    let field = field.trim();

    let mut ces = Vec::new();
    let mut consumed = 0;
    for cap in re_ce.captures_iter(field) {
        consumed += cap[0].len();
        let variable = &cap[1] == "*";
        let p = parse_primary(line, &cap[2])?;
        let s = u32::from(parse_hex_byte(line, &cap[3])?);
        let t = u32::from(parse_hex_byte(line, &cap[4])?);

        if p == 0 && s == 0 && t == 0 {
            if variable {
                return Err(invalid(line, "an ignorable element cannot be variable"));
            }
            ces.push(0);
            continue;
        }
        if variable && p == 0 {
            return Err(invalid(line, "a variable element needs a primary weight"));
        }
        if s == 0 {
            return Err(invalid(line, "secondary weight 00 on a non-ignorable element"));
        }
        if s != COMMON_BYTE && s <= 0x45 {
            return Err(invalid(line, format!("secondary {s:02X} is reserved")));
        }
        let case_bits = t >> 6;
        if t & 0x3f < 2 || case_bits == 3 {
            return Err(invalid(line, format!("bad tertiary {t:02X}")));
        }
        if p == 0 && case_bits != 0 {
            return Err(invalid(line, "a primary ignorable cannot carry case bits"));
        }
        ces.push(make_ce(p, (s << 24) | (t << 8)));
    }

    if ces.is_empty() || consumed != field.len() {
        return Err(invalid(line, format!("bad collation elements {field:?}")));
    }
    Ok(ces)
}

fn parse_group(line: usize, args: &[&str]) -> Result<ScriptGroup, CollationError> {
    let (range, names) = args
        .split_first()
        .ok_or_else(|| invalid(line, "@group needs a byte range"))?;
    let (first, last) = match range.split_once('-') {
        Some((a, b)) => (parse_hex_byte(line, a)?, parse_hex_byte(line, b)?),
        None => {
            let b = parse_hex_byte(line, range)?;
            (b, b)
        }
    };
    if first < 3 || first > last || last == 0xff {
        return Err(invalid(line, "bad group byte range"));
    }
    if names.is_empty() {
        return Err(invalid(line, "@group needs names"));
    }
    let codes = names
        .iter()
        .map(|n| reorder_code_for_name(n).ok_or_else(|| invalid(line, format!("unknown group {n}"))))
        .collect::<Result<Vec<i32>, _>>()?;
    Ok(ScriptGroup {
        codes,
        first_byte: first,
        last_byte: last,
    })
}

fn parse_directive(table: &mut ParsedTable, line: usize, text: &str) -> Result<(), CollationError> {
    let mut words = text.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let no_args = |table: &mut ParsedTable, set: fn(&mut TableOptions)| {
        if args.is_empty() {
            set(&mut table.options);
            Ok(())
        } else {
            Err(invalid(line, format!("{name} takes no arguments")))
        }
    };

    match name {
        "@version" => {
            let (major, minor) = args
                .first()
                .and_then(|v| v.split_once('.'))
                .ok_or_else(|| invalid(line, "@version needs major.minor"))?;
            let major = major.parse().map_err(|_| invalid(line, "bad major version"))?;
            let minor = minor.parse().map_err(|_| invalid(line, "bad minor version"))?;
            table.version = [major, minor];
            Ok(())
        }
        "@group" => {
            let group = parse_group(line, &args)?;
            table.groups.push(group);
            Ok(())
        }
        "@compressible" => {
            for a in &args {
                table.compressible.push(parse_hex_byte(line, a)?);
            }
            Ok(())
        }
        "@numeric-primary" => {
            let b = args
                .first()
                .ok_or_else(|| invalid(line, "@numeric-primary needs a byte"))?;
            table.numeric_primary = Some(u32::from(parse_hex_byte(line, b)?) << 24);
            Ok(())
        }
        "@reorder" => {
            for a in &args {
                let code =
                    reorder_code_for_name(a).ok_or_else(|| invalid(line, format!("unknown group {a}")))?;
                table.options.reorder.push(code);
            }
            Ok(())
        }
        "@backwards" => no_args(table, |o| o.backwards = true),
        "@upper-first" => no_args(table, |o| o.case_first = Some(CaseFirst::UpperFirst)),
        "@lower-first" => no_args(table, |o| o.case_first = Some(CaseFirst::LowerFirst)),
        "@shifted" => no_args(table, |o| o.shifted = true),
        "@numeric" => no_args(table, |o| o.numeric = true),
        "@case-level" => no_args(table, |o| o.case_level = true),
        _ => Err(invalid(line, format!("unknown directive {name}"))),
    }
}

pub(crate) fn parse_table(text: &str) -> Result<ParsedTable, CollationError> {
    let mut table = ParsedTable::default();

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        if content.starts_with('@') {
            parse_directive(&mut table, line, content)?;
            continue;
        }

        let mut fields = content.split(';');
        let cps_field = fields.next().unwrap_or_default();
        let ces_field = fields
            .next()
            .ok_or_else(|| invalid(line, "missing collation elements"))?;
        let digit_field = fields.next().map(str::trim);
        if fields.next().is_some() {
            return Err(invalid(line, "too many fields"));
        }

        let sequences = parse_code_points(line, cps_field)?;
        let ces = parse_ces(line, ces_field)?;

        let mapping = match digit_field {
            Some(d) => {
                let value: u8 = d
                    .parse()
                    .ok()
                    .filter(|v| *v <= 9)
                    .ok_or_else(|| invalid(line, format!("bad digit value {d:?}")))?;
                if sequences.len() != 1 || sequences[0].len() != 1 || ces.len() != 1 {
                    return Err(invalid(line, "a digit maps one code point to one element"));
                }
                if primary(ces[0]) == 0 {
                    return Err(invalid(line, "a digit needs a primary weight"));
                }
                Mapping::Digit { value, ce: ces[0] }
            }
            None if ces.len() == 1 => Mapping::Ce(ces[0]),
            None => Mapping::Expansion(ces),
        };

        for cps in sequences {
            table.entries.push(Entry {
                line,
                cps,
                mapping: mapping.clone(),
            });
        }
    }

    Ok(table)
}

//
// Building
//

fn check_groups(groups: &[ScriptGroup]) -> Result<(), CollationError> {
    if groups.is_empty() {
        return Err(CollationError::InvalidData("root table has no groups".to_string()));
    }
    for pair in groups.windows(2) {
        if pair[0].last_byte >= pair[1].first_byte {
            return Err(CollationError::InvalidData(format!(
                "group {:02X} overlaps or precedes group {:02X}",
                pair[1].first_byte, pair[0].first_byte
            )));
        }
    }
    Ok(())
}

fn insert_single(data: &mut CollationData, c: u32, mapping: Mapping) {
    match data.mappings.get_mut(&c) {
        Some(Mapping::Contraction(contraction)) => contraction.default = Some(mapping),
        _ => {
            data.mappings.insert(c, mapping);
        }
    }
}

/// Adds `cps[1..]` as a suffix of the starter `cps[0]`. A starter the table did not map
/// itself keeps the base's mapping and suffixes.
fn insert_contraction(data: &mut CollationData, base: Option<&CollationData>, cps: &[u32], mapping: Mapping) {
    let starter = cps[0];
    let suffix = cps[1..].to_vec();

    match data.mappings.get_mut(&starter) {
        Some(Mapping::Contraction(contraction)) => contraction.insert(suffix, mapping),
        Some(other) => {
            let mut contraction = Contraction {
                default: Some(other.clone()),
                suffixes: Vec::new(),
            };
            contraction.insert(suffix, mapping);
            *other = Mapping::Contraction(Box::new(contraction));
        }
        None => {
            let mut contraction = match base.and_then(|b| b.lookup(starter)) {
                Some(Mapping::Contraction(inherited)) => (**inherited).clone(),
                Some(m) => Contraction {
                    default: Some(m.clone()),
                    suffixes: Vec::new(),
                },
                None => Contraction::default(),
            };
            contraction.insert(suffix, mapping);
            data.mappings
                .insert(starter, Mapping::Contraction(Box::new(contraction)));
        }
    }
}

fn compute_unsafe_backward(data: &mut CollationData) {
    let mut unsafe_cps = Vec::new();
    for (c, mapping) in data.own_code_points() {
        if let Mapping::Contraction(contraction) = mapping {
            for (suffix, _) in &contraction.suffixes {
                unsafe_cps.extend_from_slice(suffix);
            }
        }
        // A primary ignorable can be reordered around its neighbors.
        if matches!(mapping.ces().first(), Some(&ce) if ce != 0 && primary(ce) == 0) {
            unsafe_cps.push(c);
        }
    }
    for c in unsafe_cps {
        data.unsafe_backward.add(c);
    }
}

/// Builds collation data from a parsed table. Tailorings inherit everything they do not
/// map from `base`, which must be the root data.
pub(crate) fn build_data(
    table: &ParsedTable,
    base: Option<&Arc<CollationData>>,
) -> Result<CollationData, CollationError> {
    let mut data = CollationData::new();

    match base {
        Some(base) => {
            if !table.groups.is_empty() || !table.compressible.is_empty() || table.numeric_primary.is_some() {
                return Err(CollationError::InvalidData(
                    "only the root table defines groups and lead bytes".to_string(),
                ));
            }
            data.compressible = base.compressible.clone();
            data.numeric_primary = base.numeric_primary;
            data.set_base(Arc::clone(base));
        }
        None => {
            check_groups(&table.groups)?;
            data.groups = table.groups.clone();
            for &b in &table.compressible {
                data.compressible[b as usize] = true;
            }
            data.numeric_primary = table
                .numeric_primary
                .ok_or_else(|| CollationError::InvalidData("root table has no @numeric-primary".to_string()))?;
        }
    }

    for entry in &table.entries {
        for &ce in entry.mapping.ces() {
            let p = primary(ce);
            let second = (p >> 16) & 0xff;
            if p != 0 && data.is_compressible(p >> 24) && !(4..=0xfe).contains(&second) {
                return Err(invalid(
                    entry.line,
                    format!("primary {p:08X} has a compressible lead byte and second byte {second:02X}"),
                ));
            }
        }
    }

    let explicit: HashSet<&[u32]> = table.entries.iter().map(|e| e.cps.as_slice()).collect();
    let mut contractions: Vec<(Vec<u32>, Mapping)> = Vec::new();
    for entry in &table.entries {
        if entry.cps.len() == 1 {
            insert_single(&mut data, entry.cps[0], entry.mapping.clone());
        } else {
            contractions.push((entry.cps.clone(), entry.mapping.clone()));
        }
    }

    // Canonical closure: decomposed text that does not start with a mapped precomposed
    // character must reach the same mapping.
    for entry in &table.entries {
        let decomposed = nfd(&entry.cps);
        if decomposed != entry.cps && decomposed.len() > 1 && !explicit.contains(decomposed.as_slice()) {
            contractions.push((decomposed, entry.mapping.clone()));
        }
    }

    let base_data = base.map(|b| b.as_ref());
    let contraction_count = contractions.len();
    for (cps, mapping) in contractions {
        insert_contraction(&mut data, base_data, &cps, mapping);
    }

    compute_unsafe_backward(&mut data);
    data.fast_latin = FastLatinTable::build(&data);

    log::debug!(
        "built collation data: {} mappings, {} contraction entries, fast Latin {}",
        data.mappings.len(),
        contraction_count,
        if data.fast_latin.is_some() { "on" } else { "off" },
    );

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI_ROOT: &str = "\
@version 2.3
@group 05 space
@group 06 punct
@group 29 Latn
@compressible 29
@numeric-primary 0A

0020 ; [*0510.05.05]
0030 ; [.0A10.05.05] ; 0
0061 ; [.2910.05.05]
0062 ; [.2914.05.05]
0301 ; [.0000.88.05]
00DF ; [.2920.05.1F][.2920.05.1F] # sharp s
";

    #[test]
    fn parses_entries_and_directives() {
        let table = parse_table(MINI_ROOT).unwrap();
        assert_eq!(table.version, [2, 3]);
        assert_eq!(table.groups.len(), 3);
        assert_eq!(table.numeric_primary, Some(0x0a00_0000));
        assert_eq!(table.entries.len(), 6);
        assert_eq!(
            table.entries[1].mapping,
            Mapping::Digit {
                value: 0,
                ce: 0x0a10_0000_0500_0500
            }
        );
        assert!(matches!(table.entries[5].mapping, Mapping::Expansion(ref ces) if ces.len() == 2));
    }

    #[test]
    fn ranges_expand_to_single_code_points() {
        let table = parse_table("0000..0003 ; [.0000.00.00]\n").unwrap();
        let cps: Vec<Vec<u32>> = table.entries.iter().map(|e| e.cps.clone()).collect();
        assert_eq!(cps, vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn rejects_malformed_lines() {
        let bad = [
            "0061 ; [.2910.05.05",
            "0061 ; [.2910.03.05]",
            "0061 ; [.2910.05.C5]",
            "0061 ; [.2900100.05.05]",
            "0061 ; [*0000.88.05]",
            "0061 ; [.0000.88.85]",
            "0061 0062 ; [.2910.05.05] ; 1",
            "D800 ; [.2910.05.05]",
            "FFFE ; [.2910.05.05]",
            "@frobnicate",
            "@backwards now",
        ];
        for line in bad {
            assert!(
                matches!(parse_table(line), Err(CollationError::InvalidData(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn errors_name_the_line() {
        let err = parse_table("# header\n\n0061 ; [.29.05.05]\n0062 ; nonsense\n").unwrap_err();
        assert_eq!(
            err,
            CollationError::InvalidData("line 4: bad collation elements \"nonsense\"".to_string())
        );
    }

    #[test]
    fn compressible_primaries_need_a_second_byte() {
        let table = parse_table(&format!("{MINI_ROOT}0063 ; [.29.05.05]\n")).unwrap();
        assert!(build_data(&table, None).is_err());
    }

    #[test]
    fn builds_a_root() {
        let table = parse_table(MINI_ROOT).unwrap();
        let data = build_data(&table, None).unwrap();
        assert!(data.is_compressible(0x29));
        assert!(data.is_digit(0x30));
        assert!(data.is_unsafe_backward(0x301, false));
        assert_eq!(data.lookup(0x61), Some(&Mapping::Ce(0x2910_0000_0500_0500)));
    }

    #[test]
    fn contractions_keep_the_starter_mapping() {
        let root_arc = Arc::new(
            build_data(&parse_table(include_str!("tables/root.txt")).unwrap(), None).unwrap(),
        );
        let table = parse_table("0063 0068 ; [.293D.05.05]\n").unwrap();
        let data = build_data(&table, Some(&root_arc)).unwrap();

        match data.own_mapping(0x63) {
            Some(Mapping::Contraction(c)) => {
                assert_eq!(c.default.as_ref(), root_arc.lookup(0x63));
                assert_eq!(c.get(&[0x68]), Some(&Mapping::Ce(0x293d_0000_0500_0500)));
            }
            other => panic!("unexpected mapping {other:?}"),
        }
        assert!(data.is_unsafe_backward(0x68, false));
        assert!(data.fast_latin.is_some());
    }

    #[test]
    fn precomposed_mappings_get_decomposed_contractions() {
        let root_arc = Arc::new(
            build_data(&parse_table(include_str!("tables/root.txt")).unwrap(), None).unwrap(),
        );
        let table = parse_table("00E5 ; [.29BC.05.05]\n").unwrap();
        let data = build_data(&table, Some(&root_arc)).unwrap();
        match data.own_mapping(0x61) {
            Some(Mapping::Contraction(c)) => {
                assert_eq!(c.get(&[0x30a]), Some(&Mapping::Ce(0x29bc_0000_0500_0500)));
            }
            other => panic!("unexpected mapping {other:?}"),
        }
    }

    #[test]
    fn tailorings_cannot_define_groups() {
        let root_arc = Arc::new(
            build_data(&parse_table(include_str!("tables/root.txt")).unwrap(), None).unwrap(),
        );
        let table = parse_table("@group 30 Latn\n").unwrap();
        assert!(build_data(&table, Some(&root_arc)).is_err());
    }
}
