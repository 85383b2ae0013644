//! Binary Ordered Compression for Unicode, used for the identical level of sort keys.
//!
//! Each code point is written as its difference from a moving base, in one to four
//! bytes, so that the bytes sort in code point order.

const SLOPE_MIN: i32 = 3;
const SLOPE_MAX: i32 = 0xff;
const SLOPE_MIDDLE: i32 = 0x81;
const SLOPE_TAIL_COUNT: i32 = SLOPE_MAX - SLOPE_MIN + 1;

const SLOPE_SINGLE: i32 = 80;
const SLOPE_LEAD_2: i32 = 42;
const SLOPE_LEAD_3: i32 = 3;

const SLOPE_REACH_POS_1: i32 = SLOPE_SINGLE;
const SLOPE_REACH_NEG_1: i32 = -SLOPE_SINGLE;
const SLOPE_REACH_POS_2: i32 = SLOPE_LEAD_2 * SLOPE_TAIL_COUNT + (SLOPE_LEAD_2 - 1);
const SLOPE_REACH_NEG_2: i32 = -SLOPE_REACH_POS_2 - 1;
const SLOPE_REACH_POS_3: i32 = SLOPE_LEAD_3 * SLOPE_TAIL_COUNT * SLOPE_TAIL_COUNT
    + (SLOPE_LEAD_3 - 1) * SLOPE_TAIL_COUNT
    + (SLOPE_TAIL_COUNT - 1);
const SLOPE_REACH_NEG_3: i32 = -SLOPE_REACH_POS_3 - 1;

const SLOPE_START_POS_2: i32 = SLOPE_MIDDLE + SLOPE_REACH_POS_1 + 1;
const SLOPE_START_POS_3: i32 = SLOPE_START_POS_2 + SLOPE_LEAD_2;
const SLOPE_START_NEG_2: i32 = SLOPE_MIDDLE + SLOPE_REACH_NEG_1;
const SLOPE_START_NEG_3: i32 = SLOPE_START_NEG_2 - SLOPE_LEAD_2;

fn tail(n: i32) -> u8 {
    (SLOPE_MIN + n.rem_euclid(SLOPE_TAIL_COUNT)) as u8
}

fn write_diff(diff: i32, out: &mut Vec<u8>) {
    if diff >= SLOPE_REACH_NEG_1 {
        if diff <= SLOPE_REACH_POS_1 {
            out.push((SLOPE_MIDDLE + diff) as u8);
        } else if diff <= SLOPE_REACH_POS_2 {
            out.push((SLOPE_START_POS_2 + diff / SLOPE_TAIL_COUNT) as u8);
            out.push(tail(diff));
        } else if diff <= SLOPE_REACH_POS_3 {
            let d = diff / SLOPE_TAIL_COUNT;
            out.push((SLOPE_START_POS_3 + d / SLOPE_TAIL_COUNT) as u8);
            out.push(tail(d));
            out.push(tail(diff));
        } else {
            let d1 = diff / SLOPE_TAIL_COUNT;
            let d2 = d1 / SLOPE_TAIL_COUNT;
            out.push(SLOPE_MAX as u8);
            out.push(tail(d2));
            out.push(tail(d1));
            out.push(tail(diff));
        }
    } else if diff >= SLOPE_REACH_NEG_2 {
        out.push((SLOPE_START_NEG_2 + diff.div_euclid(SLOPE_TAIL_COUNT)) as u8);
        out.push(tail(diff));
    } else if diff >= SLOPE_REACH_NEG_3 {
        let d = diff.div_euclid(SLOPE_TAIL_COUNT);
        out.push((SLOPE_START_NEG_3 + d.div_euclid(SLOPE_TAIL_COUNT)) as u8);
        out.push(tail(d));
        out.push(tail(diff));
    } else {
        let d1 = diff.div_euclid(SLOPE_TAIL_COUNT);
        let d2 = d1.div_euclid(SLOPE_TAIL_COUNT);
        out.push(SLOPE_MIN as u8);
        out.push(tail(d2));
        out.push(tail(d1));
        out.push(tail(diff));
    }
}

/// Appends the code points of `cps` to `out` and returns the new base for the next run.
/// U+FFFE becomes the merge separator byte 02.
pub(crate) fn write_identical_level_run(mut prev: i32, cps: &[u32], out: &mut Vec<u8>) -> i32 {
    for &c in cps {
        if prev < 0x4e00 || prev >= 0xa000 {
            prev = (prev & !0x7f) - SLOPE_REACH_NEG_1;
        } else {
            // Unihan: two-byte differences down from the top of the block.
            prev = 0x9fff - SLOPE_REACH_POS_2;
        }

        let c = c as i32;
        if c == 0xfffe {
            out.push(2);
            prev = 0;
        } else {
            write_diff(c - prev, out);
            prev = c;
        }
    }
    prev
}
