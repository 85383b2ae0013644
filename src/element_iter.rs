//! Walks the collation elements of a text in both directions, in the 32-bit form with
//! 16-bit primaries.
//!
//! A 64-bit CE becomes one 32-bit order, or two when its weights do not fit: the second
//! half is then a continuation, marked by `0xc0` in its low byte.

use crate::collator::RuleBasedCollator;
use crate::settings::Strength;

const PRIMARY_ORDER_MASK: u32 = 0xffff_0000;
const SECONDARY_ORDER_MASK: u32 = 0x0000_ff00;
const TERTIARY_ORDER_MASK: u32 = 0x0000_00ff;
const CONTINUATION_MARKER: u32 = 0xc0;

fn first_half(p: u32, lower32: u32) -> u32 {
    (p & 0xffff_0000) | ((lower32 >> 16) & 0xff00) | ((lower32 >> 8) & 0xff)
}

fn second_half(p: u32, lower32: u32) -> u32 {
    (p << 16) | ((lower32 >> 8) & 0xff00) | (lower32 & 0x3f)
}

fn ce_needs_two_parts(ce: u64) -> bool {
    ce & 0xffff_00ff_003f != 0
}

/// The 32-bit orders of a CE sequence, continuations included.
fn orders_of(ces: &[u64]) -> Vec<u32> {
    let mut orders = Vec::with_capacity(ces.len());
    for &ce in ces {
        let p = (ce >> 32) as u32;
        let lower32 = ce as u32;
        orders.push(first_half(p, lower32));
        if ce_needs_two_parts(ce) {
            orders.push(second_half(p, lower32) | CONTINUATION_MARKER);
        }
    }
    orders
}

pub struct CollationElementIterator<'c> {
    collator: &'c RuleBasedCollator,
    orders: Vec<u32>,
    /// Number of orders returned by `next` and not taken back by `previous`.
    index: usize,
}

impl<'c> CollationElementIterator<'c> {
    pub(crate) fn new(collator: &'c RuleBasedCollator, text: &str) -> Self {
        Self {
            collator,
            orders: orders_of(&collator.collation_elements(text)),
            index: 0,
        }
    }

    /// The next order, or `None` at the end of the text. Ignorable elements are returned
    /// as 0.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<u32> {
        let order = *self.orders.get(self.index)?;
        self.index += 1;
        Some(order)
    }

    /// The order before the current position, or `None` at the start. Reading backwards
    /// returns the orders of `next` in reverse.
    pub fn previous(&mut self) -> Option<u32> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.orders[self.index])
    }

    /// Moves back to the start of the text.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Starts over on a new text.
    pub fn set_text(&mut self, text: &str) {
        self.orders = orders_of(&self.collator.collation_elements(text));
        self.index = 0;
    }

    /// Keeps only the parts of `order` that the collator's strength compares.
    pub fn strength_order(&self, order: u32) -> u32 {
        match self.collator.strength() {
            Strength::Primary => order & PRIMARY_ORDER_MASK,
            Strength::Secondary => order & (PRIMARY_ORDER_MASK | SECONDARY_ORDER_MASK),
            _ => order,
        }
    }

    pub fn primary_order(order: u32) -> u32 {
        order >> 16
    }

    pub fn secondary_order(order: u32) -> u32 {
        (order & SECONDARY_ORDER_MASK) >> 8
    }

    pub fn tertiary_order(order: u32) -> u32 {
        order & TERTIARY_ORDER_MASK
    }

    pub fn is_ignorable(order: u32) -> bool {
        order & PRIMARY_ORDER_MASK == 0
    }

    pub fn is_continuation(order: u32) -> bool {
        order & CONTINUATION_MARKER == CONTINUATION_MARKER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Attribute, AttributeValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_wide_elements() {
        // Three-byte primary: the low byte moves to a continuation.
        let ce = 0x2910_2000_0500_0500;
        assert_eq!(orders_of(&[ce]), vec![0x2910_0505, 0x2000_00c0]);
        // Two-byte primary and common weights fit in one order.
        assert_eq!(orders_of(&[0x2910_0000_0500_0500]), vec![0x2910_0505]);
        assert!(!CollationElementIterator::is_continuation(0x2910_0505));
        assert!(CollationElementIterator::is_continuation(0x2000_00c0));
    }

    #[test]
    fn forward_and_backward() {
        let collator = RuleBasedCollator::try_new_root().unwrap();
        let mut iter = collator.collation_element_iterator("abc");
        let mut forward = Vec::new();
        while let Some(order) = iter.next() {
            forward.push(order);
        }
        assert!(!forward.is_empty());
        assert_eq!(iter.next(), None);

        let mut backward = Vec::new();
        while let Some(order) = iter.previous() {
            backward.push(order);
        }
        backward.reverse();
        assert_eq!(forward, backward);

        iter.reset();
        assert_eq!(iter.next(), forward.first().copied());
    }

    #[test]
    fn orders_follow_the_text() {
        let collator = RuleBasedCollator::try_new_root().unwrap();
        let mut iter = collator.collation_element_iterator("b");
        let b = iter.next().unwrap();
        iter.set_text("a");
        let a = iter.next().unwrap();
        assert!(CollationElementIterator::primary_order(a) < CollationElementIterator::primary_order(b));
        assert!(!CollationElementIterator::is_ignorable(a));

        // The accent of a precomposed letter is a secondary-only element.
        iter.set_text("\u{e1}");
        let letter = iter.next().unwrap();
        assert_eq!(
            CollationElementIterator::primary_order(letter),
            CollationElementIterator::primary_order(a)
        );
        let accent = iter.next().unwrap();
        assert!(CollationElementIterator::is_ignorable(accent));
        assert_ne!(CollationElementIterator::secondary_order(accent), 0);
    }

    #[test]
    fn strength_masks_lower_levels() {
        let mut collator = RuleBasedCollator::try_new_root().unwrap();
        collator
            .set_attribute(Attribute::Strength, AttributeValue::Primary)
            .unwrap();
        let iter = collator.collation_element_iterator("");
        assert_eq!(iter.strength_order(0x2910_0505), 0x2910_0000);
        assert_eq!(CollationElementIterator::tertiary_order(0x2910_0505), 0x05);
    }
}
