//! Alarm and fault group decoding
//!
//! The words of a group form one bit vector whose bit 0 is the low bit of
//! the first word. Bits without a name are ignored so that firmware adding
//! undocumented conditions does not surface as noise.

use itertools::Itertools;

/// Names of the active conditions, in name-table order
pub fn decode_bits(words: &[u16], names: &[(u16, &'static str)]) -> Vec<&'static str> {
    names
        .iter()
        .filter(|(bit, _)| is_set(words, *bit))
        .map(|(_, name)| *name)
        .collect()
}

fn is_set(words: &[u16], bit: u16) -> bool {
    words
        .get((bit / 16) as usize)
        .is_some_and(|word| (word >> (bit % 16)) & 1 == 1)
}

/// Single-line rendering of an active set for logs and text outputs
pub fn describe(active: &[&str]) -> String {
    if active.is_empty() {
        return "None".to_string();
    }
    active.iter().join(", ")
}
