//! The coupon-code alphabet.
//!
//! Codes are exactly [`CODE_LEN`] Unicode code points long. Each symbol is
//! drawn from the union of the modern Hangul syllable block
//! (U+AC00..=U+D7A3) and the ASCII digits, giving an alphabet of 10,988
//! symbols and a code space of roughly 2·10^40 — collisions against the set
//! of codes ever reserved are resolved by the durable store's unique
//! constraint, not by the generator.
//!
//! Codes are random but not secret; no cryptographic strength is required.

use rand::Rng;

/// Length of a coupon code in Unicode code points.
pub const CODE_LEN: usize = 10;

/// First code point of the modern Hangul syllable block (가).
pub const HANGUL_FIRST: u32 = 0xAC00;

/// Last code point of the modern Hangul syllable block (힣).
pub const HANGUL_LAST: u32 = 0xD7A3;

/// Generates one random coupon code.
///
/// Each symbol is independently a uniform Hangul syllable with probability
/// ½, otherwise a uniform ASCII digit.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(CODE_LEN * 3);
    for _ in 0..CODE_LEN {
        code.push(random_symbol(rng));
    }
    code
}

/// Whether `code` is exactly [`CODE_LEN`] symbols from the coupon alphabet.
pub fn is_valid_code(code: &str) -> bool {
    code.chars().count() == CODE_LEN && code.chars().all(is_alphabet_symbol)
}

/// Whether a single symbol belongs to the coupon alphabet.
pub fn is_alphabet_symbol(ch: char) -> bool {
    matches!(ch, '가'..='힣' | '0'..='9')
}

fn random_symbol<R: Rng + ?Sized>(rng: &mut R) -> char {
    if rng.random_bool(0.5) {
        // The modern Hangul syllable block is contiguous and fully assigned.
        char::from_u32(rng.random_range(HANGUL_FIRST..=HANGUL_LAST))
            .expect("U+AC00..=U+D7A3 are valid scalar values")
    } else {
        char::from_digit(rng.random_range(0..10), 10)
            .expect("0..10 are valid decimal digits")
    }
}
