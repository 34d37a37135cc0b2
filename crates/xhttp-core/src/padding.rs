//! Padding range validation and generation (spec §4.3, §6).

use crate::roll::RollRange;

/// `x_padding` length bounds, in bytes. Both ends inclusive.
pub type PaddingRange = RollRange<u32>;

/// Build a fresh `x_padding` token: `N` ASCII `'0'` characters, `N` drawn
/// uniformly from the configured range (spec §8 S3, §6: "`x_padding=<N "0"
/// chars>`").
#[must_use]
pub fn generate(range: PaddingRange) -> String {
    "0".repeat(range.roll() as usize)
}

/// Build a stream-up server-keepalive chunk: `N` ASCII `'X'` bytes, `N`
/// drawn uniformly from the padding range (spec §4.3, §6: "periodic `X`
/// padding keepalives").
#[must_use]
pub fn generate_keepalive(range: PaddingRange) -> String {
    "X".repeat(range.roll() as usize)
}

/// Validate a padding token's length against the configured range.
#[must_use]
pub fn is_valid_length(range: PaddingRange, len: usize) -> bool {
    let len = len as u32;
    len >= range.from && len <= range.to
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_padding_is_within_range() {
        let range = PaddingRange { from: 100, to: 100 };
        let token = generate(range);
        assert_eq!(token.len(), 100);
        assert!(token.bytes().all(|b| b == b'0'));
    }

    #[test]
    fn generated_keepalive_uses_x_bytes() {
        let range = PaddingRange { from: 50, to: 50 };
        let chunk = generate_keepalive(range);
        assert_eq!(chunk.len(), 50);
        assert!(chunk.bytes().all(|b| b == b'X'));
    }

    #[test]
    fn s3_padding_range_scenario() {
        // S3: with {from:100,to:100}, exactly 100 zeros is accepted, 99 is not.
        let range = PaddingRange { from: 100, to: 100 };
        assert!(is_valid_length(range, 100));
        assert!(!is_valid_length(range, 99));
    }
}
