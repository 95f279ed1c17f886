//! Binary ↔ text codec for relaying raw buffers over a text-only channel.
//!
//! Standard 64-symbol alphabet, but the tail group is padded with `*` instead
//! of `=`. The sentinel is a hard stop: decoding never looks past the group
//! that contains it, so trailing garbage or NUL fill in a fixed-size value
//! buffer is ignored.
//!
//! ```text
//! [0xFF]          → "/w**"
//! [0xFF, 0xFF]    → "//8*"
//! [0, 0, 0, 0, 0, 0] → "AAAAAAAA"
//! ```

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// End-of-buffer padding symbol. Never value-bearing.
pub const SENTINEL: char = '*';

const SENTINEL_BYTE: u8 = SENTINEL as u8;

/// Token length for `n` input bytes: `4 * ceil(n / 3)`.
pub fn encoded_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}

/// Upper bound on the bytes a token of `token_len` symbols can carry.
pub fn max_decoded_len(token_len: usize) -> usize {
    token_len.div_ceil(4) * 3
}

/// Encode raw bytes into a printable token.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(data.len()));
    let symbol = |v: u32| ALPHABET[(v & 0x3F) as usize] as char;

    let mut groups = data.chunks_exact(3);
    for group in &mut groups {
        let n = (group[0] as u32) << 16 | (group[1] as u32) << 8 | group[2] as u32;
        out.push(symbol(n >> 18));
        out.push(symbol(n >> 12));
        out.push(symbol(n >> 6));
        out.push(symbol(n));
    }

    match *groups.remainder() {
        [b0] => {
            let n = (b0 as u32) << 16;
            out.push(symbol(n >> 18));
            out.push(symbol(n >> 12));
            out.push(SENTINEL);
            out.push(SENTINEL);
        }
        [b0, b1] => {
            let n = (b0 as u32) << 16 | (b1 as u32) << 8;
            out.push(symbol(n >> 18));
            out.push(symbol(n >> 12));
            out.push(symbol(n >> 6));
            out.push(SENTINEL);
        }
        _ => {}
    }
    out
}

/// Decode a token produced by [`encode`] back into the exact original bytes.
///
/// Symbols outside the alphabet decode as 0; only feed this tokens that
/// `encode` produced.
pub fn decode(token: &str) -> Vec<u8> {
    let symbols = token.as_bytes();
    let mut out = Vec::with_capacity(max_decoded_len(symbols.len()));

    for group in symbols.chunks(4) {
        match group.iter().position(|&c| c == SENTINEL_BYTE) {
            Some(stop) => {
                decode_tail(&group[..stop], &mut out);
                break;
            }
            None if group.len() < 4 => {
                decode_tail(group, &mut out);
                break;
            }
            None => {
                let n = symbol_value(group[0]) << 18
                    | symbol_value(group[1]) << 12
                    | symbol_value(group[2]) << 6
                    | symbol_value(group[3]);
                out.push((n >> 16) as u8);
                out.push((n >> 8) as u8);
                out.push(n as u8);
            }
        }
    }
    out
}

/// Last group: two symbols carry one byte, three carry two.
fn decode_tail(symbols: &[u8], out: &mut Vec<u8>) {
    match *symbols {
        [s0, s1] => {
            let n = symbol_value(s0) << 18 | symbol_value(s1) << 12;
            out.push((n >> 16) as u8);
        }
        [s0, s1, s2, ..] => {
            let n = symbol_value(s0) << 18 | symbol_value(s1) << 12 | symbol_value(s2) << 6;
            out.push((n >> 16) as u8);
            out.push((n >> 8) as u8);
        }
        _ => {}
    }
}

fn symbol_value(c: u8) -> u32 {
    match c {
        b'A'..=b'Z' => (c - b'A') as u32,
        b'a'..=b'z' => (c - b'a') as u32 + 26,
        b'0'..=b'9' => (c - b'0') as u32 + 52,
        b'+' => 62,
        b'/' => 63,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_six_zero_bytes_have_no_sentinel() {
        let token = encode(&[0u8; 6]);
        assert_eq!(token, "AAAAAAAA");
        assert!(!token.contains(SENTINEL));
        assert_eq!(decode(&token), vec![0u8; 6]);
    }

    #[test]
    fn test_single_byte_pads_with_two_sentinels() {
        let token = encode(&[0xFF]);
        assert_eq!(token, "/w**");
        assert_eq!(decode(&token), vec![0xFF]);
    }

    #[test]
    fn test_two_bytes_pad_with_one_sentinel() {
        let token = encode(&[0xFF, 0xFF]);
        assert_eq!(token, "//8*");
        assert_eq!(decode(&token), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_empty_roundtrip() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(encode(b"Man"), "TWFu");
        assert_eq!(encode(b"Ma"), "TWE*");
        assert_eq!(decode("TWFu"), b"Man");
    }

    #[test]
    fn test_decode_stops_at_sentinel() {
        let mut token = encode(&[1, 2, 3, 4]);
        token.push_str("GARBAGE!\0\0\0\0");
        assert_eq!(decode(&token), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_unpadded_tail() {
        // Same bytes as "TWE*" with the sentinel dropped.
        assert_eq!(decode("TWE"), b"Ma");
        assert_eq!(decode("TQ"), b"M");
        assert!(decode("T").is_empty());
    }

    #[test]
    fn test_foreign_symbols_decode_as_zero() {
        assert_eq!(decode("!!!!"), vec![0, 0, 0]);
    }

    #[test]
    fn test_default_buffer_fits_value_limit() {
        // 64-byte buffers relay through 128-byte values.
        assert_eq!(encoded_len(64), 88);
        assert!(encoded_len(96) <= 128);
        assert!(encoded_len(97) > 128);
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_exact_length(data in proptest::collection::vec(any::<u8>(), 0..=256)) {
            let token = encode(&data);
            prop_assert_eq!(decode(&token), data);
        }

        #[test]
        fn sentinel_only_in_final_group(data in proptest::collection::vec(any::<u8>(), 0..=256)) {
            let token = encode(&data);
            prop_assert_eq!(token.len(), encoded_len(data.len()));
            let body = token.len().saturating_sub(4);
            prop_assert!(!token[..body].contains(SENTINEL));
            prop_assert_eq!(token.contains(SENTINEL), data.len() % 3 != 0);
        }
    }
}
