//! Strict UTF-8 validation for wire bytes
//!
//! Payloads and headers arrive as raw bytes out of the base64url codec.
//! Before any of them reach the parser they pass through [`validate`],
//! which checks the start/continuation pattern by hand rather than
//! trusting the producer: NUL bytes, stray continuation bytes, overlong
//! encodings, surrogate codepoints, and sequences beyond U+10FFFF are
//! all rejected.

use super::Error;

/// Validates `bytes` as strict UTF-8 and hands back the same bytes as
/// text
///
/// # Errors
///
/// Fails with [`Error::Unicode`], carrying the byte offset of the first
/// offending sequence.
pub fn validate(bytes: &[u8]) -> Result<&str, Error> {
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        let len = match b {
            0 => return Err(Error::Unicode { offset: i }),
            0x01..=0x7f => 1,
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf4 => 4,
            // stray continuation bytes, the overlong prefixes C0/C1,
            // and start bytes beyond U+10FFFF
            _ => return Err(Error::Unicode { offset: i }),
        };

        if i + len > bytes.len() {
            return Err(Error::Unicode { offset: i });
        }

        for j in 1..len {
            if bytes[i + j] & 0xc0 != 0x80 {
                return Err(Error::Unicode { offset: i + j });
            }
        }

        match len {
            3 => {
                if b == 0xe0 && bytes[i + 1] < 0xa0 {
                    // overlong three-byte form
                    return Err(Error::Unicode { offset: i });
                }
                if b == 0xed && bytes[i + 1] >= 0xa0 {
                    // surrogate codepoint
                    return Err(Error::Unicode { offset: i });
                }
            }
            4 => {
                if b == 0xf0 && bytes[i + 1] < 0x90 {
                    // overlong four-byte form
                    return Err(Error::Unicode { offset: i });
                }
                if b == 0xf4 && bytes[i + 1] >= 0x90 {
                    // beyond U+10FFFF
                    return Err(Error::Unicode { offset: i });
                }
            }
            _ => {}
        }

        i += len;
    }

    std::str::from_utf8(bytes).map_err(|e| Error::Unicode {
        offset: e.valid_up_to(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_ascii() {
        assert_eq!(validate(b"hello").unwrap(), "hello");
    }

    #[test]
    fn accepts_multibyte_sequences() {
        let s = "héllo ∞ 😀";
        assert_eq!(validate(s.as_bytes()).unwrap(), s);
    }

    #[test]
    fn rejects_nul() {
        assert!(matches!(
            validate(b"a\x00b"),
            Err(Error::Unicode { offset: 1 })
        ));
    }

    #[test]
    fn rejects_stray_continuation() {
        assert!(matches!(
            validate(&[0x80]),
            Err(Error::Unicode { offset: 0 })
        ));
    }

    #[test]
    fn rejects_bad_continuation() {
        // 0xc3 expects a 10xxxxxx byte next
        assert!(matches!(
            validate(&[0xc3, 0x28]),
            Err(Error::Unicode { offset: 1 })
        ));
    }

    #[test]
    fn rejects_overlong_forms() {
        assert!(validate(&[0xc0, 0xaf]).is_err());
        assert!(validate(&[0xe0, 0x80, 0xaf]).is_err());
        assert!(validate(&[0xf0, 0x80, 0x80, 0xaf]).is_err());
    }

    #[test]
    fn rejects_surrogates() {
        // U+D800 encoded directly
        assert!(validate(&[0xed, 0xa0, 0x80]).is_err());
    }

    #[test]
    fn rejects_codepoints_beyond_max() {
        // U+110000
        assert!(validate(&[0xf4, 0x90, 0x80, 0x80]).is_err());
        // legacy five-byte form
        assert!(validate(&[0xf8, 0x88, 0x80, 0x80, 0x80]).is_err());
    }

    #[test]
    fn rejects_truncated_sequence() {
        assert!(validate(&[0xe2, 0x82]).is_err());
    }
}
