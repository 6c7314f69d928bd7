//! Hashing and encoding builtins

use super::{int_arg, str_arg, INT, STR};
use crate::library::{LibraryTable, Signature};
use crate::value::Value;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};

/// Decoder that accepts input with or without padding
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// `llBase64ToString`; undecodable input yields an empty string
pub fn base64_to_string(encoded: &str) -> String {
    LENIENT
        .decode(encoded.trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// `llIntegerToBase64`: the big-endian bytes, padded to eight characters
pub fn integer_to_base64(value: i32) -> String {
    STANDARD.encode(value.to_be_bytes())
}

/// `llBase64ToInteger`: the first four decoded bytes, big-endian
///
/// Short input is zero-filled on the right; undecodable input yields 0.
pub fn base64_to_integer(encoded: &str) -> i32 {
    let Ok(bytes) = LENIENT.decode(encoded.trim()) else {
        return 0;
    };
    let mut be = [0u8; 4];
    for (dst, src) in be.iter_mut().zip(&bytes) {
        *dst = *src;
    }
    i32::from_be_bytes(be)
}

pub(super) fn register(table: &mut LibraryTable) {
    table.register("llMD5String", Signature::new(STR, &[STR, INT]), |ctx, args| {
        let input = format!("{}:{}", str_arg(args, 0)?, int_arg(args, 1)?);
        Ok(Value::String(ctx.services.hashes.md5_hex(input.as_bytes())))
    });
    table.register("llSHA1String", Signature::new(STR, &[STR]), |ctx, args| {
        Ok(Value::String(ctx.services.hashes.sha1_hex(str_arg(args, 0)?.as_bytes())))
    });

    table.register("llEscapeURL", Signature::new(STR, &[STR]), |_ctx, args| {
        Ok(Value::String(
            utf8_percent_encode(str_arg(args, 0)?, NON_ALPHANUMERIC).to_string(),
        ))
    });
    table.register("llUnescapeURL", Signature::new(STR, &[STR]), |_ctx, args| {
        Ok(Value::String(
            percent_decode_str(str_arg(args, 0)?)
                .decode_utf8_lossy()
                .into_owned(),
        ))
    });

    table.register("llStringToBase64", Signature::new(STR, &[STR]), |_ctx, args| {
        Ok(Value::String(STANDARD.encode(str_arg(args, 0)?.as_bytes())))
    });
    table.register("llBase64ToString", Signature::new(STR, &[STR]), |_ctx, args| {
        Ok(Value::String(base64_to_string(str_arg(args, 0)?)))
    });
    table.register("llIntegerToBase64", Signature::new(STR, &[INT]), |_ctx, args| {
        Ok(Value::String(integer_to_base64(int_arg(args, 0)?)))
    });
    table.register("llBase64ToInteger", Signature::new(INT, &[STR]), |_ctx, args| {
        Ok(Value::Integer(base64_to_integer(str_arg(args, 0)?)))
    });
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn test_md5_string_appends_nonce() {
        // md5("abc:0")
        let expected = format!("{:x}", md5::compute(b"abc:0"));
        assert_eq!(call("llMD5String", &[s("abc"), i(0)]), s(&expected));
        assert_eq!(expected.len(), 32);
    }

    #[test]
    fn test_sha1_string() {
        assert_eq!(
            call("llSHA1String", &[s("abc")]),
            s("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
    }

    #[test]
    fn test_url_escaping() {
        assert_eq!(call("llEscapeURL", &[s("a b/c")]), s("a%20b%2Fc"));
        assert_eq!(call("llUnescapeURL", &[s("a%20b%2Fc")]), s("a b/c"));
        assert_eq!(call("llEscapeURL", &[s("é")]), s("%C3%A9"));
    }

    #[test]
    fn test_base64_strings() {
        assert_eq!(call("llStringToBase64", &[s("Hello")]), s("SGVsbG8="));
        assert_eq!(base64_to_string("SGVsbG8="), "Hello");
        assert_eq!(base64_to_string("SGVsbG8"), "Hello");
        assert_eq!(base64_to_string("!!!"), "");
    }

    #[test]
    fn test_base64_integers() {
        assert_eq!(integer_to_base64(1), "AAAAAQ==");
        assert_eq!(integer_to_base64(-1), "/////w==");
        assert_eq!(base64_to_integer("AAAAAQ=="), 1);
        assert_eq!(base64_to_integer("/////w=="), -1);
        assert_eq!(base64_to_integer("AQ"), 0x0100_0000);
        assert_eq!(base64_to_integer(""), 0);
    }
}
