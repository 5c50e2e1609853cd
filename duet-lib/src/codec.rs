use std::io::{self, Read, Write};

use base64::{
    prelude::{BASE64_STANDARD, BASE64_STANDARD_NO_PAD, BASE64_URL_SAFE_NO_PAD},
    Engine,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The token is not base64 at all, so it was probably never compressed.
    #[error("not a base64 token: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("corrupt gzip stream: {0}")]
    Gzip(#[source] io::Error),
    #[error("decompressed bytes are not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Gzips `text` and encodes it as url-safe base64 without padding.
pub fn compress(text: &str) -> io::Result<String> {
    let mut e = GzEncoder::new(Vec::new(), Compression::best());
    e.write_all(text.as_bytes())?;
    let compressed_bytes = e.finish()?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(compressed_bytes))
}

pub fn decompress(token: &str) -> Result<String, DecodeError> {
    let compressed_bytes = decode_base64(token.trim())?;
    let mut d = GzDecoder::new(compressed_bytes.as_slice());
    let mut bytes = Vec::new();
    d.read_to_end(&mut bytes).map_err(DecodeError::Gzip)?;
    Ok(String::from_utf8(bytes)?)
}

/// Tokens from older builds use the standard alphabet with padding.
fn decode_base64(token: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD
        .decode(token)
        .or_else(|_| BASE64_STANDARD.decode(token))
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_text() {
        for text in [
            "",
            "v=0\r\no=- 46117317 2 IN IP4 127.0.0.1\r\n",
            r#"{"type":"offer","sdp":"v=0\r\n"}"#,
            "日本語のテキスト 🎧",
        ] {
            assert_eq!(decompress(&compress(text).unwrap()).unwrap(), text);
        }
    }

    #[test]
    fn token_has_no_query_separators() {
        let token = compress(&"a=b&c=d?+/".repeat(64)).unwrap();
        assert!(!token.is_empty());
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn accepts_standard_alphabet_tokens() {
        let mut e = GzEncoder::new(Vec::new(), Compression::default());
        e.write_all(b"legacy").unwrap();
        let legacy = BASE64_STANDARD.encode(e.finish().unwrap());
        assert_eq!(decompress(&legacy).unwrap(), "legacy");
    }

    #[test]
    fn distinguishes_plain_text_from_corrupt_tokens() {
        let err = decompress(r#"{"type":"offer","sdp":""}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)), "{err}");

        let err = decompress("AAAAAAAA").unwrap_err();
        assert!(matches!(err, DecodeError::Gzip(_)), "{err}");
    }
}
