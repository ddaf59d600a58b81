//! Paths and their URI-component encoding.
//!
//! A [`FilePath`] is an ordered sequence of non-empty Unicode segments; the
//! empty sequence denotes the root directory. The codec percent-encodes each
//! segment and joins with `/`, so a segment may itself contain `/`, `%`, or
//! any other character without colliding with the separator. The encoded form
//! doubles as the in-memory key for the in-flight maps and as the `uri`
//! component of chunk keys.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters kept literal by the segment encoder. Everything else is
/// percent-encoded byte-wise, which keeps `encode` injective.
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'!' | b'*' | b'\'' | b'(' | b')')
}

/// Ordered path segments addressing a file or directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePath(pub Vec<String>);

impl FilePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The root directory (empty segment sequence).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Final `.`-delimited suffix of the last segment, if any.
    pub fn extension(&self) -> Option<&str> {
        let last = self.0.last()?;
        let (stem, ext) = last.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }

    /// Percent-encode each segment and join with `/`.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            for &b in segment.as_bytes() {
                if is_unreserved(b) {
                    out.push(b as char);
                } else {
                    out.push('%');
                    out.push(char::from_digit((b >> 4) as u32, 16).unwrap().to_ascii_uppercase());
                    out.push(char::from_digit((b & 0xf) as u32, 16).unwrap().to_ascii_uppercase());
                }
            }
        }
        out
    }

    /// Split on `/` and percent-decode each piece. Inverse of [`encode`].
    ///
    /// [`encode`]: FilePath::encode
    pub fn decode(uri: &str) -> Result<Self, StoreError> {
        if uri.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for piece in uri.split('/') {
            segments.push(decode_segment(piece)?);
        }
        Ok(Self(segments))
    }
}

fn decode_segment(piece: &str) -> Result<String, StoreError> {
    let raw = piece.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' => {
                let hex = raw
                    .get(i + 1..i + 3)
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| StoreError::InvalidUri(piece.to_string()))?;
                out.push(hex);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| StoreError::InvalidUri(piece.to_string()))
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl From<Vec<String>> for FilePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl<const N: usize> From<[&str; N]> for FilePath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_joins_with_slash() {
        let p = FilePath::from(["docs", "readme.txt"]);
        assert_eq!(p.encode(), "docs/readme.txt");
    }

    #[test]
    fn test_round_trip_reserved_characters() {
        for segments in [
            vec!["a/b", "c"],
            vec!["50%", "off"],
            vec!["hello world"],
            vec!["naïve", "日本語.txt"],
            vec!["%2F"],
        ] {
            let p = FilePath::new(segments.clone());
            let uri = p.encode();
            assert_eq!(FilePath::decode(&uri).unwrap(), p, "uri was {uri}");
        }
    }

    #[test]
    fn test_encode_is_injective_on_slash() {
        // ["a/b"] and ["a", "b"] must not encode to the same string.
        let joined = FilePath::from(["a/b"]).encode();
        let split = FilePath::from(["a", "b"]).encode();
        assert_ne!(joined, split);
    }

    #[test]
    fn test_root_round_trip() {
        assert_eq!(FilePath::root().encode(), "");
        assert!(FilePath::decode("").unwrap().is_root());
    }

    #[test]
    fn test_decode_rejects_truncated_escape() {
        assert!(FilePath::decode("abc%2").is_err());
        assert!(FilePath::decode("%zz").is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(FilePath::from(["a", "photo.png"]).extension(), Some("png"));
        assert_eq!(FilePath::from(["a", "archive.tar.gz"]).extension(), Some("gz"));
        assert_eq!(FilePath::from(["a", "noext"]).extension(), None);
        assert_eq!(FilePath::from(["a", ".hidden"]).extension(), None);
        assert_eq!(FilePath::root().extension(), None);
    }
}
