use regex::Regex;
use sha2::{Digest as _, Sha256};
use std::{fmt, io, path::PathBuf, str::FromStr};

use crate::error::{Error, Result};

/// Digest of contents
///
/// Digest is defined in [OCI image spec](https://github.com/opencontainers/image-spec/blob/v1.0.1/descriptor.md#digests)
/// as a string satisfies following EBNF:
///
/// ```text
/// digest                ::= algorithm ":" encoded
/// algorithm             ::= algorithm-component (algorithm-separator algorithm-component)*
/// algorithm-component   ::= [a-z0-9]+
/// algorithm-separator   ::= [+._-]
/// encoded               ::= [a-zA-Z0-9=_-]+
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: String,
    pub encoded: String,
}

lazy_static::lazy_static! {
    static ref ENCODED_RE: Regex = Regex::new(r"[a-zA-Z0-9=_-]+").unwrap();
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.encoded)
    }
}

impl From<oci_spec::image::Digest> for Digest {
    fn from(digest: oci_spec::image::Digest) -> Self {
        Digest {
            algorithm: digest.algorithm().to_string(),
            encoded: digest.digest().to_string(),
        }
    }
}

impl TryFrom<&Digest> for oci_spec::image::Digest {
    type Error = Error;
    fn try_from(digest: &Digest) -> Result<Self> {
        oci_spec::image::Digest::from_str(&digest.to_string())
            .map_err(|_| Error::InvalidDigest(digest.to_string()))
    }
}

impl Digest {
    pub fn new(input: &str) -> Result<Self> {
        let mut iter = input.split(':');
        match (iter.next(), iter.next(), iter.next()) {
            (Some(algorithm), Some(encoded), None) => {
                if ENCODED_RE.is_match(encoded) {
                    Ok(Digest {
                        algorithm: algorithm.to_string(),
                        encoded: encoded.to_string(),
                    })
                } else {
                    Err(Error::InvalidDigest(input.to_string()))
                }
            }
            _ => Err(Error::InvalidDigest(input.to_string())),
        }
    }

    pub fn from_descriptor(descriptor: &oci_spec::image::Descriptor) -> Result<Self> {
        Self::new(descriptor.digest().as_ref())
    }

    /// As a path used in oci-archive
    pub fn as_path(&self) -> PathBuf {
        PathBuf::from(format!("blobs/{}/{}", self.algorithm, self.encoded))
    }

    /// Calc digest using SHA-256 algorithm
    pub fn from_buf_sha256(buf: &[u8]) -> Self {
        let hash = Sha256::digest(buf);
        let digest = base16ct::lower::encode_string(&hash);
        Self {
            algorithm: "sha256".to_string(),
            encoded: digest,
        }
    }
}

/// Writer computing the SHA-256 digest of everything passing through it
pub struct DigestBuf<W: io::Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: io::Write> DigestBuf<W> {
    pub fn new(inner: W) -> Self {
        DigestBuf {
            inner,
            hasher: Sha256::new(),
        }
    }

    pub fn finish(self) -> (W, Digest) {
        let hash = self.hasher.finalize();
        let digest = Digest {
            algorithm: "sha256".to_string(),
            encoded: base16ct::lower::encode_string(&hash),
        };
        (self.inner, digest)
    }
}

impl<W: io::Write> io::Write for DigestBuf<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn parse() -> Result<()> {
        let digest = Digest::new(&format!("sha256:{}", EMPTY_SHA256))?;
        assert_eq!(digest.algorithm, "sha256");
        assert_eq!(digest.encoded, EMPTY_SHA256);
        assert!(Digest::new("sha256").is_err());
        assert!(Digest::new("sha256:a:b").is_err());
        Ok(())
    }

    #[test]
    fn sha256_of_empty_buf() {
        let digest = Digest::from_buf_sha256(b"");
        assert_eq!(digest.to_string(), format!("sha256:{}", EMPTY_SHA256));
    }

    #[test]
    fn digest_buf_matches_buffered_digest() {
        let mut buf = DigestBuf::new(io::sink());
        buf.write_all(b"test string").unwrap();
        let (_, streamed) = buf.finish();
        assert_eq!(streamed, Digest::from_buf_sha256(b"test string"));
    }
}
