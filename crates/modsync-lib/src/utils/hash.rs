use crate::error::{PackError, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Hash formats a pack may declare, in preference order (weakest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashFormat {
    Murmur2,
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashFormat {
    pub const PREFERENCE: [HashFormat; 5] = [
        HashFormat::Murmur2,
        HashFormat::Md5,
        HashFormat::Sha1,
        HashFormat::Sha256,
        HashFormat::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashFormat::Murmur2 => "murmur2",
            HashFormat::Md5 => "md5",
            HashFormat::Sha1 => "sha1",
            HashFormat::Sha256 => "sha256",
            HashFormat::Sha512 => "sha512",
        }
    }

    /// Render the digest of `data` the way pack files record it.
    ///
    /// Cryptographic formats are lowercase hex. `murmur2` is the CurseForge
    /// fingerprint, written as a decimal integer.
    pub fn digest(&self, data: &[u8]) -> String {
        match self {
            HashFormat::Murmur2 => curseforge_fingerprint(data).to_string(),
            HashFormat::Md5 => format!("{:x}", Md5::digest(data)),
            HashFormat::Sha1 => format!("{:x}", Sha1::digest(data)),
            HashFormat::Sha256 => format!("{:x}", Sha256::digest(data)),
            HashFormat::Sha512 => format!("{:x}", Sha512::digest(data)),
        }
    }
}

impl fmt::Display for HashFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashFormat {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        HashFormat::PREFERENCE
            .iter()
            .copied()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| PackError::UnsupportedAlgorithm {
                name: s.to_string(),
            })
    }
}

impl TryFrom<String> for HashFormat {
    type Error = PackError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<HashFormat> for String {
    fn from(format: HashFormat) -> Self {
        format.as_str().to_string()
    }
}

/// CurseForge fingerprint: MurmurHash2 (seed 1) over the input with
/// TAB, LF, CR and SPACE bytes removed
fn curseforge_fingerprint(data: &[u8]) -> u32 {
    let filtered: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !matches!(b, 9 | 10 | 13 | 32))
        .collect();
    murmur2::murmur2(&filtered, 1)
}

/// Check `data` against an expected digest. Comparison ignores ASCII case.
pub fn verify(data: &[u8], format: HashFormat, expected: &str) -> bool {
    let computed = format.digest(data);
    computed.eq_ignore_ascii_case(expected.trim())
}

/// Like [`verify`], with the format given by name
pub fn verify_named(data: &[u8], format: &str, expected: &str) -> Result<bool> {
    let format: HashFormat = format.parse()?;
    Ok(verify(data, format, expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &[u8] = b"hello world";

    #[test]
    fn test_known_digests() {
        assert_eq!(
            HashFormat::Sha1.digest(HELLO),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(
            HashFormat::Sha256.digest(HELLO),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(
            HashFormat::Md5.digest(HELLO),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(HashFormat::Sha512.digest(HELLO).len(), 128);
    }

    #[test]
    fn test_verify_ignores_case() {
        assert!(verify(
            HELLO,
            HashFormat::Sha1,
            "2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED"
        ));
    }

    #[test]
    fn test_single_bit_flip_fails() {
        for format in HashFormat::PREFERENCE {
            let expected = format.digest(HELLO);
            assert!(verify(HELLO, format, &expected), "{} should match", format);

            let mut mutated = HELLO.to_vec();
            mutated[0] ^= 0x01;
            assert!(
                !verify(&mutated, format, &expected),
                "{} should reject a flipped bit",
                format
            );
        }
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = verify_named(HELLO, "crc32", "00").unwrap_err();
        assert!(matches!(err, PackError::UnsupportedAlgorithm { ref name } if name == "crc32"));
        assert!(verify_named(HELLO, "sha1", "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed").unwrap());
    }

    #[test]
    fn test_murmur2_skips_whitespace() {
        let spaced = b"hello\n \r \tworld";
        let plain = b"helloworld";
        assert_eq!(
            HashFormat::Murmur2.digest(spaced),
            HashFormat::Murmur2.digest(plain)
        );
        assert!(HashFormat::Murmur2.digest(plain).parse::<u32>().is_ok());
    }

    #[test]
    fn test_preference_order_round_trips_names() {
        let names: Vec<&str> = HashFormat::PREFERENCE.iter().map(|f| f.as_str()).collect();
        assert_eq!(names, ["murmur2", "md5", "sha1", "sha256", "sha512"]);
        for name in names {
            assert_eq!(name.parse::<HashFormat>().unwrap().as_str(), name);
        }
    }
}
