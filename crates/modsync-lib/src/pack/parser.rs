use crate::error::{PackError, Result};
use crate::pack::types::{FileIndex, FileMetadata, PackDescriptor};
use serde::de::DeserializeOwned;

fn decode<T: DeserializeOwned>(data: &[u8], document: &'static str) -> Result<T> {
    let text = std::str::from_utf8(data).map_err(|e| PackError::Decode {
        document,
        message: format!("not valid UTF-8: {}", e),
    })?;
    toml::from_str(text).map_err(|e| PackError::Decode {
        document,
        message: e.to_string(),
    })
}

/// Decode pack.toml
pub fn parse_pack(data: &[u8]) -> Result<PackDescriptor> {
    let pack: PackDescriptor = decode(data, "pack manifest")?;
    if !pack.is_packwiz_format() {
        log::warn!(
            "[parse_pack] Unrecognised pack-format '{}' for {}, continuing anyway",
            pack.pack_format,
            pack.name
        );
    }
    Ok(pack)
}

/// Decode index.toml
pub fn parse_index(data: &[u8]) -> Result<FileIndex> {
    decode(data, "file index")
}

/// Decode a *.pw.toml metadata record
pub fn parse_metafile(data: &[u8]) -> Result<FileMetadata> {
    decode(data, "metafile")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::types::{Side, MODE_CURSEFORGE};
    use crate::utils::hash::HashFormat;

    const PACK: &str = r#"
name = "Example Pack"
author = "someone"
version = "1.2.0"
pack-format = "packwiz:1.1.0"

[index]
file = "index.toml"
hash-format = "sha256"
hash = "abc"

[versions]
minecraft = "1.20.1"
fabric = "0.15.3"
"#;

    const INDEX: &str = r#"
hash-format = "sha256"

[[files]]
file = "config/a.json5"
hash = "0011"

[[files]]
file = "mods/sodium.pw.toml"
hash = "2233"
hash-format = "sha1"
metafile = true

[[files]]
file = "options.txt"
hash = "4455"
preserve = true
alias = "opts"
"#;

    const METAFILE: &str = r#"
name = "JEI"
filename = "jei-1.20.1.jar"
side = "both"

[download]
hash-format = "sha1"
hash = "feedface"
mode = "metadata:curseforge"

[update.curseforge]
file-id = 4712011
project-id = 238222

[option]
optional = true
description = "Recipe viewer"
"#;

    #[test]
    fn test_parse_pack() {
        let pack = parse_pack(PACK.as_bytes()).unwrap();
        assert_eq!(pack.name, "Example Pack");
        assert_eq!(pack.author.as_deref(), Some("someone"));
        assert_eq!(pack.index.file, "index.toml");
        assert_eq!(pack.index.hash_format, HashFormat::Sha256);
        assert_eq!(pack.versions.get("minecraft").map(String::as_str), Some("1.20.1"));
        assert!(pack.is_packwiz_format());
    }

    #[test]
    fn test_parse_index_defaults() {
        let index = parse_index(INDEX.as_bytes()).unwrap();
        assert_eq!(index.files.len(), 3);

        let plain = &index.files[0];
        assert!(!plain.metafile);
        assert!(!plain.preserve);
        assert_eq!(plain.effective_hash_format(&index), HashFormat::Sha256);

        let meta = &index.files[1];
        assert!(meta.metafile);
        assert_eq!(meta.effective_hash_format(&index), HashFormat::Sha1);

        let preserved = &index.files[2];
        assert!(preserved.preserve);
        assert_eq!(preserved.alias.as_deref(), Some("opts"));
    }

    #[test]
    fn test_parse_metafile() {
        let meta = parse_metafile(METAFILE.as_bytes()).unwrap();
        assert_eq!(meta.filename, "jei-1.20.1.jar");
        assert_eq!(meta.side, Some(Side::Both));
        assert_eq!(meta.download.mode.as_deref(), Some(MODE_CURSEFORGE));
        let cf = meta.update.and_then(|u| u.curseforge).unwrap();
        assert_eq!((cf.project_id, cf.file_id), (238222, 4712011));
        assert!(meta.option.map(|o| o.optional).unwrap_or(false));
        assert!(meta.index_path.is_empty());
    }

    #[test]
    fn test_unknown_hash_format_fails_decoding() {
        let bad = INDEX.replace("hash-format = \"sha1\"", "hash-format = \"crc32\"");
        let err = parse_index(bad.as_bytes()).unwrap_err();
        match err {
            PackError::Decode { document, message } => {
                assert_eq!(document, "file index");
                assert!(message.contains("crc32"), "unexpected message: {}", message);
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            parse_pack(b"name = "),
            Err(PackError::Decode { .. })
        ));
        assert!(matches!(
            parse_pack(&[0xff, 0xfe, 0x00]),
            Err(PackError::Decode { .. })
        ));
    }
}
