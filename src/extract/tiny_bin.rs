//! Partner Tiny binary extractor: loads an existing Tiny stream file so
//! the raster transformer can rebuild bitmaps from it.

use std::fs;
use std::path::Path;

use crate::font::{Font, Payload, TinyStream};
use crate::options::OptionBag;
use crate::plugin::{Extract, PluginKind, PluginMeta, PluginRecord, Stage, StageError};

pub const PLUGIN_NAME: &str = "partner_tiny_bin_extractor";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Loads Partner Tiny binary stream into the payload slot".to_string(),
            author: "snatch project".to_string(),
            format: "bin".to_string(),
            standard: "partner-tiny".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Extractor,
        },
        Stage::Extract(Box::new(TinyBinExtractor)),
    )
}

pub struct TinyBinExtractor;

impl Extract for TinyBinExtractor {
    fn extract(&self, input: &Path, _options: &OptionBag) -> Result<Font, StageError> {
        if input.as_os_str().is_empty() {
            return Err(StageError::new(10, "partner_tiny_bin_extractor: input path is empty"));
        }

        let bytes = fs::read(input).map_err(|err| {
            StageError::new(
                12,
                format!("partner_tiny_bin_extractor: cannot open input file: {err}"),
            )
        })?;
        if bytes.is_empty() {
            return Err(StageError::new(13, "partner_tiny_bin_extractor: input file is empty"));
        }

        let name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "partner_tiny_bin".to_string());

        Ok(Font {
            name,
            payload: Payload::TinyStream(TinyStream { bytes }),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_stream_bytes_verbatim() {
        let dir = std::env::temp_dir().join(format!("snatch_tinybin_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("font.bin");
        std::fs::write(&path, [1u8, 2, 3, 4]).unwrap();

        let font = TinyBinExtractor.extract(&path, &OptionBag::new()).unwrap();
        assert_eq!(font.name, "font");
        assert!(font.bitmap.is_none());
        match &font.payload {
            Payload::TinyStream(stream) => assert_eq!(stream.bytes, vec![1, 2, 3, 4]),
            other => panic!("unexpected payload: {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!("snatch_tinybin_empty_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let err = TinyBinExtractor.extract(&path, &OptionBag::new()).unwrap_err();
        assert_eq!(err.code, 13);
        assert!(err.message.contains("input file is empty"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
