//! Encoder capabilities of the installed transcoder.
//!
//! `ffmpeg -codecs` prints one line per codec:
//!
//! ```text
//!  DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed ) (encoders: aac libfdk_aac )
//! ```
//!
//! [`EncoderCapabilities`] parses that table so the command builder can
//! prefer the Fraunhofer AAC encoder when the build includes it.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::StreamKind;
use crate::error::ConvertError;

static CODEC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s(?P<decode>[D.])(?P<encode>[E.])(?P<kind>[AVSDT.])[I.][L.][S.]\s(?P<codec>\w+)\s+(?P<description>.*)$",
    )
    .expect("codec table pattern is valid")
});

/// One row of the codec table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCapability {
    pub can_decode: bool,
    pub can_encode: bool,
    /// `None` for data and attachment codecs.
    pub kind: Option<StreamKind>,
    pub description: String,
}

/// Codec table of a transcoder build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderCapabilities {
    codecs: HashMap<String, CodecCapability>,
}

impl EncoderCapabilities {
    /// Run `<ffmpeg> -hide_banner -codecs` and parse its output.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::CapabilityQuery`] if the program cannot be
    /// run or exits unsuccessfully.
    pub fn query(ffmpeg: &Path) -> Result<Self, ConvertError> {
        let output = Command::new(ffmpeg)
            .args(["-hide_banner", "-codecs"])
            .stdin(Stdio::null())
            .output()
            .map_err(|error| ConvertError::CapabilityQuery(format!("{}: {error}", ffmpeg.display())))?;

        if !output.status.success() {
            return Err(ConvertError::CapabilityQuery(format!(
                "{} -codecs exited with {}",
                ffmpeg.display(),
                output.status
            )));
        }

        Ok(Self::parse(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Parse the codec table. Lines that are not table rows are skipped.
    pub fn parse(table: &str) -> Self {
        let codecs = table
            .lines()
            .filter_map(|line| CODEC_LINE.captures(line))
            .map(|captures| {
                let kind = match &captures["kind"] {
                    "A" => Some(StreamKind::Audio),
                    "V" => Some(StreamKind::Video),
                    "S" => Some(StreamKind::Subtitle),
                    _ => None,
                };
                let capability = CodecCapability {
                    can_decode: &captures["decode"] == "D",
                    can_encode: &captures["encode"] == "E",
                    kind,
                    description: captures["description"].trim().to_string(),
                };
                (captures["codec"].to_string(), capability)
            })
            .collect();

        Self { codecs }
    }

    /// Capability row for `codec`.
    pub fn codec(&self, codec: &str) -> Option<&CodecCapability> {
        self.codecs.get(codec)
    }

    /// Whether the `aac` row lists the Fraunhofer encoder.
    pub fn has_fdk_aac(&self) -> bool {
        self.codec("aac")
            .is_some_and(|aac| aac.description.contains("libfdk_aac"))
    }

    /// Number of codecs in the table.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// AAC encoder used for audio that has to be re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AacEncoder {
    /// `libfdk_aac -vbr 4`.
    Fdk,
    /// FFmpeg's own `aac` at 64 kbit/s per channel.
    #[default]
    Native,
}

impl AacEncoder {
    /// The best encoder the table advertises.
    pub fn from_capabilities(capabilities: &EncoderCapabilities) -> Self {
        if capabilities.has_fdk_aac() {
            AacEncoder::Fdk
        } else {
            AacEncoder::Native
        }
    }

    /// Query `ffmpeg` and pick the best encoder, falling back to the
    /// native one if the query fails.
    pub fn detect(ffmpeg: &Path) -> Self {
        match EncoderCapabilities::query(ffmpeg) {
            Ok(capabilities) => {
                let encoder = Self::from_capabilities(&capabilities);
                log::debug!("AAC encoder: {encoder:?} ({} codecs known)", capabilities.len());
                encoder
            }
            Err(error) => {
                log::warn!("{error} - using the native AAC encoder");
                AacEncoder::Native
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Codecs:
 D..... = Decoding supported
 .E.... = Encoding supported
 ..V... = Video codec
 -------
 DEV.LS h264                 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (decoders: h264 h264_v4l2m2m ) (encoders: libx264 libx264rgb )
 DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed ) (encoders: aac libfdk_aac )
 D.A.L. truehd               TrueHD
 DES... mov_text             MOV text
 D.D... bin_data             binary data
";

    #[test]
    fn parse_table_rows() {
        let capabilities = EncoderCapabilities::parse(TABLE);
        assert_eq!(capabilities.len(), 5);

        let truehd = capabilities.codec("truehd").unwrap();
        assert!(truehd.can_decode);
        assert!(!truehd.can_encode);
        assert_eq!(truehd.kind, Some(StreamKind::Audio));

        assert_eq!(capabilities.codec("bin_data").unwrap().kind, None);
        assert!(capabilities.codec("mov_text").unwrap().can_encode);
    }

    #[test]
    fn fdk_is_detected_from_aac_row() {
        let capabilities = EncoderCapabilities::parse(TABLE);
        assert_eq!(AacEncoder::from_capabilities(&capabilities), AacEncoder::Fdk);

        let stock = EncoderCapabilities::parse(
            " DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed )\n",
        );
        assert_eq!(AacEncoder::from_capabilities(&stock), AacEncoder::Native);
        assert_eq!(AacEncoder::from_capabilities(&EncoderCapabilities::default()), AacEncoder::Native);
    }
}
