//! Typed view over a probed container.
//!
//! A [`StreamCatalog`] holds one [`StreamDescriptor`] per video, audio, or
//! subtitle stream plus the container-level facts ([`ContainerInfo`]) the
//! planner and progress display need. Catalogs are built either directly
//! from FFmpeg ([`MediaProbe`](crate::MediaProbe)) or from the JSON printed
//! by `ffprobe -print_format json -show_format -show_streams`.
//!
//! # Example
//!
//! ```
//! use tomp4::{StreamCatalog, StreamKind};
//!
//! let catalog = StreamCatalog::from_ffprobe_json(r#"{
//!     "streams": [
//!         {"index": 0, "codec_type": "video", "codec_name": "h264",
//!          "disposition": {"default": 1}},
//!         {"index": 1, "codec_type": "audio", "codec_name": "ac3",
//!          "channels": 6, "tags": {"language": "fre"}}
//!     ],
//!     "format": {"filename": "movie.mkv", "duration": "5.568000"}
//! }"#)?;
//!
//! assert_eq!(catalog.streams_of(StreamKind::Audio).count(), 1);
//! # Ok::<(), tomp4::ConvertError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::error::ConvertError;
use crate::language::Language;

/// The kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

impl StreamKind {
    /// Map an ffprobe `codec_type` string. Other stream types (data,
    /// attachments) yield `None`.
    pub fn from_codec_type(codec_type: &str) -> Option<Self> {
        match codec_type {
            "video" => Some(StreamKind::Video),
            "audio" => Some(StreamKind::Audio),
            "subtitle" => Some(StreamKind::Subtitle),
            _ => None,
        }
    }
}

impl Display for StreamKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// One elementary stream of the source container.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct StreamDescriptor {
    /// Stream index inside the container (`0:<index>` for the transcoder).
    pub index: usize,
    /// Video, audio, or subtitle.
    pub kind: StreamKind,
    /// Decoder name as reported by the prober (e.g. `"h264"`, `"aac"`).
    pub codec_name: String,
    /// Channel count. Always present for audio streams.
    pub channels: Option<u16>,
    /// Language tag, [`Language::undetermined`] when absent.
    pub language: Language,
    /// Whether the stream carries the `default` disposition.
    pub is_default: bool,
    /// Frame count reported by the container, if any.
    pub frame_count: Option<u64>,
}

impl StreamDescriptor {
    /// Create a descriptor, validating the attributes the planner relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::MalformedStream`] if `codec_name` is empty
    /// or an audio stream has no channel count.
    pub fn new(
        index: usize,
        kind: StreamKind,
        codec_name: impl Into<String>,
        channels: Option<u16>,
        language: Language,
        is_default: bool,
    ) -> Result<Self, ConvertError> {
        let codec_name = codec_name.into();
        if codec_name.trim().is_empty() {
            return Err(ConvertError::MalformedStream {
                index: Some(index),
                attribute: "codec_name",
            });
        }
        if kind == StreamKind::Audio && channels.is_none() {
            return Err(ConvertError::MalformedStream {
                index: Some(index),
                attribute: "channels",
            });
        }

        Ok(Self {
            index,
            kind,
            codec_name,
            channels,
            language,
            is_default,
            frame_count: None,
        })
    }

    /// Attach the frame count reported by the container.
    pub fn with_frame_count(mut self, frames: Option<u64>) -> Self {
        self.frame_count = frames.filter(|&frames| frames > 0);
        self
    }

    /// Whether the codec name contains any of `needles`.
    ///
    /// Decoder names vary with how FFmpeg was built (`h264`, `libx264`,
    /// `aac_fixed`), so a substring match is used.
    pub fn codec_matches(&self, needles: &[&str]) -> bool {
        needles
            .iter()
            .any(|needle| self.codec_name.contains(needle))
    }
}

/// Container-level facts.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ContainerInfo {
    /// Path of the source media file.
    pub path: PathBuf,
    /// Total duration of the container.
    pub duration: Duration,
    /// Frames in the main video stream, when the container records it.
    pub frame_count: Option<u64>,
}

/// The probed streams of one media file.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamCatalog {
    streams: Vec<StreamDescriptor>,
    container: ContainerInfo,
}

impl StreamCatalog {
    /// Assemble a catalog from already-validated descriptors.
    ///
    /// The container frame count is taken from the video stream the planner
    /// will keep: the only default-flagged one, or the first video stream
    /// when zero or several carry the flag.
    pub fn new(path: impl Into<PathBuf>, duration: Duration, streams: Vec<StreamDescriptor>) -> Self {
        let frame_count = {
            let videos: Vec<&StreamDescriptor> = streams
                .iter()
                .filter(|s| s.kind == StreamKind::Video)
                .collect();
            let mut flagged = videos.iter().filter(|s| s.is_default);
            let main = match (flagged.next(), flagged.next()) {
                (Some(only), None) => Some(*only),
                _ => videos.first().copied(),
            };
            main.and_then(|s| s.frame_count)
        };

        Self {
            streams,
            container: ContainerInfo {
                path: path.into(),
                duration,
                frame_count,
            },
        }
    }

    /// Parse `ffprobe -print_format json -show_format -show_streams` output.
    ///
    /// Streams other than video, audio, and subtitle are skipped.
    ///
    /// # Errors
    ///
    /// - [`ConvertError::InvalidProbeData`] if the text is not JSON or has
    ///   no `streams` array.
    /// - [`ConvertError::MalformedStream`] if a stream lacks `index`,
    ///   `codec_type`, `codec_name`, or (for audio) `channels`.
    pub fn from_ffprobe_json(json: &str) -> Result<Self, ConvertError> {
        let root: Value = serde_json::from_str(json)
            .map_err(|error| ConvertError::InvalidProbeData(error.to_string()))?;

        let raw_streams = root
            .get("streams")
            .and_then(Value::as_array)
            .ok_or_else(|| ConvertError::InvalidProbeData("missing `streams` array".to_string()))?;

        let mut streams = Vec::with_capacity(raw_streams.len());
        for raw in raw_streams {
            if let Some(stream) = descriptor_from_json(raw)? {
                streams.push(stream);
            }
        }

        let format = root.get("format");
        let path = format
            .and_then(|f| f.get("filename"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let duration = format
            .and_then(|f| f.get("duration"))
            .and_then(number_or_string)
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);

        Ok(Self::new(path, duration, streams))
    }

    /// Replace the recorded source path.
    ///
    /// Probe output saved on another machine names a foreign path; sidecar
    /// discovery must look next to the file actually being converted.
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.container.path = path.into();
        self
    }

    /// All streams, in container order.
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Streams of one kind, in container order.
    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &StreamDescriptor> + '_ {
        self.streams.iter().filter(move |s| s.kind == kind)
    }

    /// Look up a stream by its container index.
    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.index == index)
    }

    /// Container-level facts.
    pub fn container(&self) -> &ContainerInfo {
        &self.container
    }

    /// Path of the source media file.
    pub fn source_path(&self) -> &Path {
        &self.container.path
    }
}

fn descriptor_from_json(raw: &Value) -> Result<Option<StreamDescriptor>, ConvertError> {
    let index = raw
        .get("index")
        .and_then(Value::as_u64)
        .map(|index| index as usize)
        .ok_or(ConvertError::MalformedStream {
            index: None,
            attribute: "index",
        })?;

    let missing = |attribute| ConvertError::MalformedStream {
        index: Some(index),
        attribute,
    };

    let codec_type = raw
        .get("codec_type")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("codec_type"))?;
    let Some(kind) = StreamKind::from_codec_type(codec_type) else {
        log::debug!("Ignoring {codec_type} stream (index={index})");
        return Ok(None);
    };

    let codec_name = raw
        .get("codec_name")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("codec_name"))?;

    let channels = raw
        .get("channels")
        .and_then(Value::as_u64)
        .map(|channels| channels as u16);

    let language = Language::from_stream_tag(
        raw.get("tags")
            .and_then(|tags| tags.get("language"))
            .and_then(Value::as_str),
    );

    let is_default = raw
        .get("disposition")
        .and_then(|d| d.get("default"))
        .and_then(Value::as_u64)
        .is_some_and(|flag| flag == 1);

    let frame_count = raw
        .get("nb_frames")
        .and_then(number_or_string)
        .map(|frames| frames as u64);

    let descriptor = StreamDescriptor::new(index, kind, codec_name, channels, language, is_default)?
        .with_frame_count(frame_count);
    Ok(Some(descriptor))
}

/// ffprobe prints most numbers as strings (`"duration": "5.568000"`).
fn number_or_string(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
