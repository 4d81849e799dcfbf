//! Stream catalog construction through the FFmpeg libraries.
//!
//! [`MediaProbe`] opens a container with `ffmpeg-next`, reads the stream
//! table, and closes the demuxer again. The result is the same
//! [`StreamCatalog`] that [`StreamCatalog::from_ffprobe_json`] produces from
//! saved `ffprobe` output.

use std::path::Path;
use std::time::Duration;

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    format::stream::{Disposition, Stream},
    media::Type,
};

use crate::catalog::{StreamCatalog, StreamDescriptor, StreamKind};
use crate::error::ConvertError;
use crate::language::Language;

/// Media file prober.
///
/// # Example
///
/// ```no_run
/// use tomp4::{MediaProbe, StreamKind};
///
/// let catalog = MediaProbe::probe("movie.mkv")?;
/// for stream in catalog.streams_of(StreamKind::Audio) {
///     println!("[{}] {} {}ch", stream.index, stream.language, stream.channels.unwrap_or(0));
/// }
/// # Ok::<(), tomp4::ConvertError>(())
/// ```
pub struct MediaProbe;

impl MediaProbe {
    /// Probe a media file and return its stream catalog.
    ///
    /// # Errors
    ///
    /// - [`ConvertError::FileOpen`] if the file cannot be opened or
    ///   recognised as a media file.
    /// - [`ConvertError::MalformedStream`] if an audio stream reports no
    ///   channel layout or a stream has no codec.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<StreamCatalog, ConvertError> {
        let path = path.as_ref();

        ffmpeg_next::init().map_err(|error| ConvertError::FileOpen {
            path: path.to_path_buf(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| ConvertError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let duration_microseconds = input.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let mut streams = Vec::new();
        for stream in input.streams() {
            if let Some(descriptor) = describe(&stream)? {
                streams.push(descriptor);
            }
        }

        log::debug!(
            "Probed {} ({} usable streams, {:.3}s)",
            path.display(),
            streams.len(),
            duration.as_secs_f64()
        );

        Ok(StreamCatalog::new(path, duration, streams))
    }
}

fn describe(stream: &Stream<'_>) -> Result<Option<StreamDescriptor>, ConvertError> {
    let index = stream.index();
    let parameters = stream.parameters();

    let kind = match parameters.medium() {
        Type::Video => StreamKind::Video,
        Type::Audio => StreamKind::Audio,
        Type::Subtitle => StreamKind::Subtitle,
        other => {
            log::debug!("Ignoring {other:?} stream (index={index})");
            return Ok(None);
        }
    };

    let codec_name = parameters.id().name();
    if codec_name.is_empty() || codec_name == "none" {
        return Err(ConvertError::MalformedStream {
            index: Some(index),
            attribute: "codec_name",
        });
    }

    let channels = if kind == StreamKind::Audio {
        let decoder = CodecContext::from_parameters(parameters)
            .and_then(|context| context.decoder().audio())
            .map_err(|error| {
                log::debug!("Cannot open audio decoder for stream {index}: {error}");
                ConvertError::MalformedStream {
                    index: Some(index),
                    attribute: "channels",
                }
            })?;
        Some(decoder.channels())
    } else {
        None
    };

    let language = Language::from_stream_tag(stream.metadata().get("language"));
    let is_default = stream.disposition().contains(Disposition::DEFAULT);
    let frames = stream.frames();

    let descriptor = StreamDescriptor::new(index, kind, codec_name, channels, language, is_default)?
        .with_frame_count((frames > 0).then_some(frames as u64));
    Ok(Some(descriptor))
}
