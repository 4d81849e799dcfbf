//! The output of the planner.
//!
//! A [`StreamPlan`] lists the streams of the converted file in output order
//! ([`PlanEntry`]) plus the source streams that were dropped. It is a
//! plain value: rendering it into transcoder arguments is the job of
//! [`CommandBuilder`](crate::CommandBuilder), and printing it (via
//! [`Display`]) gives the dry-run listing.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use crate::catalog::{StreamCatalog, StreamDescriptor, StreamKind};
use crate::language::Language;

/// Filter label of the synthesized companion audio track.
pub const DOWNMIX_LABEL: &str = "mobile";

/// Pan filter folding a 5.1 layout into stereo.
///
/// `FL' = FL + 0.707 FC + 0.707 BL`, `FR' = FR + 0.707 FC + 0.707 BR`.
pub const DOWNMIX_PAN: &str = "pan=stereo|FL<1.0*FL+0.707*FC+0.707*BL|FR<1.0*FR+0.707*FC+0.707*BR";

/// Where an output stream comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    /// A stream of the primary input, by container index.
    InternalStream(usize),
    /// A sidecar subtitle file, muxed as an extra input.
    ExternalFile(PathBuf),
    /// A stereo downmix of the primary-input stream `source_index`.
    SynthesizedMix { source_index: usize },
}

/// Whether players select the stream automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    None,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Disposition::Default => write!(f, "default"),
            Disposition::None => write!(f, "none"),
        }
    }
}

/// Codecs the MP4 output may be encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCodec {
    H264,
    Aac,
    MovText,
}

impl TargetCodec {
    /// Codec identifier on the transcoder command line.
    pub fn name(self) -> &'static str {
        match self {
            TargetCodec::H264 => "h264",
            TargetCodec::Aac => "aac",
            TargetCodec::MovText => "mov_text",
        }
    }
}

/// Copy the stream bit-exactly or re-encode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecDecision {
    Copy,
    Transcode(TargetCodec),
}

impl Display for CodecDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CodecDecision::Copy => write!(f, "copy"),
            CodecDecision::Transcode(codec) => write!(f, "{}", codec.name()),
        }
    }
}

/// One stream of the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub source: PlanSource,
    /// Position in the output container. Entries are numbered from 0
    /// without gaps.
    pub output_index: usize,
    pub kind: StreamKind,
    pub disposition: Disposition,
    pub codec: CodecDecision,
    /// Language written to the output metadata (audio and subtitles only).
    pub language: Option<Language>,
    /// Decode hint for sidecar subtitles.
    pub encoding: Option<String>,
    /// Channels of the encoded stream, used for the audio bitrate.
    pub channels: Option<u16>,
}

impl PlanEntry {
    /// Whether players should pick this stream by default.
    pub fn is_default(&self) -> bool {
        self.disposition == Disposition::Default
    }
}

/// Ordered decision for every stream of one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPlan {
    catalog: StreamCatalog,
    entries: Vec<PlanEntry>,
    deleted: Vec<usize>,
}

impl StreamPlan {
    pub(crate) fn new(catalog: StreamCatalog, entries: Vec<PlanEntry>, deleted: Vec<usize>) -> Self {
        Self {
            catalog,
            entries,
            deleted,
        }
    }

    /// Kept streams, in output order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Container indices of the streams left out of the output.
    pub fn deleted(&self) -> &[usize] {
        &self.deleted
    }

    /// The catalog the plan was computed from.
    pub fn catalog(&self) -> &StreamCatalog {
        &self.catalog
    }

    /// The entry fed by a stream of the primary input, if it was kept.
    pub fn entry_for_stream(&self, index: usize) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|entry| entry.source == PlanSource::InternalStream(index))
    }

    /// The synthesized companion audio entry, if any.
    pub fn synthesized_mix(&self) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|entry| matches!(entry.source, PlanSource::SynthesizedMix { .. }))
    }

    /// Sidecar files in the order they become secondary inputs.
    pub fn external_files(&self) -> impl Iterator<Item = &PathBuf> + '_ {
        self.entries.iter().filter_map(|entry| match &entry.source {
            PlanSource::ExternalFile(path) => Some(path),
            _ => None,
        })
    }
}

fn write_stream(f: &mut Formatter<'_>, stream: &StreamDescriptor) -> FmtResult {
    write!(
        f,
        "  {} stream [{}] lang={} codec={}",
        stream.kind,
        stream.index,
        stream.language.alpha3(),
        stream.codec_name
    )?;
    if let (StreamKind::Audio, Some(channels)) = (stream.kind, stream.channels) {
        write!(f, " channels={channels}")?;
    }
    Ok(())
}

impl Display for StreamPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for entry in &self.entries {
            let language = entry.language.as_ref().map_or("und", Language::alpha3);
            match &entry.source {
                PlanSource::InternalStream(index) | PlanSource::SynthesizedMix { source_index: index } => {
                    match self.catalog.stream(*index) {
                        Some(stream) => write_stream(f, stream)?,
                        None => write!(f, "  stream [{index}]")?,
                    }
                }
                PlanSource::ExternalFile(path) => {
                    let name = path
                        .file_name()
                        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
                    write!(
                        f,
                        "  ({name}) lang={language} encoding={}",
                        entry.encoding.as_deref().unwrap_or("??")
                    )?;
                }
            }

            write!(f, " -> [{}] codec={}", entry.output_index, entry.codec)?;
            if matches!(entry.source, PlanSource::SynthesizedMix { .. }) {
                write!(f, " (mobile)")?;
            }
            if entry.is_default() {
                write!(f, " **")?;
            }
            writeln!(f)?;
        }

        for index in &self.deleted {
            if let Some(stream) = self.catalog.stream(*index) {
                write_stream(f, stream)?;
                writeln!(f, " -> [deleted]")?;
            }
        }

        Ok(())
    }
}
