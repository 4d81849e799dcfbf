//! Rendering a [`StreamPlan`] into transcoder arguments.
//!
//! The argument order is fixed:
//!
//! 1. `-threads N -fix_sub_duration -i <source>`
//! 2. `[-sub_charenc ENC] -i <sidecar>` per sidecar subtitle
//! 3. one `-map` per output stream
//! 4. per output stream: `-disposition:i`, `-codec:i …`, the downmix
//!    `-filter_complex` for a synthesized track, `-metadata:s:i language=…`
//!    for audio and subtitles
//! 5. `-movflags +faststart <output>`
//!
//! # Example
//!
//! ```no_run
//! use tomp4::{AacEncoder, CommandBuilder, LanguagePreference, MediaProbe, PlanOptions, Planner};
//!
//! let catalog = MediaProbe::probe("movie.mkv")?;
//! let preference = LanguagePreference::parse(&["eng"])?;
//! let plan = Planner::new(&preference, &PlanOptions::new()).plan(&catalog)?;
//!
//! let command = CommandBuilder::new(&plan)
//!     .threads(2)
//!     .audio_encoder(AacEncoder::Native)
//!     .build("movie.mp4");
//! println!("ffmpeg {command}");
//! # Ok::<(), tomp4::ConvertError>(())
//! ```

use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use crate::capabilities::AacEncoder;
use crate::catalog::StreamKind;
use crate::plan::{CodecDecision, DOWNMIX_LABEL, DOWNMIX_PAN, PlanEntry, PlanSource, StreamPlan, TargetCodec};

/// Bitrate of the native AAC encoder, per channel.
const AAC_KBPS_PER_CHANNEL: u32 = 64;

/// Builds the transcoder arguments for a plan.
///
/// Building is a pure function of the plan and the builder settings: the
/// same inputs always give the same arguments.
#[derive(Debug, Clone)]
pub struct CommandBuilder<'p> {
    plan: &'p StreamPlan,
    threads: usize,
    audio_encoder: AacEncoder,
}

impl<'p> CommandBuilder<'p> {
    /// Builder with automatic threading and the native AAC encoder.
    pub fn new(plan: &'p StreamPlan) -> Self {
        Self {
            plan,
            threads: 0,
            audio_encoder: AacEncoder::Native,
        }
    }

    /// Encoder thread count, `0` lets the transcoder decide.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// AAC encoder for re-encoded audio.
    #[must_use]
    pub fn audio_encoder(mut self, encoder: AacEncoder) -> Self {
        self.audio_encoder = encoder;
        self
    }

    /// Render the arguments for converting into `output`.
    pub fn build<P: AsRef<Path>>(&self, output: P) -> TranscodeCommand {
        let mut args: Vec<OsString> = vec![
            "-threads".into(),
            self.threads.to_string().into(),
            "-fix_sub_duration".into(),
            "-i".into(),
            self.plan.catalog().source_path().into(),
        ];

        for entry in self.plan.entries() {
            if let PlanSource::ExternalFile(path) = &entry.source {
                if let Some(encoding) = &entry.encoding {
                    args.extend(["-sub_charenc".into(), encoding.into()]);
                }
                args.extend(["-i".into(), path.into()]);
            }
        }

        let mut next_input = 1;
        for entry in self.plan.entries() {
            let map = match &entry.source {
                PlanSource::InternalStream(index) => format!("0:{index}"),
                PlanSource::ExternalFile(_) => {
                    let slot = next_input;
                    next_input += 1;
                    format!("{slot}:0")
                }
                PlanSource::SynthesizedMix { .. } => format!("[{DOWNMIX_LABEL}]"),
            };
            args.extend(["-map".into(), map.into()]);
        }

        for entry in self.plan.entries() {
            self.push_stream_options(&mut args, entry);
        }

        args.extend(["-movflags".into(), "+faststart".into(), output.as_ref().into()]);

        TranscodeCommand { args }
    }

    fn push_stream_options(&self, args: &mut Vec<OsString>, entry: &PlanEntry) {
        let index = entry.output_index;

        args.extend([
            format!("-disposition:{index}").into(),
            entry.disposition.to_string().into(),
        ]);
        args.push(format!("-codec:{index}").into());
        match entry.codec {
            CodecDecision::Copy => args.push("copy".into()),
            CodecDecision::Transcode(TargetCodec::H264) => {
                args.extend(["libx264", "-preset", "slower", "-crf", "21"].map(OsString::from));
            }
            CodecDecision::Transcode(TargetCodec::Aac) => match self.audio_encoder {
                AacEncoder::Fdk => {
                    args.extend(["libfdk_aac", "-vbr", "4"].map(OsString::from));
                }
                AacEncoder::Native => {
                    let channels = u32::from(entry.channels.unwrap_or(2));
                    args.extend([
                        "aac".into(),
                        format!("-b:{index}").into(),
                        format!("{}k", channels * AAC_KBPS_PER_CHANNEL).into(),
                    ]);
                }
            },
            CodecDecision::Transcode(TargetCodec::MovText) => args.push("mov_text".into()),
        }

        if let PlanSource::SynthesizedMix { source_index } = entry.source {
            args.extend([
                "-filter_complex".into(),
                format!("[0:{source_index}]{DOWNMIX_PAN}[{DOWNMIX_LABEL}]").into(),
            ]);
        }

        if entry.kind == StreamKind::Video {
            return;
        }
        if let Some(language) = &entry.language {
            args.extend([
                format!("-metadata:s:{index}").into(),
                format!("language={}", language.alpha3()).into(),
            ]);
        }
    }
}

/// Arguments for one transcoder run, program name excluded.
///
/// Paths are kept as [`OsString`]s so that file names which are not valid
/// UTF-8 reach the transcoder unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct TranscodeCommand {
    args: Vec<OsString>,
}

impl TranscodeCommand {
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn into_args(self) -> Vec<OsString> {
        self.args
    }
}

/// Arbitrary arguments, e.g. for a program standing in for the transcoder.
impl<S: Into<OsString>> FromIterator<S> for TranscodeCommand {
    fn from_iter<I: IntoIterator<Item = S>>(args: I) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// POSIX shell rendering, for logs and dry runs.
///
/// Arguments are quoted where the shell would otherwise split or expand
/// them. Non-UTF-8 bytes are shown as U+FFFD.
impl Display for TranscodeCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (position, arg) in self.args.iter().enumerate() {
            if position > 0 {
                write!(f, " ")?;
            }
            let arg = arg.to_string_lossy();
            match shlex::try_quote(&arg) {
                Ok(quoted) => write!(f, "{quoted}")?,
                // Only NUL bytes cannot be quoted, and no process accepts them.
                Err(_) => write!(f, "{arg:?}")?,
            }
        }
        Ok(())
    }
}
