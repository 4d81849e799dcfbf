//! # tomp4
//!
//! Convert movies to MP4 while keeping the streams that matter: the right
//! audio language as the default track, a stereo companion track for
//! phones, and subtitles in the languages you read, taken from the
//! container or from `.srt` files lying next to it.
//!
//! `tomp4` does not encode anything itself. It inspects the source with
//! FFmpeg via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)
//! crate, decides what each stream becomes, renders that decision into an
//! `ffmpeg` command line, and supervises the `ffmpeg` process.
//!
//! ## Quick Start
//!
//! ### Plan a Conversion
//!
//! ```no_run
//! use tomp4::{LanguagePreference, MediaProbe, PlanOptions, Planner};
//!
//! let catalog = MediaProbe::probe("movie.mkv")?;
//! let preference = LanguagePreference::parse(&["en-gb", "fra"])?;
//! let options = PlanOptions::new()
//!     .with_mobile_audio(true)
//!     .with_default_subtitle_language("en-gb".parse()?);
//!
//! let plan = Planner::new(&preference, &options).plan(&catalog)?;
//! print!("{plan}");
//! # Ok::<(), tomp4::ConvertError>(())
//! ```
//!
//! ### Run It
//!
//! ```no_run
//! use tomp4::{
//!     AacEncoder, CommandBuilder, LanguagePreference, MediaProbe, PlanOptions, Planner,
//!     ProcessMonitor, ProgressTotal, TranscodeOptions,
//! };
//!
//! let catalog = MediaProbe::probe("movie.mkv")?;
//! let preference = LanguagePreference::parse(&["eng"])?;
//! let plan = Planner::new(&preference, &PlanOptions::new()).plan(&catalog)?;
//!
//! let options = TranscodeOptions::new();
//! let command = CommandBuilder::new(&plan)
//!     .threads(4)
//!     .audio_encoder(AacEncoder::detect(options.ffmpeg()))
//!     .build("movie.mp4");
//!
//! let report = ProcessMonitor::new(&options)
//!     .run(&command, ProgressTotal::for_container(catalog.container()))?;
//! assert!(report.success());
//! # Ok::<(), tomp4::ConvertError>(())
//! ```
//!
//! ## Features
//!
//! - **Language-aware audio**: default track by preference order, one
//!   extra track per further language
//! - **Mobile audio**: reuse a stereo track or downmix 5.1 to stereo
//! - **Subtitles**: internal streams or sidecar `movie.<lang>.srt` files,
//!   with region-specific names tried first and text encoding detection
//! - **Minimal re-encoding**: H.264, AAC, and `mov_text` streams are copied
//! - **Dry runs**: the plan and the command line are printable values
//! - **Progress & cancellation**: callbacks fed from `ffmpeg`'s status
//!   line and a `CancellationToken` that stops the process
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed for probing, and an
//! `ffmpeg` executable for converting.

pub mod capabilities;
pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod language;
pub mod monitor;
pub mod plan;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod sidecar;

pub use capabilities::{AacEncoder, CodecCapability, EncoderCapabilities};
pub use catalog::{ContainerInfo, StreamCatalog, StreamDescriptor, StreamKind};
pub use command::{CommandBuilder, TranscodeCommand};
pub use config::{DEFAULT_FFMPEG, PlanOptions, TranscodeOptions};
pub use error::ConvertError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use language::{Language, LanguagePreference};
pub use monitor::{MonitorReport, OutputLine, ProcessMonitor};
pub use plan::{CodecDecision, Disposition, PlanEntry, PlanSource, StreamPlan, TargetCodec};
pub use planner::Planner;
pub use probe::MediaProbe;
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo, ProgressTotal, ProgressUnit};
pub use sidecar::{ExternalSubtitleFile, SidecarResolver, SubtitleResolver, detect_text_encoding, sidecar_path};
