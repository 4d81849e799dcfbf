//! Planning and transcoding configuration.
//!
//! [`PlanOptions`] carries the user's stream-selection flags into the
//! [`Planner`](crate::Planner). [`TranscodeOptions`] gives
//! [`ProcessMonitor`](crate::ProcessMonitor) the transcoder location, a
//! progress callback and a cancellation token. Encoder threads are part of
//! the command line and set on [`CommandBuilder`](crate::CommandBuilder).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tomp4::{CancellationToken, PlanOptions, ProgressCallback, ProgressInfo, TranscodeOptions};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:.0} {:?}", info.current, info.unit);
//!     }
//! }
//!
//! let plan_options = PlanOptions::new()
//!     .with_mobile_audio(true)
//!     .with_default_subtitle_language("en-gb".parse()?);
//!
//! let token = CancellationToken::new();
//! let transcode_options = TranscodeOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! # Ok::<(), tomp4::ConvertError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::language::Language;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Transcoder executable used when none is configured.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Stream-selection flags for the planner.
///
/// The default keeps one audio stream per requested language, honours
/// internal subtitles, and adds no companion audio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub(crate) mobile_audio: bool,
    pub(crate) preserve_extra_audio: bool,
    pub(crate) ignore_internal_subtitles: bool,
    pub(crate) default_subtitle_language: Option<Language>,
}

impl PlanOptions {
    /// Create options with every flag off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stereo companion track when the main audio has more than two
    /// channels, reusing an existing stereo track of the same language when
    /// there is one.
    #[must_use]
    pub fn with_mobile_audio(mut self, enabled: bool) -> Self {
        self.mobile_audio = enabled;
        self
    }

    /// Keep audio streams in the default language and untagged streams
    /// available for the secondary-language pass.
    #[must_use]
    pub fn with_preserve_extra_audio(mut self, enabled: bool) -> Self {
        self.preserve_extra_audio = enabled;
        self
    }

    /// Ignore subtitle streams embedded in the source; only sidecar files
    /// are used.
    #[must_use]
    pub fn with_ignore_internal_subtitles(mut self, enabled: bool) -> Self {
        self.ignore_internal_subtitles = enabled;
        self
    }

    /// Subtitle language shown by default. It is also tried first.
    #[must_use]
    pub fn with_default_subtitle_language(mut self, language: Language) -> Self {
        self.default_subtitle_language = Some(language);
        self
    }

    pub fn mobile_audio(&self) -> bool {
        self.mobile_audio
    }

    pub fn preserve_extra_audio(&self) -> bool {
        self.preserve_extra_audio
    }

    pub fn ignore_internal_subtitles(&self) -> bool {
        self.ignore_internal_subtitles
    }

    pub fn default_subtitle_language(&self) -> Option<&Language> {
        self.default_subtitle_language.as_ref()
    }
}

/// Settings for running the external transcoder.
#[derive(Clone)]
pub struct TranscodeOptions {
    /// Transcoder executable.
    pub(crate) ffmpeg: PathBuf,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for TranscodeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TranscodeOptions")
            .field("ffmpeg", &self.ffmpeg)
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeOptions {
    /// Create options with default settings.
    ///
    /// Defaults: `ffmpeg` from `PATH`, no progress callback, no
    /// cancellation.
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Use a specific transcoder executable.
    #[must_use]
    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    /// Attach a progress callback, fired for every progress line.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// Cancelling kills the transcoder; the run then ends like any other
    /// abnormal termination.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
