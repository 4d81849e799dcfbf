//! Supervision of the external transcoder.
//!
//! [`ProcessMonitor`] starts the transcoder with a [`TranscodeCommand`] and
//! follows its combined output (stdout and stderr, interleaved as lines
//! arrive) until both streams end. Every line is
//! classified as either a progress line (frame counter, encoded time,
//! speed) or a diagnostic, which is logged at debug level. The transcoder
//! rewrites its progress line in place with `\r`, so both `\r` and `\n`
//! end a line.
//!
//! Nothing here times out: the monitor returns when the transcoder closes
//! both outputs, normally or because it was killed after a
//! [`CancellationToken`](crate::CancellationToken) fired.

use std::io::{ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::LazyLock;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use regex::Regex;

use crate::command::TranscodeCommand;
use crate::config::TranscodeOptions;
use crate::error::ConvertError;
use crate::progress::{ProgressInfo, ProgressTotal, ProgressTracker, ProgressUnit};

static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"frame=\s*(?P<frame>\d+)\s+.*time=\s*(?P<time>[\d.:]+).*\s+speed=\s*(?P<speed>\d+(\.\d+)?)x\s*")
        .expect("progress pattern is valid")
});

/// How often the cancellation token is checked while no output arrives.
const CANCEL_POLL: Duration = Duration::from_millis(200);

/// A classified line of transcoder output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    /// `frame= 120 fps= 30 … time=00:00:05.00 … speed=1.5x`
    Progress {
        frame: u64,
        /// Encoded time in seconds.
        time: f64,
        speed: f64,
    },
    /// Anything else.
    Diagnostic(String),
}

impl OutputLine {
    /// Classify one line. Blank lines yield `None`.
    pub fn classify(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line.trim().is_empty() {
            return None;
        }

        let progress = PROGRESS_LINE.captures(line).and_then(|captures| {
            Some(OutputLine::Progress {
                frame: captures["frame"].parse().ok()?,
                time: parse_clock(&captures["time"])?,
                speed: captures["speed"].parse().ok()?,
            })
        });
        Some(progress.unwrap_or_else(|| OutputLine::Diagnostic(line.to_string())))
    }
}

/// `HH:MM:SS.ss` (or fewer fields) to seconds.
fn parse_clock(clock: &str) -> Option<f64> {
    clock.split(':').try_fold(0.0, |seconds: f64, field| {
        field.parse::<f64>().ok().map(|value| seconds * 60.0 + value)
    })
}

/// Split a byte stream into lines at `\r` and `\n`, passing each non-empty
/// line to `sink`. Invalid UTF-8 is replaced.
///
/// Returns when the stream ends.
pub fn split_lines<R: Read, F: FnMut(String)>(mut reader: R, mut sink: F) -> std::io::Result<()> {
    let mut buffer = [0_u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => count,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };

        for &byte in &buffer[..count] {
            if byte == b'\r' || byte == b'\n' {
                if !pending.is_empty() {
                    sink(String::from_utf8_lossy(&pending).into_owned());
                    pending.clear();
                }
            } else {
                pending.push(byte);
            }
        }
    }

    if !pending.is_empty() {
        sink(String::from_utf8_lossy(&pending).into_owned());
    }
    Ok(())
}

/// Outcome of a transcoder run.
#[derive(Debug, Clone)]
pub struct MonitorReport {
    /// Exit status of the transcoder.
    pub status: ExitStatus,
    /// Last progress snapshot.
    pub progress: ProgressInfo,
    /// Whether the run was cancelled through the token.
    pub cancelled: bool,
}

impl MonitorReport {
    pub fn success(&self) -> bool {
        self.status.success() && !self.cancelled
    }

    /// Exit code for the calling process: the transcoder's own code, or 1
    /// if it was terminated by a signal.
    pub fn exit_code(&self) -> i32 {
        match self.status.code() {
            Some(code) => code,
            None => 1,
        }
    }
}

/// Runs one transcoder process and reports its progress.
///
/// # Example
///
/// ```no_run
/// use tomp4::{
///     CommandBuilder, LanguagePreference, MediaProbe, PlanOptions, Planner, ProcessMonitor,
///     ProgressTotal, TranscodeOptions,
/// };
///
/// let catalog = MediaProbe::probe("movie.mkv")?;
/// let preference = LanguagePreference::parse(&["eng"])?;
/// let plan = Planner::new(&preference, &PlanOptions::new()).plan(&catalog)?;
/// let command = CommandBuilder::new(&plan).build("movie.mp4");
///
/// let options = TranscodeOptions::new();
/// let report = ProcessMonitor::new(&options)
///     .run(&command, ProgressTotal::for_container(catalog.container()))?;
/// std::process::exit(report.exit_code());
/// # Ok::<(), tomp4::ConvertError>(())
/// ```
#[derive(Debug)]
pub struct ProcessMonitor<'o> {
    options: &'o TranscodeOptions,
}

impl<'o> ProcessMonitor<'o> {
    pub fn new(options: &'o TranscodeOptions) -> Self {
        Self { options }
    }

    /// Run the transcoder to completion.
    ///
    /// # Errors
    ///
    /// - [`ConvertError::TranscoderSpawn`] if the program cannot be started.
    /// - [`ConvertError::IoError`] if waiting for it fails.
    ///
    /// A non-zero exit is not an error; it is reported in the
    /// [`MonitorReport`].
    pub fn run(&self, command: &TranscodeCommand, total: ProgressTotal) -> Result<MonitorReport, ConvertError> {
        let program = &self.options.ffmpeg;
        log::info!("Running {} {command}", program.display());

        let mut child = Command::new(program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| ConvertError::TranscoderSpawn {
                program: program.clone(),
                reason: error.to_string(),
            })?;

        let not_captured = |stream: &str| ConvertError::TranscoderSpawn {
            program: program.clone(),
            reason: format!("{stream} was not captured"),
        };
        let stdout = child.stdout.take().ok_or_else(|| not_captured("standard output"))?;
        let stderr = child.stderr.take().ok_or_else(|| not_captured("standard error"))?;

        let (sender, receiver) = mpsc::channel();
        let readers = [forward_lines(stdout, sender.clone()), forward_lines(stderr, sender)];

        let mut tracker = ProgressTracker::new(self.options.progress.clone(), total);
        let mut cancelled = false;

        loop {
            if !cancelled && self.options.is_cancelled() {
                log::warn!("Conversion cancelled - stopping {}", program.display());
                cancelled = true;
                if let Err(error) = child.kill() {
                    log::debug!("Could not kill transcoder: {error}");
                }
            }

            match receiver.recv_timeout(CANCEL_POLL) {
                Ok(line) => match OutputLine::classify(&line) {
                    Some(OutputLine::Progress { frame, time, speed }) => {
                        let position = match total.unit {
                            ProgressUnit::Frames => frame as f64,
                            ProgressUnit::Seconds => time,
                        };
                        tracker.update(position, Some(speed));
                    }
                    Some(OutputLine::Diagnostic(text)) => log::debug!("ffmpeg: {text}"),
                    None => {}
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for reader in readers {
            match reader.join() {
                Ok(Err(error)) => log::warn!("Reading transcoder output failed: {error}"),
                Err(_) => log::warn!("Transcoder output reader panicked"),
                Ok(Ok(())) => {}
            }
        }

        let status = child.wait()?;
        if !status.success() && !cancelled {
            log::error!(
                "Command `{} {command}` failed with {status}",
                program.display()
            );
        }

        Ok(MonitorReport {
            status,
            progress: tracker.snapshot(),
            cancelled,
        })
    }
}

/// Send each line of `stream` to `sender` from a background thread. The
/// channel disconnects once every forwarding thread has finished.
fn forward_lines<R: Read + Send + 'static>(stream: R, sender: Sender<String>) -> JoinHandle<std::io::Result<()>> {
    thread::spawn(move || {
        split_lines(stream, |line| {
            // The receiver only goes away once the monitor loop is done.
            let _ = sender.send(line);
        })
    })
}
