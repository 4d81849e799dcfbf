use std::{
    error::Error,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tomp4::{
    AacEncoder, CommandBuilder, DEFAULT_FFMPEG, FfmpegLogLevel, LanguagePreference, MediaProbe,
    PlanOptions, Planner, ProcessMonitor, ProgressCallback, ProgressInfo, ProgressTotal,
    ProgressUnit, StreamCatalog, TranscodeOptions,
};
use tracing_subscriber::EnvFilter;

const CLI_AFTER_HELP: &str = "Examples:\n  tomp4 convert movie.mkv movie.mp4 en-gb fra --show en-gb --mobile-audio\n  tomp4 convert movie.avi movie.mp4 eng --dry-run\n  tomp4 probe movie.mkv --json\n  tomp4 completions zsh > _tomp4";

#[derive(Debug, Parser)]
#[command(
    name = "tomp4",
    version,
    about = "Convert movies to MP4, keeping the audio and subtitles you care about",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone)]
struct GlobalOptions {
    /// Increase logging output (-v warnings, -vv info, -vvv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// ffmpeg executable used for converting.
    #[arg(long, env = "TOMP4_FFMPEG", default_value = DEFAULT_FFMPEG, global = true)]
    ffmpeg: PathBuf,

    /// FFmpeg library log level while probing (quiet, error, warning, info, debug, ...).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Do not draw a progress bar.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a movie to MP4.
    #[command(
        about = "Convert a movie to MP4",
        after_help = "Languages are ISO 639 codes with an optional region (eng, en, fra, pt-BR).\nThe first language selects the default audio track.\n\nExamples:\n  tomp4 convert movie.mkv movie.mp4 eng fra -s eng -i\n  tomp4 convert movie.mkv movie.mp4 por --ignore-subtitles --threads 4"
    )]
    Convert {
        /// Source media file.
        input: PathBuf,
        /// Destination MP4 file. An existing file is moved to `<output>~`.
        output: PathBuf,
        /// Preferred languages, most important first.
        #[arg(required = true)]
        languages: Vec<String>,
        /// Subtitle language shown by default.
        #[arg(short, long)]
        show: Option<String>,
        /// Add a stereo track for mobile devices when the main audio is multichannel.
        #[arg(short = 'i', long)]
        mobile_audio: bool,
        /// Keep extra audio tracks in the default language and untagged tracks.
        #[arg(short = 'a', long = "preserve-audio")]
        preserve_audio: bool,
        /// Ignore subtitles inside the source; only use sidecar .srt files.
        #[arg(short = 'g', long = "ignore-subtitles")]
        ignore_subtitles: bool,
        /// ffmpeg threads (0 lets ffmpeg decide).
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
        /// Print the plan and the ffmpeg options without converting.
        #[arg(short, long)]
        dry_run: bool,
        /// Read the stream table from saved `ffprobe -print_format json -show_format -show_streams` output.
        #[arg(long)]
        probe_json: Option<PathBuf>,
    },

    /// Print the stream table of a media file.
    #[command(
        about = "Print the streams of a media file",
        after_help = "Examples:\n  tomp4 probe movie.mkv\n  tomp4 probe movie.mkv --json"
    )]
    Probe {
        /// Media file to inspect.
        input: PathBuf,
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn Error>> {
    let level = match &global.log_level {
        Some(level) => level.parse::<FfmpegLogLevel>()?,
        None => FfmpegLogLevel::for_verbosity(global.verbose),
    };
    tomp4::set_ffmpeg_log_level(level);
    Ok(())
}

fn load_catalog(input: &Path, probe_json: Option<&Path>) -> Result<StreamCatalog, Box<dyn Error>> {
    match probe_json {
        Some(json_path) => {
            let text = fs::read_to_string(json_path)?;
            Ok(StreamCatalog::from_ffprobe_json(&text)?.with_source_path(input))
        }
        None => Ok(MediaProbe::probe(input)?),
    }
}

fn backup_path(output: &Path) -> PathBuf {
    let mut backup = OsString::from(output.as_os_str());
    backup.push("~");
    PathBuf::from(backup)
}

fn backup_existing(output: &Path) -> Result<(), Box<dyn Error>> {
    if !output.exists() {
        return Ok(());
    }

    let backup = backup_path(output);
    if backup.exists() {
        fs::remove_file(&backup)?;
    }
    fs::rename(output, &backup)?;
    eprintln!(
        "{} {}",
        "warning:".yellow().bold(),
        format!("{} exists, moved to {}", output.display(), backup.display()).yellow()
    );
    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(total: ProgressTotal) -> Result<Self, Box<dyn Error>> {
        let unit = match total.unit {
            ProgressUnit::Frames => "frames",
            ProgressUnit::Seconds => "s",
        };
        let bar = match total.total {
            Some(total) => ProgressBar::new(total.ceil() as u64),
            None => ProgressBar::new_spinner(),
        };
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.green}} {{bar:40.cyan/blue}} {{pos}}/{{len}} {unit} {{msg}} (eta {{eta}})"
        ))?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.current as u64);
        if let Some(speed) = info.speed {
            self.bar.set_message(format!("{speed:.2}x"));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn convert(
    global: &GlobalOptions,
    input: &Path,
    output: &Path,
    languages: &[String],
    show: Option<&str>,
    plan_options: PlanOptions,
    threads: usize,
    dry_run: bool,
    probe_json: Option<&Path>,
) -> Result<i32, Box<dyn Error>> {
    let preference = LanguagePreference::parse(languages)?;
    let plan_options = match show {
        Some(show) => plan_options.with_default_subtitle_language(show.parse()?),
        None => plan_options,
    };

    let catalog = load_catalog(input, probe_json)?;
    let plan = Planner::new(&preference, &plan_options).plan(&catalog)?;

    let encoder = AacEncoder::detect(&global.ffmpeg);
    let command = CommandBuilder::new(&plan)
        .threads(threads)
        .audio_encoder(encoder)
        .build(output);

    if dry_run {
        println!("Stream planning:");
        print!("{plan}");
        println!("Options for ffmpeg:");
        println!("  {command}");
        return Ok(0);
    }

    backup_existing(output)?;

    let total = ProgressTotal::for_container(catalog.container());
    let mut options = TranscodeOptions::new().with_ffmpeg(&global.ffmpeg);
    let progress = if global.no_progress {
        None
    } else {
        let progress = Arc::new(TerminalProgress::new(total)?);
        options = options.with_progress(progress.clone());
        Some(progress)
    };

    let report = ProcessMonitor::new(&options).run(&command, total)?;

    if let Some(progress) = progress {
        progress.bar.finish_and_clear();
    }

    if report.success() {
        println!(
            "{} {}",
            "success:".green().bold(),
            format!("Converted {} to {}", input.display(), output.display()).green()
        );
    } else {
        eprintln!(
            "{} {}",
            "failed:".red().bold(),
            format!("ffmpeg exited with {}", report.status).red()
        );
    }
    Ok(report.exit_code())
}

fn probe(input: &Path, as_json: bool) -> Result<(), Box<dyn Error>> {
    let catalog = MediaProbe::probe(input)?;
    let container = catalog.container();

    if as_json {
        let payload = json!({
            "path": container.path.display().to_string(),
            "duration_seconds": container.duration.as_secs_f64(),
            "frame_count": container.frame_count,
            "streams": catalog.streams().iter().map(|stream| json!({
                "index": stream.index,
                "kind": stream.kind.to_string(),
                "codec": stream.codec_name,
                "channels": stream.channels,
                "language": stream.language.alpha3(),
                "default": stream.is_default,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!(
        "{} ({:.3}s{})",
        container.path.display(),
        container.duration.as_secs_f64(),
        container
            .frame_count
            .map(|frames| format!(", {frames} frames"))
            .unwrap_or_default()
    );
    for stream in catalog.streams() {
        let channels = stream
            .channels
            .map(|channels| format!(" channels={channels}"))
            .unwrap_or_default();
        println!(
            "  {} stream [{}] lang={} codec={}{channels}{}",
            stream.kind,
            stream.index,
            stream.language.alpha3(),
            stream.codec_name,
            if stream.is_default { " **" } else { "" }
        );
    }
    Ok(())
}

fn run() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            languages,
            show,
            mobile_audio,
            preserve_audio,
            ignore_subtitles,
            threads,
            dry_run,
            probe_json,
        } => {
            let plan_options = PlanOptions::new()
                .with_mobile_audio(mobile_audio)
                .with_preserve_extra_audio(preserve_audio)
                .with_ignore_internal_subtitles(ignore_subtitles);
            convert(
                &cli.global,
                &input,
                &output,
                &languages,
                show.as_deref(),
                plan_options,
                threads,
                dry_run,
                probe_json.as_deref(),
            )
        }
        Commands::Probe { input, json } => {
            probe(&input, json)?;
            Ok(0)
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "tomp4", &mut std::io::stdout());
            Ok(0)
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}
