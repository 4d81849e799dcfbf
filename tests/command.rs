//! Transcoder command line tests.
//!
//! The golden vectors pin the exact argument order produced for the two
//! Matroska fixtures, with the native AAC encoder so that the result does
//! not depend on how the local `ffmpeg` was built.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tomp4::{
    AacEncoder, CommandBuilder, ExternalSubtitleFile, Language, LanguagePreference, PlanOptions,
    Planner, StreamCatalog, StreamDescriptor, StreamKind, StreamPlan, SubtitleResolver,
    TranscodeCommand,
};

fn fixture(name: &str, sidecars: &[&str]) -> (TempDir, StreamCatalog) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .join("probe.json");
    let json = fs::read_to_string(&path).expect("Failed to read probe fixture");

    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    // Empty sidecars carry no encoding hint.
    for sidecar in sidecars {
        fs::write(directory.path().join(sidecar), b"").expect("Failed to write sidecar");
    }

    let catalog = StreamCatalog::from_ffprobe_json(&json)
        .expect("Fixture should parse")
        .with_source_path(directory.path().join("movie.mkv"));
    (directory, catalog)
}

fn path(directory: &TempDir, name: &str) -> OsString {
    directory.path().join(name).into_os_string()
}

fn words(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

/// Serves one sidecar file for every language.
struct FixedSidecar {
    path: PathBuf,
    encoding: Option<&'static str>,
}

impl SubtitleResolver for FixedSidecar {
    fn resolve(&self, _source: &Path, language: &Language) -> Option<ExternalSubtitleFile> {
        Some(ExternalSubtitleFile {
            path: self.path.clone(),
            language: language.clone(),
            encoding: self.encoding.map(String::from),
        })
    }
}

fn stream(index: usize, kind: StreamKind, codec: &str, channels: Option<u16>, tag: &str, default: bool) -> StreamDescriptor {
    StreamDescriptor::new(index, kind, codec, channels, Language::from_stream_tag(Some(tag)), default)
        .expect("Valid descriptor")
}

fn surround_catalog() -> StreamCatalog {
    StreamCatalog::new(
        "surround.mkv",
        Duration::from_secs(90),
        vec![
            stream(0, StreamKind::Video, "h264", None, "und", true),
            stream(1, StreamKind::Audio, "dts", Some(6), "eng", true),
        ],
    )
}

fn mobile_plan(catalog: &StreamCatalog) -> StreamPlan {
    let preference = LanguagePreference::parse(&["eng"]).unwrap();
    let options = PlanOptions::new().with_mobile_audio(true);
    let no_sidecar = NoSidecar;
    Planner::new(&preference, &options)
        .with_resolver(&no_sidecar)
        .plan(catalog)
        .unwrap()
}

struct NoSidecar;

impl SubtitleResolver for NoSidecar {
    fn resolve(&self, _source: &Path, _language: &Language) -> Option<ExternalSubtitleFile> {
        None
    }
}

// ── Golden commands ────────────────────────────────────────────────

#[test]
fn mkv_1_command() {
    let (directory, catalog) = fixture("mkv_1", &["movie.en-gb.srt"]);
    let preference = LanguagePreference::parse(&["en-GB", "fra"]).unwrap();
    let options = PlanOptions::new()
        .with_mobile_audio(true)
        .with_default_subtitle_language("en-GB".parse().unwrap());
    let plan = Planner::new(&preference, &options).plan(&catalog).unwrap();

    let command = CommandBuilder::new(&plan)
        .threads(2)
        .audio_encoder(AacEncoder::Native)
        .build(directory.path().join("movie.mp4"));

    let mut expected = words(&["-threads", "2", "-fix_sub_duration", "-i"]);
    expected.push(path(&directory, "movie.mkv"));
    expected.push("-i".into());
    expected.push(path(&directory, "movie.en-gb.srt"));
    expected.extend(words(&[
        "-map", "0:0",
        "-map", "0:2",
        "-map", "0:1",
        "-map", "1:0",
        "-disposition:0", "default",
        "-codec:0", "copy",
        "-disposition:1", "default",
        "-codec:1", "copy",
        "-metadata:s:1", "language=eng",
        "-disposition:2", "none",
        "-codec:2", "aac", "-b:2", "128k",
        "-metadata:s:2", "language=fre",
        "-disposition:3", "default",
        "-codec:3", "mov_text",
        "-metadata:s:3", "language=eng",
        "-movflags", "+faststart",
    ]));
    expected.push(path(&directory, "movie.mp4"));

    assert_eq!(command.args(), expected.as_slice());
}

#[test]
fn mkv_2_command() {
    let (directory, catalog) = fixture("mkv_2", &["movie.en.srt", "movie.fr.srt"]);
    let preference = LanguagePreference::parse(&["eng", "fra"]).unwrap();
    let options = PlanOptions::new().with_mobile_audio(true);
    let plan = Planner::new(&preference, &options).plan(&catalog).unwrap();

    let command = CommandBuilder::new(&plan)
        .threads(3)
        .audio_encoder(AacEncoder::Native)
        .build(directory.path().join("movie.mp4"));

    let mut expected = words(&["-threads", "3", "-fix_sub_duration", "-i"]);
    expected.push(path(&directory, "movie.mkv"));
    expected.push("-i".into());
    expected.push(path(&directory, "movie.en.srt"));
    expected.extend(words(&[
        "-map", "0:0",
        "-map", "0:1",
        "-map", "0:3",
        "-map", "0:2",
        "-map", "1:0",
        "-map", "0:4",
        "-disposition:0", "default",
        "-codec:0", "copy",
        "-disposition:1", "default",
        "-codec:1", "copy",
        "-metadata:s:1", "language=eng",
        "-disposition:2", "none",
        "-codec:2", "copy",
        "-metadata:s:2", "language=eng",
        "-disposition:3", "none",
        "-codec:3", "copy",
        "-metadata:s:3", "language=fre",
        "-disposition:4", "none",
        "-codec:4", "mov_text",
        "-metadata:s:4", "language=eng",
        "-disposition:5", "none",
        "-codec:5", "mov_text",
        "-metadata:s:5", "language=fre",
        "-movflags", "+faststart",
    ]));
    expected.push(path(&directory, "movie.mp4"));

    assert_eq!(command.args(), expected.as_slice());
}

#[test]
fn building_twice_gives_the_same_command() {
    let (directory, catalog) = fixture("mkv_2", &["movie.en.srt"]);
    let preference = LanguagePreference::parse(&["eng", "fra"]).unwrap();
    let options = PlanOptions::new().with_mobile_audio(true);
    let plan = Planner::new(&preference, &options).plan(&catalog).unwrap();

    let builder = CommandBuilder::new(&plan).threads(4);
    let output = directory.path().join("movie.mp4");
    assert_eq!(builder.build(&output), builder.build(&output));
}

// ── Audio encoders ─────────────────────────────────────────────────

#[test]
fn fdk_encoder_uses_vbr() {
    let (directory, catalog) = fixture("mkv_1", &[]);
    let preference = LanguagePreference::parse(&["eng", "fra"]).unwrap();
    let plan = Planner::new(&preference, &PlanOptions::new()).plan(&catalog).unwrap();

    let args = CommandBuilder::new(&plan)
        .audio_encoder(AacEncoder::Fdk)
        .build(directory.path().join("movie.mp4"))
        .into_args();

    let codec = args.iter().position(|arg| arg == "-codec:2").unwrap();
    assert_eq!(args[codec + 1..codec + 4], words(&["libfdk_aac", "-vbr", "4"]));
    assert!(!args.iter().any(|arg| arg.to_string_lossy().starts_with("-b:")));
}

#[test]
fn synthesized_mix_maps_filter_output() {
    let catalog = surround_catalog();
    let plan = mobile_plan(&catalog);
    let args = CommandBuilder::new(&plan).build("surround.mp4").into_args();

    let expected = words(&[
        "-threads", "0", "-fix_sub_duration", "-i", "surround.mkv",
        "-map", "0:0",
        "-map", "0:1",
        "-map", "[mobile]",
        "-disposition:0", "default",
        "-codec:0", "copy",
        "-disposition:1", "default",
        "-codec:1", "aac", "-b:1", "384k",
        "-metadata:s:1", "language=eng",
        "-disposition:2", "none",
        "-codec:2", "aac", "-b:2", "128k",
        "-filter_complex",
        "[0:1]pan=stereo|FL<1.0*FL+0.707*FC+0.707*BL|FR<1.0*FR+0.707*FC+0.707*BR[mobile]",
        "-metadata:s:2", "language=eng",
        "-movflags", "+faststart", "surround.mp4",
    ]);
    assert_eq!(args, expected);
}

// ── Subtitles ──────────────────────────────────────────────────────

#[test]
fn sidecar_encoding_precedes_its_input() {
    let catalog = surround_catalog();
    let preference = LanguagePreference::parse(&["eng"]).unwrap();
    let resolver = FixedSidecar {
        path: PathBuf::from("surround.eng.srt"),
        encoding: Some("WINDOWS-1252"),
    };
    let options = PlanOptions::new();
    let plan = Planner::new(&preference, &options)
        .with_resolver(&resolver)
        .plan(&catalog)
        .unwrap();

    let args = CommandBuilder::new(&plan).build("surround.mp4").into_args();
    assert_eq!(
        args[5..9],
        words(&["-sub_charenc", "WINDOWS-1252", "-i", "surround.eng.srt"])
    );
    assert!(args.windows(2).any(|pair| pair == ["-map", "1:0"]));
}

#[test]
fn subtitle_metadata_uses_bibliographic_codes() {
    let catalog = surround_catalog();
    let resolver = FixedSidecar {
        path: PathBuf::from("surround.fr.srt"),
        encoding: None,
    };

    for request in ["fr", "fr-CA", "fra", "fre"] {
        let preference = LanguagePreference::parse(&["eng", request]).unwrap();
        let options = PlanOptions::new();
        let plan = Planner::new(&preference, &options)
            .with_resolver(&resolver)
            .plan(&catalog)
            .unwrap();

        let command = CommandBuilder::new(&plan).build("surround.mp4");
        let metadata: Vec<&str> = command
            .args()
            .iter()
            .filter_map(|arg| arg.to_str())
            .filter(|arg| arg.starts_with("language="))
            .collect();
        assert_eq!(
            metadata,
            ["language=eng", "language=eng", "language=fre"],
            "request {request}"
        );
    }
}

#[test]
fn less_common_languages_keep_their_metadata() {
    let catalog = StreamCatalog::new(
        "kurdish.mkv",
        Duration::from_secs(90),
        vec![
            stream(0, StreamKind::Video, "h264", None, "und", true),
            stream(1, StreamKind::Audio, "aac", Some(2), "kur", true),
            stream(2, StreamKind::Audio, "aac", Some(2), "lao", false),
        ],
    );
    let preference = LanguagePreference::parse(&["kur", "lo"]).unwrap();
    let options = PlanOptions::new();
    let plan = Planner::new(&preference, &options)
        .with_resolver(&NoSidecar)
        .plan(&catalog)
        .unwrap();

    let command = CommandBuilder::new(&plan).build("kurdish.mp4");
    let args = command.args();
    assert!(args.windows(2).any(|pair| pair == ["-metadata:s:1", "language=kur"]));
    assert!(args.windows(2).any(|pair| pair == ["-metadata:s:2", "language=lao"]));
    assert!(!args.iter().any(|arg| arg == "language=und"));

    // Unrequested, the Kurdish track is still the fallback default and
    // keeps its tag.
    let english = LanguagePreference::parse(&["eng"]).unwrap();
    let plan = Planner::new(&english, &options)
        .with_resolver(&NoSidecar)
        .plan(&catalog)
        .unwrap();
    let command = CommandBuilder::new(&plan).build("kurdish.mp4");
    assert!(command.args().windows(2).any(|pair| pair == ["-metadata:s:1", "language=kur"]));
}

// ── Rendering ──────────────────────────────────────────────────────

#[test]
fn display_joins_arguments() {
    let command: TranscodeCommand = ["-i", "/films/Le Mépris.mkv", "-map", "0:0", "out.mp4"]
        .into_iter()
        .collect();
    assert_eq!(
        command.to_string(),
        "-i '/films/Le Mépris.mkv' -map 0:0 out.mp4"
    );
}

#[test]
fn display_survives_shell_word_splitting() {
    let (directory, catalog) = fixture("mkv_1", &["It's Me.en.srt"]);
    let catalog = catalog.with_source_path(directory.path().join("It's Me.mkv"));
    let preference = LanguagePreference::parse(&["eng"]).unwrap();
    let plan = Planner::new(&preference, &PlanOptions::new().with_mobile_audio(true))
        .plan(&catalog)
        .unwrap();
    let command = CommandBuilder::new(&plan).build(directory.path().join("It's Me.mp4"));

    let rendered = command.to_string();
    assert!(rendered.contains(r#"It's Me.mkv""#), "{rendered}");
    let split: Vec<OsString> = shlex::split(&rendered)
        .expect("Rendering should be valid shell")
        .into_iter()
        .map(OsString::from)
        .collect();
    assert_eq!(split, command.args());
}

#[cfg(unix)]
#[test]
fn non_utf8_paths_are_passed_through() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let source = Path::new(OsStr::from_bytes(b"/films/caf\xe9.mkv"));
    let catalog = surround_catalog().with_source_path(source);
    let plan = mobile_plan(&catalog);
    let output = Path::new(OsStr::from_bytes(b"/films/caf\xe9.mp4"));
    let command = CommandBuilder::new(&plan).build(output);

    assert_eq!(command.args()[4], source.as_os_str());
    assert_eq!(command.args().last().unwrap(), output.as_os_str());
    assert!(command.to_string().contains("caf\u{FFFD}.mkv"));
}
