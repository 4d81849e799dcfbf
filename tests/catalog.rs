//! Stream catalog tests: parsing prober output and validating descriptors.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tomp4::{ConvertError, Language, StreamCatalog, StreamDescriptor, StreamKind};

fn load(name: &str) -> StreamCatalog {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .join("probe.json");
    let json = fs::read_to_string(path).expect("Failed to read probe fixture");
    StreamCatalog::from_ffprobe_json(&json).expect("Fixture should parse")
}

// ── Fixtures ───────────────────────────────────────────────────────

#[test]
fn mkv_1_streams() {
    let catalog = load("mkv_1");

    assert_eq!(catalog.streams().len(), 4);
    assert_eq!(catalog.source_path(), Path::new("/data/movies/movie.mkv"));
    assert_eq!(catalog.container().duration, Duration::from_secs_f64(5.568));
    assert_eq!(catalog.container().frame_count, None);

    let french = catalog.stream(1).unwrap();
    assert_eq!(french.kind, StreamKind::Audio);
    assert_eq!(french.codec_name, "mp3");
    assert_eq!(french.channels, Some(2));
    assert_eq!(french.language.alpha3(), "fre");
    assert!(french.is_default);

    let subtitles = catalog.stream(3).unwrap();
    assert!(subtitles.language.is_undetermined());
    assert_eq!(subtitles.channels, None);
}

#[test]
fn mkv_2_skips_attachments() {
    let catalog = load("mkv_2");

    assert_eq!(catalog.streams().len(), 5);
    assert!(catalog.stream(5).is_none());
    assert_eq!(catalog.streams_of(StreamKind::Audio).count(), 3);
    assert_eq!(catalog.streams_of(StreamKind::Subtitle).count(), 1);
    assert_eq!(catalog.container().frame_count, Some(166));
}

#[test]
fn source_path_can_be_replaced() {
    let catalog = load("mkv_1").with_source_path("/tmp/elsewhere/movie.mkv");
    assert_eq!(catalog.source_path(), Path::new("/tmp/elsewhere/movie.mkv"));
    assert_eq!(catalog.container().path, Path::new("/tmp/elsewhere/movie.mkv"));
}

// ── Malformed input ────────────────────────────────────────────────

#[test]
fn invalid_json() {
    let result = StreamCatalog::from_ffprobe_json("<ffprobe/>");
    assert!(matches!(result, Err(ConvertError::InvalidProbeData(_))));

    let result = StreamCatalog::from_ffprobe_json(r#"{"format": {}}"#);
    assert!(matches!(result, Err(ConvertError::InvalidProbeData(_))));
}

#[test]
fn missing_codec_name() {
    let result = StreamCatalog::from_ffprobe_json(
        r#"{"streams": [{"index": 2, "codec_type": "audio", "channels": 2}]}"#,
    );
    match result {
        Err(ConvertError::MalformedStream { index, attribute }) => {
            assert_eq!(index, Some(2));
            assert_eq!(attribute, "codec_name");
        }
        other => panic!("Expected MalformedStream, got {other:?}"),
    }
}

#[test]
fn audio_without_channels() {
    let result = StreamCatalog::from_ffprobe_json(
        r#"{"streams": [{"index": 1, "codec_type": "audio", "codec_name": "aac"}]}"#,
    );
    match result {
        Err(error @ ConvertError::MalformedStream { .. }) => {
            assert_eq!(
                error.to_string(),
                "Malformed stream descriptor (index 1): missing required attribute `channels`"
            );
        }
        other => panic!("Expected MalformedStream, got {other:?}"),
    }
}

#[test]
fn missing_index() {
    let result = StreamCatalog::from_ffprobe_json(
        r#"{"streams": [{"codec_type": "video", "codec_name": "h264"}]}"#,
    );
    match result {
        Err(error @ ConvertError::MalformedStream { index: None, .. }) => {
            assert!(error.to_string().contains("(index ?)"));
        }
        other => panic!("Expected MalformedStream, got {other:?}"),
    }
}

#[test]
fn empty_codec_name_is_rejected() {
    let result = StreamDescriptor::new(0, StreamKind::Video, " ", None, Language::undetermined(), true);
    assert!(matches!(
        result,
        Err(ConvertError::MalformedStream {
            attribute: "codec_name",
            ..
        })
    ));
}

// ── Lenient fields ─────────────────────────────────────────────────

#[test]
fn unknown_language_tags_become_undetermined() {
    let catalog = StreamCatalog::from_ffprobe_json(
        r#"{"streams": [
            {"index": 0, "codec_type": "subtitle", "codec_name": "ass", "tags": {"language": "klingon"}},
            {"index": 1, "codec_type": "subtitle", "codec_name": "ass", "tags": {"language": "pt-BR"}}
        ]}"#,
    )
    .unwrap();

    assert!(catalog.stream(0).unwrap().language.is_undetermined());
    let portuguese = &catalog.stream(1).unwrap().language;
    assert_eq!(portuguese.alpha3(), "por");
    assert_eq!(portuguese.region(), Some("BR"));
}

#[test]
fn numeric_fields_accept_numbers_or_strings() {
    let catalog = StreamCatalog::from_ffprobe_json(
        r#"{"streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "nb_frames": 240,
             "disposition": {"default": 0}}
        ], "format": {"filename": "clip.mkv", "duration": 10}}"#,
    )
    .unwrap();

    assert_eq!(catalog.container().frame_count, Some(240));
    assert_eq!(catalog.container().duration, Duration::from_secs(10));
    assert!(!catalog.stream(0).unwrap().is_default);
}

// ── Frame count ────────────────────────────────────────────────────

fn videos(flags: [u8; 3]) -> StreamCatalog {
    let streams: Vec<String> = flags
        .iter()
        .enumerate()
        .map(|(index, flag)| {
            format!(
                r#"{{"index": {index}, "codec_type": "video", "codec_name": "h264",
                    "nb_frames": "{}", "disposition": {{"default": {flag}}}}}"#,
                (index + 1) * 100
            )
        })
        .collect();
    StreamCatalog::from_ffprobe_json(&format!(r#"{{"streams": [{}]}}"#, streams.join(",")))
        .unwrap()
}

#[test]
fn frame_count_follows_the_kept_video_stream() {
    assert_eq!(videos([0, 1, 0]).container().frame_count, Some(200));
    assert_eq!(videos([0, 0, 0]).container().frame_count, Some(100));
    // Several flagged streams fall back to the first, like the planner.
    assert_eq!(videos([0, 1, 1]).container().frame_count, Some(100));
}
