//! Sidecar subtitle discovery.
//!
//! Subtitles downloaded next to a movie follow the
//! `<basename-without-extension>.<tag>.srt` convention, where `<tag>` is any
//! of the spellings returned by [`Language::filename_variants`]. The
//! planner asks a [`SubtitleResolver`] for a file per candidate language;
//! [`SidecarResolver`] is the filesystem implementation.

use std::fs;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::language::Language;

/// An external subtitle file selected for muxing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSubtitleFile {
    /// Location of the `.srt` file.
    pub path: PathBuf,
    /// Language the file holds; tags the muxed subtitle stream.
    pub language: Language,
    /// Detected text encoding, uppercase (`"UTF-8"`, `"WINDOWS-1252"`).
    pub encoding: Option<String>,
}

/// Lookup of external subtitle files for a source media file.
pub trait SubtitleResolver {
    /// Return the sidecar for `language` next to `source`, if one exists.
    fn resolve(&self, source: &Path, language: &Language) -> Option<ExternalSubtitleFile>;
}

/// Resolves sidecars on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarResolver;

impl SubtitleResolver for SidecarResolver {
    fn resolve(&self, source: &Path, language: &Language) -> Option<ExternalSubtitleFile> {
        let path = language
            .filename_variants()
            .iter()
            .map(|variant| sidecar_path(source, variant))
            .find(|candidate| {
                log::debug!("Looking for sidecar {}", candidate.display());
                candidate.is_file()
            })?;

        let encoding = match detect_text_encoding(&path) {
            Ok(encoding) => encoding,
            Err(error) => {
                log::warn!("Cannot sniff encoding of {}: {error}", path.display());
                None
            }
        };

        log::info!(
            "Found {} subtitle file {} (encoding={})",
            language,
            path.display(),
            encoding.as_deref().unwrap_or("??")
        );

        Some(ExternalSubtitleFile {
            path,
            language: language.clone(),
            encoding,
        })
    }
}

/// Sidecar filename for `source` and a filename tag.
///
/// ```
/// use std::path::Path;
///
/// assert_eq!(
///     tomp4::sidecar_path(Path::new("/films/movie.mkv"), "pt-BR"),
///     Path::new("/films/movie.pt-BR.srt"),
/// );
/// ```
pub fn sidecar_path(source: &Path, tag: &str) -> PathBuf {
    source.with_extension(format!("{tag}.srt"))
}

/// Guess the text encoding of a file.
///
/// A byte-order mark wins; otherwise the content is run through a
/// statistical detector. Pure ASCII is reported as `"ASCII"`, and empty
/// files have no encoding.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be read.
pub fn detect_text_encoding(path: &Path) -> Result<Option<String>, IoError> {
    let bytes = fs::read(path)?;
    Ok(sniff_encoding(&bytes))
}

fn sniff_encoding(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Some(encoding_label(encoding));
    }

    if bytes.is_ascii() {
        return Some("ASCII".to_string());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    Some(encoding_label(detector.guess(None, true)))
}

fn encoding_label(encoding: &'static Encoding) -> String {
    if encoding == UTF_8 {
        return "UTF-8".to_string();
    }
    encoding.name().to_ascii_uppercase()
}
