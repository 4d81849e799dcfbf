//! Stream selection.
//!
//! The [`Planner`] walks a [`StreamCatalog`] once per stream kind and
//! decides which streams the MP4 output keeps, in which order, which of
//! them play by default, and whether each can be copied or must be
//! re-encoded:
//!
//! 1. **Video.** The default-flagged video stream (or the first one) is
//!    output 0.
//! 2. **Audio.** The first stream matching the preferred languages becomes
//!    the default track, optionally followed by a stereo companion track,
//!    then one track per remaining preferred language.
//! 3. **Subtitles.** One track per preferred language, internal streams
//!    first, sidecar `.srt` files otherwise.
//!
//! Streams no policy claims are reported as deleted.
//!
//! # Example
//!
//! ```no_run
//! use tomp4::{LanguagePreference, MediaProbe, PlanOptions, Planner};
//!
//! let catalog = MediaProbe::probe("movie.mkv")?;
//! let preference = LanguagePreference::parse(&["eng", "fra"])?;
//! let options = PlanOptions::new().with_mobile_audio(true);
//!
//! let plan = Planner::new(&preference, &options).plan(&catalog)?;
//! print!("{plan}");
//! # Ok::<(), tomp4::ConvertError>(())
//! ```

use crate::catalog::{StreamCatalog, StreamDescriptor, StreamKind};
use crate::config::PlanOptions;
use crate::error::ConvertError;
use crate::language::{Language, LanguagePreference};
use crate::plan::{CodecDecision, Disposition, PlanEntry, PlanSource, StreamPlan, TargetCodec};
use crate::sidecar::{SidecarResolver, SubtitleResolver};

/// Video codecs that are copied as-is.
const COPY_VIDEO: &[&str] = &["264"];
/// Codecs accepted for the default audio track.
const COPY_DEFAULT_AUDIO: &[&str] = &["aac"];
/// Codecs accepted for companion and secondary audio tracks.
const COPY_EXTRA_AUDIO: &[&str] = &["ac3", "aac"];
/// Subtitle codecs that are copied as-is.
const COPY_SUBTITLE: &[&str] = &["mov_text"];

/// Computes a [`StreamPlan`] from a catalog, a language preference, and
/// [`PlanOptions`].
pub struct Planner<'a> {
    preference: &'a LanguagePreference,
    options: &'a PlanOptions,
    resolver: &'a dyn SubtitleResolver,
}

impl<'a> Planner<'a> {
    /// Create a planner looking for sidecar subtitles on the filesystem.
    pub fn new(preference: &'a LanguagePreference, options: &'a PlanOptions) -> Self {
        Self {
            preference,
            options,
            resolver: &SidecarResolver,
        }
    }

    /// Use another sidecar lookup.
    #[must_use]
    pub fn with_resolver(mut self, resolver: &'a dyn SubtitleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Plan the conversion of `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::NoVideoStream`] if the catalog holds no
    /// video stream. Missing languages and ambiguous default flags are
    /// resolved with a warning.
    pub fn plan(&self, catalog: &StreamCatalog) -> Result<StreamPlan, ConvertError> {
        let mut worklist = Worklist::new(catalog);

        self.plan_video(&mut worklist)?;
        self.plan_audio(&mut worklist);
        self.plan_subtitles(&mut worklist);

        Ok(worklist.finish())
    }

    fn plan_video(&self, worklist: &mut Worklist<'_>) -> Result<(), ConvertError> {
        let slot = worklist
            .pick_default(StreamKind::Video)
            .ok_or(ConvertError::NoVideoStream)?;
        let stream = worklist.stream(slot);

        let codec = decide(stream, COPY_VIDEO, TargetCodec::H264);
        log::info!(
            "Video stream [{}] ({}) -> [0] {codec}",
            stream.index,
            stream.codec_name
        );
        worklist.claim(slot, Disposition::Default, codec, None);
        Ok(())
    }

    fn plan_audio(&self, worklist: &mut Worklist<'_>) {
        let wanted = self.preference.without_regions();
        let Some(default_slot) = self.pick_default_audio(worklist, &wanted) else {
            log::info!("Source has no audio streams");
            return;
        };
        let default_stream = worklist.stream(default_slot);
        let default_language = default_stream.language.clone();
        let default_channels = default_stream.channels.unwrap_or(0);

        let codec = decide(default_stream, COPY_DEFAULT_AUDIO, TargetCodec::Aac);
        worklist.claim(
            default_slot,
            Disposition::Default,
            codec,
            Some(default_language.clone()),
        );

        if self.options.mobile_audio && default_channels > 2 {
            self.plan_companion_audio(worklist, default_slot, &default_language);
        }

        let mut languages = wanted;
        if !self.options.preserve_extra_audio {
            let redundant: Vec<usize> = worklist
                .available(StreamKind::Audio)
                .filter(|&slot| {
                    let language = &worklist.stream(slot).language;
                    language.is_undetermined() || language.same_language(&default_language)
                })
                .collect();
            for slot in redundant {
                log::debug!(
                    "Dropping audio stream [{}]: same language as the default track or untagged",
                    worklist.stream(slot).index
                );
                worklist.exclude(slot);
            }
            languages.retain(|language| !language.same_language(&default_language));
        }

        for language in &languages {
            let Some(slot) = worklist.find_available(StreamKind::Audio, language) else {
                log::info!("No audio stream in {} ({})", language.name(), language);
                continue;
            };

            let codec = decide(worklist.stream(slot), COPY_EXTRA_AUDIO, TargetCodec::Aac);
            let language_tag = worklist.stream(slot).language.clone();
            worklist.claim(slot, Disposition::None, codec, Some(language_tag));

            while let Some(other) = worklist.find_available(StreamKind::Audio, language) {
                log::debug!(
                    "Dropping audio stream [{}]: {} already has a track",
                    worklist.stream(other).index,
                    language
                );
                worklist.exclude(other);
            }
        }
    }

    fn pick_default_audio(&self, worklist: &Worklist<'_>, wanted: &[Language]) -> Option<usize> {
        worklist.slots(StreamKind::Audio).next()?;

        for (rank, language) in wanted.iter().enumerate() {
            let found = worklist
                .slots(StreamKind::Audio)
                .find(|&slot| worklist.stream(slot).language.same_language(language));
            if let Some(slot) = found {
                if rank > 0 {
                    log::warn!(
                        "No audio stream in {} - using {} as the default track",
                        wanted[0].name(),
                        language.name()
                    );
                }
                return Some(slot);
            }
        }

        if !wanted.is_empty() {
            log::warn!("No audio stream matches the requested languages");
        }
        worklist.pick_default(StreamKind::Audio)
    }

    fn plan_companion_audio(&self, worklist: &mut Worklist<'_>, default_slot: usize, language: &Language) {
        let reusable = worklist.available(StreamKind::Audio).find(|&slot| {
            let stream = worklist.stream(slot);
            stream.language.same_language(language)
                && stream.channels == Some(2)
                && stream.codec_matches(COPY_EXTRA_AUDIO)
        });

        match reusable {
            Some(slot) => {
                log::info!(
                    "Reusing stereo audio stream [{}] as the mobile track",
                    worklist.stream(slot).index
                );
                worklist.claim(slot, Disposition::None, CodecDecision::Copy, Some(language.clone()));
            }
            None => {
                let source_index = worklist.stream(default_slot).index;
                log::info!("Synthesizing a stereo mobile track from audio stream [{source_index}]");
                worklist.push(PlanEntry {
                    source: PlanSource::SynthesizedMix { source_index },
                    output_index: 0,
                    kind: StreamKind::Audio,
                    disposition: Disposition::None,
                    codec: CodecDecision::Transcode(TargetCodec::Aac),
                    language: Some(language.clone()),
                    encoding: None,
                    channels: Some(2),
                });
            }
        }
    }

    fn plan_subtitles(&self, worklist: &mut Worklist<'_>) {
        let shown = self.options.default_subtitle_language.as_ref();
        let candidates = match shown {
            Some(language) => self.preference.with_front(language),
            None => self.preference.languages().to_vec(),
        };

        if self.options.ignore_internal_subtitles {
            let internal: Vec<usize> = worklist.slots(StreamKind::Subtitle).collect();
            for slot in internal {
                worklist.exclude(slot);
            }
        }

        let source = worklist.catalog.source_path().to_path_buf();
        for language in &candidates {
            let disposition = if shown == Some(language) {
                Disposition::Default
            } else {
                Disposition::None
            };

            if let Some(slot) = worklist.find_available(StreamKind::Subtitle, language) {
                let codec = decide(worklist.stream(slot), COPY_SUBTITLE, TargetCodec::MovText);
                log::info!(
                    "Using internal subtitle stream [{}] for {}",
                    worklist.stream(slot).index,
                    language
                );
                worklist.claim(slot, disposition, codec, Some(language.clone()));
            } else if let Some(file) = self.resolver.resolve(&source, language) {
                worklist.push(PlanEntry {
                    source: PlanSource::ExternalFile(file.path),
                    output_index: 0,
                    kind: StreamKind::Subtitle,
                    disposition,
                    codec: CodecDecision::Transcode(TargetCodec::MovText),
                    language: Some(file.language),
                    encoding: file.encoding,
                    channels: None,
                });
            } else {
                log::info!("No subtitles in {} ({})", language.name(), language);
            }

            while let Some(other) = worklist.find_available(StreamKind::Subtitle, language) {
                worklist.exclude(other);
            }
        }
    }
}

fn decide(stream: &StreamDescriptor, accepted: &[&str], target: TargetCodec) -> CodecDecision {
    if stream.codec_matches(accepted) {
        CodecDecision::Copy
    } else {
        CodecDecision::Transcode(target)
    }
}

/// Claim/exclude bookkeeping over the catalog, addressed by slot (position
/// in [`StreamCatalog::streams`]).
struct Worklist<'c> {
    catalog: &'c StreamCatalog,
    claimed: Vec<bool>,
    excluded: Vec<bool>,
    entries: Vec<PlanEntry>,
}

impl<'c> Worklist<'c> {
    fn new(catalog: &'c StreamCatalog) -> Self {
        let count = catalog.streams().len();
        Self {
            catalog,
            claimed: vec![false; count],
            excluded: vec![false; count],
            entries: Vec::new(),
        }
    }

    fn stream(&self, slot: usize) -> &'c StreamDescriptor {
        &self.catalog.streams()[slot]
    }

    /// Every slot of `kind`, claimed or not.
    fn slots(&self, kind: StreamKind) -> impl Iterator<Item = usize> + 'c {
        let catalog = self.catalog;
        (0..catalog.streams().len()).filter(move |&slot| catalog.streams()[slot].kind == kind)
    }

    /// Slots of `kind` neither claimed nor excluded.
    fn available(&self, kind: StreamKind) -> impl Iterator<Item = usize> + '_ {
        self.slots(kind)
            .filter(move |&slot| !self.claimed[slot] && !self.excluded[slot])
    }

    fn find_available(&self, kind: StreamKind, language: &Language) -> Option<usize> {
        self.available(kind)
            .find(|&slot| self.stream(slot).language.same_language(language))
    }

    /// The default-flagged stream of `kind`, or the first one when zero or
    /// several streams carry the flag.
    fn pick_default(&self, kind: StreamKind) -> Option<usize> {
        let first = self.slots(kind).next()?;
        let flagged: Vec<usize> = self
            .slots(kind)
            .filter(|&slot| self.stream(slot).is_default)
            .collect();

        match flagged.as_slice() {
            [only] => Some(*only),
            [] => {
                log::warn!(
                    "No {kind} stream is flagged default - using stream [{}]",
                    self.stream(first).index
                );
                Some(first)
            }
            several => {
                log::warn!(
                    "{} {kind} streams are flagged default - using stream [{}]",
                    several.len(),
                    self.stream(first).index
                );
                Some(first)
            }
        }
    }

    fn claim(
        &mut self,
        slot: usize,
        disposition: Disposition,
        codec: CodecDecision,
        language: Option<Language>,
    ) {
        self.claimed[slot] = true;
        let stream = self.stream(slot);
        self.push(PlanEntry {
            source: PlanSource::InternalStream(stream.index),
            output_index: 0,
            kind: stream.kind,
            disposition,
            codec,
            language,
            encoding: None,
            channels: stream.channels,
        });
    }

    fn exclude(&mut self, slot: usize) {
        self.excluded[slot] = true;
    }

    /// Append an entry at the next output index.
    fn push(&mut self, mut entry: PlanEntry) {
        entry.output_index = self.entries.len();
        self.entries.push(entry);
    }

    fn finish(self) -> StreamPlan {
        let deleted = self
            .claimed
            .iter()
            .enumerate()
            .filter(|&(_, &claimed)| !claimed)
            .map(|(slot, _)| self.catalog.streams()[slot].index)
            .collect();
        StreamPlan::new(self.catalog.clone(), self.entries, deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::sidecar::ExternalSubtitleFile;

    struct NoSidecars;

    impl SubtitleResolver for NoSidecars {
        fn resolve(&self, _source: &Path, _language: &Language) -> Option<ExternalSubtitleFile> {
            None
        }
    }

    fn stream(index: usize, kind: StreamKind, codec: &str, channels: Option<u16>, language: &str, default: bool) -> StreamDescriptor {
        StreamDescriptor::new(index, kind, codec, channels, Language::from_stream_tag(Some(language)), default).unwrap()
    }

    fn catalog(streams: Vec<StreamDescriptor>) -> StreamCatalog {
        StreamCatalog::new("movie.mkv", Duration::from_secs(60), streams)
    }

    fn plan(catalog: &StreamCatalog, languages: &[&str], options: &PlanOptions) -> StreamPlan {
        let preference = LanguagePreference::parse(languages).unwrap();
        Planner::new(&preference, options)
            .with_resolver(&NoSidecars)
            .plan(catalog)
            .unwrap()
    }

    #[test]
    fn no_video_is_an_error() {
        let catalog = catalog(vec![stream(0, StreamKind::Audio, "aac", Some(2), "eng", true)]);
        let preference = LanguagePreference::parse(&["eng"]).unwrap();
        let options = PlanOptions::new();
        let result = Planner::new(&preference, &options)
            .with_resolver(&NoSidecars)
            .plan(&catalog);
        assert!(matches!(result, Err(ConvertError::NoVideoStream)));
    }

    #[test]
    fn preserve_extra_audio_keeps_default_language_duplicates_available() {
        let catalog = catalog(vec![
            stream(0, StreamKind::Video, "h264", None, "und", true),
            stream(1, StreamKind::Audio, "aac", Some(2), "eng", true),
            stream(2, StreamKind::Audio, "ac3", Some(6), "eng", false),
        ]);

        let strict = plan(&catalog, &["eng"], &PlanOptions::new());
        assert_eq!(strict.deleted(), [2]);

        let preserving = plan(&catalog, &["eng"], &PlanOptions::new().with_preserve_extra_audio(true));
        assert!(preserving.deleted().is_empty());
        let extra = preserving.entry_for_stream(2).unwrap();
        assert_eq!(extra.output_index, 2);
        assert_eq!(extra.codec, CodecDecision::Copy);
    }

    #[test]
    fn one_stream_per_secondary_language() {
        let catalog = catalog(vec![
            stream(0, StreamKind::Video, "hevc", None, "und", true),
            stream(1, StreamKind::Audio, "dts", Some(6), "eng", true),
            stream(2, StreamKind::Audio, "mp3", Some(2), "spa", false),
            stream(3, StreamKind::Audio, "aac", Some(2), "spa", false),
        ]);
        let plan = plan(&catalog, &["eng", "spa"], &PlanOptions::new());

        assert_eq!(
            plan.entries()[0].codec,
            CodecDecision::Transcode(TargetCodec::H264)
        );
        assert_eq!(
            plan.entry_for_stream(1).unwrap().codec,
            CodecDecision::Transcode(TargetCodec::Aac)
        );
        assert_eq!(plan.entry_for_stream(2).unwrap().output_index, 2);
        assert_eq!(plan.deleted(), [3]);
    }
}
