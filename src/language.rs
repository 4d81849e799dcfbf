//! Language identifiers and preference lists.
//!
//! [`Language`] normalises the many ways a language is spelled on the
//! command line and in container tags (`en`, `eng`, `en-GB`, `pt_br`,
//! `fre`/`fra`, `ger`/`deu`) onto a single ISO 639 entry plus an optional
//! region. Everything written back into the output file uses the 3-letter
//! bibliographic form returned by [`Language::alpha3`].
//!
//! [`LanguagePreference`] is the ordered, duplicate-free list of languages
//! the user asked for.
//!
//! # Example
//!
//! ```
//! use tomp4::Language;
//!
//! let british: Language = "en-gb".parse()?;
//! assert_eq!(british.alpha3(), "eng");
//! assert_eq!(british.region(), Some("GB"));
//! assert!(british.same_language(&"eng".parse()?));
//! # Ok::<(), tomp4::ConvertError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use isolang::Language as IsoLanguage;

use crate::error::ConvertError;

/// ISO 639-2 languages whose bibliographic code differs from the
/// terminological one, as `(B, T)`. The list is closed by the standard.
const BIBLIOGRAPHIC: [(&str, &str); 20] = [
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("mao", "mri"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("tib", "bod"),
    ("wel", "cym"),
];

fn lookup(base: &str) -> Option<IsoLanguage> {
    match base.len() {
        2 => IsoLanguage::from_639_1(base),
        3 => {
            let terminological = BIBLIOGRAPHIC
                .iter()
                .find(|(bibliographic, _)| *bibliographic == base)
                .map_or(base, |(_, terminological)| terminological);
            IsoLanguage::from_639_3(terminological)
        }
        _ => None,
    }
}

fn bibliographic(code: IsoLanguage) -> &'static str {
    let terminological = code.to_639_3();
    BIBLIOGRAPHIC
        .iter()
        .find(|(_, t)| *t == terminological)
        .map_or(terminological, |(b, _)| b)
}

/// A normalised language, optionally qualified by a region.
///
/// Two languages compare equal only if both the language and the region
/// match; use [`same_language`](Language::same_language) to ignore the
/// region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    code: IsoLanguage,
    region: Option<String>,
}

impl Language {
    /// Parse a user- or container-supplied language identifier.
    ///
    /// Accepts ISO 639-1 (`en`), both ISO 639-2 forms (`fre`, `fra`), any
    /// ISO 639-3 code (`fil`, `yue`), and any of those followed by `-` or
    /// `_` and a region (`pt-BR`, `en_gb`). Matching is case-insensitive; the region is stored in
    /// upper case.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnknownLanguage`] if the identifier does not
    /// name a known language.
    pub fn parse(tag: &str) -> Result<Self, ConvertError> {
        let trimmed = tag.trim();
        let (base, region) = match trimmed.split_once(['-', '_']) {
            Some((base, region)) => (base, Some(region)),
            None => (trimmed, None),
        };

        let code = lookup(&base.to_ascii_lowercase())
            .ok_or_else(|| ConvertError::UnknownLanguage(tag.to_string()))?;

        let region = match region {
            Some(region)
                if (2..=3).contains(&region.len())
                    && region.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                Some(region.to_ascii_uppercase())
            }
            Some(_) => return Err(ConvertError::UnknownLanguage(tag.to_string())),
            None => None,
        };

        Ok(Self { code, region })
    }

    /// Interpret the `language` tag of a container stream.
    ///
    /// Missing or unrecognised tags become [`Language::undetermined`]
    /// rather than an error: containers are frequently sloppy here.
    pub fn from_stream_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(tag) => Self::parse(tag).unwrap_or_else(|_| {
                log::debug!("Unrecognised stream language tag {tag:?} - treating as undetermined");
                Self::undetermined()
            }),
            None => Self::undetermined(),
        }
    }

    /// The `und` language.
    pub fn undetermined() -> Self {
        Self {
            code: IsoLanguage::Und,
            region: None,
        }
    }

    /// Whether this is the `und` language.
    pub fn is_undetermined(&self) -> bool {
        self.code == IsoLanguage::Und
    }

    /// The 3-letter (ISO 639-2/B) code, e.g. `"fre"` for French.
    pub fn alpha3(&self) -> &'static str {
        bibliographic(self.code)
    }

    /// The 2-letter (ISO 639-1) code, if the language has one.
    pub fn alpha2(&self) -> Option<&'static str> {
        self.code.to_639_1()
    }

    /// The region qualifier in upper case, e.g. `"BR"`.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// English name of the language.
    pub fn name(&self) -> &'static str {
        self.code.to_name()
    }

    /// The same language with the region dropped.
    pub fn without_region(&self) -> Self {
        Self {
            code: self.code,
            region: None,
        }
    }

    /// Compare languages, ignoring any region qualifier.
    pub fn same_language(&self, other: &Language) -> bool {
        self.code == other.code
    }

    /// Filename tags under which a sidecar file for this language may be
    /// stored, most specific first.
    ///
    /// Region-qualified forms come first (`pt-BR`, `pt-br`, `ptBR`, `ptbr`),
    /// followed by the 2-letter code and both 3-letter codes.
    ///
    /// ```
    /// use tomp4::Language;
    ///
    /// let canadian: Language = "fr-CA".parse()?;
    /// assert_eq!(
    ///     canadian.filename_variants(),
    ///     ["fr-CA", "fr-ca", "frCA", "frca", "fr", "fre", "fra"],
    /// );
    /// # Ok::<(), tomp4::ConvertError>(())
    /// ```
    pub fn filename_variants(&self) -> Vec<String> {
        let mut variants = Vec::with_capacity(7);
        let alpha3b = self.alpha3();
        let alpha3t = self.code.to_639_3();
        let short = self.code.to_639_1().unwrap_or(alpha3b);

        if let Some(region) = &self.region {
            let lower = region.to_ascii_lowercase();
            variants.push(format!("{short}-{region}"));
            variants.push(format!("{short}-{lower}"));
            variants.push(format!("{short}{region}"));
            variants.push(format!("{short}{lower}"));
        }

        if let Some(alpha2) = self.code.to_639_1() {
            variants.push(alpha2.to_string());
        }
        variants.push(alpha3b.to_string());
        if alpha3t != alpha3b {
            variants.push(alpha3t.to_string());
        }

        variants
    }
}

impl FromStr for Language {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.region {
            Some(region) => write!(f, "{}-{region}", self.alpha3()),
            None => write!(f, "{}", self.alpha3()),
        }
    }
}

/// Ordered, duplicate-free list of preferred languages.
///
/// The first entry is the preferred audio language; the order as a whole
/// drives the layout of secondary audio and subtitle tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguagePreference {
    languages: Vec<Language>,
}

impl LanguagePreference {
    /// Build a preference list, dropping repeated entries but keeping the
    /// position of their first occurrence.
    pub fn new<I: IntoIterator<Item = Language>>(languages: I) -> Self {
        Self {
            languages: unique(languages),
        }
    }

    /// Parse a list of identifiers (see [`Language::parse`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnknownLanguage`] for the first identifier
    /// that cannot be recognised.
    pub fn parse<S: AsRef<str>>(tags: &[S]) -> Result<Self, ConvertError> {
        let languages = tags
            .iter()
            .map(|tag| Language::parse(tag.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(languages))
    }

    /// The languages in order of preference.
    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    /// The most preferred language, if any.
    pub fn first(&self) -> Option<&Language> {
        self.languages.first()
    }

    /// Number of languages.
    pub fn len(&self) -> usize {
        self.languages.len()
    }

    /// Whether no language was requested.
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// The preferences with regions stripped, deduplicated again.
    ///
    /// Audio tracks are matched on language alone, so `en-US` and `en-GB`
    /// collapse into a single `eng` entry here.
    pub fn without_regions(&self) -> Vec<Language> {
        unique(self.languages.iter().map(Language::without_region))
    }

    /// The preferences with `language` moved (or inserted) at the front.
    pub fn with_front(&self, language: &Language) -> Vec<Language> {
        unique(
            std::iter::once(language.clone()).chain(self.languages.iter().cloned()),
        )
    }
}

fn unique<I: IntoIterator<Item = Language>>(languages: I) -> Vec<Language> {
    let mut seen: Vec<Language> = Vec::new();
    for language in languages {
        if !seen.contains(&language) {
            seen.push(language);
        }
    }
    seen
}
