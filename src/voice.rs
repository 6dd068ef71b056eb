//! Voice selection for the client speech engine.

/// Voice metadata as reported by the client engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// Locale tag, e.g. "en-US" or "de_DE".
    pub lang: String,
    /// Whether the engine marks this as its default voice.
    pub is_default: bool,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

/// Voice names that are known female voices on the common engines but
/// carry no gender metadata.
const FEMALE_VOICE_NAMES: [&str; 10] = [
    "samantha", "victoria", "zira", "karen", "moira", "tessa", "amy", "joanna", "salli", "ivy",
];

impl Voice {
    pub fn new(name: &str, lang: &str) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            is_default: false,
            gender: None,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    /// Primary language subtag, lowercased: "en-US" -> "en".
    pub fn primary_language(&self) -> String {
        primary_subtag(&self.lang)
    }

    fn is_female(&self) -> bool {
        match self.gender {
            Some(Gender::Female) => true,
            Some(Gender::Male) => false,
            None => {
                let name = self.name.to_lowercase();
                name.contains("female") || FEMALE_VOICE_NAMES.iter().any(|n| name.contains(n))
            }
        }
    }
}

/// Choose a voice for `language` (a primary subtag like "en"):
/// female voice in the language, then any voice in the language, then the
/// engine default, then the first voice. Returns None only for an empty
/// list.
pub fn select_voice<'a>(voices: &'a [Voice], language: &str) -> Option<&'a Voice> {
    let language = primary_subtag(language);
    let in_language = |v: &&Voice| v.primary_language() == language;

    voices
        .iter()
        .filter(in_language)
        .find(|v| v.is_female())
        .or_else(|| voices.iter().find(in_language))
        .or_else(|| voices.iter().find(|v| v.is_default))
        .or_else(|| voices.first())
}

/// Derive the playback language: the page's declared language, else the
/// client locale, else the configured fallback, truncated to the primary
/// subtag.
pub fn page_language(page_lang: Option<&str>, client_locale: Option<&str>, fallback: &str) -> String {
    let tag = page_lang
        .filter(|s| !s.trim().is_empty())
        .or(client_locale.filter(|s| !s.trim().is_empty()))
        .unwrap_or(fallback);
    primary_subtag(tag)
}

fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn female_voice_in_language_wins() {
        let voices = vec![
            Voice::new("Hans", "de-DE"),
            Voice::new("Brian", "en-GB").with_default(),
            Voice::new("Amy", "en-GB"),
        ];
        assert_eq!(select_voice(&voices, "en").map(|v| v.name.as_str()), Some("Amy"));
    }

    #[test]
    fn generic_language_voice_beats_the_marked_default() {
        // No female voice in the target language: the in-language voice is
        // chosen over the engine default.
        let voices = vec![
            Voice::new("Standard", "en-US"),
            Voice::new("Hans", "de-DE").with_default(),
        ];
        assert_eq!(
            select_voice(&voices, "en").map(|v| v.name.as_str()),
            Some("Standard")
        );
    }

    #[test]
    fn default_voice_when_language_has_no_match() {
        let voices = vec![
            Voice::new("Hans", "de-DE"),
            Voice::new("Chantal", "fr-FR").with_default(),
        ];
        assert_eq!(
            select_voice(&voices, "sv").map(|v| v.name.as_str()),
            Some("Chantal")
        );
    }

    #[test]
    fn first_voice_as_the_last_resort() {
        let voices = vec![Voice::new("Hans", "de-DE"), Voice::new("Chantal", "fr-FR")];
        assert_eq!(select_voice(&voices, "sv").map(|v| v.name.as_str()), Some("Hans"));
        assert_eq!(select_voice(&[], "en"), None);
    }

    #[test]
    fn gender_metadata_overrides_the_name_heuristic() {
        let voices = vec![
            Voice::new("Voice A Female", "en-US").with_gender(Gender::Male),
            Voice::new("Voice B", "en-US").with_gender(Gender::Female),
        ];
        assert_eq!(
            select_voice(&voices, "en").map(|v| v.name.as_str()),
            Some("Voice B")
        );
    }

    #[test]
    fn locale_variants_match_on_the_primary_subtag() {
        let voices = vec![Voice::new("Amy", "en_GB")];
        assert_eq!(select_voice(&voices, "en-US").map(|v| v.name.as_str()), Some("Amy"));
    }

    #[test]
    fn language_derivation_prefers_page_then_locale_then_fallback() {
        assert_eq!(page_language(Some("de-DE"), Some("fr-FR"), "en"), "de");
        assert_eq!(page_language(None, Some("fr-FR"), "en"), "fr");
        assert_eq!(page_language(Some("  "), None, "en"), "en");
        assert_eq!(page_language(Some("PT_br"), None, "en"), "pt");
    }
}
