//! Language table with per-language chunk budgets and script classification.
//!
//! The limits are conservative: the voice-cloning model starts truncating or
//! slurring audio well before its hard token limit, and the point where that
//! happens differs per language.

/// Maximum chunk length (in characters) per language code.
pub const LANGUAGE_CHAR_LIMITS: &[(&str, usize)] = &[
    ("ko", 90),
    ("ja", 90),
    ("zh-cn", 80),
    ("ar", 150),
    ("en", 240),
    ("es", 230),
    ("fr", 230),
    ("de", 220),
    ("it", 230),
    ("pt", 230),
    ("pl", 220),
    ("tr", 220),
    ("ru", 200),
    ("nl", 230),
    ("cs", 220),
    ("hu", 220),
];

/// Limit used for any language code not listed in [`LANGUAGE_CHAR_LIMITS`].
pub const DEFAULT_CHAR_LIMIT: usize = 200;

/// Every language code the synthesis model accepts, in advertised order.
pub const ALL_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "ja",
    "hu", "ko",
];

/// Languages written without inter-word spaces.
const CJK_LANGUAGES: &[&str] = &["ko", "ja", "zh-cn", "zh"];

/// Character budget for `language`, falling back to [`DEFAULT_CHAR_LIMIT`].
pub fn char_limit(language: &str) -> usize {
    LANGUAGE_CHAR_LIMITS
        .iter()
        .find(|(code, _)| *code == language)
        .map(|&(_, limit)| limit)
        .unwrap_or(DEFAULT_CHAR_LIMIT)
}

/// Whether `language` uses CJK boundary heuristics.
pub fn is_cjk(language: &str) -> bool {
    CJK_LANGUAGES.contains(&language)
}

/// Whether the model supports `language` at all.
pub fn is_known_language(language: &str) -> bool {
    ALL_LANGUAGES.contains(&language)
}

/// Parse a comma-separated language list (e.g. from `TTS_SUPPORTED_LANGUAGES`).
///
/// Unknown codes are dropped. An empty result falls back to English so the
/// service always has at least one usable language.
pub fn parse_language_list(csv: &str) -> Vec<String> {
    let langs: Vec<String> = csv
        .split(',')
        .map(str::trim)
        .filter(|code| is_known_language(code))
        .map(str::to_string)
        .collect();

    if langs.is_empty() {
        vec!["en".to_string()]
    } else {
        langs
    }
}

/// Rough number of chunks `text` will produce. The real count can differ
/// because boundary-aware splitting rarely fills a window completely.
pub fn estimate_chunk_count(text: &str, language: &str) -> usize {
    let limit = char_limit(language);
    let len = text.chars().count();
    if len <= limit { 1 } else { len / limit + 1 }
}
