//! Text preparation for TTS: language-aware chunking.
//!
//! The voice model truncates or garbles input past a per-language length, so
//! long text is cut into chunks that each fit the budget from
//! [`crate::language`]. Cuts land on the strongest boundary available in the
//! window: sentence end, then clause, then comma, then a word gap (or, for
//! CJK text, a grammatical particle). Only when none qualifies is the text
//! hard-split at the limit.
//!
//! Pure functions, no I/O. All lengths are counted in `char`s.

use tracing::debug;

use crate::language::{char_limit, is_cjk};

/// One class of split marker, tried as a whole before the next.
struct Tier {
    markers: &'static [char],
    /// The marker's index must be at least this share of the window.
    min_percent: usize,
}

const WESTERN_TIERS: &[Tier] = &[
    Tier { markers: &['.', '!', '?'], min_percent: 30 },
    Tier { markers: &[';', ':'], min_percent: 30 },
    Tier { markers: &[','], min_percent: 30 },
    Tier { markers: &[' '], min_percent: 30 },
];

const CJK_TIERS: &[Tier] = &[
    Tier { markers: &['。', '！', '？', '.', '!', '?'], min_percent: 30 },
    Tier { markers: &['、', ';', ':', '；', '：'], min_percent: 30 },
    Tier { markers: &['，', ','], min_percent: 30 },
    // Particles only give a soft boundary, so demand a fuller first chunk.
    Tier {
        markers: &['은', '는', '이', '가', '을', '를', '의', '에', '서', '도', ' '],
        min_percent: 50,
    },
];

/// Split `text` into chunks no longer than the budget for `language`.
///
/// Text already within the budget is returned untouched as a single chunk.
/// Otherwise every emitted chunk is whitespace-trimmed. Empty or
/// whitespace-only input yields one empty chunk. Never returns an empty list.
pub fn split_text(text: &str, language: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }

    let limit = char_limit(language);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text.trim();

    while !remaining.is_empty() {
        // Byte offset of the first char past the budget; None means the rest fits.
        let window_end = match remaining.char_indices().nth(limit) {
            Some((byte, _)) => byte,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..window_end];
        let split_at = find_split_point(window, language).unwrap_or(window_end);

        let chunk = remaining[..split_at].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = remaining[split_at..].trim();
    }

    debug!("split {} chars into {} chunks ({language})", text.chars().count(), chunks.len());
    chunks
}

/// Find where to cut `window`, as a byte offset just past the chosen marker.
///
/// Tiers are tried in priority order; within a tier the rightmost marker
/// wins, and is rejected if it sits too close to the start of the window.
pub fn find_split_point(window: &str, language: &str) -> Option<usize> {
    let tiers = if is_cjk(language) { CJK_TIERS } else { WESTERN_TIERS };
    let chars: Vec<(usize, char)> = window.char_indices().collect();
    let len = chars.len();

    for tier in tiers {
        let found = chars
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (_, c))| tier.markers.contains(c));

        if let Some((idx, &(byte, c))) = found {
            if idx * 100 >= len * tier.min_percent {
                return Some(byte + c.len_utf8());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_TEXT: &str = "Hello. This is a test sentence that is deliberately long enough to exceed the english limit of two hundred forty characters by a fair margin, containing multiple complete sentences for boundary testing purposes indeed.";

    fn non_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    // ── split_text ──────────────────────────────────────────────────

    #[test]
    fn short_text_not_split() {
        let chunks = split_text("Hello world.", "en");
        assert_eq!(chunks, vec!["Hello world."]);
    }

    #[test]
    fn short_text_returned_verbatim() {
        // No trimming on the single-chunk path.
        let chunks = split_text("  padded  ", "en");
        assert_eq!(chunks, vec!["  padded  "]);
    }

    #[test]
    fn text_at_exact_limit_not_split() {
        let text = "a".repeat(240);
        assert_eq!(split_text(&text, "en"), vec![text]);
    }

    #[test]
    fn empty_and_whitespace_input() {
        assert_eq!(split_text("", "en"), vec![""]);
        assert_eq!(split_text("   \n\t ", "ko"), vec![""]);
    }

    #[test]
    fn splits_long_english_at_sentence_boundary() {
        let text = format!(
            "{HELLO_TEXT} It keeps going with one more sentence so the total comfortably passes the limit."
        );
        assert!(text.chars().count() > 240);

        let chunks = split_text(&text, "en");
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 240, "chunk too long: {}", chunk.len());
        }
        assert_eq!(chunks[0], HELLO_TEXT);
        assert!(chunks[1].starts_with("It keeps going"));
    }

    #[test]
    fn early_sentence_end_rejected() {
        // The only period sits below the 30% mark, so the cut falls on a space.
        let text = format!("Hi. {}", "word ".repeat(60));
        let chunks = split_text(&text, "en");
        assert!(chunks.len() >= 2);
        assert!(chunks[0].starts_with("Hi. word"));
        assert!(chunks[0].ends_with("word"));
        assert!(chunks[0].chars().count() > 72);
    }

    #[test]
    fn prefers_clause_over_comma() {
        let text = format!("{}; {}, {}", "a".repeat(100), "b".repeat(50), "c".repeat(150));
        let chunks = split_text(&text, "en");
        assert!(chunks[0].ends_with(';'), "got {:?}", chunks[0]);
    }

    #[test]
    fn falls_back_to_comma() {
        let text = format!("{}, {}", "a".repeat(150), "b".repeat(150));
        let chunks = split_text(&text, "en");
        assert_eq!(chunks[0], format!("{},", "a".repeat(150)));
        assert_eq!(chunks[1], "b".repeat(150));
    }

    #[test]
    fn splits_at_word_boundary() {
        let text = "word ".repeat(100);
        let chunks = split_text(text.trim(), "en");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 240);
            assert!(chunk.ends_with("word"), "cut mid-word: {chunk:?}");
        }
    }

    #[test]
    fn hard_splits_long_word() {
        let text = "a".repeat(500);
        let chunks = split_text(&text, "en");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 240);
        assert_eq!(chunks[1].len(), 240);
        assert_eq!(chunks[2].len(), 20);
    }

    #[test]
    fn unknown_language_uses_default_limit() {
        let text = "a".repeat(450);
        let chunks = split_text(&text, "xx");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 200);
    }

    #[test]
    fn korean_prefers_particle() {
        // 200 chars, no punctuation, no spaces.
        let text = "학교에서공부를합니다".repeat(20);
        assert_eq!(text.chars().count(), 200);

        let chunks = split_text(&text, "ko");
        assert!(chunks.len() >= 3);
        let first = &chunks[0];
        assert!(first.chars().count() <= 90);
        assert!(first.ends_with('를'), "expected particle cut, got {first:?}");
        assert_eq!(first.chars().count(), 87);
    }

    #[test]
    fn korean_particle_below_half_forces_split() {
        // Only particle sits at 20% of the window.
        let text = format!("{}는{}", "한".repeat(18), "한".repeat(150));
        let chunks = split_text(&text, "ko");
        assert_eq!(chunks[0].chars().count(), 90);
    }

    #[test]
    fn japanese_sentence_end() {
        let sentence = "今日はとても良い天気ですね。";
        let text = sentence.repeat(10);
        let chunks = split_text(&text, "ja");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 90);
            assert!(chunk.ends_with('。'));
        }
    }

    #[test]
    fn chinese_full_width_comma() {
        let text = format!("{}，{}", "中".repeat(60), "文".repeat(60));
        let chunks = split_text(&text, "zh-cn");
        assert_eq!(chunks[0], format!("{}，", "中".repeat(60)));
    }

    #[test]
    fn chunks_are_trimmed() {
        let text = "Sentence one is here.    ".repeat(20);
        for chunk in split_text(&text, "en") {
            assert_eq!(chunk, chunk.trim());
        }
    }

    #[test]
    fn preserves_all_content() {
        let text = "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs. How vexingly quick daft zebras jump! ".repeat(8);
        let chunks = split_text(&text, "en");
        assert!(chunks.len() > 1);
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&text));
    }

    #[test]
    fn preserves_all_content_cjk() {
        let text = "나는 오늘 학교에 갔다. 친구를 만났고, 함께 점심을 먹었다! ".repeat(10);
        let chunks = split_text(&text, "ko");
        assert!(chunks.len() > 1);
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&text));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 90);
        }
    }

    #[test]
    fn chunk_count_near_length_over_limit() {
        let text = "lorem ipsum dolor sit amet ".repeat(80);
        let n = split_text(&text, "en").len();
        let len = text.chars().count();
        assert!(n >= len / 240);
        assert!(n <= len / 72 + 1);
    }

    // ── find_split_point ────────────────────────────────────────────

    #[test]
    fn split_point_is_past_marker() {
        let window = "abcdefghij. klm";
        assert_eq!(find_split_point(window, "en"), Some(11));
    }

    #[test]
    fn split_point_rightmost_in_tier() {
        // '!' is further right than '.', both in the sentence tier.
        let window = "aaaaaaa. bbbbbb! cc";
        assert_eq!(find_split_point(window, "en"), Some(16));
    }

    #[test]
    fn split_point_none_without_markers() {
        assert_eq!(find_split_point(&"x".repeat(50), "en"), None);
        assert_eq!(find_split_point(&"한".repeat(50), "ko"), None);
    }

    #[test]
    fn split_point_multibyte_offsets() {
        let window = "가나다라마바사。아자";
        let at = find_split_point(window, "ko").unwrap();
        assert!(window.is_char_boundary(at));
        assert!(window[..at].ends_with('。'));
    }

    #[test]
    fn space_tier_skipped_for_cjk_but_particle_space_counts() {
        // Space at 60% counts via the particle tier for CJK.
        let window = format!("{} {}", "한".repeat(6), "한".repeat(3));
        assert_eq!(find_split_point(&window, "ko"), Some(6 * 3 + 1));
        // At 40% it would pass the western space tier but not the particle tier.
        let window = format!("{} {}", "한".repeat(4), "한".repeat(5));
        assert_eq!(find_split_point(&window, "ko"), None);
        let window = format!("{} {}", "a".repeat(4), "a".repeat(5));
        assert_eq!(find_split_point(&window, "en"), Some(5));
    }
}
