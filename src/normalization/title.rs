use strsim::normalized_levenshtein;

/// Minimum similarity used by callers that do not inject their own threshold.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.6;

/// Fuzzy title comparator.
///
/// Documentary titles routinely carry subtitles, translated variants, or
/// festival-cut suffixes, so several looser checks are tried before the
/// similarity-ratio floor: normalized equality, substring containment, and
/// word-set overlap covering at least half of the smaller title.
#[derive(Debug, Clone, Copy)]
pub struct TitleMatcher {
    min_similarity: f64,
}

impl Default for TitleMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIMILARITY)
    }
}

impl TitleMatcher {
    pub fn new(min_similarity: f64) -> Self {
        Self { min_similarity }
    }

    pub fn matches(&self, candidate: &str, reference: &str) -> bool {
        let a = normalize_title(candidate);
        let b = normalize_title(reference);
        if a.is_empty() || b.is_empty() {
            return false;
        }

        if a == b {
            return true;
        }
        if a.contains(&b) || b.contains(&a) {
            return true;
        }

        let words_a: std::collections::HashSet<&str> = a.split(' ').collect();
        let words_b: std::collections::HashSet<&str> = b.split(' ').collect();
        let overlap = words_a.intersection(&words_b).count();
        let min_len = words_a.len().min(words_b.len());
        if min_len > 0 && (overlap as f64) >= (min_len as f64) * 0.5 {
            return true;
        }

        similarity(&a, &b) >= self.min_similarity
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_space = true;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            for low in ch.to_lowercase() {
                out.push(low);
            }
            prev_space = false;
        } else if ch.is_whitespace() || ch == '-' || ch == '\'' || ch.is_ascii_punctuation() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Case-insensitive similarity ratio in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}
