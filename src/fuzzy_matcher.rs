use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// FZF-style matcher for history search. Strategies are tried by priority:
/// digits inside the text, exact substring, prefix, then skim fuzzy.
pub struct FzfMatcher {
    matcher: SkimMatcherV2,
}

impl FzfMatcher {
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    fn number_score(pattern: &str, text: &str) -> Option<i64> {
        if pattern.chars().all(|c| c.is_ascii_digit()) && text.contains(pattern) {
            Some(1200)
        } else {
            None
        }
    }

    fn exact_score(pattern: &str, text: &str) -> Option<i64> {
        text.contains(pattern)
            .then(|| 1000 + (pattern.len() * 10) as i64)
    }

    fn prefix_score(pattern: &str, text: &str) -> Option<i64> {
        text.starts_with(pattern)
            .then(|| 800 + (pattern.len() * 8) as i64)
    }

    /// Score `text` against `pattern`; `None` means no match. An empty
    /// pattern matches everything with score 0.
    pub fn score(&self, pattern: &str, text: &str) -> Option<i64> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Some(0);
        }
        let pattern_lower = pattern.to_lowercase();
        let text_lower = text.to_lowercase();

        Self::number_score(&pattern_lower, &text_lower)
            .or_else(|| Self::exact_score(&pattern_lower, &text_lower))
            .or_else(|| Self::prefix_score(&pattern_lower, &text_lower))
            .or_else(|| self.matcher.fuzzy_match(text, pattern))
    }

    /// Keep matching items, best score first; ties keep their input order.
    pub fn rank<T>(&self, pattern: &str, items: Vec<(T, String)>) -> Vec<T> {
        let mut scored: Vec<(usize, i64, T)> = items
            .into_iter()
            .enumerate()
            .filter_map(|(pos, (item, text))| self.score(pattern, &text).map(|s| (pos, s, item)))
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.into_iter().map(|(_, _, item)| item).collect()
    }
}

impl Default for FzfMatcher {
    fn default() -> Self {
        Self::new()
    }
}
