//! Keyword extraction from job descriptions and keyword/skill matching.
//!
//! Shared by the heuristic enhancer and the keyword match scorer so both rank
//! and match JD terms the same way.

use std::collections::{HashMap, HashSet};

/// Number of JD keywords kept after ranking.
pub const DEFAULT_KEYWORD_LIMIT: usize = 15;

/// Below this length a skill or keyword only matches as a whole token,
/// so "go" does not match "google" and "r" does not match everything.
const MIN_CONTAINMENT_LEN: usize = 4;

const STOPWORDS: &[&str] = &[
    "a", "ability", "able", "about", "above", "across", "after", "all", "also", "an", "and",
    "any", "are", "as", "at", "be", "been", "being", "both", "but", "by", "can", "could",
    "daily", "do", "does", "e.g", "each", "etc", "every", "excellent", "experience", "for",
    "from", "good", "great", "had", "has", "have", "he", "her", "his", "how", "i.e", "if",
    "in", "into", "is", "it", "its", "job", "just", "knowledge", "least", "like", "looking",
    "may", "more", "most", "must", "need", "needs", "new", "nice", "not", "of", "on", "one",
    "or", "other",
    "our", "out", "over", "own", "per", "plus", "preferred", "required", "requirements",
    "responsibilities", "role", "she", "should", "skills", "so", "some", "strong", "such", "team",
    "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "through", "to",
    "under", "up", "us", "using", "very", "via", "want", "was", "we", "well", "were", "what",
    "when", "where", "which", "while", "who", "will", "with", "within", "work", "working",
    "would", "years", "you", "your",
];

/// A ranked JD keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedKeyword {
    pub keyword: String,
    pub frequency: u32,
    /// Zero-based position in the ranking.
    pub rank: usize,
}

impl RankedKeyword {
    /// Rank weight used by keyword scoring: `1 / (1 + rank * 0.1)`.
    pub fn weight(&self) -> f32 {
        1.0 / (1.0 + self.rank as f32 * 0.1)
    }
}

/// Splits text into lowercase tokens, keeping `+`, `#` and `.` inside tokens
/// (`c++`, `c#`, `node.js`). Sentence-ending dots are stripped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')))
        .map(|t| t.trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_candidate_keyword(token: &str) -> bool {
    token.chars().count() >= 2
        && !STOPWORDS.contains(&token)
        && token.chars().any(|c| c.is_alphabetic())
}

/// Extracts the top `limit` keywords from a job description, ranked by
/// frequency then first occurrence.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<RankedKeyword> {
    let mut counts: HashMap<String, (u32, usize)> = HashMap::new();
    for (position, token) in tokenize(text).into_iter().enumerate() {
        if !is_candidate_keyword(&token) {
            continue;
        }
        counts
            .entry(token)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(String, u32, usize)> = counts
        .into_iter()
        .map(|(keyword, (count, first))| (keyword, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(rank, (keyword, frequency, _))| RankedKeyword {
            keyword,
            frequency,
            rank,
        })
        .collect()
}

/// Case-insensitive skill/keyword match. One side containing the other counts
/// when the shorter side is long enough; otherwise the shorter must be a whole token
/// of the longer.
pub fn skill_matches_keyword(skill: &str, keyword: &str) -> bool {
    let skill = skill.trim().to_lowercase();
    let keyword = keyword.trim().to_lowercase();
    if skill.is_empty() || keyword.is_empty() {
        return false;
    }
    if skill == keyword {
        return true;
    }

    let (shorter, longer) = if skill.chars().count() <= keyword.chars().count() {
        (&skill, &keyword)
    } else {
        (&keyword, &skill)
    };

    if shorter.chars().count() >= MIN_CONTAINMENT_LEN {
        longer.contains(shorter.as_str())
    } else {
        tokenize(longer).iter().any(|t| t == shorter)
    }
}

/// Lowercased resume text with a token index, for repeated keyword lookups.
#[derive(Debug, Clone)]
pub struct SearchableText {
    lower: String,
    tokens: HashSet<String>,
}

impl SearchableText {
    pub fn new(text: &str) -> Self {
        Self {
            lower: text.to_lowercase(),
            tokens: tokenize(text).into_iter().collect(),
        }
    }

    /// Substring match for longer keywords, whole-token match for short ones.
    pub fn contains_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return false;
        }
        if keyword.chars().count() >= MIN_CONTAINMENT_LEN {
            self.lower.contains(&keyword)
        } else {
            self.tokens.contains(&keyword)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(text: &str) -> Vec<String> {
        extract_keywords(text, DEFAULT_KEYWORD_LIMIT)
            .into_iter()
            .map(|k| k.keyword)
            .collect()
    }

    #[test]
    fn test_tokenize_keeps_language_punctuation() {
        let tokens = tokenize("Experience with C++, C# and Node.js. Go!");
        assert_eq!(tokens, vec!["experience", "with", "c++", "c#", "and", "node.js", "go"]);
    }

    #[test]
    fn test_extract_ranks_by_frequency_then_first_occurrence() {
        let kws = keywords("Kafka and Rust. Rust services, Postgres, Kafka, Rust.");
        assert_eq!(kws, vec!["rust", "kafka", "services", "postgres"]);
    }

    #[test]
    fn test_extract_drops_stopwords_short_tokens_and_numbers() {
        let kws = keywords("You will work with a 5 person team on 2024 roadmaps in Go");
        assert_eq!(kws, vec!["person", "roadmaps", "go"]);
    }

    #[test]
    fn test_extract_respects_limit() {
        let text = (0..30).map(|i| format!("skill{i}x")).collect::<Vec<_>>().join(" ");
        assert_eq!(extract_keywords(&text, 15).len(), 15);
    }

    #[test]
    fn test_rank_weight_decreases() {
        let kws = extract_keywords("rust rust kafka", 15);
        assert!((kws[0].weight() - 1.0).abs() < f32::EPSILON);
        assert!((kws[1].weight() - 1.0 / 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_skill_match_containment_for_long_terms() {
        assert!(skill_matches_keyword("PostgreSQL", "postgres"));
        assert!(skill_matches_keyword("kubernetes", "Kubernetes"));
        assert!(skill_matches_keyword("React Native", "react"));
    }

    #[test]
    fn test_skill_match_short_terms_need_whole_token() {
        assert!(!skill_matches_keyword("Google Cloud", "go"));
        assert!(skill_matches_keyword("Go programming", "go"));
        assert!(!skill_matches_keyword("C++", "c"));
        assert!(skill_matches_keyword("c#", "C#"));
    }

    #[test]
    fn test_searchable_text_lookup() {
        let text = SearchableText::new("Built services in Go on Kubernetes clusters");
        assert!(text.contains_keyword("kubernetes"));
        assert!(text.contains_keyword("go"));
        assert!(!text.contains_keyword("rust"));
        assert!(!text.contains_keyword("on-call"));
        let no_go = SearchableText::new("Worked at Google");
        assert!(!no_go.contains_keyword("go"));
    }
}
