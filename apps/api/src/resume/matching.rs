//! Match Scoring: pluggable, trait-based scorer that measures a resume against a job description.
//!
//! Backends: `GeminiMatchScorer` (LLM, falls back to keywords on any failure) and
//! `KeywordMatchScorer` (pure-Rust, deterministic, fully testable).
//!
//! `AppState` holds an `Arc<dyn MatchScorer>`, chosen at startup via config.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm_client::GeminiClient;
use crate::resume::cache::MatchCache;
use crate::resume::keywords::{extract_keywords, skill_matches_keyword, SearchableText, DEFAULT_KEYWORD_LIMIT};
use crate::resume::models::ParsedResume;
use crate::resume::prompts::{build_match_prompt, MATCH_SYSTEM};

pub const KEYWORD_BACKEND: &str = "keyword";
pub const GEMINI_BACKEND: &str = "gemini";

const SKILLS_WEIGHT: f32 = 0.6;
const EXPERIENCE_WEIGHT: f32 = 0.25;
const EDUCATION_WEIGHT: f32 = 0.15;
const MAX_LIST_ITEMS: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Output data model (shared across all scorer backends)
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-schema match report returned to callers and stored on applications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub overall_score: u32, // 0 – 100
    pub skills_score: u32,
    pub experience_score: u32,
    pub education_score: u32,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
    pub summary: String,
    pub scorer_backend: String, // "keyword" | "gemini"
}

/// What gets scored. `resume_text` is the extracted text when available,
/// otherwise the parsed resume flattened to text.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub resume: &'a ParsedResume,
    pub resume_text: &'a str,
    pub job_description: &'a str,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The match scorer trait. Implement this to swap backends without touching
/// the endpoint, handler, or caller code.
///
/// Carried in `AppState` as `Arc<dyn MatchScorer>`.
#[async_trait]
pub trait MatchScorer: Send + Sync {
    async fn score(&self, input: &MatchInput<'_>) -> Result<MatchReport, AppError>;

    /// Label recorded in `MatchReport::scorer_backend` when this backend produced the report.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordMatchScorer
// ────────────────────────────────────────────────────────────────────────────

/// Pure-Rust keyword-based scorer. Fast, deterministic, no LLM call.
///
/// Algorithm:
/// 1. Top JD keywords, each weighted `1 / (1 + rank * 0.1)`:
///    - skill tag match → strength 1.0
///    - resume text match → strength 0.6
///    - no match → strength 0.0
/// 2. skills_score = Σ(strength × weight) / Σ(weight) × 100
/// 3. overall = 0.6·skills + 0.25·experience + 0.15·education
pub struct KeywordMatchScorer;

#[async_trait]
impl MatchScorer for KeywordMatchScorer {
    async fn score(&self, input: &MatchInput<'_>) -> Result<MatchReport, AppError> {
        Ok(compute_keyword_match(input))
    }

    fn backend(&self) -> &'static str {
        KEYWORD_BACKEND
    }
}

pub fn compute_keyword_match(input: &MatchInput<'_>) -> MatchReport {
    let keywords = extract_keywords(input.job_description, DEFAULT_KEYWORD_LIMIT);
    let text = SearchableText::new(input.resume_text);

    let mut matched_skills = Vec::new();
    let mut missing_skills = Vec::new();
    let mut strengths = Vec::new();
    let mut total_weight = 0.0_f32;
    let mut total_score = 0.0_f32;

    for kw in &keywords {
        let weight = kw.weight();
        total_weight += weight;

        let tag_match = input
            .resume
            .skills
            .iter()
            .any(|s| skill_matches_keyword(s, &kw.keyword));
        let strength = if tag_match {
            1.0
        } else if text.contains_keyword(&kw.keyword) {
            0.6
        } else {
            0.0
        };
        total_score += strength * weight;

        if strength >= 1.0 {
            matched_skills.push(kw.keyword.clone());
            strengths.push(format!("Lists {} as a skill", kw.keyword));
        } else if strength > 0.0 {
            matched_skills.push(kw.keyword.clone());
        } else {
            missing_skills.push(kw.keyword.clone());
        }
    }

    let skills_score = if total_weight > 0.0 {
        ((total_score / total_weight) * 100.0).round() as u32
    } else {
        0
    };

    let years = years_of_experience(input.resume);
    let experience_score = score_experience(years);
    let education_score = if input.resume.education.is_empty() { 40 } else { 100 };

    let overall_score = combine_scores(skills_score, experience_score, education_score);

    if let Some(y) = years.filter(|y| *y >= 1.0) {
        strengths.push(format!("{y:.0}+ years of professional experience"));
    }
    strengths.truncate(MAX_LIST_ITEMS);

    let gaps: Vec<String> = missing_skills
        .iter()
        .take(MAX_LIST_ITEMS)
        .map(|kw| format!("No evidence of {kw}"))
        .collect();
    let recommendations: Vec<String> = missing_skills
        .iter()
        .take(MAX_LIST_ITEMS)
        .map(|kw| format!("Add concrete examples of {kw} work if you have them"))
        .collect();

    MatchReport {
        overall_score,
        skills_score,
        experience_score,
        education_score,
        summary: build_summary(overall_score, &missing_skills),
        matched_skills,
        missing_skills,
        strengths,
        gaps,
        recommendations,
        scorer_backend: KEYWORD_BACKEND.to_string(),
    }
}

fn combine_scores(skills: u32, experience: u32, education: u32) -> u32 {
    (skills as f32 * SKILLS_WEIGHT
        + experience as f32 * EXPERIENCE_WEIGHT
        + education as f32 * EDUCATION_WEIGHT)
        .round()
        .clamp(0.0, 100.0) as u32
}

/// 0 years (or no entries) → 20, 5+ years → 100, linear in between; unknown dates → 50.
fn score_experience(years: Option<f32>) -> u32 {
    match years {
        Some(y) => (20.0 + 80.0 * (y.clamp(0.0, 5.0) / 5.0)).round() as u32,
        None => 50,
    }
}

/// Builds a human-readable summary from score and missing keywords.
fn build_summary(score: u32, missing: &[String]) -> String {
    let top_gaps: Vec<&str> = missing.iter().take(3).map(String::as_str).collect();

    if score >= 80 {
        format!("Strong fit ({score}/100). The resume covers the key requirements.")
    } else if top_gaps.is_empty() {
        format!("Partial fit ({score}/100). Experience or education lowers the score.")
    } else if score >= 60 {
        format!(
            "Moderate fit ({score}/100). Consider strengthening: {}.",
            top_gaps.join(", ")
        )
    } else {
        format!(
            "Low fit ({score}/100). Significant gaps: {}.",
            top_gaps.join(", ")
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Experience duration
// ────────────────────────────────────────────────────────────────────────────

/// Parses "Jan 2020", "January 2020", "01/2020", "2020-01" or "2020" into months since year 0.
/// "Present"/"Current"/"Now" map to the current month.
pub fn parse_month_index(raw: &str) -> Option<i32> {
    let value = raw.trim().to_lowercase();
    if matches!(value.as_str(), "present" | "current" | "now" | "today") {
        let now = Utc::now();
        return Some(now.year() * 12 + now.month0() as i32);
    }

    let year_of = |s: &str| -> Option<i32> {
        let y: i32 = s.trim().parse().ok()?;
        (1950..=2100).contains(&y).then_some(y)
    };

    if let Some((a, b)) = value.split_once('/') {
        let month: i32 = a.trim().parse().ok()?;
        return (1..=12).contains(&month).then_some(year_of(b)? * 12 + month - 1);
    }
    if let Some((a, b)) = value.split_once('-') {
        let month: i32 = b.trim().parse().ok()?;
        return (1..=12).contains(&month).then_some(year_of(a)? * 12 + month - 1);
    }

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(only), None) => year_of(only).map(|y| y * 12),
        (Some(month), Some(year)) => {
            let month = month_number(month)?;
            Some(year_of(year)? * 12 + month - 1)
        }
        _ => None,
    }
}

fn month_number(name: &str) -> Option<i32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let name = name.trim_end_matches([',', '.']);
    MONTHS
        .iter()
        .position(|m| name.starts_with(m))
        .map(|i| i as i32 + 1)
}

/// Sum of experience spans in years. A missing end date counts as ongoing.
/// Zero with no entries; `None` when entries exist but none has parseable dates.
pub fn years_of_experience(resume: &ParsedResume) -> Option<f32> {
    if resume.experience.is_empty() {
        return Some(0.0);
    }
    let mut total_months = 0;
    let mut any = false;

    for entry in &resume.experience {
        let Some(start) = entry.start_date.as_deref().and_then(parse_month_index) else {
            continue;
        };
        let end = entry
            .end_date
            .as_deref()
            .map_or_else(|| parse_month_index("present"), parse_month_index);
        let Some(end) = end else { continue };
        if end >= start {
            total_months += end - start;
            any = true;
        }
    }

    any.then_some(total_months as f32 / 12.0)
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiMatchScorer
// ────────────────────────────────────────────────────────────────────────────

/// Shape the LLM is asked to return. Scores arrive as loose numbers.
#[derive(Debug, Deserialize)]
struct LlmMatchReport {
    overall_score: Option<f64>,
    skills_score: Option<f64>,
    experience_score: Option<f64>,
    education_score: Option<f64>,
    #[serde(default)]
    matched_skills: Vec<String>,
    #[serde(default)]
    missing_skills: Vec<String>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    summary: String,
}

/// Semantic scorer via Gemini. Any LLM failure or incomplete output
/// yields the keyword report instead.
pub struct GeminiMatchScorer {
    llm: GeminiClient,
}

impl GeminiMatchScorer {
    pub fn new(llm: GeminiClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl MatchScorer for GeminiMatchScorer {
    async fn score(&self, input: &MatchInput<'_>) -> Result<MatchReport, AppError> {
        let prompt = build_match_prompt(input.resume_text, input.job_description);
        match self.llm.call_json::<LlmMatchReport>(&prompt, MATCH_SYSTEM).await {
            Ok(raw) => match normalize_llm_report(raw) {
                Some(report) => Ok(report),
                None => {
                    warn!("LLM match report missing sub-scores, using keyword scorer");
                    Ok(compute_keyword_match(input))
                }
            },
            Err(e) => {
                warn!("LLM match scoring failed, using keyword scorer: {e}");
                Ok(compute_keyword_match(input))
            }
        }
    }

    fn backend(&self) -> &'static str {
        GEMINI_BACKEND
    }
}

fn clamp_score(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u32
}

fn normalize_llm_report(raw: LlmMatchReport) -> Option<MatchReport> {
    let skills_score = clamp_score(raw.skills_score?);
    let experience_score = clamp_score(raw.experience_score?);
    let education_score = clamp_score(raw.education_score?);
    let overall_score = match raw.overall_score {
        Some(score) => clamp_score(score),
        None => clamp_score((skills_score + experience_score + education_score) as f64 / 3.0),
    };

    let trim_list = |items: Vec<String>| -> Vec<String> {
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    Some(MatchReport {
        overall_score,
        skills_score,
        experience_score,
        education_score,
        matched_skills: trim_list(raw.matched_skills),
        missing_skills: trim_list(raw.missing_skills),
        strengths: trim_list(raw.strengths),
        gaps: trim_list(raw.gaps),
        recommendations: trim_list(raw.recommendations),
        summary: raw.summary.trim().to_string(),
        scorer_backend: GEMINI_BACKEND.to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Cached scoring
// ────────────────────────────────────────────────────────────────────────────

/// Scores through the cache. Reports produced by a fallback backend are not cached,
/// so a transient LLM outage does not pin keyword results for the whole TTL.
pub async fn score_cached(
    scorer: &dyn MatchScorer,
    cache: &MatchCache,
    input: &MatchInput<'_>,
) -> Result<MatchReport, AppError> {
    let key = MatchCache::key(scorer.backend(), input.resume_text, input.job_description);

    if let Some(hit) = cache.get(&key).await {
        debug!("Match cache hit");
        return Ok(hit);
    }

    let report = scorer.score(input).await?;
    if report.scorer_backend == scorer.backend() {
        cache.put(&key, &report).await;
    }
    Ok(report)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::models::{EducationEntry, ExperienceEntry};
    use mockito::{Matcher, Server};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    fn resume(skills: &[&str], experience: Vec<ExperienceEntry>, with_education: bool) -> ParsedResume {
        ParsedResume {
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience,
            education: if with_education {
                vec![EducationEntry {
                    institution: Some("MIT".into()),
                    ..Default::default()
                }]
            } else {
                vec![]
            },
            ..Default::default()
        }
    }

    fn job(start: &str, end: &str) -> ExperienceEntry {
        ExperienceEntry {
            title: Some("Engineer".into()),
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            ..Default::default()
        }
    }

    fn input<'a>(resume: &'a ParsedResume, text: &'a str, jd: &'a str) -> MatchInput<'a> {
        MatchInput {
            resume,
            resume_text: text,
            job_description: jd,
        }
    }

    #[test]
    fn test_all_keywords_tagged_scores_full_skills() {
        let r = resume(&["Rust", "Kafka"], vec![job("2015", "2021")], true);
        let report = compute_keyword_match(&input(&r, "", "Rust Kafka"));
        assert_eq!(report.skills_score, 100);
        assert_eq!(report.experience_score, 100);
        assert_eq!(report.education_score, 100);
        assert_eq!(report.overall_score, 100);
        assert!(report.missing_skills.is_empty());
        assert_eq!(report.scorer_backend, "keyword");
    }

    #[test]
    fn test_text_match_is_partial() {
        let r = resume(&[], vec![], false);
        let report = compute_keyword_match(&input(&r, "Ran kubernetes clusters", "kubernetes"));
        assert_eq!(report.skills_score, 60);
        assert_eq!(report.matched_skills, vec!["kubernetes"]);
        assert!(report.strengths.is_empty());
    }

    #[test]
    fn test_no_experience_and_no_education_defaults() {
        let r = resume(&[], vec![], false);
        let report = compute_keyword_match(&input(&r, "", "terraform"));
        assert_eq!(report.skills_score, 0);
        assert_eq!(report.experience_score, 20);
        assert_eq!(report.education_score, 40);
        // 0.25*20 + 0.15*40 = 11
        assert_eq!(report.overall_score, 11);
        assert_eq!(report.missing_skills, vec!["terraform"]);
        assert_eq!(report.gaps, vec!["No evidence of terraform"]);
        assert_eq!(report.recommendations.len(), 1);
        assert!(report.summary.starts_with("Low fit"));
    }

    #[test]
    fn test_rank_weighting_favours_top_keywords() {
        let r = resume(&["Rust"], vec![], false);
        // rust ranks first (frequency 2), kafka second.
        let report = compute_keyword_match(&input(&r, "", "Rust Rust Kafka"));
        // (1.0*1.0 + 0.0*(1/1.1)) / (1 + 1/1.1) = 0.5238 → 52
        assert_eq!(report.skills_score, 52);
    }

    #[test]
    fn test_no_keywords_scores_zero_skills() {
        let r = resume(&["Rust"], vec![], true);
        let report = compute_keyword_match(&input(&r, "", "the and of"));
        assert_eq!(report.skills_score, 0);
        assert!(report.missing_skills.is_empty());
        assert!(report.summary.starts_with("Partial fit"));
    }

    #[test]
    fn test_experience_score_curve() {
        assert_eq!(score_experience(Some(0.0)), 20);
        assert_eq!(score_experience(Some(2.5)), 60);
        assert_eq!(score_experience(Some(5.0)), 100);
        assert_eq!(score_experience(Some(12.0)), 100);
        assert_eq!(score_experience(None), 50);
    }

    #[test]
    fn test_parse_month_index_formats() {
        assert_eq!(parse_month_index("2020"), Some(2020 * 12));
        assert_eq!(parse_month_index("Jan 2020"), Some(2020 * 12));
        assert_eq!(parse_month_index("March 2021"), Some(2021 * 12 + 2));
        assert_eq!(parse_month_index("Sept. 2019"), Some(2019 * 12 + 8));
        assert_eq!(parse_month_index("03/2018"), Some(2018 * 12 + 2));
        assert_eq!(parse_month_index("2018-11"), Some(2018 * 12 + 10));
        assert_eq!(parse_month_index("sometime"), None);
        assert_eq!(parse_month_index("13/2018"), None);
        assert!(parse_month_index("Present").is_some());
    }

    #[test]
    fn test_years_of_experience_sums_spans() {
        let r = resume(
            &[],
            vec![job("Jan 2018", "Jan 2020"), job("2015", "2016")],
            false,
        );
        assert_eq!(years_of_experience(&r), Some(3.0));
    }

    #[test]
    fn test_no_experience_scores_below_short_experience() {
        let none = resume(&[], vec![], true);
        let short = resume(&[], vec![job("Jan 2020", "Jul 2020")], true);
        let none_report = compute_keyword_match(&input(&none, "", "rust"));
        let short_report = compute_keyword_match(&input(&short, "", "rust"));
        assert_eq!(years_of_experience(&none), Some(0.0));
        assert_eq!(none_report.experience_score, 20);
        assert!(short_report.experience_score > none_report.experience_score);
    }

    #[test]
    fn test_years_of_experience_unknown_dates() {
        let r = resume(&[], vec![ExperienceEntry::default()], false);
        assert_eq!(years_of_experience(&r), None);
    }

    #[test]
    fn test_normalize_llm_report_clamps_and_averages() {
        let raw: LlmMatchReport = serde_json::from_str(
            r#"{"skills_score": 120, "experience_score": -5, "education_score": 70.6,
                "matched_skills": ["Rust", " "], "summary": " ok "}"#,
        )
        .unwrap();
        let report = normalize_llm_report(raw).unwrap();
        assert_eq!(report.skills_score, 100);
        assert_eq!(report.experience_score, 0);
        assert_eq!(report.education_score, 71);
        assert_eq!(report.overall_score, 57);
        assert_eq!(report.matched_skills, vec!["Rust"]);
        assert_eq!(report.summary, "ok");
        assert_eq!(report.scorer_backend, "gemini");
    }

    #[test]
    fn test_normalize_llm_report_requires_sub_scores() {
        let raw: LlmMatchReport = serde_json::from_str(r#"{"overall_score": 80}"#).unwrap();
        assert!(normalize_llm_report(raw).is_none());
    }

    #[tokio::test]
    async fn test_gemini_scorer_uses_llm_report() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text":
                r#"{"overall_score": 88, "skills_score": 90, "experience_score": 85,
                    "education_score": 80, "summary": "Good"}"#}]}}]
        });
        server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let scorer =
            GeminiMatchScorer::new(GeminiClient::with_base_url("k".into(), server.url()).unwrap());
        let r = resume(&["Rust"], vec![], false);
        let report = scorer.score(&input(&r, "Rust", "Rust")).await.unwrap();
        assert_eq!(report.overall_score, 88);
        assert_eq!(report.scorer_backend, "gemini");
    }

    #[tokio::test]
    async fn test_gemini_scorer_falls_back_to_keywords() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("{}")
            .create_async()
            .await;

        let scorer =
            GeminiMatchScorer::new(GeminiClient::with_base_url("k".into(), server.url()).unwrap());
        let r = resume(&["Rust"], vec![], false);
        let report = scorer.score(&input(&r, "Rust", "Rust")).await.unwrap();
        assert_eq!(report.scorer_backend, "keyword");
        assert_eq!(report.skills_score, 100);
    }
}
