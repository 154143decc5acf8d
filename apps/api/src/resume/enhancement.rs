//! Resume Enhancement: tailors a parsed resume to a job description.
//!
//! The LLM rewrite is checked against the original so it can only rephrase and reorder.
//! Anything that invents an employer or loses the experience section is discarded
//! in favour of the deterministic keyword enhancer.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::GeminiClient;
use crate::resume::keywords::{
    extract_keywords, skill_matches_keyword, RankedKeyword, SearchableText, DEFAULT_KEYWORD_LIMIT,
};
use crate::resume::models::{ExperienceEntry, ParseMethod, ParsedResume};
use crate::resume::prompts::{build_enhance_prompt, ENHANCE_SYSTEM};
use crate::resume::validation::impact_gaps;

const MAX_SUGGESTIONS: usize = 5;
const MAX_SUMMARY_SKILLS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub summary: String,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub keywords_added: Vec<String>,
    pub suggestions: Vec<String>,
    pub method: ParseMethod,
}

/// Shape the LLM is asked to return.
#[derive(Debug, Deserialize)]
struct LlmEnhancement {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    experience: Vec<ExperienceEntry>,
    #[serde(default)]
    keywords_added: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

/// Enhances `resume` for `job_description`, via the LLM when it produces a faithful rewrite.
pub async fn enhance(
    llm: &GeminiClient,
    resume: &ParsedResume,
    job_description: &str,
) -> EnhancementResult {
    let prompt = match build_enhance_prompt(resume, job_description) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!("Could not serialize resume for enhancement: {e}");
            return heuristic_enhance(resume, job_description);
        }
    };

    match llm
        .call_json::<LlmEnhancement>(&prompt, ENHANCE_SYSTEM)
        .await
    {
        Ok(candidate) => match accept_llm_enhancement(resume, candidate) {
            Ok(result) => {
                info!("Resume enhanced by LLM");
                result
            }
            Err(reason) => {
                warn!("LLM enhancement rejected: {reason}");
                heuristic_enhance(resume, job_description)
            }
        },
        Err(e) => {
            warn!("LLM enhancement failed: {e}");
            heuristic_enhance(resume, job_description)
        }
    }
}

/// Checks an LLM rewrite against the original resume.
/// Rejects new employers and lost experience; silently drops unevidenced skills.
fn accept_llm_enhancement(
    original: &ParsedResume,
    candidate: LlmEnhancement,
) -> Result<EnhancementResult, String> {
    if !original.experience.is_empty() && candidate.experience.is_empty() {
        return Err("experience section was dropped".to_string());
    }

    let known_companies: HashSet<String> = original.companies().into_iter().collect();
    for entry in &candidate.experience {
        if let Some(company) = entry.company.as_deref() {
            let company = company.trim().to_lowercase();
            if !company.is_empty() && !known_companies.contains(&company) {
                return Err(format!("introduced unknown employer '{company}'"));
            }
        }
    }

    let summary = candidate.summary.trim().to_string();
    if summary.is_empty() {
        return Err("empty summary".to_string());
    }

    let original_text = SearchableText::new(&original.to_plain_text());
    let skills: Vec<String> = candidate
        .skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| {
            !s.is_empty()
                && (original.skills.iter().any(|o| skill_matches_keyword(o, s))
                    || original_text.contains_keyword(s))
        })
        .collect();

    Ok(EnhancementResult {
        summary,
        skills,
        experience: candidate.experience,
        keywords_added: candidate.keywords_added,
        suggestions: candidate
            .suggestions
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .collect(),
        method: ParseMethod::Llm,
    })
}

/// Deterministic enhancement: skill re-ordering by JD keyword rank plus gap suggestions.
pub fn heuristic_enhance(resume: &ParsedResume, job_description: &str) -> EnhancementResult {
    let keywords = extract_keywords(job_description, DEFAULT_KEYWORD_LIMIT);
    let text = SearchableText::new(&resume.to_plain_text());

    let (skills, matched_count) = reorder_skills(&resume.skills, &keywords);

    let mut keywords_added = Vec::new();
    let mut missing = Vec::new();
    for kw in &keywords {
        let in_skills = resume
            .skills
            .iter()
            .any(|s| skill_matches_keyword(s, &kw.keyword));
        if in_skills {
            continue;
        }
        if text.contains_keyword(&kw.keyword) {
            keywords_added.push(kw.keyword.clone());
        } else {
            missing.push(kw.keyword.clone());
        }
    }

    let mut suggestions: Vec<String> = missing
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|kw| format!("Consider adding evidence of {kw} if you have relevant experience"))
        .collect();
    for gap in impact_gaps(resume) {
        if suggestions.len() >= MAX_SUGGESTIONS {
            break;
        }
        suggestions.push(format!("Quantify \"{}\": {}", gap.highlight, gap.suggestion));
    }

    let top_matched: Vec<&str> = skills
        .iter()
        .take(matched_count.min(MAX_SUMMARY_SKILLS))
        .map(String::as_str)
        .collect();

    EnhancementResult {
        summary: build_summary(resume, &top_matched),
        skills,
        experience: resume.experience.clone(),
        keywords_added,
        suggestions,
        method: ParseMethod::Heuristic,
    }
}

/// Skills matching a JD keyword come first, in keyword rank order; the rest keep
/// their original order. Returns the reordered list and how many skills matched.
fn reorder_skills(skills: &[String], keywords: &[RankedKeyword]) -> (Vec<String>, usize) {
    let mut taken = vec![false; skills.len()];
    let mut ordered = Vec::with_capacity(skills.len());

    for kw in keywords {
        for (i, skill) in skills.iter().enumerate() {
            if !taken[i] && skill_matches_keyword(skill, &kw.keyword) {
                taken[i] = true;
                ordered.push(skill.clone());
            }
        }
    }
    let matched = ordered.len();

    ordered.extend(
        skills
            .iter()
            .zip(&taken)
            .filter(|&(_, &t)| !t)
            .map(|(s, _)| s.clone()),
    );
    (ordered, matched)
}

fn build_summary(resume: &ParsedResume, matched: &[&str]) -> String {
    let base = match resume.summary.as_deref().map(str::trim) {
        Some(summary) if !summary.is_empty() => summary.to_string(),
        _ => generated_summary(resume),
    };

    if matched.is_empty() {
        return base;
    }
    let mut out = base;
    if !out.ends_with('.') {
        out.push('.');
    }
    out.push_str(&format!(
        " Brings hands-on experience with {} relevant to this role.",
        join_natural(matched)
    ));
    out
}

fn generated_summary(resume: &ParsedResume) -> String {
    let top_skills: Vec<&str> = resume.skills.iter().take(3).map(String::as_str).collect();
    match (resume.latest_title(), top_skills.is_empty()) {
        (Some(title), false) => format!("{title} skilled in {}.", join_natural(&top_skills)),
        (Some(title), true) => format!("Experienced {title}."),
        (None, false) => format!("Professional skilled in {}.", join_natural(&top_skills)),
        (None, true) => "Motivated professional.".to_string(),
    }
}

/// "a", "a and b", "a, b and c".
fn join_natural(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    const JD: &str = "We need a Kubernetes engineer. Kubernetes and Rust daily. \
        Rust services on Postgres. Terraform knowledge.";

    fn sample_resume() -> ParsedResume {
        ParsedResume {
            full_name: Some("Jane Doe".into()),
            summary: Some("Backend engineer".into()),
            skills: vec!["Python".into(), "Rust".into(), "Kubernetes".into()],
            experience: vec![ExperienceEntry {
                title: Some("Engineer".into()),
                company: Some("Acme".into()),
                highlights: vec!["Ran Postgres clusters".into(), "Cut costs by 20%".into()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_skills_reordered_by_keyword_rank() {
        let result = heuristic_enhance(&sample_resume(), JD);
        assert_eq!(result.skills, vec!["Kubernetes", "Rust", "Python"]);
        assert_eq!(result.method, ParseMethod::Heuristic);
    }

    #[test]
    fn test_keywords_added_and_suggestions() {
        let result = heuristic_enhance(&sample_resume(), JD);
        assert!(result.keywords_added.contains(&"postgres".to_string()));
        assert!(result
            .suggestions
            .iter()
            .any(|s| s.starts_with("Consider adding evidence of terraform")));
        assert!(result.suggestions.len() <= MAX_SUGGESTIONS);
    }

    #[test]
    fn test_summary_names_top_matched_skills() {
        let result = heuristic_enhance(&sample_resume(), JD);
        assert_eq!(
            result.summary,
            "Backend engineer. Brings hands-on experience with Kubernetes and Rust relevant to this role."
        );
    }

    #[test]
    fn test_summary_generated_from_title_when_missing() {
        let mut resume = sample_resume();
        resume.summary = None;
        let result = heuristic_enhance(&resume, "Golang and Scala");
        assert_eq!(result.summary, "Engineer skilled in Python, Rust and Kubernetes.");
    }

    #[test]
    fn test_join_natural() {
        assert_eq!(join_natural(&[]), "");
        assert_eq!(join_natural(&["a"]), "a");
        assert_eq!(join_natural(&["a", "b"]), "a and b");
        assert_eq!(join_natural(&["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn test_llm_rewrite_with_new_employer_is_rejected() {
        let candidate = LlmEnhancement {
            summary: "Great engineer".into(),
            skills: vec!["Rust".into()],
            experience: vec![ExperienceEntry {
                title: Some("Engineer".into()),
                company: Some("Google".into()),
                ..Default::default()
            }],
            keywords_added: vec![],
            suggestions: vec![],
        };
        let err = accept_llm_enhancement(&sample_resume(), candidate).unwrap_err();
        assert!(err.contains("google"));
    }

    #[test]
    fn test_llm_rewrite_dropping_experience_is_rejected() {
        let candidate = LlmEnhancement {
            summary: "Great engineer".into(),
            skills: vec![],
            experience: vec![],
            keywords_added: vec![],
            suggestions: vec![],
        };
        assert!(accept_llm_enhancement(&sample_resume(), candidate).is_err());
    }

    #[test]
    fn test_llm_rewrite_drops_unevidenced_skills() {
        let candidate = LlmEnhancement {
            summary: "Rust engineer".into(),
            skills: vec!["Rust".into(), "Terraform".into(), "Postgres".into()],
            experience: sample_resume().experience,
            keywords_added: vec!["postgres".into()],
            suggestions: vec![],
        };
        let result = accept_llm_enhancement(&sample_resume(), candidate).unwrap();
        assert_eq!(result.skills, vec!["Rust", "Postgres"]);
        assert_eq!(result.method, ParseMethod::Llm);
    }

    #[tokio::test]
    async fn test_enhance_falls_back_when_llm_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("{}")
            .create_async()
            .await;

        let llm = GeminiClient::with_base_url("k".into(), server.url()).unwrap();
        let result = enhance(&llm, &sample_resume(), JD).await;
        assert_eq!(result.method, ParseMethod::Heuristic);
        assert_eq!(result.skills[0], "Kubernetes");
    }
}
