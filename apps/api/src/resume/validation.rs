//! Validation of structured resumes and of individual experience highlights.

use serde::{Deserialize, Serialize};

use crate::resume::models::{EducationEntry, ExperienceEntry, ParsedResume};
use crate::users::validation::{clean_optional, is_valid_email, normalize_skills};

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Outcome of validating a parsed resume.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub resume: ParsedResume,
    pub warnings: Vec<String>,
    /// A resume is usable if it has a name, an email, a skill or an experience entry.
    pub usable: bool,
}

/// Cleans a parsed resume in place of the raw model output:
/// drops malformed contact details, blank strings, duplicate skills and empty entries.
pub fn validate_parsed(resume: ParsedResume) -> ValidationReport {
    let mut warnings = Vec::new();

    let email = match clean_optional(resume.email) {
        Some(email) if is_valid_email(&email) => Some(email.to_lowercase()),
        Some(email) => {
            warnings.push(format!("Dropped malformed email '{email}'"));
            None
        }
        None => None,
    };

    let phone = match clean_optional(resume.phone) {
        Some(phone) if is_plausible_phone(&phone) => Some(phone),
        Some(phone) => {
            warnings.push(format!("Dropped implausible phone number '{phone}'"));
            None
        }
        None => None,
    };

    let experience: Vec<ExperienceEntry> = resume
        .experience
        .into_iter()
        .filter_map(clean_experience)
        .collect();

    let education: Vec<EducationEntry> = resume
        .education
        .into_iter()
        .filter_map(clean_education)
        .collect();

    let cleaned = ParsedResume {
        full_name: clean_optional(resume.full_name),
        email,
        phone,
        location: clean_optional(resume.location),
        summary: clean_optional(resume.summary),
        skills: normalize_skills(&resume.skills),
        experience,
        education,
        certifications: normalize_skills(&resume.certifications),
        links: normalize_skills(&resume.links),
    };

    let usable = cleaned.full_name.is_some()
        || cleaned.email.is_some()
        || !cleaned.skills.is_empty()
        || !cleaned.experience.is_empty();

    if !usable {
        warnings.push("No name, email, skills or experience could be identified".to_string());
    }

    ValidationReport {
        resume: cleaned,
        warnings,
        usable,
    }
}

/// 7–15 digits, per E.164 length limits.
pub fn is_plausible_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

fn clean_experience(entry: ExperienceEntry) -> Option<ExperienceEntry> {
    let title = clean_optional(entry.title);
    let company = clean_optional(entry.company);
    if title.is_none() && company.is_none() {
        return None;
    }
    Some(ExperienceEntry {
        title,
        company,
        start_date: clean_optional(entry.start_date),
        end_date: clean_optional(entry.end_date),
        highlights: entry
            .highlights
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect(),
    })
}

fn clean_education(entry: EducationEntry) -> Option<EducationEntry> {
    let institution = clean_optional(entry.institution);
    let degree = clean_optional(entry.degree);
    if institution.is_none() && degree.is_none() {
        return None;
    }
    Some(EducationEntry {
        institution,
        degree,
        field: clean_optional(entry.field),
        graduation_year: clean_optional(entry.graduation_year),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Highlight impact checks
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactGap {
    pub highlight: String,
    pub reason: String,
    pub suggestion: String,
}

const VAGUE_VERBS: &[&str] = &[
    "improved",
    "enhanced",
    "helped",
    "worked on",
    "assisted",
    "supported",
    "participated",
    "involved",
    "responsible for",
];

const VAGUE_SCALE_WORDS: &[&str] = &[
    "significant",
    "major",
    "large",
    "huge",
    "massive",
    "substantial",
    "considerable",
    "many",
    "numerous",
    "various",
    "several",
];

/// True when a highlight carries a concrete measure: a digit, `%`, or a currency sign.
pub fn has_quantified_impact(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        || text.contains('%')
        || text.contains('$')
        || text.contains('€')
        || text.contains('£')
}

/// Returns why a highlight reads as unquantified, or `None` if it passes.
pub fn check_impact(text: &str) -> Option<ImpactGap> {
    if has_quantified_impact(text) {
        return None;
    }

    let lower = text.to_lowercase();

    if let Some(vague) = VAGUE_VERBS.iter().find(|v| lower.contains(*v)) {
        return Some(ImpactGap {
            highlight: text.to_string(),
            reason: format!("Uses vague verb '{vague}' without a measurable outcome"),
            suggestion: format!(
                "Replace '{vague}' with a concrete action and add a number: by how much, how many, how fast?"
            ),
        });
    }

    if let Some(vague) = VAGUE_SCALE_WORDS.iter().find(|v| lower.contains(*v)) {
        return Some(ImpactGap {
            highlight: text.to_string(),
            reason: format!("Uses vague scale word '{vague}' without a number"),
            suggestion: format!("Replace '{vague}' with a specific figure, e.g. '40%', '3x', '12 teams'"),
        });
    }

    Some(ImpactGap {
        highlight: text.to_string(),
        reason: "No quantified outcome found".to_string(),
        suggestion: "Add a metric: a number, percentage, amount of money or time saved".to_string(),
    })
}

/// Collects impact gaps across every experience highlight.
pub fn impact_gaps(resume: &ParsedResume) -> Vec<ImpactGap> {
    resume
        .experience
        .iter()
        .flat_map(|e| e.highlights.iter())
        .filter_map(|h| check_impact(h))
        .collect()
}
