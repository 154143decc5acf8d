//! Rule-based resume parser, used when the LLM is unavailable or returns nothing usable.

use std::sync::OnceLock;

use regex::Regex;

use crate::resume::models::{EducationEntry, ExperienceEntry, ParsedResume};
use crate::resume::validation::is_plausible_phone;
use crate::users::validation::normalize_skills;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\(?\d[\d \t().-]{5,}\d").expect("phone regex"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:https?://\S+|(?:www\.)?(?:linkedin\.com|github\.com|gitlab\.com)/\S+)")
            .expect("link regex")
    })
}

const DATE_TOKEN: &str = r"(?:(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{4}|\d{1,2}/\d{4}|\d{4})";

fn date_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)\(?\s*(?P<start>{DATE_TOKEN})\s*(?:-|–|—|to)\s*(?P<end>{DATE_TOKEN}|present|current|now)\s*\)?"
        );
        Regex::new(&pattern).expect("date range regex")
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Summary,
    Experience,
    Education,
    Skills,
    Certifications,
    Other,
}

/// Recognises a section heading such as "WORK EXPERIENCE" or "Skills:".
fn section_for_heading(line: &str) -> Option<Section> {
    let cleaned = line
        .trim()
        .trim_start_matches('#')
        .trim_end_matches(':')
        .trim()
        .to_lowercase();
    if cleaned.is_empty() || cleaned.len() > 40 {
        return None;
    }
    let section = match cleaned.as_str() {
        "summary" | "profile" | "professional summary" | "about" | "about me" | "objective"
        | "career objective" | "profile summary" => Section::Summary,
        "experience" | "work experience" | "professional experience" | "work history"
        | "employment" | "employment history" | "career history" => Section::Experience,
        "education" | "academic background" | "education and training" | "qualifications" => {
            Section::Education
        }
        "skills" | "technical skills" | "core skills" | "key skills" | "core competencies"
        | "competencies" | "technologies" | "tech stack" => Section::Skills,
        "certifications" | "certificates" | "licenses" | "licenses and certifications"
        | "certifications and licenses" => Section::Certifications,
        "projects" | "interests" | "hobbies" | "languages" | "awards" | "publications"
        | "references" | "volunteering" | "volunteer experience" => Section::Other,
        _ => return None,
    };
    Some(section)
}

/// Strips a leading bullet marker; returns `None` if the line is not a bullet.
fn strip_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for marker in ["- ", "* ", "• ", "–", "•", "▪", "●", "◦", "‣"] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    None
}

fn is_contact_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    line.contains('@')
        || lower.contains("http")
        || lower.contains("www.")
        || lower.contains("linkedin")
        || lower.contains("github")
        || line.chars().filter(|c| c.is_ascii_digit()).count() >= 7
}

/// A name line has 2–4 words, each starting with a letter.
fn looks_like_name(line: &str) -> bool {
    if is_contact_line(line) || section_for_heading(line).is_some() {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    (2..=4).contains(&words.len())
        && words
            .iter()
            .all(|w| w.chars().next().is_some_and(char::is_alphabetic))
        && !line.contains(|c: char| matches!(c, ',' | '|' | ':'))
}

/// Parses plain resume text into a `ParsedResume` using layout conventions only.
pub fn heuristic_parse(text: &str) -> ParsedResume {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut resume = ParsedResume {
        email: email_re().find(text).map(|m| m.as_str().to_lowercase()),
        phone: phone_re()
            .find_iter(text)
            .map(|m| m.as_str().trim().to_string())
            .find(|p| is_plausible_phone(p) && !date_range_re().is_match(p)),
        links: normalize_skills(
            link_re()
                .find_iter(text)
                .map(|m| m.as_str().trim_end_matches(|c: char| matches!(c, ',' | ';' | ')' | '.'))),
        ),
        ..Default::default()
    };

    let mut section = Section::Header;
    let mut summary_lines: Vec<&str> = Vec::new();
    let mut skill_lines: Vec<&str> = Vec::new();
    let mut experience_lines: Vec<&str> = Vec::new();
    let mut education_lines: Vec<&str> = Vec::new();
    let mut certification_lines: Vec<&str> = Vec::new();

    for &line in &lines {
        if let Some(next) = section_for_heading(line) {
            section = next;
            continue;
        }
        match section {
            Section::Header => {
                if resume.full_name.is_none() && looks_like_name(line) {
                    resume.full_name = Some(line.to_string());
                } else if resume.location.is_none() && looks_like_location(line) {
                    resume.location = Some(line.to_string());
                }
            }
            Section::Summary => summary_lines.push(line),
            Section::Experience => experience_lines.push(line),
            Section::Education => education_lines.push(line),
            Section::Skills => skill_lines.push(line),
            Section::Certifications => certification_lines.push(line),
            Section::Other => {}
        }
    }

    if !summary_lines.is_empty() {
        resume.summary = Some(summary_lines.join(" "));
    }
    resume.skills = parse_skills(&skill_lines);
    resume.experience = parse_experience(&experience_lines);
    resume.education = parse_education(&education_lines);
    resume.certifications = normalize_skills(
        certification_lines
            .iter()
            .map(|&l| strip_bullet(l).unwrap_or(l)),
    );

    resume
}

/// "City, ST" or "City, Country" without contact details.
fn looks_like_location(line: &str) -> bool {
    if is_contact_line(line) {
        return false;
    }
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    parts.len() == 2
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.split_whitespace().count() <= 3
                && p.chars().all(|c| c.is_alphabetic() || c == ' ' || c == '.')
        })
}

fn parse_skills(lines: &[&str]) -> Vec<String> {
    let mut skills = Vec::new();
    for &line in lines {
        let line = strip_bullet(line).unwrap_or(line);
        // "Languages: Rust, Go" style category labels
        let line = match line.split_once(':') {
            Some((label, rest)) if label.len() <= 30 => rest,
            _ => line,
        };
        skills.extend(
            line.split(|c: char| matches!(c, ',' | ';' | '|' | '•'))
                .map(str::trim)
                .filter(|s| !s.is_empty() && s.len() <= 50),
        );
    }
    normalize_skills(skills)
}

/// Splits "Title at Company", "Title | Company", "Title - Company" or "Title, Company".
fn split_title_company(line: &str) -> (Option<String>, Option<String>) {
    for sep in [" at ", " @ ", " | ", " — ", " – ", " - ", ", "] {
        if let Some((title, company)) = line.split_once(sep) {
            let title = title.trim();
            let company = company.trim();
            if !title.is_empty() && !company.is_empty() {
                return (Some(title.to_string()), Some(company.to_string()));
            }
        }
    }
    (Some(line.trim().to_string()), None)
}

fn take_date_range(line: &str) -> (String, Option<(String, String)>) {
    match date_range_re().captures(line) {
        Some(caps) => {
            let start = caps["start"].trim().to_string();
            let end = caps["end"].trim().to_string();
            let rest = date_range_re()
                .replace(line, "")
                .trim()
                .trim_end_matches(|c: char| matches!(c, ',' | '|' | '-' | '–' | '—'))
                .trim()
                .to_string();
            (rest, Some((start, end)))
        }
        None => (line.to_string(), None),
    }
}

fn parse_experience(lines: &[&str]) -> Vec<ExperienceEntry> {
    let mut entries: Vec<ExperienceEntry> = Vec::new();

    for &line in lines {
        if let Some(bullet) = strip_bullet(line) {
            if bullet.is_empty() {
                continue;
            }
            match entries.last_mut() {
                Some(current) => current.highlights.push(bullet.to_string()),
                None => entries.push(ExperienceEntry {
                    highlights: vec![bullet.to_string()],
                    ..Default::default()
                }),
            }
            continue;
        }

        let (rest, dates) = take_date_range(line);

        if rest.is_empty() {
            if let (Some(current), Some((start, end))) = (entries.last_mut(), dates) {
                current.start_date = Some(start);
                current.end_date = Some(end);
            }
            continue;
        }

        let (title, company) = split_title_company(&rest);

        // A bare line right after a title-only header is the company name.
        if let Some(current) = entries.last_mut() {
            if company.is_none()
                && current.company.is_none()
                && current.title.is_some()
                && current.highlights.is_empty()
            {
                current.company = title;
                if let Some((start, end)) = dates {
                    current.start_date = Some(start);
                    current.end_date = Some(end);
                }
                continue;
            }
        }

        let (start_date, end_date) = match dates {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };
        entries.push(ExperienceEntry {
            title,
            company,
            start_date,
            end_date,
            highlights: Vec::new(),
        });
    }

    entries
}

const DEGREE_MARKERS: &[&str] = &[
    "bachelor", "master", "phd", "ph.d", "doctor", "mba", "associate", "diploma", "b.s", "b.sc",
    "bsc", "b.a", "m.s", "m.sc", "msc", "m.a", "b.tech", "m.tech", "b.eng", "m.eng", "bs ", "ms ",
    "ba ", "ma ",
];

const INSTITUTION_MARKERS: &[&str] = &[
    "university", "college", "institute", "school", "academy", "polytechnic",
];

fn is_degree(part: &str) -> bool {
    let lower = format!("{} ", part.to_lowercase());
    DEGREE_MARKERS.iter().any(|m| lower.starts_with(m) || lower.contains(&format!(" {m}")))
}

fn is_institution(part: &str) -> bool {
    let lower = part.to_lowercase();
    INSTITUTION_MARKERS.iter().any(|m| lower.contains(m))
}

fn parse_education(lines: &[&str]) -> Vec<EducationEntry> {
    let mut entries: Vec<EducationEntry> = Vec::new();

    for &line in lines {
        let line = strip_bullet(line).unwrap_or(line);
        let year = year_re().find_iter(line).last().map(|m| m.as_str().to_string());
        let without_years = year_re().replace_all(line, "");

        let mut parsed = EducationEntry::default();
        for part in without_years
            .split(|c: char| matches!(c, ',' | '|' | '–' | '—'))
            .flat_map(|p| p.split(" - "))
            .map(|p| p.trim().trim_matches(|c: char| matches!(c, '(' | ')')).trim())
            .filter(|p| !p.is_empty())
        {
            if parsed.institution.is_none() && is_institution(part) {
                parsed.institution = Some(part.to_string());
            } else if parsed.degree.is_none() && is_degree(part) {
                match part.split_once(" in ") {
                    Some((degree, field)) => {
                        parsed.degree = Some(degree.trim().to_string());
                        parsed.field = Some(field.trim().to_string());
                    }
                    None => parsed.degree = Some(part.to_string()),
                }
            }
        }
        parsed.graduation_year = year;

        let current = entries.last_mut();
        match current {
            // Year-only line, or a degree line under an institution line.
            Some(current)
                if parsed.institution.is_none()
                    && (parsed.degree.is_none() || current.degree.is_none()) =>
            {
                if current.degree.is_none() && parsed.degree.is_some() {
                    current.degree = parsed.degree;
                    current.field = parsed.field;
                }
                if current.graduation_year.is_none() {
                    current.graduation_year = parsed.graduation_year;
                }
            }
            _ if parsed.institution.is_some() || parsed.degree.is_some() => entries.push(parsed),
            _ => {}
        }
    }

    entries
}
