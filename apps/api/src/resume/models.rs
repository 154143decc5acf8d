use serde::{Deserialize, Deserializer, Serialize};

/// Structured resume, as produced by the LLM or the heuristic parser.
/// Every field defaults so partial LLM output still deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedResume {
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub phone: Option<String>,
    pub location: Option<String>,
    pub summary: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub certifications: Vec<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceEntry {
    pub title: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub graduation_year: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMethod {
    Llm,
    Heuristic,
    /// User corrections submitted through the API.
    Manual,
}

impl ParseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMethod::Llm => "llm",
            ParseMethod::Heuristic => "heuristic",
            ParseMethod::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub resume: ParsedResume,
    pub method: ParseMethod,
    pub warnings: Vec<String>,
}

/// Models emit phone numbers and years as either strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(f)) => Some(format!("{f}")),
        None => None,
    })
}

impl ParsedResume {
    /// Latest role title, used to seed generated summaries.
    pub fn latest_title(&self) -> Option<&str> {
        self.experience.iter().find_map(|e| e.title.as_deref())
    }

    /// Companies named anywhere in the experience section, lowercased.
    pub fn companies(&self) -> Vec<String> {
        self.experience
            .iter()
            .filter_map(|e| e.company.as_deref())
            .map(|c| c.trim().to_lowercase())
            .collect()
    }

    /// Flattens the resume into plain text for matching when the original text is unavailable.
    pub fn to_plain_text(&self) -> String {
        let mut out = Vec::new();
        for field in [&self.full_name, &self.location, &self.summary].into_iter().flatten() {
            out.push(field.clone());
        }
        if !self.skills.is_empty() {
            out.push(format!("Skills: {}", self.skills.join(", ")));
        }
        for exp in &self.experience {
            let header: Vec<&str> = [exp.title.as_deref(), exp.company.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            out.push(header.join(" at "));
            for h in &exp.highlights {
                out.push(format!("- {h}"));
            }
        }
        for edu in &self.education {
            let line: Vec<&str> = [
                edu.degree.as_deref(),
                edu.field.as_deref(),
                edu.institution.as_deref(),
                edu.graduation_year.as_deref(),
            ]
            .into_iter()
            .flatten()
            .collect();
            out.push(line.join(", "));
        }
        out.extend(self.certifications.iter().cloned());
        out.join("\n")
    }
}
