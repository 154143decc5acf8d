// LLM prompt constants for resume structuring, enhancement and match scoring.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{
    fill_template, truncate_for_prompt, MAX_PROMPT_INPUT_CHARS, NO_FABRICATION_INSTRUCTION,
};
use crate::resume::models::ParsedResume;

pub const PARSE_SYSTEM: &str = "\
You are a precise resume data extractor. \
Convert raw resume text into structured JSON. \
You MUST respond with valid JSON only, without markdown fences or explanations. \
Copy values exactly as written; never guess missing fields.";

/// Replace `{resume_text}` before sending.
pub const PARSE_PROMPT_TEMPLATE: &str = r#"Extract the resume below into a JSON object with this EXACT schema:
{
  "full_name": "string" | null,
  "email": "string" | null,
  "phone": "string" | null,
  "location": "string" | null,
  "summary": "string" | null,
  "skills": ["string"],
  "experience": [
    {
      "title": "string" | null,
      "company": "string" | null,
      "start_date": "string" | null,
      "end_date": "string" | null,
      "highlights": ["string"]
    }
  ],
  "education": [
    {
      "institution": "string" | null,
      "degree": "string" | null,
      "field": "string" | null,
      "graduation_year": "string" | null
    }
  ],
  "certifications": ["string"],
  "links": ["string"]
}

Rules:
- Use null for anything the resume does not state. Use [] for empty lists.
- Dates as written in the resume (e.g. "Jan 2020", "2019", "Present").
- One skill per array element; split comma-separated skill lists.
- Experience highlights are the bullet points under each role, verbatim.
- List experience newest first, as in the resume.

RESUME TEXT:
{resume_text}"#;

pub const ENHANCE_SYSTEM: &str = "\
You are an expert resume writer who tailors resumes to job descriptions. \
You MUST respond with valid JSON only, without markdown fences or explanations. \
You rephrase and reorder; you never add facts.";

/// Replace `{no_fabrication}`, `{resume_json}` and `{job_description}` before sending.
pub const ENHANCE_PROMPT_TEMPLATE: &str = r#"{no_fabrication}

Tailor the resume below to the job description.

Return a JSON object with this EXACT schema:
{
  "summary": "string",
  "skills": ["string"],
  "experience": [
    {
      "title": "string" | null,
      "company": "string" | null,
      "start_date": "string" | null,
      "end_date": "string" | null,
      "highlights": ["string"]
    }
  ],
  "keywords_added": ["string"],
  "suggestions": ["string"]
}

Rules:
- "summary": 2-3 sentences aimed at the role, using only facts from the resume.
- "skills": the resume's skills, most relevant to the job first. Do not add skills the resume does not evidence.
- "experience": every role from the resume, same titles, companies and dates. Rewrite highlights to surface relevant work. Do not add or remove roles.
- "keywords_added": job description terms you worked into the text that were not already in the skills list.
- "suggestions": up to 5 concrete things the candidate could add if true (missing evidence, missing metrics).

RESUME (JSON):
{resume_json}

JOB DESCRIPTION:
{job_description}"#;

pub const MATCH_SYSTEM: &str = "\
You are an impartial technical recruiter scoring how well a resume fits a job. \
You MUST respond with valid JSON only, without markdown fences or explanations. \
Score strictly from the evidence in the resume.";

/// Replace `{no_fabrication}`, `{resume_text}` and `{job_description}` before sending.
pub const MATCH_PROMPT_TEMPLATE: &str = r#"{no_fabrication}

Score the resume against the job description.

Return a JSON object with this EXACT schema:
{
  "overall_score": 0-100,
  "skills_score": 0-100,
  "experience_score": 0-100,
  "education_score": 0-100,
  "matched_skills": ["string"],
  "missing_skills": ["string"],
  "strengths": ["string"],
  "gaps": ["string"],
  "recommendations": ["string"],
  "summary": "string"
}

Rules:
- Scores are integers. 0 = no fit, 100 = perfect fit.
- "matched_skills": job requirements the resume clearly evidences.
- "missing_skills": job requirements the resume does not evidence.
- "strengths" / "gaps": short phrases, at most 5 each.
- "recommendations": at most 5 actionable suggestions for the candidate.
- "summary": one or two sentences.

RESUME:
{resume_text}

JOB DESCRIPTION:
{job_description}"#;

pub fn build_parse_prompt(resume_text: &str) -> String {
    fill_template(
        PARSE_PROMPT_TEMPLATE,
        &[("resume_text", truncate_for_prompt(resume_text, MAX_PROMPT_INPUT_CHARS))],
    )
}

pub fn build_enhance_prompt(
    resume: &ParsedResume,
    job_description: &str,
) -> Result<String, serde_json::Error> {
    let resume_json = resume_json_for_prompt(resume, MAX_PROMPT_INPUT_CHARS)?;
    Ok(fill_template(
        ENHANCE_PROMPT_TEMPLATE,
        &[
            ("no_fabrication", NO_FABRICATION_INSTRUCTION),
            ("resume_json", &resume_json),
            ("job_description", truncate_for_prompt(job_description, MAX_PROMPT_INPUT_CHARS)),
        ],
    ))
}

pub fn build_match_prompt(resume_text: &str, job_description: &str) -> String {
    fill_template(
        MATCH_PROMPT_TEMPLATE,
        &[
            ("no_fabrication", NO_FABRICATION_INSTRUCTION),
            ("resume_text", truncate_for_prompt(resume_text, MAX_PROMPT_INPUT_CHARS)),
            ("job_description", truncate_for_prompt(job_description, MAX_PROMPT_INPUT_CHARS)),
        ],
    )
}

/// Serializes `resume`, shedding highlights from the oldest roles until the JSON fits
/// `max_chars`, then shortening the summary. The output is always a complete document.
fn resume_json_for_prompt(resume: &ParsedResume, max_chars: usize) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(resume)?;
    if json.chars().count() <= max_chars {
        return Ok(json);
    }

    let mut trimmed = resume.clone();
    loop {
        let Some(entry) = trimmed
            .experience
            .iter_mut()
            .rev()
            .find(|e| !e.highlights.is_empty())
        else {
            break;
        };
        entry.highlights.pop();
        if serde_json::to_string(&trimmed)?.chars().count() <= max_chars {
            break;
        }
    }

    let json = serde_json::to_string(&trimmed)?;
    let over = json.chars().count().saturating_sub(max_chars);
    if over > 0 {
        if let Some(summary) = trimmed.summary.take() {
            let keep = summary.chars().count().saturating_sub(over);
            trimmed.summary = Some(truncate_for_prompt(&summary, keep).to_string());
        }
        return serde_json::to_string(&trimmed);
    }
    Ok(json)
}
