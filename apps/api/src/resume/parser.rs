//! Resume structuring: LLM extraction, validation, heuristic fallback.

use tracing::{info, warn};

use crate::llm_client::GeminiClient;
use crate::resume::heuristics::heuristic_parse;
use crate::resume::models::{ParseMethod, ParseOutcome, ParsedResume};
use crate::resume::prompts::{build_parse_prompt, PARSE_SYSTEM};
use crate::resume::validation::validate_parsed;

/// Structures resume text. Never fails: when the LLM errors or returns nothing
/// usable, the heuristic parser's result is returned instead.
pub async fn parse_resume(llm: &GeminiClient, text: &str) -> ParseOutcome {
    let mut warnings = Vec::new();

    match llm
        .call_json::<ParsedResume>(&build_parse_prompt(text), PARSE_SYSTEM)
        .await
    {
        Ok(parsed) => {
            let report = validate_parsed(parsed);
            if report.usable {
                info!("Resume structured by LLM");
                return ParseOutcome {
                    resume: report.resume,
                    method: ParseMethod::Llm,
                    warnings: report.warnings,
                };
            }
            warn!("LLM resume output not usable, falling back to heuristic parser");
            warnings.push("AI extraction returned no usable data; used rule-based parsing".to_string());
        }
        Err(e) => {
            warn!("LLM resume structuring failed: {e}");
            warnings.push("AI extraction unavailable; used rule-based parsing".to_string());
        }
    }

    parse_heuristically(text, warnings)
}

fn parse_heuristically(text: &str, mut warnings: Vec<String>) -> ParseOutcome {
    let report = validate_parsed(heuristic_parse(text));
    warnings.extend(report.warnings);
    ParseOutcome {
        resume: report.resume,
        method: ParseMethod::Heuristic,
        warnings,
    }
}
