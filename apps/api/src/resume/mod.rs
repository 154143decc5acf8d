// Resume pipeline: multi-stage text extraction, LLM structuring with heuristic fallback,
// enhancement against a job description, and match scoring.
// All LLM calls go through llm_client.

pub mod cache;
pub mod enhancement;
pub mod extraction;
pub mod handlers;
pub mod heuristics;
pub mod keywords;
pub mod matching;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod store;
pub mod validation;
