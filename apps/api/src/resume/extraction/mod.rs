//! Resume text extraction: runs extraction stages in order until one yields usable text.
//!
//! Stage order: native parsing → LlamaParse → Google Vision OCR. The remote stages are
//! only present when their API keys are configured.

pub mod llamaparse;
pub mod native;
pub mod normalize;
pub mod vision;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;

use self::llamaparse::LlamaParseStage;
use self::native::NativeStage;
use self::normalize::normalize_text;
use self::vision::VisionStage;

/// Extracted text needs at least this many non-whitespace characters.
pub const MIN_USABLE_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
    Png,
    Jpeg,
}

impl DocumentKind {
    /// Magic bytes first, then file extension, then declared content type.
    pub fn detect(bytes: &[u8], file_name: Option<&str>, content_type: Option<&str>) -> Option<Self> {
        Self::from_magic(bytes)
            .or_else(|| file_name.and_then(Self::from_file_name))
            .or_else(|| content_type.and_then(Self::from_content_type))
    }

    fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else if bytes.starts_with(b"PK\x03\x04") {
            Some(Self::Docx)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::Text),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" | "text/markdown" => Some(Self::Text),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Text => "text/plain",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// An uploaded document ready for extraction.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Bytes,
    pub kind: DocumentKind,
    pub file_name: String,
}

impl Document {
    /// Checks size and type of an upload. Empty → `Validation`, too large → `PayloadTooLarge`,
    /// unrecognised → `UnsupportedMediaType`.
    pub fn from_upload(
        bytes: Bytes,
        file_name: Option<&str>,
        content_type: Option<&str>,
        max_bytes: usize,
    ) -> Result<Self, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if bytes.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File is {} bytes; the limit is {max_bytes} bytes",
                bytes.len()
            )));
        }
        let kind = DocumentKind::detect(&bytes, file_name, content_type).ok_or_else(|| {
            AppError::UnsupportedMediaType(
                "Supported formats are PDF, DOCX, plain text, PNG and JPEG".to_string(),
            )
        })?;
        Ok(Self {
            bytes,
            kind,
            file_name: file_name.unwrap_or("resume").to_string(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Failed(String),
}

/// One text source in the pipeline.
#[async_trait]
pub trait ExtractionStage: Send + Sync {
    /// Stable name recorded on the resume row.
    fn name(&self) -> &'static str;

    fn supports(&self, kind: DocumentKind) -> bool;

    async fn extract(&self, doc: &Document) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub stage: &'static str,
}

pub struct ExtractionPipeline {
    stages: Vec<Box<dyn ExtractionStage>>,
}

impl ExtractionPipeline {
    pub fn new(stages: Vec<Box<dyn ExtractionStage>>) -> Self {
        Self { stages }
    }

    /// Native always; LlamaParse and Vision when their keys are set.
    pub fn from_config(config: &Config) -> Result<Self, ExtractionError> {
        let mut stages: Vec<Box<dyn ExtractionStage>> = vec![Box::new(NativeStage)];
        if let Some(key) = &config.llama_cloud_api_key {
            stages.push(Box::new(LlamaParseStage::new(key.clone())?));
        }
        if let Some(key) = &config.vision_api_key {
            stages.push(Box::new(VisionStage::new(key.clone())?));
        }
        info!(
            "Extraction pipeline: {}",
            stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(" → ")
        );
        Ok(Self::new(stages))
    }

    pub async fn run(&self, doc: &Document) -> Result<ExtractedText, AppError> {
        let mut failures = Vec::new();

        for stage in self.stages.iter().filter(|s| s.supports(doc.kind)) {
            match stage.extract(doc).await {
                Ok(raw) => {
                    let text = normalize_text(&raw);
                    let chars = usable_chars(&text);
                    if chars >= MIN_USABLE_CHARS {
                        info!(stage = stage.name(), chars, "Extracted resume text");
                        return Ok(ExtractedText {
                            text,
                            stage: stage.name(),
                        });
                    }
                    warn!(stage = stage.name(), chars, "Extraction yielded too little text");
                    failures.push(format!("{}: only {chars} characters of text", stage.name()));
                }
                Err(e) => {
                    warn!(stage = stage.name(), "Extraction stage failed: {e}");
                    failures.push(format!("{}: {e}", stage.name()));
                }
            }
        }

        if failures.is_empty() {
            failures.push(format!(
                "no extraction stage configured for {:?} documents",
                doc.kind
            ));
        }
        Err(AppError::UnprocessableEntity(format!(
            "Could not extract text from the document ({})",
            failures.join("; ")
        )))
    }
}

fn usable_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStage {
        name: &'static str,
        result: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl ExtractionStage for FixedStage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn supports(&self, _kind: DocumentKind) -> bool {
            true
        }

        async fn extract(&self, _doc: &Document) -> Result<String, ExtractionError> {
            self.result
                .map(str::to_string)
                .map_err(|e| ExtractionError::Failed(e.to_string()))
        }
    }

    fn doc() -> Document {
        Document {
            bytes: Bytes::from_static(b"%PDF-1.4"),
            kind: DocumentKind::Pdf,
            file_name: "cv.pdf".into(),
        }
    }

    const LONG_TEXT: &str = "Jane Doe, Senior Engineer with ten years building payment systems in Rust.";

    #[test]
    fn test_detect_by_magic_bytes_wins() {
        assert_eq!(
            DocumentKind::detect(b"%PDF-1.7 ...", Some("cv.txt"), Some("text/plain")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::detect(b"\x89PNG\r\n\x1a\n....", None, None),
            Some(DocumentKind::Png)
        );
        assert_eq!(
            DocumentKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0], None, None),
            Some(DocumentKind::Jpeg)
        );
        assert_eq!(
            DocumentKind::detect(b"PK\x03\x04rest", None, None),
            Some(DocumentKind::Docx)
        );
    }

    #[test]
    fn test_detect_falls_back_to_name_then_content_type() {
        assert_eq!(
            DocumentKind::detect(b"Jane Doe", Some("CV.TXT"), None),
            Some(DocumentKind::Text)
        );
        assert_eq!(
            DocumentKind::detect(b"Jane Doe", None, Some("text/plain; charset=utf-8")),
            Some(DocumentKind::Text)
        );
        assert_eq!(DocumentKind::detect(b"GIF89a", Some("cv.gif"), Some("image/gif")), None);
    }

    #[test]
    fn test_upload_checks() {
        let empty = Document::from_upload(Bytes::new(), Some("a.pdf"), None, 100);
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let big = Document::from_upload(Bytes::from(vec![b'a'; 101]), Some("a.txt"), None, 100);
        assert!(matches!(big, Err(AppError::PayloadTooLarge(_))));

        let odd = Document::from_upload(Bytes::from_static(b"GIF89a"), Some("a.gif"), None, 100);
        assert!(matches!(odd, Err(AppError::UnsupportedMediaType(_))));

        let ok = Document::from_upload(Bytes::from_static(b"hello"), Some("a.txt"), None, 100).unwrap();
        assert_eq!(ok.kind, DocumentKind::Text);
        assert_eq!(ok.file_name, "a.txt");
    }

    #[tokio::test]
    async fn test_pipeline_stops_at_first_usable_stage() {
        let pipeline = ExtractionPipeline::new(vec![
            Box::new(FixedStage { name: "first", result: Ok("too short") }),
            Box::new(FixedStage { name: "second", result: Ok(LONG_TEXT) }),
            Box::new(FixedStage { name: "third", result: Err("never reached") }),
        ]);
        let extracted = pipeline.run(&doc()).await.unwrap();
        assert_eq!(extracted.stage, "second");
        assert_eq!(extracted.text, LONG_TEXT);
    }

    #[tokio::test]
    async fn test_pipeline_reports_every_failure() {
        let pipeline = ExtractionPipeline::new(vec![
            Box::new(FixedStage { name: "native", result: Err("corrupt file") }),
            Box::new(FixedStage { name: "vision", result: Ok("   ") }),
        ]);
        let err = pipeline.run(&doc()).await.unwrap_err();
        match err {
            AppError::UnprocessableEntity(msg) => {
                assert!(msg.contains("native: corrupt file"));
                assert!(msg.contains("vision: only 0 characters"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pipeline_without_supporting_stage() {
        let pipeline = ExtractionPipeline::new(vec![Box::new(NativeStage)]);
        let image = Document {
            bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
            kind: DocumentKind::Png,
            file_name: "cv.png".into(),
        };
        let err = pipeline.run(&image).await.unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }
}
