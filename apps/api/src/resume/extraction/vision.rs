//! Google Cloud Vision OCR stage for scanned PDFs and images.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Document, DocumentKind, ExtractionError, ExtractionStage};

const VISION_API_BASE: &str = "https://vision.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// `files:annotate` accepts at most five pages per inline request.
const PDF_PAGES: [u32; 5] = [1, 2, 3, 4, 5];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
    /// Per-page responses, only present for `files:annotate`.
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

pub struct VisionStage {
    client: Client,
    api_key: String,
    base_url: String,
}

impl VisionStage {
    pub fn new(api_key: String) -> Result<Self, ExtractionError> {
        Self::with_base_url(api_key, VISION_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, ExtractionError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(doc: &Document) -> (&'static str, Value) {
        let content = STANDARD.encode(&doc.bytes);
        let features = json!([{"type": "DOCUMENT_TEXT_DETECTION"}]);
        match doc.kind {
            DocumentKind::Pdf => (
                "files:annotate",
                json!({"requests": [{
                    "inputConfig": {"content": content, "mimeType": "application/pdf"},
                    "features": features,
                    "pages": PDF_PAGES,
                }]}),
            ),
            _ => (
                "images:annotate",
                json!({"requests": [{
                    "image": {"content": content},
                    "features": features,
                }]}),
            ),
        }
    }
}

/// Joins page texts, surfacing the first per-request error if no page had text.
fn collect_text(batch: BatchResponse) -> Result<String, ExtractionError> {
    let mut pages = Vec::new();
    let mut first_error = None;

    let mut visit = |r: &AnnotateResponse| {
        if let Some(a) = &r.full_text_annotation {
            if !a.text.trim().is_empty() {
                pages.push(a.text.clone());
            }
        }
        if let Some(e) = &r.error {
            first_error.get_or_insert_with(|| e.message.clone());
        }
    };

    for response in &batch.responses {
        visit(response);
        for page in &response.responses {
            visit(page);
        }
    }

    if pages.is_empty() {
        if let Some(message) = first_error {
            return Err(ExtractionError::Failed(format!("Vision error: {message}")));
        }
    }
    Ok(pages.join("\n"))
}

#[async_trait]
impl ExtractionStage for VisionStage {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn supports(&self, kind: DocumentKind) -> bool {
        matches!(kind, DocumentKind::Pdf | DocumentKind::Png | DocumentKind::Jpeg)
    }

    async fn extract(&self, doc: &Document) -> Result<String, ExtractionError> {
        let (method, body) = Self::request_body(doc);
        let response = self
            .client
            .post(format!("{}/v1/{method}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        collect_text(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mockito::{Matcher, Server};

    fn doc(kind: DocumentKind, bytes: &'static [u8]) -> Document {
        Document {
            bytes: Bytes::from_static(bytes),
            kind,
            file_name: "cv".into(),
        }
    }

    #[tokio::test]
    async fn test_image_uses_images_annotate() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/images:annotate")
            .match_query(Matcher::UrlEncoded("key".into(), "vision-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "requests": [{"features": [{"type": "DOCUMENT_TEXT_DETECTION"}]}]
            })))
            .with_status(200)
            .with_body(r#"{"responses": [{"fullTextAnnotation": {"text": "Jane Doe\nEngineer"}}]}"#)
            .create_async()
            .await;

        let stage = VisionStage::with_base_url("vision-key".into(), server.url()).unwrap();
        let text = stage
            .extract(&doc(DocumentKind::Png, b"\x89PNG\r\n\x1a\n"))
            .await
            .unwrap();
        assert_eq!(text, "Jane Doe\nEngineer");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pdf_uses_files_annotate_and_joins_pages() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/files:annotate")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "requests": [{"inputConfig": {"mimeType": "application/pdf"}}]
            })))
            .with_status(200)
            .with_body(
                r#"{"responses": [{"responses": [
                    {"fullTextAnnotation": {"text": "Page one"}},
                    {"fullTextAnnotation": {"text": "Page two"}}
                ]}]}"#,
            )
            .create_async()
            .await;

        let stage = VisionStage::with_base_url("k".into(), server.url()).unwrap();
        let text = stage
            .extract(&doc(DocumentKind::Pdf, b"%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(text, "Page one\nPage two");
    }

    #[test]
    fn test_per_request_error_surfaces_when_no_text() {
        let batch: BatchResponse =
            serde_json::from_str(r#"{"responses": [{"error": {"message": "Bad image data."}}]}"#)
                .unwrap();
        let err = collect_text(batch).unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }

    #[test]
    fn test_request_body_encodes_content() {
        let (method, body) = VisionStage::request_body(&doc(DocumentKind::Jpeg, b"abc"));
        assert_eq!(method, "images:annotate");
        assert_eq!(body["requests"][0]["image"]["content"], "YWJj");
    }
}
