//! LlamaParse stage: upload the document, poll the parsing job, fetch the text result.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use tracing::debug;

use super::{Document, DocumentKind, ExtractionError, ExtractionStage};

const LLAMA_CLOUD_API_BASE: &str = "https://api.cloud.llamaindex.ai";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_WAIT: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct JobStatus {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct TextResult {
    #[serde(default)]
    text: String,
}

pub struct LlamaParseStage {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl LlamaParseStage {
    pub fn new(api_key: String) -> Result<Self, ExtractionError> {
        Self::with_base_url(api_key, LLAMA_CLOUD_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, ExtractionError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: POLL_INTERVAL,
            max_wait: MAX_WAIT,
        })
    }

    #[cfg(test)]
    fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    async fn upload(&self, doc: &Document) -> Result<String, ExtractionError> {
        let part = multipart::Part::bytes(doc.bytes.to_vec())
            .file_name(doc.file_name.clone())
            .mime_str(doc.kind.mime_type())?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/parsing/upload", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let job: JobStatus = check(response).await?.json().await?;
        Ok(job.id)
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<(), ExtractionError> {
        let started = Instant::now();
        loop {
            let response = self
                .client
                .get(format!("{}/api/parsing/job/{job_id}", self.base_url))
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let job: JobStatus = check(response).await?.json().await?;
            debug!(job_id, status = %job.status, "LlamaParse job status");

            match job.status.to_ascii_uppercase().as_str() {
                "SUCCESS" => return Ok(()),
                "ERROR" | "CANCELED" | "CANCELLED" => {
                    return Err(ExtractionError::Failed(format!(
                        "parsing job {job_id} ended with status {}",
                        job.status
                    )))
                }
                _ => {}
            }

            if started.elapsed() + self.poll_interval > self.max_wait {
                return Err(ExtractionError::Timeout(self.max_wait.as_secs()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_text(&self, job_id: &str) -> Result<String, ExtractionError> {
        let response = self
            .client
            .get(format!(
                "{}/api/parsing/job/{job_id}/result/text",
                self.base_url
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let result: TextResult = check(response).await?.json().await?;
        Ok(result.text)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ExtractionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ExtractionError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ExtractionStage for LlamaParseStage {
    fn name(&self) -> &'static str {
        "llamaparse"
    }

    fn supports(&self, kind: DocumentKind) -> bool {
        matches!(kind, DocumentKind::Pdf | DocumentKind::Docx)
    }

    async fn extract(&self, doc: &Document) -> Result<String, ExtractionError> {
        let job_id = self.upload(doc).await?;
        self.wait_for_job(&job_id).await?;
        self.fetch_text(&job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mockito::{Matcher, Server};

    fn pdf() -> Document {
        Document {
            bytes: Bytes::from_static(b"%PDF-1.4 scanned"),
            kind: DocumentKind::Pdf,
            file_name: "cv.pdf".into(),
        }
    }

    fn stage(url: String) -> LlamaParseStage {
        LlamaParseStage::with_base_url("llx-test".into(), url)
            .unwrap()
            .with_polling(Duration::from_millis(10), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_upload_poll_and_fetch() {
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/api/parsing/upload")
            .match_header("authorization", "Bearer llx-test")
            .match_body(Matcher::Regex("cv.pdf".into()))
            .with_status(200)
            .with_body(r#"{"id": "job-1", "status": "PENDING"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/parsing/job/job-1")
            .with_status(200)
            .with_body(r#"{"id": "job-1", "status": "SUCCESS"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/parsing/job/job-1/result/text")
            .with_status(200)
            .with_body(r#"{"text": "Jane Doe\nSenior Engineer"}"#)
            .create_async()
            .await;

        let text = stage(server.url()).extract(&pdf()).await.unwrap();
        assert_eq!(text, "Jane Doe\nSenior Engineer");
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_job_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/parsing/upload")
            .with_status(200)
            .with_body(r#"{"id": "job-2"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/parsing/job/job-2")
            .with_status(200)
            .with_body(r#"{"id": "job-2", "status": "ERROR"}"#)
            .create_async()
            .await;

        let err = stage(server.url()).extract(&pdf()).await.unwrap_err();
        assert!(err.to_string().contains("ERROR"));
    }

    #[tokio::test]
    async fn test_pending_job_times_out() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/parsing/upload")
            .with_status(200)
            .with_body(r#"{"id": "job-3"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/parsing/job/job-3")
            .with_status(200)
            .with_body(r#"{"id": "job-3", "status": "PENDING"}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let err = stage(server.url()).extract(&pdf()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_rejected_upload_reports_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/parsing/upload")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let err = stage(server.url()).extract(&pdf()).await.unwrap_err();
        match err {
            ExtractionError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_supports_documents_only() {
        let s = LlamaParseStage::new("k".into()).unwrap();
        assert!(s.supports(DocumentKind::Docx));
        assert!(!s.supports(DocumentKind::Jpeg));
        assert!(!s.supports(DocumentKind::Text));
    }
}
