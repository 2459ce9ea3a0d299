//! Remote generative-model access: the `VideoModel` capability and its Gemini
//! File API implementation.

use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Lifecycle state of a file held by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    Other(String),
}

impl FileState {
    pub fn as_str(&self) -> &str {
        match self {
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
            FileState::Other(state) => state,
        }
    }
}

impl From<String> for FileState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Other(state),
        }
    }
}

impl Default for FileState {
    fn default() -> Self {
        FileState::Other("STATE_UNSPECIFIED".to_string())
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an uploaded file as the remote service knows it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: FileState,
}

/// Upload / poll / generate / delete, the four calls a request needs from the model provider.
#[async_trait]
pub trait VideoModel: Send + Sync {
    async fn upload_file(
        &self,
        path: &Path,
        display_name: &str,
        mime_type: &str,
    ) -> Result<RemoteFile>;

    async fn get_file(&self, name: &str) -> Result<RemoteFile>;

    /// Generates text from `[file, prompt]`, in that order.
    async fn generate_content(&self, file: &RemoteFile, prompt: &str) -> Result<String>;

    async fn delete_file(&self, name: &str) -> Result<()>;
}

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(anyhow!("prompt blocked by model: {}", reason));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no candidates in model response"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(anyhow!(
                "model returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ));
        }
        Ok(text)
    }
}

/// Gemini REST client covering the File API and `generateContent`.
pub struct GeminiClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);
        Ok(headers)
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }
}

async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(anyhow!("Gemini {} error ({}): {}", what, status, error_text))
}

#[async_trait]
impl VideoModel for GeminiClient {
    async fn upload_file(
        &self,
        path: &Path,
        display_name: &str,
        mime_type: &str,
    ) -> Result<RemoteFile> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let size = file
            .metadata()
            .await
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len();

        debug!(display_name, mime_type, size, "Gemini upload start");

        // Resumable protocol: a start request hands back the session URL, then a
        // single "upload, finalize" request streams the whole file.
        let start_url = format!("{}/upload/v1beta/files", self.base_url);
        let response = self
            .http
            .post(&start_url)
            .headers(self.headers()?)
            .header("x-goog-upload-protocol", "resumable")
            .header("x-goog-upload-command", "start")
            .header("x-goog-upload-header-content-length", size)
            .header("x-goog-upload-header-content-type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let response = ensure_success(response, "upload start").await?;

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .ok_or_else(|| anyhow!("Gemini upload start response missing x-goog-upload-url"))?
            .to_str()
            .context("parsing upload URL header")?
            .to_string();

        let response = self
            .http
            .post(&upload_url)
            .header("x-goog-upload-command", "upload, finalize")
            .header("x-goog-upload-offset", 0)
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::from(file))
            .send()
            .await?;
        let response = ensure_success(response, "upload finalize").await?;

        let uploaded: UploadResponse = response
            .json()
            .await
            .context("decoding upload response")?;
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let response = self
            .http
            .get(self.file_url(name))
            .headers(self.headers()?)
            .send()
            .await?;
        let response = ensure_success(response, "files.get").await?;
        Ok(response.json().await.context("decoding files.get response")?)
    }

    async fn generate_content(&self, file: &RemoteFile, prompt: &str) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        debug!(model = %self.model, file = %file.name, "Gemini generateContent request");

        let request = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } },
                    { "text": prompt },
                ],
            }],
        });

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, "generateContent").await?;

        let payload: GenerateContentResponse = response
            .json()
            .await
            .context("decoding generateContent response")?;
        payload.text()
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.file_url(name))
            .headers(self.headers()?)
            .send()
            .await?;
        ensure_success(response, "files.delete").await?;
        Ok(())
    }
}
