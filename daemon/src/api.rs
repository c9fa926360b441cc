use formcheck_core::{AnalysisRequest, AnalysisResult, InferenceError, PostureAnalyzer};
use reqwest::{Client, Response};

/// API client for a remote formcheck server.
///
/// Implements [`PostureAnalyzer`], so the capture session can run against
/// a server instead of holding a provider key locally.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// Create a new client targeting the provided base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, InferenceError> {
        let http = Client::builder().build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks `/health` on the server.
    pub async fn health(&self) -> Result<(), InferenceError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(url).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: Response) -> Result<Response, InferenceError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(InferenceError::UnexpectedStatus { status, body })
    }
}

impl PostureAnalyzer for ApiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferenceError> {
        let url = format!("{}/analyze/{}", self.base_url, request.mode().as_str());
        let response = self.http.post(url).json(request).send().await?;
        let response = Self::check_status(response).await?;

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
