/// HTTP client for the ML personalization service
///
/// API Flow:
/// POST {api_url}/v1/personalized with `{subject_id, limit, exclude_owned}`
/// → `{candidates: [{item, score, reason?}]}` ordered best first.
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use super::MlScorer;
use crate::{
    error::{AppError, AppResult},
    models::ScoredCandidate,
};

#[derive(Debug, Serialize)]
struct PersonalizedRequest<'a> {
    subject_id: &'a str,
    limit: usize,
    exclude_owned: bool,
}

#[derive(Debug, Deserialize)]
struct PersonalizedResponse {
    #[serde(default)]
    candidates: Vec<ScoredCandidate>,
}

#[derive(Clone)]
pub struct HttpMlScorer {
    http_client: HttpClient,
    api_url: String,
    api_key: Option<String>,
}

impl HttpMlScorer {
    pub fn new(api_url: String, api_key: Option<String>, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl MlScorer for HttpMlScorer {
    #[instrument(skip(self))]
    async fn personalized_candidates(
        &self,
        subject_id: &str,
        limit: usize,
        exclude_owned: bool,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let url = format!("{}/v1/personalized", self.api_url);

        let mut request = self.http_client.post(&url).json(&PersonalizedRequest {
            subject_id,
            limit,
            exclude_owned,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::DependencyTimeout(format!("ML service: {}", e))
            } else {
                AppError::DependencyUnavailable(format!("ML service: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                subject_id = %subject_id,
                status = %status,
                body = %body,
                "ML service request failed"
            );
            return Err(AppError::DependencyUnavailable(format!(
                "ML service returned status {}: {}",
                status, body
            )));
        }

        let parsed: PersonalizedResponse = response.json().await?;
        let mut candidates = parsed.candidates;
        candidates.truncate(limit);

        tracing::debug!(
            subject_id = %subject_id,
            count = candidates.len(),
            "Received personalized candidates"
        );

        Ok(candidates)
    }
}
