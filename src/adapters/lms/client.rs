//! HTTP client for the LMS courseware, progress and xblock handler APIs.
//!
//! One request per call; nothing here retries. The reconciliation poll is
//! the only retry loop around progress fetches.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CourseRef, LmsConfig, ProgressSnapshot, SequenceRef, UnitRef};
use crate::domain::ports::{
    CourseOutline, CoursewareApi, PositionClient, ProgressClient, SequenceMetadata,
};

use super::error::LmsError;
use super::models::{
    CompletionRequest, CompletionResponse, CourseResponse, PositionRequest, ProgressResponse,
    SequenceResponse,
};

/// LMS HTTP client.
#[derive(Debug, Clone)]
pub struct LmsClient {
    http: Client,
    base_url: String,
    access_token: Option<String>,
}

impl LmsClient {
    /// Build a client from configuration. Blank tokens are ignored.
    pub fn new(config: &LmsConfig) -> Result<Self, LmsError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.normalized_base_url().to_string(),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .header("Accept", "application/json");
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, LmsError> {
        let resp = builder.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LmsError::Status { status, body });
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, LmsError> {
        let resp = Self::send(builder).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| LmsError::Decode(e.to_string()))
    }

    fn handler_path(course: &CourseRef, sequence: &SequenceRef, handler: &str) -> String {
        format!("/courses/{course}/xblock/{sequence}/handler/{handler}")
    }

    /// Course outline.
    #[instrument(skip(self), fields(course_id = %course))]
    pub async fn get_course(&self, course: &CourseRef) -> Result<CourseResponse, LmsError> {
        Self::json(self.request(Method::GET, &format!("/api/courseware/course/{course}"))).await
    }

    /// Sequence metadata with its units.
    #[instrument(skip(self), fields(sequence_id = %sequence))]
    pub async fn get_sequence(&self, sequence: &SequenceRef) -> Result<SequenceResponse, LmsError> {
        Self::json(self.request(Method::GET, &format!("/api/courseware/sequence/{sequence}"))).await
    }

    /// Learner progress for a course.
    #[instrument(skip(self), fields(course_id = %course))]
    pub async fn get_progress(&self, course: &CourseRef) -> Result<ProgressResponse, LmsError> {
        Self::json(self.request(Method::GET, &format!("/api/course_home/progress/{course}"))).await
    }

    /// Ask the sequence block whether `unit` is complete.
    pub async fn get_completion(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit: &UnitRef,
    ) -> Result<CompletionResponse, LmsError> {
        let body = CompletionRequest {
            usage_key: unit.to_string(),
        };
        let path = Self::handler_path(course, sequence, "get_completion");
        Self::json(self.request(Method::POST, &path).json(&body)).await
    }

    /// `unit_index` is 0-based; the handler takes 1-based positions.
    pub async fn goto_position(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit_index: usize,
    ) -> Result<(), LmsError> {
        let body = PositionRequest {
            position: unit_index + 1,
        };
        let path = Self::handler_path(course, sequence, "goto_position");
        Self::send(self.request(Method::POST, &path).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressClient for LmsClient {
    async fn fetch_progress(&self, course: &CourseRef) -> DomainResult<ProgressSnapshot> {
        let snapshot = self.get_progress(course).await?.snapshot();
        debug!(
            course_id = %course,
            is_passing = snapshot.is_passing,
            certificate_available = snapshot.certificate_available,
            "fetched progress"
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl CoursewareApi for LmsClient {
    async fn fetch_course(&self, course: &CourseRef) -> DomainResult<CourseOutline> {
        match self.get_course(course).await {
            Ok(response) => Ok(response.into_outline()),
            Err(err) if err.is_not_found() => Err(DomainError::CourseNotFound(course.clone())),
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch_sequence(&self, sequence: &SequenceRef) -> DomainResult<SequenceMetadata> {
        match self.get_sequence(sequence).await {
            Ok(response) => Ok(response.into_metadata()),
            Err(err) if err.is_not_found() => Err(DomainError::SequenceNotFound(sequence.clone())),
            Err(err) => Err(err.into()),
        }
    }

    async fn check_completion(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit: &UnitRef,
    ) -> DomainResult<bool> {
        Ok(self.get_completion(course, sequence, unit).await?.complete)
    }
}

#[async_trait]
impl PositionClient for LmsClient {
    async fn save_position(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit_index: usize,
    ) -> DomainResult<()> {
        self.goto_position(course, sequence, unit_index)
            .await
            .map_err(DomainError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = LmsClient::new(&LmsConfig {
            base_url: "https://lms.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "https://lms.example.com");
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let client = LmsClient::new(&LmsConfig {
            access_token: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert!(client.access_token.is_none());
    }

    #[test]
    fn test_handler_path() {
        assert_eq!(
            LmsClient::handler_path(&CourseRef::new("c1"), &SequenceRef::new("s1"), "goto_position"),
            "/courses/c1/xblock/s1/handler/goto_position"
        );
    }
}
