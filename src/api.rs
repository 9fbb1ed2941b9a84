//! Client for the campaign backend.
//!
//! All calls go through [`CampaignApi`] so the sheet and the spell search can run
//! against an in-memory backend in tests.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dnd::{Character, CharacterUpdate, Magic};

pub(crate) const DEFAULT_API_URL: &str = "http://26.141.69.7:3001";

#[derive(Error, Debug)]
pub(crate) enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with {status}{}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Status { status: u16, message: Option<String> },
}

#[derive(Serialize, Debug, Clone)]
pub(crate) struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub(crate) struct LoginResponse {
    pub token: Option<String>,
    pub user: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: Option<String>,
}

/// Catalogue filters. Empty fields are left out of the query.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct MagicFilter {
    pub name: String,
    pub level: String,
    pub kind: String,
}

impl MagicFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.level.is_empty() && self.kind.is_empty()
    }

    pub fn query(&self) -> Vec<(&'static str, &str)> {
        [
            ("name", self.name.as_str()),
            ("level", self.level.as_str()),
            ("type", self.kind.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }
}

#[async_trait]
pub(crate) trait CampaignApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    async fn add_magic(&self, magic: &Magic) -> Result<Magic, ApiError>;
    async fn update_magic(&self, id: &str, magic: &Magic) -> Result<(), ApiError>;
    async fn get_magic(&self, id: &str) -> Result<Magic, ApiError>;
    async fn list_magic(&self) -> Result<Vec<Magic>, ApiError>;
    async fn filter_magic(&self, filter: &MagicFilter) -> Result<Vec<Magic>, ApiError>;

    async fn list_characters(&self) -> Result<Vec<Character>, ApiError>;
    async fn create_character(&self, character: &CharacterUpdate) -> Result<Character, ApiError>;
    async fn update_character(&self, id: &str, character: &CharacterUpdate)
        -> Result<(), ApiError>;
}

/// Catalogue lookup: the full list when no filter is set.
pub(crate) async fn find_magic(
    api: &dyn CampaignApi,
    filter: &MagicFilter,
) -> Result<Vec<Magic>, ApiError> {
    if filter.is_empty() {
        api.list_magic().await
    } else {
        api.filter_magic(filter).await
    }
}

#[derive(Clone)]
pub(crate) struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|body| body.message);
        log::debug!("Request failed with {}: {}", status, body);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl CampaignApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(request)
            .send()
            .await?;
        Self::json(response).await
    }

    async fn add_magic(&self, magic: &Magic) -> Result<Magic, ApiError> {
        let response = self
            .client
            .post(self.url("/magic/add-magic"))
            .json(magic)
            .send()
            .await?;
        Self::json(response).await
    }

    async fn update_magic(&self, id: &str, magic: &Magic) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.url(&format!("/magic/update-magic/{}", id)))
            .json(magic)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_magic(&self, id: &str) -> Result<Magic, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/magic/get-magic/{}", id)))
            .send()
            .await?;
        Self::json(response).await
    }

    async fn list_magic(&self) -> Result<Vec<Magic>, ApiError> {
        let response = self
            .client
            .get(self.url("/magic/get-all-magic"))
            .send()
            .await?;
        Self::json(response).await
    }

    async fn filter_magic(&self, filter: &MagicFilter) -> Result<Vec<Magic>, ApiError> {
        log::debug!("Filtering magic by {:?}", filter);
        let response = self
            .client
            .get(self.url("/magic/filter-magic"))
            .query(&filter.query())
            .send()
            .await?;
        Self::json(response).await
    }

    async fn list_characters(&self) -> Result<Vec<Character>, ApiError> {
        let response = self
            .client
            .get(self.url("/charactersheet"))
            .send()
            .await?;
        Self::json(response).await
    }

    async fn create_character(&self, character: &CharacterUpdate) -> Result<Character, ApiError> {
        let response = self
            .client
            .post(self.url("/charactersheet"))
            .json(character)
            .send()
            .await?;
        Self::json(response).await
    }

    async fn update_character(
        &self,
        id: &str,
        character: &CharacterUpdate,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .patch(self.url(&format!("/charactersheet/{}", id)))
            .json(character)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
