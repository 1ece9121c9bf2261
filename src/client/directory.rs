use crate::domain::model::{AliasesPage, ListUsersRequest, UsersPage};
use crate::domain::ports::DirectoryApi;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://admin.googleapis.com";

const USERS_PATH: &str = "admin/directory/v1/users";

/// Google API 錯誤回應
#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

/// Admin SDK Directory API 的 HTTP 實作
#[derive(Debug, Clone)]
pub struct DirectoryHttpClient {
    http: HttpClient,
    base_url: Url,
    access_token: Option<String>,
}

impl DirectoryHttpClient {
    pub fn new(
        base_url: &str,
        access_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = HttpClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            access_token,
        })
    }

    fn users_url(&self) -> Result<Url> {
        Ok(self.base_url.join(USERS_PATH)?)
    }

    fn aliases_url(&self, user_key: &str) -> Result<Url> {
        let mut url = self.users_url()?;
        url.path_segments_mut()
            .map_err(|_| SyncError::config(format!("base URL cannot be a base: {}", self.base_url)))?
            .push(user_key)
            .push("aliases");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        tracing::debug!("GET {} {:?}", url, query);

        let mut request = self.http.get(url).query(query);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<GoogleErrorResponse>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) => body,
        };
        Err(SyncError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DirectoryApi for DirectoryHttpClient {
    async fn list_users(&self, request: &ListUsersRequest) -> Result<UsersPage> {
        let mut query = vec![
            ("customer", request.customer.clone()),
            ("projection", request.projection.as_str().to_string()),
            ("maxResults", request.max_results.to_string()),
        ];
        if let Some(token) = &request.page_token {
            query.push(("pageToken", token.clone()));
        }
        self.get_json(self.users_url()?, &query).await
    }

    async fn list_user_aliases(&self, user_key: &str) -> Result<AliasesPage> {
        self.get_json(self.aliases_url(user_key)?, &[]).await
    }
}
