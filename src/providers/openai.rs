use crate::error::AppError;
use crate::models::{BillingUsage, Credentials, DateKey, OrgUser, UsagePayload};
use crate::providers::UsageSource;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const ORGANIZATION_HEADER: &str = "openai-organization";

#[derive(Debug, Default, Deserialize)]
struct UsersEnvelope {
    #[serde(default)]
    members: Members,
}

#[derive(Debug, Default, Deserialize)]
struct Members {
    #[serde(default)]
    data: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    user: OrgUser,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct OpenAiUsageSource {
    client: Client,
    base_url: Url,
}

impl OpenAiUsageSource {
    pub fn new(client: Client, base_url: &str) -> Result<Self, AppError> {
        let mut base_url = Url::parse(base_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, AppError> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn remote_error(status: StatusCode, body: &str) -> AppError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    body.trim().to_string()
                }
            });
        AppError::RemoteApi {
            status: status.as_u16(),
            message,
        }
    }

    async fn read_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, AppError> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::remote_error(status, &body));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl UsageSource for OpenAiUsageSource {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn fetch_users(&self, credentials: &Credentials) -> Result<Vec<OrgUser>, AppError> {
        let path = format!("v1/organizations/{}/users", credentials.organization_id);
        let url = self.endpoint(&path, &[])?;
        debug!(%url, "fetching organization users");

        // This endpoint takes the organization from the path only.
        let req = self.client.get(url).bearer_auth(&credentials.api_key);
        let body: UsersEnvelope = Self::read_json(req).await?;
        Ok(body.members.data.into_iter().map(|m| m.user).collect())
    }

    async fn fetch_usage(
        &self,
        credentials: &Credentials,
        user_id: &str,
        date: &DateKey,
    ) -> Result<UsagePayload, AppError> {
        let url = self.endpoint(
            "v1/usage",
            &[("date", date.as_str()), ("user_public_id", user_id)],
        )?;
        debug!(%url, user_id, %date, "fetching user usage");

        let req = self
            .client
            .get(url)
            .bearer_auth(&credentials.api_key)
            .header(ORGANIZATION_HEADER, &credentials.organization_id);
        Self::read_json(req).await
    }

    async fn fetch_billing(
        &self,
        credentials: &Credentials,
        start: &DateKey,
        end_exclusive: &DateKey,
    ) -> Result<BillingUsage, AppError> {
        let url = self.endpoint(
            "dashboard/billing/usage",
            &[
                ("start_date", start.as_str()),
                ("end_date", end_exclusive.as_str()),
            ],
        )?;
        debug!(%url, "fetching billing usage");

        let req = self
            .client
            .get(url)
            .bearer_auth(&credentials.api_key)
            .header(ORGANIZATION_HEADER, &credentials.organization_id);
        Self::read_json(req).await
    }
}
