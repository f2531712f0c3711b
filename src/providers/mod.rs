use crate::error::AppError;
use crate::models::{BillingUsage, Credentials, DateKey, OrgUser, UsagePayload};
use async_trait::async_trait;

pub mod openai;

/// One authenticated read per call. Non-success statuses surface as
/// `AppError::RemoteApi`, unreachable or undecodable responses as `AppError::Transport`.
#[async_trait]
pub trait UsageSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_users(&self, credentials: &Credentials) -> Result<Vec<OrgUser>, AppError>;

    async fn fetch_usage(
        &self,
        credentials: &Credentials,
        user_id: &str,
        date: &DateKey,
    ) -> Result<UsagePayload, AppError>;

    async fn fetch_billing(
        &self,
        credentials: &Credentials,
        start: &DateKey,
        end_exclusive: &DateKey,
    ) -> Result<BillingUsage, AppError>;
}
