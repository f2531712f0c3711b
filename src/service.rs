use crate::aggregate::summarize;
use crate::charts::BillingCharts;
use crate::colors::ColorAssigner;
use crate::dates::DateRangeBuilder;
use crate::error::AppError;
use crate::models::{Credentials, DateKey, Query, SummaryTable, UsageByDate, UserUsage};
use crate::providers::UsageSource;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub fn http_client(timeout_seconds: Option<u64>) -> Result<Client, AppError> {
    let mut builder = Client::builder();
    if let Some(secs) = timeout_seconds {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

#[derive(Debug, Clone)]
pub struct UserSummary {
    pub query: Query,
    pub label: String,
    pub dates: Vec<DateKey>,
    pub table: SummaryTable,
}

/// The most recently completed query. A later response replaces an earlier one.
#[derive(Debug, Clone)]
pub enum RenderedView {
    Users(UserSummary),
    Billing(BillingCharts),
}

/// Per-session context: credentials, the color table and the current view.
pub struct Session {
    source: Box<dyn UsageSource>,
    credentials: Option<Credentials>,
    colors: ColorAssigner,
    current: Option<RenderedView>,
}

impl Session {
    pub fn new(source: Box<dyn UsageSource>, colors: ColorAssigner) -> Self {
        Self {
            source,
            credentials: None,
            colors,
            current: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn set_credentials(&mut self, organization_id: &str, api_key: &str) -> Result<(), AppError> {
        self.credentials = Some(Credentials::new(organization_id, api_key)?);
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<Credentials, AppError> {
        self.credentials
            .clone()
            .ok_or_else(AppError::missing_credentials)
    }

    pub fn colors_mut(&mut self) -> &mut ColorAssigner {
        &mut self.colors
    }

    pub fn current_view(&self) -> Option<&RenderedView> {
        self.current.as_ref()
    }

    /// One usage call per (user, date), issued sequentially. Days without any
    /// activity are left out; a transport failure skips only that call.
    async fn collect_usage(
        &self,
        credentials: &Credentials,
        dates: &[DateKey],
    ) -> Result<UsageByDate, AppError> {
        let users = self.source.fetch_users(credentials).await?;
        let mut result: UsageByDate = dates.iter().map(|d| (d.clone(), Vec::new())).collect();

        if users.is_empty() {
            info!(source = self.source.name(), "organization has no members");
            return Ok(result);
        }

        for user in &users {
            for date in dates {
                let usage = match self.source.fetch_usage(credentials, &user.id, date).await {
                    Ok(usage) => usage,
                    Err(err) if err.is_transport() => {
                        warn!(user = %user.name, %date, error = %err, "skipping usage fetch");
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                if !usage.has_activity() {
                    debug!(user = %user.name, %date, "no activity");
                    continue;
                }
                result.entry(date.clone()).or_default().push(UserUsage {
                    user_id: user.id.clone(),
                    user_name: user.name.clone(),
                    usage,
                });
            }
        }

        Ok(result)
    }

    pub async fn user_summary(
        &mut self,
        query: Query,
        dates: &DateRangeBuilder,
    ) -> Result<UserSummary, AppError> {
        let credentials = self.credentials()?;
        let date_list = dates.usage_dates(query);
        let started = Instant::now();
        info!(window = %query.as_label(), days = date_list.len(), "fetching per-user usage");

        let usage = self.collect_usage(&credentials, &date_list).await?;
        let table = summarize(&date_list, &usage);
        if table.is_empty() {
            info!(window = %query.as_label(), "no usage in range");
            return Err(AppError::EmptyResult);
        }

        for user in table.keys() {
            self.colors.color_for(user);
        }
        let summary = UserSummary {
            query,
            label: query.display_label(dates.today()),
            dates: date_list,
            table,
        };
        info!(
            users = summary.table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "per-user usage ready"
        );
        self.current = Some(RenderedView::Users(summary.clone()));
        Ok(summary)
    }

    pub async fn billing(
        &mut self,
        months_back: u32,
        dates: &DateRangeBuilder,
    ) -> Result<BillingCharts, AppError> {
        let credentials = self.credentials()?;
        let window = dates.billing_window(months_back).ok_or_else(|| {
            AppError::Validation(format!("No calendar month {months_back} months back."))
        })?;
        info!(month = %window.month, "fetching billing usage");

        let billing = self
            .source
            .fetch_billing(&credentials, &window.start, &window.end_exclusive)
            .await?;
        let charts = BillingCharts::build(window.month, &billing, &mut self.colors);
        info!(
            categories = charts.shares.len(),
            days = charts.daily.days.len(),
            "billing usage ready"
        );
        self.current = Some(RenderedView::Billing(charts.clone()));
        Ok(charts)
    }
}
