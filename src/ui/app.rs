use crate::charts::{BillingCharts, ChartDataset, Metric};
use crate::models::{DateKey, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Credentials,
    Dashboard,
    ConfirmQuit,
    ErrorDialog,
    InfoDialog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Users,
    Billing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialField {
    #[default]
    OrganizationId,
    ApiKey,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialDraft {
    pub organization_id: String,
    pub api_key: String,
    pub active: CredentialField,
}

impl CredentialDraft {
    pub fn active_value_mut(&mut self) -> &mut String {
        match self.active {
            CredentialField::OrganizationId => &mut self.organization_id,
            CredentialField::ApiKey => &mut self.api_key,
        }
    }

    pub fn toggle_field(&mut self) {
        self.active = match self.active {
            CredentialField::OrganizationId => CredentialField::ApiKey,
            CredentialField::ApiKey => CredentialField::OrganizationId,
        };
    }
}

/// Per-user charts for every metric, colored when the query completed.
#[derive(Debug, Clone)]
pub struct UsersView {
    pub label: String,
    pub dates: Vec<DateKey>,
    pub charts: Vec<(Metric, Vec<ChartDataset>)>,
}

impl UsersView {
    pub fn datasets(&self, metric: Metric) -> &[ChartDataset] {
        self.charts
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, sets)| sets.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct BillingView {
    pub charts: BillingCharts,
    pub cumulative: Vec<ChartDataset>,
}

/// Months offered on the billing page: current month and the two before it.
pub const BILLING_MONTHS: u32 = 3;

#[derive(Debug, Clone)]
pub struct AppState {
    pub running: bool,
    pub screen: Screen,
    pub previous_screen: Screen,
    pub page: Page,
    pub query: Query,
    pub months_back: u32,
    pub metric: Metric,
    pub status: String,
    pub last_refresh: String,
    pub draft: CredentialDraft,
    pub confirm_selected: usize,
    pub users: Option<UsersView>,
    pub billing: Option<BillingView>,
    pub error_message: String,
    pub info_message: String,
}

impl AppState {
    pub fn new(query: Query, has_credentials: bool) -> Self {
        Self {
            running: true,
            screen: if has_credentials {
                Screen::Dashboard
            } else {
                Screen::Credentials
            },
            previous_screen: Screen::Dashboard,
            page: Page::Users,
            query,
            months_back: 0,
            metric: Metric::Requests,
            status: "ready".into(),
            last_refresh: "never".into(),
            draft: CredentialDraft::default(),
            confirm_selected: 0,
            users: None,
            billing: None,
            error_message: String::new(),
            info_message: String::new(),
        }
    }
}
