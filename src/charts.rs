use crate::aggregate::{category_totals, cumulative, line_item_series, window_total};
use crate::colors::{ColorAssigner, Rgb};
use crate::models::{BillingUsage, DateKey, LineItemSeries, SummaryEntry, SummaryTable};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Requests,
    TotalTokens,
    AverageTokens,
    WhisperRequests,
    WhisperSeconds,
    WhisperAverageSeconds,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Requests,
        Metric::TotalTokens,
        Metric::AverageTokens,
        Metric::WhisperRequests,
        Metric::WhisperSeconds,
        Metric::WhisperAverageSeconds,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Requests => "n_requests",
            Metric::TotalTokens => "total_tokens",
            Metric::AverageTokens => "average_tokens",
            Metric::WhisperRequests => "whisper_total_requests",
            Metric::WhisperSeconds => "whisper_total_seconds",
            Metric::WhisperAverageSeconds => "whisper_average_seconds",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Metric::Requests => "Requests per user",
            Metric::TotalTokens => "Total tokens per user",
            Metric::AverageTokens => "Average tokens per request",
            Metric::WhisperRequests => "Whisper API: Total requests per user",
            Metric::WhisperSeconds => "Whisper API: Total seconds per user",
            Metric::WhisperAverageSeconds => "Whisper API: Average seconds per request",
        }
    }

    pub fn value(self, entry: &SummaryEntry) -> f64 {
        match self {
            Metric::Requests => entry.n_requests as f64,
            Metric::TotalTokens => entry.total_tokens as f64,
            Metric::AverageTokens => entry.average_tokens,
            Metric::WhisperRequests => entry.whisper_total_requests as f64,
            Metric::WhisperSeconds => entry.whisper_total_seconds,
            Metric::WhisperAverageSeconds => entry.whisper_average_seconds,
        }
    }

    fn position(self) -> usize {
        Metric::ALL
            .iter()
            .position(|m| *m == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> Self {
        Metric::ALL[(self.position() + 1) % Metric::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Metric::ALL[(self.position() + Metric::ALL.len() - 1) % Metric::ALL.len()]
    }
}

/// One labelled series, colored through the session's assigner.
#[derive(Debug, Clone, Serialize)]
pub struct ChartDataset {
    pub label: String,
    pub color: Rgb,
    pub points: Vec<(DateKey, f64)>,
}

impl ChartDataset {
    pub fn max_value(&self) -> f64 {
        self.points.iter().map(|(_, v)| *v).fold(0.0, f64::max)
    }
}

/// x-axis labels: the dates of the first user, which every user shares.
pub fn date_labels(table: &SummaryTable) -> Vec<DateKey> {
    table
        .values()
        .next()
        .map(|per_date| per_date.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn user_datasets(
    table: &SummaryTable,
    metric: Metric,
    colors: &mut ColorAssigner,
) -> Vec<ChartDataset> {
    table
        .iter()
        .map(|(user, per_date)| ChartDataset {
            label: user.clone(),
            color: colors.color_for(user),
            points: per_date
                .iter()
                .map(|(date, entry)| (date.clone(), metric.value(entry)))
                .collect(),
        })
        .collect()
}

pub fn series_datasets(series: &LineItemSeries, colors: &mut ColorAssigner) -> Vec<ChartDataset> {
    series
        .series
        .iter()
        .map(|(name, values)| ChartDataset {
            label: name.clone(),
            color: colors.color_for(name),
            points: series.days.iter().cloned().zip(values.iter().copied()).collect(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CostShare {
    pub label: String,
    pub color: Rgb,
    pub fill: String,
    pub cost_cents: f64,
    pub percent: f64,
}

pub fn share_percent(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

pub fn format_dollars(cents: f64) -> String {
    format!("${:.2}", cents / 100.0)
}

/// Everything the billing page draws for one month: daily bars, cumulative
/// lines, the per-category pie and the month total.
#[derive(Debug, Clone, Serialize)]
pub struct BillingCharts {
    pub month: DateKey,
    pub daily: LineItemSeries,
    pub cumulative: LineItemSeries,
    pub shares: Vec<CostShare>,
    pub total_cents: f64,
}

impl BillingCharts {
    pub fn build(month: DateKey, billing: &BillingUsage, colors: &mut ColorAssigner) -> Self {
        let daily = line_item_series(billing);
        let running = cumulative(&daily);
        let total_cents = window_total(&daily);
        let shares = category_totals(&daily)
            .into_iter()
            .map(|(label, cost_cents)| {
                let color = colors.color_for(&label);
                CostShare {
                    fill: color.translucent_hex(),
                    color,
                    percent: share_percent(cost_cents, total_cents),
                    label,
                    cost_cents,
                }
            })
            .collect();

        Self {
            month,
            daily,
            cumulative: running,
            shares,
            total_cents,
        }
    }

    /// `YYYY/MM` as shown next to the total.
    pub fn month_label(&self) -> String {
        self.month.as_str().replace('-', "/")
    }

    pub fn is_empty(&self) -> bool {
        self.daily.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::DEFAULT_PALETTE;
    use crate::models::{DailyCost, LineItem};
    use std::collections::BTreeMap;

    fn table() -> SummaryTable {
        let mut per_date = BTreeMap::new();
        per_date.insert(
            DateKey::from("2024-01-01"),
            SummaryEntry {
                n_requests: 5,
                total_tokens: 100,
                average_tokens: 20.0,
                ..SummaryEntry::default()
            },
        );
        per_date.insert(DateKey::from("2024-01-02"), SummaryEntry::default());
        let mut table = SummaryTable::new();
        table.insert("alice".into(), per_date);
        table
    }

    #[test]
    fn metric_cycle_wraps_both_ways() {
        assert_eq!(Metric::Requests.previous(), Metric::WhisperAverageSeconds);
        assert_eq!(Metric::WhisperAverageSeconds.next(), Metric::Requests);
        assert_eq!(Metric::TotalTokens.next(), Metric::AverageTokens);
    }

    #[test]
    fn user_datasets_follow_metric_and_colors() {
        let mut colors = ColorAssigner::default();
        let sets = user_datasets(&table(), Metric::AverageTokens, &mut colors);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].label, "alice");
        assert_eq!(sets[0].color, DEFAULT_PALETTE[0]);
        assert_eq!(
            sets[0].points,
            vec![
                (DateKey::from("2024-01-01"), 20.0),
                (DateKey::from("2024-01-02"), 0.0)
            ]
        );
        assert!((sets[0].max_value() - 20.0).abs() < f64::EPSILON);
        assert_eq!(date_labels(&table()).len(), 2);
    }

    #[test]
    fn billing_charts_compute_shares_and_total() {
        let billing = BillingUsage {
            daily_costs: vec![DailyCost {
                timestamp: 1_701_388_800.0,
                line_items: vec![
                    LineItem {
                        name: "GPT-4".into(),
                        cost: 300.0,
                    },
                    LineItem {
                        name: "Whisper".into(),
                        cost: 100.0,
                    },
                ],
            }],
        };
        let mut colors = ColorAssigner::default();
        let charts = BillingCharts::build(DateKey::from("2023-12"), &billing, &mut colors);
        assert_eq!(charts.month_label(), "2023/12");
        assert_eq!(format_dollars(charts.total_cents), "$4.00");
        assert_eq!(charts.shares.len(), 2);
        assert!((charts.shares[0].percent - 75.0).abs() < 1e-9);
        assert!((charts.shares[1].percent - 25.0).abs() < 1e-9);
        assert_eq!(charts.shares[0].fill, "#FF6384B3");
        assert!(!charts.is_empty());
    }

    #[test]
    fn share_percent_handles_zero_total() {
        assert_eq!(share_percent(5.0, 0.0), 0.0);
    }
}
