use crate::charts::{format_dollars, BillingCharts, Metric};
use crate::error::AppError;
use crate::models::LineItemSeries;
use crate::service::UserSummary;
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.eq_ignore_ascii_case("table") {
            Ok(OutputFormat::Table)
        } else if raw.eq_ignore_ascii_case("json") {
            Ok(OutputFormat::Json)
        } else if raw.eq_ignore_ascii_case("csv") {
            Ok(OutputFormat::Csv)
        } else {
            Err(AppError::Validation(
                "Unsupported format. Use table, json, or csv".into(),
            ))
        }
    }
}

pub fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

pub fn render_users(summary: &UserSummary, format: OutputFormat) -> Result<String, AppError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&summary.table)?),
        OutputFormat::Csv => Ok(users_csv(summary)),
        OutputFormat::Table => Ok(users_table(summary)),
    }
}

fn users_csv(summary: &UserSummary) -> String {
    let mut out = String::from("user,date");
    for metric in Metric::ALL {
        out.push(',');
        out.push_str(metric.key());
    }
    out.push('\n');

    for (user, per_date) in &summary.table {
        for (date, entry) in per_date {
            let _ = write!(out, "{},{}", csv_field(user), date);
            for metric in Metric::ALL {
                let _ = write!(out, ",{}", format_number(metric.value(entry)));
            }
            out.push('\n');
        }
    }
    out
}

fn users_table(summary: &UserSummary) -> String {
    let name_width = summary
        .table
        .keys()
        .map(|u| u.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);
    let mut out = format!("Usage for {}\n", summary.label);

    for metric in Metric::ALL {
        let _ = write!(out, "\n{}\n{:<name_width$}", metric.title(), "User");
        for date in &summary.dates {
            let _ = write!(out, "  {:>10}", date.as_str());
        }
        out.push('\n');
        for (user, per_date) in &summary.table {
            let _ = write!(out, "{user:<name_width$}");
            for entry in per_date.values() {
                let _ = write!(out, "  {:>10}", format_number(metric.value(entry)));
            }
            out.push('\n');
        }
    }
    out
}

pub fn render_billing(charts: &BillingCharts, format: OutputFormat) -> Result<String, AppError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(charts)?),
        OutputFormat::Csv => Ok(billing_csv(charts)),
        OutputFormat::Table => Ok(billing_table(charts)),
    }
}

fn billing_csv(charts: &BillingCharts) -> String {
    let mut out = String::from("date,line_item,cost_cents,cumulative_cents\n");
    for (name, values) in &charts.daily.series {
        let running = charts.cumulative.series.get(name);
        for (idx, (day, cost)) in charts.daily.days.iter().zip(values).enumerate() {
            let total = running.and_then(|r| r.get(idx)).copied().unwrap_or(0.0);
            let _ = writeln!(
                out,
                "{},{},{},{}",
                day,
                csv_field(name),
                format_number(*cost),
                format_number(total)
            );
        }
    }
    out
}

fn series_block(out: &mut String, title: &str, series: &LineItemSeries) {
    let name_width = series
        .series
        .keys()
        .map(|n| n.chars().count())
        .max()
        .unwrap_or(9)
        .max(9);
    let _ = write!(out, "\n{title}\n{:<name_width$}", "Line item");
    for day in &series.days {
        let _ = write!(out, "  {:>10}", day.as_str());
    }
    out.push('\n');
    for (name, values) in &series.series {
        let _ = write!(out, "{name:<name_width$}");
        for cost in values {
            let _ = write!(out, "  {:>10}", format_dollars(*cost));
        }
        out.push('\n');
    }
}

fn billing_table(charts: &BillingCharts) -> String {
    let mut out = format!(
        "Usage for {}: {}\n",
        charts.month_label(),
        format_dollars(charts.total_cents)
    );

    out.push_str("\nPercentage of monthly usage by model\n");
    for share in &charts.shares {
        let _ = writeln!(
            out,
            "  {:<32} {:>10} {:>7.2}%",
            share.label,
            format_dollars(share.cost_cents),
            share.percent
        );
    }

    series_block(&mut out, "Daily usage (USD)", &charts.daily);
    series_block(&mut out, "Cumulative daily usage (USD)", &charts.cumulative);
    out
}
