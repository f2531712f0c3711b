use crate::models::{
    BillingUsage, DateKey, LineItemSeries, SummaryEntry, SummaryTable, UsageByDate, UsagePayload,
};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

pub fn summarize_payload(payload: &UsagePayload) -> SummaryEntry {
    let n_requests: u64 = payload.data.iter().map(|item| item.n_requests).sum();
    let total_tokens: u64 = payload
        .data
        .iter()
        .map(|item| item.n_context_tokens_total + item.n_generated_tokens_total)
        .sum();
    let whisper_total_requests: u64 = payload
        .whisper_api_data
        .iter()
        .map(|item| item.num_requests)
        .sum();
    let whisper_total_seconds: f64 = payload
        .whisper_api_data
        .iter()
        .map(|item| item.num_seconds)
        .sum();

    SummaryEntry {
        n_requests,
        total_tokens,
        average_tokens: if n_requests > 0 {
            total_tokens as f64 / n_requests as f64
        } else {
            0.0
        },
        whisper_total_requests,
        whisper_total_seconds,
        whisper_average_seconds: if whisper_total_requests > 0 {
            whisper_total_seconds / whisper_total_requests as f64
        } else {
            0.0
        },
    }
}

/// Builds the per-user table. Every user present in `usage` gets an entry for
/// every date in `dates`, zero-filled where nothing was recorded.
pub fn summarize(dates: &[DateKey], usage: &UsageByDate) -> SummaryTable {
    let mut table = SummaryTable::new();

    for (date, rows) in usage {
        for row in rows {
            let label = if row.user_name.trim().is_empty() {
                &row.user_id
            } else {
                &row.user_name
            };
            table
                .entry(label.clone())
                .or_default()
                .insert(date.clone(), summarize_payload(&row.usage));
        }
    }

    for per_date in table.values_mut() {
        for date in dates {
            per_date.entry(date.clone()).or_default();
        }
    }

    table
}

pub fn day_key_from_timestamp(timestamp: f64) -> DateKey {
    match Utc.timestamp_opt(timestamp as i64, 0).single() {
        Some(ts) => DateKey::day(ts.date_naive()),
        None => DateKey::from(timestamp.to_string().as_str()),
    }
}

/// Groups daily line items by category. Days without a given category hold 0.
pub fn line_item_series(billing: &BillingUsage) -> LineItemSeries {
    let days: Vec<DateKey> = billing
        .daily_costs
        .iter()
        .map(|day| day_key_from_timestamp(day.timestamp))
        .collect();
    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for (idx, day) in billing.daily_costs.iter().enumerate() {
        for item in &day.line_items {
            series
                .entry(item.name.clone())
                .or_insert_with(|| vec![0.0; days.len()])[idx] += item.cost;
        }
    }

    LineItemSeries { days, series }
}

pub fn cumulative(daily: &LineItemSeries) -> LineItemSeries {
    let series = daily
        .series
        .iter()
        .map(|(name, values)| {
            let running = values
                .iter()
                .scan(0.0, |acc, cost| {
                    *acc += cost;
                    Some(*acc)
                })
                .collect();
            (name.clone(), running)
        })
        .collect();

    LineItemSeries {
        days: daily.days.clone(),
        series,
    }
}

/// Total per category over the whole window.
pub fn category_totals(daily: &LineItemSeries) -> BTreeMap<String, f64> {
    daily
        .series
        .iter()
        .map(|(name, values)| (name.clone(), values.iter().sum()))
        .collect()
}

pub fn window_total(daily: &LineItemSeries) -> f64 {
    daily.series.values().flatten().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyCost, LineItem, TextUsage, UserUsage, WhisperUsage};

    fn text(requests: u64, context: u64, generated: u64) -> TextUsage {
        TextUsage {
            n_requests: requests,
            n_context_tokens_total: context,
            n_generated_tokens_total: generated,
        }
    }

    fn row(name: &str, usage: UsagePayload) -> UserUsage {
        UserUsage {
            user_id: format!("user-{name}"),
            user_name: name.to_string(),
            usage,
        }
    }

    fn day(timestamp: f64, items: &[(&str, f64)]) -> DailyCost {
        DailyCost {
            timestamp,
            line_items: items
                .iter()
                .map(|(name, cost)| LineItem {
                    name: name.to_string(),
                    cost: *cost,
                })
                .collect(),
        }
    }

    #[test]
    fn payload_summary_sums_text_and_audio() {
        let payload = UsagePayload {
            data: vec![text(2, 30, 10), text(3, 50, 10)],
            whisper_api_data: vec![
                WhisperUsage {
                    num_requests: 1,
                    num_seconds: 12.0,
                },
                WhisperUsage {
                    num_requests: 3,
                    num_seconds: 24.0,
                },
            ],
            ..UsagePayload::default()
        };
        let entry = summarize_payload(&payload);
        assert_eq!(entry.n_requests, 5);
        assert_eq!(entry.total_tokens, 100);
        assert!((entry.average_tokens - 20.0).abs() < f64::EPSILON);
        assert_eq!(entry.whisper_total_requests, 4);
        assert!((entry.whisper_total_seconds - 36.0).abs() < f64::EPSILON);
        assert!((entry.whisper_average_seconds - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn averages_are_zero_without_requests() {
        let payload = UsagePayload {
            current_usage_usd: 0.5,
            ..UsagePayload::default()
        };
        let entry = summarize_payload(&payload);
        assert_eq!(entry.n_requests, 0);
        assert_eq!(entry.average_tokens, 0.0);
        assert_eq!(entry.whisper_average_seconds, 0.0);
    }

    #[test]
    fn summary_back_fills_every_requested_date() {
        let dates = vec![
            DateKey::from("2024-01-01"),
            DateKey::from("2024-01-02"),
            DateKey::from("2024-01-03"),
        ];
        let mut usage = UsageByDate::new();
        usage.insert(
            DateKey::from("2024-01-02"),
            vec![row(
                "alice",
                UsagePayload {
                    data: vec![text(1, 5, 5)],
                    ..UsagePayload::default()
                },
            )],
        );

        let table = summarize(&dates, &usage);
        let alice = table.get("alice").expect("alice present");
        assert_eq!(alice.keys().cloned().collect::<Vec<_>>(), dates);
        assert_eq!(alice[&dates[0]], SummaryEntry::default());
        assert_eq!(alice[&dates[1]].total_tokens, 10);
    }

    #[test]
    fn unnamed_user_is_keyed_by_id() {
        let dates = vec![DateKey::from("2024-01-01")];
        let mut usage = UsageByDate::new();
        usage.insert(
            dates[0].clone(),
            vec![row(
                "",
                UsagePayload {
                    data: vec![text(1, 1, 1)],
                    ..UsagePayload::default()
                },
            )],
        );
        let table = summarize(&dates, &usage);
        assert!(table.contains_key("user-"));
    }

    #[test]
    fn summary_is_empty_without_usage() {
        let dates = vec![DateKey::from("2024-01-01")];
        assert!(summarize(&dates, &UsageByDate::new()).is_empty());
    }

    #[test]
    fn line_items_are_grouped_with_zero_gaps() {
        let billing = BillingUsage {
            daily_costs: vec![
                day(1_704_067_200.0, &[("GPT-4", 120.0), ("Whisper", 6.0)]),
                day(1_704_153_600.0, &[("GPT-4", 80.0)]),
                day(1_704_240_000.0, &[("Whisper", 4.0), ("GPT-4", 0.0)]),
            ],
        };
        let daily = line_item_series(&billing);
        assert_eq!(
            daily.days,
            vec![
                DateKey::from("2024-01-01"),
                DateKey::from("2024-01-02"),
                DateKey::from("2024-01-03")
            ]
        );
        assert_eq!(daily.series["GPT-4"], vec![120.0, 80.0, 0.0]);
        assert_eq!(daily.series["Whisper"], vec![6.0, 0.0, 4.0]);
    }

    #[test]
    fn cumulative_series_never_decreases() {
        let billing = BillingUsage {
            daily_costs: vec![
                day(1_704_067_200.0, &[("GPT-4", 1.5)]),
                day(1_704_153_600.0, &[("Embeddings", 0.25)]),
                day(1_704_240_000.0, &[("GPT-4", 2.0), ("Embeddings", 0.5)]),
            ],
        };
        let running = cumulative(&line_item_series(&billing));
        assert_eq!(running.series["GPT-4"], vec![1.5, 1.5, 3.5]);
        assert_eq!(running.series["Embeddings"], vec![0.0, 0.25, 0.75]);
        for values in running.series.values() {
            assert!(values.windows(2).all(|w| w[1] >= w[0]));
        }
    }

    #[test]
    fn totals_cover_all_categories() {
        let billing = BillingUsage {
            daily_costs: vec![
                day(1_704_067_200.0, &[("GPT-4", 100.0), ("DALL-E", 20.0)]),
                day(1_704_153_600.0, &[("GPT-4", 50.0)]),
            ],
        };
        let daily = line_item_series(&billing);
        let totals = category_totals(&daily);
        assert_eq!(totals["GPT-4"], 150.0);
        assert_eq!(totals["DALL-E"], 20.0);
        assert_eq!(window_total(&daily), 170.0);
    }
}
