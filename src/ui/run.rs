use crate::charts::{date_labels, format_dollars, series_datasets, user_datasets, Metric};
use crate::dates::DateRangeBuilder;
use crate::error::AppError;
use crate::models::{DateKey, DateUnit, Query};
use crate::service::{RenderedView, Session};
use crate::ui::app::{
    AppState, BillingView, CredentialField, Page, Screen, UsersView, BILLING_MONTHS,
};
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Clear, Dataset, GraphType,
    Paragraph, Row, Table, Wrap,
};
use ratatui::Terminal;
use std::io;
use std::time::Duration as StdDuration;
use tracing::error;

const COLOR_ACCENT: Color = Color::Cyan;
const COLOR_MUTED: Color = Color::DarkGray;
const COLOR_HEADER: Color = Color::White;

const POLL_INTERVAL: StdDuration = StdDuration::from_millis(250);

/// What a key press asks the pipeline to do once the frame is redrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    FetchUsers,
    FetchBilling,
}

/// `startup_error` is shown over the credential form, e.g. when a flag or
/// env var supplied only one of the two values.
pub async fn run_tui(
    mut session: Session,
    query: Query,
    startup_error: Option<String>,
) -> Result<(), AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let loop_result = run_loop(&mut terminal, &mut session, query, startup_error).await;

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    loop_result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
    query: Query,
    startup_error: Option<String>,
) -> Result<(), AppError> {
    let mut state = initial_state(query, session.has_credentials(), startup_error);
    let mut pending = session.has_credentials().then_some(Command::FetchUsers);

    while state.running {
        if let Some(command) = pending.take() {
            state.status = "fetching...".into();
            terminal.draw(|f| render(f, &state))?;
            execute(command, &mut state, session).await;
        }

        terminal.draw(|f| render(f, &state))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                pending = handle_key(key.code, key.modifiers, &mut state, session);
            }
        }
    }

    Ok(())
}

fn initial_state(query: Query, has_credentials: bool, startup_error: Option<String>) -> AppState {
    let mut state = AppState::new(query, has_credentials);
    if let Some(message) = startup_error {
        show_error(&mut state, message);
    }
    state
}

fn page_command(page: Page) -> Command {
    match page {
        Page::Users => Command::FetchUsers,
        Page::Billing => Command::FetchBilling,
    }
}

fn handle_key(
    code: KeyCode,
    modifiers: KeyModifiers,
    state: &mut AppState,
    session: &mut Session,
) -> Option<Command> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        confirm_quit(state);
        return None;
    }

    match state.screen {
        Screen::Credentials => match code {
            KeyCode::Esc => {
                if session.has_credentials() {
                    state.screen = Screen::Dashboard;
                } else {
                    confirm_quit(state);
                }
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                state.draft.toggle_field()
            }
            KeyCode::Backspace => {
                state.draft.active_value_mut().pop();
            }
            KeyCode::Enter => {
                match session.set_credentials(&state.draft.organization_id, &state.draft.api_key)
                {
                    Ok(()) => {
                        state.draft.api_key.clear();
                        state.screen = Screen::Dashboard;
                        return Some(page_command(state.page));
                    }
                    Err(err) => show_error(state, err.to_string()),
                }
            }
            KeyCode::Char(ch) => state.draft.active_value_mut().push(ch),
            _ => {}
        },
        Screen::Dashboard => match code {
            KeyCode::Char('q') | KeyCode::Esc => confirm_quit(state),
            KeyCode::Char('c') => {
                state.draft.active = CredentialField::OrganizationId;
                state.screen = Screen::Credentials;
            }
            KeyCode::Char(ch @ '1'..='6') => {
                let idx = ch as usize - '1' as usize;
                state.page = Page::Users;
                state.query = Query::PRESETS[idx];
                return Some(Command::FetchUsers);
            }
            KeyCode::Char('u') => {
                state.page = Page::Users;
                if state.users.is_none() {
                    return Some(Command::FetchUsers);
                }
            }
            KeyCode::Char('b') => {
                state.page = Page::Billing;
                if state.billing.is_none() {
                    return Some(Command::FetchBilling);
                }
            }
            KeyCode::Char('r') => return Some(page_command(state.page)),
            KeyCode::Left => match state.page {
                Page::Users => state.metric = state.metric.previous(),
                Page::Billing if state.months_back + 1 < BILLING_MONTHS => {
                    state.months_back += 1;
                    return Some(Command::FetchBilling);
                }
                Page::Billing => {}
            },
            KeyCode::Right => match state.page {
                Page::Users => state.metric = state.metric.next(),
                Page::Billing if state.months_back > 0 => {
                    state.months_back -= 1;
                    return Some(Command::FetchBilling);
                }
                Page::Billing => {}
            },
            _ => {}
        },
        Screen::ConfirmQuit => match code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                state.confirm_selected = 1 - state.confirm_selected.min(1);
            }
            KeyCode::Char('y') => state.running = false,
            KeyCode::Enter => {
                if state.confirm_selected == 1 {
                    state.running = false;
                } else {
                    state.screen = state.previous_screen;
                }
            }
            KeyCode::Esc | KeyCode::Char('n') => state.screen = state.previous_screen,
            _ => {}
        },
        Screen::ErrorDialog | Screen::InfoDialog => {
            if matches!(code, KeyCode::Enter | KeyCode::Esc) {
                state.screen = state.previous_screen;
            }
        }
    }

    None
}

async fn execute(command: Command, state: &mut AppState, session: &mut Session) {
    let dates = DateRangeBuilder::for_today();
    match command {
        Command::FetchUsers => match session.user_summary(state.query, &dates).await {
            Ok(summary) => {
                let mut charts = Vec::with_capacity(Metric::ALL.len());
                for metric in Metric::ALL {
                    charts.push((
                        metric,
                        user_datasets(&summary.table, metric, session.colors_mut()),
                    ));
                }
                state.users = Some(UsersView {
                    dates: date_labels(&summary.table),
                    label: summary.label,
                    charts,
                });
                mark_refreshed(state, session.current_view());
            }
            Err(err) => report_failure(state, err),
        },
        Command::FetchBilling => match session.billing(state.months_back, &dates).await {
            Ok(charts) => {
                let cumulative = series_datasets(&charts.cumulative, session.colors_mut());
                state.billing = Some(BillingView { charts, cumulative });
                mark_refreshed(state, session.current_view());
            }
            Err(err) => report_failure(state, err),
        },
    }
}

fn mark_refreshed(state: &mut AppState, view: Option<&RenderedView>) {
    state.last_refresh = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    state.status = view_status(view);
}

fn view_status(view: Option<&RenderedView>) -> String {
    match view {
        Some(RenderedView::Users(summary)) => {
            format!("{} users, {}", summary.table.len(), summary.query.as_label())
        }
        Some(RenderedView::Billing(charts)) if charts.is_empty() => {
            format!("no billing for {}", charts.month_label())
        }
        Some(RenderedView::Billing(charts)) => format!("billing {}", charts.month_label()),
        None => "ok".into(),
    }
}

fn report_failure(state: &mut AppState, err: AppError) {
    match err {
        AppError::EmptyResult => {
            state.status = "no usage".into();
            show_info(state, err.to_string());
        }
        other => {
            error!(error = %other, "query failed");
            state.status = "failed".into();
            show_error(state, other.to_string());
        }
    }
}

fn confirm_quit(state: &mut AppState) {
    if state.screen != Screen::ConfirmQuit {
        state.previous_screen = state.screen;
    }
    state.screen = Screen::ConfirmQuit;
    state.confirm_selected = 0;
}

fn show_error(state: &mut AppState, message: String) {
    state.error_message = message;
    state.previous_screen = state.screen;
    state.screen = Screen::ErrorDialog;
}

fn show_info(state: &mut AppState, message: String) {
    state.info_message = message;
    state.previous_screen = state.screen;
    state.screen = Screen::InfoDialog;
}

fn short_date(date: &DateKey) -> String {
    date.as_str()
        .get(5..)
        .unwrap_or(date.as_str())
        .to_string()
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn render(f: &mut ratatui::Frame, state: &AppState) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(f.area());

    let page = match state.page {
        Page::Users => "per-user",
        Page::Billing => "billing",
    };
    let header = Paragraph::new(format!(
        " usage-charts  ·  {page}  ·  {}  ·  {} ",
        state.status, state.last_refresh
    ))
    .block(Block::default().borders(Borders::ALL).title(" Session "))
    .style(Style::default().fg(COLOR_HEADER));
    f.render_widget(header, root[0]);

    render_selector(f, root[1], state);

    match state.page {
        Page::Users => render_users(f, root[2], state),
        Page::Billing => render_billing(f, root[2], state),
    }

    let footer = Paragraph::new(footer_text(state))
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(COLOR_MUTED));
    f.render_widget(footer, root[3]);

    match state.screen {
        Screen::Dashboard => {}
        Screen::Credentials => render_credentials(f, state),
        Screen::ConfirmQuit => render_confirm(f, state),
        Screen::ErrorDialog => render_error(f, state),
        Screen::InfoDialog => render_info(f, state),
    }
}

fn selector_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::Black)
            .bg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_HEADER)
    }
}

fn render_selector(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let dates = DateRangeBuilder::for_today();
    let mut spans = Vec::new();
    match state.page {
        Page::Users => {
            for (idx, preset) in Query::PRESETS.iter().enumerate() {
                let label = format!(" {} {} ", idx + 1, preset.display_label(dates.today()));
                spans.push(Span::styled(label, selector_style(*preset == state.query)));
                spans.push(Span::raw(" "));
            }
        }
        Page::Billing => {
            let months = dates.build(DateUnit::Month, i64::from(BILLING_MONTHS));
            let newest = months.len().saturating_sub(1);
            for (idx, month) in months.iter().enumerate() {
                let back = (newest - idx) as u32;
                spans.push(Span::styled(
                    format!(" {} ", month.as_str().replace('-', "/")),
                    selector_style(back == state.months_back),
                ));
                spans.push(Span::raw(" "));
            }
        }
    }

    let selector = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Range "));
    f.render_widget(selector, area);
}

fn placeholder(f: &mut ratatui::Frame, area: Rect, title: &str) {
    let content = Paragraph::new("No data yet. Press 'r' to fetch.")
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {title} ")),
        )
        .style(Style::default().fg(COLOR_MUTED))
        .alignment(Alignment::Center);
    f.render_widget(content, area);
}

fn legend_lines<'a>(labels: impl Iterator<Item = (&'a str, Color)>) -> Vec<Line<'static>> {
    labels
        .map(|(label, color)| {
            Line::from(vec![
                Span::styled("■ ", Style::default().fg(color)),
                Span::raw(label.to_string()),
            ])
        })
        .collect()
}

fn render_users(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let Some(view) = &state.users else {
        placeholder(f, area, state.metric.title());
        return;
    };

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(28)])
        .split(area);

    let datasets = view.datasets(state.metric);
    let group_count = view.dates.len().max(1);
    let user_count = datasets.len().max(1);
    let inner_width = body[0].width.saturating_sub(2) as usize;
    let bar_width = ((inner_width / group_count).saturating_sub(1) / user_count).clamp(1, 9) as u16;

    let mut chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} · {} ", state.metric.title(), view.label)),
        )
        .bar_width(bar_width)
        .bar_gap(0)
        .group_gap(1);

    for (idx, date) in view.dates.iter().enumerate() {
        let bars: Vec<Bar> = datasets
            .iter()
            .map(|set| {
                let value = set.points.get(idx).map(|(_, v)| *v).unwrap_or(0.0);
                Bar::default()
                    .value(value.round().max(0.0) as u64)
                    .text_value(format_value(value))
                    .style(Style::default().fg(set.color.into()))
            })
            .collect();
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(short_date(date)))
                .bars(&bars),
        );
    }
    f.render_widget(chart, body[0]);

    let legend = Paragraph::new(legend_lines(
        datasets
            .iter()
            .map(|set| (set.label.as_str(), Color::from(set.color))),
    ))
    .block(Block::default().borders(Borders::ALL).title(" Users "))
    .wrap(Wrap { trim: true });
    f.render_widget(legend, body[1]);
}

fn render_billing(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let Some(view) = &state.billing else {
        placeholder(f, area, "Daily usage (USD)");
        return;
    };
    let charts = &view.charts;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(6)])
        .split(area);

    let total = Paragraph::new(Line::from(vec![
        Span::raw(format!("Usage for {}: ", charts.month_label())),
        Span::styled(
            format_dollars(charts.total_cents),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Total "));
    f.render_widget(total, rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    let points: Vec<Vec<(f64, f64)>> = view
        .cumulative
        .iter()
        .map(|set| {
            set.points
                .iter()
                .enumerate()
                .map(|(idx, (_, cents))| (idx as f64, cents / 100.0))
                .collect()
        })
        .collect();
    let lines: Vec<Dataset> = view
        .cumulative
        .iter()
        .zip(&points)
        .map(|(set, data)| {
            Dataset::default()
                .name(set.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(set.color.into()))
                .data(data)
        })
        .collect();

    let days = &charts.daily.days;
    let x_max = days.len().saturating_sub(1).max(1) as f64;
    let x_labels: Vec<String> = match days.len() {
        0 => vec![],
        1 => vec![short_date(&days[0])],
        n => vec![
            short_date(&days[0]),
            short_date(&days[n / 2]),
            short_date(&days[n - 1]),
        ],
    };
    let y_max = view
        .cumulative
        .iter()
        .map(|set| set.max_value() / 100.0)
        .fold(0.0, f64::max)
        .max(0.01);

    let chart = Chart::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Cumulative daily usage (USD) "),
        )
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(x_labels)
                .style(Style::default().fg(COLOR_MUTED)),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max * 1.1])
                .labels(vec![
                    "$0.00".to_string(),
                    format!("${:.2}", y_max / 2.0),
                    format!("${y_max:.2}"),
                ])
                .style(Style::default().fg(COLOR_MUTED)),
        );
    f.render_widget(chart, body[0]);

    let share_rows = charts
        .shares
        .iter()
        .map(|share| {
            Row::new(vec![
                Cell::from(Span::styled("■", Style::default().fg(share.color.into()))),
                Cell::from(share.label.clone()),
                Cell::from(format_dollars(share.cost_cents)),
                Cell::from(format!("{:.2}%", share.percent)),
            ])
        })
        .collect::<Vec<_>>();
    let shares = Table::new(
        share_rows,
        [
            Constraint::Length(2),
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["", "Model", "Cost", "Share"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Percentage of monthly usage by model "),
    );
    f.render_widget(shares, body[1]);
}

fn footer_text(state: &AppState) -> &'static str {
    match (state.screen, state.page) {
        (Screen::Dashboard, Page::Users) => {
            "1-6 range | Left/Right metric | b billing | r refresh | c credentials | q quit"
        }
        (Screen::Dashboard, Page::Billing) => {
            "Left/Right month | u per-user | r refresh | c credentials | q quit"
        }
        (Screen::Credentials, _) => "Tab switch field | Enter apply | Esc cancel",
        (Screen::ConfirmQuit, _) => "Left/Right choose | Enter confirm | Esc cancel",
        (Screen::ErrorDialog, _) | (Screen::InfoDialog, _) => "Enter/Esc close",
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn form_line(label: &str, value: &str, active: bool, masked: bool) -> Line<'static> {
    let display = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };

    let prefix = if active { "> " } else { "  " };
    let style = if active {
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::styled(prefix.to_string(), style),
        Span::styled(format!("{label}: {display}"), style),
    ])
}

fn render_credentials(f: &mut ratatui::Frame, state: &AppState) {
    let area = centered_rect(60, 36, f.area());
    f.render_widget(Clear, area);

    let draft = &state.draft;
    let content = Paragraph::new(vec![
        form_line(
            "Organization ID",
            &draft.organization_id,
            draft.active == CredentialField::OrganizationId,
            false,
        ),
        form_line(
            "API Key",
            &draft.api_key,
            draft.active == CredentialField::ApiKey,
            true,
        ),
        Line::from(""),
        Line::from(Span::styled(
            "Kept in memory for this session only.",
            Style::default().fg(COLOR_MUTED),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Credentials "),
    );
    f.render_widget(content, area);
}

fn render_confirm(f: &mut ratatui::Frame, state: &AppState) {
    let area = centered_rect(50, 30, f.area());
    f.render_widget(Clear, area);

    let cancel_style = if state.confirm_selected == 0 {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let confirm_style = if state.confirm_selected == 1 {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Red)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let content = Paragraph::new(vec![
        Line::from("Do you want to exit usage-charts?"),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Cancel (Esc)]", cancel_style),
            Span::raw("   "),
            Span::styled("[Quit (Enter)]", confirm_style),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Confirm Quit "))
    .alignment(Alignment::Center);
    f.render_widget(content, area);
}

fn render_error(f: &mut ratatui::Frame, state: &AppState) {
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);
    let content = Paragraph::new(vec![
        Line::from(state.error_message.clone()),
        Line::from(""),
        Line::from("Press Enter or Esc"),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Error "))
    .style(Style::default().fg(Color::Red))
    .wrap(Wrap { trim: true });
    f.render_widget(content, area);
}

fn render_info(f: &mut ratatui::Frame, state: &AppState) {
    let area = centered_rect(50, 26, f.area());
    f.render_widget(Clear, area);
    let content = Paragraph::new(vec![
        Line::from(state.info_message.clone()),
        Line::from(""),
        Line::from("Press Enter or Esc"),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Notice "))
    .style(Style::default().fg(Color::Yellow));
    f.render_widget(content, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::ColorAssigner;
    use crate::providers::openai::OpenAiUsageSource;
    use reqwest::Client;

    fn session() -> Session {
        let source =
            OpenAiUsageSource::new(Client::new(), "http://127.0.0.1:9").expect("base url");
        Session::new(Box::new(source), ColorAssigner::default())
    }

    fn press(state: &mut AppState, session: &mut Session, code: KeyCode) -> Option<Command> {
        handle_key(code, KeyModifiers::NONE, state, session)
    }

    #[test]
    fn empty_credentials_show_error_without_fetching() {
        let mut session = session();
        let mut state = AppState::new(Query::days(7), false);
        assert_eq!(state.screen, Screen::Credentials);

        for ch in "org-1".chars() {
            press(&mut state, &mut session, KeyCode::Char(ch));
        }
        let command = press(&mut state, &mut session, KeyCode::Enter);
        assert_eq!(command, None);
        assert_eq!(state.screen, Screen::ErrorDialog);
        assert_eq!(
            state.error_message,
            "Please enter both Organization ID and API Key."
        );
        assert!(!session.has_credentials());
    }

    #[test]
    fn complete_credentials_trigger_fetch() {
        let mut session = session();
        let mut state = AppState::new(Query::days(7), false);
        for ch in "org-1".chars() {
            press(&mut state, &mut session, KeyCode::Char(ch));
        }
        press(&mut state, &mut session, KeyCode::Tab);
        for ch in "sk-1".chars() {
            press(&mut state, &mut session, KeyCode::Char(ch));
        }
        press(&mut state, &mut session, KeyCode::Backspace);
        press(&mut state, &mut session, KeyCode::Char('2'));

        let command = press(&mut state, &mut session, KeyCode::Enter);
        assert_eq!(command, Some(Command::FetchUsers));
        assert_eq!(state.screen, Screen::Dashboard);
        assert!(state.draft.api_key.is_empty());
        assert!(session.has_credentials());
    }

    #[test]
    fn preset_keys_select_query() {
        let mut session = session();
        let mut state = AppState::new(Query::days(7), true);
        let command = press(&mut state, &mut session, KeyCode::Char('4'));
        assert_eq!(command, Some(Command::FetchUsers));
        assert_eq!(state.query, Query::months(1));
    }

    #[test]
    fn arrows_cycle_metric_on_users_page() {
        let mut session = session();
        let mut state = AppState::new(Query::days(7), true);
        assert_eq!(press(&mut state, &mut session, KeyCode::Left), None);
        assert_eq!(state.metric, Metric::WhisperAverageSeconds);
        press(&mut state, &mut session, KeyCode::Right);
        assert_eq!(state.metric, Metric::Requests);
    }

    #[test]
    fn billing_month_stays_within_offered_range() {
        let mut session = session();
        let mut state = AppState::new(Query::days(7), true);
        assert_eq!(
            press(&mut state, &mut session, KeyCode::Char('b')),
            Some(Command::FetchBilling)
        );
        assert_eq!(press(&mut state, &mut session, KeyCode::Right), None);
        for _ in 0..BILLING_MONTHS + 2 {
            press(&mut state, &mut session, KeyCode::Left);
        }
        assert_eq!(state.months_back, BILLING_MONTHS - 1);
    }

    #[test]
    fn quit_requires_confirmation() {
        let mut session = session();
        let mut state = AppState::new(Query::days(7), true);
        press(&mut state, &mut session, KeyCode::Char('q'));
        assert_eq!(state.screen, Screen::ConfirmQuit);
        press(&mut state, &mut session, KeyCode::Enter);
        assert!(state.running);
        assert_eq!(state.screen, Screen::Dashboard);

        press(&mut state, &mut session, KeyCode::Char('q'));
        press(&mut state, &mut session, KeyCode::Right);
        press(&mut state, &mut session, KeyCode::Enter);
        assert!(!state.running);
    }

    #[test]
    fn empty_result_is_reported_as_notice() {
        let mut state = AppState::new(Query::days(7), true);
        report_failure(&mut state, AppError::EmptyResult);
        assert_eq!(state.screen, Screen::InfoDialog);
        assert_eq!(state.info_message, "Usage is empty.");

        let mut state = AppState::new(Query::days(7), true);
        report_failure(
            &mut state,
            AppError::RemoteApi {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(state.screen, Screen::ErrorDialog);
        assert_eq!(state.error_message, "Error: 500 - boom");
    }

    #[test]
    fn rejected_startup_credentials_explain_the_form() {
        let mut session = session();
        let err = session
            .set_credentials("org-1", "  ")
            .expect_err("blank key rejected");
        let mut state = initial_state(
            Query::days(7),
            session.has_credentials(),
            Some(err.to_string()),
        );
        assert_eq!(state.screen, Screen::ErrorDialog);
        assert_eq!(
            state.error_message,
            "Please enter both Organization ID and API Key."
        );

        press(&mut state, &mut session, KeyCode::Enter);
        assert_eq!(state.screen, Screen::Credentials);
    }

    #[test]
    fn form_line_masks_api_key() {
        let line = form_line("API Key", "sk-123", true, true);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "> API Key: ******");
    }

    #[test]
    fn short_date_drops_year() {
        assert_eq!(short_date(&DateKey::from("2024-01-15")), "01-15");
        assert_eq!(short_date(&DateKey::from("2024")), "2024");
    }

    #[test]
    fn status_reflects_latest_view() {
        use crate::charts::BillingCharts;
        use crate::models::BillingUsage;

        assert_eq!(view_status(None), "ok");
        let mut colors = ColorAssigner::default();
        let charts = BillingCharts::build(
            DateKey::from("2024-02"),
            &BillingUsage::default(),
            &mut colors,
        );
        assert_eq!(
            view_status(Some(&RenderedView::Billing(charts))),
            "no billing for 2024/02"
        );
    }
}
