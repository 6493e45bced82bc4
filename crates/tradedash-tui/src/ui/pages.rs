//! Page content for the protected area.
//!
//! Dashboard and Trading show live backend data; the remaining pages are
//! placeholders for features served elsewhere.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

use tradedash_core::theme::{self, DARK};

use crate::app::{App, PageQuery};

use super::styles;

/// Values that read as "everything is fine"
const HEALTHY_VALUES: [&str; 5] = ["healthy", "ok", "connected", "online", "up"];

fn card(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false))
        .title(Span::styled(format!(" {} ", title), styles::title_style()))
        .style(styles::card_style())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn is_healthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let lower = s.to_lowercase();
            Some(HEALTHY_VALUES.contains(&lower.as_str()))
        }
        _ => None,
    }
}

/// One line per top-level field; status-like values are colored.
fn json_lines(value: &Value) -> Vec<Line<'static>> {
    let Value::Object(fields) = value else {
        return vec![Line::from(Span::styled(value_text(value), styles::text_style()))];
    };
    let width = fields.keys().map(|k| k.len()).max().unwrap_or(0);
    fields
        .iter()
        .map(|(key, value)| {
            let style = match (key.as_str(), is_healthy(value)) {
                ("status" | "connected" | "healthy", Some(ok)) => styles::status_style(ok),
                _ => styles::text_style(),
            };
            Line::from(vec![
                Span::styled(format!("  {:<width$}  ", key, width = width), styles::muted_style()),
                Span::styled(value_text(value), style),
            ])
        })
        .collect()
}

/// Render backend data for `query` with its fetch state.
fn render_query(frame: &mut Frame, app: &App, area: Rect, title: &str, query: PageQuery) {
    let cached = app.page_data(query);
    let mut lines = Vec::new();

    match (&cached, app.page_error(query)) {
        (_, Some(error)) => {
            lines.push(Line::from(Span::styled(
                format!("  Failed to load: {}", error),
                styles::error_style(),
            )));
            lines.push(Line::from(Span::styled(
                "  Press [r] to retry",
                styles::muted_style(),
            )));
        }
        (Some(cached), None) => lines.extend(json_lines(&cached.data)),
        (None, None) => lines.push(Line::from(Span::styled(
            format!(
                "  {} Loading...",
                theme::spinner_frame(app.started_at.elapsed())
            ),
            styles::muted_style(),
        ))),
    }

    let footer = match (&cached, app.is_fetching(query)) {
        (_, true) if cached.is_some() => "refreshing...".to_string(),
        (Some(cached), false) => format!("updated {}", cached.age_display()),
        _ => String::new(),
    };

    let block = card(title).title_bottom(Span::styled(format!(" {} ", footer), styles::muted_style()));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    let greeting = match app.display_name() {
        Some(name) => format!("  Welcome back, {}", name),
        None => "  Welcome back".to_string(),
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(greeting, styles::text_style()))).block(card("Overview")),
        chunks[0],
    );
    render_query(frame, app, chunks[1], "Backend Health", PageQuery::Health);
}

pub fn render_trading(frame: &mut Frame, app: &App, area: Rect) {
    render_query(frame, app, area, "Exchange Status", PageQuery::ExchangeStatus);
}

pub fn render_analytics(frame: &mut Frame, _app: &App, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Performance analytics will appear here.",
            styles::muted_style(),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).block(card("Analytics")), area);
}

pub fn render_profile(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = match &app.session.user {
        Some(user) => {
            let width = user.fields().map(|(k, _)| k.len()).max().unwrap_or(0);
            user.fields()
                .map(|(key, value)| {
                    Line::from(vec![
                        Span::styled(
                            format!("  {:<width$}  ", key, width = width),
                            styles::muted_style(),
                        ),
                        Span::styled(value_text(value), styles::text_style()),
                    ])
                })
                .collect()
        }
        None => vec![Line::from(Span::styled("  No profile loaded", styles::muted_style()))],
    };
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(card("Profile")),
        area,
    );
}

pub fn render_settings(frame: &mut Frame, app: &App, area: Rect) {
    let config = &app.config;
    let storage = format!("{:?}", config.token_storage).to_lowercase();
    let rows = [
        ("API URL", config.api_base_url.clone()),
        ("Token storage", storage),
        (
            "Token refresh",
            format!("every {} min", config.refresh_interval().as_secs() / 60),
        ),
        ("Request timeout", format!("{}s", config.request_timeout_secs)),
        (
            "Last username",
            config.last_username.clone().unwrap_or_else(|| "-".to_string()),
        ),
    ];
    let lines: Vec<Line> = rows
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("  {:<16}", label), styles::muted_style()),
                Span::styled(value, styles::text_style()),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(card("Settings")), area);
}

pub fn render_not_found(frame: &mut Frame, app: &App, area: Rect) {
    let faded = styles::faded_style(
        DARK.shade(50).unwrap_or(theme::Rgb(255, 255, 255)),
        &theme::FADE_IN,
        app.route_elapsed(),
    );
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("  404", styles::error_style())),
        Line::from(Span::styled(
            format!("  Page not found: {}", app.nav.current().path()),
            faded,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Esc]", styles::help_key_style()),
            Span::styled(" to go back", styles::muted_style()),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).block(card("Not Found")), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_healthy() {
        assert_eq!(is_healthy(&json!("healthy")), Some(true));
        assert_eq!(is_healthy(&json!("OK")), Some(true));
        assert_eq!(is_healthy(&json!("degraded")), Some(false));
        assert_eq!(is_healthy(&json!(false)), Some(false));
        assert_eq!(is_healthy(&json!(3)), None);
    }

    #[test]
    fn test_json_lines_one_per_field() {
        let lines = json_lines(&json!({"status": "healthy", "version": "1.2.0", "uptime": 42}));
        assert_eq!(lines.len(), 3);
        let scalar = json_lines(&json!("plain"));
        assert_eq!(scalar.len(), 1);
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("x")), "x");
        assert_eq!(value_text(&json!(null)), "-");
        assert_eq!(value_text(&json!(1.5)), "1.5");
    }
}
