use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use tradedash_core::routes::{GateDecision, Route};
use tradedash_core::theme;

use crate::app::{App, AppState, LoginFocus};

use super::pages;
use super::styles;

const LOGO: [&str; 3] = [
    "   ╔╦╗╦═╗╔═╗╔╦╗╔═╗╔╦╗╔═╗╔═╗╦ ╦",
    "    ║ ╠╦╝╠═╣ ║║║╣  ║║╠═╣╚═╗╠═╣",
    "    ╩ ╩╚═╩ ╩═╩╝╚═╝═╩╝╩ ╩╚═╝╩ ╩",
];

pub fn render(frame: &mut Frame, app: &App) {
    frame.render_widget(Block::default().style(styles::background_style()), frame.area());

    match (&app.decision, app.nav.current()) {
        (GateDecision::Loading, _) => render_loading(frame, app),
        (_, Route::Login) => render_login(frame, app),
        _ => render_protected(frame, app),
    }

    render_notices(frame, app);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::EnteringPath => render_path_prompt(frame, app),
        AppState::ConfirmingLogout => render_confirm_overlay(frame, "Sign out of tradedash?", "to sign out"),
        AppState::ConfirmingQuit => render_confirm_overlay(frame, "Are you sure you want to quit?", "to quit"),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_loading(frame: &mut Frame, app: &App) {
    let mut area = centered_rect_fixed(30, 3, frame.area());
    area.y = area
        .y
        .saturating_sub(styles::lift_rows(&theme::BOUNCE_SUBTLE, app.started_at.elapsed()));
    let spinner = theme::spinner_frame(app.started_at.elapsed());
    let line = Line::from(vec![
        Span::styled(format!("  {} ", spinner), styles::title_style()),
        Span::styled("Loading session...", styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_protected(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Length(2), // Page tabs
            Constraint::Min(6),    // Page content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_page(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  tradedash";
    let user = match app.display_name() {
        Some(name) => format!("{}  [?] Help ", name),
        None => "[?] Help ".to_string(),
    };
    let padding = (area.width as usize).saturating_sub(title.len() + user.chars().count());

    let line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(user, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let current = app.nav.current();
    let mut spans = vec![Span::raw(" ")];
    for (i, page) in Route::PAGES.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, page.title());
        spans.push(Span::styled(label, styles::tab_style(page == current)));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_page(frame: &mut Frame, app: &App, area: Rect) {
    match app.nav.current() {
        Route::Dashboard | Route::Root => pages::render_dashboard(frame, app, area),
        Route::Trading => pages::render_trading(frame, app, area),
        Route::Analytics => pages::render_analytics(frame, app, area),
        Route::Profile => pages::render_profile(frame, app, area),
        Route::Settings => pages::render_settings(frame, app, area),
        Route::NotFound(_) => pages::render_not_found(frame, app, area),
        Route::Login => {}
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left = format!(" {} ", app.nav.current().path());
    let right = if app.session.is_loading {
        format!(" {} working... | [q]uit ", theme::spinner_frame(app.started_at.elapsed()))
    } else {
        " [g]o | [r]efresh | [l]ogout | [q]uit ".to_string()
    };

    let width = area.width as usize;
    let padding = width
        .saturating_sub(left.chars().count())
        .saturating_sub(right.chars().count());
    let line = Line::from(vec![
        Span::styled(left, styles::muted_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(line).style(styles::status_bar_style()), area);
}

fn render_login(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 14 } else { 12 };
    let area = centered_rect_fixed(46, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines: Vec<Line> = LOGO
        .iter()
        .map(|row| Line::from(Span::styled(format!("   {}", row), styles::title_style())))
        .collect();
    lines.push(Line::from(""));

    // Username field
    let username_focused = app.login_focus == LoginFocus::Username;
    let username_style = if username_focused {
        styles::selected_style()
    } else {
        styles::text_style()
    };
    let username_display = format!("{:<16}", truncate_left(&app.login_username, 16));
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(format!("{}{}", username_display, cursor), username_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Password field
    let password_focused = app.login_focus == LoginFocus::Password;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::text_style()
    };
    let password_masked = "*".repeat(app.login_password.chars().count().min(16));
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{:<16}{}", password_masked, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Login button
    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::text_style()
    };
    let label = match (app.login_in_flight, button_focused) {
        (true, _) => format!(" {} Signing in ", theme::spinner_frame(app.started_at.elapsed())),
        (false, true) => " ▶ Login ◀ ".to_string(),
        (false, false) => "   Login   ".to_string(),
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(styles::card_style());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Keep the tail of `s` so the cursor end stays visible.
fn truncate_left(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}

fn render_notices(frame: &mut Frame, app: &App) {
    let screen = frame.area();
    let width = 40.min(screen.width);
    let mut y = screen.y + 1;

    // Newest on top
    for shown in app.notices.iter().rev() {
        if y + 3 > screen.bottom() {
            break;
        }
        let area = Rect::new(screen.right().saturating_sub(width + 1), y, width, 3);
        let elapsed = shown.shown_at.elapsed();
        let icon = if shown.notice.is_error() { "✗" } else { "✓" };

        frame.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(styles::notice_border_style(shown.notice.level, elapsed))
            .style(styles::card_style());
        let line = Line::from(Span::styled(
            format!(" {} {}", icon, shown.notice.message),
            styles::notice_style(shown.notice.level, elapsed),
        ));
        frame.render_widget(Paragraph::new(line).block(block), area);
        y += 3;
    }
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 20, frame.area());
    frame.render_widget(Clear, area);

    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let mut help_text: Vec<Line> = LOGO
        .iter()
        .map(|row| Line::from(Span::styled(format!("   {}", row), styles::title_style())))
        .collect();
    help_text.extend([
        Line::from(Span::styled(
            format!("              version {}", env!("CARGO_PKG_VERSION")),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        key("1-5", "Switch page"),
        key("←/→ Tab", "Prev/next page"),
        key("g", "Go to path"),
        key("Esc", "Go back"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        key("r", "Refresh page data"),
        key("l", "Log out"),
        key("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(styles::card_style());
    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_path_prompt(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(46, 5, frame.area());
    frame.render_widget(Clear, area);

    let input = truncate_left(&app.path_input, 38);
    let lines = vec![
        Line::from(vec![
            Span::styled(format!(" {}", input), styles::text_style()),
            Span::styled("_", styles::highlight_style()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(" [Enter]", styles::help_key_style()),
            Span::styled(" open  ", styles::muted_style()),
            Span::styled("[Esc]", styles::help_key_style()),
            Span::styled(" cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(Span::styled(" Go to path ", styles::title_style()))
        .style(styles::card_style());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirm_overlay(frame: &mut Frame, question: &str, action: &str) {
    let area = centered_rect_fixed(46, 9, frame.area());
    frame.render_widget(Clear, area);

    let mut lines: Vec<Line> = LOGO
        .iter()
        .map(|row| Line::from(Span::styled(format!("   {}", row), styles::title_style())))
        .collect();
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(format!("   {}", question), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(format!(" {}, ", action), styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(styles::card_style());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
