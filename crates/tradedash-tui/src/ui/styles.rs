//! Styles derived from the design-system tokens in `tradedash_core::theme`.

use std::time::Duration;

use ratatui::style::{Color, Modifier, Style};
use tradedash_core::notice::NoticeLevel;
use tradedash_core::theme::{
    self, Animation, Rgb, Scale, BLUE, CARD_BORDER, CARD_DARK, CARD_DARKER, DARK, GREEN, RED,
};

pub const fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn shade<const N: usize>(scale: &Scale<N>, step: u16) -> Color {
    scale.shade(step).map(color).unwrap_or(Color::Reset)
}

/// Mix `from` toward `to` by `t` (0.0 keeps `from`).
fn mix(from: Rgb, to: Rgb, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let channel = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color::Rgb(
        channel(from.0, to.0),
        channel(from.1, to.1),
        channel(from.2, to.2),
    )
}

// Palette
pub fn primary() -> Color {
    shade(&BLUE, 500)
}

pub fn text() -> Color {
    shade(&DARK, 100)
}

pub fn muted() -> Color {
    shade(&DARK, 400)
}

pub fn profit() -> Color {
    shade(&GREEN, 500)
}

pub fn loss() -> Color {
    shade(&RED, 500)
}

// Styles
pub fn title_style() -> Style {
    Style::default().fg(primary()).add_modifier(Modifier::BOLD)
}

pub fn text_style() -> Style {
    Style::default().fg(text())
}

pub fn muted_style() -> Style {
    Style::default().fg(muted())
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(shade(&DARK, 700))
        .fg(shade(&DARK, 50))
        .add_modifier(Modifier::BOLD)
}

pub fn highlight_style() -> Style {
    Style::default().fg(shade(&BLUE, 400))
}

pub fn success_style() -> Style {
    Style::default().fg(profit())
}

pub fn error_style() -> Style {
    Style::default().fg(loss())
}

pub fn card_style() -> Style {
    Style::default().bg(color(CARD_DARK)).fg(text())
}

pub fn background_style() -> Style {
    Style::default().bg(color(CARD_DARKER))
}

pub fn tab_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(primary())
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        muted_style()
    }
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(primary())
    } else {
        Style::default().fg(color(CARD_BORDER))
    }
}

pub fn status_bar_style() -> Style {
    Style::default().bg(shade(&DARK, 900)).fg(text())
}

pub fn help_key_style() -> Style {
    Style::default()
        .fg(shade(&BLUE, 400))
        .add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    text_style()
}

/// Style for a status value: green when healthy, red when not.
pub fn status_style(healthy: bool) -> Style {
    if healthy {
        success_style()
    } else {
        error_style()
    }
}

// ============================================================================
// Animated styles
// ============================================================================

/// Text faded in over `animation`, blended up from the card background.
pub fn faded_style(base: Rgb, animation: &Animation, elapsed: Duration) -> Style {
    let frame = animation.sample(elapsed);
    Style::default().fg(mix(CARD_DARK, base, frame.opacity))
}

/// Notice text: slides in, then stays at full strength.
pub fn notice_style(level: NoticeLevel, elapsed: Duration) -> Style {
    let base = match level {
        NoticeLevel::Success => GREEN.shade(400),
        NoticeLevel::Error => RED.shade(400),
    }
    .unwrap_or(Rgb(255, 255, 255));
    faded_style(base, &theme::SLIDE_IN, elapsed).add_modifier(Modifier::BOLD)
}

/// Notice border: pulses in the notice's color.
pub fn notice_border_style(level: NoticeLevel, elapsed: Duration) -> Style {
    let pulse = match level {
        NoticeLevel::Success => &theme::PULSE_GREEN,
        NoticeLevel::Error => &theme::PULSE_RED,
    };
    let frame = pulse.sample(elapsed);
    let glow = pulse.color.unwrap_or(CARD_BORDER);
    // Keyframe alpha peaks at 0.4; scale to a full blend and keep a floor so
    // the border never disappears
    let strength = 0.35 + (frame.glow_alpha / 0.4) * 0.65;
    Style::default().fg(mix(CARD_BORDER, glow, strength))
}

/// Rows to lift a widget by at `elapsed`; 5px of `translate_y` is one row.
pub fn lift_rows(animation: &Animation, elapsed: Duration) -> u16 {
    let frame = animation.sample(elapsed);
    (-frame.translate_y / 5.0).round().max(0.0) as u16
}
