//! Design-system tokens: color scales, card surfaces and animations.
//!
//! Front ends convert these into their own style types; nothing here depends
//! on a rendering library.

use std::fmt;
use std::time::Duration;

/// 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(value: u32) -> Self {
        Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Shade steps shared by every scale. `dark` additionally has 950.
const SHADES: [u16; 11] = [50, 100, 200, 300, 400, 500, 600, 700, 800, 900, 950];

/// A color scale addressed by tailwind-style shade numbers.
#[derive(Debug, Clone, Copy)]
pub struct Scale<const N: usize>([Rgb; N]);

impl<const N: usize> Scale<N> {
    /// Color for `shade` (50, 100, ... 900, and 950 where present)
    pub fn shade(&self, shade: u16) -> Option<Rgb> {
        let index = SHADES.iter().position(|&s| s == shade)?;
        self.0.get(index).copied()
    }

    pub fn colors(&self) -> &[Rgb; N] {
        &self.0
    }
}

/// Slate scale used for backgrounds and text.
pub const DARK: Scale<11> = Scale([
    Rgb::hex(0xf8fafc),
    Rgb::hex(0xf1f5f9),
    Rgb::hex(0xe2e8f0),
    Rgb::hex(0xcbd5e1),
    Rgb::hex(0x94a3b8),
    Rgb::hex(0x64748b),
    Rgb::hex(0x475569),
    Rgb::hex(0x334155),
    Rgb::hex(0x1e293b),
    Rgb::hex(0x0f172a),
    Rgb::hex(0x020617),
]);

/// Profit, success.
pub const GREEN: Scale<10> = Scale([
    Rgb::hex(0xf0fdf4),
    Rgb::hex(0xdcfce7),
    Rgb::hex(0xbbf7d0),
    Rgb::hex(0x86efac),
    Rgb::hex(0x4ade80),
    Rgb::hex(0x22c55e),
    Rgb::hex(0x16a34a),
    Rgb::hex(0x15803d),
    Rgb::hex(0x166534),
    Rgb::hex(0x14532d),
]);

/// Loss, errors.
pub const RED: Scale<10> = Scale([
    Rgb::hex(0xfef2f2),
    Rgb::hex(0xfee2e2),
    Rgb::hex(0xfecaca),
    Rgb::hex(0xfca5a5),
    Rgb::hex(0xf87171),
    Rgb::hex(0xef4444),
    Rgb::hex(0xdc2626),
    Rgb::hex(0xb91c1c),
    Rgb::hex(0x991b1b),
    Rgb::hex(0x7f1d1d),
]);

/// Informational accents and focus.
pub const BLUE: Scale<10> = Scale([
    Rgb::hex(0xeff6ff),
    Rgb::hex(0xdbeafe),
    Rgb::hex(0xbfdbfe),
    Rgb::hex(0x93c5fd),
    Rgb::hex(0x60a5fa),
    Rgb::hex(0x3b82f6),
    Rgb::hex(0x2563eb),
    Rgb::hex(0x1d4ed8),
    Rgb::hex(0x1e40af),
    Rgb::hex(0x1e3a8a),
]);

pub const CARD_DARK: Rgb = Rgb::hex(0x1a1a1a);
pub const CARD_DARKER: Rgb = Rgb::hex(0x121212);
pub const CARD_BORDER: Rgb = Rgb::hex(0x2a2a2a);

// ============================================================================
// Animations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    Infinite,
}

/// Animated properties at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub opacity: f32,
    /// Vertical offset in pixels, negative is up
    pub translate_y: f32,
    /// Outer glow spread in pixels
    pub glow_spread: f32,
    /// Outer glow alpha, 0.0 to 1.0
    pub glow_alpha: f32,
}

impl Frame {
    pub const REST: Frame = Frame {
        opacity: 1.0,
        translate_y: 0.0,
        glow_spread: 0.0,
        glow_alpha: 0.0,
    };

    const fn opacity(opacity: f32) -> Self {
        Frame { opacity, ..Frame::REST }
    }

    const fn glow(glow_spread: f32, glow_alpha: f32) -> Self {
        Frame {
            glow_spread,
            glow_alpha,
            ..Frame::REST
        }
    }

    const fn lift(translate_y: f32, opacity: f32) -> Self {
        Frame {
            translate_y,
            opacity,
            ..Frame::REST
        }
    }

    fn lerp(&self, to: &Frame, t: f32) -> Frame {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Frame {
            opacity: mix(self.opacity, to.opacity),
            translate_y: mix(self.translate_y, to.translate_y),
            glow_spread: mix(self.glow_spread, to.glow_spread),
            glow_alpha: mix(self.glow_alpha, to.glow_alpha),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Animation {
    pub name: &'static str,
    pub duration: Duration,
    pub repeat: Repeat,
    /// Offsets in 0.0..=1.0, ascending, first at 0.0 and last at 1.0
    pub keyframes: &'static [(f32, Frame)],
    /// Glow color, for animations that have one
    pub color: Option<Rgb>,
}

impl Animation {
    /// Interpolated frame `elapsed` after the animation started.
    ///
    /// Interpolation is linear between keyframes. A finished `Once`
    /// animation holds its last frame.
    pub fn sample(&self, elapsed: Duration) -> Frame {
        let Some(&(_, first)) = self.keyframes.first() else {
            return Frame::REST;
        };
        let total = self.duration.as_secs_f32();
        if total <= 0.0 {
            return self.keyframes.last().map(|&(_, f)| f).unwrap_or(first);
        }

        let raw = elapsed.as_secs_f32() / total;
        let progress = match self.repeat {
            Repeat::Once => raw.min(1.0),
            Repeat::Infinite => raw.fract(),
        };

        for pair in self.keyframes.windows(2) {
            let (start, from) = pair[0];
            let (end, to) = pair[1];
            if progress <= end {
                let span = end - start;
                let t = if span > 0.0 { (progress - start) / span } else { 1.0 };
                return from.lerp(&to, t.clamp(0.0, 1.0));
            }
        }
        self.keyframes.last().map(|&(_, f)| f).unwrap_or(first)
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        self.repeat == Repeat::Once && elapsed >= self.duration
    }
}

pub const FADE_IN: Animation = Animation {
    name: "fade-in",
    duration: Duration::from_millis(500),
    repeat: Repeat::Once,
    keyframes: &[(0.0, Frame::opacity(0.0)), (1.0, Frame::opacity(1.0))],
    color: None,
};

pub const SLIDE_IN: Animation = Animation {
    name: "slide-in",
    duration: Duration::from_millis(300),
    repeat: Repeat::Once,
    keyframes: &[(0.0, Frame::lift(-10.0, 0.0)), (1.0, Frame::lift(0.0, 1.0))],
    color: None,
};

const PULSE: &[(f32, Frame)] = &[
    (0.0, Frame::glow(0.0, 0.4)),
    (0.5, Frame::glow(8.0, 0.0)),
    (1.0, Frame::glow(0.0, 0.4)),
];

pub const PULSE_GREEN: Animation = Animation {
    name: "pulse-green",
    duration: Duration::from_secs(2),
    repeat: Repeat::Infinite,
    keyframes: PULSE,
    color: Some(Rgb(34, 197, 94)),
};

pub const PULSE_RED: Animation = Animation {
    name: "pulse-red",
    duration: Duration::from_secs(2),
    repeat: Repeat::Infinite,
    keyframes: PULSE,
    color: Some(Rgb(239, 68, 68)),
};

pub const BOUNCE_SUBTLE: Animation = Animation {
    name: "bounce-subtle",
    duration: Duration::from_secs(1),
    repeat: Repeat::Once,
    keyframes: &[
        (0.0, Frame::lift(0.0, 1.0)),
        (0.5, Frame::lift(-5.0, 1.0)),
        (1.0, Frame::lift(0.0, 1.0)),
    ],
    color: None,
};

/// Loading indicator frames, one per tick.
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(80);

pub fn spinner_frame(elapsed: Duration) -> &'static str {
    let tick = elapsed.as_millis() / SPINNER_INTERVAL.as_millis();
    SPINNER_FRAMES[(tick % SPINNER_FRAMES.len() as u128) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    // -------------------------------------------------------------------------
    // Colors
    // -------------------------------------------------------------------------

    #[test]
    fn test_primary_trading_colors() {
        assert_eq!(GREEN.shade(500), Some(Rgb(34, 197, 94)));
        assert_eq!(RED.shade(500), Some(Rgb(239, 68, 68)));
        assert_eq!(BLUE.shade(500).unwrap().to_string(), "#3b82f6");
    }

    #[test]
    fn test_dark_scale_has_950() {
        assert_eq!(DARK.shade(950).unwrap().to_string(), "#020617");
        assert_eq!(DARK.shade(50).unwrap().to_string(), "#f8fafc");
        assert_eq!(GREEN.shade(950), None);
        assert_eq!(GREEN.shade(900).unwrap().to_string(), "#14532d");
        assert_eq!(RED.shade(55), None);
    }

    #[test]
    fn test_card_tokens() {
        assert_eq!(CARD_DARK.to_string(), "#1a1a1a");
        assert_eq!(CARD_DARKER.to_string(), "#121212");
        assert_eq!(CARD_BORDER.to_string(), "#2a2a2a");
    }

    // -------------------------------------------------------------------------
    // Animations
    // -------------------------------------------------------------------------

    #[test]
    fn test_fade_in_interpolates_and_holds() {
        assert!(close(FADE_IN.sample(Duration::ZERO).opacity, 0.0));
        assert!(close(FADE_IN.sample(Duration::from_millis(250)).opacity, 0.5));
        assert!(close(FADE_IN.sample(Duration::from_secs(5)).opacity, 1.0));
        assert!(FADE_IN.is_finished(Duration::from_millis(500)));
    }

    #[test]
    fn test_slide_in_starts_above() {
        let start = SLIDE_IN.sample(Duration::ZERO);
        assert!(close(start.translate_y, -10.0));
        assert!(close(start.opacity, 0.0));
        assert_eq!(SLIDE_IN.sample(Duration::from_millis(300)), Frame::REST);
    }

    #[test]
    fn test_pulse_repeats() {
        let peak = PULSE_GREEN.sample(Duration::from_secs(1));
        assert!(close(peak.glow_spread, 8.0));
        assert!(close(peak.glow_alpha, 0.0));

        let again = PULSE_GREEN.sample(Duration::from_secs(3));
        assert!(close(again.glow_spread, 8.0));
        assert!(!PULSE_RED.is_finished(Duration::from_secs(60)));
        assert_eq!(PULSE_RED.color, Some(Rgb(239, 68, 68)));
    }

    #[test]
    fn test_bounce_subtle_midpoint() {
        let mid = BOUNCE_SUBTLE.sample(Duration::from_millis(500));
        assert!(close(mid.translate_y, -5.0));
        let end = BOUNCE_SUBTLE.sample(Duration::from_secs(1));
        assert!(close(end.translate_y, 0.0));
    }

    #[test]
    fn test_spinner_cycles() {
        assert_eq!(spinner_frame(Duration::ZERO), "⠋");
        assert_eq!(spinner_frame(Duration::from_millis(80)), "⠙");
        assert_eq!(spinner_frame(Duration::from_millis(800)), "⠋");
    }
}
