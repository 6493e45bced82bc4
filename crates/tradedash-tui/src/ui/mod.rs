//! Terminal UI module using ratatui.
//!
//! This module provides the TUI rendering and input handling:
//!
//! - `render`: Main frame rendering, layout and overlays
//! - `input`: Keyboard event handling
//! - `styles`: Styles derived from the design-system tokens
//! - `pages`: Page-specific content rendering (dashboard, trading, etc.)

pub mod input;
pub mod pages;
pub mod render;
pub mod styles;
