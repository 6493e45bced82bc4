//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use tradedash_core::routes::{GateDecision, Route};

use crate::app::{
    can_add_password_char, can_add_path_char, can_add_username_char, App, AppState, LoginFocus,
};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return Ok(false);
    }

    if matches!(app.state, AppState::EnteringPath) {
        handle_path_input(app, key);
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    // Handle logout confirmation
    if matches!(app.state, AppState::ConfirmingLogout) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.logout(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    // Nothing to interact with until the session is known
    if app.decision == GateDecision::Loading {
        if key.code == KeyCode::Char('q') {
            app.state = AppState::ConfirmingQuit;
        }
        return Ok(false);
    }

    if *app.nav.current() == Route::Login {
        return handle_login_input(app, key);
    }

    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('l') => app.state = AppState::ConfirmingLogout,
        KeyCode::Char('g') => app.start_path_entry(),
        KeyCode::Char('r') => app.refresh_current_page(),
        KeyCode::Char(c @ '1'..='5') => {
            let index = c as usize - '1' as usize;
            if let Some(page) = Route::PAGES.get(index) {
                app.go_to(page.clone());
            }
        }
        KeyCode::Right | KeyCode::Tab => app.next_page(),
        KeyCode::Left | KeyCode::BackTab => app.prev_page(),
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),
        _ => {}
    }

    Ok(false)
}

fn handle_path_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.path_input.clear();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => app.submit_path(),
        KeyCode::Backspace => {
            app.path_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_path_char(app.path_input.chars().count(), c) {
                app.path_input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => app.login_focus = LoginFocus::Password,
            // Submitting from the password field saves a keystroke
            LoginFocus::Password | LoginFocus::Button => app.attempt_login(),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}
