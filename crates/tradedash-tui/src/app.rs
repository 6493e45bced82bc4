//! Application state management for the tradedash terminal front end.
//!
//! `App` owns the session controller and its attachments (retry interceptor,
//! refresh scheduler), the navigation history, the login form and the notice
//! queue. Network work runs on background tasks; results come back through
//! an mpsc channel and the session controller's watch/broadcast channels and
//! are folded into `App` by `update()` once per frame.

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use tradedash_core::api::{ApiClient, ApiError, AuthApi};
use tradedash_core::auth::{
    AttachedInterceptor, FileTokenStore, KeyringTokenStore, MemoryTokenStore, RefreshScheduler,
    Session, SessionController, TokenStore,
};
use tradedash_core::config::{Config, TokenStorage};
use tradedash_core::models::LoginCredentials;
use tradedash_core::notice::{Notice, NOTICE_DURATION};
use tradedash_core::query::CachedData;
use tradedash_core::routes::{GateDecision, Navigator, Route};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for a typed navigation path.
const MAX_PATH_LENGTH: usize = 128;

/// At most this many notices are on screen at once; older ones are dropped.
const MAX_VISIBLE_NOTICES: usize = 3;

const USERNAME_ENV: &str = "TRADEDASH_USERNAME";
const PASSWORD_ENV: &str = "TRADEDASH_PASSWORD";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    EnteringPath,
    ConfirmingLogout,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Backend data shown by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageQuery {
    Health,
    ExchangeStatus,
}

impl PageQuery {
    pub fn for_route(route: &Route) -> Option<Self> {
        match route {
            Route::Dashboard => Some(PageQuery::Health),
            Route::Trading => Some(PageQuery::ExchangeStatus),
            _ => None,
        }
    }

    /// Query cache key
    pub fn key(self) -> &'static str {
        match self {
            PageQuery::Health => "health",
            PageQuery::ExchangeStatus => "exchange_status",
        }
    }

    async fn fetch(self, api: &ApiClient) -> Result<Value, ApiError> {
        match self {
            PageQuery::Health => api.fetch_health().await,
            PageQuery::ExchangeStatus => api.fetch_exchange_status().await,
        }
    }
}

/// A notice on screen, stamped with when it appeared.
#[derive(Debug, Clone)]
pub struct ShownNotice {
    pub notice: Notice,
    pub shown_at: Instant,
}

// ============================================================================
// Background Task Results
// ============================================================================

enum TaskResult {
    /// `epoch` is the session generation the fetch was started under
    Page {
        query: PageQuery,
        epoch: u64,
        outcome: Result<Value, String>,
    },
    LoginFinished { username: String, ok: bool },
}

// ============================================================================
// Token storage
// ============================================================================

/// Open the token store the config asks for. `ephemeral` keeps tokens in
/// memory only, for sessions that should leave nothing behind.
pub fn open_token_store(config: &Config, ephemeral: bool) -> Result<Arc<dyn TokenStore>> {
    if ephemeral {
        debug!("Using in-memory token store");
        return Ok(Arc::new(MemoryTokenStore::new()));
    }
    match config.token_storage {
        TokenStorage::File => {
            let cache_dir = config.cache_dir()?;
            std::fs::create_dir_all(&cache_dir)
                .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
            Ok(Arc::new(FileTokenStore::new(cache_dir)))
        }
        TokenStorage::Keyring => Ok(Arc::new(KeyringTokenStore::default())),
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub api: ApiClient,
    controller: Arc<SessionController>,
    _interceptor: AttachedInterceptor,
    _scheduler: RefreshScheduler,
    session_rx: watch::Receiver<Session>,
    notice_rx: broadcast::Receiver<Notice>,

    // Session and routing
    pub session: Session,
    pub nav: Navigator,
    pub decision: GateDecision,

    // UI State
    pub state: AppState,
    pub started_at: Instant,
    shown_route: Route,
    shown_since: Instant,
    pub notices: Vec<ShownNotice>,
    pub path_input: String,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub login_in_flight: bool,

    // Page data
    seen_epoch: u64,
    pending_queries: HashSet<PageQuery>,
    pub page_errors: Vec<(PageQuery, String)>,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,
}

impl App {
    /// Build the app and start restoring the session in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        let api = ApiClient::from_config(&config).context("Failed to build API client")?;
        let controller = Arc::new(SessionController::new(Arc::new(api.clone()), store));
        let interceptor = controller.attach(&api);
        let scheduler = RefreshScheduler::spawn(&controller, config.refresh_interval());

        let session_rx = controller.subscribe();
        let notice_rx = controller.subscribe_notices();
        let session = session_rx.borrow().clone();
        let seen_epoch = controller.epoch();

        tokio::spawn({
            let controller = controller.clone();
            async move { controller.initialize().await }
        });

        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_username = std::env::var(USERNAME_ENV)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();
        let login_password = std::env::var(PASSWORD_ENV).unwrap_or_default();

        Ok(Self {
            config,
            api,
            controller,
            _interceptor: interceptor,
            _scheduler: scheduler,
            session_rx,
            notice_rx,

            session,
            nav: Navigator::default(),
            decision: GateDecision::Loading,

            state: AppState::Normal,
            started_at: Instant::now(),
            shown_route: Route::Root,
            shown_since: Instant::now(),
            notices: Vec::new(),
            path_input: String::new(),

            login_username,
            login_password,
            login_focus: LoginFocus::Username,
            login_error: None,
            login_in_flight: false,

            seen_epoch,
            pending_queries: HashSet::new(),
            page_errors: Vec::new(),

            task_rx,
            task_tx,
        })
    }

    // =========================================================================
    // Per-frame update
    // =========================================================================

    /// Fold in everything that happened since the last frame: session changes,
    /// notices, finished background tasks. Then settle the current route.
    pub fn update(&mut self) {
        if self.session_rx.has_changed().unwrap_or(false) {
            self.session = self.session_rx.borrow_and_update().clone();
        }

        loop {
            match self.notice_rx.try_recv() {
                Ok(notice) => self.push_notice(notice),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Notice receiver lagged");
                }
                Err(_) => break,
            }
        }
        self.notices
            .retain(|shown| shown.shown_at.elapsed() < NOTICE_DURATION);

        // Page state belongs to one sign-in; a clear starts a new generation
        let epoch = self.controller.epoch();
        if epoch != self.seen_epoch {
            debug!(epoch, "Session generation changed, dropping page state");
            self.seen_epoch = epoch;
            self.pending_queries.clear();
            self.page_errors.clear();
        }

        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }

        let before = self.nav.current().clone();
        self.decision = self.nav.resolve(&self.session);
        let after = self.nav.current().clone();
        if before != after && after == Route::Login {
            self.start_login();
        }
        if !self.session.is_authenticated {
            self.pending_queries.clear();
            self.page_errors.clear();
        }

        if self.decision == GateDecision::Render {
            if after != self.shown_route {
                self.shown_route = after;
                self.shown_since = Instant::now();
            }
            self.ensure_page_data();
        }
    }

    /// Time since the current page was first rendered
    pub fn route_elapsed(&self) -> std::time::Duration {
        self.shown_since.elapsed()
    }

    fn push_notice(&mut self, notice: Notice) {
        debug!(level = ?notice.level, message = %notice.message, "Notice");
        self.notices.push(ShownNotice {
            notice,
            shown_at: Instant::now(),
        });
        if self.notices.len() > MAX_VISIBLE_NOTICES {
            let excess = self.notices.len() - MAX_VISIBLE_NOTICES;
            self.notices.drain(..excess);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Page {
                query,
                epoch,
                outcome,
            } => {
                if epoch != self.controller.epoch() {
                    // Fetched for a session that has since ended
                    debug!(key = query.key(), epoch, "Dropping page data from an earlier session");
                    return;
                }
                self.pending_queries.remove(&query);
                if !self.session.is_authenticated {
                    return;
                }
                match outcome {
                    Ok(value) => {
                        if let Err(e) = self.controller.query_cache().put(query.key(), &value) {
                            warn!(error = %e, key = query.key(), "Failed to cache page data");
                        }
                        self.page_errors.retain(|(q, _)| *q != query);
                    }
                    Err(message) => {
                        self.page_errors.retain(|(q, _)| *q != query);
                        self.page_errors.push((query, message));
                    }
                }
            }
            TaskResult::LoginFinished { username, ok } => {
                self.login_in_flight = false;
                if ok {
                    self.login_password.clear();
                    self.config.last_username = Some(username);
                    if let Err(e) = self.config.save() {
                        warn!(error = %e, "Failed to save config");
                    }
                }
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Show the login form with focus on the first empty field
    pub fn start_login(&mut self) {
        self.state = AppState::Normal;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Submit the login form. The outcome arrives as a notice.
    pub fn attempt_login(&mut self) {
        if self.login_in_flight {
            return;
        }
        let username = self.login_username.trim().to_string();
        if username.is_empty() || self.login_password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return;
        }
        self.login_error = None;
        self.login_in_flight = true;

        let credentials = LoginCredentials::new(username.clone(), self.login_password.clone());
        let controller = self.controller.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let ok = controller.login(&credentials).await.is_ok();
            let _ = tx.send(TaskResult::LoginFinished { username, ok }).await;
        });
    }

    pub fn logout(&mut self) {
        self.state = AppState::Normal;
        let controller = self.controller.clone();
        tokio::spawn(async move { controller.logout().await });
    }

    pub fn display_name(&self) -> Option<&str> {
        self.session.display_name()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn go_to(&mut self, route: Route) {
        self.nav.navigate(route);
    }

    /// Open `path` in place of the startup route, before the first frame.
    pub fn open_start_path(&mut self, path: &str) {
        self.nav.replace(Route::parse(path));
    }

    pub fn start_path_entry(&mut self) {
        self.path_input = "/".to_string();
        self.state = AppState::EnteringPath;
    }

    /// Navigate to the typed path. Unknown paths land on the not-found page.
    pub fn submit_path(&mut self) {
        self.state = AppState::Normal;
        let path = std::mem::take(&mut self.path_input);
        if path.trim().is_empty() {
            return;
        }
        self.nav.navigate_path(&path);
    }

    pub fn go_back(&mut self) {
        if !self.nav.back() {
            self.nav.replace(Route::Dashboard);
        }
    }

    pub fn next_page(&mut self) {
        let next = adjacent_page(self.nav.current(), 1);
        self.go_to(next);
    }

    pub fn prev_page(&mut self) {
        let prev = adjacent_page(self.nav.current(), Route::PAGES.len() - 1);
        self.go_to(prev);
    }

    // =========================================================================
    // Page data
    // =========================================================================

    /// Cached data for `query`, fresh or stale
    pub fn page_data(&self, query: PageQuery) -> Option<CachedData<Value>> {
        self.controller.query_cache().get(query.key())
    }

    pub fn page_error(&self, query: PageQuery) -> Option<&str> {
        self.page_errors
            .iter()
            .find(|(q, _)| *q == query)
            .map(|(_, message)| message.as_str())
    }

    pub fn is_fetching(&self, query: PageQuery) -> bool {
        self.pending_queries.contains(&query)
    }

    /// Refetch the current page's data, ignoring the cache
    pub fn refresh_current_page(&mut self) {
        if let Some(query) = PageQuery::for_route(self.nav.current()) {
            self.controller.query_cache().invalidate(query.key());
            self.page_errors.retain(|(q, _)| *q != query);
            self.spawn_fetch(query);
        }
    }

    fn ensure_page_data(&mut self) {
        let Some(query) = PageQuery::for_route(self.nav.current()) else {
            return;
        };
        if self.pending_queries.contains(&query) || self.page_error(query).is_some() {
            return;
        }
        if self
            .controller
            .query_cache()
            .get_fresh::<Value>(query.key())
            .is_some()
        {
            return;
        }
        self.spawn_fetch(query);
    }

    fn spawn_fetch(&mut self, query: PageQuery) {
        if !self.pending_queries.insert(query) {
            return;
        }
        debug!(key = query.key(), "Fetching page data");
        let api = self.api.clone();
        let tx = self.task_tx.clone();
        let epoch = self.seen_epoch;
        tokio::spawn(async move {
            let outcome = query.fetch(&api).await.map_err(|e| match e.detail() {
                Some(detail) => detail.to_string(),
                None => e.to_string(),
            });
            let _ = tx
                .send(TaskResult::Page {
                    query,
                    epoch,
                    outcome,
                })
                .await;
        });
    }
}

fn adjacent_page(current: &Route, step: usize) -> Route {
    let pages = Route::PAGES;
    let index = pages.iter().position(|p| p == current).unwrap_or(0);
    pages[(index + step) % pages.len()].clone()
}

// ============================================================================
// Command-line login
// ============================================================================

/// Sign in from the command line, storing the token pair for the next run.
pub async fn login_interactive(mut config: Config, store: Arc<dyn TokenStore>) -> Result<()> {
    println!("\n=== Tradedash Login ===\n");

    let default_username = std::env::var(USERNAME_ENV)
        .ok()
        .or_else(|| config.last_username.clone());
    let username = prompt_username(default_username.as_deref())?;
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    println!("\nAuthenticating against {}...", config.api_base_url);

    let api = ApiClient::from_config(&config)?;
    let controller = SessionController::new(Arc::new(api), store);
    match controller
        .login(&LoginCredentials::new(username.clone(), password))
        .await
    {
        Ok(()) => {
            config.last_username = Some(username);
            config.save()?;
            let name = controller.session().display_name().map(str::to_string);
            println!("Login successful! Signed in as {}\n", name.as_deref().unwrap_or("unknown"));
            info!("Command-line login successful");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e.user_message("Login failed"))),
    }
}

/// Sign out from the command line and remove the stored tokens.
pub async fn logout_command(config: &Config, store: Arc<dyn TokenStore>) -> Result<()> {
    let api = ApiClient::from_config(config)?;
    if let Some(token) = store.access_token()? {
        api.set_auth_token(&token);
    }
    let controller = SessionController::new(Arc::new(api), store);
    controller.logout().await;
    println!("Logged out successfully");
    Ok(())
}

fn prompt_username(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), default) {
        (true, Some(last)) => Ok(last.to_string()),
        _ => Ok(input.to_string()),
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a path character should be accepted
pub fn can_add_path_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PATH_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

// ============================================================================
// Tests
// ============================================================================
