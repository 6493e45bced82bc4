//! Route table and the session gate in front of it.
//!
//! Every page except `/login` lives inside the protected area. Unknown paths
//! land on a not-found view, which is also protected.

use std::fmt;

use tracing::debug;

use crate::auth::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    /// `/`, which always redirects to the dashboard
    Root,
    Dashboard,
    Trading,
    Analytics,
    Profile,
    Settings,
    NotFound(String),
}

impl Route {
    /// Pages reachable from the navigation bar, in display order
    pub const PAGES: [Route; 5] = [
        Route::Dashboard,
        Route::Trading,
        Route::Analytics,
        Route::Profile,
        Route::Settings,
    ];

    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        match normalized {
            "/" => Route::Root,
            "/login" => Route::Login,
            "/dashboard" => Route::Dashboard,
            "/trading" => Route::Trading,
            "/analytics" => Route::Analytics,
            "/profile" => Route::Profile,
            "/settings" => Route::Settings,
            _ => Route::NotFound(trimmed.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Login => "/login",
            Route::Root => "/",
            Route::Dashboard => "/dashboard",
            Route::Trading => "/trading",
            Route::Analytics => "/analytics",
            Route::Profile => "/profile",
            Route::Settings => "/settings",
            Route::NotFound(path) => path,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Root | Route::Dashboard => "Dashboard",
            Route::Trading => "Trading",
            Route::Analytics => "Analytics",
            Route::Profile => "Profile",
            Route::Settings => "Settings",
            Route::NotFound(_) => "Not Found",
        }
    }

    pub fn gate(&self) -> Gate {
        match self {
            Route::Login => Gate::Public,
            _ => Gate::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Requires a signed-in session
    Protected,
    /// Only for signed-out users (the login page)
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Session state not known yet; show a loading indicator
    Loading,
    Redirect(Route),
    Render,
}

impl Gate {
    pub fn decide(self, session: &Session) -> GateDecision {
        if session.is_loading {
            return GateDecision::Loading;
        }
        match (self, session.is_authenticated) {
            (Gate::Protected, false) => GateDecision::Redirect(Route::Login),
            (Gate::Public, true) => GateDecision::Redirect(Route::Dashboard),
            _ => GateDecision::Render,
        }
    }
}

/// Navigation history with browser-like semantics.
///
/// Redirects replace the current entry instead of pushing, so going back
/// never lands on a page that would just redirect again.
#[derive(Debug, Clone)]
pub struct Navigator {
    history: Vec<Route>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Root)
    }
}

impl Navigator {
    pub fn new(start: Route) -> Self {
        Self {
            history: vec![start],
        }
    }

    pub fn current(&self) -> &Route {
        // history is never empty
        &self.history[self.history.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn navigate(&mut self, route: Route) {
        if *self.current() != route {
            debug!(from = %self.current(), to = %route, "Navigate");
            self.history.push(route);
        }
    }

    pub fn navigate_path(&mut self, path: &str) {
        self.navigate(Route::parse(path));
    }

    pub fn replace(&mut self, route: Route) {
        if let Some(last) = self.history.last_mut() {
            *last = route;
        }
    }

    /// Pop one entry. Returns false when already at the first entry.
    pub fn back(&mut self) -> bool {
        if self.history.len() > 1 {
            self.history.pop();
            true
        } else {
            false
        }
    }

    /// Follow redirects for the current route and return what to show.
    ///
    /// Returns `Loading` while the session is unresolved, otherwise `Render`
    /// with the current route settled on a renderable page.
    pub fn resolve(&mut self, session: &Session) -> GateDecision {
        // Root -> Dashboard -> Login is the longest chain
        for _ in 0..4 {
            if *self.current() == Route::Root {
                self.replace(Route::Dashboard);
                continue;
            }
            match self.current().gate().decide(session) {
                GateDecision::Redirect(target) => {
                    debug!(from = %self.current(), to = %target, "Redirect");
                    self.replace(target);
                }
                decision => return decision,
            }
        }
        GateDecision::Render
    }
}
