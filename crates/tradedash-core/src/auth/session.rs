use crate::models::User;

/// Snapshot of the authentication state, published to every observer.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub is_authenticated: bool,
    /// True until initialization completes, and while a login or refresh is in flight
    pub is_loading: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
        }
    }
}

impl Session {
    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.display_name())
    }
}
