//! Route gating by authentication state.
//!
//! Protected views render only for an authenticated user. While startup
//! validation is still running they show a waiting indicator instead of
//! bouncing the user to login.

use std::fmt;

use crate::session::AuthState;

/// Screens of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    RegisterSuccess,
    LogoutSuccess,
}

impl Route {
    /// The entry point for anonymous users.
    pub const ENTRY: Self = Self::Login;

    /// Resolve a path. Unknown paths land on the entry point.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        match path {
            "/register" => Self::Register,
            "/dashboard" => Self::Dashboard,
            "/register/success" => Self::RegisterSuccess,
            "/logout/success" => Self::LogoutSuccess,
            _ => Self::ENTRY,
        }
    }

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Dashboard => "/dashboard",
            Self::RegisterSuccess => "/register/success",
            Self::LogoutSuccess => "/logout/success",
        }
    }

    /// Only reachable with an authenticated session.
    #[must_use]
    pub const fn is_protected(self) -> bool {
        matches!(self, Self::Dashboard)
    }

    /// Login and registration forms, pointless once logged in.
    #[must_use]
    pub const fn is_entry(self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// What to show for a requested route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Startup validation is still running.
    ShowLoading,
    /// Show the requested route.
    Render(Route),
    /// Go somewhere else instead.
    Redirect(Route),
}

/// Decide what to show for `route` in `state`.
#[must_use]
pub const fn gate(state: &AuthState, route: Route) -> Navigation {
    match state {
        AuthState::Loading if route.is_protected() || route.is_entry() => Navigation::ShowLoading,
        AuthState::Anonymous if route.is_protected() => Navigation::Redirect(Route::ENTRY),
        AuthState::Authenticated(_) if route.is_entry() => Navigation::Redirect(Route::Dashboard),
        _ => Navigation::Render(route),
    }
}
