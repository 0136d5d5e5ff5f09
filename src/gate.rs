// 🚦 Gate - route and action access from the session snapshot
//
// Two tiers: private routes need a token, admin routes need a token plus an
// ADMIN role. Missing a token sends the user to login (remembering where they
// were); missing the role sends them home.

use crate::session::{Session, SessionContext, SessionStore};
use serde::{Deserialize, Serialize};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

// ============================================================================
// ROUTES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Login,
    ClientList,
    NewClient,
    EditClient(String),
    ViewClient(String),
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Public,
    Private,
    Admin,
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let trimmed = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::ClientList,
            ["login"] => Route::Login,
            ["clients", "new"] => Route::NewClient,
            ["clients", "edit", id] => Route::EditClient((*id).to_string()),
            ["clients", id] => Route::ViewClient((*id).to_string()),
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => LOGIN_PATH.to_string(),
            Route::ClientList => HOME_PATH.to_string(),
            Route::NewClient => "/clients/new".to_string(),
            Route::EditClient(id) => format!("/clients/edit/{}", id),
            Route::ViewClient(id) => format!("/clients/{}", id),
            Route::NotFound(path) => path.clone(),
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Route::Login | Route::NotFound(_) => Tier::Public,
            Route::ClientList | Route::ViewClient(_) => Tier::Private,
            Route::NewClient | Route::EditClient(_) => Tier::Admin,
        }
    }
}

// ============================================================================
// NAVIGATION DECISION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Navigation {
    Allow,
    RedirectToLogin { from: String, session_expired: bool },
    RedirectToHome,
}

impl Navigation {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Navigation::Allow)
    }
}

/// Decide whether `route` is reachable with the given session snapshot.
pub fn gate(ctx: &SessionContext, route: &Route) -> Navigation {
    // Logged-in users have no business on the login page, unless the
    // backend has rejected their token
    if *route == Route::Login {
        return if ctx.is_authenticated() && !ctx.session_expired {
            Navigation::RedirectToHome
        } else {
            Navigation::Allow
        };
    }

    match route.tier() {
        Tier::Public => Navigation::Allow,
        Tier::Private | Tier::Admin if ctx.session_expired => Navigation::RedirectToLogin {
            from: route.path(),
            session_expired: true,
        },
        Tier::Private | Tier::Admin if !ctx.is_authenticated() => Navigation::RedirectToLogin {
            from: route.path(),
            session_expired: false,
        },
        Tier::Admin if !ctx.is_admin() => Navigation::RedirectToHome,
        _ => Navigation::Allow,
    }
}

/// Gate a navigation against live session state. A pending session-expired
/// flag keeps sending the user to login until a new login or a logout
/// clears it.
pub fn navigate<S: SessionStore>(session: &Session<S>, path: &str) -> Navigation {
    let route = Route::parse(path);
    let decision = gate(&session.context(), &route);

    if let Navigation::RedirectToLogin { from, session_expired } = &decision {
        if *session_expired {
            tracing::info!(path, "session expired, asking for a new login");
        }
        session.remember_redirect(from);
    }
    tracing::debug!(path, ?decision, "navigation gated");
    decision
}

/// Where to go after a successful login.
pub fn post_login_target(from: Option<&str>) -> String {
    match from {
        Some(path) if !path.is_empty() && Route::parse(path) != Route::Login => path.to_string(),
        _ => HOME_PATH.to_string(),
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    View,
    Create,
    Edit,
    Delete,
}

impl Capability {
    pub fn verb(&self) -> &'static str {
        match self {
            Capability::View => "view",
            Capability::Create => "create",
            Capability::Edit => "edit",
            Capability::Delete => "delete",
        }
    }

    /// Message shown when the capability is missing.
    pub fn denied_message(&self) -> String {
        format!("no permission to {} clients", self.verb())
    }
}

pub fn can(ctx: &SessionContext, capability: Capability) -> bool {
    match capability {
        Capability::View => ctx.is_authenticated(),
        Capability::Create | Capability::Edit | Capability::Delete => {
            ctx.is_authenticated() && ctx.is_admin()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
