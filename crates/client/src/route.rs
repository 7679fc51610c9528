use tokio::sync::watch;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Chat,
    Admin,
}

impl Route {
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Chat | Self::Admin)
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Chat => "/chat",
            Self::Admin => "/admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
    /// The auth probe has not settled yet.
    Pending,
}

/// Redirect policy for a route under the given session.
pub fn resolve(route: Route, session: &Session) -> RouteDecision {
    if route == Route::Home {
        return RouteDecision::Render(route);
    }
    if session.loading {
        return RouteDecision::Pending;
    }

    match (route, session.is_authenticated()) {
        (Route::Chat | Route::Admin, false) => RouteDecision::Redirect(Route::Login),
        (Route::Login, true) => RouteDecision::Redirect(Route::Chat),
        _ => RouteDecision::Render(route),
    }
}

/// Current route bound to the session channel.
pub struct RouteGuard {
    route: Route,
    session: watch::Receiver<Session>,
}

impl RouteGuard {
    pub fn new(route: Route, session: watch::Receiver<Session>) -> Self {
        Self { route, session }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Evaluates the policy against the latest session and follows any redirect.
    pub fn decision(&mut self) -> RouteDecision {
        let decision = resolve(self.route, &self.session.borrow_and_update());
        if let RouteDecision::Redirect(target) = decision {
            tracing::debug!(from = self.route.path(), to = target.path(), "route redirected");
            self.route = target;
        }
        decision
    }

    pub fn navigate(&mut self, route: Route) -> RouteDecision {
        self.route = route;
        self.decision()
    }

    /// True when the session changed since the last decision.
    pub fn is_stale(&self) -> bool {
        self.session.has_changed().unwrap_or(false)
    }
}
