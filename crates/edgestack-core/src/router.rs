//! The ordered route table.
//!
//! Routes are evaluated in table order; the first terminal match stops
//! evaluation. `add_route_front` lets build-time code inject high-priority
//! default routes (asset serving, health checks) ahead of user-defined ones
//! while still letting users override with explicit terminal routes.

use edgestack_model::{Params, Predicate, Route, RouteAction, RouteCondition};

use crate::request::EdgeRequest;

/// Evaluate one condition against the live request.
///
/// All present predicate fields are ANDed; an absent condition or one with
/// no fields matches unconditionally. Returns the params captured by a
/// path-pattern predicate (empty for other forms).
#[must_use]
pub fn condition_matches(condition: &RouteCondition, request: &EdgeRequest) -> Option<Params> {
    let mut params = Params::new();

    if let Some(predicate) = &condition.url {
        params.append(&mut predicate.match_with_params(request.url.as_str(), true)?);
    }
    if let Some(predicate) = &condition.path {
        params.append(&mut predicate.match_with_params(request.path(), true)?);
    }
    if let Some(predicate) = &condition.method {
        if !predicate.matches(&request.method, false) {
            return None;
        }
    }
    if let Some(predicate) = &condition.path_extension {
        if !matches_optional_facet(predicate, request.path_extension().as_deref()) {
            return None;
        }
    }
    for (name, predicate) in &condition.header {
        if !matches_optional_facet(predicate, request.headers.get(name)) {
            return None;
        }
    }
    if !condition.cookie.is_empty() {
        let cookies = request.cookies();
        for (name, predicate) in &condition.cookie {
            if !matches_optional_facet(predicate, cookies.get(name).map(String::as_str)) {
                return None;
            }
        }
    }
    for (name, predicate) in &condition.query {
        if !matches_optional_facet(predicate, request.query_param(name).as_deref()) {
            return None;
        }
    }

    Some(params)
}

/// A predicate over a facet that may be absent on the request. A missing
/// value fails every predicate except a negation, which trivially holds.
fn matches_optional_facet(predicate: &Predicate, value: Option<&str>) -> bool {
    match value {
        Some(v) => predicate.matches(v, false),
        None => matches!(predicate, Predicate::Not(_)),
    }
}

/// The ordered route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route at the lowest priority.
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Prepend a route at the highest priority.
    pub fn add_route_front(&mut self, route: Route) {
        self.routes.insert(0, route);
    }

    /// Append a route with an optional condition, terminal when flagged.
    /// The canonical entry point behind the verb helpers, which always add
    /// non-terminal routes.
    pub fn matching(
        &mut self,
        condition: Option<RouteCondition>,
        actions: Vec<RouteAction>,
        terminal: bool,
    ) {
        let route = if terminal {
            Route::terminal(condition, actions)
        } else {
            Route::new(condition, actions)
        };
        self.add_route(route);
    }

    /// Append a route matching any method on a path.
    ///
    /// # Errors
    ///
    /// Returns [`edgestack_model::EdgeError::InvalidRoute`] for an invalid
    /// path pattern.
    pub fn any(
        &mut self,
        path: &str,
        actions: Vec<RouteAction>,
    ) -> edgestack_model::EdgeResult<()> {
        self.matching(Some(RouteCondition::on_path(path)?), actions, false);
        Ok(())
    }

    /// The routes in priority order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

macro_rules! verb_helper {
    ($($(#[$doc:meta])* $name:ident => $method:literal),* $(,)?) => {
        impl Router {
            $(
                $(#[$doc])*
                ///
                /// # Errors
                ///
                /// Returns [`edgestack_model::EdgeError::InvalidRoute`] for
                /// an invalid path pattern.
                pub fn $name(
                    &mut self,
                    path: &str,
                    actions: Vec<RouteAction>,
                ) -> edgestack_model::EdgeResult<()> {
                    let mut condition = RouteCondition::on_path(path)?;
                    condition.method = Some(Predicate::exact($method));
                    self.matching(Some(condition), actions, false);
                    Ok(())
                }
            )*
        }
    };
}

verb_helper! {
    /// Append a route matching `GET` on a path.
    get => "GET",
    /// Append a route matching `POST` on a path.
    post => "POST",
    /// Append a route matching `PUT` on a path.
    put => "PUT",
    /// Append a route matching `DELETE` on a path.
    delete => "DELETE",
    /// Append a route matching `PATCH` on a path.
    patch => "PATCH",
    /// Append a route matching `HEAD` on a path.
    head => "HEAD",
    /// Append a route matching `OPTIONS` on a path.
    options => "OPTIONS",
}
