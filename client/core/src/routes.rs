//! Screen Routing
//!
//! Every navigation goes through [`guard`], which keeps signed-out users on
//! the public screens and keeps signed-in users off the sign-in screens.

/// A screen of the client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// Landing screen
    Home,
    /// Sign-in form
    Login,
    /// Sign-up form
    Register,
    /// Conversations
    Chat,
}

/// Screens reachable without signing in
pub const PUBLIC_ROUTES: [Route; 3] = [Route::Home, Route::Login, Route::Register];

impl Route {
    /// Whether the screen is reachable without signing in
    #[must_use]
    pub fn is_public(self) -> bool {
        PUBLIC_ROUTES.contains(&self)
    }
}

/// Resolve the screen actually shown for a navigation request
#[must_use]
pub fn guard(requested: Route, authenticated: bool) -> Route {
    match requested {
        Route::Login | Route::Register if authenticated => Route::Home,
        route if !authenticated && !route.is_public() => Route::Login,
        route => route,
    }
}
