//! Screen routes and the navigator abstraction.
//!
//! The gateway needs to know "where the user currently is" so it can send
//! them back there after re-authenticating, and it needs a way to move them.
//! `Navigator` captures both; `HistoryNavigator` is an in-memory history
//! stack used by the CLI and by tests.

use std::fmt::Display;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Known screens of the admin console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Dashboard,
    Login,
    ServerDown,
    PetTypes,
    Breeds,
    Colors,
    PetFoods,
    UserTypes,
    PetOwners,
    BusinessProfiles,
    Stories,
    NotFound,
}

impl Route {
    /// Sidebar entries, in display order
    pub const NAV_ITEMS: [Route; 9] = [
        Route::Dashboard,
        Route::PetTypes,
        Route::Breeds,
        Route::Colors,
        Route::PetFoods,
        Route::UserTypes,
        Route::PetOwners,
        Route::BusinessProfiles,
        Route::Stories,
    ];

    /// Parse a location into a route. Query strings and trailing slashes are ignored.
    pub fn from_location(location: &str) -> Self {
        let (path, _) = split_location(location);
        let path = path.trim_end_matches('/');
        match path {
            "" => Self::Dashboard,
            "/login" => Self::Login,
            "/server-down" => Self::ServerDown,
            "/pet-types" => Self::PetTypes,
            "/breeds" => Self::Breeds,
            "/colors" => Self::Colors,
            "/pet-foods" => Self::PetFoods,
            "/user-types" => Self::UserTypes,
            "/pet-owners" => Self::PetOwners,
            "/business-profiles" => Self::BusinessProfiles,
            "/stories" => Self::Stories,
            _ => Self::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Dashboard => "/",
            Self::Login => "/login",
            Self::ServerDown => "/server-down",
            Self::PetTypes => "/pet-types",
            Self::Breeds => "/breeds",
            Self::Colors => "/colors",
            Self::PetFoods => "/pet-foods",
            Self::UserTypes => "/user-types",
            Self::PetOwners => "/pet-owners",
            Self::BusinessProfiles => "/business-profiles",
            Self::Stories => "/stories",
            Self::NotFound => "/404",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Login => "Login",
            Self::ServerDown => "Server Down",
            Self::PetTypes => "Pet Types",
            Self::Breeds => "Breeds",
            Self::Colors => "Colors",
            Self::PetFoods => "Pet Foods",
            Self::UserTypes => "User Types",
            Self::PetOwners => "Pet Owners",
            Self::BusinessProfiles => "Business Profiles",
            Self::Stories => "Stories",
            Self::NotFound => "Not Found",
        }
    }

    /// Screens reachable without a credential
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Login | Self::ServerDown)
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Split `"/breeds?x=1"` into `("/breeds", Some("x=1"))`.
pub fn split_location(location: &str) -> (&str, Option<&str>) {
    match location.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (location, None),
    }
}

/// Where the user is and how to move them.
pub trait Navigator: Send + Sync {
    /// Current path plus query string, e.g. `/breeds?x=1`
    fn current_location(&self) -> String;

    fn navigate(&self, location: &str);
}

struct History {
    current: String,
    entries: Vec<String>,
}

/// In-memory navigation history.
pub struct HistoryNavigator {
    history: Mutex<History>,
}

impl HistoryNavigator {
    pub fn new(initial: &str) -> Self {
        Self {
            history: Mutex::new(History {
                current: normalize(initial),
                entries: Vec::new(),
            }),
        }
    }

    /// Change the current location without recording a navigation,
    /// as when the user opens a screen directly.
    pub fn set_location(&self, location: &str) {
        self.lock().current = normalize(location);
    }

    /// Every location navigated to, oldest first
    pub fn navigations(&self) -> Vec<String> {
        self.lock().entries.clone()
    }

    pub fn last_navigation(&self) -> Option<String> {
        self.lock().entries.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        // History is plain data; a panic mid-update cannot leave it inconsistent
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new(Route::Dashboard.path())
    }
}

impl Navigator for HistoryNavigator {
    fn current_location(&self) -> String {
        self.lock().current.clone()
    }

    fn navigate(&self, location: &str) {
        let location = normalize(location);
        debug!(location = %location, "Navigating");
        let mut history = self.lock();
        history.current = location.clone();
        history.entries.push(location);
    }
}

fn normalize(location: &str) -> String {
    if location.starts_with('/') {
        location.to_string()
    } else {
        format!("/{}", location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_from_location() {
        assert_eq!(Route::from_location("/"), Route::Dashboard);
        assert_eq!(Route::from_location(""), Route::Dashboard);
        assert_eq!(Route::from_location("/breeds?x=1"), Route::Breeds);
        assert_eq!(Route::from_location("/pet-types/"), Route::PetTypes);
        assert_eq!(Route::from_location("/login"), Route::Login);
        assert_eq!(Route::from_location("/nope"), Route::NotFound);
    }

    #[test]
    fn test_route_path_round_trips_for_nav_items() {
        for route in Route::NAV_ITEMS {
            assert_eq!(Route::from_location(route.path()), route);
        }
    }

    #[test]
    fn test_split_location() {
        assert_eq!(split_location("/breeds?x=1"), ("/breeds", Some("x=1")));
        assert_eq!(split_location("/colors"), ("/colors", None));
    }

    #[test]
    fn test_history_navigator_records() {
        let nav = HistoryNavigator::new("breeds?x=1");
        assert_eq!(nav.current_location(), "/breeds?x=1");
        assert!(nav.navigations().is_empty());

        nav.navigate("/login");
        nav.navigate("/");

        assert_eq!(nav.current_location(), "/");
        assert_eq!(nav.navigations(), vec!["/login", "/"]);
        assert_eq!(nav.last_navigation().as_deref(), Some("/"));
    }

    #[test]
    fn test_set_location_does_not_record() {
        let nav = HistoryNavigator::default();
        nav.set_location("/colors?search=red");
        assert_eq!(nav.current_location(), "/colors?search=red");
        assert!(nav.navigations().is_empty());
    }
}
