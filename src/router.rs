use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::ContentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Details,
    Search,
    Wishlist,
    Profile,
    Upload,
    AdminDashboard,
    Player,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Home => "home",
            View::Details => "details",
            View::Search => "search",
            View::Wishlist => "wishlist",
            View::Profile => "profile",
            View::Upload => "upload",
            View::AdminDashboard => "admin-dashboard",
            View::Player => "player",
        }
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(self, View::Upload | View::AdminDashboard)
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, View::Profile | View::Wishlist)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "home" => Ok(View::Home),
            "details" => Ok(View::Details),
            "search" => Ok(View::Search),
            "wishlist" => Ok(View::Wishlist),
            "profile" => Ok(View::Profile),
            "upload" => Ok(View::Upload),
            "admin-dashboard" => Ok(View::AdminDashboard),
            "player" => Ok(View::Player),
            other => Err(anyhow::anyhow!("unknown view '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unauthenticated,
    User,
    Admin,
}

impl Role {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Role::Unauthenticated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Navigate(View),
    /// Stay put; the caller should prompt for login.
    AuthRequired,
}

/// Decide where a request for `requested` actually lands for `role`.
pub fn route(role: Role, requested: View) -> Route {
    if requested.is_admin_only() && role != Role::Admin {
        return Route::Navigate(View::Home);
    }
    if requested.requires_auth() && role == Role::Unauthenticated {
        return Route::AuthRequired;
    }
    Route::Navigate(requested)
}

/// Gate for actions (rate, wishlist, download, play) that need a signed-in user.
pub fn guard_protected(role: Role) -> Result<()> {
    if role.is_authenticated() {
        Ok(())
    } else {
        Err(Error::AuthRequired)
    }
}

/// Where "home" is for a given role.
pub fn home_for(role: Role) -> View {
    match role {
        Role::Admin => View::AdminDashboard,
        Role::User | Role::Unauthenticated => View::Home,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayTarget {
    pub url: String,
    pub title: String,
}

/// Current view plus the per-view selections the router leaves alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    view: View,
    selected: Option<ContentId>,
    editing: Option<ContentId>,
    playing: Option<PlayTarget>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            view: View::Home,
            selected: None,
            editing: None,
            playing: None,
        }
    }
}

impl Navigator {
    pub fn view(&self) -> View {
        self.view
    }

    pub fn selected(&self) -> Option<ContentId> {
        self.selected
    }

    pub fn editing(&self) -> Option<ContentId> {
        self.editing
    }

    pub fn playing(&self) -> Option<&PlayTarget> {
        self.playing.as_ref()
    }

    /// Apply [`route`]. Views that need a selection fall back to home without one.
    pub fn navigate(&mut self, role: Role, requested: View) -> Route {
        let decision = match route(role, requested) {
            Route::Navigate(View::Details) if self.selected.is_none() => {
                Route::Navigate(View::Home)
            }
            Route::Navigate(View::Player) if self.playing.is_none() => {
                Route::Navigate(View::Home)
            }
            other => other,
        };
        if let Route::Navigate(view) = decision {
            self.view = view;
        }
        decision
    }

    pub fn go_home(&mut self, role: Role) -> View {
        self.selected = None;
        self.editing = None;
        self.view = home_for(role);
        self.view
    }

    pub fn select_content(&mut self, id: ContentId) {
        self.selected = Some(id);
        self.view = View::Details;
    }

    pub fn play(&mut self, url: String, title: String) {
        self.playing = Some(PlayTarget { url, title });
        self.view = View::Player;
    }

    pub fn start_edit(&mut self, role: Role, id: ContentId) -> Route {
        self.editing = Some(id);
        let decision = self.navigate(role, View::Upload);
        if decision != Route::Navigate(View::Upload) {
            self.editing = None;
        }
        decision
    }

    pub fn finish_edit(&mut self) {
        self.editing = None;
    }

    /// Force a view after a completed flow (login, logout, admin save).
    pub(crate) fn land_on(&mut self, view: View) {
        self.view = view;
    }
}
