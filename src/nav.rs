use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Access tier of an account. Fixed at login for the whole session; only an
/// admin's role change against another account alters it, and the affected
/// user observes that on their next login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Demo,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Demo => "demo",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "demo" => Ok(Role::Demo),
            other => Err(AppError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// Application views reachable through the navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Home,
    AddRecipe,
    AdminPanel,
}

impl Page {
    pub fn path(&self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::AddRecipe => "/add",
            Page::AdminPanel => "/admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::AddRecipe => "Add Recipe",
            Page::AdminPanel => "Admin Panel",
        }
    }
}

/// Views a role may reach. Demo sees the add-recipe page too, but its
/// submissions are suppressed server-side (see [`can_write`]).
pub fn visible_pages(role: Role) -> &'static [Page] {
    match role {
        Role::Admin => &[Page::Home, Page::AddRecipe, Page::AdminPanel],
        Role::User | Role::Demo => &[Page::Home, Page::AddRecipe],
    }
}

/// Whether a role may issue writes. Demo submissions are dropped regardless
/// of form validity.
pub fn can_write(role: Role) -> bool {
    role != Role::Demo
}

/// Navigation entries as JSON for the page templates.
pub fn nav_json(role: Role) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = visible_pages(role)
        .iter()
        .map(|page| serde_json::json!({ "path": page.path(), "label": page.label() }))
        .collect();
    serde_json::json!(entries)
}
