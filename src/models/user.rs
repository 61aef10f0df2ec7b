//! User accounts and roles.

use serde::{Deserialize, Serialize};

/// Role of a user account; decides which parts of the API it may use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Outlet,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Outlet => "outlet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            "outlet" => Some(Role::Outlet),
            _ => None,
        }
    }
}

/// A user account. The password hash is never serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_id: Option<String>,
    pub is_active: bool,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// An entry of the role-dependent navigation menu.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub path: &'static str,
}

const fn item(label: &'static str, path: &'static str) -> MenuItem {
    MenuItem { label, path }
}

/// Route a freshly logged-in user lands on.
pub const LANDING_ROUTE: &str = "/dashboard";

/// Navigation menu shown to a role.
pub fn menu_for(role: Role) -> Vec<MenuItem> {
    match role {
        Role::Admin => vec![
            item("Dashboard", "/dashboard"),
            item("Tasks", "/tasks"),
            item("Staff Management", "/staff"),
            item("Outlet Management", "/outlets"),
            item("Schedules", "/schedules"),
            item("Reports", "/reports"),
        ],
        Role::Staff => vec![
            item("Dashboard", "/dashboard"),
            item("My Tasks", "/my-tasks"),
            item("My Schedule", "/my-schedule"),
        ],
        Role::Outlet => vec![
            item("Dashboard", "/dashboard"),
            item("Outlet Tasks", "/outlet-tasks"),
        ],
    }
}

/// Successful login response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    pub redirect_to: &'static str,
    pub menu: Vec<MenuItem>,
}

/// The current session's user with its menu.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    pub menu: Vec<MenuItem>,
}

/// Fields needed to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub outlet_id: Option<String>,
    pub password_hash: String,
}
