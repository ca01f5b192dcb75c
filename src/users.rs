use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AppError;
use crate::nav::Role;
use crate::sheet::{Row, Table, Worksheet, find_row_index};

/// Column set of the users sheet, in sheet order.
pub const USER_COLUMNS: [&str; 5] = ["username", "email", "name", "password", "role"];

/// The account that can never be deleted or role-changed.
pub const ADMIN_USERNAME: &str = "admin";

/// One registered account as stored in the users sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub name: String,
    /// Argon2 hash, never a plaintext password.
    pub password_hash: String,
    pub role: Role,
}

impl UserRecord {
    pub fn to_row(&self) -> Row {
        vec![
            self.username.clone(),
            self.email.clone(),
            self.name.clone(),
            self.password_hash.clone(),
            self.role.as_str().to_string(),
        ]
    }
}

/// The credential map the auth gate holds for the lifetime of the process,
/// keyed by username.
pub type Credentials = HashMap<String, UserRecord>;

/// Builds the credential map from a loaded users table. Rows without a role
/// column value default to `user`.
pub fn credentials_from_table(table: &Table) -> Result<Credentials, AppError> {
    let mut credentials = Credentials::new();
    for i in 0..table.len() {
        let cell = |column: &str| table.value(i, column).unwrap_or("").to_string();
        let username = cell("username");
        if username.is_empty() {
            continue;
        }
        let role = match table.value(i, "role") {
            Some(raw) if !raw.is_empty() => raw.parse()?,
            _ => Role::User,
        };
        credentials.insert(
            username.clone(),
            UserRecord {
                username,
                email: cell("email"),
                name: cell("name"),
                password_hash: cell("password"),
                role,
            },
        );
    }
    Ok(credentials)
}

/// Registration write: appends the account as the sheet's last row. Username
/// uniqueness is enforced by the auth gate before this call; the service
/// itself stays permissive.
pub fn append_user(ws: &mut dyn Worksheet, user: &UserRecord) -> Result<(), AppError> {
    ws.append_row(user.to_row())
}

/// Rewrites the user's full sheet row. The row index is resolved here and
/// not earlier: deletes shift rows under any cached position.
pub fn update_user(ws: &mut dyn Worksheet, user: &UserRecord) -> Result<(), AppError> {
    match find_row_index(ws, &user.username)? {
        Some(row_index) => ws.update_row(row_index, user.to_row()),
        None => Err(AppError::NotFound(format!(
            "user '{}' could not be found",
            user.username
        ))),
    }
}

/// Changes an account's role in the sheet and in the credential map.
///
/// The admin account is immutable through this operation, and writing the
/// role an account already has is refused rather than issued as a redundant
/// update. The affected user sees the change on their next login.
pub fn change_role(
    ws: &mut dyn Worksheet,
    credentials: &mut Credentials,
    username: &str,
    new_role: Role,
) -> Result<(), AppError> {
    if username == ADMIN_USERNAME {
        return Err(AppError::Validation(
            "the admin account cannot be modified".to_string(),
        ));
    }
    let user = credentials
        .get(username)
        .ok_or_else(|| AppError::NotFound(format!("user '{username}' could not be found")))?;
    if user.role == new_role {
        return Err(AppError::Validation(format!(
            "'{username}' already has the role {new_role}"
        )));
    }

    let mut updated = user.clone();
    updated.role = new_role;
    update_user(ws, &updated)?;
    credentials.insert(username.to_string(), updated);
    Ok(())
}

/// Deletes an account by username, first match wins. Deleting the currently
/// authenticated user is not prevented; their session simply outlives the
/// row. The admin account is never deletable.
pub fn delete_user(
    ws: &mut dyn Worksheet,
    credentials: &mut Credentials,
    username: &str,
) -> Result<(), AppError> {
    if username == ADMIN_USERNAME {
        return Err(AppError::Validation(
            "the admin account cannot be deleted".to_string(),
        ));
    }
    match find_row_index(ws, username)? {
        Some(row_index) => {
            ws.delete_row(row_index)?;
            credentials.remove(username);
            Ok(())
        }
        None => Err(AppError::NotFound(format!(
            "user '{username}' could not be found, check your input"
        ))),
    }
}
