use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::nav::Role;
use crate::sheet::Worksheet;
use crate::users::{self, Credentials, UserRecord};

/// Credential data received from the login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub confirm_password: String,
}

/// Password change form data for an authenticated user.
#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// One authenticated user's session. The role is fixed at login and not
/// live-revoked; a role change becomes visible on the next login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub username: String,
    pub name: String,
    pub role: Role,
    #[serde(skip)]
    pub expires_at: SystemTime,
}

lazy_static! {
    /// All active sessions, keyed by session id.
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Hash a password with Argon2id.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err(AppError::Auth("password hashing failed".to_string())),
    }
}

/// Check a plaintext password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err(AppError::Auth("invalid password hash format".to_string())),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Validates login credentials against the credential map.
///
/// Unknown usernames and wrong passwords produce the same generic error so
/// the failure reason is not leaked to the caller.
pub fn verify_login(
    credentials: &Credentials,
    username: &str,
    password: &str,
) -> Result<UserRecord, AppError> {
    let generic = || AppError::Auth("username or password is incorrect".to_string());

    let user = credentials.get(username).ok_or_else(generic)?;
    if verify_password(password, &user.password_hash)? {
        Ok(user.clone())
    } else {
        Err(generic())
    }
}

/// Registers a new account: validates the form, enforces username and email
/// uniqueness plus the optional pre-authorized allowlist, hashes the
/// password, appends the sheet row and updates the credential map. New
/// accounts always get the `user` role.
pub fn register_user(
    ws: &mut dyn Worksheet,
    credentials: &mut Credentials,
    form: &SignupForm,
    preauthorized: &[String],
) -> Result<UserRecord, AppError> {
    let username = form.username.trim();
    let email = form.email.trim();
    let name = form.name.trim();

    if username.is_empty() || email.is_empty() || name.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation(
            "username, email, name and password cannot be empty".to_string(),
        ));
    }
    if form.password != form.confirm_password {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }
    if credentials.contains_key(username) {
        return Err(AppError::Validation("username already exists".to_string()));
    }
    if credentials.values().any(|user| user.email == email) {
        return Err(AppError::Validation(
            "email address is already registered".to_string(),
        ));
    }
    if !preauthorized.is_empty() && !preauthorized.iter().any(|allowed| allowed == email) {
        return Err(AppError::Validation(
            "email address is not pre-authorized".to_string(),
        ));
    }

    let user = UserRecord {
        username: username.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        password_hash: hash_password(&form.password)?,
        role: Role::User,
    };
    users::append_user(ws, &user)?;
    credentials.insert(user.username.clone(), user.clone());
    Ok(user)
}

/// Changes an authenticated user's password after verifying the current one.
/// Demo accounts cannot change their password.
pub fn change_password(
    ws: &mut dyn Worksheet,
    credentials: &mut Credentials,
    username: &str,
    form: &PasswordForm,
) -> Result<(), AppError> {
    let user = credentials
        .get(username)
        .ok_or_else(|| AppError::NotFound(format!("user '{username}' could not be found")))?;

    if user.role == Role::Demo {
        return Err(AppError::Validation(
            "the demo account cannot change its password".to_string(),
        ));
    }
    if !verify_password(&form.current_password, &user.password_hash)? {
        return Err(AppError::Auth("current password is incorrect".to_string()));
    }
    if form.new_password.is_empty() {
        return Err(AppError::Validation("new password cannot be empty".to_string()));
    }
    if form.new_password != form.confirm_password {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }

    let mut updated = user.clone();
    updated.password_hash = hash_password(&form.new_password)?;
    users::update_user(ws, &updated)?;
    credentials.insert(username.to_string(), updated);
    Ok(())
}

/// Creates a session for an authenticated user and returns its id.
pub fn create_session(user: &UserRecord, expiry_days: u64) -> String {
    let session_id = Uuid::new_v4().to_string();
    let session = Session {
        username: user.username.clone(),
        name: user.name.clone(),
        role: user.role,
        expires_at: SystemTime::now() + Duration::from_secs(expiry_days * SECONDS_PER_DAY),
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Returns the session for `session_id` if it exists and has not expired.
pub fn validate_session(session_id: &str) -> Option<Session> {
    let sessions = SESSIONS.read().unwrap();

    sessions
        .get(session_id)
        .filter(|session| session.expires_at > SystemTime::now())
        .cloned()
}

/// Removes a session on logout.
pub fn destroy_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(session_id);
}

// Web handlers below.

pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

pub async fn serve_signup_page() -> Html<&'static str> {
    Html(include_str!("./static/signup.html"))
}

pub async fn serve_password_page() -> Html<&'static str> {
    Html(include_str!("./static/password.html"))
}

/// Processes a login form, creating a session cookie on success.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let result = {
        let credentials = state.credentials.read().unwrap();
        verify_login(&credentials, form.username.trim(), &form.password)
    };

    match result {
        Ok(user) => {
            log::info!("user '{}' logged in", user.username);
            let session_id = create_session(&user, state.config.cookie.expiry_days);
            let cookie = Cookie::new(state.config.cookie.name.clone(), session_id);
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Err(err) => (StatusCode::UNAUTHORIZED, err.to_string()).into_response(),
    }
}

/// Processes a signup form and redirects to the login page on success.
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Response {
    let mut sheet = state.users_sheet();
    let mut credentials = state.credentials.write().unwrap();

    match register_user(&mut sheet, &mut credentials, &form, &state.config.preauthorized) {
        Ok(user) => {
            log::info!("registered new user '{}'", user.username);
            Redirect::to("/login?registered=true").into_response()
        }
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

/// Destroys the session and clears the cookie.
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let cookie_name = state.config.cookie.name.clone();
    if let Some(cookie) = jar.get(&cookie_name) {
        destroy_session(cookie.value());
    }

    let cleared = Cookie::new(cookie_name, "");
    (jar.add(cleared), Redirect::to("/login")).into_response()
}

/// Password change for the authenticated user.
pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    axum::Extension(session): axum::Extension<Session>,
    Form(form): Form<PasswordForm>,
) -> Response {
    let mut sheet = state.users_sheet();
    let mut credentials = state.credentials.write().unwrap();

    match change_password(&mut sheet, &mut credentials, &session.username, &form) {
        Ok(()) => (StatusCode::OK, "password changed successfully").into_response(),
        Err(err @ AppError::Auth(_)) => (StatusCode::UNAUTHORIZED, err.to_string()).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

/// Authentication middleware: a valid session cookie lets the request pass
/// with the [`Session`] attached, anything else is redirected to the login
/// page.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(cookie) = jar.get(&state.config.cookie.name) {
        if let Some(session) = validate_session(cookie.value()) {
            request.extensions_mut().insert(session);
            return next.run(request).await;
        }
    }

    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{FileSheet, load_table};
    use crate::users::{USER_COLUMNS, credentials_from_table};
    use tempfile::tempdir;

    fn empty_users_sheet(dir: &tempfile::TempDir) -> FileSheet {
        FileSheet::create(
            dir.path().join("users.json"),
            USER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        )
        .unwrap()
    }

    fn signup(username: &str, email: &str, password: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            email: email.to_string(),
            name: username.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        }
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn registration_appends_row_and_updates_credentials() {
        let dir = tempdir().unwrap();
        let mut ws = empty_users_sheet(&dir);
        let mut credentials = Credentials::new();

        let user =
            register_user(&mut ws, &mut credentials, &signup("alice", "a@e.com", "pw"), &[])
                .unwrap();
        assert_eq!(user.role, Role::User);
        assert!(credentials.contains_key("alice"));

        let table = load_table(&ws).unwrap();
        assert_eq!(table.value(0, "username"), Some("alice"));
        // The sheet never stores the plaintext password.
        assert_ne!(table.value(0, "password"), Some("pw"));

        // A credential map reloaded from the sheet verifies the same login.
        let reloaded = credentials_from_table(&table).unwrap();
        assert!(verify_login(&reloaded, "alice", "pw").is_ok());
    }

    #[test]
    fn duplicate_username_is_rejected_at_the_gate() {
        let dir = tempdir().unwrap();
        let mut ws = empty_users_sheet(&dir);
        let mut credentials = Credentials::new();

        register_user(&mut ws, &mut credentials, &signup("alice", "a@e.com", "pw"), &[]).unwrap();
        let err = register_user(
            &mut ws,
            &mut credentials,
            &signup("alice", "other@e.com", "pw"),
            &[],
        )
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(load_table(&ws).unwrap().len(), 1);
    }

    #[test]
    fn allowlist_blocks_unlisted_emails() {
        let dir = tempdir().unwrap();
        let mut ws = empty_users_sheet(&dir);
        let mut credentials = Credentials::new();
        let allowed = vec!["a@e.com".to_string()];

        assert!(matches!(
            register_user(
                &mut ws,
                &mut credentials,
                &signup("bob", "bob@e.com", "pw"),
                &allowed
            ),
            Err(AppError::Validation(_))
        ));
        register_user(&mut ws, &mut credentials, &signup("alice", "a@e.com", "pw"), &allowed)
            .unwrap();
    }

    #[test]
    fn login_failure_reason_is_not_leaked() {
        let dir = tempdir().unwrap();
        let mut ws = empty_users_sheet(&dir);
        let mut credentials = Credentials::new();
        register_user(&mut ws, &mut credentials, &signup("alice", "a@e.com", "pw"), &[]).unwrap();

        let unknown = verify_login(&credentials, "mallory", "pw").unwrap_err();
        let wrong_pw = verify_login(&credentials, "alice", "nope").unwrap_err();
        assert_eq!(unknown.to_string(), wrong_pw.to_string());
    }

    #[test]
    fn demo_account_cannot_change_password() {
        let dir = tempdir().unwrap();
        let mut ws = empty_users_sheet(&dir);
        let mut credentials = Credentials::new();
        register_user(&mut ws, &mut credentials, &signup("demo", "d@e.com", "pw"), &[]).unwrap();
        credentials.get_mut("demo").unwrap().role = Role::Demo;

        let form = PasswordForm {
            current_password: "pw".to_string(),
            new_password: "new".to_string(),
            confirm_password: "new".to_string(),
        };
        assert!(matches!(
            change_password(&mut ws, &mut credentials, "demo", &form),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn password_change_requires_the_current_password() {
        let dir = tempdir().unwrap();
        let mut ws = empty_users_sheet(&dir);
        let mut credentials = Credentials::new();
        register_user(&mut ws, &mut credentials, &signup("alice", "a@e.com", "pw"), &[]).unwrap();

        let bad = PasswordForm {
            current_password: "wrong".to_string(),
            new_password: "new".to_string(),
            confirm_password: "new".to_string(),
        };
        assert!(matches!(
            change_password(&mut ws, &mut credentials, "alice", &bad),
            Err(AppError::Auth(_))
        ));

        let good = PasswordForm {
            current_password: "pw".to_string(),
            new_password: "new".to_string(),
            confirm_password: "new".to_string(),
        };
        change_password(&mut ws, &mut credentials, "alice", &good).unwrap();
        assert!(verify_login(&credentials, "alice", "new").is_ok());
    }

    #[test]
    fn sessions_are_created_validated_and_destroyed() {
        let user = UserRecord {
            username: "alice".to_string(),
            email: "a@e.com".to_string(),
            name: "Alice".to_string(),
            password_hash: "unused".to_string(),
            role: Role::User,
        };

        let id = create_session(&user, 1);
        let session = validate_session(&id).unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.role, Role::User);

        destroy_session(&id);
        assert!(validate_session(&id).is_none());
        assert!(validate_session("no-such-session").is_none());
    }
}
