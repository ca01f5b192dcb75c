use axum::{
    Extension, Form, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::login::{self, Session};
use crate::nav::{self, Role};
use crate::recipes::{self, Recipe};
use crate::search;
use crate::sheet::{FileSheet, load_table};
use crate::users::{self, Credentials, credentials_from_table};

/// Shared state: the static configuration plus the credential map the auth
/// gate keeps in memory for the lifetime of the process. Tables themselves
/// are never cached here; every request reloads its sheet.
pub struct AppState {
    pub config: AppConfig,
    pub credentials: RwLock<Credentials>,
}

impl AppState {
    pub fn users_sheet(&self) -> FileSheet {
        FileSheet::open(&self.config.users_sheet)
    }

    pub fn recipes_sheet(&self) -> FileSheet {
        FileSheet::open(&self.config.recipes_sheet)
    }
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    // The credential map is built once at startup; registration, role
    // changes and password changes keep it in sync with the sheet.
    let users_table = load_table(&FileSheet::open(&config.users_sheet))?;
    let credentials = credentials_from_table(&users_table)?;
    log::info!("loaded {} user accounts", credentials.len());

    let state = Arc::new(AppState {
        config: config.clone(),
        credentials: RwLock::new(credentials),
    });

    let protected = Router::new()
        .route("/", get(serve_home))
        .route("/add", get(serve_add_recipe))
        .route("/admin", get(serve_admin_panel))
        .route(
            "/password",
            get(login::serve_password_page).post(login::handle_change_password),
        )
        .route("/api/recipes", get(search_recipes).post(create_recipe))
        .route("/api/recipes/delete", post(remove_recipe))
        .route("/api/users/delete", post(remove_user))
        .route("/api/users/role", post(assign_role))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    let app = Router::new()
        .merge(protected)
        .route("/login", get(login::serve_login_page).post(login::handle_login))
        .route("/signup", get(login::serve_signup_page).post(login::handle_signup))
        .route("/logout", get(login::handle_logout))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    log::info!("listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    column: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize)]
struct RecipeForm {
    name: String,
    category: String,
    diet: String,
    duration: String,
    ingredients: String,
    preparation: String,
}

#[derive(Deserialize)]
struct DeleteRecipeForm {
    name: String,
}

#[derive(Deserialize)]
struct DeleteUserForm {
    username: String,
}

#[derive(Deserialize)]
struct RoleForm {
    username: String,
    role: String,
}

/// Maps service failures onto HTTP responses at the view boundary. Backend
/// failures are logged; user-fault errors are just reported back.
fn error_response(err: AppError) -> Response {
    if !err.is_user_fault() {
        log::warn!("request failed: {err}");
    }
    let status = match err {
        AppError::Auth(_) => StatusCode::UNAUTHORIZED,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Api(_) | AppError::Network(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string()).into_response()
}

fn require_admin(session: &Session) -> Result<(), Response> {
    if session.role == Role::Admin {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, "admin access required").into_response())
    }
}

/// Injects named JSON constants into a page template ahead of `</head>`.
fn render_page(template: &'static str, data: &[(&str, serde_json::Value)]) -> Html<String> {
    let script: String = data
        .iter()
        .map(|(name, value)| format!("const {name} = {value};\n"))
        .collect();
    Html(template.replace(
        "</head>",
        &format!("    <script>{script}</script>\n</head>"),
    ))
}

fn session_json(session: &Session) -> serde_json::Value {
    serde_json::to_value(session).unwrap_or_default()
}

/// Home page: recipe preview plus free-text search and the optional
/// column/value filter.
async fn serve_home(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let table = match load_table(&state.recipes_sheet()) {
        Ok(table) => table,
        Err(err) => return error_response(err),
    };

    let query = params.q.unwrap_or_default();
    let mut filtered = search::search_table(&table, &query);
    if let (Some(column), Some(value)) = (&params.column, &params.value) {
        filtered = search::filter_by_column(&filtered, column, value);
    }

    render_page(
        include_str!("./static/home.html"),
        &[
            ("RECIPES_DATA", filtered.to_json()),
            ("NAV_DATA", nav::nav_json(session.role)),
            ("SESSION_DATA", session_json(&session)),
            ("QUERY", serde_json::json!(query)),
        ],
    )
    .into_response()
}

/// Filtered recipes as JSON, for the search box.
async fn search_recipes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Response {
    match load_table(&state.recipes_sheet()) {
        Ok(table) => {
            let filtered = search::search_table(&table, params.q.as_deref().unwrap_or(""));
            Json(filtered.to_json()).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn serve_add_recipe(Extension(session): Extension<Session>) -> Response {
    render_page(
        include_str!("./static/add_recipe.html"),
        &[
            ("NAV_DATA", nav::nav_json(session.role)),
            ("SESSION_DATA", session_json(&session)),
        ],
    )
    .into_response()
}

/// Adds a recipe. Demo submissions are suppressed here regardless of form
/// validity; validation itself lives in the recipe service.
async fn create_recipe(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<RecipeForm>,
) -> Response {
    if !nav::can_write(session.role) {
        return (
            StatusCode::FORBIDDEN,
            "the demo account cannot add recipes, create an account to add your own",
        )
            .into_response();
    }

    let recipe = Recipe {
        name: form.name.trim().to_string(),
        category: form.category.trim().to_string(),
        diet: form.diet.trim().to_string(),
        duration: form.duration.trim().to_string(),
        ingredients: form.ingredients.trim().to_string(),
        preparation: form.preparation.trim().to_string(),
    };

    let mut sheet = state.recipes_sheet();
    match recipes::add_recipe(&mut sheet, &recipe) {
        Ok(()) => (
            StatusCode::OK,
            format!("recipe '{}' was added successfully", recipe.name),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// Admin panel: user listing plus the delete-recipe, delete-user and
/// change-role controls.
async fn serve_admin_panel(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Response {
    if let Err(response) = require_admin(&session) {
        return response;
    }

    let users_table = match load_table(&state.users_sheet()) {
        Ok(table) => table,
        Err(err) => return error_response(err),
    };
    let recipes_table = match load_table(&state.recipes_sheet()) {
        Ok(table) => table,
        Err(err) => return error_response(err),
    };

    render_page(
        include_str!("./static/admin.html"),
        &[
            ("USERS_DATA", users_table.to_json()),
            ("RECIPES_DATA", recipes_table.to_json()),
            ("NAV_DATA", nav::nav_json(session.role)),
            ("SESSION_DATA", session_json(&session)),
        ],
    )
    .into_response()
}

async fn remove_recipe(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<DeleteRecipeForm>,
) -> Response {
    if let Err(response) = require_admin(&session) {
        return response;
    }

    let mut sheet = state.recipes_sheet();
    match recipes::delete_recipe(&mut sheet, form.name.trim()) {
        Ok(()) => (
            StatusCode::OK,
            format!("recipe '{}' was deleted successfully", form.name.trim()),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn remove_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<DeleteUserForm>,
) -> Response {
    if let Err(response) = require_admin(&session) {
        return response;
    }

    let mut sheet = state.users_sheet();
    let mut credentials = state.credentials.write().unwrap();
    match users::delete_user(&mut sheet, &mut credentials, form.username.trim()) {
        Ok(()) => (
            StatusCode::OK,
            format!("user '{}' was deleted successfully", form.username.trim()),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<RoleForm>,
) -> Response {
    if let Err(response) = require_admin(&session) {
        return response;
    }

    let new_role: Role = match form.role.parse() {
        Ok(role) => role,
        Err(err) => return error_response(err),
    };

    let mut sheet = state.users_sheet();
    let mut credentials = state.credentials.write().unwrap();
    match users::change_role(&mut sheet, &mut credentials, form.username.trim(), new_role) {
        Ok(()) => (
            StatusCode::OK,
            format!("role of '{}' was changed to {new_role}", form.username.trim()),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}
