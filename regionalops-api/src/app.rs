/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use regionalops_api::{app::AppState, config::Config};
/// use regionalops_shared::supabase::SupabaseClient;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let supabase = SupabaseClient::new(config.supabase.clone())?;
/// let state = AppState::new(supabase, config);
/// let app = regionalops_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{login_rate_limit_layer, rate_limit_layer, RateLimit, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use regionalops_shared::auth::middleware::{authenticate, bearer_token};
use regionalops_shared::supabase::SupabaseClient;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Room for multipart boundaries and text fields around an upload
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Supabase client (shares one HTTP pool)
    pub supabase: SupabaseClient,

    /// Application configuration
    pub config: Arc<Config>,

    /// Limiter for every route
    pub rate_limiter: Arc<RateLimiter>,

    /// Limiter for `POST /auth/login`
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates new application state
    pub fn new(supabase: SupabaseClient, config: Config) -> Self {
        let rate_limiter = RateLimiter::new(RateLimit::per_minute(config.rate_limit.per_minute));
        let login_limiter =
            RateLimiter::new(RateLimit::per_minute(config.rate_limit.login_per_minute));

        Self {
            supabase,
            config: Arc::new(config),
            rate_limiter: Arc::new(rate_limiter),
            login_limiter: Arc::new(login_limiter),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                       # public
/// ├── /auth/
/// │   ├── POST /login                    # public, login rate limit
/// │   ├── POST /refresh                  # public
/// │   ├── POST /forgot-password          # public
/// │   ├── POST /logout
/// │   ├── GET  /me, PUT /me/password
/// │   └── /users[/:id[/reset-password]]  # admin
/// ├── /members[/:id]
/// ├── /activities[/:id]
/// ├── /goals[/:id]
/// ├── /files[/:id]
/// ├── /instituicoes[/stats | /:id]
/// └── GET /dashboard/metas
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Global rate limit
/// 5. Authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let upload_limit = state.config.upload.max_bytes + MULTIPART_OVERHEAD;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/auth/login",
            post(routes::auth::login)
                .layer(from_fn_with_state(state.clone(), login_rate_limit_layer)),
        )
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/forgot-password", post(routes::auth::forgot_password));

    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/me/password", put(routes::auth::change_password))
        .route(
            "/auth/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/auth/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/auth/users/:id/reset-password",
            post(routes::users::reset_password),
        )
        .route(
            "/members",
            get(routes::members::list_members).post(routes::members::create_member),
        )
        .route(
            "/members/:id",
            get(routes::members::get_member)
                .put(routes::members::update_member)
                .delete(routes::members::delete_member),
        )
        .route(
            "/activities",
            get(routes::activities::list_activities).post(routes::activities::create_activity),
        )
        .route(
            "/activities/:id",
            get(routes::activities::get_activity)
                .put(routes::activities::update_activity)
                .delete(routes::activities::delete_activity),
        )
        .route(
            "/goals",
            get(routes::goals::list_goals).post(routes::goals::create_goal),
        )
        .route(
            "/goals/:id",
            get(routes::goals::get_goal)
                .put(routes::goals::update_goal)
                .delete(routes::goals::delete_goal),
        )
        .route(
            "/files",
            get(routes::files::list_files)
                .post(routes::files::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/files/:id",
            get(routes::files::get_file).delete(routes::files::delete_file),
        )
        .route(
            "/instituicoes",
            get(routes::instituicoes::list_instituicoes)
                .post(routes::instituicoes::create_instituicao),
        )
        .route(
            "/instituicoes/stats",
            get(routes::instituicoes::instituicao_stats),
        )
        .route(
            "/instituicoes/:id",
            get(routes::instituicoes::get_instituicao)
                .put(routes::instituicoes::update_instituicao)
                .delete(routes::instituicoes::delete_instituicao),
        )
        .route("/dashboard/metas", get(routes::dashboard::goal_dashboard))
        .route_layer(from_fn_with_state(state.clone(), auth_layer));

    // Configure CORS based on environment
    let cors = if state.config.cors_permissive() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Authentication middleware layer
///
/// Resolves the bearer token to a user and member profile, then injects
/// `AuthContext` into request extensions.
async fn auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.to_string();
    let auth = authenticate(&state.supabase, &token).await?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("route_not_found")
}
