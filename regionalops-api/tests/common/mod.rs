//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An in-process stand-in for the Supabase HTTP surfaces (Auth, REST,
//!   Storage) listening on a random local port
//! - Seeded accounts for each role
//! - Request helpers returning status, headers and JSON body

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use regionalops_api::app::{build_router, AppState};
use regionalops_api::config::Config;
use regionalops_shared::auth::jwt::validate_token;
use regionalops_shared::supabase::{SupabaseClient, SupabaseConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::Service as _;
use uuid::Uuid;

pub const ANON_KEY: &str = "anon-key";
pub const SERVICE_KEY: &str = "service-role-key";

/// Secret the fake auth service signs JWT access tokens with
pub const JWT_SECRET: &str = "test-jwt-secret-with-at-least-32-characters";

/// Password of every seeded account
pub const PASSWORD: &str = "senha2024";

/// PostgREST query parameters that are not row filters
const MODIFIERS: &[&str] = &["select", "order", "limit", "offset", "on_conflict"];

#[derive(Default)]
struct Backend {
    /// Auth users with their passwords
    users: Vec<(Value, String)>,
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<String, Bytes>,

    /// Admin user updates and deletes answer 500
    fail_admin_writes: bool,
}

type Shared = Arc<Mutex<Backend>>;

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn access_token(email: &str) -> String {
    format!("token-{}", email)
}

fn gotrue_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": "invalid_grant", "error_description": message })),
    )
        .into_response()
}

fn session_for(user: &Value) -> Value {
    let email = user["email"].as_str().unwrap_or_default();
    json!({
        "access_token": access_token(email),
        "refresh_token": format!("refresh-{}", email),
        "expires_in": 3600,
        "token_type": "bearer",
        "user": user,
    })
}

fn find_user_index(db: &Backend, token: &str) -> Option<usize> {
    if let Ok(claims) = validate_token(token, JWT_SECRET) {
        let sub = claims.sub.to_string();
        return db.users.iter().position(|(u, _)| u["id"] == sub.as_str());
    }

    db.users
        .iter()
        .position(|(u, _)| u["email"].as_str().map(access_token).as_deref() == Some(token))
}

fn new_user(email: &str, metadata: Value) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "email": email,
        "role": "authenticated",
        "app_metadata": { "provider": "email" },
        "user_metadata": metadata,
        "created_at": "2024-03-01T12:00:00Z",
    })
}

// Auth

async fn auth_health() -> Json<Value> {
    Json(json!({ "name": "GoTrue" }))
}

async fn auth_token(
    State(db): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let db = db.lock().unwrap();

    let user = match params.get("grant_type").map(String::as_str) {
        Some("password") => db.users.iter().find(|(u, password)| {
            u["email"] == body["email"] && body["password"].as_str() == Some(password.as_str())
        }),
        Some("refresh_token") => db.users.iter().find(|(u, _)| {
            let expected = format!("refresh-{}", u["email"].as_str().unwrap_or_default());
            body["refresh_token"].as_str() == Some(expected.as_str())
        }),
        _ => None,
    };

    match user {
        Some((user, _)) => Json(session_for(user)).into_response(),
        None => gotrue_error(StatusCode::BAD_REQUEST, "Invalid login credentials"),
    }
}

async fn auth_user(
    State(db): State<Shared>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut db = db.lock().unwrap();
    let token = bearer(&headers).unwrap_or_default();

    let Some(index) = find_user_index(&db, &token) else {
        return gotrue_error(StatusCode::UNAUTHORIZED, "invalid JWT");
    };

    if method == Method::PUT {
        let changes: Value = serde_json::from_slice(&body).unwrap_or_default();
        if let Some(password) = changes["password"].as_str() {
            db.users[index].1 = password.to_string();
        }
    }

    Json(db.users[index].0.clone()).into_response()
}

async fn auth_logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn auth_recover(State(db): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut db = db.lock().unwrap();
    db.tables
        .entry("recovery_emails".to_string())
        .or_default()
        .push(body);
    Json(json!({})).into_response()
}

fn require_service(headers: &HeaderMap) -> Result<(), Response> {
    if bearer(headers).as_deref() == Some(SERVICE_KEY) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "msg": "User not allowed" })),
        )
            .into_response())
    }
}

async fn admin_users(
    State(db): State<Shared>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if let Err(rejection) = require_service(&headers) {
        return rejection;
    }
    let mut db = db.lock().unwrap();

    if method == Method::POST {
        let attrs: Value = serde_json::from_slice(&body).unwrap_or_default();
        let email = attrs["email"].as_str().unwrap_or_default().to_string();
        if db.users.iter().any(|(u, _)| u["email"] == email.as_str()) {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "msg": "A user with this email address has already been registered" })),
            )
                .into_response();
        }
        let user = new_user(&email, attrs["user_metadata"].clone());
        let password = attrs["password"].as_str().unwrap_or_default().to_string();
        db.users.push((user.clone(), password));
        return Json(user).into_response();
    }

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = params.get("per_page").and_then(|p| p.parse().ok()).unwrap_or(50);
    let users: Vec<Value> = db
        .users
        .iter()
        .skip(page.saturating_sub(1) * per_page)
        .take(per_page)
        .map(|(u, _)| u.clone())
        .collect();
    Json(json!({ "users": users })).into_response()
}

async fn admin_user(
    State(db): State<Shared>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = require_service(&headers) {
        return rejection;
    }
    let mut db = db.lock().unwrap();

    let Some(index) = db.users.iter().position(|(u, _)| u["id"] == id.as_str()) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "msg": "User not found" }))).into_response();
    };

    if db.fail_admin_writes && matches!(method, Method::PUT | Method::DELETE) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "msg": "Database error updating user" })),
        )
            .into_response();
    }

    match method {
        Method::DELETE => {
            db.users.remove(index);
            Json(json!({})).into_response()
        }
        Method::PUT => {
            let attrs: Value = serde_json::from_slice(&body).unwrap_or_default();
            let taken = attrs["email"].as_str().is_some_and(|email| {
                db.users
                    .iter()
                    .enumerate()
                    .any(|(i, (u, _))| i != index && u["email"] == email)
            });
            if taken {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "msg": "A user with this email address has already been registered" })),
                )
                    .into_response();
            }
            let (user, password) = &mut db.users[index];
            if let Some(email) = attrs["email"].as_str() {
                user["email"] = json!(email);
            }
            if let Some(new_password) = attrs["password"].as_str() {
                *password = new_password.to_string();
            }
            if !attrs["user_metadata"].is_null() {
                user["user_metadata"] = attrs["user_metadata"].clone();
            }
            match attrs["ban_duration"].as_str() {
                Some("none") => user["banned_until"] = Value::Null,
                Some(_) => user["banned_until"] = json!("2124-01-01T00:00:00Z"),
                None => {}
            }
            Json(user.clone()).into_response()
        }
        _ => Json(db.users[index].0.clone()).into_response(),
    }
}

// REST

fn column_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn row_matches(row: &Value, params: &[(String, String)]) -> bool {
    params
        .iter()
        .filter(|(key, _)| !MODIFIERS.contains(&key.as_str()) && key != "or")
        .all(|(column, expr)| {
            let Some((op, expected)) = expr.split_once('.') else {
                return true;
            };
            let actual = column_text(row, column);
            match op {
                "eq" => actual.as_deref() == Some(expected),
                "gte" => actual.is_some_and(|a| a.as_str() >= expected),
                "lte" => actual.is_some_and(|a| a.as_str() <= expected),
                "ilike" => actual.is_some_and(|a| {
                    a.to_lowercase()
                        .contains(&expected.trim_matches('*').to_lowercase())
                }),
                "in" => actual.is_some_and(|a| {
                    expected
                        .trim_start_matches('(')
                        .trim_end_matches(')')
                        .split(',')
                        .any(|v| v.trim_matches('"') == a)
                }),
                _ => true,
            }
        })
}

fn with_defaults(mut row: Value) -> Value {
    if row.get("id").map_or(true, Value::is_null) {
        row["id"] = json!(Uuid::new_v4());
    }
    if row.get("created_at").map_or(true, Value::is_null) {
        row["created_at"] = json!("2024-06-01T10:00:00Z");
    }
    row
}

fn merge(target: &mut Value, changes: &Value) {
    if let (Some(target), Some(changes)) = (target.as_object_mut(), changes.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

async fn rest(
    State(db): State<Shared>,
    Path(table): Path<String>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    if bearer(&headers).is_none() {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No API key" }))).into_response();
    }

    let mut db = db.lock().unwrap();
    let rows = db.tables.entry(table).or_default();

    match method {
        Method::GET => {
            let limit = params
                .iter()
                .find(|(k, _)| k == "limit")
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(usize::MAX);
            let found: Vec<Value> = rows
                .iter()
                .filter(|r| row_matches(r, &params))
                .take(limit)
                .cloned()
                .collect();
            Json(found).into_response()
        }
        Method::POST => {
            let body: Value = serde_json::from_slice(&body).unwrap_or_default();
            let items = match body {
                Value::Array(items) => items,
                item => vec![item],
            };
            let on_conflict = params
                .iter()
                .find(|(k, _)| k == "on_conflict")
                .map(|(_, v)| v.clone());

            let mut written = Vec::new();
            for item in items {
                let existing = on_conflict.as_deref().and_then(|column| {
                    rows.iter_mut().find(|r| {
                        column_text(r, column).is_some() && r.get(column) == item.get(column)
                    })
                });
                match existing {
                    Some(row) => {
                        merge(row, &item);
                        written.push(row.clone());
                    }
                    None => {
                        let row = with_defaults(item);
                        rows.push(row.clone());
                        written.push(row);
                    }
                }
            }
            (StatusCode::CREATED, Json(written)).into_response()
        }
        Method::PATCH => {
            let changes: Value = serde_json::from_slice(&body).unwrap_or_default();
            let mut updated = Vec::new();
            for row in rows.iter_mut().filter(|r| row_matches(r, &params)) {
                merge(row, &changes);
                updated.push(row.clone());
            }
            Json(updated).into_response()
        }
        Method::DELETE => {
            let (removed, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|r| row_matches(r, &params));
            *rows = kept;
            Json(removed).into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

// Storage

fn storage_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "statusCode": "404", "error": "not_found", "message": "Object not found" })),
    )
        .into_response()
}

async fn storage(
    State(db): State<Shared>,
    Path(rest): Path<String>,
    method: Method,
    body: Bytes,
) -> Response {
    let rest = rest.trim_start_matches('/').to_string();
    let mut db = db.lock().unwrap();

    if method == Method::POST {
        if let Some(path) = rest.strip_prefix("object/sign/") {
            if !db.objects.contains_key(path) {
                return storage_not_found();
            }
            return Json(json!({ "signedURL": format!("/object/sign/{}?token=signed", path) }))
                .into_response();
        }
        if let Some(path) = rest.strip_prefix("object/") {
            db.objects.insert(path.to_string(), body);
            return Json(json!({ "Key": path })).into_response();
        }
    }

    if method == Method::DELETE {
        if let Some(bucket) = rest.strip_prefix("object/") {
            let request: Value = serde_json::from_slice(&body).unwrap_or_default();
            let mut removed = Vec::new();
            for prefix in request["prefixes"].as_array().into_iter().flatten() {
                let key = format!("{}/{}", bucket, prefix.as_str().unwrap_or_default());
                if db.objects.remove(&key).is_some() {
                    removed.push(json!({ "name": key }));
                }
            }
            return Json(removed).into_response();
        }
    }

    storage_not_found()
}

fn fake_supabase(backend: Shared) -> Router {
    Router::new()
        .route("/auth/v1/health", get(auth_health))
        .route("/auth/v1/token", post(auth_token))
        .route("/auth/v1/user", any(auth_user))
        .route("/auth/v1/logout", post(auth_logout))
        .route("/auth/v1/recover", post(auth_recover))
        .route("/auth/v1/admin/users", any(admin_users))
        .route("/auth/v1/admin/users/:id", any(admin_user))
        .route("/rest/v1/:table", any(rest))
        .route("/storage/v1/*rest", any(storage))
        .with_state(backend)
}

/// A seeded login
#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: Uuid,
    pub member_id: Uuid,
    pub email: String,
    pub token: String,
}

/// Test context containing the router and the fake backend
pub struct TestContext {
    pub app: Router,
    backend: Shared,
    pub admin: Account,
    pub coordenador: Account,
    pub membro: Account,

    /// Coordenador of another regional
    pub outsider: Account,
}

fn seed_account(
    backend: &mut Backend,
    nome: &str,
    email: &str,
    role: &str,
    regional: Option<&str>,
) -> Account {
    let user = new_user(email, json!({ "nome": nome }));
    let user_id: Uuid = serde_json::from_value(user["id"].clone()).unwrap();
    let member_id = Uuid::new_v4();

    backend.users.push((user, PASSWORD.to_string()));
    backend.tables.entry("members".to_string()).or_default().push(json!({
        "id": member_id,
        "auth_user_id": user_id,
        "nome": nome,
        "email": email,
        "role": role,
        "regional": regional,
        "ativo": true,
        "created_at": "2024-03-01T12:00:00Z",
    }));

    Account {
        user_id,
        member_id,
        email: email.to_string(),
        token: access_token(email),
    }
}

impl TestContext {
    /// Creates a new test context with default configuration
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_settings(|_| {}, |_| {}).await
    }

    /// Creates a new test context, letting the caller adjust the configuration
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        Self::with_settings(|_| {}, adjust).await
    }

    /// Creates a new test context, adjusting the Supabase settings (keys,
    /// JWT secret) and then the API configuration
    pub async fn with_settings(
        adjust_supabase: impl FnOnce(&mut SupabaseConfig),
        adjust: impl FnOnce(&mut Config),
    ) -> anyhow::Result<Self> {
        let backend: Shared = Arc::default();

        let (admin, coordenador, membro, outsider) = {
            let mut db = backend.lock().unwrap();
            (
                seed_account(&mut db, "Ana Admin", "admin@example.org", "admin", None),
                seed_account(&mut db, "Carlos", "coord@example.org", "coordenador", Some("Norte")),
                seed_account(&mut db, "Maria", "membro@example.org", "membro", Some("Norte")),
                seed_account(&mut db, "Sofia", "sul@example.org", "coordenador", Some("Sul")),
            )
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let fake = fake_supabase(backend.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, fake).await {
                eprintln!("fake supabase stopped: {}", e);
            }
        });

        let mut supabase = SupabaseConfig {
            url: format!("http://{}", addr),
            anon_key: ANON_KEY.to_string(),
            service_role_key: Some(SERVICE_KEY.to_string()),
            jwt_secret: None,
            storage_bucket: "documents".to_string(),
            timeout_secs: 5,
        };
        adjust_supabase(&mut supabase);

        let mut config = Config::new(supabase.clone());
        config.api.frontend_url = Some("https://app.example.org".to_string());
        adjust(&mut config);

        let client = SupabaseClient::new(supabase)?;
        let app = build_router(AppState::new(client, config));

        Ok(TestContext {
            app,
            backend,
            admin,
            coordenador,
            membro,
            outsider,
        })
    }

    /// Seeds another login with its member row
    pub fn add_account(
        &self,
        nome: &str,
        email: &str,
        role: &str,
        regional: Option<&str>,
    ) -> Account {
        seed_account(&mut self.backend.lock().unwrap(), nome, email, role, regional)
    }

    /// Seeds auth users that have no member row
    pub fn add_auth_users(&self, count: usize) {
        let mut db = self.backend.lock().unwrap();
        for i in 0..count {
            let user = new_user(&format!("extra{}@example.org", i), json!({}));
            db.users.push((user, PASSWORD.to_string()));
        }
    }

    /// Makes admin user updates and deletes fail from now on
    pub fn fail_admin_writes(&self) {
        self.backend.lock().unwrap().fail_admin_writes = true;
    }

    /// Merges `changes` into the row of `table` with the given id
    pub fn update_row(&self, table: &str, id: Uuid, changes: Value) {
        let mut db = self.backend.lock().unwrap();
        let id = id.to_string();
        for row in db.tables.entry(table.to_string()).or_default() {
            if row["id"] == id.as_str() {
                merge(row, &changes);
            }
        }
    }

    /// Inserts a row straight into the fake database
    pub fn seed_row(&self, table: &str, row: Value) -> Value {
        let row = with_defaults(row);
        self.backend
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Current rows of a table
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.backend
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// E-mail addresses of all auth users
    pub fn auth_emails(&self) -> Vec<String> {
        self.backend
            .lock()
            .unwrap()
            .users
            .iter()
            .filter_map(|(u, _)| u["email"].as_str().map(str::to_string))
            .collect()
    }

    /// Number of stored objects
    pub fn object_count(&self) -> usize {
        self.backend.lock().unwrap().objects.len()
    }

    /// Sends a request through the router
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                panic!("non-JSON body ({}): {}", status, String::from_utf8_lossy(&body))
            })
        };
        (status, headers, json)
    }

    /// JSON request with an optional bearer token
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.send(request).await
    }
}
