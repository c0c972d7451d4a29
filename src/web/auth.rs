use axum::extract::{Request, State};
use axum::http::header;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::AppState;
use crate::components::session::SessionUser;
use crate::config::Config;
use crate::error::{other_error, AppResult};

/// Name of the cookie holding the app token
pub const SESSION_COOKIE: &str = "daybook_session";

/// Paths reachable without a session
const PUBLIC_PATHS: [&str; 3] = ["/login", "/signup", "/health"];
const ASSETS_PREFIX: &str = "/assets";

/// JWT claims of the app cookie
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Backend user id
    pub sub: String,
    pub email: Option<String>,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

/// Signing settings for the app cookie
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration_minutes: i64,
}

impl AuthConfig {
    /// Use the configured secret, or a random one that lives as long as the process
    pub fn from_config(config: &Config) -> Self {
        let jwt_secret = config.jwt_secret.clone().unwrap_or_else(random_secret);
        Self {
            jwt_secret,
            token_expiration_minutes: config.session_ttl_minutes,
        }
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    /// Nobody is signed in to the backend
    SignedOut,
    /// Valid token for someone other than the session user
    WrongUser,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        debug!("Rejected request: {:?}", self);
        Redirect::to("/login").into_response()
    }
}

/// Pull the app token from the session cookie, falling back to a Bearer header
pub fn extract_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Ok(cookie.value().to_string());
        }
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let auth_str = auth_header.to_str().map_err(|_| AuthError::InvalidToken)?;
    auth_str
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or(AuthError::InvalidToken)
}

/// Issues and checks app tokens
pub struct AuthService {
    config: Arc<AuthConfig>,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Sign a token for `user`
    pub fn generate_token(&self, user: &SessionUser) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.token_expiration_minutes);

        let claims = Claims {
            sub: user.id.to_string(),
            email: Some(user.email.clone()).filter(|e| !e.is_empty()),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| other_error(&format!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|token_data| token_data.claims)
        .map_err(|e| {
            debug!("JWT validation error: {:?}", e);
            AuthError::InvalidToken
        })
    }

    /// The cookie a successful sign-in hands to the browser
    pub fn session_cookie(&self, user: &SessionUser) -> AppResult<Cookie<'static>> {
        let token = self.generate_token(user)?;
        Ok(Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::minutes(self.config.token_expiration_minutes))
            .build())
    }
}

/// Cookie that removes the session cookie
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build()
}

/// The signed-in user, when both the session and the request's token agree on who it is.
/// Waits for the startup probe before deciding.
async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<SessionUser, AuthError> {
    let user = state
        .session
        .current_user()
        .await
        .ok_or(AuthError::SignedOut)?;
    let token = extract_token(headers)?;
    let claims = state.auth_service.validate_token(&token)?;
    if claims.sub != user.id.to_string() {
        return Err(AuthError::WrongUser);
    }
    Ok(user)
}

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || path.starts_with(ASSETS_PREFIX)
}

/// Route guard: public paths pass, everything else needs a signed-in session and a
/// matching token. The authorized user is handed to handlers as an extension.
pub async fn route_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();

    if is_public(&path) {
        if path == "/login" || path == "/signup" {
            let signed_in = authorize(&state, req.headers()).await.is_ok();
            if signed_in {
                return Redirect::to("/").into_response();
            }
        }
        return next.run(req).await;
    }

    let authorized = authorize(&state, req.headers()).await;
    match authorized {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) if req.method() == Method::GET => {
            debug!("Redirecting to login: {:?}", e);
            let target = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or(path);
            if target == "/" {
                return Redirect::to("/login").into_response();
            }
            Redirect::to(&format!("/login?next={}", urlencoding::encode(&target))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Only local absolute paths are followed after sign-in
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if is_local_path(path) => path,
        _ => "/",
    }
}

/// Browsers read a backslash as `/`, so `/\host` would leave the site
fn is_local_path(path: &str) -> bool {
    if !path.starts_with('/') || path.starts_with("//") {
        return false;
    }
    if path.chars().any(|c| c == '\\' || c.is_control()) {
        return false;
    }
    let Ok(base) = url::Url::parse("http://localhost/") else {
        return false;
    };
    base.join(path)
        .is_ok_and(|target| target.origin() == base.origin())
}
