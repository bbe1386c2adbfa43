use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

// ─── AuthMode ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum AuthMode {
    None,
    Jwt(JwtConfig),
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub algorithm: Algorithm,
    pub secret: Option<String>,
    pub public_key: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

// ─── AuthContext ─────────────────────────────────────────────────────────────

/// A scope named `"*"` grants every operation; anything else is matched
/// literally against the scope a route requires (e.g. `"webhooks:manage"`).
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub sub: Option<String>,
    pub scope: Vec<String>,
}

impl AuthContext {
    pub fn open() -> Self {
        Self {
            sub: None,
            scope: vec!["*".to_string()],
        }
    }
}

pub fn check_scope(auth: &AuthContext, required: &str) -> bool {
    auth.scope.iter().any(|s| s == "*" || s == required)
}

// ─── JWT Claims ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    scope: Option<Vec<String>>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    iat: Option<u64>,
}

// ─── Auth Middleware ─────────────────────────────────────────────────────────

pub async fn auth_middleware(
    State(auth_mode): State<Arc<AuthMode>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match auth_mode.as_ref() {
        AuthMode::None => {
            req.extensions_mut().insert(AuthContext::open());
            next.run(req).await
        }
        AuthMode::Jwt(config) => {
            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok());

            let token = match auth_header {
                Some(header) if header.starts_with("Bearer ") => &header[7..],
                _ => {
                    return (
                        axum::http::StatusCode::UNAUTHORIZED,
                        axum::Json(json!({ "error": "Missing Bearer token" })),
                    )
                        .into_response();
                }
            };

            match decode_jwt(token, config) {
                Ok(ctx) => {
                    req.extensions_mut().insert(ctx);
                    next.run(req).await
                }
                Err(_) => (
                    axum::http::StatusCode::UNAUTHORIZED,
                    axum::Json(json!({ "error": "Invalid or expired token" })),
                )
                    .into_response(),
            }
        }
    }
}

fn decode_jwt(token: &str, config: &JwtConfig) -> Result<AuthContext, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(config.algorithm);

    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }

    if let Some(ref audience) = config.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    let key = if let Some(ref secret) = config.secret {
        DecodingKey::from_secret(secret.as_bytes())
    } else if let Some(ref public_key) = config.public_key {
        DecodingKey::from_rsa_pem(public_key.as_bytes())?
    } else {
        return Err(jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::InvalidKeyFormat,
        ));
    };

    let token_data = decode::<JwtClaims>(token, &key, &validation)?;
    let claims = token_data.claims;

    Ok(AuthContext {
        sub: claims.sub,
        scope: claims.scope.unwrap_or_default(),
    })
}
