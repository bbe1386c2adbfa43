pub mod app;
pub mod auth;
pub mod error;
pub mod routes;

pub use app::{create_app, AppState};
pub use auth::{AuthContext, AuthMode, JwtConfig};
pub use error::AppError;
