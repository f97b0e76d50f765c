use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::users::repo_types::User;

/// Body for POST /api/user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body for PUT /api/user/:id. Only the username can change; any other
/// submitted field is ignored.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
}

/// Body for POST /api/auth/login. `identity` is a username or an email.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identity: String,
    pub password: String,
}

/// Public projection of a user. This is the only user shape handlers
/// return; the password hash stays server-side.
#[derive(Debug, Serialize, FromRow)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Success body for login; carries `token` instead of `data`.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub message: String,
    pub token: String,
}
