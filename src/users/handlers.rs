use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthUser, jwt::JwtKeys, password},
    error::ApiError,
    response::Envelope,
    state::AppState,
    users::{
        dto::{CreateUserRequest, LoginRequest, LoginResponse, PublicUser, UpdateUserRequest},
        repo_types::User,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(get_all_users).post(create_user))
        .route(
            "/user/:id",
            get(get_single_user)
                .put(update_user)
                .delete(delete_user_by_id),
        )
}

/// An identity with valid email syntax is looked up by email, anything
/// else by username. The pattern requires a dot in the domain, so a
/// dotless address like `user@example` falls back to the username lookup.
fn is_valid_email(s: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(s)
}

/// A non-UUID path id cannot match any record.
fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("User not found".into()))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn unique_violation_message(e: &sqlx::Error) -> String {
    let constraint = match e {
        sqlx::Error::Database(db) => db.constraint(),
        _ => None,
    };
    match constraint {
        Some("users_email_key") => "Email already taken".into(),
        _ => "Username already taken".into(),
    }
}

#[instrument(skip(state, _auth, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<PublicUser>>), ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "malformed create body");
        ApiError::BadInput("Something's wrong with your input".into())
    })?;

    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    if User::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already taken");
        return Err(ApiError::Conflict("Email already taken".into()));
    }

    let hash = password::hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal(e)
    })?;

    let user = match User::create(&state.db, &payload.username, &payload.email, &hash).await {
        Ok(u) => u,
        // lost the race with a concurrent create; the constraint wins
        Err(e) if is_unique_violation(&e) => {
            warn!(error = %e, "unique constraint hit on insert");
            return Err(ApiError::Conflict(unique_violation_message(&e)));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(ApiError::storage("Could not create user", e));
        }
    };

    info!(user_id = %user.id, username = %user.username, "user created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::success("User created", PublicUser::from(user))),
    ))
}

#[instrument(skip(state, _auth))]
pub async fn get_all_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Envelope<Vec<PublicUser>>>, ApiError> {
    let users = User::list_public(&state.db).await?;

    // zero rows is an error here, not an empty success
    if users.is_empty() {
        return Err(ApiError::NotFound("Users not found".into()));
    }

    Ok(Json(Envelope::success("Users found", users)))
}

#[instrument(skip(state, _auth))]
pub async fn get_single_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<PublicUser>>, ApiError> {
    let id = parse_user_id(&id)?;
    let user = User::find_public_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(Envelope::success("User found", user)))
}

#[instrument(skip(state, _auth, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<Envelope<PublicUser>>, ApiError> {
    let id = parse_user_id(&id)?;
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    // the body is parsed only once the record is known to exist
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "malformed update body");
        ApiError::BadInput("Something's wrong with your input".into())
    })?;

    let updated = match User::save_username(&state.db, user.id, &payload.username).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(error = %e, "unique constraint hit on update");
            return Err(ApiError::Conflict("Username already taken".into()));
        }
        Err(e) => {
            error!(error = %e, "save user failed");
            return Err(ApiError::storage("Could not update user", e));
        }
    };

    info!(user_id = %updated.id, username = %updated.username, "user updated");
    Ok(Json(Envelope::success(
        "User updated",
        PublicUser::from(updated),
    )))
}

#[instrument(skip(state, _auth))]
pub async fn delete_user_by_id(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_user_id(&id)?;
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    User::delete(&state.db, id).await.map_err(|e| {
        error!(error = %e, user_id = %id, "delete user failed");
        ApiError::storage("Failed to delete user", e)
    })?;

    info!(user_id = %id, "user deleted");
    Ok(Json(Envelope::ok("User deleted")))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "malformed login body");
        ApiError::Unauthorized("Invalid login payload".into())
    })?;

    let user = if is_valid_email(&payload.identity) {
        User::find_by_email(&state.db, &payload.identity).await?
    } else {
        User::find_by_username(&state.db, &payload.identity).await?
    };
    let user = user.ok_or_else(|| {
        warn!(identity = %payload.identity, "login unknown identity");
        ApiError::NotFound("User does not exist".into())
    })?;

    if !password::verify_password(&payload.password, &user.password_hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Password incorrect".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&payload.identity).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Internal(e)
    })?;

    info!(user_id = %user.id, identity = %payload.identity, "user logged in");
    Ok(Json(LoginResponse {
        status: "success",
        message: "Success login".into(),
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_identities_route_through_email_lookup() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn bare_words_route_through_username_lookup() {
        assert!(!is_valid_email("someuser"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user name@example.com"));
    }

    #[test]
    fn dotless_domain_falls_back_to_username_lookup() {
        assert!(!is_valid_email("user@example"));
    }

    #[test]
    fn non_uuid_path_id_is_not_found() {
        let err = parse_user_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn valid_uuid_path_id_parses() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
    }
}
