use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use tracing::{debug, info, warn};

use parlor_db::{Database, DbError};
use parlor_types::api::{
    Account, AccountResponse, Claims, LoginRequest, LoginResponse, Notice, OnlineStatusRequest,
    RegisterRequest, RegisterResponse, Success,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::format::avatar_glyph;
use crate::{AppState, run_blocking};

pub const MIN_PASSWORD_LEN: usize = 6;
const INVALID_CREDENTIALS: &str = "Invalid username or password";

// -- Validation --

fn valid_username(username: &str) -> bool {
    (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

fn validate_registration(req: &RegisterRequest) -> ApiResult<()> {
    if !valid_username(&req.username) {
        return Err(ApiError::validation(
            "Username must be 3-32 letters, digits or underscores",
        ));
    }
    if req.full_name.trim().is_empty() {
        return Err(ApiError::validation("Full name is required"));
    }
    if !valid_email(&req.email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// -- Tokens --

pub fn create_token(
    secret: &str,
    ttl_days: i64,
    user_id: i64,
    username: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Decode a bearer token, checking signature and expiry.
pub fn verify_token(secret: &str, token: &str) -> ApiResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::AuthenticationRequired("Invalid or expired token".into())
    })
}

fn issue_token(secret: &str, ttl_days: i64, user_id: i64, username: &str) -> ApiResult<String> {
    create_token(secret, ttl_days, user_id, username)
        .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

// -- Operations --

/// Create an account and return its id.
pub fn register(db: &Database, req: &RegisterRequest) -> ApiResult<i64> {
    validate_registration(req)?;
    let password_hash = hash_password(&req.password)?;

    match db.create_user(
        &req.username,
        req.full_name.trim(),
        &req.email,
        &password_hash,
    ) {
        Ok(user_id) => {
            info!("Registered user {} '{}'", user_id, req.username);
            Ok(user_id)
        }
        Err(DbError::Conflict(_)) => Err(ApiError::Conflict(
            "Username or email already registered".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug)]
pub struct Authenticated {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
}

/// Check credentials and mark the user online. `login` is a username or an
/// email address.
pub fn login(db: &Database, login: &str, password: &str) -> ApiResult<Authenticated> {
    let Some(user) = db.get_user_by_login(login.trim())? else {
        warn!("Login failed for '{}': unknown user", login);
        return Err(ApiError::AuthenticationRequired(INVALID_CREDENTIALS.into()));
    };

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::from(DbError::Corrupt(format!("password hash: {}", e))))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Login failed for '{}': wrong password", login);
        return Err(ApiError::AuthenticationRequired(INVALID_CREDENTIALS.into()));
    }

    db.set_online(user.id, true)?;
    Ok(Authenticated {
        user_id: user.id,
        username: user.username,
        full_name: user.full_name,
    })
}

pub fn account(db: &Database, user_id: i64) -> ApiResult<Account> {
    let user = db
        .get_user_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFoundOrForbidden("User not found".into()))?;

    Ok(Account {
        id: user.id,
        avatar: avatar_glyph(&user.username),
        username: user.username,
        full_name: user.full_name,
        email: user.email,
        avatar_url: user.avatar_url,
        created_at: user.created_at,
    })
}

pub fn set_online(db: &Database, user_id: i64, online: bool) -> ApiResult<()> {
    if db.set_online(user_id, online)? {
        Ok(())
    } else {
        Err(ApiError::NotFoundOrForbidden("User not found".into()))
    }
}

// -- Handlers --

pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.clone();
    let user_id = run_blocking(&state, move |db| register(db, &req)).await?;
    let token = issue_token(&state.jwt_secret, state.token_ttl_days, user_id, &username)?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(RegisterResponse { user_id, token })),
    ))
}

pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = run_blocking(&state, move |db| login(db, &req.login, &req.password)).await?;
    let token = issue_token(
        &state.jwt_secret,
        state.token_ttl_days,
        user.user_id,
        &user.username,
    )?;

    Ok(Json(Success::new(LoginResponse {
        user_id: user.user_id,
        username: user.username,
        full_name: user.full_name,
        token,
    })))
}

pub async fn account_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = run_blocking(&state, move |db| account(db, claims.sub)).await?;
    Ok(Json(Success::new(AccountResponse { user })))
}

pub async fn update_status_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<OnlineStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    run_blocking(&state, move |db| set_online(db, claims.sub, req.online)).await?;
    Ok(Json(Success::new(Notice::new("Status updated successfully"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            full_name: "Test User".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn username_rules() {
        assert!(valid_username("john_doe"));
        assert!(valid_username("abc"));
        assert!(!valid_username("ab"));
        assert!(!valid_username(&"a".repeat(33)));
        assert!(!valid_username("john doe"));
        assert!(!valid_username("jöhn"));
    }

    #[test]
    fn email_rules() {
        assert!(valid_email("john@example.com"));
        assert!(!valid_email("john.example.com"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("john@localhost"));
        assert!(!valid_email("john@a@b.com"));
        assert!(!valid_email("john@.com"));
    }

    #[test]
    fn register_then_login_by_name_or_email() {
        let db = Database::open_in_memory().unwrap();
        let id = register(&db, &request("john_doe", "john@example.com", "secret1")).unwrap();

        let by_name = login(&db, "john_doe", "secret1").unwrap();
        assert_eq!(by_name.user_id, id);
        assert_eq!(by_name.full_name, "Test User");
        let by_email = login(&db, "john@example.com", "secret1").unwrap();
        assert_eq!(by_email.user_id, id);

        assert!(db.get_user_by_id(id).unwrap().unwrap().is_online);
    }

    #[test]
    fn bad_credentials_are_indistinguishable() {
        let db = Database::open_in_memory().unwrap();
        register(&db, &request("john_doe", "john@example.com", "secret1")).unwrap();

        let wrong_password = login(&db, "john_doe", "nope").unwrap_err();
        let unknown_user = login(&db, "ghost", "secret1").unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(matches!(wrong_password, ApiError::AuthenticationRequired(_)));
    }

    #[test]
    fn registration_is_validated() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            register(&db, &request("jo", "john@example.com", "secret1")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            register(&db, &request("john", "john@example.com", "12345")),
            Err(ApiError::Validation(_))
        ));

        register(&db, &request("john", "john@example.com", "secret1")).unwrap();
        assert!(matches!(
            register(&db, &request("john", "other@example.com", "secret1")),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            register(&db, &request("other", "john@example.com", "secret1")),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn password_is_stored_hashed() {
        let db = Database::open_in_memory().unwrap();
        let id = register(&db, &request("john", "john@example.com", "secret1")).unwrap();
        let stored = db.get_user_by_id(id).unwrap().unwrap().password;
        assert!(stored.starts_with("$argon2id$"));
    }

    #[test]
    fn token_round_trip_and_tampering() {
        let token = create_token("test-secret", 1, 42, "john").unwrap();
        let claims = verify_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "john");

        assert!(matches!(
            verify_token("other-secret", &token),
            Err(ApiError::AuthenticationRequired(_))
        ));
        let expired = create_token("test-secret", -2, 42, "john").unwrap();
        assert!(verify_token("test-secret", &expired).is_err());
    }

    #[test]
    fn account_and_status() {
        let db = Database::open_in_memory().unwrap();
        let id = register(&db, &request("john", "john@example.com", "secret1")).unwrap();

        let acct = account(&db, id).unwrap();
        assert_eq!(acct.avatar, "J");
        assert_eq!(acct.email, "john@example.com");
        assert!(matches!(
            account(&db, id + 1),
            Err(ApiError::NotFoundOrForbidden(_))
        ));

        set_online(&db, id, false).unwrap();
        assert!(!db.get_user_by_id(id).unwrap().unwrap().is_online);
    }
}
