use crate::models::user::Role;
use crate::utils::error::{AppError, AppResult};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use rocket_okapi::request::OpenApiFromRequest;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: Role,
    pub exp: usize,
}

// Signing secret shared by token issuance and the request guard
pub struct JwtSecret(pub String);

#[derive(Debug, Clone, Copy, OpenApiFromRequest)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthenticatedUser {
    // Owners see their own records, admins see everything
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.role.is_admin() || self.user_id == owner_id
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin only".into()))
        }
    }
}

pub fn generate_token(
    secret: &str,
    user_id: Uuid,
    role: Role,
    ttl: chrono::Duration,
) -> AppResult<String> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::AuthError("token expiry out of range".into()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::AuthError(e.to_string()))
}

pub fn verify_token(secret: &str, token: &str) -> AppResult<AuthenticatedUser> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthError(e.to_string()))?;

    let user_id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::AuthError("malformed subject".into()))?;

    Ok(AuthenticatedUser {
        user_id,
        role: token_data.claims.role,
    })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = match request.headers().get_one("Authorization") {
            Some(token) if token.starts_with("Bearer ") => &token[7..],
            _ => {
                return Outcome::Error((
                    Status::Unauthorized,
                    AppError::AuthError("missing bearer token".into()),
                ))
            }
        };

        let Some(secret) = request.rocket().state::<JwtSecret>() else {
            return Outcome::Error((
                Status::InternalServerError,
                AppError::DatabaseError("token secret not configured".into()),
            ));
        };

        match verify_token(&secret.0, token) {
            Ok(user) => Outcome::Success(user),
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}
