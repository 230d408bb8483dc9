//! Account lifecycle: registration, credential checks, token issuance and password reset.

use std::sync::Arc;

use validator::Validate;

use super::password::{PasswordHasher, PasswordPolicy};
use super::token::{TokenKind, TokenService};
use super::{RegisterRequest, TokenResponse};
use crate::error::AppError;
use crate::models::{normalize_email, NewUser, User};
use crate::repository::UserRepository;
use crate::sanitizer::Sanitizer;

const INVALID_CREDENTIALS: &str = "Could not validate credentials";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    sanitizer: Arc<Sanitizer>,
    /// Hashed at the configured cost so a miss in `authenticate` does the same bcrypt work
    /// as a wrong password.
    decoy_hash: Option<Arc<str>>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        hasher: PasswordHasher,
        policy: PasswordPolicy,
        sanitizer: Arc<Sanitizer>,
    ) -> Self {
        let decoy_hash = match hasher.hash_password(DECOY_PASSWORD) {
            Ok(hash) => Some(Arc::from(hash)),
            Err(e) => {
                log::warn!("Could not prepare decoy password hash: {}", e);
                None
            }
        };

        Self {
            users,
            tokens,
            hasher,
            policy,
            sanitizer,
            decoy_hash,
        }
    }

    pub fn users(&self) -> &Arc<dyn UserRepository> {
        &self.users
    }

    /// Creates an account. Every field problem is reported at once; a taken email is
    /// a `Conflict`.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        let request = request.normalized();
        let mut errors = match request.validate() {
            Ok(()) => Vec::new(),
            Err(e) => match AppError::from(e) {
                AppError::Validation(fields) => fields,
                other => return Err(other),
            },
        };

        let name = if errors.iter().any(|e| e.field == "name") {
            None
        } else {
            self.sanitizer
                .clean_field("name", "Name", &request.name)
                .map_err(|e| errors.push(e))
                .ok()
        };

        if let Err(mut policy_errors) = self.policy.check("password", &request.password) {
            errors.append(&mut policy_errors);
        }

        let name = match name {
            Some(name) if errors.is_empty() => name,
            _ => return Err(AppError::Validation(errors)),
        };

        let email = request.email;
        if self.users.find_by_email(&email).await?.is_some() {
            log::info!("Registration rejected, email already in use: {}", email);
            return Err(AppError::Conflict("Email address is already registered".into()));
        }

        let password_hash = self.hasher.hash_password(&request.password)?;
        let user = self
            .users
            .insert(NewUser {
                email,
                name,
                password_hash,
            })
            .await?;

        log::info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Returns `None` for an unknown email, an inactive account, or a wrong password,
    /// without distinguishing between them.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        let user = match self.users.find_by_email(&normalize_email(email)).await? {
            Some(user) if user.is_active => user,
            _ => {
                if let Some(decoy) = &self.decoy_hash {
                    let _ = self.hasher.verify_password(password, decoy);
                }
                return Ok(None);
            }
        };

        if self.hasher.verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, AppError> {
        match self.authenticate(email, password).await? {
            Some(user) => {
                log::info!("User {} logged in", user.id);
                self.token_pair(&user)
            }
            None => {
                log::info!("Failed login attempt for {}", normalize_email(email));
                Err(AppError::Unauthorized("Incorrect email or password".into()))
            }
        }
    }

    /// Exchanges a refresh token for a fresh access/refresh pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let user = self.user_for_token(refresh_token, TokenKind::Refresh).await?;
        log::debug!("Refreshed tokens for user {}", user.id);
        self.token_pair(&user)
    }

    /// The active user an access token belongs to.
    pub async fn resolve_user(&self, access_token: &str) -> Result<User, AppError> {
        self.user_for_token(access_token, TokenKind::Access).await
    }

    /// Issues a reset token when `email` belongs to an active account.
    ///
    /// There is no mail transport; the token is logged at debug level and returned so
    /// callers can deliver it.
    pub async fn request_password_reset(&self, email: &str) -> Result<Option<String>, AppError> {
        let email = normalize_email(email);
        match self.users.find_by_email(&email).await? {
            Some(user) if user.is_active => {
                let token = self.tokens.issue_password_reset_token(&user.email)?;
                log::info!("Password reset requested for user {}", user.id);
                log::debug!("Password reset token for {}: {}", user.email, token);
                Ok(Some(token))
            }
            _ => {
                log::info!("Password reset requested for unknown email {}", email);
                Ok(None)
            }
        }
    }

    /// Sets a new password for the active account with this email. Returns false if
    /// there is no such account.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<bool, AppError> {
        self.policy
            .check("new_password", new_password)
            .map_err(AppError::Validation)?;

        let user = match self.users.find_by_email(&normalize_email(email)).await? {
            Some(user) if user.is_active => user,
            _ => return Ok(false),
        };

        let password_hash = self.hasher.hash_password(new_password)?;
        let updated = self.users.update_password(user.id, &password_hash).await?;
        if updated {
            log::info!("Password reset for user {}", user.id);
        }
        Ok(updated)
    }

    /// Verifies a reset token and applies the new password.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        self.policy
            .check("new_password", new_password)
            .map_err(AppError::Validation)?;

        let email = self
            .tokens
            .verify_password_reset_token(token)
            .map_err(|e| {
                log::info!("Rejected password reset token: {}", e);
                AppError::BadRequest(INVALID_RESET_TOKEN.into())
            })?;

        if self.reset_password(&email, new_password).await? {
            Ok(())
        } else {
            Err(AppError::BadRequest(INVALID_RESET_TOKEN.into()))
        }
    }

    async fn user_for_token(&self, token: &str, kind: TokenKind) -> Result<User, AppError> {
        let claims = self.tokens.verify_token(token, kind).map_err(|e| {
            log::debug!("Rejected {:?} token: {}", kind, e);
            AppError::from(e)
        })?;

        let user_id = claims
            .sub
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AppError::Unauthorized(INVALID_CREDENTIALS.into())),
        }
    }

    fn token_pair(&self, user: &User) -> Result<TokenResponse, AppError> {
        Ok(TokenResponse {
            access_token: self.tokens.issue_access_token(user.id, &user.email)?,
            refresh_token: self.tokens.issue_refresh_token(user.id, &user.email)?,
            token_type: "bearer".to_string(),
            expires_in: self.tokens.access_ttl().num_seconds(),
        })
    }
}
