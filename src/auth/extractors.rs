use actix_web::dev::Payload;
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{web, Error as ActixError, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::app::AppState;
use crate::error::AppError;
use crate::models::User;

const HEADER_MISSING: &str = "Authorization header missing";
const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// Reads a bearer token from the `Authorization` header.
///
/// `Ok(None)` when the header is absent. A header with any other scheme, or with an
/// empty token, is an error.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) => value,
        None => return Ok(None),
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim().to_string()))
        }
        _ => Err(AppError::Unauthorized(INVALID_CREDENTIALS.into())),
    }
}

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalServerError("Application state is not configured".into()))
}

/// The authenticated caller. Rejects the request when no valid access token is sent.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let resolved = app_state(req).and_then(|state| Ok((state, bearer_token(req.headers())?)));

        Box::pin(async move {
            let (state, token) = resolved?;
            let token = token.ok_or_else(|| AppError::Unauthorized(HEADER_MISSING.into()))?;
            let user = state.auth.resolve_user(&token).await?;
            Ok::<_, ActixError>(CurrentUser(user))
        })
    }
}

/// The caller, if any.
///
/// Without an `Authorization` header the request is anonymous, unless `AUTH_REQUIRED`
/// is set. A header that is present must carry a valid access token.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl FromRequest for MaybeUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let resolved = app_state(req).and_then(|state| Ok((state, bearer_token(req.headers())?)));

        Box::pin(async move {
            let (state, token) = resolved?;
            let user = match token {
                Some(token) => Some(state.auth.resolve_user(&token).await?),
                None if state.config.auth_required => {
                    return Err(AppError::Unauthorized(HEADER_MISSING.into()).into());
                }
                None => None,
            };
            Ok::<_, ActixError>(MaybeUser(user))
        })
    }
}
