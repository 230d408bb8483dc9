use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        Method,
    },
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::error::AppError;

/// Rejects oversized bodies (413) and non-JSON writes (415) before routing.
///
/// Only a declared `Content-Length` is checked here; chunked bodies are bounded by the
/// JSON extractor's limit.
pub struct RequestValidation {
    max_body_size: usize,
}

impl RequestValidation {
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestValidation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequestValidationService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestValidationService {
            service,
            max_body_size: self.max_body_size,
        }))
    }
}

pub struct RequestValidationService<S> {
    service: S,
    max_body_size: usize,
}

impl<S, B> Service<ServiceRequest> for RequestValidationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Err(app_err) = check_request(&req, self.max_body_size) {
            let res = req.error_response(app_err).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}

fn check_request(req: &ServiceRequest, limit: usize) -> Result<(), AppError> {
    let method = req.method();
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<usize>().ok());

    if let Some(length) = declared {
        if length > limit {
            log::warn!("Rejected {} {}: body of {} bytes", method, req.path(), length);
            return Err(AppError::PayloadTooLarge { limit });
        }
    }

    if method == Method::POST || method == Method::PUT || method == Method::PATCH {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !is_json(content_type) {
            return Err(AppError::UnsupportedMediaType(
                "Content-Type must be application/json".into(),
            ));
        }
    }

    Ok(())
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
