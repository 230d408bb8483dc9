//! Fixed-window request throttling for the versioned API.
//!
//! Requests are counted per (class, caller) where the caller is `user:<id>` for a valid
//! access token and `ip:<peer address>` otherwise. Classes have independent limits:
//!
//! - **auth**: every `/auth/*` route except `GET /auth/me`
//! - **read**: `GET`/`HEAD`, and `GET /auth/me`
//! - **write**: everything else
//!
//! The request that pushes a counter past its limit is answered with 429 and a
//! `Retry-After` header holding the seconds left in the window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::{bearer_token, TokenKind, TokenService};
use crate::config::Config;
use crate::error::AppError;
use crate::routes::API_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    Read,
    Write,
    Auth,
}

impl RateClass {
    /// `path` may be given with or without the API prefix.
    pub fn classify(method: &Method, path: &str) -> Self {
        let path = path.strip_prefix(API_PREFIX).unwrap_or(path);
        let is_read = method == Method::GET || method == Method::HEAD;

        if path == "/auth/me" && is_read {
            RateClass::Read
        } else if path.starts_with("/auth/") {
            RateClass::Auth
        } else if is_read {
            RateClass::Read
        } else {
            RateClass::Write
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Default)]
struct Counters {
    windows: HashMap<(RateClass, String), Window>,
    last_prune: Option<Instant>,
}

/// Shared counter table. Cheap to check; one lock per request.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    read_limit: u32,
    write_limit: u32,
    auth_limit: u32,
    window: Duration,
    counters: Mutex<Counters>,
}

impl RateLimiter {
    pub fn new(read_limit: u32, write_limit: u32, auth_limit: u32, window: Duration) -> Self {
        Self {
            enabled: true,
            read_limit,
            write_limit,
            auth_limit,
            window,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut limiter = Self::new(
            config.rate_limit_read_requests,
            config.rate_limit_write_requests,
            config.rate_limit_auth_requests,
            Duration::from_secs(config.rate_limit_window_seconds),
        );
        limiter.enabled = config.rate_limit_enabled;
        limiter
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limit_for(&self, class: RateClass) -> u32 {
        match class {
            RateClass::Read => self.read_limit,
            RateClass::Write => self.write_limit,
            RateClass::Auth => self.auth_limit,
        }
    }

    pub fn check(&self, class: RateClass, key: &str) -> Result<(), AppError> {
        self.check_at(class, key, Instant::now())
    }

    /// Counts one request made at `now`.
    pub fn check_at(&self, class: RateClass, key: &str, now: Instant) -> Result<(), AppError> {
        if !self.enabled {
            return Ok(());
        }

        let mut counters = self.lock();
        self.prune(&mut counters, now);

        let window = counters
            .windows
            .entry((class, key.to_string()))
            .or_insert(Window {
                started: now,
                count: 0,
            });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        window.count = window.count.saturating_add(1);
        if window.count > self.limit_for(class) {
            let elapsed = now.duration_since(window.started);
            let remaining = self.window.saturating_sub(elapsed);
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            log::warn!("Rate limit exceeded for {} ({:?})", key, class);
            return Err(AppError::RateLimited {
                retry_after: retry_after.max(1),
            });
        }

        Ok(())
    }

    /// Number of live counters.
    pub fn tracked(&self) -> usize {
        self.lock().windows.len()
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drops expired windows, at most once per window length.
    fn prune(&self, counters: &mut Counters, now: Instant) {
        match counters.last_prune {
            Some(last) if now.duration_since(last) < self.window => return,
            _ => {}
        }
        let window = self.window;
        counters
            .windows
            .retain(|_, w| now.duration_since(w.started) < window);
        counters.last_prune = Some(now);
    }
}

/// Middleware applying a [`RateLimiter`] to every request it wraps.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    tokens: Arc<TokenService>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, tokens: Arc<TokenService>) -> Self {
        Self { limiter, tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service,
            limiter: self.limiter.clone(),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: S,
    limiter: Arc<RateLimiter>,
    tokens: Arc<TokenService>,
}

impl<S> RateLimitService<S> {
    fn caller_key(&self, req: &ServiceRequest) -> String {
        let user_id = bearer_token(req.headers())
            .ok()
            .flatten()
            .and_then(|token| self.tokens.verify_token(&token, TokenKind::Access).ok())
            .and_then(|claims| claims.sub);

        match user_id {
            Some(id) => format!("user:{}", id),
            None => format!(
                "ip:{}",
                req.peer_addr()
                    .map(|addr| addr.ip().to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ),
        }
    }
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
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
        if self.limiter.is_enabled() {
            let class = RateClass::classify(req.method(), req.path());
            let key = self.caller_key(&req);

            if let Err(app_err) = self.limiter.check(class, &key) {
                let res = req.error_response(app_err).map_into_right_body();
                return Box::pin(async move { Ok(res) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
