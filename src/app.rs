//! Application assembly: shared state, extractor limits, middleware and routes.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::web;
use sqlx::postgres::PgPoolOptions;

use crate::auth::{AuthService, PasswordHasher, PasswordPolicy, TokenService};
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{RateLimit, RateLimiter, RequestValidation};
use crate::repository::{
    postgres, MemoryTaskRepository, MemoryUserRepository, PgTaskRepository, PgUserRepository,
    TaskRepository, UserRepository,
};
use crate::routes::{self, health, API_PREFIX};
use crate::sanitizer::Sanitizer;
use crate::tasks::TaskService;

/// Everything a handler needs. Cloned into each worker; the contents are shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub tasks: TaskService,
    pub tokens: Arc<TokenService>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Self {
        let sanitizer = Arc::new(Sanitizer::from_config(&config));
        let tokens = Arc::new(TokenService::from_config(&config));
        let auth = AuthService::new(
            users,
            tokens.clone(),
            PasswordHasher::new(config.bcrypt_rounds),
            PasswordPolicy::new(config.password_min_length),
            sanitizer.clone(),
        );

        Self {
            auth,
            tasks: TaskService::new(tasks, sanitizer),
            tokens,
            limiter: Arc::new(RateLimiter::from_config(&config)),
            config: Arc::new(config),
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemoryTaskRepository::new()),
        )
    }

    /// Connects to Postgres and applies migrations when `DATABASE_URL` is set, otherwise
    /// falls back to the in-memory store.
    pub async fn connect(config: Config) -> Result<Self, AppError> {
        let database_url = match &config.database_url {
            Some(url) => url.clone(),
            None => {
                log::warn!("DATABASE_URL is not set; using the in-memory store, data will not persist");
                return Ok(Self::in_memory(config));
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&database_url)
            .await?;
        postgres::migrate(&pool).await?;
        log::info!("Connected to database, migrations applied");

        Ok(Self::new(
            config,
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgTaskRepository::new(pool)),
        ))
    }
}

/// Registers state, extractor configuration, unversioned endpoints and the `/api/v1`
/// scope with its request validation and rate limiting.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let max_request_size = state.config.max_request_size;

    cfg.app_data(web::Data::new(state.clone()))
        .app_data(
            web::JsonConfig::default()
                .limit(max_request_size)
                .error_handler(|err, _req| AppError::from(err).into()),
        )
        .app_data(web::QueryConfig::default().error_handler(|err, _req| AppError::from(err).into()))
        .app_data(web::PathConfig::default().error_handler(|err, _req| AppError::from(err).into()))
        .service(health::health)
        .service(health::root)
        .service(
            web::scope(API_PREFIX)
                .wrap(RequestValidation::new(max_request_size))
                .wrap(RateLimit::new(state.limiter.clone(), state.tokens.clone()))
                .configure(routes::config),
        );
}

/// CORS policy for the configured origins.
pub fn cors(config: &Config) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(3600);

    config
        .cors_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
