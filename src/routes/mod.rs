pub mod auth;
pub mod health;
pub mod tasks;

use actix_web::web;

/// Version prefix for every resource route.
pub const API_PREFIX: &str = "/api/v1";

/// Registers the versioned resource routes. Mounted under [`API_PREFIX`].
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::login)
            .service(auth::refresh)
            .service(auth::me)
            .service(auth::password_reset_request)
            .service(auth::password_reset_confirm),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    );
}
