// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, articles, auth, notifications, proxy},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, founder_middleware, viewer_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, articles, notifications, admin, proxy).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (services and configuration).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify", get(auth::verify))
        .route("/password/forgot", post(auth::forgot_password))
        .route("/password/reset", post(auth::reset_password))
        // Protected auth routes
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .route("/password", put(auth::change_password))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let article_routes = Router::new()
        .route("/", get(articles::list_articles))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_middleware,
        ))
        .merge(
            Router::new()
                .route("/", post(articles::create_article))
                .route("/{id}", delete(articles::delete_article))
                .route("/{id}/like", post(articles::toggle_like))
                .route("/{id}/comments", post(articles::create_comment))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let comment_routes = Router::new()
        .route("/{id}", delete(articles::delete_comment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let notification_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/read", post(notifications::mark_read))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ))
        .merge(
            Router::new()
                .route("/users/{id}/admin", put(admin::set_admin))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    founder_middleware,
                )),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/articles", article_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/notifications", notification_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/categories", get(articles::list_categories))
        .route("/api/proxy/{file}", get(proxy::serve_file))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
