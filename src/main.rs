#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else)]

use axum::{
    Router,
    routing::{get, post},
};
use axum_login::{
    AuthManagerLayerBuilder,
    tower_sessions::{Expiry, SessionManagerLayer, cookie::time::Duration},
};
use roster::{
    auth::{backend::RosterAuthBackend, postgres_store::PostgresSessionStore},
    config::RuntimeConfiguration,
    routes::{
        index::get_index_route,
        login::{get_login, get_register, post_login, post_logout, post_register},
        sse::sse_feed,
        students::{
            get_students, internal_get_students, internal_post_cancel,
            internal_post_cancel_delete, internal_post_confirm_delete, internal_post_open_create,
            internal_post_open_edit, internal_post_refresh, internal_post_request_delete,
            internal_post_submit,
        },
    },
    state::RosterState,
};
use sqlx::postgres::PgPoolOptions;
use tokio::{net::TcpListener, signal};
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

async fn shutdown_signal(state: RosterState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("signal received, starting graceful shutdown");
    if let Err(e) = state.sensible_shutdown().await {
        error!(?e, "Error sensibly shutting down");
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("no .env file loaded: {e}");
    }

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");

    let options = PgPoolOptions::new().max_connections(15);
    let config = RuntimeConfiguration::new().expect("unable to create config");
    let state = RosterState::new(options, config.clone())
        .await
        .expect("unable to create state");

    let session_store = PostgresSessionStore::new(state.clone());
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(config.session_days())));
    let auth_backend = RosterAuthBackend::new(state.clone());
    let auth_layer = AuthManagerLayerBuilder::new(auth_backend, session_layer).build();

    let app = Router::new()
        .route("/", get(get_index_route))
        .route("/login", get(get_login).post(post_login))
        .route("/logout", post(post_logout))
        .route("/register", get(get_register).post(post_register))
        .route("/students", get(get_students))
        .route("/internal/students", get(internal_get_students))
        .route(
            "/internal/students/open_create",
            post(internal_post_open_create),
        )
        .route("/internal/students/open_edit", post(internal_post_open_edit))
        .route("/internal/students/cancel", post(internal_post_cancel))
        .route("/internal/students/submit", post(internal_post_submit))
        .route(
            "/internal/students/request_delete",
            post(internal_post_request_delete),
        )
        .route(
            "/internal/students/confirm_delete",
            post(internal_post_confirm_delete),
        )
        .route(
            "/internal/students/cancel_delete",
            post(internal_post_cancel_delete),
        )
        .route("/internal/students/refresh", post(internal_post_refresh))
        .route("/sse_feed", get(sse_feed))
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state.clone());

    let server_ip = config.server_ip().to_string();
    let listener = TcpListener::bind(&server_ip)
        .await
        .expect("unable to listen on server ip");

    info!(?server_ip, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("unable to serve app");
}
