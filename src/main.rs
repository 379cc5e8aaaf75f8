mod adapters;
mod application;
mod domain;
mod services;
#[cfg(test)]
mod test_support;

use std::{net::SocketAddr, sync::Arc};

use adapters::{
    controllers::{
        admin_controller::AdminController, auth_controller::AuthController,
        file_controller::{upload_body_limit, FileController},
        health_controller::HealthController,
        user_controller::UserController,
    },
    middleware::require_admin,
    repositories::{JsonAccountRepository, JsonFileRepository},
    session::SessionService,
    state::AppState,
    tasks,
};
use application::{
    repositories::{account_repository::AccountRepository, file_repository::FileRepository},
    services::{
        access_ledger::AccessLedger,
        account_reaper::AccountReaper,
        account_service::AccountService,
        authentication::Authenticator,
        capacity_gate::{CapacityGate, CapacityThresholds},
        file_lifecycle::FileLifecycle,
        ip_block_list::IpBlockList,
        lockout_tracker::{LockoutPolicy, LockoutTracker},
        login_service::LoginService,
        notification_ledger::NotificationLedger,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use domain::{
    config::{global::PolicyConfig, local::ServerConfig, secrets::Secrets},
    models::identity::AdminRoster,
};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server_config = ServerConfig::from_env().expect("ERROR: Invalid server configuration");
    let policy = PolicyConfig::from_env().expect("ERROR: Invalid policy configuration");
    let secrets = Secrets::from_env().expect("ERROR: Missing secrets");

    tracing::info!(
        "Starting share-vault with {:?} storage",
        server_config.provider
    );

    // Configure CORS
    let cors = if let Some(origins) = &server_config.cors_allowed_origins {
        let origins: Vec<_> = origins
            .iter()
            .map(|s| s.parse().expect("Invalid CORS origin"))
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Allow all origins if not specified (only for development)
        CorsLayer::permissive()
    };

    let (storage, documents) = services::create_storage_backend(&server_config, &secrets)
        .await
        .expect("Failed to create storage backend");

    // Load persisted documents in parallel
    tracing::info!("Loading persisted state...");
    let (files_result, accounts_result) = tokio::join!(
        JsonFileRepository::load(documents.clone()),
        JsonAccountRepository::load(documents.clone())
    );
    let files = Arc::new(files_result.expect("Failed to load file records"))
        as Arc<dyn FileRepository>;
    let accounts = Arc::new(accounts_result.expect("Failed to load accounts"))
        as Arc<dyn AccountRepository>;

    let roster = AdminRoster::new(secrets.administrators.clone())
        .expect("ERROR: Invalid administrator configuration");

    let notifications = Arc::new(NotificationLedger::new(policy.notification_capacity));
    let ip_blocks = Arc::new(IpBlockList::new(
        policy.ip_block_duration(),
        notifications.clone(),
    ));
    let lockouts = Arc::new(LockoutTracker::new(LockoutPolicy::from_policy(&policy)));
    let access_ledger = Arc::new(AccessLedger::new(ip_blocks.clone(), notifications.clone()));

    let gate = Arc::new(CapacityGate::new(
        storage.clone(),
        notifications.clone(),
        policy.storage_limit_bytes,
        CapacityThresholds::from_policy(&policy),
    ));
    let file_lifecycle = Arc::new(FileLifecycle::new(
        files.clone(),
        accounts.clone(),
        storage,
        gate.clone(),
        policy.max_upload_bytes,
    ));

    let authenticator = Arc::new(Authenticator::new(roster.clone(), accounts.clone()));
    let login_service = Arc::new(LoginService::new(
        ip_blocks.clone(),
        lockouts,
        authenticator,
        access_ledger.clone(),
        accounts.clone(),
    ));
    let account_service = Arc::new(AccountService::new(accounts.clone(), files, roster));
    let reaper = Arc::new(AccountReaper::new(
        accounts,
        file_lifecycle.clone(),
        policy.inactivity_window(),
    ));

    let rescheduled = file_lifecycle
        .reload_timers()
        .await
        .expect("Failed to schedule expiry timers");
    tracing::info!("Scheduled expiry for {} file(s)", rescheduled);

    tasks::start_expiry_sweep_task(file_lifecycle.clone(), policy.expiry_sweep_interval_secs);
    tasks::start_account_reaper_task(reaper, policy.reaper_interval_secs);
    tasks::start_capacity_monitor_task(gate, policy.capacity_check_interval_secs);

    let sessions = Arc::new(SessionService::new(
        &secrets.session_secret,
        chrono::Duration::hours(policy.session_ttl_hours),
    ));

    let port = server_config.port;
    let body_limit = upload_body_limit(policy.max_upload_bytes);

    let app_state = AppState {
        started_at: chrono::Utc::now(),
        server_config: Arc::new(server_config),
        sessions,
        file_lifecycle,
        login_service,
        account_service,
        access_ledger,
        ip_blocks,
        notifications,
    };

    // Admin routes (admin session required)
    let admin_routes = Router::new()
        .route("/api/files", get(FileController::list_files))
        .route(
            "/api/admin/notifications",
            get(AdminController::notifications),
        )
        .route(
            "/api/admin/login-requests",
            get(AdminController::pending_logins),
        )
        .route(
            "/api/admin/login-requests/{id}/approve",
            post(AdminController::approve_login),
        )
        .route(
            "/api/admin/login-requests/{id}/deny",
            post(AdminController::deny_login),
        )
        .route(
            "/api/admin/access-requests",
            get(AdminController::access_requests),
        )
        .route(
            "/api/admin/access-requests/{id}",
            post(AdminController::handle_access_request),
        )
        .route("/api/admin/blocked-ips", get(AdminController::blocked_ips))
        .route(
            "/api/admin/storage/unlock",
            post(AdminController::unlock_storage),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    // Session-checked per handler through the Caller extractor
    let public_routes = Router::new()
        .route("/api/health", get(HealthController::health_check))
        .route(
            "/api/upload",
            post(FileController::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/file/{code}",
            get(FileController::get_file_info).delete(FileController::delete_file),
        )
        .route("/api/download/{code}", get(FileController::download_file))
        .route("/api/storage/status", get(FileController::storage_status))
        .route("/api/auth/signup", post(AuthController::signup))
        .route("/api/auth/login", post(AuthController::login))
        .route(
            "/api/auth/admin-login/{request_id}",
            get(AuthController::poll_admin_login),
        )
        .route(
            "/api/users/me",
            get(UserController::get_profile).patch(UserController::update_profile),
        )
        .route("/api/users/me/files", get(UserController::get_own_files))
        .route("/api/access-requests", post(UserController::request_access));

    let router = Router::new()
        .merge(admin_routes)
        .merge(public_routes)
        .layer(cors)
        .with_state(app_state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind to port");

    tracing::info!("Server listening on 0.0.0.0:{}", port);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
