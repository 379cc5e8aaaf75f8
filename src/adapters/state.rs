use axum::extract::FromRef;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    adapters::session::SessionService,
    application::services::{
        access_ledger::AccessLedger, account_service::AccountService,
        file_lifecycle::FileLifecycle, ip_block_list::IpBlockList, login_service::LoginService,
        notification_ledger::NotificationLedger,
    },
    domain::config::local::ServerConfig,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub server_config: Arc<ServerConfig>,
    pub sessions: Arc<SessionService>,
    pub file_lifecycle: Arc<FileLifecycle>,
    pub login_service: Arc<LoginService>,
    pub account_service: Arc<AccountService>,
    pub access_ledger: Arc<AccessLedger>,
    pub ip_blocks: Arc<IpBlockList>,
    pub notifications: Arc<NotificationLedger>,
}
