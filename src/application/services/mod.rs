pub mod access_ledger;
pub mod account_reaper;
pub mod account_service;
pub mod authentication;
pub mod capacity_gate;
pub mod document_store;
pub mod file_lifecycle;
pub mod ip_block_list;
pub mod lockout_tracker;
pub mod login_service;
pub mod notification_ledger;
pub mod password;
pub mod share_code;
pub mod storage_service;
