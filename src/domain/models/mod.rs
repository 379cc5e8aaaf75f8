pub mod file;
pub mod identity;
pub mod metadata;
pub mod notification;
pub mod security;
pub mod user;
