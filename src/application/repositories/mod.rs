pub mod account_repository;
pub mod file_repository;
