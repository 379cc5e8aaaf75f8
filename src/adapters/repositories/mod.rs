mod json_account_repository;
mod json_file_repository;

pub use json_account_repository::JsonAccountRepository;
pub use json_file_repository::JsonFileRepository;
