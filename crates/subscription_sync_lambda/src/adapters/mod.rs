pub mod log_groups;
pub mod secret_store;
