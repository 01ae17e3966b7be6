pub mod app_config;
pub mod database;
pub mod memory_repo;
pub mod seat_repo;

pub use database::DbClient;
pub use memory_repo::InMemorySeatRepository;
pub use seat_repo::PostgresSeatRepository;
