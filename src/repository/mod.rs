pub mod database;
pub mod pair_repository;

pub use database::Database;
pub use pair_repository::{PairFilter, PairRepository, PairStats};
