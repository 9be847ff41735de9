pub mod pool;
pub mod query;
pub mod store;
pub mod user_store;
