// PostgreSQL access for the durable identity store

pub mod pool;

pub use pool::DbPool;
