pub mod bitfield;
pub mod derived;
pub mod last_reading_cache;
pub mod models;
pub mod pending_writes;
pub mod process;
pub mod readings;
pub mod schedule;
