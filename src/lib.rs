//! Polling and derivation coordinator for Marstek Venus batteries over Modbus TCP

pub mod constants;
pub mod coordinator;
pub mod data_mgmt;
pub mod drivers;
pub mod helpers;
pub mod node_mgmt;
pub mod readers;
