//! Modbus TCP transport
//!
//! [`Connector`] opens links, [`Link`] carries one request at a time, and
//! [`session::TransportSession`] owns the single live link, classifies errors
//! and recreates the link after a connection failure.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::drivers::RegisterTable;

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod session;

pub use client::TcpConnector;
pub use session::{SessionState, TransportSession};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The device answered, but not with what was asked for
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("device exception: {0}")]
    Exception(String),
}

impl TransportError {
    /// Errors after which the link can no longer be trusted
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_) | TransportError::Timeout(_)
        )
    }
}

pub trait Link: Send {
    fn read(
        &mut self,
        table: RegisterTable,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, TransportError>> + Send;

    fn write(
        &mut self,
        address: u16,
        words: &[u16],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

pub trait Connector: Send + Sync + 'static {
    type Link: Link + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;

    /// Human-readable peer address for logs
    fn describe(&self) -> String;
}
