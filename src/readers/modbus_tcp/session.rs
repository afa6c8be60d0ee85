use std::time::Duration;

use chrono::{DateTime, offset::Utc};
use serde::Serialize;
use tokio::time::{sleep, timeout};

use super::{Connector, Link, TransportError};
use crate::drivers::RegisterTable;
use crate::helpers::now_utc;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub connected: bool,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Owns at most one live link and serializes every request through it
///
/// The link is opened lazily. After a connection error or a timeout it is
/// dropped and a fresh one is opened on the next request, since a link whose
/// request was cut short cannot be trusted to be in sync with the device.
pub struct TransportSession<C: Connector> {
    connector: C,
    link: Option<C::Link>,
    state: SessionState,
    timeout: Duration,
    message_wait: Duration,
}

impl<C: Connector> TransportSession<C> {
    pub fn new(connector: C, timeout: Duration, message_wait: Duration) -> Self {
        TransportSession {
            connector,
            link: None,
            state: SessionState::default(),
            timeout,
            message_wait,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn peer(&self) -> String {
        self.connector.describe()
    }

    pub async fn read(
        &mut self,
        table: RegisterTable,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let (request_timeout, message_wait) = (self.timeout, self.message_wait);
        let result = match self.ensure_link().await {
            Ok(link) => {
                sleep(message_wait).await;
                match timeout(request_timeout, link.read(table, address, count)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(request_timeout)),
                }
            }
            Err(e) => Err(e),
        };

        let result = result.and_then(|words| {
            if words.len() == count as usize {
                Ok(words)
            } else {
                Err(TransportError::Protocol(format!(
                    "asked for {} registers at {}, got {}",
                    count,
                    address,
                    words.len()
                )))
            }
        });

        if let Ok(words) = &result {
            log::trace!("Read {} [{}]", address, hex::encode(words_to_bytes(words)));
        }
        self.settle(result)
    }

    pub async fn write(&mut self, address: u16, words: &[u16]) -> Result<(), TransportError> {
        let (request_timeout, message_wait) = (self.timeout, self.message_wait);
        log::debug!("Writing {} [{}]", address, hex::encode(words_to_bytes(words)));
        let result = match self.ensure_link().await {
            Ok(link) => {
                sleep(message_wait).await;
                match timeout(request_timeout, link.write(address, words)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(request_timeout)),
                }
            }
            Err(e) => Err(e),
        };
        self.settle(result)
    }

    /// Close and release the link; the next request reconnects
    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            log::debug!("Closing connection to {}", self.connector.describe());
            link.close().await;
        }
        self.state.connected = false;
    }

    async fn ensure_link(&mut self) -> Result<&mut C::Link, TransportError> {
        if self.link.is_none() {
            let link = match timeout(self.timeout, self.connector.connect()).await {
                Ok(result) => result?,
                Err(_) => return Err(TransportError::Timeout(self.timeout)),
            };
            self.state.connected = true;
            self.link = Some(link);
        }
        self.link
            .as_mut()
            .ok_or_else(|| TransportError::Connection("no link".to_string()))
    }

    fn settle<T>(&mut self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        match &result {
            Ok(_) => {
                if self.state.consecutive_failures > 0 {
                    log::info!(
                        "Connection to {} recovered after {} failures",
                        self.connector.describe(),
                        self.state.consecutive_failures
                    );
                }
                self.state.consecutive_failures = 0;
                self.state.last_success_at = Some(now_utc());
            }
            // The device answered; only that register is affected
            Err(e @ TransportError::Exception(_)) => {
                log::warn!("{}: {}", self.connector.describe(), e);
            }
            Err(e) => {
                self.state.consecutive_failures += 1;
                if e.is_connection() {
                    log::warn!("{}: {}", self.connector.describe(), e);
                    // dropped, not closed
                    self.link = None;
                    self.state.connected = false;
                } else {
                    log::warn!(
                        "{}: {} (is the configured hardware version correct?)",
                        self.connector.describe(),
                        e
                    );
                }
            }
        }
        result
    }
}

fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::modbus_tcp::mock::{MockConnector, MockDevice};

    fn session(device: &MockDevice) -> TransportSession<MockConnector> {
        TransportSession::new(
            device.connector(),
            Duration::from_secs(1),
            Duration::from_millis(0),
        )
    }

    #[tokio::test]
    async fn test_lazy_connect_and_read() {
        let device = MockDevice::new();
        device.set_register(32104, 62);
        let mut session = session(&device);
        assert!(!session.state().connected);
        assert_eq!(device.connects(), 0);

        let words = session.read(RegisterTable::Holding, 32104, 1).await.unwrap();
        assert_eq!(words, vec![62]);
        assert!(session.state().connected);
        assert!(session.state().last_success_at.is_some());
        assert_eq!(device.connects(), 1);

        session.read(RegisterTable::Holding, 32104, 1).await.unwrap();
        assert_eq!(device.connects(), 1);
    }

    #[tokio::test]
    async fn test_connection_error_discards_link() {
        let device = MockDevice::new();
        device.set_register(32104, 62);
        let mut session = session(&device);
        session.read(RegisterTable::Holding, 32104, 1).await.unwrap();

        device.set_online(false);
        let err = session.read(RegisterTable::Holding, 32104, 1).await.unwrap_err();
        assert!(err.is_connection());
        assert!(!session.state().connected);
        assert_eq!(session.state().consecutive_failures, 1);

        device.set_online(true);
        session.read(RegisterTable::Holding, 32104, 1).await.unwrap();
        assert_eq!(device.connects(), 2);
        assert_eq!(session.state().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_short_response_is_protocol_error() {
        let device = MockDevice::new();
        device.set_register(32102, 0);
        device.truncate_responses(true);
        let mut session = session(&device);
        let err = session.read(RegisterTable::Holding, 32102, 2).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
        // the link itself is still usable
        assert!(session.state().connected);
    }

    #[tokio::test]
    async fn test_exception_does_not_count_as_session_failure() {
        let device = MockDevice::new();
        device.set_register(1, 1);
        device.reject(1);
        let mut session = session(&device);
        let err = session.read(RegisterTable::Holding, 1, 1).await.unwrap_err();
        assert!(matches!(err, TransportError::Exception(_)));
        assert_eq!(session.state().consecutive_failures, 0);
        assert!(session.state().connected);
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let device = MockDevice::new();
        let mut session = session(&device);
        session.write(42011, &[80]).await.unwrap();
        assert_eq!(device.register(42011), Some(80));
        assert_eq!(device.writes(), vec![(42011, vec![80])]);
    }

    #[tokio::test]
    async fn test_close_releases_link() {
        let device = MockDevice::new();
        device.set_register(1, 1);
        let mut session = session(&device);
        session.read(RegisterTable::Holding, 1, 1).await.unwrap();
        session.close().await;
        assert!(!session.state().connected);
        assert_eq!(device.closes(), 1);
    }
}
