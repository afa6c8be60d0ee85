use tokio_modbus::client::{tcp, Client, Context, Reader, Writer};
use tokio_modbus::{ExceptionCode, Slave};

use super::{Connector, Link, TransportError};
use crate::drivers::RegisterTable;

/// Opens Modbus TCP connections to one device
#[derive(Clone, Debug)]
pub struct TcpConnector {
    host: String,
    port: u16,
    unit_id: u8,
}

impl TcpConnector {
    pub fn new(host: &str, port: u16, unit_id: u8) -> Self {
        TcpConnector {
            host: host.to_string(),
            port,
            unit_id,
        }
    }
}

impl Connector for TcpConnector {
    type Link = TcpLink;

    async fn connect(&self) -> Result<TcpLink, TransportError> {
        let socket_addr = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| TransportError::Connection(format!("resolving {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| {
                TransportError::Connection(format!("failed to resolve hostname: {}", self.host))
            })?;

        log::debug!(
            "Connecting to ModbusTCP device at {}/{}",
            socket_addr,
            self.unit_id
        );

        let context = tcp::connect_slave(socket_addr, Slave(self.unit_id))
            .await
            .map_err(|e| {
                TransportError::Connection(format!(
                    "failed to connect to {}/{}: {}",
                    socket_addr, self.unit_id, e
                ))
            })?;

        log::info!("Connected to ModbusTCP device {}/{}", socket_addr, self.unit_id);

        Ok(TcpLink { context })
    }

    fn describe(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.unit_id)
    }
}

pub struct TcpLink {
    context: Context,
}

impl Link for TcpLink {
    async fn read(
        &mut self,
        table: RegisterTable,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let result = match table {
            RegisterTable::Holding => self.context.read_holding_registers(address, count).await,
            RegisterTable::Input => self.context.read_input_registers(address, count).await,
        };
        classify(result, address)
    }

    async fn write(&mut self, address: u16, words: &[u16]) -> Result<(), TransportError> {
        let result = match words {
            [word] => self.context.write_single_register(address, *word).await,
            _ => self.context.write_multiple_registers(address, words).await,
        };
        classify(result, address)
    }

    async fn close(&mut self) {
        if let Err(e) = self.context.disconnect().await {
            log::debug!("Error while disconnecting: {}", e);
        }
    }
}

/// Split tokio-modbus' nested result into the transport error taxonomy
fn classify<T>(
    result: Result<Result<T, ExceptionCode>, tokio_modbus::Error>,
    address: u16,
) -> Result<T, TransportError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(code)) => Err(TransportError::Exception(format!(
            "{:?} at register {}",
            code, address
        ))),
        Err(tokio_modbus::Error::Transport(e)) => Err(TransportError::Connection(format!(
            "register {}: {}",
            address, e
        ))),
        Err(e) => Err(TransportError::Protocol(format!(
            "register {}: {}",
            address, e
        ))),
    }
}
