//! Client library for connecting to a PolyVault server
//!
//! Sends one request line per call and classifies the reply line: anything
//! that parses as JSON is a value, anything else is an error message.

use crate::error::{PolyVaultError, Result};
use crate::protocol::format_request;
use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Reply to a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Json),
    Error(String),
}

impl Reply {
    /// Classify a reply line with its terminator stripped.
    pub fn from_line(line: &str) -> Self {
        match serde_json::from_str(line) {
            Ok(value) => Reply::Value(value),
            Err(_) => Reply::Error(line.to_string()),
        }
    }

    /// Convert into the value, turning a server error into [`PolyVaultError::Server`].
    pub fn into_value(self) -> Result<Json> {
        match self {
            Reply::Value(value) => Ok(value),
            Reply::Error(e) => Err(PolyVaultError::Server(e)),
        }
    }
}

/// Client for connecting to PolyVault server
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Client {
    /// Connect to a PolyVault server
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }

    /// Send `op key args...`, quoting tokens as needed, and read the reply.
    pub async fn command(&mut self, op: &str, key: &str, args: &[&str]) -> Result<Reply> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.send_line(&format_request(op, key, &args)).await
    }

    /// Send a raw request line exactly as given.
    pub async fn send_line(&mut self, line: &str) -> Result<Reply> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let mut response_line = String::new();
        if self.reader.read_line(&mut response_line).await? == 0 {
            return Err(PolyVaultError::Client(
                "connection closed by server".to_string(),
            ));
        }

        Ok(Reply::from_line(response_line.trim_end_matches(['\r', '\n'])))
    }

    /// Store a string value
    pub async fn set(&mut self, key: &str, value: &str) -> Result<Json> {
        self.command("set", key, &[value]).await?.into_value()
    }

    /// Read a string value
    pub async fn get(&mut self, key: &str) -> Result<Json> {
        self.command("get", key, &[]).await?.into_value()
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
