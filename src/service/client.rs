//! clipkeep - Socket client
//!
//! Connects to the daemon socket, sends one request, streams the response

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::protocol::{ProtocolError, Request, Status};

/// Client error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to reach the daemon at {path} (is the server running?): {source}")]
    Connect {
        path: String,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// One-shot client for the daemon socket
pub struct Client {
    socket_path: PathBuf,
}

impl Client {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Send one request. Returns the status line and a reader positioned at
    /// the start of the response body.
    pub async fn send(&self, request: &Request) -> Result<(Status, impl AsyncRead + Unpin), ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: self.socket_path.display().to_string(),
                source,
            })?;

        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(request.to_line()?.as_bytes()).await?;

        let mut reader = BufReader::new(read_half);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await?;
        let status = Status::from_line(&status_line)?;
        Ok((status, reader))
    }

    /// Send one request and copy the response body to `out`. A rejected
    /// request is an error; a lookup miss is not.
    pub async fn run_to<W: AsyncWrite + Unpin>(
        &self,
        request: &Request,
        out: &mut W,
    ) -> Result<Status, ClientError> {
        let (status, mut body) = self.send(request).await?;
        if !status.ok {
            return Err(ClientError::Rejected(
                status.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        tokio::io::copy(&mut body, out).await?;
        out.flush().await?;
        Ok(status)
    }
}
