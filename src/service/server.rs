//! clipkeep - Unix socket listener
//!
//! Accepts local clients and serves the one-request-per-connection protocol

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use super::protocol::{Request, Status};
use super::Service;

pub(crate) struct SocketServer {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketServer {
    /// Bind the socket, replacing a stale one. The socket directory and the
    /// socket itself are restricted to the owning user: the history crosses
    /// this boundary in the clear.
    pub(crate) fn bind(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }
        match fs::remove_file(path) {
            Ok(()) => log::debug!("removed stale socket at {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let listener = UnixListener::bind(path)?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        log::info!("listening on {}", path.display());

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub(crate) async fn serve(self, service: Arc<Service>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, service).await {
                                log::warn!("connection failed: {}", err);
                            }
                        });
                    }
                    Err(err) => log::warn!("accept failed: {}", err),
                },
            }
        }

        if let Err(err) = fs::remove_file(&self.path) {
            log::debug!("failed to remove socket on shutdown: {}", err);
        }
        log::info!("listener stopped");
    }
}

async fn handle_connection(stream: UnixStream, service: Arc<Service>) -> io::Result<()> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let (status, body) = match Request::from_line(&line) {
        Ok(request) => service.dispatch(request).await,
        Err(err) => {
            log::warn!("rejecting malformed request: {}", err);
            (Status::error(err.to_string()), Vec::new())
        }
    };

    let status_line = status
        .to_line()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    writer.write_all(status_line.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
