//! Client-side connections.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe client
//! - Any platform: TCP
//!
//! # Example
//!
//! ```ignore
//! use account_rpc::transport::connect_ipc;
//!
//! let conn = connect_ipc("/var/lib/drep/drep.ipc").await?;
//! ```

use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::config::Endpoint;
use crate::error::{Error, Result};

/// A connected stream to the node.
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
    #[cfg(windows)]
    Pipe(tokio::net::windows::named_pipe::NamedPipeClient),
}

/// Open a stream to whatever `endpoint` names. HTTP endpoints have no stream.
pub async fn connect(endpoint: &Endpoint) -> Result<Connection> {
    match endpoint {
        Endpoint::Ipc(path) => connect_ipc(path).await,
        Endpoint::Tcp(addr) => connect_tcp(addr).await,
        Endpoint::Http(url) => Err(Error::Protocol(format!(
            "{} is an HTTP endpoint, not a stream",
            url
        ))),
    }
}

/// Connect to a TCP endpoint (`host:port`). Nagle is disabled.
pub async fn connect_tcp(addr: &str) -> Result<Connection> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    tracing::debug!(addr, "connected over TCP");
    Ok(Connection::Tcp(stream))
}

/// Connect to an IPC endpoint.
#[cfg(unix)]
pub async fn connect_ipc(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    let stream = tokio::net::UnixStream::connect(path).await?;
    tracing::debug!(path = %path.display(), "connected over IPC");
    Ok(Connection::Unix(stream))
}

/// Connect to an IPC endpoint.
#[cfg(windows)]
pub async fn connect_ipc(path: impl AsRef<Path>) -> Result<Connection> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let path = path.as_ref();
    let pipe = ClientOptions::new().open(path)?;
    tracing::debug!(path = %path.display(), "connected over named pipe");
    Ok(Connection::Pipe(pipe))
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Connection::Unix(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(windows)]
            Connection::Pipe(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Connection::Unix(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(windows)]
            Connection::Pipe(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[std::io::IoSlice<'_>],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            #[cfg(unix)]
            Connection::Unix(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            #[cfg(windows)]
            Connection::Pipe(s) => Pin::new(s).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            Connection::Tcp(s) => s.is_write_vectored(),
            #[cfg(unix)]
            Connection::Unix(s) => s.is_write_vectored(),
            #[cfg(windows)]
            Connection::Pipe(s) => s.is_write_vectored(),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Connection::Unix(s) => Pin::new(s).poll_flush(cx),
            #[cfg(windows)]
            Connection::Pipe(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Connection::Unix(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(windows)]
            Connection::Pipe(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_connect_tcp_echo() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut conn = connect(&Endpoint::Tcp(addr)).await.unwrap();
        conn.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_http_endpoint_is_not_a_stream() {
        let result = connect(&Endpoint::Http("http://127.0.0.1:15645".into())).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_ipc_missing_socket() {
        let path = std::env::temp_dir()
            .join(format!("account-rpc-missing-{}.ipc", std::process::id()));
        assert!(connect_ipc(&path).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_ipc() {
        let path = std::env::temp_dir()
            .join(format!("account-rpc-test-{}.ipc", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.is_ok() });
        let conn = connect_ipc(&path).await.unwrap();
        assert!(matches!(conn, Connection::Unix(_)));
        assert!(accept.await.unwrap());

        let _ = std::fs::remove_file(&path);
    }
}
