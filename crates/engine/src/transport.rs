//! Transport abstraction (`spec.md` §6): the engine is generic over any
//! bidirectional byte stream, obtained through a factory the caller
//! supplies. Default TCP and Unix-domain-socket factories are provided;
//! addresses are passed through verbatim, never interpreted.

use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// A duplex byte stream the engine can frame messages over.
///
/// Blanket-implemented for anything that already satisfies the bounds, the
/// same shape the teacher's own transport glue (stdio's `ChildStdin` /
/// `ChildStdout` pair) is driven through.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Produces a listening server and accepts connections from it (server role).
#[async_trait::async_trait]
pub trait ServerFactory: Send + Sync {
    type Transport: Transport;

    /// Binds/opens whatever the factory listens on.
    async fn listen(&self, addr: &str) -> io::Result<()>;

    /// Accepts the next inbound connection.
    async fn accept(&self) -> io::Result<Self::Transport>;
}

/// Produces a connected transport (client role).
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync {
    type Transport: Transport;

    async fn connect(&self, addr: &str) -> io::Result<Self::Transport>;
}

/// Default TCP server factory. `addr` is passed to [`TcpListener::bind`] verbatim.
pub struct TcpServerFactory {
    listener: tokio::sync::OnceCell<TcpListener>,
}

impl Default for TcpServerFactory {
    fn default() -> Self {
        Self {
            listener: tokio::sync::OnceCell::new(),
        }
    }
}

#[async_trait::async_trait]
impl ServerFactory for TcpServerFactory {
    type Transport = TcpStream;

    async fn listen(&self, addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.listener
            .set(listener)
            .map_err(|_| io::Error::new(io::ErrorKind::AlreadyExists, "already listening"))
    }

    async fn accept(&self) -> io::Result<Self::Transport> {
        let listener = self
            .listener
            .get()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "listen() not called"))?;
        let (stream, _peer) = listener.accept().await?;
        Ok(stream)
    }
}

/// Default TCP client factory. `addr` is passed to [`TcpStream::connect`] verbatim.
#[derive(Debug, Default)]
pub struct TcpClientFactory;

#[async_trait::async_trait]
impl ClientFactory for TcpClientFactory {
    type Transport = TcpStream;

    async fn connect(&self, addr: &str) -> io::Result<Self::Transport> {
        TcpStream::connect(addr).await
    }
}

#[cfg(unix)]
pub use unix::{UnixClientFactory, UnixServerFactory};

#[cfg(unix)]
mod unix {
    use super::*;
    use tokio::net::{UnixListener, UnixStream};

    /// Default Unix-domain-socket server factory. `addr` is a filesystem path.
    pub struct UnixServerFactory {
        listener: tokio::sync::OnceCell<UnixListener>,
        path: PathBuf,
    }

    impl UnixServerFactory {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                listener: tokio::sync::OnceCell::new(),
                path: path.into(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ServerFactory for UnixServerFactory {
        type Transport = UnixStream;

        async fn listen(&self, _addr: &str) -> io::Result<()> {
            let _ = std::fs::remove_file(&self.path);
            let listener = UnixListener::bind(&self.path)?;
            self.listener
                .set(listener)
                .map_err(|_| io::Error::new(io::ErrorKind::AlreadyExists, "already listening"))
        }

        async fn accept(&self) -> io::Result<Self::Transport> {
            let listener = self.listener.get().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "listen() not called")
            })?;
            let (stream, _peer) = listener.accept().await?;
            Ok(stream)
        }
    }

    /// Default Unix-domain-socket client factory. `addr` is a filesystem path.
    #[derive(Debug, Default)]
    pub struct UnixClientFactory;

    #[async_trait::async_trait]
    impl ClientFactory for UnixClientFactory {
        type Transport = UnixStream;

        async fn connect(&self, addr: &str) -> io::Result<Self::Transport> {
            UnixStream::connect(addr).await
        }
    }
}

/// In-process pair used by tests and by callers embedding both peers in one
/// process: no socket, no filesystem, just a `tokio::io::duplex` pipe.
pub fn in_memory_pair(
    buffer_size: usize,
) -> (tokio::io::DuplexStream, tokio::io::DuplexStream) {
    tokio::io::duplex(buffer_size)
}
