//! Sockets handed out by the factory.
//!
//! [`TlsSocket`] abstracts over the TLS stream types of the compiled-in
//! backends:
//!
//! - **rustls** (`tokio_rustls::client::TlsStream<TcpStream>`) with `tls-rustls`
//! - **OpenSSL** (`tokio_openssl::SslStream<TcpStream>`) with `tls-openssl`
//!
//! The enum's shape depends on the enabled features; `tls_socket!` stamps out
//! the variant list together with `AsyncRead`/`AsyncWrite` impls that delegate
//! to the inner stream through `pin_project_lite` projections.
//!
//! The dialing helpers below only open TCP connections; the handshake is
//! always the connector's job.

use std::io;
use std::net::{IpAddr, SocketAddr};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tracing::trace;

macro_rules! tls_socket {
    ($($(#[$attr:meta])* $variant:ident($stream:ty)),+ $(,)?) => {
        pin_project! {
            /// A client TLS stream. The caller owns it; dropping it closes the
            /// underlying TCP connection.
            #[project = TlsSocketProj]
            #[derive(Debug)]
            pub enum TlsSocket {
                $($(#[$attr])* $variant { #[pin] inner: $stream },)+
            }
        }

        impl AsyncRead for TlsSocket {
            fn poll_read(
                self: core::pin::Pin<&mut Self>,
                cx: &mut core::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> core::task::Poll<io::Result<()>> {
                match self.project() {
                    $(TlsSocketProj::$variant { inner } => inner.poll_read(cx, buf),)+
                }
            }
        }

        impl AsyncWrite for TlsSocket {
            fn poll_write(
                self: core::pin::Pin<&mut Self>,
                cx: &mut core::task::Context<'_>,
                buf: &[u8],
            ) -> core::task::Poll<io::Result<usize>> {
                match self.project() {
                    $(TlsSocketProj::$variant { inner } => inner.poll_write(cx, buf),)+
                }
            }
            fn poll_flush(
                self: core::pin::Pin<&mut Self>,
                cx: &mut core::task::Context<'_>,
            ) -> core::task::Poll<io::Result<()>> {
                match self.project() {
                    $(TlsSocketProj::$variant { inner } => inner.poll_flush(cx),)+
                }
            }
            fn poll_shutdown(
                self: core::pin::Pin<&mut Self>,
                cx: &mut core::task::Context<'_>,
            ) -> core::task::Poll<io::Result<()>> {
                match self.project() {
                    $(TlsSocketProj::$variant { inner } => inner.poll_shutdown(cx),)+
                }
            }
        }
    };
}

#[cfg(all(feature = "tls-rustls", feature = "tls-openssl"))]
tls_socket! {
    /// TLS via `tokio-rustls` + rustls.
    Rustls(tokio_rustls::client::TlsStream<TcpStream>),
    /// TLS via `tokio-openssl` + OpenSSL.
    Openssl(tokio_openssl::SslStream<TcpStream>),
}

#[cfg(all(feature = "tls-rustls", not(feature = "tls-openssl")))]
tls_socket! {
    /// TLS via `tokio-rustls` + rustls.
    Rustls(tokio_rustls::client::TlsStream<TcpStream>),
}

#[cfg(all(not(feature = "tls-rustls"), feature = "tls-openssl"))]
tls_socket! {
    /// TLS via `tokio-openssl` + OpenSSL.
    Openssl(tokio_openssl::SslStream<TcpStream>),
}

impl TlsSocket {
    /// The TCP stream under the TLS session.
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            #[cfg(feature = "tls-rustls")]
            TlsSocket::Rustls { inner } => inner.get_ref().0,
            #[cfg(feature = "tls-openssl")]
            TlsSocket::Openssl { inner } => inner.get_ref(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().peer_addr()
    }

    /// Negotiated protocol name (`TLSv1.2`, `TLSv1.3`).
    pub fn negotiated_protocol(&self) -> Option<&'static str> {
        match self {
            #[cfg(feature = "tls-rustls")]
            TlsSocket::Rustls { inner } => match inner.get_ref().1.protocol_version()? {
                rustls::ProtocolVersion::TLSv1_3 => Some("TLSv1.3"),
                rustls::ProtocolVersion::TLSv1_2 => Some("TLSv1.2"),
                _ => None,
            },
            #[cfg(feature = "tls-openssl")]
            TlsSocket::Openssl { inner } => Some(inner.ssl().version_str()),
        }
    }
}

/// Connect to `host:port`, trying every resolved address.
pub async fn dial(host: &str, port: u16) -> io::Result<TcpStream> {
    trace!(%host, port, "dialing");
    TcpStream::connect((host, port)).await
}

/// Connect to `remote` from the local address `local`.
pub async fn connect_bound(remote: SocketAddr, local: SocketAddr) -> io::Result<TcpStream> {
    trace!(%remote, %local, "dialing from bound socket");
    let socket = if remote.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(local)?;
    socket.connect(remote).await
}

/// Connect to `host:port` from `local`, trying the resolved addresses of the
/// same family as `local` in order.
pub async fn dial_from(host: &str, port: u16, local: SocketAddr) -> io::Result<TcpStream> {
    let mut last_err = None;
    for remote in lookup_host((host, port)).await? {
        if same_family(remote.ip(), local.ip()) {
            match connect_bound(remote, local).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address of {host} matches the family of local address {local}"),
        )
    }))
}

fn same_family(a: IpAddr, b: IpAddr) -> bool {
    a.is_ipv4() == b.is_ipv4()
}
