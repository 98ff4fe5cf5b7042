//! Async MUD connection: TCP + optional TLS, driven through the Telnet codec.
//!
//! [`Connection`] wraps a tokio TCP (or TLS) stream with:
//! - Telnet byte-stream parsing via [`crate::telnet::TelnetParser`]
//! - option negotiation via [`crate::telnet::NegotiationState`]
//! - routing of MSDP / GMCP subnegotiation payloads to the caller
//! - bounded-timeout reads and a connect deadline
//!
//! The pure protocol logic lives in [`Protocol`], which is independently
//! testable without any real I/O: feed it bytes, get back
//! `(events, bytes_to_send)`.
//!
//! TLS certificate verification is **disabled by default** — this is a load
//! tool pointed at lab servers with self-signed certificates. Pass
//! `verify_tls: true` in [`ConnectOptions`] to verify against the Mozilla
//! root bundle instead.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::telnet::{
    build_naws, build_ttype, opt, NegotiationState, TelnetEvent, TelnetParser, TTYPE_SEND, WILL,
};

// ── Errors ────────────────────────────────────────────────────────────────

/// Why a connection attempt failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("network error: {0}")]
    Network(#[source] io::Error),
    #[error("tls error: {0}")]
    Tls(#[source] io::Error),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

// ── NetEvent ──────────────────────────────────────────────────────────────

/// High-level events produced by [`Connection::recv`] / [`Protocol::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// Clean text bytes — telnet sequences removed, escaped IAC decoded.
    Text(Vec<u8>),
    /// A GA/EOR prompt boundary.
    Prompt,
    /// An MSDP subnegotiation payload (after the option byte).
    Msdp(Vec<u8>),
    /// A GMCP subnegotiation payload (after the option byte).
    Gmcp(Vec<u8>),
    /// The server closed the connection.
    Closed,
}

// ── Protocol (pure, testable) ─────────────────────────────────────────────

/// Pure protocol state: Telnet parsing plus this client's negotiation
/// policy. Contains no I/O handles and has no async methods.
pub struct Protocol {
    parser: TelnetParser,
    neg: NegotiationState,
    naws_sent: bool,
    pub term_width: u16,
    pub term_height: u16,
    terminal_name: &'static str,
}

impl Protocol {
    pub fn new() -> Self {
        Self {
            parser: TelnetParser::new(),
            neg: NegotiationState::new(),
            naws_sent: false,
            term_width: 80,
            term_height: 24,
            terminal_name: "ANSI",
        }
    }

    /// Process a raw byte slice from the network.
    ///
    /// Returns `(events, bytes_to_send)`. The caller must write
    /// `bytes_to_send` back to the server (negotiation responses, NAWS and
    /// TTYPE subnegotiations).
    pub fn process(&mut self, raw: &[u8]) -> (Vec<NetEvent>, Vec<u8>) {
        let telnet_events = self.parser.feed(raw);
        let mut events = Vec::new();
        let mut send_buf = Vec::new();

        for event in telnet_events {
            self.dispatch(event, &mut events, &mut send_buf);
        }
        (events, send_buf)
    }

    fn dispatch(&mut self, event: TelnetEvent, events: &mut Vec<NetEvent>, send_buf: &mut Vec<u8>) {
        match event {
            TelnetEvent::Data(data) => events.push(NetEvent::Text(data)),
            TelnetEvent::Will(o) => {
                if let Some(resp) = self.neg.receive_will(o) {
                    send_buf.extend_from_slice(&resp);
                }
            }
            TelnetEvent::Wont(o) => {
                if let Some(resp) = self.neg.receive_wont(o) {
                    send_buf.extend_from_slice(&resp);
                }
            }
            TelnetEvent::Do(o) => {
                if let Some(resp) = self.neg.receive_do(o) {
                    let agreed = resp[1] == WILL;
                    send_buf.extend_from_slice(&resp);
                    if agreed && o == opt::NAWS {
                        // Agreed to NAWS — immediately report our size.
                        send_buf.extend_from_slice(&build_naws(self.term_width, self.term_height));
                        self.naws_sent = true;
                    }
                }
            }
            TelnetEvent::Dont(o) => {
                if let Some(resp) = self.neg.receive_dont(o) {
                    send_buf.extend_from_slice(&resp);
                }
            }
            TelnetEvent::Subneg(o, data) => match o {
                opt::MSDP => events.push(NetEvent::Msdp(data)),
                opt::GMCP => events.push(NetEvent::Gmcp(data)),
                opt::TTYPE => {
                    if data.first() == Some(&TTYPE_SEND) {
                        send_buf.extend_from_slice(&build_ttype(self.terminal_name));
                    }
                }
                _ => debug!(option = o, "ignoring unknown subnegotiation"),
            },
            TelnetEvent::GoAhead | TelnetEvent::Eor => events.push(NetEvent::Prompt),
        }
    }

    pub fn echo_on(&self) -> bool {
        self.neg.is_them(opt::ECHO)
    }

    pub fn sga_on(&self) -> bool {
        self.neg.is_them(opt::SGA)
    }

    pub fn eor_on(&self) -> bool {
        self.neg.is_them(opt::EOR)
    }

    pub fn msdp_on(&self) -> bool {
        self.neg.is_them(opt::MSDP)
    }

    pub fn gmcp_on(&self) -> bool {
        self.neg.is_them(opt::GMCP)
    }

    pub fn naws_sent(&self) -> bool {
        self.naws_sent
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}

// ── TLS setup ─────────────────────────────────────────────────────────────

mod danger {
    use tokio_rustls::rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use tokio_rustls::rustls::{DigitallySignedStruct, Error, SignatureScheme};

    /// Accepts any server certificate. Lab servers only.
    #[derive(Debug)]
    pub struct AcceptAnyCert;

    impl ServerCertVerifier for AcceptAnyCert {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ED25519,
            ]
        }
    }
}

fn tls_config(verify: bool) -> ClientConfig {
    if verify {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    } else {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::AcceptAnyCert))
            .with_no_client_auth()
    }
}

// ── Internal stream type ──────────────────────────────────────────────────

enum Inner {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Inner {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Inner::Plain(s) => s.read(buf).await,
            Inner::Tls(s) => s.read(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Inner::Plain(s) => s.write_all(buf).await,
            Inner::Tls(s) => s.write_all(buf).await,
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Inner::Plain(s) => s.shutdown().await,
            Inner::Tls(s) => s.shutdown().await,
        }
    }
}

// ── Connection ────────────────────────────────────────────────────────────

/// How to establish a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub tls: bool,
    /// Verify the server certificate against the Mozilla roots. Off by
    /// default; lab servers run self-signed.
    pub verify_tls: bool,
    pub timeout: Duration,
    pub read_buffer: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            tls: false,
            verify_tls: false,
            timeout: Duration::from_secs(30),
            read_buffer: 4096,
        }
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// A single MUD server connection with its protocol state.
///
/// Exclusively owned by one session; drive it with [`Self::send_line`] /
/// [`Self::send_raw`] / [`Self::recv`].
pub struct Connection {
    stream: Option<Inner>,
    proto: Protocol,
    state: ConnState,
    read_buffer: usize,
}

impl Connection {
    /// Open a connection to `host:port`, optionally wrapped in TLS.
    pub async fn open(host: &str, port: u16, opts: &ConnectOptions) -> Result<Self, ConnectError> {
        let tcp = tokio::time::timeout(opts.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ConnectError::Timeout(opts.timeout))?
            .map_err(ConnectError::Network)?;

        let stream = if opts.tls {
            let connector = TlsConnector::from(Arc::new(tls_config(opts.verify_tls)));
            let server_name: ServerName<'static> = ServerName::try_from(host.to_owned())
                .map_err(|e| {
                    ConnectError::Tls(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
                })?;
            let tls = tokio::time::timeout(opts.timeout, connector.connect(server_name, tcp))
                .await
                .map_err(|_| ConnectError::Timeout(opts.timeout))?
                .map_err(ConnectError::Tls)?;
            Inner::Tls(Box::new(tls))
        } else {
            Inner::Plain(tcp)
        };

        Ok(Self {
            stream: Some(stream),
            proto: Protocol::new(),
            state: ConnState::Connected,
            read_buffer: opts.read_buffer,
        })
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Connected
    }

    /// Protocol-level option state (MSDP on, NAWS sent, …).
    pub fn protocol(&self) -> &Protocol {
        &self.proto
    }

    /// Send raw bytes verbatim (pre-built Telnet frames).
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"));
        };
        if let Err(e) = stream.write_all(bytes).await {
            self.state = ConnState::Error;
            return Err(e);
        }
        Ok(())
    }

    /// Send `line` to the server, appending CRLF.
    ///
    /// Literal `0xFF` bytes are doubled (IAC-escaped) per the Telnet spec.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 2);
        for &b in line.as_bytes() {
            if b == 0xFF {
                buf.push(0xFF); // escape
            }
            buf.push(b);
        }
        buf.extend_from_slice(b"\r\n");
        self.send_raw(&buf).await
    }

    /// Read from the server and decode into [`NetEvent`]s.
    ///
    /// An empty vec means the read timed out with nothing available. EOF
    /// yields a single [`NetEvent::Closed`] and marks the connection
    /// disconnected. Negotiation responses are written back automatically.
    pub async fn recv(&mut self, timeout: Duration) -> io::Result<Vec<NetEvent>> {
        if self.state != ConnState::Connected {
            return Ok(vec![NetEvent::Closed]);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(vec![NetEvent::Closed]);
        };

        let mut raw = vec![0u8; self.read_buffer];
        let n = match tokio::time::timeout(timeout, stream.read(&mut raw)).await {
            Err(_) => return Ok(Vec::new()), // nothing arrived in time
            Ok(Err(e)) => {
                self.state = ConnState::Error;
                return Err(e);
            }
            Ok(Ok(n)) => n,
        };

        if n == 0 {
            self.state = ConnState::Disconnected;
            return Ok(vec![NetEvent::Closed]);
        }

        let (events, send_buf) = self.proto.process(&raw[..n]);
        if !send_buf.is_empty() {
            if let Some(stream) = self.stream.as_mut() {
                if let Err(e) = stream.write_all(&send_buf).await {
                    self.state = ConnState::Error;
                    return Err(e);
                }
            }
        }
        Ok(events)
    }

    /// Best-effort half-close then drop. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.state = ConnState::Disconnected;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::{DO, EOR_CMD, GA, IAC, SB, SE, WONT};

    // ── Protocol ──────────────────────────────────────────────────────────

    #[test]
    fn startup_negotiation_sequence() {
        // WILL ECHO, WILL SGA, WILL MSDP, DO NAWS in one segment.
        let mut proto = Protocol::new();
        let input = [
            IAC, WILL, opt::ECHO, IAC, WILL, opt::SGA, IAC, WILL, opt::MSDP, IAC, DO, opt::NAWS,
        ];
        let (_, send_buf) = proto.process(&input);

        let mut expected = vec![IAC, DO, opt::ECHO, IAC, DO, opt::SGA, IAC, DO, opt::MSDP];
        expected.extend_from_slice(&[IAC, WILL, opt::NAWS]);
        expected.extend_from_slice(&[IAC, SB, opt::NAWS, 0, 80, 0, 24, IAC, SE]);
        assert_eq!(send_buf, expected);

        assert!(proto.echo_on());
        assert!(proto.sga_on());
        assert!(proto.msdp_on());
        assert!(proto.naws_sent());
    }

    #[test]
    fn mccp2_declined() {
        let mut proto = Protocol::new();
        let (_, send_buf) = proto.process(&[IAC, WILL, opt::MCCP2]);
        assert_eq!(send_buf, vec![IAC, crate::telnet::DONT, opt::MCCP2]);
    }

    #[test]
    fn unknown_do_refused() {
        let mut proto = Protocol::new();
        let (_, send_buf) = proto.process(&[IAC, DO, 39]);
        assert_eq!(send_buf, vec![IAC, WONT, 39]);
    }

    #[test]
    fn text_passes_through() {
        let mut proto = Protocol::new();
        let (events, _) = proto.process(b"Welcome to Mud98!\r\n");
        assert_eq!(
            events,
            vec![NetEvent::Text(b"Welcome to Mud98!\r\n".to_vec())]
        );
    }

    #[test]
    fn msdp_payload_routed() {
        let mut proto = Protocol::new();
        let mut input = vec![IAC, SB, opt::MSDP];
        input.extend_from_slice(&[1, b'H', b'P', 2, b'5']);
        input.extend_from_slice(&[IAC, SE]);
        let (events, _) = proto.process(&input);
        assert_eq!(events, vec![NetEvent::Msdp(vec![1, b'H', b'P', 2, b'5'])]);
    }

    #[test]
    fn gmcp_payload_routed() {
        let mut proto = Protocol::new();
        let mut input = vec![IAC, SB, opt::GMCP];
        input.extend_from_slice(b"Room.Info {\"num\":3712}");
        input.extend_from_slice(&[IAC, SE]);
        let (events, _) = proto.process(&input);
        assert_eq!(
            events,
            vec![NetEvent::Gmcp(b"Room.Info {\"num\":3712}".to_vec())]
        );
    }

    #[test]
    fn ttype_send_answered() {
        let mut proto = Protocol::new();
        let input = [IAC, SB, opt::TTYPE, TTYPE_SEND, IAC, SE];
        let (_, send_buf) = proto.process(&input);
        assert_eq!(send_buf, build_ttype("ANSI"));
    }

    #[test]
    fn ga_and_eor_mark_prompts() {
        let mut proto = Protocol::new();
        let (events, _) = proto.process(&[b'>', IAC, GA, IAC, EOR_CMD]);
        assert_eq!(
            events,
            vec![
                NetEvent::Text(b">".to_vec()),
                NetEvent::Prompt,
                NetEvent::Prompt,
            ]
        );
    }

    #[test]
    fn split_negotiation_across_reads() {
        let mut proto = Protocol::new();
        let (_, first) = proto.process(&[IAC, WILL]);
        assert!(first.is_empty());
        let (_, second) = proto.process(&[opt::MSDP]);
        assert_eq!(second, vec![IAC, DO, opt::MSDP]);
        assert!(proto.msdp_on());
    }

    // ── Connection over loopback ──────────────────────────────────────────

    #[tokio::test]
    async fn connect_and_recv_text() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"Welcome!\r\n").await.unwrap();
        });

        let mut conn = Connection::open("127.0.0.1", addr.port(), &ConnectOptions::default())
            .await
            .unwrap();
        let events = conn.recv(Duration::from_secs(2)).await.unwrap();
        server.await.unwrap();

        assert_eq!(events, vec![NetEvent::Text(b"Welcome!\r\n".to_vec())]);
    }

    #[tokio::test]
    async fn negotiation_answered_over_loopback() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&[IAC, WILL, opt::MSDP]).await.unwrap();
            let mut buf = [0u8; 8];
            let n = sock.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &[IAC, DO, opt::MSDP]);
        });

        let mut conn = Connection::open("127.0.0.1", addr.port(), &ConnectOptions::default())
            .await
            .unwrap();
        conn.recv(Duration::from_secs(2)).await.unwrap();
        assert!(conn.protocol().msdp_on());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn zero_byte_read_marks_disconnected() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock); // immediate close
        });

        let mut conn = Connection::open("127.0.0.1", addr.port(), &ConnectOptions::default())
            .await
            .unwrap();
        server.await.unwrap();

        let events = conn.recv(Duration::from_secs(2)).await.unwrap();
        assert_eq!(events, vec![NetEvent::Closed]);
        assert_eq!(conn.state(), ConnState::Disconnected);
    }

    #[tokio::test]
    async fn recv_timeout_is_empty() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            drop(sock);
        });

        let mut conn = Connection::open("127.0.0.1", addr.port(), &ConnectOptions::default())
            .await
            .unwrap();
        let events = conn.recv(Duration::from_millis(50)).await.unwrap();
        assert!(events.is_empty());
        assert!(conn.is_connected());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let mut conn = Connection::open("127.0.0.1", addr.port(), &ConnectOptions::default())
            .await
            .unwrap();
        conn.close().await;
        conn.close().await;
        assert_eq!(conn.state(), ConnState::Disconnected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused_is_network_error() {
        // Port 1 on loopback is essentially never listening.
        let err = Connection::open("127.0.0.1", 1, &ConnectOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectError::Network(_)));
    }
}
