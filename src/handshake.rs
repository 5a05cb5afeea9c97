//! Dialling the target and driving the TLS handshake far enough to see the chain.

use crate::certificate::RawCertificateChain;
use crate::error::{Error, Result};
use crate::roots::TrustRootSet;
use crate::target::ConnectionTarget;
use crate::verification::{ChainInterceptor, Evaluation, Evaluator};
use crate::BuilderCaptureExt;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handshake budget used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Knobs for a single capture.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Roots to verify against. `None` loads the platform store.
    pub roots: Option<Arc<TrustRootSet>>,
    /// Upper bound for connecting and receiving the server's certificates.
    pub timeout: Duration,
    /// Additionally advertises the SHA-1 signature schemes (`rsa_pkcs1_sha1`,
    /// `ecdsa_sha1`) that old servers still sign their key exchange with.
    ///
    /// The offered versions, cipher suites and key-exchange groups are the provider
    /// defaults either way: rustls has no static-RSA key exchange to enable. It never
    /// changes verification.
    pub legacy_key_exchange: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            roots: None,
            timeout: DEFAULT_TIMEOUT,
            legacy_key_exchange: false,
        }
    }
}

/// The outcome of a successful capture.
#[derive(Debug)]
pub struct CaptureReport {
    /// Where we connected.
    pub target: ConnectionTarget,
    /// The certificates exactly as presented.
    pub chain: RawCertificateChain,
    /// The evaluator's findings.
    pub evaluation: Evaluation,
}

/// Connects to `target`, captures the presented chain and evaluates it.
///
/// Succeeds whenever a chain was captured and parsed, trusted or not. The
/// connection is closed before returning.
pub fn capture(target: &ConnectionTarget, options: &CaptureOptions) -> Result<CaptureReport> {
    let roots = match &options.roots {
        Some(roots) => Arc::clone(roots),
        None => Arc::new(TrustRootSet::platform()?),
    };

    let server_name = ServerName::try_from(target.server_name().to_owned()).map_err(|e| {
        Error::Target {
            input: target.server_name().to_owned(),
            reason: format!("invalid server name: {e}"),
        }
    })?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let interceptor = Arc::new(
        ChainInterceptor::new(Evaluator::new(roots).with_provider(Arc::clone(&provider)))
            .with_legacy_signature_schemes(options.legacy_key_exchange),
    );

    let addr = target.addr();
    let tls_error = |source| Error::Tls {
        addr: addr.clone(),
        source,
    };

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?
        .with_chain_interceptor(Arc::clone(&interceptor))
        .with_no_client_auth();

    let mut conn = ClientConnection::new(Arc::new(config), server_name).map_err(tls_error)?;

    log::info!("Dial {addr} (server name {})", target.server_name());
    let deadline = Instant::now() + options.timeout;
    let mut sock = connect(target, deadline, options.timeout)?;
    let handshake = drive_handshake(&mut conn, &mut sock, deadline);
    // Only the certificate exchange was wanted.
    let _ = sock.shutdown(Shutdown::Both);

    if let Some(capture) = interceptor.take_capture() {
        let capture = capture?;
        return Ok(CaptureReport {
            target: target.clone(),
            chain: capture.chain,
            evaluation: capture.evaluation,
        });
    }

    match handshake {
        Err(e) => Err(handshake_error(e, &addr, options.timeout)),
        // A finished handshake always passes through the interceptor first.
        Ok(()) => Err(Error::NoCertificates),
    }
}

fn connect(target: &ConnectionTarget, deadline: Instant, timeout: Duration) -> Result<TcpStream> {
    let addr = target.addr();
    let connect_error = |source| Error::Connect {
        addr: addr.clone(),
        source,
    };

    let candidates = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(connect_error)?;

    let mut last_error = None;
    for candidate in candidates {
        let Some(budget) = remaining(deadline) else {
            break;
        };
        log::debug!("connecting to {candidate}");
        match TcpStream::connect_timeout(&candidate, budget) {
            Ok(sock) => return Ok(sock),
            Err(e) => {
                log::debug!("connection to {candidate} failed: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) if is_timeout(&e) => Error::Timeout {
            addr: addr.clone(),
            timeout,
        },
        Some(e) => connect_error(e),
        None if remaining(deadline).is_none() => Error::Timeout {
            addr: addr.clone(),
            timeout,
        },
        None => connect_error(io::Error::new(
            io::ErrorKind::NotFound,
            "host resolved to no addresses",
        )),
    })
}

fn drive_handshake(
    conn: &mut ClientConnection,
    sock: &mut TcpStream,
    deadline: Instant,
) -> io::Result<()> {
    while conn.is_handshaking() {
        let budget = remaining(deadline)
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "handshake deadline passed"))?;
        sock.set_read_timeout(Some(budget))?;
        sock.set_write_timeout(Some(budget))?;
        conn.complete_io(sock)?;
    }
    Ok(())
}

fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|remaining| !remaining.is_zero())
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

fn handshake_error(err: io::Error, addr: &str, timeout: Duration) -> Error {
    if let Some(tls) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return match tls {
            rustls::Error::NoCertificatesPresented => Error::NoCertificates,
            other => Error::Tls {
                addr: addr.to_owned(),
                source: other.clone(),
            },
        };
    }

    if is_timeout(&err) {
        return Error::Timeout {
            addr: addr.to_owned(),
            timeout,
        };
    }

    Error::Connect {
        addr: addr.to_owned(),
        source: err,
    }
}
