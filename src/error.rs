use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal conditions that stop a run before a trust verdict exists.
///
/// A chain that was captured but is not trusted is *not* an error: it is reported
/// through [`VerificationOutcome::Untrusted`](crate::VerificationOutcome::Untrusted).
#[derive(Error, Debug)]
pub enum Error {
    /// The destination argument was missing or empty.
    #[error("usage: {0}")]
    Usage(String),

    /// The destination could not be turned into a host and port.
    #[error("failed to parse target '{input}': {reason}")]
    Target {
        /// The argument as given by the user.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Name resolution or the TCP connection failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// The `host:port` that was dialled.
        addr: String,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The TLS handshake failed for a reason unrelated to certificate trust.
    #[error("TLS handshake with {addr} failed: {source}")]
    Tls {
        /// The `host:port` that was dialled.
        addr: String,
        /// The error reported by rustls.
        #[source]
        source: rustls::Error,
    },

    /// The peer did not get as far as presenting its certificates in time.
    #[error("no certificates received from {addr} within {}s", .timeout.as_secs_f32())]
    Timeout {
        /// The `host:port` that was dialled.
        addr: String,
        /// The budget that was exhausted.
        timeout: Duration,
    },

    /// The peer completed its certificate message without any certificate in it.
    #[error("peer presented no certificates")]
    NoCertificates,

    /// A certificate in the presented chain is not decodable X.509.
    #[error("failed to parse certificate #{index} of the presented chain: {reason}")]
    Parse {
        /// Position in the chain, 0 being the leaf.
        index: usize,
        /// Decoder message.
        reason: String,
    },

    /// The custom CA bundle could not be used as a trust-root set.
    #[error("failed to load trust roots from {}: {reason}", .path.display())]
    TrustRoots {
        /// Location of the bundle.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The platform store and the bundled fallback were both empty.
    #[error("no trust roots available: {0}")]
    NoTrustRoots(String),

    /// Writing the report failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Shorthand for results whose error is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
