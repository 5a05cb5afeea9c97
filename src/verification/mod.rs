use crate::certificate::ParsedCertificate;
use rustls::pki_types::CertificateDer;
use std::fmt;

mod evaluator;
pub use evaluator::Evaluator;

mod interceptor;
pub use interceptor::ChainInterceptor;

/// Everything learned from one presented chain.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Descriptive fields of every presented certificate, in presentation order.
    pub certificates: Vec<ParsedCertificate>,
    /// The trust verdict.
    pub outcome: VerificationOutcome,
}

impl Evaluation {
    /// Whether a path to a trusted root was found.
    pub fn is_trusted(&self) -> bool {
        matches!(self.outcome, VerificationOutcome::Trusted(_))
    }
}

/// The verdict for a presented chain. Exactly one is produced per evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// At least one path from the leaf to a trusted root exists.
    Trusted(Vec<VerifiedChain>),
    /// No trusted path exists, for the given reason.
    Untrusted(TrustFailure),
}

/// A path from the leaf to a trust anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedChain {
    certificates: Vec<CertificateDer<'static>>,
    subjects: Vec<String>,
}

impl VerifiedChain {
    pub(crate) fn new(certificates: Vec<CertificateDer<'static>>) -> Self {
        let subjects = certificates
            .iter()
            .enumerate()
            .map(|(index, der)| {
                ParsedCertificate::from_der(index, der)
                    .map(|parsed| parsed.subject)
                    .unwrap_or_else(|_| "<unparsable>".to_owned())
            })
            .collect();
        Self {
            certificates,
            subjects,
        }
    }

    /// Certificates from the leaf to the root, root included.
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    /// Subject names in the same order as [`certificates`](Self::certificates).
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    /// Number of certificates in the path.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always `false` for a path produced by the evaluator.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

impl fmt::Display for VerifiedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subjects.join(" -> "))
    }
}

/// Why a captured chain is not trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrustFailure {
    /// A certificate on the path is past its not-after time.
    #[error("certificate has expired{}", describe_window(.subject, "not valid after", .not_after))]
    Expired {
        /// Subject of the offending certificate, when it could be located.
        subject: Option<String>,
        /// Its not-after time.
        not_after: Option<String>,
    },

    /// A certificate on the path is before its not-before time.
    #[error("certificate is not yet valid{}", describe_window(.subject, "not valid before", .not_before))]
    NotValidYet {
        /// Subject of the offending certificate, when it could be located.
        subject: Option<String>,
        /// Its not-before time.
        not_before: Option<String>,
    },

    /// The leaf does not carry the expected identity.
    #[error("certificate is valid for {}, not {expected}", describe_names(.presented))]
    HostnameMismatch {
        /// The name the client asked for.
        expected: String,
        /// DNS names found in the leaf.
        presented: Vec<String>,
    },

    /// No issuer path reaches a trusted root.
    #[error("certificate signed by unknown authority (no path to a trusted root, an intermediate may be missing)")]
    UnknownIssuer,

    /// A signature on the path does not verify.
    #[error("certificate signature is invalid")]
    BadSignature,

    /// The chain names a trusted root as its issuer, but was not signed by that
    /// root's key.
    #[error("issuer name matches trusted root {issuer} but its key does not")]
    IssuerKeyMismatch {
        /// The issuer name shared with the trusted root.
        issuer: String,
    },

    /// The leaf is not allowed to authenticate TLS servers.
    #[error("certificate is not valid for TLS server authentication")]
    InvalidPurpose,

    /// The leaf is a CA certificate.
    #[error("certificate authority used as a server certificate")]
    CaUsedAsEndEntity,

    /// Anything else path validation rejected.
    #[error("{0}")]
    Other(String),
}

/// Machine-readable classification of a [`TrustFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// See [`TrustFailure::Expired`].
    Expired,
    /// See [`TrustFailure::NotValidYet`].
    NotValidYet,
    /// See [`TrustFailure::HostnameMismatch`].
    HostnameMismatch,
    /// See [`TrustFailure::UnknownIssuer`].
    UnknownIssuer,
    /// See [`TrustFailure::BadSignature`].
    BadSignature,
    /// See [`TrustFailure::IssuerKeyMismatch`].
    IssuerKeyMismatch,
    /// See [`TrustFailure::InvalidPurpose`].
    InvalidPurpose,
    /// See [`TrustFailure::CaUsedAsEndEntity`].
    CaUsedAsEndEntity,
    /// See [`TrustFailure::Other`].
    Other,
}

impl TrustFailure {
    /// The classification without its details.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Expired { .. } => FailureKind::Expired,
            Self::NotValidYet { .. } => FailureKind::NotValidYet,
            Self::HostnameMismatch { .. } => FailureKind::HostnameMismatch,
            Self::UnknownIssuer => FailureKind::UnknownIssuer,
            Self::BadSignature => FailureKind::BadSignature,
            Self::IssuerKeyMismatch { .. } => FailureKind::IssuerKeyMismatch,
            Self::InvalidPurpose => FailureKind::InvalidPurpose,
            Self::CaUsedAsEndEntity => FailureKind::CaUsedAsEndEntity,
            Self::Other(_) => FailureKind::Other,
        }
    }
}

fn describe_window(subject: &Option<String>, relation: &str, time: &Option<String>) -> String {
    match (subject, time) {
        (Some(subject), Some(time)) => format!(": {subject} is {relation} {time}"),
        _ => String::new(),
    }
}

fn describe_names(names: &[String]) -> String {
    if names.is_empty() {
        "no DNS names".to_owned()
    } else {
        names.join(", ")
    }
}

// Log the certificate we are verifying so that we can try and find what may be wrong with it
// if we need to debug a user's situation.
fn log_server_cert(_end_entity: &CertificateDer<'_>) {
    #[cfg(feature = "cert-logging")]
    {
        use base64::Engine;
        log::debug!(
            "captured certificate: {}",
            base64::engine::general_purpose::STANDARD.encode(_end_entity.as_ref())
        );
    }
}
