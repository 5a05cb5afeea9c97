use super::{Evaluation, TrustFailure, VerificationOutcome, VerifiedChain};
use crate::certificate::{ParsedCertificate, RawCertificateChain};
use crate::error::Result;
use crate::roots::TrustRootSet;
use once_cell::sync::OnceCell;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{ServerName, UnixTime};
use std::sync::Arc;

/// Decides whether a presented chain leads to a trusted root, and describes it.
///
/// Path building is WebPKI's: the certificates after the leaf form an unordered pool
/// that is searched for issuers, so a server sending its intermediates in the wrong
/// order (or sending extra ones) is still verified correctly.
#[derive(Debug)]
pub struct Evaluator {
    roots: Arc<TrustRootSet>,
    crypto_provider: OnceCell<Arc<CryptoProvider>>,
}

impl Evaluator {
    /// Creates an evaluator that trusts exactly `roots`.
    pub fn new(roots: Arc<TrustRootSet>) -> Self {
        Self {
            roots,
            crypto_provider: OnceCell::new(),
        }
    }

    /// Chainable setter to configure the [`CryptoProvider`] whose signature
    /// algorithms are used during path building.
    ///
    /// Without one, the process-default provider is used, or *ring* if none was
    /// installed.
    pub fn with_provider(mut self, crypto_provider: Arc<CryptoProvider>) -> Self {
        self.crypto_provider = crypto_provider.into();
        self
    }

    pub(crate) fn get_provider(&self) -> &Arc<CryptoProvider> {
        self.crypto_provider.get_or_init(|| {
            CryptoProvider::get_default()
                .cloned()
                .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()))
        })
    }

    /// The roots this evaluator trusts.
    pub fn roots(&self) -> &TrustRootSet {
        &self.roots
    }

    /// Parses and verifies `chain` as of `now`.
    ///
    /// `expected_name` of `None` skips the identity check. A certificate that cannot
    /// be decoded is an error; every trust problem is reported in the returned
    /// [`Evaluation`].
    pub fn evaluate(
        &self,
        chain: &RawCertificateChain,
        expected_name: Option<&ServerName<'_>>,
        now: UnixTime,
    ) -> Result<Evaluation> {
        let certificates = chain.parse()?;
        let outcome = self.verify(chain, &certificates, expected_name, now);

        match &outcome {
            VerificationOutcome::Trusted(paths) => {
                log::debug!("chain verified through {} path(s)", paths.len())
            }
            VerificationOutcome::Untrusted(failure) => {
                log::debug!("chain is not trusted: {failure}")
            }
        }

        Ok(Evaluation {
            certificates,
            outcome,
        })
    }

    fn verify(
        &self,
        chain: &RawCertificateChain,
        parsed: &[ParsedCertificate],
        expected_name: Option<&ServerName<'_>>,
        now: UnixTime,
    ) -> VerificationOutcome {
        let end_entity = match webpki::EndEntityCert::try_from(chain.leaf()) {
            Ok(cert) => cert,
            Err(e) => {
                return VerificationOutcome::Untrusted(classify(e, parsed, &self.roots, now))
            }
        };

        let path = end_entity.verify_for_usage(
            self.get_provider().signature_verification_algorithms.all,
            self.roots.anchors(),
            chain.intermediates(),
            now,
            webpki::KeyUsage::server_auth(),
            None,
            None,
        );

        let name = match expected_name {
            Some(name) => end_entity
                .verify_is_valid_for_subject_name(name)
                .map_err(|e| (name, e)),
            None => Ok(()),
        };

        // Validity windows first, then identity, then the issuer path.
        match (path, name) {
            (Err(e), _) if is_time_error(&e) => {
                VerificationOutcome::Untrusted(classify(e, parsed, &self.roots, now))
            }
            (_, Err((name, e))) => VerificationOutcome::Untrusted(match e {
                webpki::Error::CertNotValidForName { .. } => TrustFailure::HostnameMismatch {
                    expected: name.to_str().into_owned(),
                    presented: parsed[0].dns_names.clone(),
                },
                other => classify(other, parsed, &self.roots, now),
            }),
            (Err(e), Ok(())) => {
                VerificationOutcome::Untrusted(classify(e, parsed, &self.roots, now))
            }
            (Ok(path), Ok(())) => {
                let mut certificates = vec![chain.leaf().clone()];
                certificates.extend(
                    path.intermediate_certificates()
                        .map(|cert| cert.der().into_owned()),
                );
                match self.roots.certificate_for(path.anchor()) {
                    Some(root) => certificates.push(root.clone()),
                    None => log::warn!("verified path ends at an anchor without a certificate"),
                }
                VerificationOutcome::Trusted(vec![VerifiedChain::new(certificates)])
            }
        }
    }
}

fn is_time_error(err: &webpki::Error) -> bool {
    matches!(
        err,
        webpki::Error::CertExpired { .. } | webpki::Error::CertNotValidYet { .. }
    )
}

fn classify(
    err: webpki::Error,
    parsed: &[ParsedCertificate],
    roots: &TrustRootSet,
    now: UnixTime,
) -> TrustFailure {
    let now = i64::try_from(now.as_secs()).unwrap_or(i64::MAX);
    match err {
        webpki::Error::CertExpired { .. } => {
            let expired = issuer_walk(parsed)
                .into_iter()
                .find(|cert| cert.not_after_timestamp < now);
            TrustFailure::Expired {
                subject: expired.map(|cert| cert.subject.clone()),
                not_after: expired.map(|cert| cert.not_after.clone()),
            }
        }
        webpki::Error::CertNotValidYet { .. } => {
            let early = issuer_walk(parsed)
                .into_iter()
                .find(|cert| cert.not_before_timestamp > now);
            TrustFailure::NotValidYet {
                subject: early.map(|cert| cert.subject.clone()),
                not_before: early.map(|cert| cert.not_before.clone()),
            }
        }
        webpki::Error::UnknownIssuer => TrustFailure::UnknownIssuer,
        webpki::Error::InvalidSignatureForPublicKey { .. }
        | webpki::Error::SignatureAlgorithmMismatch => {
            // A trusted root with the right name but another key.
            match issuer_walk(parsed)
                .into_iter()
                .find(|cert| roots.has_subject(&cert.issuer))
            {
                Some(cert) => TrustFailure::IssuerKeyMismatch {
                    issuer: cert.issuer.clone(),
                },
                None => TrustFailure::BadSignature,
            }
        }
        webpki::Error::RequiredEkuNotFound { .. }
        | webpki::Error::RequiredEkuNotFoundContext { .. } => TrustFailure::InvalidPurpose,
        webpki::Error::CaUsedAsEndEntity => TrustFailure::CaUsedAsEndEntity,
        other => TrustFailure::Other(format!("certificate verification failed: {other}")),
    }
}

/// The presented certificates reachable from the leaf by following issuer names,
/// leaf first. Extra certificates in the pool that no path uses are left out.
fn issuer_walk(parsed: &[ParsedCertificate]) -> Vec<&ParsedCertificate> {
    let mut visited = vec![false; parsed.len()];
    let mut walk = Vec::new();
    let mut current = 0;
    while let Some(cert) = parsed.get(current) {
        visited[current] = true;
        walk.push(cert);
        if cert.issuer == cert.subject {
            break;
        }
        match (0..parsed.len()).find(|&i| !visited[i] && parsed[i].subject == cert.issuer) {
            Some(next) => current = next,
            None => break,
        }
    }
    walk
}
