use super::{log_server_cert, Evaluation, Evaluator, VerificationOutcome};
use crate::certificate::RawCertificateChain;
use crate::error::Error;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types;
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use std::sync::{Mutex, PoisonError};

/// Message of the error the interceptor ends every handshake with.
pub(crate) const CAPTURE_COMPLETE: &str = "certificate chain captured, ending handshake";

/// A captured chain together with what the evaluator made of it.
#[derive(Debug)]
pub(crate) struct Capture {
    pub(crate) chain: RawCertificateChain,
    pub(crate) evaluation: Evaluation,
}

/// A certificate "verifier" that records the chain a server presents instead of
/// gating the handshake on it.
///
/// rustls calls the verifier as soon as the server's certificates arrive. At that
/// point the interceptor copies the chain, runs the [`Evaluator`] synchronously
/// against the name the connection was opened for, and keeps the result for
/// [`take_capture`](Self::take_capture). Whatever the verdict, it then fails the
/// handshake: the session is never needed, and reporting trust is decoupled from
/// whether the transport continues.
#[derive(Debug)]
pub struct ChainInterceptor {
    evaluator: Evaluator,
    legacy_signature_schemes: bool,
    captured: Mutex<Option<Result<Capture, Error>>>,
}

impl ChainInterceptor {
    /// Creates an interceptor that hands captured chains to `evaluator`.
    pub fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
            legacy_signature_schemes: false,
            captured: Mutex::new(None),
        }
    }

    /// Chainable setter that also offers SHA-1 based signature schemes in the
    /// ClientHello, which some old servers require before they will send their
    /// certificates.
    pub fn with_legacy_signature_schemes(mut self, enabled: bool) -> Self {
        self.legacy_signature_schemes = enabled;
        self
    }

    /// Removes and returns what the last handshake captured, if it got that far.
    pub(crate) fn take_capture(&self) -> Option<Result<Capture, Error>> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Whether `err` is the one this interceptor ends handshakes with.
    pub fn is_capture_complete(err: &TlsError) -> bool {
        matches!(err, TlsError::General(msg) if msg == CAPTURE_COMPLETE)
    }
}

impl ServerCertVerifier for ChainInterceptor {
    fn verify_server_cert(
        &self,
        end_entity: &pki_types::CertificateDer<'_>,
        intermediates: &[pki_types::CertificateDer<'_>],
        server_name: &pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        now: pki_types::UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        log_server_cert(end_entity);

        let chain = RawCertificateChain::from_handshake(end_entity, intermediates);
        log::debug!("captured {} certificate(s) for {:?}", chain.len(), server_name);

        let result = self
            .evaluator
            .evaluate(&chain, Some(server_name), now)
            .map(|evaluation| Capture { chain, evaluation });

        match &result {
            Ok(Capture {
                evaluation:
                    Evaluation {
                        outcome: VerificationOutcome::Untrusted(failure),
                        ..
                    },
                ..
            }) => log::error!("failed to verify TLS certificate: {}", failure),
            Ok(_) => log::debug!("TLS certificate verified"),
            Err(e) => log::error!("failed to evaluate TLS certificate: {}", e),
        }

        *self.captured.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);

        Err(TlsError::General(CAPTURE_COMPLETE.to_owned()))
    }

    // The handshake never gets past the certificate message, but the signatures are
    // checked properly should that ever change.
    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.evaluator.get_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.evaluator.get_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        let mut schemes = self
            .evaluator
            .get_provider()
            .signature_verification_algorithms
            .supported_schemes();

        if self.legacy_signature_schemes {
            for legacy in [
                SignatureScheme::RSA_PKCS1_SHA1,
                SignatureScheme::ECDSA_SHA1_Legacy,
            ] {
                if !schemes.contains(&legacy) {
                    schemes.push(legacy);
                }
            }
        }

        schemes
    }
}
