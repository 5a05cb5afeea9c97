#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use rustls::{client::WantsClientCert, ClientConfig, ConfigBuilder, WantsVerifier};
use std::sync::Arc;

mod certificate;
pub use certificate::{ParsedCertificate, RawCertificateChain};

pub mod cli;

mod error;
pub use error::{Error, Result};

mod handshake;
pub use handshake::{capture, CaptureOptions, CaptureReport, DEFAULT_TIMEOUT};

pub mod report;

mod roots;
pub use roots::{RootSource, TrustRootSet};

mod target;
pub use target::{ConnectionTarget, DEFAULT_PORT};

mod verification;
pub use verification::{
    ChainInterceptor, Evaluation, Evaluator, FailureKind, TrustFailure, VerificationOutcome,
    VerifiedChain,
};

/// Fixtures and mock PKI used by the test suite.
#[cfg(test)]
mod tests;

/// Extension trait to install a [`ChainInterceptor`] on a [`ConfigBuilder`].
pub trait BuilderCaptureExt {
    /// Replaces the builder's certificate verification with `interceptor`.
    ///
    /// The resulting configuration never completes a handshake: it is only useful
    /// for capturing what the server presents.
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use rustls::ClientConfig;
    /// use fetchcert::{BuilderCaptureExt, ChainInterceptor, Evaluator, TrustRootSet};
    ///
    /// # fn main() -> fetchcert::Result<()> {
    /// let roots = Arc::new(TrustRootSet::platform()?);
    /// let provider = Arc::new(rustls::crypto::ring::default_provider());
    /// let interceptor = Arc::new(ChainInterceptor::new(Evaluator::new(roots)));
    /// let config = ClientConfig::builder_with_provider(provider)
    ///     .with_safe_default_protocol_versions()
    ///     .unwrap()
    ///     .with_chain_interceptor(interceptor)
    ///     .with_no_client_auth();
    /// # let _ = config;
    /// # Ok(())
    /// # }
    /// ```
    fn with_chain_interceptor(
        self,
        interceptor: Arc<ChainInterceptor>,
    ) -> ConfigBuilder<ClientConfig, WantsClientCert>;
}

impl BuilderCaptureExt for ConfigBuilder<ClientConfig, WantsVerifier> {
    fn with_chain_interceptor(
        self,
        interceptor: Arc<ChainInterceptor>,
    ) -> ConfigBuilder<ClientConfig, WantsClientCert> {
        self.dangerous()
            .with_custom_certificate_verifier(interceptor)
    }
}
