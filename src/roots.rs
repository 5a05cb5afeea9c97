//! Trust anchors the evaluator verifies against.

use crate::error::{Error, Result};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, TrustAnchor};
use std::path::Path;
use x509_parser::prelude::{FromDer, X509Certificate};

/// The set of certificates trusted as path-building anchors for one run.
///
/// Either the platform store or an operator-supplied bundle; a bundle replaces the
/// platform store rather than adding to it.
#[derive(Debug, Clone)]
pub struct TrustRootSet {
    // `anchors[i]` is derived from `certificates[i]`.
    anchors: Vec<TrustAnchor<'static>>,
    certificates: Vec<CertificateDer<'static>>,
    source: RootSource,
}

/// Where a [`TrustRootSet`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSource {
    /// The operating system's certificate store.
    Platform,
    /// The Mozilla set bundled with the binary, used when the platform had nothing.
    Bundled,
    /// A PEM file given by the operator.
    File(std::path::PathBuf),
    /// Certificates handed over directly by the caller.
    Custom,
}

impl TrustRootSet {
    /// Loads the operating system's roots, falling back to the bundled Mozilla set
    /// when the platform store is empty.
    pub fn platform() -> Result<Self> {
        let result = rustls_native_certs::load_native_certs();
        for error in &result.errors {
            log::warn!("Error loading CA root certificate: {error}");
        }

        let (roots, ignored) = Self::collect_parsable(result.certs, RootSource::Platform);
        if ignored != 0 {
            log::warn!("{ignored} CA root certificates from the system were ignored due to errors");
        }

        if !roots.is_empty() {
            log::debug!("Loaded {} CA certificates from the system", roots.len());
            return Ok(roots);
        }

        log::warn!("No CA certificates were loaded from the system, using the bundled set");
        let (roots, _) = Self::collect_parsable(
            webpki_root_certs::TLS_SERVER_ROOT_CERTS.iter().cloned(),
            RootSource::Bundled,
        );
        if roots.is_empty() {
            return Err(Error::NoTrustRoots(
                "the system store and the bundled set are both empty".to_owned(),
            ));
        }
        Ok(roots)
    }

    /// Loads a PEM bundle. Every certificate in it must be usable as a trust anchor.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_error = |reason: String| Error::TrustRoots {
            path: path.to_owned(),
            reason,
        };

        let certificates = CertificateDer::pem_file_iter(path)
            .map_err(|e| load_error(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| load_error(e.to_string()))?;

        let mut roots = Self::from_certificates(certificates).map_err(|e| match e {
            Error::TrustRoots { reason, .. } => load_error(reason),
            other => other,
        })?;
        roots.source = RootSource::File(path.to_owned());

        log::debug!("Loaded {} CA certificates from {}", roots.len(), path.display());
        Ok(roots)
    }

    /// Trusts exactly the given DER certificates.
    pub fn from_certificates(
        certificates: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Result<Self> {
        let mut roots = Self::empty(RootSource::Custom);
        for (index, cert) in certificates.into_iter().enumerate() {
            roots.add(cert).map_err(|e| Error::TrustRoots {
                path: "<memory>".into(),
                reason: format!("certificate #{index} is not a usable trust anchor: {e}"),
            })?;
        }

        if roots.is_empty() {
            return Err(Error::TrustRoots {
                path: "<memory>".into(),
                reason: "no certificates found".to_owned(),
            });
        }
        Ok(roots)
    }

    fn empty(source: RootSource) -> Self {
        Self {
            anchors: Vec::new(),
            certificates: Vec::new(),
            source,
        }
    }

    fn add(&mut self, cert: CertificateDer<'static>) -> std::result::Result<(), webpki::Error> {
        let anchor = webpki::anchor_from_trusted_cert(&cert)?.to_owned();
        self.anchors.push(anchor);
        self.certificates.push(cert);
        Ok(())
    }

    // Mirrors `RootCertStore::add_parsable_certificates`: skip what cannot be an anchor.
    fn collect_parsable(
        certificates: impl IntoIterator<Item = CertificateDer<'static>>,
        source: RootSource,
    ) -> (Self, usize) {
        let mut roots = Self::empty(source);
        let mut ignored = 0;
        for cert in certificates {
            if let Err(e) = roots.add(cert) {
                log::debug!("Skipping unusable root certificate: {e}");
                ignored += 1;
            }
        }
        (roots, ignored)
    }

    /// Trust anchors in the form path building consumes.
    pub fn anchors(&self) -> &[TrustAnchor<'static>] {
        &self.anchors
    }

    /// The root certificate an anchor was derived from.
    pub fn certificate_for(&self, anchor: &TrustAnchor<'_>) -> Option<&CertificateDer<'static>> {
        self.anchors
            .iter()
            .position(|candidate| {
                candidate.subject == anchor.subject
                    && candidate.subject_public_key_info == anchor.subject_public_key_info
            })
            .map(|index| &self.certificates[index])
    }

    /// Whether a trusted root carries the subject name `subject`, as rendered in
    /// [`ParsedCertificate::subject`](crate::ParsedCertificate::subject).
    pub fn has_subject(&self, subject: &str) -> bool {
        self.certificates.iter().any(|cert| {
            X509Certificate::from_der(cert)
                .map(|(_, parsed)| parsed.subject().to_string() == subject)
                .unwrap_or(false)
        })
    }

    /// Where the roots were loaded from.
    pub fn source(&self) -> &RootSource {
        &self.source
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether no anchor is present.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
