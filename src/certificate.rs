use crate::error::{Error, Result};
use rustls::pki_types::CertificateDer;
use x509_parser::prelude::*;

/// The certificates a peer presented during one handshake, leaf first.
///
/// Never empty. The order is the order received, which is not necessarily the
/// issuer hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCertificateChain {
    certificates: Vec<CertificateDer<'static>>,
}

impl RawCertificateChain {
    /// Wraps the presented certificates, refusing an empty chain.
    pub fn new(certificates: Vec<CertificateDer<'static>>) -> Result<Self> {
        if certificates.is_empty() {
            return Err(Error::NoCertificates);
        }
        Ok(Self { certificates })
    }

    /// Builds a chain from the pieces rustls hands to a certificate verifier.
    pub fn from_handshake(
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) -> Self {
        let certificates = std::iter::once(end_entity)
            .chain(intermediates)
            .map(|cert| cert.clone().into_owned())
            .collect();
        Self { certificates }
    }

    /// The end-entity certificate.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.certificates[0]
    }

    /// Every certificate after the leaf, in presentation order.
    pub fn intermediates(&self) -> &[CertificateDer<'static>] {
        &self.certificates[1..]
    }

    /// All certificates, leaf first.
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    /// Number of certificates presented.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Decodes every certificate, stopping at the first that is not valid X.509.
    pub fn parse(&self) -> Result<Vec<ParsedCertificate>> {
        self.certificates
            .iter()
            .enumerate()
            .map(|(index, der)| ParsedCertificate::from_der(index, der))
            .collect()
    }
}

/// Descriptive fields of one certificate, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    /// Serial number in decimal.
    pub serial_number: String,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Start of the validity window.
    pub not_before: String,
    /// End of the validity window.
    pub not_after: String,
    /// `not_before` as seconds since the Unix epoch.
    pub not_before_timestamp: i64,
    /// `not_after` as seconds since the Unix epoch.
    pub not_after_timestamp: i64,
    /// DNS names from the subject alternative name extension.
    pub dns_names: Vec<String>,
}

impl ParsedCertificate {
    /// Decodes the certificate found at `index` of a presented chain.
    pub fn from_der(index: usize, der: &[u8]) -> Result<Self> {
        let (rest, x509) = X509Certificate::from_der(der).map_err(|e| Error::Parse {
            index,
            reason: e.to_string(),
        })?;
        if !rest.is_empty() {
            return Err(Error::Parse {
                index,
                reason: format!("{} trailing bytes after certificate", rest.len()),
            });
        }

        let dns_names = match x509.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_owned()),
                    _ => None,
                })
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                return Err(Error::Parse {
                    index,
                    reason: format!("invalid subject alternative name: {e}"),
                })
            }
        };

        let validity = x509.validity();
        Ok(Self {
            serial_number: x509.serial.to_string(),
            subject: x509.subject().to_string(),
            issuer: x509.issuer().to_string(),
            not_before: validity.not_before.to_string(),
            not_after: validity.not_after.to_string(),
            not_before_timestamp: validity.not_before.timestamp(),
            not_after_timestamp: validity.not_after.timestamp(),
            dns_names,
        })
    }
}
