

use crate::verification::FailureKind;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, UnixTime};
use std::time::Duration;

pub(crate) const EXAMPLE_COM: &str = "example.com";

/// Return a fixed [UnixTime] for certificate validation purposes.
///
/// The mock PKI has fixed validity windows, so "now" is pinned to a point inside all
/// of them.
pub(crate) fn verification_time() -> UnixTime {
    // Saturday, June 1, 2024 00:00:00 UTC
    UnixTime::since_unix_epoch(Duration::from_secs(1_717_200_000))
}

/// After the mock leaf's not-after, while its issuers are still valid.
pub(crate) fn expired_time() -> UnixTime {
    // Thursday, January 1, 2026 00:00:00 UTC
    UnixTime::since_unix_epoch(Duration::from_secs(1_767_225_600))
}

/// Before any mock certificate's not-before.
pub(crate) fn not_yet_valid_time() -> UnixTime {
    // Thursday, June 1, 2023 00:00:00 UTC
    UnixTime::since_unix_epoch(Duration::from_secs(1_685_577_600))
}

/// A generated certificate and the key it was issued for.
pub(crate) struct MockCert {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
}

impl MockCert {
    pub fn der(&self) -> &CertificateDer<'static> {
        self.cert.der()
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }
}

/// Root, intermediate and leaf, minted fresh for every test.
pub(crate) struct MockPki {
    pub root: MockCert,
    pub intermediate: MockCert,
    pub leaf: MockCert,
}

#[derive(Clone, Copy)]
enum Validity {
    Fixed,
    /// Like `Fixed`, but the intermediate lapses on 2024-03-01.
    ExpiredIntermediate,
    OpenEnded,
}

#[derive(Clone, Copy)]
enum Role {
    Root,
    Intermediate,
    Leaf,
}

impl Validity {
    fn apply(self, params: &mut CertificateParams, role: Role) {
        let (not_before, not_after) = match (self, role) {
            (Self::OpenEnded, _) => return,
            (Self::ExpiredIntermediate, Role::Intermediate) => ((2024, 1, 1), (2024, 3, 1)),
            (_, Role::Leaf) => ((2024, 1, 1), (2025, 1, 1)),
            (_, Role::Root | Role::Intermediate) => ((2024, 1, 1), (2034, 1, 1)),
        };
        params.not_before = rcgen::date_time_ymd(not_before.0, not_before.1, not_before.2);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
    }
}

impl MockPki {
    /// A PKI whose leaf is valid for `example.com` and `www.example.com`.
    pub fn new() -> Self {
        Self::for_names(&[EXAMPLE_COM, "www.example.com"])
    }

    /// A PKI whose leaf is valid for `names`, which may include IP addresses.
    pub fn for_names(names: &[&str]) -> Self {
        Self::build("fetchcert Test", names, Validity::Fixed, leaf_purpose())
    }

    /// A PKI for the same leaf names with fresh keys and CA names derived from `prefix`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self::build(
            prefix,
            &[EXAMPLE_COM, "www.example.com"],
            Validity::Fixed,
            leaf_purpose(),
        )
    }

    /// A PKI valid as of the real current time, for tests where rustls supplies "now".
    /// CA names are derived from `prefix`, so distinct prefixes give unrelated PKIs.
    pub fn open_ended(prefix: &str, names: &[&str]) -> Self {
        Self::build(prefix, names, Validity::OpenEnded, leaf_purpose())
    }

    /// A PKI whose intermediate expired before [`verification_time`].
    pub fn with_expired_intermediate(prefix: &str) -> Self {
        Self::build(
            prefix,
            &[EXAMPLE_COM],
            Validity::ExpiredIntermediate,
            leaf_purpose(),
        )
    }

    /// A PKI whose leaf is only good for client authentication.
    pub fn client_only() -> Self {
        Self::build(
            "fetchcert Test",
            &[EXAMPLE_COM],
            Validity::Fixed,
            vec![ExtendedKeyUsagePurpose::ClientAuth],
        )
    }

    fn build(
        prefix: &str,
        names: &[&str],
        validity: Validity,
        leaf_usage: Vec<ExtendedKeyUsagePurpose>,
    ) -> Self {
        let root = issue_ca(&format!("{prefix} Root"), validity, Role::Root, None);
        let intermediate = issue_ca(
            &format!("{prefix} Intermediate"),
            validity,
            Role::Intermediate,
            Some(&root),
        );

        let mut params =
            CertificateParams::new(names.iter().map(|name| name.to_string()).collect::<Vec<_>>())
                .unwrap();
        params.distinguished_name = common_name(names.first().copied().unwrap_or("leaf"));
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = leaf_usage;
        validity.apply(&mut params, Role::Leaf);
        let key = KeyPair::generate().unwrap();
        let cert = params
            .signed_by(&key, &intermediate.cert, &intermediate.key)
            .unwrap();

        Self {
            root,
            intermediate,
            leaf: MockCert { cert, key },
        }
    }

    /// The DER of one element of a chain description.
    pub fn presented(&self, cert: Presented, unrelated: &MockPki) -> CertificateDer<'static> {
        match cert {
            Presented::Leaf => self.leaf.der().clone(),
            Presented::Intermediate => self.intermediate.der().clone(),
            Presented::Root => self.root.der().clone(),
            Presented::Unrelated => unrelated.intermediate.der().clone(),
        }
    }
}

fn leaf_purpose() -> Vec<ExtendedKeyUsagePurpose> {
    vec![ExtendedKeyUsagePurpose::ServerAuth]
}

fn issue_ca(name: &str, validity: Validity, role: Role, issuer: Option<&MockCert>) -> MockCert {
    let mut params = CertificateParams::default();
    params.distinguished_name = common_name(name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    validity.apply(&mut params, role);

    let key = KeyPair::generate().unwrap();
    let cert = match issuer {
        Some(issuer) => params.signed_by(&key, &issuer.cert, &issuer.key),
        None => params.self_signed(&key),
    }
    .unwrap();
    MockCert { cert, key }
}

fn common_name(name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    dn
}

/// One entry of a presented chain in a [`TestCase`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum Presented {
    Leaf,
    Intermediate,
    Root,
    /// An intermediate from a different PKI.
    Unrelated,
}

pub(crate) struct TestCase<'a> {
    /// The name we expect the server to be, if any.
    pub reference_id: Option<&'a str>,

    /// The certificates presented by the TLS server, in the same order.
    pub chain: &'a [Presented],

    /// The time to use as the current time for verification.
    pub verification_time: UnixTime,

    /// Length of the verified chain, or the expected classification.
    pub expected_result: Result<usize, FailureKind>,
}
