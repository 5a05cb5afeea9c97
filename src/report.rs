//! Rendering a capture for humans and scripts.
//!
//! The layout is line oriented: for every presented certificate a separator line,
//! its PEM block and its summary; then a final separator and one verdict line per
//! verified chain, or a single `Untrusted certificate:` line.

use crate::certificate::ParsedCertificate;
use crate::handshake::CaptureReport;
use crate::verification::VerificationOutcome;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io::{self, Write};

/// Line written between certificates and before the verdict.
pub const SEPARATOR: &str = "========================================";

const PEM_LINE_WIDTH: usize = 64;

/// What to print for each certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// PEM block followed by the parsed summary.
    #[default]
    Full,
    /// PEM block only.
    PemOnly,
}

/// Writes the whole report for `report` to `out`.
pub fn write_report(out: &mut impl Write, report: &CaptureReport, layout: Layout) -> io::Result<()> {
    let presented = report.chain.certificates();
    for (der, parsed) in presented.iter().zip(&report.evaluation.certificates) {
        writeln!(out, "{SEPARATOR}")?;
        write_pem(out, der)?;
        if layout == Layout::Full {
            write_summary(out, parsed)?;
        }
    }
    writeln!(out, "{SEPARATOR}")?;
    write_verdict(out, &report.evaluation.outcome)
}

/// Writes `der` as a PEM `CERTIFICATE` block.
pub fn write_pem(out: &mut impl Write, der: &[u8]) -> io::Result<()> {
    let body = STANDARD.encode(der);

    writeln!(out, "-----BEGIN CERTIFICATE-----")?;
    // Base64 output is ASCII, so byte chunks are valid UTF-8.
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }
    writeln!(out, "-----END CERTIFICATE-----")
}

/// Writes the descriptive fields of one certificate.
pub fn write_summary(out: &mut impl Write, cert: &ParsedCertificate) -> io::Result<()> {
    writeln!(out, "Serial Number: {}", cert.serial_number)?;
    writeln!(out, "Subject: {}", cert.subject)?;
    writeln!(out, "Issuer: {}", cert.issuer)?;
    writeln!(out, "Not Before: {}", cert.not_before)?;
    writeln!(out, "Not After: {}", cert.not_after)?;
    writeln!(out, "Subject Alt Names: {}", cert.dns_names.join(";"))
}

/// Writes the trust verdict.
pub fn write_verdict(out: &mut impl Write, outcome: &VerificationOutcome) -> io::Result<()> {
    match outcome {
        VerificationOutcome::Trusted(chains) => {
            for chain in chains {
                writeln!(out, "Trusted certificate: verified chain {chain}")?;
            }
            Ok(())
        }
        VerificationOutcome::Untrusted(failure) => {
            writeln!(out, "Untrusted certificate: {failure}")
        }
    }
}
