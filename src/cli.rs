//! Command-line front end of the `fetchcert` binary.

use crate::error::Result;
use crate::handshake::{capture, CaptureOptions};
use crate::report::{write_report, Layout};
use crate::roots::TrustRootSet;
use crate::target::ConnectionTarget;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Exit status when a chain was captured but is not trusted.
pub const EXIT_UNTRUSTED: u8 = 2;

/// Show the certificate chain a TLS server presents and why it is or is not trusted.
#[derive(Parser, Debug)]
#[command(name = "fetchcert", version, about)]
pub struct Cli {
    /// Destination: host, host:port, or an http(s) URL.
    #[arg(value_name = "host|host:port|http[s]://url")]
    pub destination: String,

    /// Print the certificates in PEM format only, without the parsed details.
    #[arg(long)]
    pub pem: bool,

    /// Server name to send in SNI and to expect in the certificate.
    #[arg(long, value_name = "NAME")]
    pub servername: Option<String>,

    /// PEM bundle of trusted roots, replacing the system store.
    #[arg(long, value_name = "PATH")]
    pub cafile: Option<PathBuf>,

    /// Seconds to wait for the connection and the server's certificates.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Also offer the SHA-1 signature schemes some old servers require.
    #[arg(
        long,
        env = "FETCHCERT_LEGACY_KEY_EXCHANGE",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::SetTrue
    )]
    pub legacy_key_exchange: bool,

    /// More log output; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The capture options these arguments describe. Loads the CA bundle if one was
    /// given, so a bad bundle fails before any connection is made.
    pub fn capture_options(&self) -> Result<CaptureOptions> {
        let roots = match &self.cafile {
            Some(path) => Some(Arc::new(TrustRootSet::from_pem_file(path)?)),
            None => None,
        };

        Ok(CaptureOptions {
            roots,
            timeout: Duration::from_secs(self.timeout),
            legacy_key_exchange: self.legacy_key_exchange,
        })
    }

    fn layout(&self) -> Layout {
        if self.pem {
            Layout::PemOnly
        } else {
            Layout::Full
        }
    }
}

/// Installs the process logger. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

/// Runs one capture and prints the report to stdout.
///
/// Returns whether the captured chain is trusted.
pub fn run(cli: &Cli) -> Result<bool> {
    let target =
        ConnectionTarget::parse(&cli.destination)?.with_server_name(cli.servername.clone());
    let options = cli.capture_options()?;

    let report = capture(&target, &options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, &report, cli.layout())?;
    out.flush()?;

    Ok(report.evaluation.is_trusted())
}

/// Maps the result of [`run`] to the process exit status.
pub fn exit_code(result: &Result<bool>) -> ExitCode {
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_UNTRUSTED),
        Err(_) => ExitCode::FAILURE,
    }
}
