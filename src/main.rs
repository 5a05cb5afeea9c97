use clap::error::ErrorKind;
use clap::Parser;
use fetchcert::cli::{exit_code, init_logging, run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // Usage errors share the fatal status rather than clap's default.
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose);

    let result = run(&cli);
    if let Err(e) = &result {
        log::debug!("{e:?}");
        eprintln!("Error: {e}");
    }
    exit_code(&result)
}
