//! crxpack - package a browser extension directory into a signed CRX

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use crx_core::{KeySource, PackConfig, PackError, PackRequest};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crxpack")]
#[command(
    version = env!("CRXPACK_VERSION"),
    about = "Package an extension directory into a signed CRX file",
    override_usage = "crxpack [options] extension_dir"
)]
struct Cli {
    /// Directory containing the extension (manifest.json and friends)
    extension_dir: PathBuf,

    /// Private key to sign with; generated if missing [default: <extension_dir>.pem]
    #[arg(long, value_name = "path")]
    key: Option<PathBuf>,

    /// Where to write the package [default: <extension_dir>.crx]
    #[arg(long, value_name = "path")]
    output: Option<PathBuf>,
}

impl Cli {
    fn into_request(self) -> Result<PackRequest, PackError> {
        PackRequest::new(self.extension_dir, self.key, self.output)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and count as success. If the
            // terminal is gone there is nowhere left to report that.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = PackConfig::from_env();
    let request = cli.into_request()?;
    tracing::debug!("{request:?} with {config:?}");

    let outcome = crx_core::pack(&request, &config)?;

    if outcome.key_source == KeySource::Generated {
        println!("Generated private key {}", outcome.key_path.display());
    }
    println!(
        "Created {} ({} bytes)",
        outcome.crx_path.display(),
        outcome.package_len()
    );
    println!("Extension ID: {}", outcome.extension_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;
    use std::path::Path;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn accepts_equals_and_separate_values() {
        let cli = Cli::try_parse_from([
            "crxpack",
            "--key=keys/ext.pem",
            "--output",
            "dist/ext.crx",
            "ext",
        ])
        .unwrap();
        let request = cli.into_request().unwrap();
        assert_eq!(request.extension_dir, Path::new("ext"));
        assert_eq!(request.key_path, Path::new("keys/ext.pem"));
        assert_eq!(request.output_path, Path::new("dist/ext.crx"));
    }

    #[test]
    fn defaults_sit_next_to_the_directory() {
        let request = Cli::try_parse_from(["crxpack", "work/my_ext"])
            .unwrap()
            .into_request()
            .unwrap();
        assert_eq!(request.key_path, Path::new("work/my_ext.pem"));
        assert_eq!(request.output_path, Path::new("work/my_ext.crx"));
    }

    #[test]
    fn missing_directory_argument_is_an_error() {
        let err = Cli::try_parse_from(["crxpack"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());
    }

    #[test]
    fn help_is_not_an_error_exit() {
        let err = Cli::try_parse_from(["crxpack", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
        let help = err.to_string();
        assert!(help.contains("crxpack [options] extension_dir"));
        assert!(help.contains("--key <path>"));
        assert!(help.contains("--output <path>"));
    }
}
