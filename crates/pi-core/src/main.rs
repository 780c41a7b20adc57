//! pi-core CLI entry point.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pi_common::{Error, OsFs};
use pi_config::{resolve_config, CliOverrides};
use pi_core::exit_codes::ExitCode;
use pi_core::fetch::{ArtifactFetcher, ArtifactReference};
use pi_core::logging::{init_logging, LogFormat};
use pi_core::output::{render, OutputFormat};
use pi_core::pipeline::{InstallRequest, PluginInstaller};
use serde_json::json;
use tracing::{debug, error};

/// Plugin artifact installer
#[derive(Parser, Debug)]
#[command(name = "pi-core", version, about)]
struct Cli {
    /// Config file (overrides PI_CONFIG and the default location)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install plugins from an artifact URL or local zip
    Install(InstallArgs),
}

#[derive(Args, Debug)]
struct InstallArgs {
    /// Artifact URL (http/https) or local path
    artifact: String,

    /// Plugin root; bin/ and work/ live beneath it
    #[arg(long, value_name = "DIR")]
    prefix: Option<PathBuf>,

    /// Replace plugins that are already installed
    #[arg(long)]
    overwrite: bool,

    /// Keep the scratch directory after the install
    #[arg(long)]
    keep_work: bool,

    /// Report format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose, cli.quiet);

    let code = match &cli.command {
        Commands::Install(args) => run_install(&cli, args),
    };
    std::process::exit(code.as_i32());
}

fn run_install(cli: &Cli, args: &InstallArgs) -> ExitCode {
    match install(cli, args) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, args.format);
            ExitCode::from(&err)
        }
    }
}

fn install(cli: &Cli, args: &InstallArgs) -> Result<ExitCode, Error> {
    let overrides = CliOverrides {
        config: cli.config.clone(),
        prefix: args.prefix.clone(),
        overwrite: args.overwrite,
        keep_work: args.keep_work,
    };
    let config = resolve_config(&overrides)?;
    debug!(?config, "resolved configuration");

    let artifact = ArtifactReference::parse(&args.artifact)?;
    let request = InstallRequest::from_config(artifact, &config);
    let installer = PluginInstaller::new(OsFs, ArtifactFetcher::new(&config.http));
    let report = installer.install(&request)?;

    match render(&report, args.format) {
        Ok(rendered) => {
            print!("{rendered}");
            if args.format == OutputFormat::Json {
                println!();
            }
            Ok(ExitCode::Ok)
        }
        Err(e) => {
            error!(error = %e, "failed to render report");
            Ok(ExitCode::InternalError)
        }
    }
}

fn report_error(err: &Error, format: OutputFormat) {
    debug!(code = err.code(), kind = %err.kind(), error = %err, "install failed");
    match format {
        OutputFormat::Json => {
            let body = json!({
                "error": {
                    "code": err.code(),
                    "kind": err.kind().to_string(),
                    "message": err.to_string(),
                }
            });
            println!("{body}");
        }
        OutputFormat::Text => eprintln!("error: {err}"),
    }
}
