mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use senseminds_config::{self as config, ConfigError, Overrides, Profile};
use senseminds_core::RealtimeConfig;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a deployment
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "senseminds", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let realtime = build_realtime_config(&cli.global)?;
            tracing::debug!(command = ?cmd, endpoint = %realtime.realtime_url, "dispatching command");
            commands::dispatch(cmd, realtime, &cli.global).await
        }
    }
}

/// Build a `RealtimeConfig` from the config file, profile, and overrides.
///
/// Precedence for endpoints: CLI flags, then `SENSEMINDS_REALTIME_URL` /
/// `SENSEMINDS_API_URL`, then the profile.
fn build_realtime_config(global: &GlobalOpts) -> Result<RealtimeConfig, CliError> {
    let cfg = config::load_config()?;
    let overrides = Overrides {
        realtime_url: global.realtime_url.clone(),
        api_url: global.api_url.clone(),
    }
    .or(Overrides::from_env());

    match config::resolve_profile(&cfg, global.profile.as_deref()) {
        Ok((name, profile)) => {
            tracing::debug!(profile = name, "using profile");
            Ok(config::profile_to_realtime_config(
                profile,
                &cfg.defaults,
                &overrides,
            )?)
        }
        // No profile on disk: run from overrides alone unless a profile was
        // asked for by name.
        Err(ConfigError::ProfileNotFound { .. })
            if global.profile.is_none() && overrides.realtime_url.is_some() =>
        {
            Ok(config::profile_to_realtime_config(
                &Profile::default(),
                &cfg.defaults,
                &overrides,
            )?)
        }
        Err(ConfigError::ProfileNotFound { .. }) if cfg.profiles.is_empty() => {
            Err(CliError::NoConfig {
                path: config::config_path().display().to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}
