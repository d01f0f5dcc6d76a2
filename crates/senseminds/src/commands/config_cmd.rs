//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use senseminds_config::{self as config, Config, Overrides, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProfileSummary {
    name: String,
    realtime_url: String,
    api_url: String,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Realtime URL")]
    realtime_url: String,
    #[tabled(rename = "API URL")]
    api_url: String,
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                OutputFormat::Json => output::render_json_pretty(&cfg)?,
                OutputFormat::JsonCompact => output::render_json_compact(&cfg)?,
                OutputFormat::Yaml => output::render_yaml(&cfg)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init(init) => handle_init(init, global),

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let summaries = summarize(&cfg);
            let out = output::render_list(
                &global.output,
                &summaries,
                |s| ProfileRow {
                    marker: if s.default { "*" } else { "" },
                    name: s.name.clone(),
                    realtime_url: s.realtime_url.clone(),
                    api_url: s.api_url.clone(),
                },
                |s| s.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            config::resolve_profile(&cfg, Some(&name))?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}

fn handle_init(init: InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config()?;

    if cfg.profiles.contains_key(&init.name) && !init.force {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: format!("profile '{}' already exists (use --force to replace it)", init.name),
        });
    }

    let profile = Profile {
        api_url: init.api_url,
        room: init.room,
        ..Profile::new(init.realtime_url)
    };
    // Reject bad URLs before they reach disk.
    config::profile_to_realtime_config(&profile, &cfg.defaults, &Overrides::default())?;

    let first = cfg.profiles.is_empty();
    cfg.profiles.insert(init.name.clone(), profile);
    if first || cfg.default_profile.is_none() {
        cfg.default_profile = Some(init.name.clone());
    }

    let path = config::config_path();
    config::save_config_to(&cfg, &path)?;
    if !global.quiet {
        eprintln!("Saved profile '{}' to {}", init.name, path.display());
    }
    Ok(())
}

fn summarize(cfg: &Config) -> Vec<ProfileSummary> {
    cfg.profiles
        .iter()
        .map(|(name, profile)| {
            let resolved =
                config::profile_to_realtime_config(profile, &cfg.defaults, &Overrides::default());
            let (realtime_url, api_url) = match resolved {
                Ok(rc) => (rc.realtime_url.to_string(), rc.api_url.to_string()),
                Err(e) => (profile.realtime_url.clone(), format!("(invalid: {e})")),
            };
            ProfileSummary {
                name: name.clone(),
                realtime_url,
                api_url,
                default: cfg.default_profile.as_deref() == Some(name.as_str()),
            }
        })
        .collect()
}
