use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use nudge_core::{HostInfo, NotificationFrequency, Platform, RequirementChecks, Value};

#[derive(Debug, Parser)]
#[command(name = "nudge", version, about = "Check whether an installed app should update")]
pub struct Cli {
    /// Enable debug logging to stderr and the log file.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve an update configuration document.
    Check(CheckArgs),
    /// Resolve against the public app-store lookup API.
    Store(StoreArgs),
    /// Forget which versions have already been notified.
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    Once,
    Always,
}

impl From<FrequencyArg> for NotificationFrequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Once => Self::Once,
            FrequencyArg::Always => Self::Always,
        }
    }
}

#[derive(Debug, Args)]
pub struct HostArgs {
    /// Installed app version, e.g. 2.4.1.
    #[arg(long, env = "NUDGE_APP_VERSION")]
    pub app_version: Option<String>,

    /// Installed build number.
    #[arg(long, env = "NUDGE_BUILD_NUMBER")]
    pub build: Option<String>,

    /// Device OS version, e.g. 17.4.
    #[arg(long, env = "NUDGE_OS_VERSION")]
    pub os_version: Option<String>,
}

impl HostArgs {
    pub fn host_info(&self) -> HostInfo {
        HostInfo {
            app_version: self.app_version.clone(),
            build_number: self.build.clone(),
            os_version: self.os_version.clone(),
            bundle_id: None,
        }
    }
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Configuration document URL (defaults to the `config_url` setting).
    #[arg(long, conflicts_with = "file")]
    pub url: Option<String>,

    /// Read the configuration document from a local file.
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub platform: Option<Platform>,

    #[arg(long, value_enum)]
    pub frequency: Option<FrequencyArg>,

    /// Only accept entries whose requirement KEY equals VALUE. Repeatable.
    #[arg(long = "require", value_name = "KEY=VALUE", value_parser = parse_requirement)]
    pub requirements: Vec<(String, Value)>,

    #[command(flatten)]
    pub host: HostArgs,
}

impl CheckArgs {
    pub fn requirement_checks(&self) -> RequirementChecks {
        self.requirements
            .iter()
            .cloned()
            .fold(RequirementChecks::new(), |checks, (key, expected)| {
                checks.with_equals(key, expected)
            })
    }
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Bundle identifier (defaults to the `bundle_id` setting).
    #[arg(long)]
    pub bundle_id: Option<String>,

    /// Two-letter storefront country code.
    #[arg(long)]
    pub country: Option<String>,

    /// Report whether the release is still in its phased rollout window.
    #[arg(long)]
    pub track_phased_release: bool,

    #[arg(long, value_enum)]
    pub frequency: Option<FrequencyArg>,

    #[command(flatten)]
    pub host: HostArgs,
}

fn parse_requirement(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty requirement key in {raw:?}"));
    }

    let value = value.trim();
    let value = match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => value
            .parse::<i64>()
            .map_or_else(|_| Value::from(value), Value::from),
    };
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use nudge_core::{Platform, RequirementSet, Value};

    use super::{Cli, Command, parse_requirement};

    #[test]
    fn parse_requirement_infers_scalar_types() {
        assert_eq!(
            parse_requirement("channel=beta"),
            Ok(("channel".to_string(), Value::from("beta")))
        );
        assert_eq!(
            parse_requirement("cohort=12"),
            Ok(("cohort".to_string(), Value::from(12)))
        );
        assert_eq!(
            parse_requirement("enrolled = true"),
            Ok(("enrolled".to_string(), Value::Bool(true)))
        );
        assert!(parse_requirement("novalue").is_err());
        assert!(parse_requirement("=x").is_err());
    }

    #[test]
    fn check_command_collects_arguments() {
        let cli = Cli::try_parse_from([
            "nudge",
            "check",
            "--file",
            "update.json",
            "--platform",
            "macos",
            "--require",
            "channel=beta",
            "--app-version",
            "1.2",
            "--os-version",
            "14.0",
            "--json",
        ])
        .expect("arguments parse");

        assert!(cli.json);
        let Command::Check(args) = cli.command else {
            panic!("expected check command");
        };
        assert_eq!(args.platform, Some(Platform::Macos));
        assert_eq!(args.host.host_info().app_version.as_deref(), Some("1.2"));

        let checks = args.requirement_checks();
        let requirements = RequirementSet {
            required_os_version: None,
            user_defined: [("channel".to_string(), Value::from("beta"))].into(),
        };
        assert!(checks.evaluate(Some(&requirements)));
    }

    #[test]
    fn url_and_file_conflict() {
        assert!(
            Cli::try_parse_from([
                "nudge",
                "check",
                "--url",
                "https://example.com/u.json",
                "--file",
                "u.json"
            ])
            .is_err()
        );
    }
}
