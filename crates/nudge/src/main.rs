mod cli;
mod error;
mod logging;
mod report;
mod settings;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{debug, info, warn};
use nudge_core::{CheckError, CheckOptions, NotificationFrequency, NotifyPolicy};
use nudge_platform::FileNotifyStore;

use crate::cli::{CheckArgs, Cli, Command, FrequencyArg, StoreArgs};
use crate::error::AppError;
use crate::settings::{AppSettings, SettingsError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let (settings, settings_error) = settings_or_default(AppSettings::load());
    logging::init_logging(
        cli.debug || settings.debug_logging,
        settings.max_log_size_bytes,
    );
    if let Some(error) = settings_error {
        warn!("Using default settings: {error}");
    }

    match run(cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Check(error)) => {
            eprint!("{}", report::describe_error(&error));
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: &AppSettings) -> Result<(), AppError> {
    match cli.command {
        Command::Check(args) => run_check(args, settings, cli.json).await,
        Command::Store(args) => run_store(args, settings, cli.json).await,
        Command::Reset => {
            let store = FileNotifyStore::open_default()?;
            store.clear()?;
            info!("Cleared notify state at {}", store.path().display());
            println!("Notification history cleared");
            Ok(())
        }
    }
}

fn settings_or_default(
    loaded: Result<AppSettings, SettingsError>,
) -> (AppSettings, Option<SettingsError>) {
    match loaded {
        Ok(settings) => (settings, None),
        Err(error) => (AppSettings::default(), Some(error)),
    }
}

fn frequency_override(
    arg: Option<FrequencyArg>,
    settings: &AppSettings,
) -> Option<NotificationFrequency> {
    arg.map(NotificationFrequency::from)
        .or(settings.notification_frequency)
}

fn http_client(settings: &AppSettings) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .build()
        .map_err(AppError::Http)
}

fn notify_policy() -> Result<NotifyPolicy, AppError> {
    let store = FileNotifyStore::open_default()?;
    debug!("Using notify state at {}", store.path().display());
    Ok(NotifyPolicy::new(store))
}

async fn run_check(args: CheckArgs, settings: &AppSettings, json: bool) -> Result<(), AppError> {
    let options = CheckOptions {
        platform: args.platform.unwrap_or(settings.platform),
        frequency_override: frequency_override(args.frequency, settings),
        track_phased_release: settings.track_phased_release,
    };
    let host = args.host.host_info();
    let checks = args.requirement_checks();
    let policy = notify_policy()?;

    let result = if let Some(path) = &args.file {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AppError::io(format!("Failed to read {}", path.display()), source))?;
        nudge_core::check_configuration(&bytes, &options, &host, &checks, &policy)?
    } else {
        let url = args
            .url
            .as_deref()
            .or(settings.config_url.as_deref())
            .ok_or_else(|| AppError::usage("No configuration URL given; pass --url or --file"))?;
        let client = http_client(settings)?;
        nudge_fetch::check_remote_configuration(&client, url, &options, &host, &checks, &policy)
            .await?
    };

    if json {
        println!("{}", report::to_json(&result)?);
    } else {
        print!("{}", report::describe_update(&result));
    }
    Ok(())
}

async fn run_store(args: StoreArgs, settings: &AppSettings, json: bool) -> Result<(), AppError> {
    let options = CheckOptions {
        platform: settings.platform,
        frequency_override: frequency_override(args.frequency, settings),
        track_phased_release: args.track_phased_release || settings.track_phased_release,
    };
    let mut host = args.host.host_info();
    host.bundle_id = args.bundle_id.clone().or_else(|| settings.bundle_id.clone());
    if host.bundle_id.is_none() {
        return Err(CheckError::InvalidBundleId.into());
    }
    let country = args.country.as_deref().or(settings.country.as_deref());

    let client = http_client(settings)?;
    let policy = notify_policy()?;
    let update = nudge_fetch::check_app_store(&client, country, &options, &host, &policy).await?;

    if json {
        println!("{}", report::to_json(&update)?);
    } else {
        print!("{}", report::describe_store_update(&update));
    }
    Ok(())
}
