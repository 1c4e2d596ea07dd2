pub mod api;
pub mod cli;
pub mod constants;
pub mod error;
pub mod models;
pub mod modules;
#[cfg(test)]
mod test_utils;

use clap::Parser;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use api::GameApiClient;
use cli::{Cli, Command};
use error::{AppError, AppResult};
use models::AppConfig;
use modules::actions::{ActionRunner, ActionSummary};
use modules::credentials::{renewer_from_config, CredentialStore};
use modules::painting::{PaintingEngine, Palette};
use modules::retry::RetryPolicy;
use modules::system::validation::ConfigError;
use modules::system::{config, logger, scheduler, validation};

fn validation_failed(what: &str, errors: Vec<ConfigError>) -> AppError {
    AppError::Config(format!(
        "{}_validation_failed:\n{}",
        what,
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    ))
}

fn load_config(command: &Command, data_dir: &Path) -> AppResult<AppConfig> {
    let mut config = config::load_app_config(data_dir).map_err(AppError::Config)?;
    config::apply_env_overrides(&mut config);
    if let Command::Paint(args) = command {
        args.apply(&mut config.painting);
    }
    validation::validate_app_config(&config).map_err(|e| validation_failed("configuration", e))?;
    Ok(config)
}

/// Loads `accounts.json` and hands out proxy and user-agent pool entries to
/// accounts that have none yet.
async fn load_store(config: &AppConfig, data_dir: &Path) -> AppResult<Arc<CredentialStore>> {
    let accounts_path = data_dir.join(constants::ACCOUNTS_FILE);
    let renewer = renewer_from_config(&config.renewal, accounts_path.clone());
    let store = CredentialStore::load(accounts_path, renewer, constants::DEFAULT_USER_AGENT)
        .map_err(AppError::Credential)?;
    info!("Loaded {} accounts", store.len());
    if store.is_empty() {
        warn!("accounts.json contains no accounts");
    }

    let user_agents = config::load_user_agents(data_dir).map_err(AppError::Config)?;
    let proxies = if config.use_proxies {
        config::load_proxies(data_dir).map_err(AppError::Config)?
    } else {
        Vec::new()
    };
    if config.use_proxies && proxies.is_empty() {
        warn!("use_proxies is enabled but proxies.txt is empty or missing");
    }
    let assigned = store
        .assign_pools(&proxies, &user_agents)
        .await
        .map_err(AppError::Credential)?;
    if assigned > 0 {
        info!("Assigned pool entries to {} accounts", assigned);
    }
    Ok(Arc::new(store))
}

fn build_engine(
    config: &AppConfig,
    data_dir: &Path,
    api: Arc<GameApiClient>,
    store: Arc<CredentialStore>,
) -> AppResult<PaintingEngine> {
    let templates = config::load_templates(data_dir).map_err(AppError::Template)?;
    validation::validate_templates(&templates, &config.painting.template_assignment)
        .map_err(|e| validation_failed("templates", e))?;
    let palette =
        Palette::load(&data_dir.join(constants::COLORS_FILE)).map_err(AppError::Config)?;
    info!(
        "Loaded {} templates and a palette of {} colors",
        templates.len(),
        palette.len()
    );

    Ok(PaintingEngine::new(
        api,
        store,
        templates,
        palette,
        config.painting.clone(),
        RetryPolicy::from(&config.retry),
    ))
}

async fn until_cancelled<F>(cancel: &CancellationToken, action: F)
where
    F: Future<Output = ActionSummary>,
{
    tokio::select! {
        _ = action => {}
        _ = cancel.cancelled() => warn!("Interrupted before all accounts were processed"),
    }
}

async fn execute(command: Command, cancel: CancellationToken) -> AppResult<()> {
    let data_dir = config::get_data_dir().map_err(AppError::Config)?;
    info!("Using data directory {}", data_dir.display());

    let config = load_config(&command, &data_dir)?;
    let store = load_store(&config, &data_dir).await?;
    let api = Arc::new(GameApiClient::new(
        config.api_base_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    ));

    let runner = || {
        ActionRunner::new(
            api.clone(),
            store.clone(),
            RetryPolicy::from(&config.retry),
            config.painting.concurrency_limit,
        )
    };

    match command {
        Command::Paint(_) => {
            let engine = build_engine(&config, &data_dir, api.clone(), store.clone())?;
            if config.painting.continuous {
                let interval = Duration::from_secs(config.painting.pass_interval_secs);
                scheduler::run_continuous(&engine, interval, cancel).await;
            } else {
                scheduler::run_once(&engine, &cancel).await;
            }
        }
        Command::Claim => until_cancelled(&cancel, runner().claim_all()).await,
        Command::Boost { kind } => until_cancelled(&cancel, runner().boost_all(kind.into())).await,
        Command::Tasks { keys } => {
            let keys = if keys.is_empty() {
                constants::DEFAULT_TASK_KEYS
                    .iter()
                    .map(|key| key.to_string())
                    .collect()
            } else {
                keys
            };
            until_cancelled(&cancel, runner().tasks_all(&keys)).await;
        }
        Command::Status => until_cancelled(&cancel, runner().status_all()).await,
    }
    Ok(())
}

pub fn run() {
    let cli = Cli::parse();
    if let Some(dir) = &cli.data_dir {
        std::env::set_var(constants::DATA_DIR_ENV, dir);
    }

    logger::init_logger();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested, finishing up");
                shutdown.cancel();
            }
        });
        execute(cli.command, cancel).await
    });

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
