use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use inquire::{CustomType, InquireError, Select, Text};
use tracing::info;
use weather_core::{
    Config, HttpGateway, OverlapPolicy, SearchOrchestrator, SearchOutcome, gateway_from_config,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather lookup client")]
pub struct Cli {
    /// Backend base URL, absolute or relative to the origin.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Address the client is served from, used to resolve a relative base URL.
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively edit backend settings.
    Configure,

    /// Look up current weather for a city, then show the refreshed history.
    Search {
        /// City name.
        city: String,

        /// Print the resulting state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the recent search history.
    History {
        /// Number of entries to request.
        #[arg(long)]
        limit: Option<usize>,

        /// Print the resulting state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search repeatedly from a prompt; blank input does nothing, `quit` exits.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli {
            base_url,
            origin,
            command,
            ..
        } = self;

        match command {
            // Flag and environment overrides are per-run and never saved.
            Command::Configure => configure(Config::load()?),
            Command::Search { city, json } => {
                let config = effective_config(base_url, origin)?;
                search(&config, &city, json).await
            }
            Command::History { limit, json } => {
                let mut config = effective_config(base_url, origin)?;
                if let Some(limit) = limit {
                    config.history_limit = limit;
                }
                history(&config, json).await
            }
            Command::Interactive => {
                let config = effective_config(base_url, origin)?;
                interactive(&config).await
            }
        }
    }
}

fn effective_config(base_url: Option<String>, origin: Option<String>) -> Result<Config> {
    Ok(Config::load()?
        .with_env_overrides()
        .with_overrides(base_url, origin))
}

fn orchestrator(config: &Config) -> Result<SearchOrchestrator<HttpGateway>> {
    let gateway = gateway_from_config(config).map_err(|err| {
        let saved = Config::file_exists().unwrap_or(false);
        with_first_run_hint(err, saved)
    })?;
    info!(base_url = gateway.base_url(), "using backend");
    Ok(SearchOrchestrator::from_config(gateway, config))
}

/// Point first-time users at `weather configure` when no settings are saved.
fn with_first_run_hint(err: anyhow::Error, config_saved: bool) -> anyhow::Error {
    if config_saved {
        err
    } else {
        err.context(
            "No configuration saved yet. Run `weather configure` to set the backend address.",
        )
    }
}

async fn search(config: &Config, city: &str, json: bool) -> Result<()> {
    let orch = orchestrator(config)?;

    match orch.search_city(city).await {
        SearchOutcome::Skipped => bail!("City name must not be blank."),
        SearchOutcome::WeatherUnavailable => {
            bail!("Could not fetch weather for '{}'. Run with -v for details.", city.trim())
        }
        SearchOutcome::Rejected | SearchOutcome::Updated { .. } => {}
    }

    print_state(&orch, json)
}

async fn history(config: &Config, json: bool) -> Result<()> {
    let orch = orchestrator(config)?;
    orch.load_initial_history().await;
    print_state(&orch, json)
}

fn print_state(orch: &SearchOrchestrator<HttpGateway>, json: bool) -> Result<()> {
    let state = orch.snapshot();
    if json {
        let out = serde_json::to_string_pretty(&state).context("Failed to serialize state")?;
        println!("{out}");
    } else {
        print!("{}", render::state(&state));
    }
    Ok(())
}

async fn interactive(config: &Config) -> Result<()> {
    let orch = orchestrator(config)?;
    let indicator = render::spawn_busy_indicator(orch.subscribe());

    orch.spawn_initial_history()
        .await
        .context("Initial history load panicked")?;
    print!("{}", render::state(&orch.snapshot()));

    loop {
        let input = tokio::task::spawn_blocking(|| {
            Text::new("City:")
                .with_placeholder("Enter city...")
                .with_help_message("blank input does nothing, `quit` exits")
                .prompt()
        })
        .await
        .context("Prompt task panicked")?;

        let input = match input {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e).context("Failed to read city"),
        };

        if matches!(input.trim(), "quit" | "exit" | ":q") {
            break;
        }

        if orch.search_city(&input).await == SearchOutcome::Skipped {
            continue;
        }

        println!();
        print!("{}", render::state(&orch.snapshot()));
    }

    indicator.abort();
    Ok(())
}

fn configure(mut config: Config) -> Result<()> {
    let origin = Text::new("Origin (address the client is served from):")
        .with_default(config.origin.as_deref().unwrap_or(""))
        .with_help_message("e.g. https://weather.example.com; leave blank for none")
        .prompt()
        .context("Failed to read origin")?;

    let base_url = Text::new("Backend base URL:")
        .with_default(
            config
                .base_url
                .as_deref()
                .unwrap_or(weather_core::config::DEFAULT_BASE_PATH),
        )
        .with_help_message("absolute, or a path relative to the origin")
        .prompt()
        .context("Failed to read base URL")?;

    let history_limit = CustomType::<usize>::new("History entries to fetch:")
        .with_default(config.history_limit())
        .with_error_message("Please enter a positive whole number")
        .prompt()
        .context("Failed to read history limit")?;

    let policy = Select::new(
        "When a search is started while another is running:",
        OverlapPolicy::all().to_vec(),
    )
    .with_starting_cursor(
        OverlapPolicy::all()
            .iter()
            .position(|p| *p == config.overlap_policy)
            .unwrap_or(0),
    )
    .prompt()
    .context("Failed to read overlap policy")?;

    config.origin = Some(origin.trim().to_string()).filter(|o| !o.is_empty());
    config.base_url = Some(base_url.trim().to_string()).filter(|b| !b.is_empty());
    config.history_limit = history_limit;
    config.overlap_policy = policy;

    let resolved = config
        .resolve_base_url()
        .context("The new settings do not resolve to a backend URL")?;

    config.save()?;

    println!("Saved {}", Config::config_file_path()?.display());
    println!("Backend: {resolved}");
    Ok(())
}
