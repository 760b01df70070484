mod gateway;
mod webhook;

use clap::{Parser, Subcommand};
use siembra_agents::{AgentBank, OpenAiChat, TelemetryStore};
use siembra_channels::{transcribe::Transcriber, MetaAdapter, TwilioAdapter};
use siembra_core::{config, traits::OutboundAdapter};
use siembra_memory::{seed, Store};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(
    name = "siembra",
    version,
    about = "Siembra: aprendizaje agrícola por WhatsApp"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "siembra.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Start,
    /// Check configuration, provider availability, and store health.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => start(&cli.config).await,
        Commands::Status => status(&cli.config).await,
    }
}

async fn start(config_path: &str) -> anyhow::Result<()> {
    let cfg = config::load(config_path)?;

    let data_dir = config::shellexpand(&cfg.app.data_dir);
    std::fs::create_dir_all(format!("{data_dir}/logs"))?;

    let file_appender = tracing_appender::rolling::daily(format!("{data_dir}/logs"), "siembra.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cfg.app.log_level.clone())),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    if !std::path::Path::new(config_path).exists() {
        info!("config file {config_path} not found, using defaults");
    }

    let store = Store::new(&cfg.memory).await?;
    seed::seed_demo_courses(&store).await?;

    let twilio = Arc::new(TwilioAdapter::from_config(cfg.providers.twilio.clone()));
    let meta = Arc::new(MetaAdapter::from_config(cfg.providers.meta.clone()));
    for (name, available) in [
        ("twilio", twilio.is_available()),
        ("meta", meta.is_available()),
    ] {
        info!(
            "provider {name}: {}",
            if available { "configured" } else { "unavailable" }
        );
    }
    let adapters: Vec<Arc<dyn OutboundAdapter>> = vec![twilio, meta];

    let twilio_auth = cfg.providers.twilio.as_ref().and_then(|t| {
        (!t.account_sid.is_empty() && !t.auth_token.is_empty())
            .then(|| (t.account_sid.clone(), t.auth_token.clone()))
    });
    let meta_auth = cfg.providers.meta.as_ref().and_then(|m| {
        (!m.access_token.is_empty()).then(|| (m.access_token.clone(), m.api_version.clone()))
    });
    let transcriber = Transcriber::new(
        config::shellexpand(&cfg.app.audio_dir),
        cfg.llm.api_key.clone(),
        twilio_auth,
        meta_auth,
    );

    let backend = Arc::new(OpenAiChat::from_config(
        cfg.llm.base_url.clone(),
        cfg.llm.api_key.clone(),
        cfg.llm.model.clone(),
    ));
    let telemetry = TelemetryStore::new(format!("{data_dir}/telemetry.json"));
    let agents = AgentBank::new(backend, telemetry);

    let verify_token = cfg
        .providers
        .meta
        .as_ref()
        .map(|m| m.verify_token.clone())
        .unwrap_or_default();
    let bind = format!("{}:{}", cfg.app.bind_host, cfg.app.bind_port);

    let gateway = gateway::Gateway::new(cfg, store, transcriber, adapters, agents);
    let state = webhook::AppState {
        gateway: Arc::new(gateway),
        verify_token,
        started: Instant::now(),
    };

    info!("Siembra listening on {bind}");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, webhook::router(state)).await?;
    Ok(())
}

async fn status(config_path: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let cfg = config::load(config_path)?;
    println!("Siembra Status\n");
    println!("Config: {config_path}");

    let twilio = TwilioAdapter::from_config(cfg.providers.twilio.clone());
    let meta = MetaAdapter::from_config(cfg.providers.meta.clone());
    println!(
        "  twilio: {}",
        if twilio.is_available() {
            "configured"
        } else {
            "unavailable (credentials missing)"
        }
    );
    println!(
        "  meta: {}",
        if meta.is_available() {
            "configured"
        } else {
            "unavailable (credentials missing)"
        }
    );
    println!(
        "  llm: {}",
        if cfg.llm.api_key.is_empty() {
            "unavailable (api key missing)"
        } else {
            "configured"
        }
    );

    match Store::new(&cfg.memory).await {
        Ok(store) => {
            let courses = store.list_active_courses().await?;
            println!("  store: ok ({} active courses)", courses.len());
        }
        Err(e) => println!("  store: error ({e})"),
    }

    let data_dir = config::shellexpand(&cfg.app.data_dir);
    let telemetry = TelemetryStore::new(format!("{data_dir}/telemetry.json"));
    let counters = telemetry.counters().await;
    if counters.is_empty() {
        println!("  telemetry: no agent invocations recorded");
    } else {
        println!("  telemetry:");
        let mut entries: Vec<_> = counters.into_iter().collect();
        entries.sort();
        for (label, count) in entries {
            println!("    {label}: {count}");
        }
    }

    Ok(())
}
