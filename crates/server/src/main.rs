//! Voice Support entry point
//!
//! Runs one call, either on the console or against the REST speech bridge,
//! and prints the session report as JSON.
//!
//! ```text
//! voice-support [--caller <number>] [--bridge <call-id>]
//! ```

use anyhow::Context;
use std::sync::Arc;

use voice_support_agent::{SessionDispatcher, SharedResources};
use voice_support_config::{load_settings, Settings};
use voice_support_core::{CarrierApi, SpeechProvider, TokenSource};
use voice_support_pipeline::{HttpSpeechProvider, SignedTokenSource};
use voice_support_server::{
    init_metrics, init_tracing, ConsoleSpeechProvider, LocalTokenSource, OfflineCarrier,
};
use voice_support_tools::HttpCarrierApi;

/// Typing is slower than speaking
const CONSOLE_LISTEN_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Default)]
struct Args {
    caller: Option<String>,
    bridge_call_id: Option<String>,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--caller" => args.caller = Some(iter.next().context("--caller needs a value")?),
                "--bridge" => {
                    args.bridge_call_id = Some(iter.next().context("--bridge needs a call id")?)
                }
                other => anyhow::bail!("unknown argument {:?}", other),
            }
        }
        Ok(args)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;

    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("VOICE_SUPPORT_ENV").ok();
    let mut config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Starting voice support"
    );

    if let Some(addr) = init_metrics(&config)? {
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    let tokens = token_source(&config)?;
    let carrier = carrier(&config)?;

    let caller = args.caller.unwrap_or_else(|| "console".to_string());
    let provider: Arc<dyn SpeechProvider> = match &args.bridge_call_id {
        Some(call_id) => Arc::new(HttpSpeechProvider::new(&config.speech, call_id.as_str())?),
        None => {
            config.session.listen_timeout_ms =
                config.session.listen_timeout_ms.max(CONSOLE_LISTEN_TIMEOUT_MS);
            Arc::new(ConsoleSpeechProvider::new())
        }
    };
    tracing::info!(provider = provider.name(), %caller, "Speech provider ready");

    let resources = SharedResources::from_settings(&config, tokens, carrier)?;
    let dispatcher = SessionDispatcher::new(resources);
    let report = dispatcher.run(caller, provider).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn token_source(config: &Settings) -> anyhow::Result<Arc<dyn TokenSource>> {
    if config.speech.signing_secret.is_empty() {
        tracing::warn!("No speech signing secret configured, issuing local tokens");
        return Ok(Arc::new(LocalTokenSource));
    }
    Ok(Arc::new(SignedTokenSource::new(&config.speech)?))
}

fn carrier(config: &Settings) -> anyhow::Result<Arc<dyn CarrierApi>> {
    if config.carrier.access_token.is_empty() {
        tracing::warn!("No carrier access token configured, using offline tariffs");
        return Ok(Arc::new(OfflineCarrier::new()));
    }
    Ok(Arc::new(HttpCarrierApi::new(&config.carrier)?))
}
