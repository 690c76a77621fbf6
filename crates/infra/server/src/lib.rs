//! # Daily Auth Server
//!
//! Standalone phone OTP service. Wires the configured settings source,
//! demo identities, code storage and messaging provider into a
//! [`PhoneOtpEngine`], mounts the phone number routes on axum and keeps
//! settings and in-memory state fresh in the background.

mod config;

pub use config::{
    load_config, parse_config, AppConfig, ConfigError, DeliveryConfig, DeliveryProvider,
    OtpConfig, PhoneConfig, ServerConfig, SettingsSourceKind, TwilioSection, VaultConfig,
};

use axum::routing::get;
use daily_auth_adapter_memory::MemoryAdapter;
use daily_auth_axum::auth_routes;
use daily_auth_core::{AuthError, AuthPlugin, Router};
use daily_auth_otp_utils::{
    CodeStorage, ConfigSource, EnvSource, SharedSettings, StaticSource, VaultSource,
};
use daily_auth_plugin_phone_number::demo::default_identities;
use daily_auth_plugin_phone_number::{
    ConsoleSender, DemoConfigError, DemoPolicy, MessageSender, MessageTemplates, OtpDispatcher, PhoneError,
    PhoneNormalizer, PhoneNumberConfig, PhoneNumberPlugin, PhoneOtpEngine, TwilioSender,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Looks up an environment variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid demo identity: {0}")]
    DemoIdentity(PhoneError),

    #[error("Invalid demo code for {phone}: must be one or more digits")]
    DemoCode { phone: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DemoConfigError> for ServerError {
    fn from(err: DemoConfigError) -> Self {
        match err {
            DemoConfigError::Phone(err) => ServerError::DemoIdentity(err),
            DemoConfigError::InvalidCode { phone } => ServerError::DemoCode { phone },
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// A fully wired server.
pub struct DailyAuthServer {
    config: AppConfig,
    engine: Arc<PhoneOtpEngine>,
    settings: SharedSettings,
    source: Arc<dyn ConfigSource>,
    router: Arc<Router>,
}

impl DailyAuthServer {
    /// Builds the server, reading secrets from the process environment.
    pub async fn from_config(config: AppConfig) -> Result<Self, ServerError> {
        Self::from_config_with_env(config, Arc::new(|key| std::env::var(key).ok())).await
    }

    /// Builds the server with an explicit environment.
    pub async fn from_config_with_env(config: AppConfig, env: EnvLookup) -> Result<Self, ServerError> {
        let source = settings_source(&config.otp, &env)?;
        let settings = SharedSettings::load(source.as_ref(), config.otp.fetch_timeout()).await;

        let normalizer = PhoneNormalizer::new(&config.phone.default_country)
            .supported_countries(config.phone.supported_countries.iter().cloned());
        let identities = config
            .phone
            .demo_identities
            .clone()
            .unwrap_or_else(default_identities);
        let demo = DemoPolicy::from_config(identities, config.phone.demo_expiry_minutes, &normalizer)?;
        if !demo.is_empty() {
            tracing::info!(identities = demo.len(), "demo identities enabled");
        }

        let engine = PhoneOtpEngine::builder()
            .normalizer(normalizer)
            .demo_policy(demo)
            .settings(settings.clone())
            .store(MemoryAdapter::new())
            .code_storage(code_storage(&config.phone, &env))
            .build()?;
        let engine = Arc::new(engine);

        let dispatcher = OtpDispatcher::new(message_sender(&config.delivery, &env)?)
            .with_templates(MessageTemplates::new(&config.delivery.app_name));
        let plugin = PhoneNumberPlugin::new(
            engine.clone(),
            Arc::new(dispatcher),
            PhoneNumberConfig::new()
                .expose_demo_codes(config.phone.expose_demo_codes)
                .expose_clear_rate_limit(config.phone.expose_clear_rate_limit)
                .expose_test_messaging(config.phone.expose_test_messaging)
                .default_preference(config.delivery.default_preference),
        );

        let mut router = Router::new(&config.server.base_path);
        plugin.register_routes(&mut router);
        tracing::info!(plugin = plugin.id(), routes = router.len(), "registered plugin");

        Ok(Self {
            config,
            engine,
            settings,
            source,
            router: Arc::new(router),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<PhoneOtpEngine> {
        &self.engine
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// The axum application: health check plus the auth routes.
    pub fn app(&self) -> axum::Router {
        axum::Router::new()
            .route("/health", get(health))
            .merge(auth_routes(self.router.clone()))
    }

    /// Starts the settings refresh and hygiene loops.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        if let Some(every) = self.config.otp.refresh_interval() {
            let settings = self.settings.clone();
            let source = self.source.clone();
            let timeout = self.config.otp.fetch_timeout();
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(every);
                interval.tick().await; // Skip first immediate tick

                loop {
                    interval.tick().await;
                    settings.refresh(source.as_ref(), timeout).await;
                }
            }));
        }

        let engine = self.engine.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                // Re-read each round so a refreshed interval takes effect.
                let every = engine.settings().current().await.cleanup_interval();
                tokio::time::sleep(every).await;
                match engine.purge_expired().await {
                    Ok(report) => tracing::info!(
                        records = report.records,
                        rate_windows = report.rate_windows,
                        locks = report.locks,
                        "hygiene sweep finished"
                    ),
                    Err(err) => tracing::warn!(error = %err, "hygiene sweep failed"),
                }
            }
        }));

        tasks
    }

    /// Binds the listener and serves until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.server.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        let tasks = self.spawn_background_tasks();
        tracing::info!(%addr, base_path = %self.config.server.base_path, "Daily Auth listening");

        axum::serve(listener, self.app())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down");
            })
            .await?;

        for task in tasks {
            task.abort();
        }
        Ok(())
    }
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

fn settings_source(config: &OtpConfig, env: &EnvLookup) -> Result<Arc<dyn ConfigSource>, ServerError> {
    let source: Arc<dyn ConfigSource> = match config.source {
        SettingsSourceKind::Static => Arc::new(StaticSource::new(config.settings)),
        SettingsSourceKind::Env => {
            let env = env.clone();
            Arc::new(EnvSource::with_lookup(move |key| env(key)))
        }
        SettingsSourceKind::Vault => {
            let vault = &config.vault;
            let token = env(&vault.token_env)
                .filter(|token| !token.is_empty())
                .ok_or_else(|| AuthError::missing_config(vault.token_env.clone()))?;
            Arc::new(
                VaultSource::new(&vault.address, token)
                    .mount(&vault.mount)
                    .path(&vault.path),
            )
        }
    };
    tracing::info!(source = source.name(), "OTP settings source");
    Ok(source)
}

fn code_storage(config: &PhoneConfig, env: &EnvLookup) -> CodeStorage {
    match config
        .code_secret_env
        .as_deref()
        .and_then(|name| env(name))
        .filter(|secret| !secret.is_empty())
    {
        Some(secret) => CodeStorage::hashed(secret),
        None => CodeStorage::Plain,
    }
}

fn message_sender(config: &DeliveryConfig, env: &EnvLookup) -> Result<Arc<dyn MessageSender>, ServerError> {
    match config.provider {
        DeliveryProvider::Console => {
            tracing::warn!("console delivery: codes are logged, not sent");
            Ok(Arc::new(ConsoleSender))
        }
        DeliveryProvider::Twilio => {
            let section = config
                .twilio
                .as_ref()
                .ok_or_else(|| AuthError::missing_config("delivery.twilio"))?;
            let token = env(&section.auth_token_env)
                .filter(|token| !token.is_empty())
                .ok_or_else(|| AuthError::missing_config(section.auth_token_env.clone()))?;
            Ok(Arc::new(TwilioSender::new(section.to_config(token))))
        }
    }
}
