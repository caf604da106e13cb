mod discord_commands;
use anyhow::Context as _;
use ddtrack_bot::discord::DiscordSink;
use ddtrack_bot::render::TeeRenderer;
use ddtrack_bot::source::DdnetSource;
use ddtrack_bot::store::WatchStore;
use ddtrack_bot::{create_app, poller};
use ddtrack_core::{Tracker, TrackerStatus};
use poise::{Framework, FrameworkOptions, serenity_prelude as serenity};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

type Context<'a> = poise::Context<'a, crate::Data, crate::discord_commands::Error>;

pub(crate) struct Data {
    pub(crate) status: watch::Receiver<TrackerStatus>,
    pub(crate) store: WatchStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting DDNet tracker...");
    let config = ddtrack_bot::config::Config::from_env();
    tracing::info!(
        "Configuration: port={}, watch_file={}, master_url={}, fetch_timeout={}s, call_timeout={}s, purge_lookback={}",
        config.port,
        config.watch_file,
        config.master_url,
        config.fetch_timeout.as_secs(),
        config.call_timeout.as_secs(),
        config.purge_lookback
    );

    let store = WatchStore::new(&config.watch_file);
    let (status_tx, status_rx) = watch::channel(TrackerStatus::default());

    let app = create_app(
        status_rx.clone(),
        config.request_body_limit,
        config.request_timeout,
    );
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Status API listening on {}", addr);

    let http = reqwest::Client::builder()
        .user_agent(concat!("ddtrack/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let source = DdnetSource::new(http.clone(), &config.master_url);
    let renderer = Arc::new(
        TeeRenderer::new(
            http,
            &config.ddnet_base_url,
            config.font_path.as_deref(),
        )
        .context("failed to set up image renderer")?,
    );
    let tracker_options = config.tracker_options();

    // send messages, embed links, attach files, read message history
    let intents = serenity::GatewayIntents::non_privileged();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![discord_commands::status()],
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Executing command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Finished command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Connected to Discord as {}", ready.user.name);

                let sink = Arc::new(DiscordSink::new(ctx.http.clone(), ready.user.id));
                let tracker = Tracker::new(source, sink, renderer, tracker_options);
                tokio::spawn(poller::run(tracker, store.clone(), status_tx));

                Ok(Data {
                    status: status_rx,
                    store,
                })
            })
        })
        .build();

    let token = config
        .discord_token
        .context("DISCORD_TOKEN environment variable is required")?;
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .context("Error creating Discord client")?;
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("Axum server error: {}", e);
            }
        }
        result = client.start() => {
            if let Err(e) = result {
                tracing::error!("Discord client error: {:?}", e);
            }
        }
    }
    Ok(())
}
