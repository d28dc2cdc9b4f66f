#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use args::Args;
use clap::Parser;
use sage_config::Config;
use sage_router::{AskRequest, Dispatcher, RouteError};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load(&args.config)?;

    tracing::info!(
        config_path = %args.config.display(),
        providers = config.providers.len(),
        "starting sage"
    );

    let dispatcher = Dispatcher::from_config(config);

    // Propagate Ctrl+C / SIGTERM into the in-flight ask
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    let mut request = AskRequest::new(args.question);
    request.provider_override = args.provider;
    request.model_override = args.model;
    request.locale = args.locale;

    match dispatcher.ask_with_cancellation(request, cancel).await {
        Ok(envelope) => {
            println!("{}", envelope.content);
            eprintln!(
                "-- answered by {} ({}) in {}ms, {}",
                envelope.provider,
                envelope.model,
                envelope.elapsed.as_millis(),
                envelope.reason
            );
            for attempt in &envelope.discarded {
                eprintln!("-- discarded {}: {}", attempt.provider, attempt.failure);
            }
            Ok(())
        }
        Err(RouteError::Exhausted { attempts }) => {
            for attempt in &attempts {
                eprintln!("{}: {}", attempt.provider, attempt.failure);
            }
            anyhow::bail!("all {} candidate providers failed", attempts.len())
        }
        Err(e) => Err(e.into()),
    }
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
