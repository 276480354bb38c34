use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tokio::signal;
use tracing::{error, info, warn};

use garmentflow_api as api;
use api::notifications::{LogNotifier, Notifier, WebhookNotifier};

#[derive(Debug, Parser)]
#[command(name = "garmentflow-api", version, about = "GarmentFlow order lifecycle service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print a bearer token for an existing account
    IssueToken {
        /// Account email
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::Migrate => {
            let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
            api::db::run_migrations(&db_pool)
                .await
                .context("failed running migrations")?;
            info!("Migrations applied");
            Ok(())
        }
        Command::IssueToken { email } => {
            let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
            let user = api::entities::User::find()
                .filter(api::entities::user::Column::Email.eq(email.trim().to_lowercase()))
                .one(&db_pool)
                .await?
                .with_context(|| format!("no account with email {}", email))?;
            let auth = api::auth::AuthService::new(api::auth::AuthConfig::from(&cfg));
            println!("{}", auth.issue_token(&user)?);
            Ok(())
        }
    }
}

async fn serve(cfg: api::config::AppConfig) -> Result<()> {
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    let (event_sender, event_rx) = api::events::EventSender::channel(cfg.event_channel_capacity);
    let notifier: Arc<dyn Notifier> = match cfg.notification_webhook_url.as_deref() {
        Some(url) => match WebhookNotifier::new(url) {
            Ok(webhook) => {
                info!(url = %url, "Delivering notifications to webhook");
                Arc::new(webhook)
            }
            Err(e) => {
                warn!(error = %e, "Webhook notifier unavailable; logging notifications instead");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };
    tokio::spawn(api::events::process_events(event_rx, notifier));
    api::events::reminders::start_reminder_worker(
        db_arc.clone(),
        event_sender.clone(),
        std::time::Duration::from_secs(cfg.order_reminder_interval_secs),
    );

    let auth_service = Arc::new(api::auth::AuthService::new(api::auth::AuthConfig::from(&cfg)));
    let services = api::handlers::AppServices::new(db_arc.clone(), Some(event_sender));

    let app_state = api::AppState {
        db: db_arc,
        config: cfg.clone(),
        auth: auth_service,
        services,
    };

    let app = api::app_router(app_state);

    let ip = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address {}", cfg.host))?;
    let addr = SocketAddr::new(ip, cfg.port);
    info!("garmentflow-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
