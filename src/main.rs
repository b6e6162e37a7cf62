use dotenvy::dotenv;
use roommate_tracker::{
    cache::LocalCache,
    client::{LiveSummary, RoommateApp},
    config::{self, database},
    core::report::format_net_balance,
    errors::{Error, Result},
    notifications::ExpoPushClient,
    realtime::ChangeFeed,
};
use std::{env, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_default_config()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;
    info!("Successfully processed application configuration.");

    // 4. Connect backend and local cache
    std::fs::create_dir_all("data")?;
    let backend_url = database::get_database_url(app_config.backend.database_url.as_deref());
    let db = database::create_connection(&backend_url)
        .await
        .inspect_err(|e| error!("Failed to connect to backend database: {}", e))?;
    database::create_backend_tables(&db)
        .await
        .inspect(|_| info!("Backend database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize backend database: {}", e))?;

    let cache_url = database::get_cache_database_url(app_config.cache.database_url.as_deref());
    let cache_db = database::create_connection(&cache_url)
        .await
        .inspect_err(|e| error!("Failed to connect to local cache: {}", e))?;
    let cache = LocalCache::open(cache_db, app_config.cache.start_online)
        .await
        .inspect_err(|e| error!("Failed to initialize local cache: {}", e))?;

    // 5. Build the application facade
    let notifier = ExpoPushClient::new(&app_config.notifications)?;
    let app = Arc::new(RoommateApp::new(
        Arc::new(db),
        Arc::new(cache),
        ChangeFeed::new(),
        notifier,
        &app_config,
    ));

    // 6. Sign in: stored session first, then credentials from the environment
    let user = match app.restore_session().await {
        Some(user) => user,
        None => {
            let email = env::var("ROOMMATE_EMAIL")
                .inspect_err(|e| error!("ROOMMATE_EMAIL not found: {}", e))
                .map_err(|_| Error::NotAuthenticated)?;
            let password = env::var("ROOMMATE_PASSWORD")
                .inspect_err(|e| error!("ROOMMATE_PASSWORD not found: {}", e))
                .map_err(|_| Error::NotAuthenticated)?;
            app.sign_in(&email, &password).await?
        }
    };
    info!(user_id = %user.id, "Signed in as {}", user.name);

    // 7. Report every room
    let rooms = app.rooms().await;
    if rooms.is_empty() {
        warn!("No rooms yet, create one or join with an invite code");
        return Ok(());
    }
    for entry in &rooms {
        let Some(summary) = app.summary(Some(&entry.room.id)).await else {
            continue;
        };
        info!(
            room = %entry.room.name,
            invite_code = %entry.room.invite_code,
            members = entry.member_count,
            "Net balance {}",
            format_net_balance(summary.totals.net_balance)
        );
        for balance in &summary.balances {
            info!(
                "  {} ({}): {}",
                balance.user_name,
                balance.user_email,
                format_net_balance(balance.net_balance)
            );
        }
    }

    // 8. Follow the first room until Ctrl-C
    let room = &rooms[0].room;
    let mut live = LiveSummary::spawn(Arc::clone(&app), room.id.as_str());
    info!("Following '{}', press Ctrl-C to stop", room.name);
    loop {
        tokio::select! {
            summary = live.changed() => {
                let Some(summary) = summary else { break };
                info!(
                    room = %room.name,
                    "Net balance {}",
                    format_net_balance(summary.totals.net_balance)
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }
    live.close();

    let pending = app.cache().pending_sync_count().await;
    if pending > 0 {
        warn!("{} writes still waiting to sync", pending);
    }
    Ok(())
}
