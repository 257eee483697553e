use chrono::Utc;
use clap::Parser;
use map_scout::adjuster::TokioScheduler;
use map_scout::config::{Config, HoldGesture};
use map_scout::coordinator::MapState;
use map_scout::listings::ListingsClient;
use map_scout::session::MapSession;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("🗺️  Map Scout");
    info!("==========================================");

    let filters = config.initial_filters()?;
    let client = ListingsClient::new(&config.api_base, config.request_timeout())?;

    match client.health().await {
        Ok(true) => info!("Backend at {} is healthy", client.api_base()),
        Ok(false) => warn!("Backend at {} reports unhealthy", client.api_base()),
        Err(e) => warn!("Health check failed: {:#}", e),
    }

    let session = MapSession::new(Arc::new(client), filters);

    // Populate the map before any viewport has settled
    session.mount();

    if let Some(bbox) = config.bbox {
        info!("Settling viewport at {}", bbox);
        session.settle_viewport(bbox);
    }

    if let Some(gesture) = &config.hold {
        hold_radius(&session, gesture).await;
    }

    let state = wait_with_indicator(&session, config.loading_delay()).await;
    session.shutdown();

    for (i, listing) in state.result.listings.iter().enumerate() {
        let title = if listing.title.is_empty() {
            &listing.id
        } else {
            &listing.title
        };
        println!("{}. {} (${})", i + 1, title, listing.price);
        if !listing.address.is_empty() {
            println!("   {}", listing.address);
        }
        if let (Some(beds), Some(baths)) = (listing.beds, listing.baths) {
            println!(
                "   {} bd • {} ba • {} sqft",
                beds,
                baths,
                listing.sqft.unwrap_or_default()
            );
        }
        println!("   ID: {}", listing.id);
        if !listing.google_maps_link.is_empty() {
            println!("   Map: {}", listing.google_maps_link);
        }
        println!();
    }

    println!("{}", state.summary());

    if let Some(error) = state.error {
        anyhow::bail!("Listings query failed: {}", error);
    }

    let json = serde_json::to_string_pretty(&state.result)?;
    tokio::fs::write(&config.output, json).await?;
    info!("💾 Saved results to {}", config.output.display());

    Ok(())
}

/// Presses a radius control, keeps it held for the gesture's duration and
/// releases it. Every step goes through the session like any filter change.
async fn hold_radius(session: &MapSession, gesture: &HoldGesture) {
    let control = session.radius_adjuster(gesture.category, Arc::new(TokioScheduler::new()));
    let before = session.filters().radius(gesture.category).meters();

    control.press(gesture.direction);
    tokio::time::sleep(gesture.duration).await;
    control.release();

    let after = session.filters().radius(gesture.category).meters();
    info!(
        "Held {} for {}ms: {}m -> {}m",
        control.label(),
        gesture.duration.as_millis(),
        before,
        after
    );
}

/// Waits for the newest fetch, logging a loading notice only if it takes
/// longer than `delay`
async fn wait_with_indicator(session: &MapSession, delay: chrono::Duration) -> MapState {
    let pause = delay.to_std().unwrap_or_default();
    let coordinator = session.coordinator();

    tokio::select! {
        state = coordinator.wait_settled() => return state,
        _ = tokio::time::sleep(pause) => {}
    }

    if coordinator
        .snapshot()
        .show_loading_indicator(Utc::now(), delay)
    {
        info!("{}", coordinator.snapshot().summary());
    }
    coordinator.wait_settled().await
}
