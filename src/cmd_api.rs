//! Commands that use the authenticated session: get, watch, download.

use std::path::PathBuf;

use tracing::{error, info, warn};

use fleetdesk_protocols::SessionStatus;
use fleetdesk_realtime::ConnectionEvent;
use fleetdesk_runtime::Runtime;
use fleetdesk_transfer::TransferStatus;

/// Settle a restored token before using it. Returns whether the session is
/// authenticated afterwards.
async fn ensure_session(runtime: &Runtime) -> bool {
    match runtime.session().status() {
        SessionStatus::Authenticated => true,
        SessionStatus::Verifying => runtime.session().verify_session().await,
        SessionStatus::Unauthenticated => false,
    }
}

pub(crate) async fn get(runtime: &Runtime, endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !ensure_session(runtime).await {
        warn!("No valid session, sending the request without a token");
    }
    let envelope = runtime.gateway().get(endpoint).await?;
    if let Some(message) = &envelope.message {
        info!("{} {}", envelope.status, message);
    }
    println!("{}", serde_json::to_string_pretty(&envelope.data)?);
    Ok(())
}

pub(crate) async fn watch(
    runtime: &Runtime,
    channels: Vec<String>,
    topics: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !ensure_session(runtime).await {
        return Err("no valid session; run `fleetdesk login`".into());
    }

    let realtime = runtime.realtime();
    let mut subscriptions = vec![realtime.on_event(|event| match event {
        ConnectionEvent::StateChanged { from, to } => info!("Realtime {} -> {}", from, to),
        ConnectionEvent::AttemptFailed { attempt, error } => {
            warn!("Connect attempt {} failed: {}", attempt, error)
        }
        ConnectionEvent::Exhausted { attempts } => {
            error!("Giving up after {} connect attempts", attempts)
        }
        ConnectionEvent::ProtocolError { error } => warn!("Dropped frame: {}", error),
    })];

    for topic in topics {
        subscriptions.push(realtime.subscribe(topic, |event| match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Could not print event: {}", e),
        }));
    }
    for channel in channels {
        subscriptions.push(realtime.join_channel(channel));
    }
    realtime.connect();

    let outcome: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.map_err(Into::into),
        status = realtime.wait_for(|status| status.is_exhausted()) => match status {
            Ok(status) => Err(status
                .last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "connection exhausted".to_string())
                .into()),
            Err(e) => Err(e.into()),
        },
    };

    for subscription in subscriptions {
        subscription.dispose();
    }
    outcome
}

pub(crate) async fn download(
    runtime: &Runtime,
    endpoint: &str,
    dest: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    if !ensure_session(runtime).await {
        warn!("No valid session, downloading without a token");
    }

    let progress = runtime.transfers().on_update(|task| {
        if let Some(fraction) = task.progress.fraction() {
            info!("{} {:?} {:.0}%", task.id, task.status, fraction * 100.0);
        } else {
            info!("{} {:?} {} bytes", task.id, task.status, task.progress.done);
        }
    });

    let id = dest.display().to_string();
    runtime.download(id.clone(), endpoint, &dest)?;
    runtime.transfers().wait_idle().await;
    progress.dispose();

    match runtime.transfers().get(&id) {
        Some(task) if task.status == TransferStatus::Completed => {
            println!("Saved {} bytes to {}", task.progress.done, dest.display());
            Ok(())
        }
        Some(task) => Err(task
            .error
            .unwrap_or_else(|| format!("transfer ended as {:?}", task.status))
            .into()),
        None => Err(format!("transfer {} disappeared", id).into()),
    }
}
