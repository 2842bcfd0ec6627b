//! Session commands: login, verify, logout, whoami.

use std::time::Duration;

use tracing::warn;

use fleetdesk_protocols::SessionStatus;
use fleetdesk_runtime::Runtime;

/// How long logout waits for the server to hear about it before exiting.
const SERVER_LOGOUT_WAIT: Duration = Duration::from_secs(2);

pub(crate) async fn login(
    runtime: &Runtime,
    identifier: &str,
    secret: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = runtime.session().login(identifier, secret).await?;
    println!("Signed in as {} (id {})", user.display_name(), user.id);
    Ok(())
}

pub(crate) async fn verify(runtime: &Runtime) -> Result<(), Box<dyn std::error::Error>> {
    if runtime.session().verify_session().await {
        let name = runtime
            .session()
            .user()
            .map(|u| u.display_name().to_string())
            .unwrap_or_default();
        println!("Session valid for {}", name);
        Ok(())
    } else {
        Err("no valid session; run `fleetdesk login`".into())
    }
}

pub(crate) async fn logout(runtime: &Runtime) -> Result<(), Box<dyn std::error::Error>> {
    let was_signed_in = runtime.session().snapshot().has_token;
    runtime.session().logout().await?;
    if !runtime.session().wait_server_logout(SERVER_LOGOUT_WAIT).await {
        warn!("Server did not confirm logout within {:?}", SERVER_LOGOUT_WAIT);
    }
    if was_signed_in {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
    Ok(())
}

pub(crate) fn whoami(runtime: &Runtime) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = runtime.session().snapshot();
    match (snapshot.status, snapshot.user) {
        (SessionStatus::Unauthenticated, _) | (_, None) => println!("Not signed in"),
        (status, Some(user)) => {
            println!("{}", serde_json::to_string_pretty(&user)?);
            if status == SessionStatus::Verifying {
                println!("(cached, run `fleetdesk verify` to confirm)");
            }
        }
    }
    Ok(())
}
