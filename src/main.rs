mod callback;

use std::sync::Arc;

use anyhow::Result;
use spotify_session::{AuthConfig, AuthError, AuthEvent, AuthSessionManager, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== Spotify-Session Starting ===");

    let config = AuthConfig::from_env()?;
    let manager = Arc::new(AuthSessionManager::spotify(config));

    manager.events().subscribe(|event| {
        tracing::info!(event = event.name(), "Auth event");
        match event {
            AuthEvent::LoginCheck => println!("Waiting for Spotify login..."),
            AuthEvent::LoginSuccess => println!("✓ Logged in"),
            AuthEvent::LoginStateChanged { logged_in } => {
                println!("Login state: {}", if *logged_in { "logged in" } else { "logged out" })
            }
        }
    });

    if std::env::args().nth(1).as_deref() == Some("logout") {
        manager.logout().await?;
        return Ok(());
    }

    // Step 1: Reuse the stored session, renewing it if needed
    let restored = match manager.restore_session().await {
        Ok(restored) => restored,
        Err(e) => {
            tracing::warn!(error = %e, "Could not restore session");
            None
        }
    };

    // Step 2: Otherwise log in through the browser
    if restored.is_none() {
        browser_login(&manager).await?;
    }

    // Step 3: Show who we are
    let user = manager.current_user().await?;
    if user.is_anonymous() {
        println!("Logged in, but the profile could not be fetched");
    } else {
        println!("Logged in as {} ({})", user.name(), user.id);
    }

    if let Some(session) = manager.session().await {
        if let Some(expires_at) = session.expires_at() {
            println!("Session valid until {}", expires_at.with_timezone(&chrono::Local));
        }
    }

    tracing::info!("Spotify-Session shutting down");
    Ok(())
}

async fn browser_login(manager: &AuthSessionManager) -> Result<()> {
    let redirect_uri = manager.config().redirect_uri.clone();
    let listener = callback::bind(&redirect_uri).await?;

    match manager.login().await {
        Ok(url) => println!("If your browser did not open, visit:\n{url}"),
        Err(AuthError::BrowserHandoff { url: Some(url), reason }) => {
            tracing::warn!(%reason, "Browser did not open");
            println!("Could not open a browser ({reason}). Visit:\n{url}");
        }
        Err(e) => return Err(e.into()),
    }

    // The browser may hit the listener with unrelated requests (e.g. favicon)
    loop {
        let request = callback::accept(&listener, &redirect_uri).await?;
        match manager.handle_callback(&request.url).await {
            Ok(_) => {
                if let Err(e) = request.succeed().await {
                    tracing::warn!(error = %e, "Could not answer the browser");
                }
                return Ok(());
            }
            Err(AuthError::NotAnAuthCallback) => {
                if let Err(e) = request.not_found().await {
                    tracing::debug!(error = %e, "Could not answer unrelated request");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Login failed");
                if let Err(reply) = request.fail(&e.to_string()).await {
                    tracing::warn!(error = %reply, "Could not answer the browser");
                }
                return Err(e.into());
            }
        }
    }
}
