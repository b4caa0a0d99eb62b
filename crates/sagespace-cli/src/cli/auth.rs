/*
[INPUT]:  Auth session controller and interactive credentials
[OUTPUT]: Sign-in/out side effects and the current user printed to stdout
[POS]:    CLI command layer - account commands
[UPDATE]: When auth session operations change
*/

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Password, theme::ColorfulTheme};
use sagespace_client::{AuthError, AuthSession, User};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

pub async fn run_login(session: &AuthSession, email: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();
    let email = match email {
        Some(email) => email,
        None => Input::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()?;

    let user = session.sign_in(&email, &password).await?;
    println!("{} {}", style("Signed in as").green(), describe(&user));
    Ok(())
}

pub async fn run_signup(session: &AuthSession, email: String, name: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()?;

    match session.sign_up(&email, &password, name.as_deref()).await {
        Ok(user) => {
            println!("{} {}", style("Account created, signed in as").green(), describe(&user));
            Ok(())
        }
        Err(AuthError::ConfirmationRequired) => {
            println!("{}", style(AuthError::ConfirmationRequired).yellow());
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn run_logout(session: &AuthSession) -> Result<()> {
    session.sign_out().await?;
    println!("{}", style("Signed out.").green());
    Ok(())
}

pub fn run_whoami(session: &AuthSession) {
    match session.user() {
        Some(user) => println!("{}", describe(&user)),
        None => println!("{}", style("Not signed in (guest).").dim()),
    }
}

pub async fn run_google(session: &AuthSession) -> Result<()> {
    let url = session.sign_in_with_google().await?;
    println!("Open this URL to continue with Google:\n  {}", style(url).cyan());
    println!(
        "{}",
        style("Then run `sagespace oauth-callback <redirected URL>`.").dim()
    );
    Ok(())
}

pub async fn run_oauth_callback(session: &AuthSession, callback: &str) -> Result<()> {
    let callback = Url::parse(callback).context("callback must be a full URL")?;
    let user = session.complete_oauth_redirect(&callback).await?;
    println!("{} {}", style("Signed in as").green(), describe(&user));
    Ok(())
}

pub async fn run_reset_password(session: &AuthSession, email: &str) -> Result<()> {
    session.reset_password(email).await?;
    println!("Password reset email sent to {}", style(email).cyan());
    Ok(())
}

/// Print auth state changes until shutdown.
pub async fn run_watch(session: &AuthSession, shutdown: CancellationToken) -> Result<()> {
    let mut states = session.subscribe();
    run_whoami(session);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                info!(loading = state.loading, signed_in = state.is_authenticated(), "auth state changed");
                if !state.loading {
                    run_whoami(session);
                }
            }
        }
    }
    Ok(())
}

fn describe(user: &User) -> String {
    match &user.email {
        Some(email) => format!("{} <{}> ({})", user.name, email, user.id),
        None => format!("{} ({})", user.name, user.id),
    }
}
