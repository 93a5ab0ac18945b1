use std::path::Path;

use remedia_core::guard::check_is_admin;

use crate::cli::AuthCommands;
use crate::commands::common::connect;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    let (backend, ctx) = connect(config_path)?;
    let auth = backend.auth_client();
    match command {
        AuthCommands::Login { email, password } => {
            let session = auth.sign_in(&email, &password).await?;
            ctx.session_changed(Some(session.clone()));
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in as {email_label}");
        }
        AuthCommands::Status => match auth.restore_session().await? {
            Some(session) => {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                let role = match check_is_admin(&backend, &session.user.id).await {
                    Ok(true) => "admin",
                    Ok(false) => "member",
                    Err(error) => {
                        tracing::warn!("Failed to check admin status: {}", error);
                        "unknown"
                    }
                };
                println!(
                    "Signed in as {email_label} ({role}, expires_at={})",
                    session.expires_at
                );
            }
            None => println!("Not signed in."),
        },
        AuthCommands::Logout => {
            auth.sign_out().await?;
            ctx.session_changed(None);
            println!("Signed out");
        }
    }
    Ok(())
}
