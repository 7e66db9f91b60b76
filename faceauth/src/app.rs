use anyhow::{Context, Result};
use log::info;

use faceauth_client::camera;
use faceauth_client::{AcquisitionMode, Confirm, MediaSource, Session, SubmitError, Tab};

use crate::prompt::StdinConfirm;
use crate::render;
use crate::Commands;

/// Runs one command against the session. `Ok(false)` means the action was
/// attempted and failed; the reason has already been shown.
pub async fn execute(session: &Session, command: Commands) -> Result<bool> {
    match command {
        Commands::Health => {
            let ok = session.directory().refresh().await.is_ok();
            if let Some(health) = session.directory().health() {
                render::health(&health);
            }
            Ok(ok)
        }
        Commands::Users => {
            session.switch_tab(Tab::Manage);
            let ok = session.manage().refresh().await.is_ok();
            if ok {
                render::users(&session.manage().users());
            }
            Ok(ok)
        }
        Commands::Enroll { image, user } => {
            let user = match user {
                Some(user) => user,
                None => current_user()?,
            };
            session.switch_tab(Tab::Enroll);
            let enroll = session.enroll();
            enroll.set_user_id(&user);

            if enroll.acquire(MediaSource::File(image)).await.is_err() {
                return Ok(false);
            }
            match enroll.submit().await {
                Ok(ack) => {
                    if !ack.message.is_empty() {
                        info!("{}", ack.message);
                    }
                    Ok(true)
                }
                Err(_) => Ok(false),
            }
        }
        Commands::Verify { token, event, image, camera } => {
            session.switch_tab(Tab::Verify);
            let verify = session.verify();
            verify.set_event(event);
            verify.set_token(&token);

            let acquired = if camera {
                capture_from_camera(session).await
            } else {
                match image {
                    Some(path) => verify.acquire(MediaSource::File(path)).await.is_ok(),
                    None => false,
                }
            };

            let outcome = if acquired { verify.submit().await.ok() } else { None };
            if let Some(panel) = verify.panel() {
                render::panel(&panel);
            }
            session.switch_tab(Tab::Manage);
            Ok(outcome.is_some_and(|result| result.success))
        }
        Commands::Delete { user, yes } => {
            session.switch_tab(Tab::Manage);
            let approve = |_: &str| true;
            let confirm: &dyn Confirm = if yes { &approve } else { &StdinConfirm };

            match session.manage().delete_with(user.trim(), confirm).await {
                Ok(_) => Ok(true),
                Err(SubmitError::Cancelled(user)) => {
                    println!("Kept face data for {}", user);
                    Ok(false)
                }
                Err(_) => Ok(false),
            }
        }
        Commands::Cameras => {
            render::cameras(&camera::list_devices());
            Ok(true)
        }
    }
}

async fn capture_from_camera(session: &Session) -> bool {
    let verify = session.verify();
    if verify.set_mode(AcquisitionMode::Camera).is_err() {
        return false;
    }
    println!("Look at the camera...");
    if let Err(e) = verify.warm_up_camera().await {
        session.notifier().error(e.to_string());
        return false;
    }
    verify.capture().await.is_ok()
}

fn current_user() -> Result<String> {
    users::get_current_username()
        .and_then(|name| name.into_string().ok())
        .context("Could not determine the current user; pass --user")
}
