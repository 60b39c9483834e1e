//! Headless board watcher: restores or signs in, then logs board changes
//! until Ctrl-C or the session ends.

use camsports_lib::{app::App, config::Config, logging, poller::BoardEvent};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    logging::init(config.log_json);

    let app = App::from_config(config)?;
    let user = app.sign_in().await?;
    tracing::info!(email = %user.email, role = ?user.role(), "signed in");

    let (poller, handle) = app.start_poller(&user)?;
    let mut events = poller.subscribe();
    let mut status = app.session().subscribe();
    tracing::info!(team_id = %poller.config().team_id, "watching message board");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() || !status.borrow().is_signed_in() {
                    tracing::warn!("session ended");
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(BoardEvent::Updated { team_id, messages }) => {
                    tracing::info!(team_id = %team_id, count = messages.len(), "board updated");
                }
                Ok(BoardEvent::NewMessage { notice, message, .. }) => {
                    tracing::info!(
                        title = %notice.title,
                        body = %notice.body,
                        from = %message.creator_email,
                        "new message"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event consumer fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.stop().await;
    Ok(())
}
