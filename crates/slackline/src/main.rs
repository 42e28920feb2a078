use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use slackline_core::{config::Config, event::EventDispatcher, stream::StreamManager};
use slackline_rtm::SlackClient;

mod handlers;

#[tokio::main]
async fn main() -> Result<(), slackline_core::Error> {
    slackline_core::logging::init("slackline")?;

    let cfg = Arc::new(Config::load()?);
    info!(bot = %cfg.bot_name, channels = cfg.channels.len(), "slackline starting");

    let client = Arc::new(SlackClient::new(cfg.clone()));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(
        "message",
        Arc::new(handlers::MessageHandler::new(client.clone())),
    );

    let manager = StreamManager::new(
        client,
        Arc::new(dispatcher),
        cfg.poll_interval,
        cfg.reconnect_delay,
    );

    // The loop itself never terminates; ctrl-c cancels it cleanly at the
    // next suspension point.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                cancel.cancel();
            }
        });
    }

    manager.run(cancel).await;
    Ok(())
}
