use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use hotline_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use hotline_core::{
    audit::AuditLogger, config::Config, dialog::DialogStates, messaging::port::MessagingPort,
    relay::RelayEngine, router::HotlineBot, sessions::SessionStore, sweeper::IdleSweeper,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub bot: HotlineBot,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    // Updates queued while we were down belong to sessions that no longer exist.
    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        warn!(error = %e, "failed to drop pending updates");
    }

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "hotline bot started"),
        Err(e) => warn!(error = %e, "get_me failed"),
    }
    info!(manager_id = %cfg.manager_id, "relaying to operator");

    // Keep a 429 RetryAfter retry at the Telegram adapter layer as well.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let engine = Arc::new(
        RelayEngine::new(
            &cfg,
            Arc::new(SessionStore::new()),
            Arc::new(DialogStates::new()),
            messenger,
        )
        .with_audit(Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ))),
    );

    let sweeper =
        IdleSweeper::new(engine.clone(), cfg.sweep_interval, cfg.idle_timeout).start();

    let state = Arc::new(AppState {
        bot: HotlineBot::new(engine),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            match shutdown.shutdown() {
                Ok(done) => done.await,
                Err(e) => warn!(error = ?e, "dispatcher was not running"),
            }
        }
    });

    dispatcher.dispatch().await;

    sweeper.shutdown().await;
    info!("hotline bot stopped");
    Ok(())
}
