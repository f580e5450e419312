use std::sync::Arc;

use hotline_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), hotline_core::Error> {
    hotline_core::logging::init("hotline")?;

    let cfg = Arc::new(Config::load()?);

    hotline_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| hotline_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
