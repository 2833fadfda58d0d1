//! # Mirror Update Gateway
//!
//! 更新通知Webhookを受け付けるサーバー。
//!
//! ## API エンドポイント
//! - `POST {MIRROR_WEBHOOK_PATH}`: Webhook認証（既定 `/webhook`）

use std::sync::Arc;

use mirror_gateway::config::{GatewayConfig, GatewayState};
use mirror_gateway::webhook_auth::InboundAuthenticator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        profile = ?config.profile,
        webhook_path = %config.webhook_path,
        allow_list = %config.allow_list_name,
        trusted_keys = config.trusted_public_keys.len(),
        "設定を読み込みました"
    );

    let state = Arc::new(GatewayState {
        authenticator: InboundAuthenticator::from_config(&config),
    });
    let app = mirror_gateway::router(state, &config.webhook_path);

    tracing::info!("Gatewayを {} で起動します", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
