//! # Mirror Update Gateway
//!
//! 外部コンテンツホストからの更新通知Webhookを認証し、
//! オブジェクトストレージワーカーへ署名付きのストレージ操作を転送する。
//!
//! ## 構成
//! - [`webhook_auth`]: 受信Webhookの認証（IP許可リスト・受付窓・署名検証）
//! - [`signer`]: 送信リクエストへのRSA-PSS署名
//! - [`mirror`]: ストレージワーカーへのダウンロードURL送信・アップロード・一括削除
//! - [`lister`]: カテゴリ別ファイル一覧（継続トークンによるページング）
//!
//! 設定は起動時に [`config::GatewayConfig`] として一度だけ読み込み、各コンポーネントへ渡す。

use std::sync::Arc;

pub mod config;
pub mod endpoints;
pub mod error;
pub mod keys;
pub mod lister;
pub mod mirror;
pub mod signer;
pub mod storage;
pub mod webhook_auth;

use config::GatewayState;

/// Webhookエンドポイントを `webhook_path` に載せたルーターを構築する。
pub fn router(state: Arc<GatewayState>, webhook_path: &str) -> axum::Router {
    axum::Router::new()
        .route(
            webhook_path,
            axum::routing::post(endpoints::handle_webhook),
        )
        .with_state(state)
}
