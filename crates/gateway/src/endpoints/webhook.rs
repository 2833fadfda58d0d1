//! # POST {webhook_path}
//!
//! 更新通知Webhookを認証し、結果をステータスコードで返す。
//! 認証は生のボディに対して行うため、JSON抽出子は使わない。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::config::GatewayState;
use crate::webhook_auth::AuthRejection;

/// POST {webhook_path}: 更新通知Webhookの受信。
pub async fn handle_webhook(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), AuthRejection> {
    let request_id = uuid::Uuid::new_v4();
    tracing::info_span!("webhook", %request_id).in_scope(|| {
        match state.authenticator.authenticate(&headers, &body) {
            Ok(payload) => {
                tracing::info!(timestamp = %payload["timestamp"], "Webhookを受理しました");
                Ok((StatusCode::OK, "accepted"))
            }
            Err(rejection) => {
                tracing::warn!(
                    status = rejection.status_code().as_u16(),
                    reason = %rejection,
                    "Webhookを拒否しました"
                );
                Err(rejection)
            }
        }
    })
}
