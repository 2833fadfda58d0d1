//! # Gateway エラー型
//!
//! 送信側（ストレージワーカー呼び出し、一覧取得）と設定のエラー。
//! 受信Webhookの拒否理由は `webhook_auth::AuthRejection` を参照。

use axum::http::StatusCode;
use mirror_types::FileCategory;

/// 全エントリが不正だった一覧取得に返すステータス。
pub const LISTING_CORRUPTED_STATUS: u16 = 520;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 必須設定値の欠落・不正
    #[error("設定エラー: {0}")]
    Configuration(String),
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 署名対象のボディが空
    #[error("署名対象のリクエストボディが空です")]
    EmptyBody,
    /// 署名用秘密鍵が未設定
    #[error("署名用秘密鍵が設定されていません")]
    MissingKey,
    /// 鍵のインポートに失敗
    #[error("鍵のインポートに失敗: {0}")]
    KeyImport(String),
    /// ダウンロードURLの組み立てが未実装のカテゴリ
    #[error("カテゴリ {0} のダウンロードURL生成は未実装です")]
    UnsupportedCategory(FileCategory),
    /// ワーカーがダウンロード/アップロードを拒否
    #[error("ミラーへの保存に失敗: HTTP {status} - {message}")]
    MirrorUpload { status: u16, message: String },
    /// ワーカーが削除バッチを拒否（それ以前のバッチは削除済みの可能性あり）
    #[error("ミラーからの削除に失敗 (バッチ {batch}/{total}): HTTP {status} - {message}")]
    MirrorDeletion {
        status: u16,
        batch: usize,
        total: usize,
        message: String,
    },
    /// ワーカーとの通信失敗
    #[error("ストレージワーカーとの通信に失敗: {0}")]
    Transport(String),
    /// 一覧取得プロバイダのエラー
    #[error("ファイル一覧の取得に失敗: {0}")]
    Listing(String),
    /// 一覧取得は成功したが全エントリが不正
    #[error("ファイル一覧の全エントリが不正です ({skipped}件)")]
    ListingCorrupted { skipped: usize },
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl GatewayError {
    /// 上流（ワーカー）起因のエラーかどうか。
    pub fn is_upstream_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::MirrorUpload { .. }
                | GatewayError::MirrorDeletion { .. }
                | GatewayError::Transport(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) | GatewayError::EmptyBody => StatusCode::BAD_REQUEST,
            GatewayError::Configuration(_)
            | GatewayError::MissingKey
            | GatewayError::KeyImport(_)
            | GatewayError::Listing(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UnsupportedCategory(_) => StatusCode::NOT_IMPLEMENTED,
            GatewayError::MirrorUpload { .. }
            | GatewayError::MirrorDeletion { .. }
            | GatewayError::Transport(_) => StatusCode::BAD_GATEWAY,
            GatewayError::ListingCorrupted { .. } => {
                StatusCode::from_u16(LISTING_CORRUPTED_STATUS)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
