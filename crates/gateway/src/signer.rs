//! # ストレージリクエスト署名
//!
//! ストレージワーカーへ送るリクエストボディに署名し、`Authorization` ヘッダ値を作る。
//!
//! 署名対象は送信するJSON文字列そのもの。再パース・再シリアライズした等価物ではない。

use mirror_crypto::{base64_from_bytes, rsa_pss_sign, SigningKeyHandle};

use crate::config::{GatewayConfig, RuntimeProfile};
use crate::error::GatewayError;
use crate::keys::KeySlot;

/// 送信リクエスト署名器。
#[derive(Debug)]
pub struct RequestSigner {
    key: KeySlot<SigningKeyHandle>,
    profile: RuntimeProfile,
}

impl RequestSigner {
    pub fn new(key: KeySlot<SigningKeyHandle>, profile: RuntimeProfile) -> Self {
        Self { key, profile }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            KeySlot::signing(config.signing_private_key.as_deref()),
            config.profile,
        )
    }

    /// ボディ文字列のUTF-8バイト列にRSA-PSS署名し、Base64で返す。
    ///
    /// 判定順: 空ボディ → 鍵未設定 → 鍵インポート失敗。
    pub fn storage_request_signature(&self, body: &str) -> Result<String, GatewayError> {
        if body.is_empty() {
            return Err(GatewayError::EmptyBody);
        }
        let key = match &self.key {
            KeySlot::Missing => return Err(GatewayError::MissingKey),
            KeySlot::Invalid(reason) => return Err(GatewayError::KeyImport(reason.clone())),
            KeySlot::Ready(key) => key,
        };

        let signature = rsa_pss_sign(key, body.as_bytes())
            .map_err(|e| GatewayError::Internal(format!("リクエスト署名に失敗: {e}")))?;

        if self.profile == RuntimeProfile::Development {
            tracing::debug!(signature_len = signature.len(), "ストレージリクエストに署名");
        }
        Ok(base64_from_bytes(&signature))
    }
}
