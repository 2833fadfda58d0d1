//! # Mirror Update Gateway 暗号処理
//!
//! ストレージワーカーへの送信リクエスト署名と、受信Webhookの署名検証に使う
//! プリミティブを提供する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | 署名 | RSA-PSS (SHA-256, salt 32バイト) |
//! | 秘密鍵形式 | PKCS#8 DER (Base64) |
//! | 公開鍵形式 | SPKI DER (Base64) |
//!
//! RSA-PSSの署名はランダムソルトを含むため、同一入力でも毎回異なるバイト列になる。
//! 正しさは検証で確認すること。

pub mod codec;
pub mod keys;

use rsa::pss;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};

pub use codec::{
    base64_from_bytes, bytes_from_base64, bytes_from_latin1_string, latin1_string_from_bytes,
};
pub use keys::{
    generate_key_pair, import_private_key, import_public_key, EncodedKeyPair, SigningKeyHandle,
    VerifyingKeyHandle,
};

/// RSA-PSSのソルト長（バイト）。
pub const PSS_SALT_LEN: usize = 32;

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Base64デコードエラー
    #[error("Base64デコードに失敗しました: {0}")]
    Base64(String),
    /// 1バイトで表せない文字
    #[error("Latin-1で表現できない文字 {ch:?} (位置 {position})")]
    NonLatin1 { position: usize, ch: char },
    /// 鍵インポートエラー
    #[error("鍵のインポートに失敗しました: {0}")]
    KeyImport(String),
    /// 鍵生成エラー
    #[error("鍵の生成に失敗しました: {0}")]
    KeyGeneration(String),
    /// 署名生成エラー
    #[error("RSA-PSS署名に失敗しました: {0}")]
    Signing(String),
    /// 署名バイト列の形式不正
    #[error("署名の形式が不正です")]
    MalformedSignature,
    /// 署名検証エラー
    #[error("RSA-PSS署名検証に失敗しました")]
    SignatureVerifyError,
}

/// RSA-PSSによる署名。
pub fn rsa_pss_sign(signing_key: &SigningKeyHandle, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let signature = signing_key
        .0
        .try_sign_with_rng(&mut rand::rngs::OsRng, message)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(signature.to_vec())
}

/// RSA-PSSによる署名検証。
pub fn rsa_pss_verify(
    verifying_key: &VerifyingKeyHandle,
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let signature =
        pss::Signature::try_from(signature).map_err(|_| CryptoError::MalformedSignature)?;
    verifying_key
        .0
        .verify(message, &signature)
        .map_err(|_| CryptoError::SignatureVerifyError)
}
