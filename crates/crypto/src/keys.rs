//! # 鍵インポート
//!
//! Base64エンコードされたDER鍵をRSA-PSS/SHA-256用のハンドルに変換する。
//! 秘密鍵はPKCS#8、公開鍵はSPKI形式。
//!
//! ハンドルは用途（署名専用 / 検証専用）に固定され、鍵バイト列を取り出す手段を持たない。

use std::fmt;

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::pss;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::codec::{base64_from_bytes, bytes_from_base64};
use crate::{CryptoError, PSS_SALT_LEN};

/// 署名専用の鍵ハンドル。
pub struct SigningKeyHandle(pub(crate) pss::SigningKey<Sha256>);

/// 検証専用の鍵ハンドル。
pub struct VerifyingKeyHandle(pub(crate) pss::VerifyingKey<Sha256>);

impl fmt::Debug for SigningKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKeyHandle(RSA-PSS/SHA-256, sign)")
    }
}

impl fmt::Debug for VerifyingKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerifyingKeyHandle(RSA-PSS/SHA-256, verify)")
    }
}

/// Base64エンコードされたPKCS#8秘密鍵をインポートする。
///
/// 前後の空白は無視する（環境変数経由の改行対策）。
pub fn import_private_key(base64_der: &str) -> Result<SigningKeyHandle, CryptoError> {
    let der = bytes_from_base64(base64_der.trim())
        .map_err(|e| CryptoError::KeyImport(format!("秘密鍵のBase64デコードに失敗: {e}")))?;
    let key = RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| CryptoError::KeyImport(format!("PKCS#8秘密鍵のパースに失敗: {e}")))?;
    Ok(SigningKeyHandle(pss::SigningKey::new_with_salt_len(
        key,
        PSS_SALT_LEN,
    )))
}

/// Base64エンコードされたSPKI公開鍵をインポートする。
pub fn import_public_key(base64_der: &str) -> Result<VerifyingKeyHandle, CryptoError> {
    let der = bytes_from_base64(base64_der.trim())
        .map_err(|e| CryptoError::KeyImport(format!("公開鍵のBase64デコードに失敗: {e}")))?;
    let key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CryptoError::KeyImport(format!("SPKI公開鍵のパースに失敗: {e}")))?;
    Ok(VerifyingKeyHandle(pss::VerifyingKey::new_with_salt_len(
        key,
        PSS_SALT_LEN,
    )))
}

/// Base64エンコードされたRSA鍵ペア。
pub struct EncodedKeyPair {
    /// PKCS#8秘密鍵（Base64）
    pub private_key: String,
    /// SPKI公開鍵（Base64）
    pub public_key: String,
}

/// 新しいRSA鍵ペアを生成し、インポート可能な形式で返す。
pub fn generate_key_pair(bits: usize) -> Result<EncodedKeyPair, CryptoError> {
    let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_der = private_key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyGeneration(format!("PKCS#8エンコードに失敗: {e}")))?;
    let public_der = public_key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyGeneration(format!("SPKIエンコードに失敗: {e}")))?;

    Ok(EncodedKeyPair {
        private_key: base64_from_bytes(private_der.as_bytes()),
        public_key: base64_from_bytes(public_der.as_bytes()),
    })
}
