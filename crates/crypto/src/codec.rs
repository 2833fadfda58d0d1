//! # バイナリ⇔文字列コーデック
//!
//! 鍵のDERバイト列、署名、ファイル本体をJSON文字列フィールドで運ぶための変換。
//!
//! Latin-1変換は1文字 = 1バイトの恒等写像であり、UTF-8デコードは行わない。
//! UTF-8を経由すると0x80以上のバイトが破壊される。

use base64::Engine;

use crate::CryptoError;

/// Base64エンジン（Standard）
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Base64文字列をバイト列にデコードする。
pub fn bytes_from_base64(s: &str) -> Result<Vec<u8>, CryptoError> {
    b64()
        .decode(s)
        .map_err(|e| CryptoError::Base64(e.to_string()))
}

/// バイト列をBase64文字列にエンコードする。
pub fn base64_from_bytes(bytes: &[u8]) -> String {
    b64().encode(bytes)
}

/// 各文字を1バイトとみなして文字列をバイト列に変換する（ISO-8859-1）。
///
/// U+00FFを超える文字は1バイトで表せないためエラーとする。
pub fn bytes_from_latin1_string(s: &str) -> Result<Vec<u8>, CryptoError> {
    s.chars()
        .enumerate()
        .map(|(position, ch)| {
            u8::try_from(u32::from(ch)).map_err(|_| CryptoError::NonLatin1 { position, ch })
        })
        .collect()
}

/// 各バイトを1文字（U+0000〜U+00FF）に写して文字列化する（ISO-8859-1）。
pub fn latin1_string_from_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
