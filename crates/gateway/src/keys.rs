//! # 鍵スロット
//!
//! 設定から一度だけインポートした鍵を保持する。
//! 欠落・インポート失敗はプロセスを止めず、使用のたびに呼び出し側へ報告する。

use mirror_crypto::{import_private_key, import_public_key, SigningKeyHandle, VerifyingKeyHandle};

/// 起動時にロードした鍵の状態。
#[derive(Debug)]
pub enum KeySlot<K> {
    /// 設定されていない
    Missing,
    /// 設定されているがインポートに失敗した
    Invalid(String),
    /// 使用可能
    Ready(K),
}

impl KeySlot<SigningKeyHandle> {
    /// 署名用秘密鍵をロードする。
    pub fn signing(base64_der: Option<&str>) -> Self {
        match base64_der {
            None => KeySlot::Missing,
            Some(der) => match import_private_key(der) {
                Ok(key) => KeySlot::Ready(key),
                Err(e) => {
                    tracing::error!(error = %e, "署名用秘密鍵のインポートに失敗しました");
                    KeySlot::Invalid(e.to_string())
                }
            },
        }
    }
}

impl KeySlot<Vec<VerifyingKeyHandle>> {
    /// 信頼する公開鍵一覧をロードする。
    ///
    /// 1つでもインポートに失敗すれば一覧全体を不正とみなす。
    pub fn trusted(base64_ders: &[String]) -> Self {
        if base64_ders.is_empty() {
            return KeySlot::Missing;
        }
        let imported: Result<Vec<_>, _> = base64_ders
            .iter()
            .enumerate()
            .map(|(index, der)| {
                import_public_key(der).map_err(|e| format!("公開鍵[{index}]: {e}"))
            })
            .collect();
        match imported {
            Ok(keys) => {
                tracing::info!(trusted_keys = keys.len(), "信頼する公開鍵をロードしました");
                KeySlot::Ready(keys)
            }
            Err(e) => {
                tracing::error!(error = %e, "信頼する公開鍵のインポートに失敗しました");
                KeySlot::Invalid(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pair_a, pair_b};

    #[test]
    fn test_signing_slot_states() {
        assert!(matches!(KeySlot::signing(None), KeySlot::Missing));
        assert!(matches!(KeySlot::signing(Some("bm9wZQ==")), KeySlot::Invalid(_)));
        assert!(matches!(
            KeySlot::signing(Some(&pair_a().private_key)),
            KeySlot::Ready(_)
        ));
    }

    #[test]
    fn test_trusted_slot_states() {
        assert!(matches!(KeySlot::trusted(&[]), KeySlot::Missing));

        let both = vec![pair_a().public_key.clone(), pair_b().public_key.clone()];
        match KeySlot::trusted(&both) {
            KeySlot::Ready(keys) => assert_eq!(keys.len(), 2),
            other => panic!("予期しない状態: {other:?}"),
        }

        let one_bad = vec![pair_a().public_key.clone(), "bm9wZQ==".to_string()];
        match KeySlot::trusted(&one_bad) {
            KeySlot::Invalid(msg) => assert!(msg.contains("公開鍵[1]")),
            other => panic!("予期しない状態: {other:?}"),
        }
    }
}
