//! # Webhook認証
//!
//! 外部ホストからの更新通知Webhookが正当かを判定する。
//!
//! ## 判定順（最初の失敗で打ち切り）
//! 1. IP許可リスト（`Production` のみ）
//! 2. ボディのパースと `timestamp` の受付窓
//! 3. `Authorization` ヘッダの署名を信頼する公開鍵のいずれかで検証
//!
//! 安価な形式チェックを先に行い、RSA検証は最後に1回だけ行う。
//!
//! ## 受付窓
//! `0 <= timestamp <= now + staleness` かつ `timestamp >= now - earliness`。
//! staleness は未来方向、earliness は過去方向の許容秒数。

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, StatusCode};
use mirror_crypto::{bytes_from_base64, rsa_pss_verify, VerifyingKeyHandle};
use mirror_types::AUTHORIZATION_HEADER;

use crate::config::{GatewayConfig, RuntimeProfile};
use crate::keys::KeySlot;

/// Webhookの拒否理由。
#[derive(Debug, thiserror::Error)]
pub enum AuthRejection {
    /// 許可リストや公開鍵の設定不備
    #[error("サーバー設定が不正です: {0}")]
    Misconfigured(String),
    /// ボディのパース失敗、`timestamp` の欠落・非数値
    #[error("不正なリクエストボディ: {0}")]
    MalformedBody(String),
    /// `timestamp` が受付窓の外
    #[error("timestampが受付範囲外です: {timestamp} (現在時刻 {now})")]
    StaleTimestamp { timestamp: f64, now: i64 },
    /// `Authorization` ヘッダの欠落・空・デコード不能
    #[error("認証情報がありません: {0}")]
    MissingCredentials(String),
    /// 転送元IPヘッダの欠落
    #[error("クライアントIPヘッダ {0} がありません")]
    MissingClientIp(String),
    /// 許可リストにないIP
    #[error("許可されていないIPです: {0}")]
    IpNotAllowed(String),
    /// どの信頼鍵でも署名を検証できなかった
    #[error("署名の検証に失敗しました")]
    InvalidSignature,
}

impl AuthRejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthRejection::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthRejection::MalformedBody(_) | AuthRejection::StaleTimestamp { .. } => {
                StatusCode::BAD_REQUEST
            }
            AuthRejection::MissingCredentials(_) | AuthRejection::MissingClientIp(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthRejection::IpNotAllowed(_) | AuthRejection::InvalidSignature => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl axum::response::IntoResponse for AuthRejection {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// `timestamp` の受付窓。
#[derive(Debug, Clone, Copy)]
pub struct TimestampWindow {
    /// 未来方向の許容秒数
    pub staleness_secs: i64,
    /// 過去方向の許容秒数
    pub earliness_secs: i64,
}

impl TimestampWindow {
    pub fn accepts(&self, timestamp: f64, now: i64) -> bool {
        let upper = now.saturating_add(self.staleness_secs) as f64;
        let lower = now.saturating_sub(self.earliness_secs) as f64;
        timestamp >= 0.0 && timestamp <= upper && timestamp >= lower
    }
}

/// 受信Webhook認証器。
///
/// 設定と鍵は構築時に確定し、以後変更されない。
#[derive(Debug)]
pub struct InboundAuthenticator {
    profile: RuntimeProfile,
    forwarded_ip_header: String,
    /// `None` は許可リスト未設定（または全要素が不正）
    allow_list: Option<Vec<IpAddr>>,
    window: TimestampWindow,
    trusted_keys: KeySlot<Vec<VerifyingKeyHandle>>,
}

impl InboundAuthenticator {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let allow_list = config
            .allow_list(&config.allow_list_name)
            .map(parse_allow_list)
            .filter(|ips| !ips.is_empty());

        if config.profile == RuntimeProfile::Production && allow_list.is_none() {
            tracing::warn!(
                allow_list = %config.allow_list_name,
                "許可IPリストが未設定です。全Webhookが500で拒否されます"
            );
        }

        Self {
            profile: config.profile,
            forwarded_ip_header: config.forwarded_ip_header.clone(),
            allow_list,
            window: TimestampWindow {
                staleness_secs: config.staleness_tolerance_secs,
                earliness_secs: config.earliness_tolerance_secs,
            },
            trusted_keys: KeySlot::trusted(&config.trusted_public_keys),
        }
    }

    /// 現在時刻でWebhookを認証し、受理したボディを返す。
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        raw_body: &[u8],
    ) -> Result<serde_json::Value, AuthRejection> {
        self.authenticate_at(headers, raw_body, unix_now())
    }

    /// 指定した現在時刻（UNIX秒）でWebhookを認証する。
    pub fn authenticate_at(
        &self,
        headers: &HeaderMap,
        raw_body: &[u8],
        now: i64,
    ) -> Result<serde_json::Value, AuthRejection> {
        if self.profile == RuntimeProfile::Production {
            self.check_client_ip(headers)?;
        }
        let body = self.check_timestamp(raw_body, now)?;
        self.check_signature(headers, raw_body)?;
        Ok(body)
    }

    /// 認証結果のステータスコード（成功時200）。
    pub fn status(&self, headers: &HeaderMap, raw_body: &[u8], now: i64) -> StatusCode {
        match self.authenticate_at(headers, raw_body, now) {
            Ok(_) => StatusCode::OK,
            Err(rejection) => rejection.status_code(),
        }
    }

    fn check_client_ip(&self, headers: &HeaderMap) -> Result<(), AuthRejection> {
        let client_ip = header_str(headers, &self.forwarded_ip_header)
            .ok_or_else(|| AuthRejection::MissingClientIp(self.forwarded_ip_header.clone()))?;

        let allow_list = self.allow_list.as_ref().ok_or_else(|| {
            AuthRejection::Misconfigured("許可IPリストが設定されていません".to_string())
        })?;

        let allowed = client_ip
            .parse::<IpAddr>()
            .map(|ip| allow_list.contains(&ip))
            .unwrap_or(false);
        if !allowed {
            return Err(AuthRejection::IpNotAllowed(client_ip.to_string()));
        }
        Ok(())
    }

    fn check_timestamp(
        &self,
        raw_body: &[u8],
        now: i64,
    ) -> Result<serde_json::Value, AuthRejection> {
        let body: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| AuthRejection::MalformedBody(format!("JSONのパースに失敗: {e}")))?;

        let timestamp = body
            .as_object()
            .ok_or_else(|| AuthRejection::MalformedBody("JSONオブジェクトではありません".into()))?
            .get("timestamp")
            .ok_or_else(|| AuthRejection::MalformedBody("timestampがありません".into()))?
            .as_f64()
            .filter(|t| t.is_finite())
            .ok_or_else(|| AuthRejection::MalformedBody("timestampが数値ではありません".into()))?;

        if !self.window.accepts(timestamp, now) {
            return Err(AuthRejection::StaleTimestamp { timestamp, now });
        }
        Ok(body)
    }

    fn check_signature(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), AuthRejection> {
        let keys = match &self.trusted_keys {
            KeySlot::Ready(keys) => keys,
            KeySlot::Missing => {
                return Err(AuthRejection::Misconfigured(
                    "信頼する公開鍵が設定されていません".to_string(),
                ))
            }
            KeySlot::Invalid(reason) => return Err(AuthRejection::Misconfigured(reason.clone())),
        };

        let encoded = header_str(headers, AUTHORIZATION_HEADER).ok_or_else(|| {
            AuthRejection::MissingCredentials("Authorizationヘッダがありません".to_string())
        })?;
        let signature = bytes_from_base64(encoded)
            .map_err(|e| AuthRejection::MissingCredentials(e.to_string()))?;

        // いずれかの鍵で検証できれば受理（鍵ローテーション中は新旧両方が有効）
        let verified = keys
            .iter()
            .any(|key| rsa_pss_verify(key, raw_body, &signature).is_ok());
        if !verified {
            tracing::warn!(trusted_keys = keys.len(), "Webhook署名の検証に失敗");
            return Err(AuthRejection::InvalidSignature);
        }
        Ok(())
    }
}

fn parse_allow_list(entries: &[String]) -> Vec<IpAddr> {
    entries
        .iter()
        .filter_map(|entry| match entry.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(entry = %entry, "許可IPリストの不正な要素を無視します");
                None
            }
        })
        .collect()
}

/// 空でないヘッダ値を返す。
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pair_a, pair_b, sign_with};
    use axum::http::HeaderValue;

    const NOW: i64 = 1_700_000_010;
    const ALLOWED_IP: &str = "203.0.113.7";

    fn config(extra: &[(&str, &str)]) -> GatewayConfig {
        let mut vars = vec![
            (
                "MIRROR_TRUSTED_PUBLIC_KEYS".to_string(),
                pair_a().public_key.clone(),
            ),
            (
                "MIRROR_ALLOWED_IPS_WEBHOOK".to_string(),
                format!("198.51.100.1,{ALLOWED_IP}"),
            ),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        GatewayConfig::from_vars(vars).unwrap()
    }

    fn authenticator(extra: &[(&str, &str)]) -> InboundAuthenticator {
        InboundAuthenticator::from_config(&config(extra))
    }

    fn headers(ip: Option<&str>, signature: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ip) = ip {
            headers.insert("cf-connecting-ip", HeaderValue::from_str(ip).unwrap());
        }
        if let Some(sig) = signature {
            headers.insert("authorization", HeaderValue::from_str(sig).unwrap());
        }
        headers
    }

    fn signed(body: &str, private_key: &str) -> HeaderMap {
        let sig = sign_with(private_key, body.as_bytes());
        headers(Some(ALLOWED_IP), Some(&sig))
    }

    fn body_at(timestamp: i64) -> String {
        format!(r#"{{"timestamp": {timestamp}, "event": "mod.updated"}}"#)
    }

    /// 信頼鍵で署名・許可IP・窓内のtimestamp → 200
    #[test]
    fn test_accepts_valid_request() {
        let auth = authenticator(&[]);
        let body = r#"{"timestamp": 1700000000}"#;
        let h = signed(body, &pair_a().private_key);

        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::OK);
        let accepted = auth.authenticate_at(&h, body.as_bytes(), NOW).unwrap();
        assert_eq!(accepted["timestamp"], 1_700_000_000i64);
    }

    /// 90秒経過（過去方向の許容15秒）→ 400
    #[test]
    fn test_rejects_old_timestamp() {
        let auth = authenticator(&[]);
        let body = r#"{"timestamp": 1700000000}"#;
        let h = signed(body, &pair_a().private_key);
        assert_eq!(
            auth.status(&h, body.as_bytes(), 1_700_000_100),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_timestamp_window_edges() {
        let auth = authenticator(&[]);
        let key = &pair_a().private_key;

        for (timestamp, expected) in [
            (NOW, StatusCode::OK),
            (NOW + 60, StatusCode::OK),
            (NOW + 61, StatusCode::BAD_REQUEST),
            (NOW - 15, StatusCode::OK),
            (NOW - 16, StatusCode::BAD_REQUEST),
        ] {
            let body = body_at(timestamp);
            let h = signed(&body, key);
            assert_eq!(
                auth.status(&h, body.as_bytes(), NOW),
                expected,
                "timestamp={timestamp}"
            );
        }
    }

    /// 窓の大きさに関係なく timestamp = now は受付窓を通過する
    #[test]
    fn test_now_passes_any_window() {
        for (staleness, earliness) in [("0", "0"), ("1", "0"), ("0", "1"), ("300", "300")] {
            let auth = authenticator(&[
                ("MIRROR_TIMESTAMP_STALENESS_SECS", staleness),
                ("MIRROR_TIMESTAMP_EARLINESS_SECS", earliness),
            ]);
            let body = body_at(NOW);
            let h = signed(&body, &pair_a().private_key);
            assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::OK);
        }
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let window = TimestampWindow {
            staleness_secs: 60,
            earliness_secs: 100,
        };
        assert!(!window.accepts(-1.0, 10));
        assert!(window.accepts(0.0, 10));
    }

    #[test]
    fn test_malformed_bodies() {
        let auth = authenticator(&[]);
        for body in [
            "",
            "not json",
            "[1, 2, 3]",
            r#"{"event": "x"}"#,
            r#"{"timestamp": "1700000010"}"#,
            r#"{"timestamp": null}"#,
        ] {
            let h = signed(body, &pair_a().private_key);
            assert_eq!(
                auth.status(&h, body.as_bytes(), NOW),
                StatusCode::BAD_REQUEST,
                "body={body:?}"
            );
        }
    }

    /// 信頼されていない鍵で署名 → 403
    #[test]
    fn test_untrusted_key_forbidden() {
        let auth = authenticator(&[]);
        let body = body_at(NOW);
        let h = signed(&body, &pair_b().private_key);
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::FORBIDDEN);
    }

    /// 署名後にボディを改変 → 403
    #[test]
    fn test_tampered_body_forbidden() {
        let auth = authenticator(&[]);
        let body = body_at(NOW);
        let h = signed(&body, &pair_a().private_key);
        let tampered = body.replace("mod.updated", "mod.deleted");
        assert_eq!(
            auth.status(&h, tampered.as_bytes(), NOW),
            StatusCode::FORBIDDEN
        );
    }

    /// ローテーション中は新旧どちらの鍵の署名も受理される
    #[test]
    fn test_key_rotation_accepts_any_trusted_key() {
        let both = format!("{},{}", pair_b().public_key, pair_a().public_key);
        let auth = authenticator(&[("MIRROR_TRUSTED_PUBLIC_KEYS", both.as_str())]);
        let body = body_at(NOW);

        for key in [&pair_a().private_key, &pair_b().private_key] {
            let h = signed(&body, key);
            assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::OK);
        }
    }

    #[test]
    fn test_missing_or_malformed_credentials() {
        let auth = authenticator(&[]);
        let body = body_at(NOW);

        let h = headers(Some(ALLOWED_IP), None);
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::UNAUTHORIZED);

        let h = headers(Some(ALLOWED_IP), Some("   "));
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::UNAUTHORIZED);

        let h = headers(Some(ALLOWED_IP), Some("***not-base64***"));
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_ip_checks() {
        let auth = authenticator(&[]);
        let body = body_at(NOW);
        let sig = sign_with(&pair_a().private_key, body.as_bytes());

        let h = headers(None, Some(&sig));
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::UNAUTHORIZED);

        let h = headers(Some("192.0.2.99"), Some(&sig));
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::FORBIDDEN);

        let h = headers(Some("garbage"), Some(&sig));
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::FORBIDDEN);

        let h = headers(Some("198.51.100.1"), Some(&sig));
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::OK);
    }

    /// IPチェックは他のすべてのチェックより先に行われる
    #[test]
    fn test_ip_check_runs_first() {
        let auth = authenticator(&[]);
        let h = headers(None, None);
        assert_eq!(auth.status(&h, b"not json", NOW), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_development_profile_skips_ip_check() {
        let auth = authenticator(&[("MIRROR_RUNTIME_PROFILE", "development")]);
        let body = body_at(NOW);
        let sig = sign_with(&pair_a().private_key, body.as_bytes());
        let h = headers(None, Some(&sig));
        assert_eq!(auth.status(&h, body.as_bytes(), NOW), StatusCode::OK);
    }

    #[test]
    fn test_misconfiguration_is_500() {
        let body = body_at(NOW);
        let sig = sign_with(&pair_a().private_key, body.as_bytes());
        let h = headers(Some(ALLOWED_IP), Some(&sig));

        // 許可リストなし
        let auth = authenticator(&[("MIRROR_ALLOW_LIST", "OTHER")]);
        assert_eq!(
            auth.status(&h, body.as_bytes(), NOW),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        // 許可リストの全要素が不正
        let auth = authenticator(&[("MIRROR_ALLOWED_IPS_WEBHOOK", "nope, also-nope")]);
        assert_eq!(
            auth.status(&h, body.as_bytes(), NOW),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        // 公開鍵なし
        let auth = InboundAuthenticator::from_config(
            &GatewayConfig::from_vars(vec![(
                "MIRROR_ALLOWED_IPS_WEBHOOK".to_string(),
                ALLOWED_IP.to_string(),
            )])
            .unwrap(),
        );
        assert_eq!(
            auth.status(&h, body.as_bytes(), NOW),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        // 公開鍵のインポート失敗
        let auth = authenticator(&[("MIRROR_TRUSTED_PUBLIC_KEYS", "bm9wZQ==")]);
        assert_eq!(
            auth.status(&h, body.as_bytes(), NOW),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    /// 設定不備でも、ボディ不正は署名チェックより先に400になる
    #[test]
    fn test_body_checked_before_keys() {
        let auth = InboundAuthenticator::from_config(
            &GatewayConfig::from_vars(vec![(
                "MIRROR_ALLOWED_IPS_WEBHOOK".to_string(),
                ALLOWED_IP.to_string(),
            )])
            .unwrap(),
        );
        let h = headers(Some(ALLOWED_IP), None);
        assert_eq!(auth.status(&h, b"{}", NOW), StatusCode::BAD_REQUEST);
    }
}
