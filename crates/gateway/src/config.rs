//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//!
//! 設定はプロセス起動時に一度だけ構築し、認証器・署名器・ミラークライアント・
//! 一覧取得器のコンストラクタに渡す。必須値の欠落は使用時点でエラーになる。

use std::collections::HashMap;
use std::time::Duration;

use mirror_types::{
    FileCategory, DEFAULT_EARLINESS_TOLERANCE_SECS, DEFAULT_FORWARDED_IP_HEADER,
    DEFAULT_STALENESS_TOLERANCE_SECS,
};

use crate::error::GatewayError;
use crate::webhook_auth::InboundAuthenticator;

/// 許可IPリスト用環境変数の接頭辞。`MIRROR_ALLOWED_IPS_<NAME>` の形で指定する。
pub const ALLOWED_IPS_PREFIX: &str = "MIRROR_ALLOWED_IPS_";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_WEBHOOK_PATH: &str = "/webhook";
const DEFAULT_ALLOW_LIST_NAME: &str = "WEBHOOK";
const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 30;

/// 実行プロファイル。
///
/// `Development` ではIP許可リストの確認を行わない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Production,
    Development,
}

impl RuntimeProfile {
    fn parse(value: &str) -> Result<Self, GatewayError> {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(RuntimeProfile::Production),
            "development" | "dev" => Ok(RuntimeProfile::Development),
            other => Err(GatewayError::Configuration(format!(
                "MIRROR_RUNTIME_PROFILEの値が不正です: {other}"
            ))),
        }
    }
}

/// カテゴリ → バケット名の対応表。
///
/// 未設定のカテゴリは空文字列になり、使用時に設定エラーとなる。
#[derive(Debug, Clone, Default)]
pub struct BucketTable {
    pub mods: String,
    pub screenshots: String,
    pub rich_presence_icons: String,
}

impl BucketTable {
    /// カテゴリに対応するバケット名（未設定なら空文字列）。
    pub fn bucket_for(&self, category: FileCategory) -> &str {
        match category {
            FileCategory::Mods => &self.mods,
            FileCategory::Screenshots => &self.screenshots,
            FileCategory::RichPresenceIcons => &self.rich_presence_icons,
        }
    }

    /// カテゴリに対応するバケット名を返す。未設定なら設定エラー。
    pub fn resolve(&self, category: FileCategory) -> Result<&str, GatewayError> {
        let bucket = self.bucket_for(category);
        if bucket.is_empty() {
            return Err(GatewayError::Configuration(format!(
                "カテゴリ {category} のバケットが設定されていません"
            )));
        }
        Ok(bucket)
    }
}

/// 一覧取得プロバイダ（S3互換）のアカウント情報。
#[derive(Debug, Clone, Default)]
pub struct StorageAccountConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Gateway設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 実行プロファイル
    pub profile: RuntimeProfile,
    /// Webhookサーバーの待ち受けアドレス
    pub listen_addr: String,
    /// Webhookエンドポイントのパス
    pub webhook_path: String,
    /// 信頼する公開鍵（Base64 SPKI）。空なら未設定
    pub trusted_public_keys: Vec<String>,
    /// 送信リクエスト署名用秘密鍵（Base64 PKCS#8）
    pub signing_private_key: Option<String>,
    /// Webhookが使う許可IPリストの名前
    pub allow_list_name: String,
    /// 名前 → 許可IP一覧
    pub allow_lists: HashMap<String, Vec<String>>,
    /// クライアントIPを運ぶヘッダ名
    pub forwarded_ip_header: String,
    /// 未来方向の許容秒数
    pub staleness_tolerance_secs: i64,
    /// 過去方向の許容秒数
    pub earliness_tolerance_secs: i64,
    /// ストレージワーカーのURL
    pub worker_endpoint: Option<String>,
    /// ワーカー呼び出し1回あたりのタイムアウト
    pub worker_timeout: Duration,
    /// Modファイルの公開ダウンロードパス
    pub mod_download_base_url: Option<String>,
    /// カテゴリ → バケット
    pub buckets: BucketTable,
    /// 一覧取得プロバイダのアカウント
    pub storage_account: StorageAccountConfig,
}

impl GatewayConfig {
    /// プロセス環境変数から構築する。UTF-8でない変数は無視する。
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// 名前と値の組から構築する。
    ///
    /// 空文字列（前後の空白を除く）の値は未設定として扱う。
    pub fn from_vars<I>(vars: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                let v = v.trim().to_string();
                (!v.is_empty()).then_some((k, v))
            })
            .collect();
        let get = |name: &str| vars.get(name).cloned();

        let profile = get("MIRROR_RUNTIME_PROFILE")
            .map(|v| RuntimeProfile::parse(&v))
            .transpose()?
            .unwrap_or(RuntimeProfile::Production);

        let allow_lists = vars
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(ALLOWED_IPS_PREFIX)
                    .map(|name| (name.to_string(), split_list(v)))
            })
            .collect();

        let worker_timeout_secs = parse_number(
            get("MIRROR_WORKER_TIMEOUT_SECS"),
            "MIRROR_WORKER_TIMEOUT_SECS",
            DEFAULT_WORKER_TIMEOUT_SECS,
        )?;

        Ok(Self {
            profile,
            listen_addr: get("MIRROR_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into()),
            webhook_path: get("MIRROR_WEBHOOK_PATH")
                .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.into()),
            trusted_public_keys: get("MIRROR_TRUSTED_PUBLIC_KEYS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            signing_private_key: get("MIRROR_SIGNING_PRIVATE_KEY"),
            allow_list_name: get("MIRROR_ALLOW_LIST")
                .unwrap_or_else(|| DEFAULT_ALLOW_LIST_NAME.into()),
            allow_lists,
            forwarded_ip_header: get("MIRROR_FORWARDED_IP_HEADER")
                .unwrap_or_else(|| DEFAULT_FORWARDED_IP_HEADER.into()),
            staleness_tolerance_secs: parse_tolerance(
                get("MIRROR_TIMESTAMP_STALENESS_SECS"),
                "MIRROR_TIMESTAMP_STALENESS_SECS",
                DEFAULT_STALENESS_TOLERANCE_SECS,
            )?,
            earliness_tolerance_secs: parse_tolerance(
                get("MIRROR_TIMESTAMP_EARLINESS_SECS"),
                "MIRROR_TIMESTAMP_EARLINESS_SECS",
                DEFAULT_EARLINESS_TOLERANCE_SECS,
            )?,
            worker_endpoint: get("MIRROR_WORKER_ENDPOINT"),
            worker_timeout: Duration::from_secs(worker_timeout_secs),
            mod_download_base_url: get("MIRROR_MOD_DOWNLOAD_BASE_URL"),
            buckets: BucketTable {
                mods: get("MIRROR_BUCKET_MODS").unwrap_or_default(),
                screenshots: get("MIRROR_BUCKET_SCREENSHOTS").unwrap_or_default(),
                rich_presence_icons: get("MIRROR_BUCKET_RICH_PRESENCE_ICONS")
                    .unwrap_or_default(),
            },
            storage_account: StorageAccountConfig {
                endpoint: get("S3_ENDPOINT"),
                region: get("S3_REGION"),
                access_key: get("S3_ACCESS_KEY"),
                secret_key: get("S3_SECRET_KEY"),
            },
        })
    }

    /// 名前付き許可IPリスト。未設定・空なら `None`。
    pub fn allow_list(&self, name: &str) -> Option<&[String]> {
        self.allow_lists
            .get(name)
            .map(Vec::as_slice)
            .filter(|ips| !ips.is_empty())
    }
}

/// カンマ区切りの値を分割する。空要素は捨てる。
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(
    value: Option<String>,
    name: &str,
    default: T,
) -> Result<T, GatewayError> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| GatewayError::Configuration(format!("{name}の値が数値ではありません: {v}"))),
        None => Ok(default),
    }
}

/// 受付窓の許容秒数を読む。0以上でなければ設定エラー。
fn parse_tolerance(value: Option<String>, name: &str, default: i64) -> Result<i64, GatewayError> {
    let secs = parse_number(value, name, default)?;
    if secs < 0 {
        return Err(GatewayError::Configuration(format!(
            "{name}は0以上である必要があります: {secs}"
        )));
    }
    Ok(secs)
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// 受信Webhookの認証器
    pub authenticator: InboundAuthenticator,
}
