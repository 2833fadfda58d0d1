//! # オブジェクト一覧プロバイダ
//!
//! バケットのオブジェクト一覧を1ページずつ取得する抽象インターフェース。
//! S3互換ストレージ実装は `s3` サブモジュールを参照。

#[cfg(feature = "vendor-aws")]
pub mod s3;

#[cfg(feature = "vendor-aws")]
pub use self::s3::S3ObjectLister;

use crate::error::GatewayError;

/// 一覧の1エントリ。
///
/// キーが欠落・空のエントリは `key: None` で表す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: Option<String>,
}

/// 一覧の1ページ。
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// このページのエントリ（プロバイダの返した順）
    pub objects: Vec<ListedObject>,
    /// 次ページの継続トークン。`None` なら最終ページ
    pub next_continuation_token: Option<String>,
}

/// オブジェクト一覧プロバイダの抽象インターフェース。
///
/// 運用者はS3互換ストレージ（AWS S3, Cloudflare R2, Backblaze B2等）や
/// その他のバックエンドを実装として選択できる。
#[async_trait::async_trait]
pub trait ObjectLister: Send + Sync {
    /// `continuation_token` から始まる1ページを取得する。
    ///
    /// 通信・プロバイダのエラーは `GatewayError::Listing` で返す。
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ListingPage, GatewayError>;
}
