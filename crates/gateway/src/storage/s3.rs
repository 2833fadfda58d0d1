//! # S3互換 オブジェクト一覧実装
//!
//! AWS S3, Cloudflare R2, Backblaze B2 等のS3互換API（ListObjectsV2）を使用する。

use super::{ListedObject, ListingPage, ObjectLister};
use crate::config::StorageAccountConfig;
use crate::error::GatewayError;

/// S3互換ストレージによる一覧取得実装。
pub struct S3ObjectLister {
    region: s3::Region,
    credentials: s3::creds::Credentials,
}

impl S3ObjectLister {
    pub fn new(region: s3::Region, credentials: s3::creds::Credentials) -> Self {
        Self {
            region,
            credentials,
        }
    }

    /// アカウント設定から構築する。エンドポイントと認証情報は必須。
    pub fn from_config(account: &StorageAccountConfig) -> Result<Self, GatewayError> {
        let missing = |name: &str| GatewayError::Configuration(format!("{name}が設定されていません"));
        let endpoint = account.endpoint.as_deref().ok_or_else(|| missing("S3_ENDPOINT"))?;
        let access_key = account
            .access_key
            .as_deref()
            .ok_or_else(|| missing("S3_ACCESS_KEY"))?;
        let secret_key = account
            .secret_key
            .as_deref()
            .ok_or_else(|| missing("S3_SECRET_KEY"))?;

        let region = s3::Region::Custom {
            region: account
                .region
                .clone()
                .unwrap_or_else(|| detect_region(endpoint)),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            s3::creds::Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| GatewayError::Configuration(format!("S3認証情報が不正です: {e}")))?;

        Ok(Self::new(region, credentials))
    }
}

/// AWS S3エンドポイント（s3.REGION.amazonaws.com）からリージョンを検出する。
/// 非AWSエンドポイントではus-east-1をフォールバックとして使用。
fn detect_region(endpoint: &str) -> String {
    endpoint
        .find("s3.")
        .and_then(|start| {
            let rest = &endpoint[start + 3..];
            rest.find(".amazonaws.com").map(|end| rest[..end].to_string())
        })
        .unwrap_or_else(|| "us-east-1".to_string())
}

#[async_trait::async_trait]
impl ObjectLister for S3ObjectLister {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ListingPage, GatewayError> {
        let bucket = s3::Bucket::new(bucket, self.region.clone(), self.credentials.clone())
            .map_err(|e| GatewayError::Listing(format!("バケットの初期化に失敗: {e}")))?
            .with_path_style();

        let (result, code) = bucket
            .list_page(String::new(), None, continuation_token, None, None)
            .await
            .map_err(|e| GatewayError::Listing(format!("ListObjectsV2に失敗: {e}")))?;

        if !(200..300).contains(&code) {
            return Err(GatewayError::Listing(format!(
                "ListObjectsV2がエラーを返しました: HTTP {code}"
            )));
        }

        // rust-s3の `Object.key` は必須フィールド。キー要素が欠けたエントリは
        // ページ全体のデシリアライズ失敗（上の `Listing`）になり、ここで読み飛ばせるのは空白のキーだけ。
        let objects = result
            .contents
            .into_iter()
            .map(|object| ListedObject {
                key: Some(object.key).filter(|key| !key.trim().is_empty()),
            })
            .collect();

        Ok(ListingPage {
            objects,
            next_continuation_token: result
                .next_continuation_token
                .filter(|token| !token.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_region() {
        assert_eq!(
            detect_region("https://s3.ap-northeast-1.amazonaws.com"),
            "ap-northeast-1"
        );
        assert_eq!(
            detect_region("https://s3.us-west-004.backblazeb2.com"),
            "us-east-1"
        );
        assert_eq!(detect_region("http://localhost:9000"), "us-east-1");
    }

    #[test]
    fn test_from_config_requires_account() {
        let mut account = StorageAccountConfig {
            endpoint: Some("http://localhost:9000".to_string()),
            region: None,
            access_key: Some("access".to_string()),
            secret_key: None,
        };
        assert!(matches!(
            S3ObjectLister::from_config(&account),
            Err(GatewayError::Configuration(_))
        ));

        account.secret_key = Some("secret".to_string());
        assert!(S3ObjectLister::from_config(&account).is_ok());
    }
}
