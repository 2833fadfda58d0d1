//! # カテゴリ別ファイル一覧
//!
//! カテゴリのバケットを継続トークンが尽きるまでページングし、ファイル名を集める。
//!
//! - キーが不正なエントリは警告して読み飛ばす
//! - 1件以上のエントリがあり、そのすべてが不正なら `ListingCorrupted`（520）
//! - 空のバケットは空の一覧（エラーではない）
//! - プロバイダのエラーは一覧全体を中断する（再試行なし）

use std::collections::HashSet;

use mirror_types::FileCategory;

use crate::config::BucketTable;
use crate::error::GatewayError;
use crate::storage::ObjectLister;

/// カテゴリ別ファイル一覧取得器。
pub struct FileLister {
    backend: Box<dyn ObjectLister>,
    buckets: BucketTable,
}

impl FileLister {
    pub fn new(backend: Box<dyn ObjectLister>, buckets: BucketTable) -> Self {
        Self { backend, buckets }
    }

    /// カテゴリの全ファイル名を出現順で返す。
    pub async fn file_list_for_category(
        &self,
        category: FileCategory,
    ) -> Result<Vec<String>, GatewayError> {
        let bucket = self.buckets.resolve(category)?;

        let mut file_names = Vec::new();
        let mut skipped = 0usize;
        let mut continuation_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut page = 0usize;

        loop {
            let listing = self
                .backend
                .list_page(bucket, continuation_token.take())
                .await
                .inspect_err(|e| {
                    tracing::error!(%category, bucket, page, error = %e, "ファイル一覧の取得に失敗");
                })?;

            for (index, object) in listing.objects.into_iter().enumerate() {
                match object.key {
                    Some(key) => file_names.push(key),
                    None => {
                        skipped += 1;
                        tracing::warn!(%category, page, index, "キーが不正なエントリを読み飛ばします");
                    }
                }
            }

            match listing.next_continuation_token {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(GatewayError::Listing(format!(
                            "継続トークンが繰り返されました (ページ {page})"
                        )));
                    }
                    continuation_token = Some(token);
                    page += 1;
                }
                None => break,
            }
        }

        if file_names.is_empty() && skipped > 0 {
            return Err(GatewayError::ListingCorrupted { skipped });
        }

        tracing::info!(
            %category,
            files = file_names.len(),
            skipped,
            pages = page + 1,
            "ファイル一覧を取得しました"
        );
        Ok(file_names)
    }
}
