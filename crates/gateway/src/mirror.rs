//! # ミラー（ストレージワーカー）クライアント
//!
//! 単一のワーカーエンドポイントに対し、署名付きで3種類の操作を送る。
//! - URL指定ダウンロード（PUT）
//! - 直接アップロード（PUT）
//! - バッチ削除（DELETE、[`DELETION_BATCH_SIZE`] 件ずつ順番に）
//!
//! 呼び出しは逐次的で、再試行は行わない。

use mirror_crypto::base64_from_bytes;
use mirror_types::{
    file_name_with_extension, DeletionRequest, DownloadRequest, FileCategory, UploadRequest,
    DELETION_BATCH_SIZE,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::signer::RequestSigner;

/// カテゴリごとのダウンロードURL生成。
///
/// 新しいカテゴリを追加すると `download_url` の網羅性検査で検出される。
#[derive(Debug, Clone, Default)]
pub struct DownloadUrls {
    /// Modファイルの公開ダウンロードパス
    pub mods_base_url: Option<String>,
}

impl DownloadUrls {
    /// ワーカーが取得するURLを組み立てる。
    pub fn download_url(
        &self,
        category: FileCategory,
        file_name: &str,
    ) -> Result<String, GatewayError> {
        match category {
            FileCategory::Mods => {
                let base = self.mods_base_url.as_deref().ok_or_else(|| {
                    GatewayError::Configuration(
                        "MIRROR_MOD_DOWNLOAD_BASE_URLが設定されていません".to_string(),
                    )
                })?;
                Ok(format!("{}/{file_name}", base.trim_end_matches('/')))
            }
            FileCategory::Screenshots | FileCategory::RichPresenceIcons => {
                Err(GatewayError::UnsupportedCategory(category))
            }
        }
    }
}

/// ストレージワーカークライアント。
pub struct MirrorClient {
    http_client: reqwest::Client,
    worker_endpoint: Option<String>,
    signer: RequestSigner,
    download_urls: DownloadUrls,
}

impl MirrorClient {
    pub fn new(
        http_client: reqwest::Client,
        worker_endpoint: Option<String>,
        signer: RequestSigner,
        download_urls: DownloadUrls,
    ) -> Self {
        Self {
            http_client,
            worker_endpoint,
            signer,
            download_urls,
        }
    }

    /// 設定から構築する。HTTPクライアントには呼び出し単位のタイムアウトを設定する。
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.worker_timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("HTTPクライアントの構築に失敗: {e}")))?;
        Ok(Self::new(
            http_client,
            config.worker_endpoint.clone(),
            RequestSigner::from_config(config),
            DownloadUrls {
                mods_base_url: config.mod_download_base_url.clone(),
            },
        ))
    }

    /// リモートURLからの取得と保存をワーカーに指示する。
    pub async fn send_download_url_to_mirror(
        &self,
        category: FileCategory,
        file_name_no_ext: &str,
        extension: &str,
    ) -> Result<(), GatewayError> {
        let file_name = file_name_with_extension(file_name_no_ext, extension);
        let download_url = self.download_urls.download_url(category, &file_name)?;

        tracing::info!(%category, file_name = %file_name, "ミラーにダウンロードを指示");

        let request = DownloadRequest {
            file_category: category,
            file_name,
            download_url,
        };
        let (status, message) = self.send_signed(Method::PUT, &request).await?;
        if !status.is_success() {
            return Err(GatewayError::MirrorUpload {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// ファイル本体をワーカーに保存させる。
    ///
    /// ファイル本体はログに出さない。
    pub async fn upload_file_to_mirror(
        &self,
        category: FileCategory,
        file_name_no_ext: &str,
        extension: &str,
        file: &[u8],
    ) -> Result<(), GatewayError> {
        let file_name = file_name_with_extension(file_name_no_ext, extension);

        tracing::info!(
            %category,
            file_name = %file_name,
            size_bytes = file.len(),
            "ミラーにファイルをアップロード"
        );

        let request = UploadRequest {
            file_category: category,
            file_name,
            file: base64_from_bytes(file),
        };
        let (status, message) = self.send_signed(Method::PUT, &request).await?;
        if !status.is_success() {
            return Err(GatewayError::MirrorUpload {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// ファイルをバッチに分けて順番に削除する。
    ///
    /// 最初に失敗したバッチで打ち切る。それ以前のバッチの削除は取り消されない。
    pub async fn delete_files_from_mirror(
        &self,
        category: FileCategory,
        file_names: &[String],
    ) -> Result<(), GatewayError> {
        if file_names.is_empty() {
            return Err(GatewayError::BadRequest(
                "削除するファイル名が指定されていません".to_string(),
            ));
        }

        let total = file_names.len().div_ceil(DELETION_BATCH_SIZE);
        for (index, request) in DeletionRequest::batches(category, file_names).enumerate() {
            let batch = index + 1;
            tracing::info!(
                category = %request.file_category(),
                batch,
                total,
                files = request.file_names().len(),
                "ミラーからファイルを削除"
            );

            let (status, message) = self.send_signed(Method::DELETE, &request).await?;
            if !status.is_success() {
                tracing::error!(%category, batch, total, status = status.as_u16(), "削除バッチが失敗しました");
                return Err(GatewayError::MirrorDeletion {
                    status: status.as_u16(),
                    batch,
                    total,
                    message,
                });
            }
        }
        Ok(())
    }

    /// ボディをJSON文字列化し、その文字列に署名して送信する。
    async fn send_signed<T: Serialize>(
        &self,
        method: Method,
        request: &T,
    ) -> Result<(reqwest::StatusCode, String), GatewayError> {
        let endpoint = self.worker_endpoint.as_deref().ok_or_else(|| {
            GatewayError::Configuration("MIRROR_WORKER_ENDPOINTが設定されていません".to_string())
        })?;

        let body = serde_json::to_string(request)
            .map_err(|e| GatewayError::Internal(format!("リクエストのシリアライズに失敗: {e}")))?;
        let signature = self.signer.storage_request_signature(&body)?;

        let response = self
            .http_client
            .request(method, endpoint)
            .header(AUTHORIZATION, signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("HTTP送信失敗: {e}")))?;

        let status = response.status();
        let message = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("レスポンス読み取り失敗: {e}")))?;
        Ok((status, message))
    }
}
