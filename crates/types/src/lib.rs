//! # Mirror Update Gateway 共有型定義
//!
//! ストレージワーカーとの間でやり取りするリクエストボディ、
//! ファイルカテゴリ、プロトコル定数をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - JSONキー: camelCase（ワーカー側の期待するワイヤ形式）
//! - Base64: バイナリデータ（ファイル本体、署名、鍵）

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// プロトコル定数
// ---------------------------------------------------------------------------

/// 1回の削除リクエストに含められるファイル名の上限。
pub const DELETION_BATCH_SIZE: usize = 50;

/// 署名を運ぶHTTPヘッダ名。
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// プロキシが付与するクライアントIPヘッダのデフォルト名。
pub const DEFAULT_FORWARDED_IP_HEADER: &str = "CF-Connecting-IP";

/// タイムスタンプが未来方向に許容される秒数（"staleness"）。
pub const DEFAULT_STALENESS_TOLERANCE_SECS: i64 = 60;

/// タイムスタンプが過去方向に許容される秒数（"earliness"）。
pub const DEFAULT_EARLINESS_TOLERANCE_SECS: i64 = 15;

// ---------------------------------------------------------------------------
// ファイルカテゴリ
// ---------------------------------------------------------------------------

/// ミラー対象のファイルカテゴリ。
///
/// 各カテゴリは設定上で1つのバケットに対応する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileCategory {
    /// Modファイル本体
    Mods,
    /// スクリーンショット
    Screenshots,
    /// Rich Presenceアイコン
    RichPresenceIcons,
}

impl FileCategory {
    /// 全カテゴリ（宣言順）。
    pub const ALL: [FileCategory; 3] = [
        FileCategory::Mods,
        FileCategory::Screenshots,
        FileCategory::RichPresenceIcons,
    ];

    /// ワイヤ形式の名前を返す。
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Mods => "mods",
            FileCategory::Screenshots => "screenshots",
            FileCategory::RichPresenceIcons => "richPresenceIcons",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知のカテゴリ名。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("不明なファイルカテゴリ: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for FileCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// 拡張子なしのファイル名と拡張子からオブジェクト名を組み立てる。
///
/// 拡張子の先頭の `.` は取り除く。拡張子が空なら名前のみを返す。
pub fn file_name_with_extension(file_name_no_ext: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        file_name_no_ext.to_string()
    } else {
        format!("{file_name_no_ext}.{extension}")
    }
}

// ---------------------------------------------------------------------------
// ワーカー向けリクエストボディ
// ---------------------------------------------------------------------------

/// リモートURLの取得と保存をワーカーに指示する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// 保存先カテゴリ
    pub file_category: FileCategory,
    /// 保存するオブジェクト名
    pub file_name: String,
    /// ワーカーが取得するURL
    pub download_url: String,
}

/// 与えたバイト列の保存をワーカーに指示する。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// 保存先カテゴリ
    pub file_category: FileCategory,
    /// 保存するオブジェクト名
    pub file_name: String,
    /// Base64エンコードされたファイル本体
    pub file: String,
}

// ファイル本体をログに出さない
impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_category", &self.file_category)
            .field("file_name", &self.file_name)
            .field("file", &format_args!("<{} base64 chars>", self.file.len()))
            .finish()
    }
}

/// 指定オブジェクトの削除をワーカーに指示する。
///
/// `file_names` は常に1件以上 [`DELETION_BATCH_SIZE`] 件以下。
/// 構築は [`DeletionRequest::batches`] 経由でのみ行う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRequest {
    file_category: FileCategory,
    file_names: Vec<String>,
}

impl DeletionRequest {
    /// ファイル名一覧を [`DELETION_BATCH_SIZE`] 件ずつの削除リクエストに分割する。
    ///
    /// 空の一覧からは何も生成されない。順序は入力順を保つ。
    pub fn batches(
        file_category: FileCategory,
        file_names: &[String],
    ) -> impl Iterator<Item = DeletionRequest> + '_ {
        file_names
            .chunks(DELETION_BATCH_SIZE)
            .map(move |chunk| DeletionRequest {
                file_category,
                file_names: chunk.to_vec(),
            })
    }

    pub fn file_category(&self) -> FileCategory {
        self.file_category
    }

    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }
}
