//! # Mirror Update Gateway CLI
//!
//! 鍵の発行、Webhook署名の作成・検証、ストレージワーカー操作を行う運用ツール。
//! 設定はGatewayと同じ環境変数から読み込む。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mirror_crypto::{bytes_from_base64, generate_key_pair, rsa_pss_verify};
use mirror_gateway::config::GatewayConfig;
use mirror_gateway::keys::KeySlot;
use mirror_gateway::lister::FileLister;
use mirror_gateway::mirror::MirrorClient;
use mirror_gateway::signer::RequestSigner;
use mirror_gateway::storage::S3ObjectLister;
use mirror_types::FileCategory;

/// 既定のRSA鍵長
const DEFAULT_KEY_BITS: usize = 2048;

#[derive(Debug, Parser)]
#[command(name = "mirror-cli", about = "Mirror Update Gateway operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// RSA鍵ペアを生成する（Base64 PKCS#8 秘密鍵 / Base64 SPKI 公開鍵）
    Keygen {
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },
    /// MIRROR_SIGNING_PRIVATE_KEY でボディに署名し、Authorization値を出力する
    Sign {
        #[arg(long)]
        body: String,
    },
    /// 署名を MIRROR_TRUSTED_PUBLIC_KEYS のいずれかで検証する
    Verify {
        #[arg(long)]
        body: String,
        #[arg(long)]
        signature: String,
    },
    /// リモートURLからの取得をワーカーに指示する
    DownloadUrl {
        category: FileCategory,
        name: String,
        ext: String,
    },
    /// ローカルファイルをワーカー経由でアップロードする
    Upload {
        category: FileCategory,
        name: String,
        ext: String,
        path: PathBuf,
    },
    /// ファイルを50件ずつのバッチで削除する
    Delete {
        category: FileCategory,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// カテゴリのファイル一覧を出力する
    List { category: FileCategory },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Keygen { bits } => {
            let pair = generate_key_pair(bits)?;
            println!("MIRROR_SIGNING_PRIVATE_KEY={}", pair.private_key);
            println!("MIRROR_TRUSTED_PUBLIC_KEYS={}", pair.public_key);
        }
        Command::Sign { body } => {
            let config = GatewayConfig::from_env()?;
            let signature = RequestSigner::from_config(&config).storage_request_signature(&body)?;
            println!("{signature}");
        }
        Command::Verify { body, signature } => {
            let config = GatewayConfig::from_env()?;
            let keys = match KeySlot::trusted(&config.trusted_public_keys) {
                KeySlot::Ready(keys) => keys,
                KeySlot::Missing => anyhow::bail!("MIRROR_TRUSTED_PUBLIC_KEYSが設定されていません"),
                KeySlot::Invalid(reason) => anyhow::bail!("公開鍵のインポートに失敗: {reason}"),
            };
            let signature = bytes_from_base64(signature.trim())?;
            match keys
                .iter()
                .position(|key| rsa_pss_verify(key, body.as_bytes(), &signature).is_ok())
            {
                Some(index) => println!("OK: 公開鍵[{index}]で検証しました"),
                None => anyhow::bail!("どの信頼する公開鍵でも検証できませんでした"),
            }
        }
        Command::DownloadUrl {
            category,
            name,
            ext,
        } => {
            tracing::info!(%category, file_name = %name, ext = %ext, "ダウンロード指示を送信します");
            let config = GatewayConfig::from_env()?;
            MirrorClient::from_config(&config)?
                .send_download_url_to_mirror(category, &name, &ext)
                .await?;
            println!("OK");
        }
        Command::Upload {
            category,
            name,
            ext,
            path,
        } => {
            let config = GatewayConfig::from_env()?;
            let file = tokio::fs::read(&path)
                .await
                .with_context(|| format!("ファイルの読み込みに失敗: {}", path.display()))?;
            tracing::info!(
                %category,
                file_name = %name,
                ext = %ext,
                size_bytes = file.len(),
                "ファイルをアップロードします"
            );
            MirrorClient::from_config(&config)?
                .upload_file_to_mirror(category, &name, &ext, &file)
                .await?;
            println!("OK");
        }
        Command::Delete { category, names } => {
            tracing::info!(%category, files = names.len(), "ファイルを削除します");
            let config = GatewayConfig::from_env()?;
            MirrorClient::from_config(&config)?
                .delete_files_from_mirror(category, &names)
                .await?;
            println!("OK: {}件を削除しました", names.len());
        }
        Command::List { category } => {
            let config = GatewayConfig::from_env()?;
            let backend = S3ObjectLister::from_config(&config.storage_account)?;
            let lister = FileLister::new(Box::new(backend), config.buckets.clone());
            let files = lister.file_list_for_category(category).await?;
            tracing::info!(%category, files = files.len(), "ファイル一覧を取得しました");
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_delete() {
        let cli = Cli::try_parse_from(["mirror-cli", "delete", "mods", "a.zip", "b.zip"]).unwrap();
        match cli.command {
            Command::Delete { category, names } => {
                assert_eq!(category, FileCategory::Mods);
                assert_eq!(names, vec!["a.zip", "b.zip"]);
            }
            other => panic!("予期しないコマンド: {other:?}"),
        }
        assert!(Cli::try_parse_from(["mirror-cli", "delete", "mods"]).is_err());
    }

    #[test]
    fn test_parse_category_names() {
        let cli = Cli::try_parse_from(["mirror-cli", "list", "richPresenceIcons"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List {
                category: FileCategory::RichPresenceIcons
            }
        ));
        assert!(Cli::try_parse_from(["mirror-cli", "list", "maps"]).is_err());
    }
}
