use anyhow::Result;
use clap::{Parser, Subcommand};
use imagegallery_storage::models::StorageConfig;
use imagegallery_storage::storage::{StorageClient, StorageService};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "imagegallery-storage")]
#[command(about = "Manage gallery images in object storage")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ensure the download bucket exists and is publicly readable.
    Init,
    /// Upload an image file to the upload bucket.
    Upload {
        /// Path of the image file to upload.
        path: PathBuf,
        /// Object name to upload as; defaults to the file's name.
        #[arg(long)]
        name: Option<String>,
    },
    /// List watermarked images from the download bucket as JSON.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagegallery_storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let config = StorageConfig::from_env()?;
    let storage = StorageClient::new(config).await?;

    match run(&storage, args.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(storage: &StorageClient, command: Command) -> imagegallery_storage::Result<()> {
    match command {
        Command::Init => {
            storage.initialize().await?;
            info!("Download bucket ready");
        }
        Command::Upload { path, name } => {
            let file_name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        imagegallery_storage::Error::InvalidInput(format!(
                            "Cannot derive an object name from {}",
                            path.display()
                        ))
                    })?,
            };

            let data = tokio::fs::read(&path).await?;
            let image = storage.add_image(&data, &file_name).await?;
            info!("Uploaded {} ({} bytes)", file_name, data.len());
            println!("{}", serde_json::to_string_pretty(&image)?);
        }
        Command::List => {
            let images = storage.get_images().await?;
            info!("Listed {} images", images.len());
            println!("{}", serde_json::to_string_pretty(&images)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, Command};
    use clap::Parser;

    #[test]
    fn test_parse_upload_with_name() {
        let args =
            CliArgs::try_parse_from(["imagegallery-storage", "upload", "cat.png", "--name", "c"])
                .unwrap();
        match args.command {
            Command::Upload { path, name } => {
                assert_eq!(path.to_str(), Some("cat.png"));
                assert_eq!(name.as_deref(), Some("c"));
            }
            _ => panic!("expected upload command"),
        }
    }

    #[test]
    fn test_parse_list() {
        let args = CliArgs::try_parse_from(["imagegallery-storage", "list"]).unwrap();
        assert!(matches!(args.command, Command::List));
    }

    #[test]
    fn test_parse_requires_subcommand() {
        assert!(CliArgs::try_parse_from(["imagegallery-storage"]).is_err());
    }
}
