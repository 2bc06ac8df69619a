use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::models::{ArtifactKind, IncomingFile};
use crate::presentation::ResultViewer;
use crate::service::ProcessingService;

#[derive(Debug, Parser)]
#[command(name = "processing-service", about = "Image upload and analysis pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP and GraphQL server (default)
    Serve,
    /// Process local images and export both artifacts
    Process {
        /// Directory receiving segmentation-data.json and classification-data.json
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Guess the declared type the way a browser would, from the extension.
pub fn content_type_for(path: &Path) -> Option<mime::Mime> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(mime::IMAGE_JPEG),
        "png" => Some(mime::IMAGE_PNG),
        _ => None,
    }
}

pub async fn run_process(config: Config, out: PathBuf, files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut incoming = Vec::with_capacity(files.len());
    for path in &files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let content_type = content_type_for(path);
        incoming.push(IncomingFile::new(name, content_type.as_ref().map(|m| m.essence_str()), data));
    }

    let service = ProcessingService::new(config).await?;
    let (job_id, bundle) = service.process(incoming).await?;

    tokio::fs::create_dir_all(&out).await?;
    let viewer = ResultViewer::new(&bundle);
    let mut written = Vec::new();
    for kind in [ArtifactKind::Segmentation, ArtifactKind::Classification] {
        written.push(viewer.export(kind, &out).await?);
    }
    tracing::info!(job_id = %job_id, images = bundle.images.len(), out = %out.display(), "Exported artifacts");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_images::{jpeg_bytes, png_bytes};

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for(Path::new("a.JPG")), Some(mime::IMAGE_JPEG));
        assert_eq!(content_type_for(Path::new("b.png")), Some(mime::IMAGE_PNG));
        assert_eq!(content_type_for(Path::new("notes.txt")), None);
        assert_eq!(content_type_for(Path::new("noext")), None);
    }

    #[test]
    fn process_requires_files() {
        assert!(Cli::try_parse_from(["processing-service", "process"]).is_err());
        let cli = Cli::try_parse_from(["processing-service", "process", "--out", "o", "a.png"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Process { ref files, .. }) if files.len() == 1));
        assert!(Cli::try_parse_from(["processing-service"]).unwrap().command.is_none());
    }

    #[tokio::test]
    async fn process_writes_both_artifacts() {
        let input = tempfile::tempdir().unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let a = input.path().join("a.png");
        let b = input.path().join("b.jpg");
        std::fs::write(&a, png_bytes(64, 48)).unwrap();
        std::fs::write(&b, jpeg_bytes(64, 48)).unwrap();

        let cfg = Config { upload_dir: uploads.path().to_path_buf(), stage_delay_ms: 0, ..Config::default() };
        let written = run_process(cfg, out.path().to_path_buf(), vec![a, b]).await.unwrap();
        assert_eq!(written.len(), 2);

        let seg: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.path().join("segmentation-data.json")).unwrap()).unwrap();
        assert_eq!(seg["results"].as_array().unwrap().len(), 2);
        assert!(out.path().join("classification-data.json").exists());
    }
}
