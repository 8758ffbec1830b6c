use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use async_trait::async_trait;

/// Remote folder of DOCX templates.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// File names directly inside the template folder.
    async fn list_files(&self) -> anyhow::Result<Vec<String>>;

    async fn download_file(&self, name: &str) -> anyhow::Result<Vec<u8>>;
}

/// Local directory where filled documents are written.
#[derive(Clone, Debug)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` as `file_name` inside the root, replacing any earlier file of that name.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| anyhow!("invalid output file name: {file_name:?}"))?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create output folder: {}", self.root.display()))?;
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write output: {}", path.display()))?;
        Ok(path)
    }
}
