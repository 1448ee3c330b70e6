//! Persists generated images under an output directory.
//!
//! Every batch gets its own token, so concurrent requests writing into the
//! same directory never pick the same name. Bytes go to a hidden `.part`
//! file first and are renamed into place once complete.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    error::{Result, StudioError},
    models::GeneratedImage,
};

#[derive(Debug, Clone, Default)]
pub struct ResultWriter;

impl ResultWriter {
    pub fn new() -> Self {
        Self
    }

    /// Writes `images` into `dir` (created if missing) and returns the paths in order.
    ///
    /// On failure every file written by this call is removed again.
    pub async fn write_all(
        &self,
        dir: &Path,
        prefix: &str,
        images: &[GeneratedImage],
    ) -> Result<Vec<String>> {
        fs::create_dir_all(dir).await.map_err(|e| {
            StudioError::FilesystemError(format!(
                "cannot create output directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let token = batch_token();
        let mut written: Vec<PathBuf> = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            let name = format!("{}_{}_{}.{}", prefix, token, index, image.extension());
            let path = dir.join(&name);

            if let Err(e) = write_file(dir, &name, &image.data).await {
                cleanup(&written).await;
                return Err(StudioError::FilesystemError(format!(
                    "cannot write {}: {}",
                    path.display(),
                    e
                )));
            }
            log::info!("💾 Image saved to: {}", path.display());
            written.push(path);
        }

        Ok(written
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect())
    }

    /// Removes files returned by earlier `write_all` calls of the same request.
    pub async fn remove_all(&self, paths: &[String]) {
        cleanup(paths).await;
    }
}

/// Unlinks the hidden `.part` file unless disarmed, including when the write future is dropped.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Unix timestamp plus 8 random hex digits.
fn batch_token() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().timestamp(), &random[..8])
}

async fn write_file(dir: &Path, name: &str, data: &[u8]) -> std::io::Result<()> {
    let partial = PartialFile::new(dir.join(format!(".{}.part", name)));
    write_then_rename(&partial.path, &dir.join(name), data).await?;
    partial.disarm();
    Ok(())
}

async fn write_then_rename(partial: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(partial)
        .await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(partial, target).await
}

async fn cleanup<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        if let Err(e) = fs::remove_file(path).await {
            log::warn!("⚠️  Could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn images(n: usize) -> Vec<GeneratedImage> {
        (0..n)
            .map(|i| GeneratedImage::new(vec![i as u8 + 1; 16], "image/png"))
            .collect()
    }

    #[tokio::test]
    async fn test_writes_n_distinct_non_empty_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("output");
        let paths = ResultWriter::new()
            .write_all(&dir, "remixed_image", &images(3))
            .await
            .unwrap();

        assert_eq!(paths.len(), 3);
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), 3);
        for path in &paths {
            let meta = std::fs::metadata(path).unwrap();
            assert!(meta.len() > 0);
            assert!(path.ends_with(".png"));
        }
        let entries = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(entries, 3, "no .part leftovers");
    }

    #[tokio::test]
    async fn test_concurrent_batches_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new();
        let batch = images(2);
        let calls = (0..8).map(|_| writer.write_all(tmp.path(), "remixed_image", &batch));
        let results = futures::future::join_all(calls).await;

        let mut all = HashSet::new();
        for result in results {
            for path in result.unwrap() {
                assert!(all.insert(path));
            }
        }
        assert_eq!(all.len(), 16);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 16);
    }

    #[tokio::test]
    async fn test_remove_all_deletes_earlier_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new();
        let mut paths = writer
            .write_all(tmp.path(), "angle_front", &images(1))
            .await
            .unwrap();
        paths.extend(
            writer
                .write_all(tmp.path(), "angle_side", &images(2))
                .await
                .unwrap(),
        );

        writer.remove_all(&paths).await;
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dropped_partial_file_is_unlinked() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".img.png.part");
        std::fs::write(&path, b"half").unwrap();

        drop(PartialFile::new(path.clone()));
        assert!(!path.exists());

        std::fs::write(&path, b"done").unwrap();
        PartialFile::new(path.clone()).disarm();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let result = ResultWriter::new()
            .write_all(&blocker.join("nested"), "enhanced", &images(1))
            .await;
        assert!(matches!(result, Err(StudioError::FilesystemError(_))));
    }
}
