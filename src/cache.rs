use bytes::Bytes;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::fs;

use crate::error::StorageError;
use crate::tile::Tile;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Whether a tile is present in the cache.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TileStatus {
    pub tile: Tile,
    pub cached: bool,
}

/// A directory tree of tiles laid out as `<root>/<z>/<x>/<y>.<ext>`.
///
/// Entries are write-once from the cache's point of view: a tile is either
/// absent or holds its complete blob. Writes go to a temporary file next to
/// the target and are renamed into place, so readers never see a partial tile.
/// Concurrent writers of the same tile are fine; the last rename wins.
#[derive(Clone, Debug, PartialEq)]
pub struct TileCache {
    root: PathBuf,
    extension: String,
}

impl TileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "png".to_owned(),
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_owned();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `tile` lives on disk, whether or not it is cached.
    pub fn path(&self, tile: &Tile) -> PathBuf {
        let mut target = self.root.join(tile.z.to_string());
        target.push(tile.x.to_string());
        target.push(format!("{}.{}", tile.y, self.extension));
        target
    }

    /// Creates the root directory if needed.
    pub async fn create_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.root.clone(),
                source,
            })
    }

    pub async fn exists(&self, tile: &Tile) -> Result<bool, StorageError> {
        let path = self.path(tile);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Stat { path, source }),
        }
    }

    /// Returns the cached blob, or `None` if the tile was never written.
    pub async fn read(&self, tile: &Tile) -> Result<Option<Bytes>, StorageError> {
        let path = self.path(tile);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    pub async fn write(&self, tile: &Tile, blob: &[u8]) -> Result<(), StorageError> {
        let path = self.path(tile);
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();

        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        let temp_path = dir.join(format!(
            ".{}.{}.{}-{}.tmp",
            tile.y,
            self.extension,
            process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(source) = fs::write(&temp_path, blob).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Write {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Write { path, source });
        }

        Ok(())
    }

    /// Reports the presence of `center` and every tile within `radius` of it.
    pub async fn neighbourhood(&self, center: &Tile, radius: u32) -> Result<Vec<TileStatus>, StorageError> {
        let mut statuses = Vec::new();
        for tile in center.neighbourhood(radius) {
            statuses.push(TileStatus {
                tile,
                cached: self.exists(&tile).await?,
            });
        }

        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn path_layout_is_zoom_x_y() {
        let cache = TileCache::new("map-data/tiles");
        assert_eq!(
            cache.path(&Tile::new(306705, 214998, 19)),
            Path::new("map-data/tiles/19/306705/214998.png")
        );

        let cache = cache.with_extension("jpg");
        assert_eq!(cache.path(&Tile::new(1, 2, 3)), Path::new("map-data/tiles/3/1/2.jpg"));
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path());
        let tile = Tile::new(5, 7, 4);

        assert!(!cache.exists(&tile).await.unwrap());
        assert_eq!(cache.read(&tile).await.unwrap(), None);

        cache.write(&tile, b"png bytes").await.unwrap();

        assert!(cache.exists(&tile).await.unwrap());
        assert_eq!(cache.read(&tile).await.unwrap().unwrap(), &b"png bytes"[..]);
        assert!(dir.path().join("4/5/7.png").is_file());
    }

    #[tokio::test]
    async fn leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path());
        let tile = Tile::new(1, 1, 1);

        cache.write(&tile, b"first").await.unwrap();
        cache.write(&tile, b"second").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path().join("1/1"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["1.png"]);
        assert_eq!(cache.read(&tile).await.unwrap().unwrap(), &b"second"[..]);
    }

    #[tokio::test]
    async fn directory_at_tile_path_is_not_a_tile() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path());
        let tile = Tile::new(0, 0, 0);
        std::fs::create_dir_all(cache.path(&tile)).unwrap();

        assert!(!cache.exists(&tile).await.unwrap());
    }

    #[tokio::test]
    async fn unwritable_root_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, b"not a directory").unwrap();
        let cache = TileCache::new(&root);

        assert!(matches!(
            cache.create_root().await,
            Err(StorageError::CreateDir { .. })
        ));
        assert!(matches!(
            cache.write(&Tile::new(0, 0, 1), b"x").await,
            Err(StorageError::CreateDir { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_partial_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(TileCache::new(dir.path()));
        let tile = Tile::new(3, 3, 3);
        let blob: Arc<Vec<u8>> = Arc::new((0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect());

        let writer = {
            let cache = cache.clone();
            let blob = blob.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    cache.write(&tile, &blob).await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                let blob = blob.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        if let Some(read) = cache.read(&tile).await.unwrap() {
                            assert_eq!(read.len(), blob.len());
                            assert_eq!(&read[..], &blob[..]);
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test]
    async fn neighbourhood_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(dir.path());
        let center = Tile::new(10, 10, 5);
        cache.write(&center, b"c").await.unwrap();
        cache.write(&Tile::new(11, 9, 5), b"ne").await.unwrap();

        let statuses = cache.neighbourhood(&center, 1).await.unwrap();
        assert_eq!(statuses.len(), 9);

        let cached: Vec<_> = statuses.iter().filter(|s| s.cached).map(|s| s.tile).collect();
        assert_eq!(cached, vec![Tile::new(10, 10, 5), Tile::new(11, 9, 5)]);
    }
}
