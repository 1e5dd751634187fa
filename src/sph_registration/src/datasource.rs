//! Push-style delivery of point clouds.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{RegistrationError, Result};
use crate::io::read_ply;
use crate::model::PointCloud;

/// Callback receiving one cloud at a time.
pub type CloudCallback = Box<dyn FnMut(PointCloud) -> anyhow::Result<()> + Send>;

/// Source of a sequence of point clouds.
pub trait Datasource {
    /// Register a callback invoked for every delivered cloud, in order.
    fn subscribe(&mut self, callback: CloudCallback);

    /// Deliver the clouds starting at index `offset`.
    ///
    /// # Returns
    /// Number of clouds delivered.
    fn start_streaming(&mut self, offset: usize) -> anyhow::Result<usize>;
}

/// Every `*.ply` file of one directory, in lexical file name order.
pub struct PlyDirectorySource {
    directory: PathBuf,
    callbacks: Vec<CloudCallback>,
}

impl PlyDirectorySource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            callbacks: Vec::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Sorted PLY paths of the directory.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let entries =
            fs::read_dir(&self.directory).map_err(|e| RegistrationError::io(&self.directory, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| RegistrationError::io(&self.directory, e))?.path();
            let is_ply = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ply"));
            if path.is_file() && is_ply {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Datasource for PlyDirectorySource {
    fn subscribe(&mut self, callback: CloudCallback) {
        self.callbacks.push(callback);
    }

    fn start_streaming(&mut self, offset: usize) -> anyhow::Result<usize> {
        let files = self.files()?;
        info!(
            "Streaming {} clouds from {} starting at {}",
            files.len().saturating_sub(offset),
            self.directory.display(),
            offset
        );

        let mut delivered = 0;
        for path in files.iter().skip(offset) {
            let cloud = read_ply(path)?;
            debug!("Delivering {} ({} points)", path.display(), cloud.len());
            for callback in &mut self.callbacks {
                callback(cloud.clone())?;
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_ply;
    use crate::model::Point;
    use std::sync::{Arc, Mutex};

    fn cloud_with(n: usize) -> PointCloud {
        (0..n).map(|i| Point::new(i as f32 + 1.0, 0.0, 0.0, 1.0)).collect()
    }

    #[test]
    fn test_streams_in_order_from_offset() {
        let dir = tempfile::tempdir().unwrap();
        for (name, n) in [("b.ply", 2), ("a.ply", 1), ("c.ply", 3)] {
            write_ply(dir.path().join(name), &cloud_with(n)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "not a cloud").unwrap();

        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let mut source = PlyDirectorySource::new(dir.path());
        source.subscribe(Box::new(move |cloud: PointCloud| {
            sink.lock().unwrap().push(cloud.len());
            Ok(())
        }));

        assert_eq!(source.start_streaming(1).unwrap(), 2);
        assert_eq!(*sizes.lock().unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_callback_error_stops_streaming() {
        let dir = tempfile::tempdir().unwrap();
        write_ply(dir.path().join("a.ply"), &cloud_with(1)).unwrap();
        write_ply(dir.path().join("b.ply"), &cloud_with(1)).unwrap();

        let mut source = PlyDirectorySource::new(dir.path());
        source.subscribe(Box::new(|_: PointCloud| -> anyhow::Result<()> {
            anyhow::bail!("stop")
        }));
        assert!(source.start_streaming(0).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let mut source = PlyDirectorySource::new("/nonexistent/clouds");
        assert!(source.start_streaming(0).is_err());
    }
}
