//! Writes received files into a directory

use std::io;
use std::path::{Component, Path, PathBuf};

use swimu_client::FileSink;
use tracing::debug;

/// Stores each file under its device-supplied name in one directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Sink writing into `dir`, created on first store
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

/// Names come from the device and must be a single plain file name
fn check_name(name: &str) -> io::Result<()> {
    let mut components = Path::new(name).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    // `components` hides a trailing slash, and a backslash is only a
    // separator on Windows
    if !plain || name.contains(['/', '\\']) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing file name {name:?}"),
        ));
    }
    Ok(())
}

impl FileSink for DirectorySink {
    async fn store(&mut self, name: &str, data: Vec<u8>) -> io::Result<()> {
        check_name(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, &data).await?;
        debug!(path = %path.display(), bytes = data.len(), "file written");
        self.written.push(path);
        Ok(())
    }
}
