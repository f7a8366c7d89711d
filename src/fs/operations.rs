use std::{io::SeekFrom, path::Path};

use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::trace;

/// Reads the whole file while holding a shared lock.
pub async fn read_shared(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path).await?;
    file.lock_shared()?;
    let mut contents = String::new();
    let result = file.read_to_string(&mut contents).await;
    file.unlock_async().await?;
    result?;
    Ok(contents)
}

/// Writes `contents` into a file that must not exist yet.
pub async fn write_new(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let mut file = File::options()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(())
}

/// A file opened for a read-modify-write cycle. The exclusive lock is held from [Self::open]
/// until [Self::release]; dropping the handle closes the descriptor, which releases the lock too.
pub struct LockedFile {
    file: File,
}

impl LockedFile {
    pub async fn open(path: &Path) -> Result<Self, std::io::Error> {
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .await?;
        file.lock_exclusive()?;
        trace!("Locked {path:?}");
        Ok(Self { file })
    }

    pub async fn read_all(&mut self) -> Result<String, std::io::Error> {
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut contents = String::new();
        self.file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Replaces the whole file content.
    pub async fn replace(&mut self, contents: &[u8]) -> Result<(), std::io::Error> {
        self.file.seek(SeekFrom::Start(0)).await?;
        self.file.set_len(0).await?;
        self.file.write_all(contents).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(())
    }

    pub async fn release(self) -> Result<(), std::io::Error> {
        self.file.unlock_async().await
    }
}
