//! 目录型持久化密钥存储
//!
//! 每个标识对应目录下的一个文件，写入走 fs::atomic。
//! 相当于浏览器中按 origin 隔离的 localStorage：一个目录即一个存储域。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::KeyStorage;
use crate::error::JournalError;
use crate::fs::atomic::write_atomic;

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// 打开（必要时创建）存储目录
    ///
    /// 目录无法创建时返回 EnvironmentUnavailable。
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let dir = dir.into();

        fs::create_dir_all(&dir).map_err(|e| {
            JournalError::EnvironmentUnavailable(format!(
                "cannot prepare key directory {}: {e}",
                dir.display()
            ))
        })?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &str) -> Result<PathBuf, JournalError> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage identifier: {id:?}"),
            )
            .into());
        }

        Ok(self.dir.join(id))
    }
}

impl KeyStorage for FileStorage {
    fn load(&self, id: &str) -> Result<Option<String>, JournalError> {
        let path = self.entry_path(id)?;

        match fs::read(&path) {
            // 非 UTF-8 内容交给上层按“无法解析”处理
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, id: &str, value: &str) -> Result<(), JournalError> {
        let path = self.entry_path(id)?;
        write_atomic(&path, value.as_bytes())?;
        Ok(())
    }
}
