//! 原子写入工具。
//!
//! 先写入同目录下的临时文件并 fsync，成功后再 rename 替换目标，
//! 写入中途失败不会留下半截的密钥文件。
//! Unix 下文件权限固定为 0600。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 临时文件名冲突时最多换名重试的次数
const TMP_ATTEMPTS: usize = 8;

/// 以原子方式写入完整内容
pub fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = target.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "target path has no parent directory",
        )
    })?;

    fs::create_dir_all(parent)?;

    let tmp_path = create_tmp(parent, target, contents)?;

    // rename 在同一文件系统内覆盖目标是原子的
    fs::rename(&tmp_path, target)?;

    Ok(())
}

/// 写好临时文件并返回其路径
///
/// 崩溃残留的同名临时文件不会被覆盖，也不会阻塞写入：换一个名字重试。
fn create_tmp(parent: &Path, target: &Path, contents: &[u8]) -> io::Result<PathBuf> {
    let mut attempt = 0;

    loop {
        let tmp_path = build_tmp_path(parent, target);

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt + 1 < TMP_ATTEMPTS => {
                attempt += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Err(err) = write_tmp(file, contents) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        return Ok(tmp_path);
    }
}

fn write_tmp(mut file: File, contents: &[u8]) -> io::Result<()> {

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(contents)?;
    file.sync_all()
}

fn build_tmp_path(parent: &Path, target: &Path) -> PathBuf {
    let base_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("journal-engine");

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);

    parent.join(format!(
        ".{base_name}.tmp-{}-{timestamp}-{counter}",
        std::process::id()
    ))
}
