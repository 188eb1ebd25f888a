use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tempfile::NamedTempFile;

/// Replaces `path` with `contents` (newline-terminated) via a sibling temp
/// file, so a crash never leaves a half-written config behind.
pub fn write_atomic_text(path: &Path, contents: &str) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create config dir {}", parent.display()))?;

    let mut staged = NamedTempFile::new_in(parent).context("stage config write")?;
    let terminator: &[u8] = if contents.ends_with('\n') { b"" } else { b"\n" };
    staged
        .write_all(contents.as_bytes())
        .context("write staged config")?;
    staged
        .write_all(terminator)
        .context("write staged config")?;
    staged.flush().context("flush staged config")?;

    staged
        .persist(path)
        .map_err(|err| anyhow::Error::new(err.error))
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn creates_missing_dirs_and_terminates_with_newline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".smart-sticker").join("config.toml");

        write_atomic_text(&path, "[giphy]").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "[giphy]\n");
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "old = 1\n").expect("seed");

        write_atomic_text(&path, "new = 2\n").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new = 2\n");
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 1);
    }
}
