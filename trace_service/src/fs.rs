use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::block_range::BlockRange;

/// `<start>-<end>.conflated.<version>.lt`
pub fn conflated_trace_file_name(range: &BlockRange, engine_version: &str) -> String {
    format!(
        "{}-{}.conflated.{}.lt",
        range.start(),
        range.end(),
        engine_version
    )
}

pub fn conflated_trace_file_path(
    directory: &Path,
    range: &BlockRange,
    engine_version: &str,
) -> PathBuf {
    directory.join(conflated_trace_file_name(range, engine_version))
}

/// Writes `path` through a temporary file next to it, renamed into place
/// once `write` succeeded. On failure, neither file is left behind.
pub fn write_atomically<E, F>(path: &Path, write: F) -> Result<(), E>
where
    E: From<std::io::Error>,
    F: FnOnce(&mut BufWriter<File>) -> Result<(), E>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created output directory {}", parent.display());
        }
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let result = File::create(&partial)
        .map_err(E::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            write(&mut out)?;
            out.flush()?;
            Ok(())
        })
        .and_then(|()| std::fs::rename(&partial, path).map_err(E::from));
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}
