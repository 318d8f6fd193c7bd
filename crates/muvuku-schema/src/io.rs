use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::diagnostics::{Detail, Diagnostic, DiagnosticCode, Phase};

fn path_detail(path: &Path) -> Detail {
    Detail::Path {
        path: path.display().to_string(),
    }
}

pub fn read_file(path: &Path) -> Result<String, Diagnostic> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Diagnostic::error(DiagnosticCode::MVK0001ReadFailed, Phase::Read, path_detail(path))
            .with_message(format!("unable to read file: {e}"))
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "read input");
    Ok(text)
}

pub fn write_file(path: &Path, contents: &str) -> Result<(), Diagnostic> {
    let fail = |e: std::io::Error| {
        Diagnostic::error(DiagnosticCode::MVK0003WriteFailed, Phase::Write, path_detail(path))
            .with_message(format!("unable to open file for writing: {e}"))
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    std::fs::write(path, contents.as_bytes()).map_err(fail)?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(())
}

/// Run `job` for every index in `0..count` on up to `jobs` threads and gather
/// the results by index, so output order always matches input order.
///
/// The first failure stops workers from picking up new indices; jobs already
/// running are still joined before it is returned.
pub fn gather<T, F>(count: usize, jobs: usize, job: F) -> Result<Vec<T>, Diagnostic>
where
    T: Send,
    F: Fn(usize) -> Result<T, Diagnostic> + Sync,
{
    if count == 0 {
        return Ok(Vec::new());
    }

    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<T>>> = Mutex::new((0..count).map(|_| None).collect());
    let first_err: Mutex<Option<Diagnostic>> = Mutex::new(None);

    std::thread::scope(|scope| {
        let workers = jobs.clamp(1, count);
        for _ in 0..workers {
            scope.spawn(|| loop {
                if let Ok(guard) = first_err.lock() {
                    if guard.is_some() {
                        return;
                    }
                }
                let idx = next.fetch_add(1, Ordering::Relaxed);
                if idx >= count {
                    return;
                }
                match job(idx) {
                    Ok(v) => {
                        if let Ok(mut guard) = slots.lock() {
                            guard[idx] = Some(v);
                        }
                    }
                    Err(err) => {
                        if let Ok(mut guard) = first_err.lock() {
                            if guard.is_none() {
                                *guard = Some(err);
                            }
                        }
                        return;
                    }
                }
            });
        }
    });

    if let Some(err) = first_err.into_inner().unwrap_or_else(|e| e.into_inner()) {
        return Err(err);
    }
    Ok(slots
        .into_inner()
        .unwrap_or_else(|e| e.into_inner())
        .into_iter()
        .flatten()
        .collect())
}

pub fn read_all(paths: &[PathBuf], jobs: usize) -> Result<Vec<String>, Diagnostic> {
    gather(paths.len(), jobs, |i| read_file(&paths[i]))
}

pub fn write_all(outputs: &[(PathBuf, String)], jobs: usize) -> Result<(), Diagnostic> {
    gather(outputs.len(), jobs, |i| {
        let (path, contents) = &outputs[i];
        write_file(path, contents)
    })?;
    Ok(())
}
