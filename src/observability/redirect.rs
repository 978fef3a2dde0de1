//! Process output redirection.
//!
//! Once [`redirect_std_streams`] succeeds, file descriptors 1 and 2 refer
//! to the log file until the process exits. There is no way back.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::unistd::dup2;

const STDOUT_FD: RawFd = 1;
const STDERR_FD: RawFd = 2;

/// Error type for output redirection.
#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to redirect output to {path}: {source}")]
    Dup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Open the log file for appending, creating it with mode 0644.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o644)
        .open(path)
}

/// Point every descriptor in `targets` at the file behind `source`.
pub fn redirect_fds<F: AsRawFd>(source: &F, targets: &[RawFd]) -> io::Result<()> {
    for &target in targets {
        dup2(source.as_raw_fd(), target)?;
    }
    Ok(())
}

/// Redirect the process's stdout and stderr to `path`.
///
/// The opened descriptor itself is closed again before returning; only the
/// duplicates on 1 and 2 stay open.
pub fn redirect_std_streams(path: &Path) -> Result<(), RedirectError> {
    let file = open_log_file(path).map_err(|source| RedirectError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    redirect_fds(&file, &[STDOUT_FD, STDERR_FD]).map_err(|source| RedirectError::Dup {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_land_in_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("app.log");
        fs::write(&log_path, "earlier line\n").unwrap();

        let log = open_log_file(&log_path).unwrap();
        let mut stand_in = tempfile::tempfile().unwrap();
        redirect_fds(&log, &[stand_in.as_raw_fd()]).unwrap();
        drop(log);

        writeln!(stand_in, "after redirect").unwrap();
        stand_in.flush().unwrap();

        let contents = fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents, "earlier line\nafter redirect\n");
    }

    #[test]
    fn log_file_created_with_mode_0644() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("fresh.log");
        open_log_file(&log_path).unwrap();

        let mode = fs::metadata(&log_path).unwrap().permissions().mode();
        // umask may clear bits, never add them
        assert_eq!(mode & !0o644 & 0o777, 0);
        assert!(mode & 0o600 == 0o600);
    }

    #[test]
    fn unopenable_log_file_fails_before_redirecting() {
        let err = redirect_std_streams(Path::new("/nonexistent-dir/httpserv.log")).unwrap_err();
        assert!(matches!(err, RedirectError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent-dir/httpserv.log"));
    }
}
