//! Exit codes for the pi-core CLI.
//!
//! Exit codes communicate the failure category without requiring output
//! parsing. They are stable.

use pi_common::{Error, ErrorKind};

/// Exit codes for pi-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Install finished (including "nothing eligible")
    Ok = 0,

    /// Command line usage error (clap)
    Usage = 2,

    /// Configuration error
    ConfigError = 10,

    /// Plugin root could not be prepared
    DirectoryError = 20,

    /// Artifact could not be fetched
    DownloadError = 30,

    /// Archive could not be decoded
    ExtractionError = 40,

    /// I/O error
    IoError = 60,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Ok)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Config => ExitCode::ConfigError,
            ErrorKind::Directory => ExitCode::DirectoryError,
            ErrorKind::Download => ExitCode::DownloadError,
            ErrorKind::Extraction => ExitCode::ExtractionError,
            ErrorKind::Io => ExitCode::IoError,
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        err.kind().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_kinds_map_to_codes() {
        let cases = [
            (Error::Config("bad".into()), 10),
            (
                Error::directory("/p/bin", std::io::ErrorKind::PermissionDenied.into()),
                20,
            ),
            (
                Error::Download {
                    status: 404,
                    status_text: "Not Found".into(),
                    url: "http://x/y.zip".into(),
                },
                30,
            ),
            (
                Error::Transport {
                    url: "http://x/y.zip".into(),
                    message: "refused".into(),
                },
                30,
            ),
            (Error::InvalidArtifact("x".into()), 30),
            (
                Error::Extraction {
                    archive: PathBuf::from("a.zip"),
                    message: "bad".into(),
                },
                40,
            ),
            (Error::io("/x", std::io::ErrorKind::Other.into()), 60),
        ];
        for (err, code) in cases {
            let exit = ExitCode::from(&err);
            assert_eq!(exit.as_i32(), code, "{err}");
            assert!(exit.is_error());
        }
    }

    #[test]
    fn test_success_codes() {
        assert!(ExitCode::Ok.is_success());
        assert!(!ExitCode::Ok.is_error());
        assert!(!ExitCode::Usage.is_error());
        assert_eq!(i32::from(ExitCode::InternalError), 99);
    }
}
