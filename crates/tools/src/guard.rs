//! Path capability guard for file-reading tools.
//!
//! The deny list targets credential material: env files, key files,
//! anything under the usual secrets directories.  Rejections come back
//! as a standardized error string, never a raised error, so the model
//! sees a recoverable tool failure.

use std::path::Path;

/// Basename substrings that mark a file as sensitive.
const DENIED_NAME_FRAGMENTS: &[&str] = &[
    "id_rsa",
    "id_ed25519",
    "private_key",
    "secret_key",
    "credentials",
    "private",
    "secret",
    "credential",
];

/// Basename suffixes that mark a file as key material.
const DENIED_SUFFIXES: &[&str] = &[".key", ".p12", ".pfx"];

/// Directory fragments that mark the whole subtree as sensitive.
const DENIED_DIR_FRAGMENTS: &[&str] = &[".ssh/", ".aws/", ".kube/"];

/// Check a path against the capability deny list.
///
/// `Err` carries the standardized rejection string the tool returns as
/// its result content.
pub fn guard_path(path: &str) -> std::result::Result<(), String> {
    let basename = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    let basename_lower = basename.to_ascii_lowercase();
    let path_lower = path.to_ascii_lowercase();

    let denied = basename_lower.starts_with(".env")
        || DENIED_NAME_FRAGMENTS
            .iter()
            .any(|frag| basename_lower.contains(frag))
        || DENIED_SUFFIXES
            .iter()
            .any(|suffix| basename_lower.ends_with(suffix))
        || DENIED_DIR_FRAGMENTS
            .iter()
            .any(|frag| path_lower.contains(frag));

    if denied {
        Err(format!("Error: access to '{path}' is denied by policy"))
    } else {
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_files_are_denied() {
        assert!(guard_path(".env").is_err());
        assert!(guard_path("project/.env.local").is_err());
        assert!(guard_path("project/.environment").is_err());
    }

    #[test]
    fn key_material_names_are_denied() {
        for path in [
            "~/.ssh/id_rsa",
            "id_ed25519.pub",
            "service_private_key.json",
            "aws_credentials",
            "my-secret-notes.txt",
        ] {
            assert!(guard_path(path).is_err(), "{path} should be denied");
        }
    }

    #[test]
    fn key_suffixes_are_denied() {
        assert!(guard_path("server.key").is_err());
        assert!(guard_path("bundle.p12").is_err());
        assert!(guard_path("cert.pfx").is_err());
    }

    #[test]
    fn secrets_directories_are_denied() {
        assert!(guard_path("/home/user/.ssh/known_hosts").is_err());
        assert!(guard_path("/home/user/.aws/config").is_err());
        assert!(guard_path("/home/user/.kube/config").is_err());
    }

    #[test]
    fn ordinary_files_pass() {
        for path in ["README.md", "src/main.rs", "data/notes.txt", "Cargo.toml"] {
            assert!(guard_path(path).is_ok(), "{path} should pass");
        }
    }

    #[test]
    fn rejection_is_a_standardized_string() {
        let err = guard_path(".env").unwrap_err();
        assert!(err.starts_with("Error: "));
        assert!(err.contains(".env"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(guard_path("SERVER.KEY").is_err());
        assert!(guard_path("My_Secret.txt").is_err());
    }
}
