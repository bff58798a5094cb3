//! Git operations and repository access.

pub mod commit;
pub mod repository;

pub use commit::{CommitRecord, FileDiffStat};
pub use repository::{GitRepository, StagedRecord};

/// Number of hex characters to show in abbreviated commit hashes.
pub const SHORT_HASH_LEN: usize = 8;

/// Maximum number of characters kept from a file content snapshot.
pub const SNAPSHOT_LIMIT: usize = 1000;

/// Number of leading bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 1024;

/// Returns a human-readable description for a porcelain status code.
pub fn status_description(status: &str) -> String {
    match status {
        "M" => "Modified".to_string(),
        "A" => "Added".to_string(),
        "D" => "Deleted".to_string(),
        "R" => "Renamed".to_string(),
        "C" => "Copied".to_string(),
        "U" => "Updated but unmerged".to_string(),
        "AM" => "Added and modified".to_string(),
        "MM" => "Modified in index and working tree".to_string(),
        "??" => "Untracked".to_string(),
        other => format!("Unknown status: {other}"),
    }
}

/// Checks whether a file looks binary by sniffing its first kilobyte for a
/// NUL byte. Unreadable files are treated as binary.
pub fn is_binary_file(path: &std::path::Path) -> bool {
    use std::io::Read;

    let Ok(file) = std::fs::File::open(path) else {
        return true;
    };

    let mut buf = [0u8; BINARY_SNIFF_LEN];
    let mut handle = file.take(BINARY_SNIFF_LEN as u64);
    match handle.read(&mut buf) {
        Ok(n) => buf[..n].contains(&0),
        Err(_) => true,
    }
}

/// Reads a truncated UTF-8 snapshot of a file, or `None` for binary and
/// unreadable files.
pub fn content_snapshot(path: &std::path::Path) -> Option<String> {
    if !path.exists() || is_binary_file(path) {
        return None;
    }

    let content = std::fs::read_to_string(path).ok()?;
    Some(truncate_chars(&content, SNAPSHOT_LIMIT))
}

/// Truncates a string to at most `limit` characters on a char boundary.
pub fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn status_descriptions_cover_common_codes() {
        assert_eq!(status_description("M"), "Modified");
        assert_eq!(status_description("??"), "Untracked");
        assert_eq!(status_description("ZZ"), "Unknown status: ZZ");
    }

    #[test]
    fn binary_detection_by_nul_byte() {
        let dir = TempDir::new().unwrap();

        let text = dir.path().join("plain.txt");
        fs::write(&text, "hello world\n").unwrap();
        assert!(!is_binary_file(&text));

        let binary = dir.path().join("blob.bin");
        fs::write(&binary, b"\x7fELF\x00\x01\x02").unwrap();
        assert!(is_binary_file(&binary));

        let missing = dir.path().join("missing");
        assert!(is_binary_file(&missing));
    }

    #[test]
    fn snapshot_is_truncated() {
        let dir = TempDir::new().unwrap();
        let long = dir.path().join("long.txt");
        fs::write(&long, "x".repeat(5000)).unwrap();

        let snapshot = content_snapshot(&long).unwrap();
        assert_eq!(snapshot.chars().count(), SNAPSHOT_LIMIT);
    }
}
