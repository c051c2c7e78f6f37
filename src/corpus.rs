use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("file {} not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file {} is empty", .0.display())]
    Empty(PathBuf),
}

/// Roles and phrases loaded once at startup.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub roles: Vec<String>,
    pub phrases: Vec<String>,
}

impl Corpus {
    pub async fn load(roles: &Path, phrases: &Path) -> Result<Self, CorpusError> {
        Ok(Self {
            roles: load_lines(roles).await?,
            phrases: load_lines(phrases).await?,
        })
    }
}

/// Reads a file into its trimmed, non-blank lines. `\n`, `\r\n` and a lone
/// `\r` all end a line.
pub async fn load_lines(path: &Path) -> Result<Vec<String>, CorpusError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            CorpusError::NotFound(path.to_owned())
        } else {
            CorpusError::Io {
                path: path.to_owned(),
                source,
            }
        }
    })?;

    let lines: Vec<String> = text
        .split(['\r', '\n'])
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();

    if lines.is_empty() {
        return Err(CorpusError::Empty(path.to_owned()));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn trims_and_skips_blank_lines() {
        let file = file_with("  hello \n\n\t\nworld\r\n  \n");

        let lines = load_lines(file.path()).await.unwrap();

        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn carriage_returns_end_lines() {
        let file = file_with("first\rsecond\r\rthird\r\nfourth");

        let lines = load_lines(file.path()).await.unwrap();

        assert_eq!(lines, vec!["first", "second", "third", "fourth"]);
    }

    #[tokio::test]
    async fn keeps_duplicates_in_order() {
        let file = file_with("system\nuser\nsystem\n");

        let lines = load_lines(file.path()).await.unwrap();

        assert_eq!(lines, vec!["system", "user", "system"]);
    }

    #[tokio::test]
    async fn blank_only_file_is_empty() {
        let file = file_with("\n   \n\t\n");

        let err = load_lines(file.path()).await.unwrap_err();

        assert!(matches!(err, CorpusError::Empty(_)));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrases.txt");

        let err = load_lines(&path).await.unwrap_err();

        assert!(matches!(err, CorpusError::NotFound(ref p) if *p == path));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn load_fails_on_first_bad_file() {
        let roles = file_with("assistant\n");
        let phrases = file_with("");

        let err = Corpus::load(roles.path(), phrases.path()).await.unwrap_err();

        assert!(matches!(err, CorpusError::Empty(ref p) if p == phrases.path()));
    }
}
