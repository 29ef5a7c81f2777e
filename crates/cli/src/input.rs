use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

/// Read the whole command list from `file`, or standard input when `None`.
pub async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("Failed to read standard input")?;
            Ok(content)
        }
    }
}

/// Split raw input into command lines, dropping blank ones.
pub fn split_lines(content: &str, null_separated: bool) -> Vec<String> {
    let separator = if null_separated { '\0' } else { '\n' };

    content
        .split(separator)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_newlines() {
        let lines = split_lines("echo a\r\n\n  \necho b\necho c", false);
        assert_eq!(lines, vec!["echo a", "echo b", "echo c"]);
    }

    #[test]
    fn test_split_nul() {
        let lines = split_lines("printf 'a\nb'\0echo c\0", true);
        assert_eq!(lines, vec!["printf 'a\nb'", "echo c"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_lines("", false).is_empty());
        assert!(split_lines("\n\n", false).is_empty());
    }

    #[tokio::test]
    async fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.txt");
        std::fs::write(&path, "true\nfalse\n").unwrap();

        let content = read_input(Some(path.as_path())).await.unwrap();
        assert_eq!(split_lines(&content, false), vec!["true", "false"]);
    }
}
