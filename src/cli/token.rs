use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the bot token (fallback, warned as insecure)
pub const TOKEN_ENV_VAR: &str = "SECURESTORE_BOT_TOKEN";

/// Modes for bot token delivery, checked in order
#[derive(Debug, PartialEq, Eq)]
pub enum TokenSource {
    /// From --token-file or token.txt next to the config
    File(PathBuf),
    /// From the SECURESTORE_BOT_TOKEN env var
    EnvVar,
    /// From stdin prompt (interactive, masked input)
    Stdin,
}

/// Determine token source
///
/// Priority: `--token-file` > env var > `default_file` if it exists > stdin
pub fn determine_token_source(token_file: Option<String>, default_file: &Path) -> TokenSource {
    if let Some(file) = token_file {
        TokenSource::File(PathBuf::from(file))
    } else if std::env::var(TOKEN_ENV_VAR).is_ok() {
        TokenSource::EnvVar
    } else if default_file.exists() {
        TokenSource::File(default_file.to_path_buf())
    } else {
        TokenSource::Stdin
    }
}

/// Read the bot token from the chosen source
pub fn read_token(source: TokenSource) -> Result<String, Box<dyn std::error::Error>> {
    let token = match source {
        TokenSource::File(path) => {
            if !path.exists() {
                return Err(format!("Token file not found: {}", path.display()).into());
            }
            fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read token file: {}", e))?
                .trim()
                .to_string()
        }
        TokenSource::EnvVar => {
            eprintln!("⚠️  WARNING: Using {} env var is less secure", TOKEN_ENV_VAR);
            eprintln!("   Consider using --token-file instead");
            eprintln!();

            std::env::var(TOKEN_ENV_VAR)
                .map_err(|_| format!("{} env var not set", TOKEN_ENV_VAR))?
                .trim()
                .to_string()
        }
        TokenSource::Stdin => rpassword::prompt_password("Enter Telegram bot token: ")
            .map_err(|e| format!("Failed to read token from stdin: {}", e))?
            .trim()
            .to_string(),
    };

    if token.is_empty() {
        return Err("Bot token cannot be empty".into());
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_token_from_file_trims() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.txt");
        fs::write(&path, "123456:ABC-def\n").unwrap();

        let token = read_token(TokenSource::File(path)).unwrap();
        assert_eq!(token, "123456:ABC-def");
    }

    #[test]
    fn test_read_token_missing_file() {
        let result = read_token(TokenSource::File(PathBuf::from("/nonexistent/token.txt")));
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_read_token_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.txt");
        fs::write(&path, "  \n").unwrap();

        assert!(read_token(TokenSource::File(path)).is_err());
    }

    #[test]
    fn test_explicit_file_wins() {
        let source = determine_token_source(
            Some("/run/secrets/token".to_string()),
            Path::new("/nonexistent/token.txt"),
        );
        assert_eq!(source, TokenSource::File(PathBuf::from("/run/secrets/token")));
    }

    #[test]
    fn test_default_file_used_when_present() {
        // Only meaningful when the env var is not set in the test environment
        if std::env::var(TOKEN_ENV_VAR).is_ok() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.txt");
        fs::write(&path, "token").unwrap();

        assert_eq!(determine_token_source(None, &path), TokenSource::File(path.clone()));
        assert_eq!(
            determine_token_source(None, &temp_dir.path().join("missing.txt")),
            TokenSource::Stdin
        );
    }
}
