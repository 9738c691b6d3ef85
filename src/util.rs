//! Path utilities for statescout data directories.

use std::path::PathBuf;
use std::sync::OnceLock;

use url::Url;

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Pin the data directory. The first call wins for the lifetime of the
/// process; tests point this at a scratch directory before touching any
/// default session path.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let requested = custom_path.unwrap_or_else(default_data_dir);
    let active = DATA_DIR.get_or_init(|| requested.clone());
    if *active != requested {
        tracing::debug!(
            requested = %requested.display(),
            active = %active.display(),
            "Data directory already pinned"
        );
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".statescout"))
        .unwrap_or_else(|| PathBuf::from(".statescout"))
}

/// Active data directory: the pinned path, else `~/.statescout`.
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Where default-named session files live.
pub fn sessions_dir() -> PathBuf {
    data_dir().join("sessions")
}

/// Sanitize the host portion of an application URL into a file-name
/// friendly token. Used to derive default session file paths.
pub fn sanitize_host(app_url: &str) -> String {
    let host = Url::parse(app_url)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(match u.port() {
                Some(port) => format!("{host}-{port}"),
                None => host,
            })
        })
        .unwrap_or_else(|| app_url.to_string());

    let sanitized: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = sanitized.trim_matches('-');
    if trimmed.is_empty() {
        "session".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_host() {
        assert_eq!(sanitize_host("http://localhost:3000/app"), "localhost-3000");
        assert_eq!(sanitize_host("https://todo.example.com/"), "todo.example.com");
        assert_eq!(sanitize_host("not a url"), "not-a-url");
        assert_eq!(sanitize_host(""), "session");
    }
}
