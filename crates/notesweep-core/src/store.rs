use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Todoist REST endpoint the HTTP store talks to unless configured otherwise.
pub const DEFAULT_BASE_URL: &str = "https://api.todoist.com/rest/v2";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Task store returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Tracker token is empty")]
    EmptyToken,
    #[error("Token file {path} has overly broad permissions ({mode:03o})")]
    TokenFilePermissions { path: String, mode: u32 },
    #[error("Failed to read token file {path}: {source}")]
    TokenFileIo {
        path: String,
        source: std::io::Error,
    },
}

/// An existing open item in the external store. Read-only to this crate.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTask {
    pub content: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTask {
    pub url: String,
}

/// The remote task-store collaborator.
///
/// `create_task` failures are ordinary error values; callers must check them
/// before touching the originating note.
pub trait TaskStore {
    fn list_open_tasks(&self) -> Result<Vec<RemoteTask>, StoreError>;
    fn create_task(
        &self,
        content: &str,
        description: &str,
        due: Option<&str>,
    ) -> Result<CreatedTask, StoreError>;
}

/// Bearer-token client for a Todoist-style REST API.
pub struct HttpTaskStore {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl HttpTaskStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, StoreError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(StoreError::EmptyToken);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

impl TaskStore for HttpTaskStore {
    fn list_open_tasks(&self) -> Result<Vec<RemoteTask>, StoreError> {
        let response = self
            .client
            .get(format!("{}/tasks", self.base_url))
            .bearer_auth(&self.token)
            .send()?;
        Ok(Self::check_status(response)?.json()?)
    }

    fn create_task(
        &self,
        content: &str,
        description: &str,
        due: Option<&str>,
    ) -> Result<CreatedTask, StoreError> {
        let mut body = serde_json::json!({
            "content": content,
            "description": description,
        });
        if let Some(due) = due {
            body["due_string"] = serde_json::Value::String(due.to_string());
        }
        let response = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        Ok(Self::check_status(response)?.json()?)
    }
}

/// Read an API token from a file, refusing files other users could read.
pub fn load_token_file(path: &Path) -> Result<String, StoreError> {
    check_token_file_mode(path)?;
    let text = fs::read_to_string(path).map_err(|source| StoreError::TokenFileIo {
        path: path.display().to_string(),
        source,
    })?;
    let token = text.trim().to_string();
    if token.is_empty() {
        return Err(StoreError::EmptyToken);
    }
    Ok(token)
}

#[cfg(unix)]
fn check_token_file_mode(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path).map_err(|source| StoreError::TokenFileIo {
        path: path.display().to_string(),
        source,
    })?;
    let mode = metadata.permissions().mode() & 0o777;
    // Group may at most read; the world gets nothing.
    if mode & 0o027 != 0 {
        return Err(StoreError::TokenFilePermissions {
            path: path.display().to_string(),
            mode,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_token_file_mode(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// In-memory store for tests: serves a fixed open-task snapshot and records
/// creations. Single-threaded by construction, like the pipeline itself.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: Vec<RemoteTask>,
    created: RefCell<Vec<RemoteTask>>,
    fail_create_matching: Option<String>,
    fail_listing: bool,
}

impl MemoryStore {
    pub fn with_tasks(tasks: Vec<RemoteTask>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    /// Reject any create whose content contains `needle`.
    pub fn failing_create_on(mut self, needle: &str) -> Self {
        self.fail_create_matching = Some(needle.to_string());
        self
    }

    /// Fail the initial open-task listing.
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn created(&self) -> Vec<RemoteTask> {
        self.created.borrow().clone()
    }
}

impl TaskStore for MemoryStore {
    fn list_open_tasks(&self) -> Result<Vec<RemoteTask>, StoreError> {
        if self.fail_listing {
            return Err(StoreError::Api {
                status: 503,
                body: "memory store: listing rejected".to_string(),
            });
        }
        Ok(self.tasks.clone())
    }

    fn create_task(
        &self,
        content: &str,
        _description: &str,
        _due: Option<&str>,
    ) -> Result<CreatedTask, StoreError> {
        if let Some(needle) = &self.fail_create_matching {
            if content.contains(needle.as_str()) {
                return Err(StoreError::Api {
                    status: 503,
                    body: "memory store: create rejected".to_string(),
                });
            }
        }
        let id = self.tasks.len() + self.created.borrow().len() + 1;
        let url = format!("https://tracker.invalid/task/{id}");
        self.created.borrow_mut().push(RemoteTask {
            content: content.to_string(),
            url: url.clone(),
        });
        Ok(CreatedTask { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn http_store_rejects_empty_token() {
        let err = HttpTaskStore::new(DEFAULT_BASE_URL, "  ").expect_err("empty token");
        assert!(matches!(err, StoreError::EmptyToken));
    }

    #[test]
    fn http_store_trims_trailing_slash_from_base_url() {
        let store =
            HttpTaskStore::new("https://tracker.invalid/rest/", "token").expect("store");
        assert_eq!(store.base_url, "https://tracker.invalid/rest");
    }

    #[test]
    fn memory_store_records_creations() {
        let store = MemoryStore::default();
        let created = store
            .create_task("Feed dog", "from inbox", None)
            .expect("create");
        assert!(created.url.contains("/task/1"));
        assert_eq!(store.created().len(), 1);
        assert_eq!(store.created()[0].content, "Feed dog");
    }

    #[test]
    fn memory_store_can_fail_selectively() {
        let store = MemoryStore::default().failing_create_on("dog");
        assert!(store.create_task("Feed dog", "", None).is_err());
        assert!(store.create_task("Buy milk", "", None).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn token_file_with_broad_permissions_is_rejected() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("token");
        fs::write(&path, "secret-token\n").expect("write token");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        let err = load_token_file(&path).expect_err("world-readable");
        assert!(matches!(err, StoreError::TokenFilePermissions { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn token_file_with_tight_permissions_is_read_and_trimmed() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("token");
        fs::write(&path, "secret-token\n").expect("write token");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod");

        assert_eq!(load_token_file(&path).expect("token"), "secret-token");
    }

    #[cfg(unix)]
    #[test]
    fn empty_token_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("token");
        fs::write(&path, "\n").expect("write token");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod");

        let err = load_token_file(&path).expect_err("empty token");
        assert!(matches!(err, StoreError::EmptyToken));
    }
}
