use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    /// A string parameter; empty strings count as absent.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn i64_param(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }
}

/// The open workspace. At most one is selected per daemon; selecting another
/// drops the previous connection.
#[derive(Default)]
pub struct AppState {
    workspace: Option<PathBuf>,
    db: Option<Connection>,
}

impl AppState {
    pub fn select_workspace(&mut self, path: PathBuf, conn: Connection) {
        self.workspace = Some(path);
        self.db = Some(conn);
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    pub fn conn(&self) -> Option<&Connection> {
        self.db.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(params: serde_json::Value) -> Request {
        serde_json::from_value(json!({ "id": "1", "method": "m", "params": params }))
            .expect("request")
    }

    #[test]
    fn params_default_to_null() {
        let r: Request =
            serde_json::from_value(json!({ "id": "1", "method": "health" })).expect("request");
        assert!(r.params.is_null());
        assert_eq!(r.str_param("path"), None);
    }

    #[test]
    fn empty_and_mistyped_params_are_absent() {
        let r = req(json!({ "year": "", "id": "12", "path": "/tmp/w" }));
        assert_eq!(r.str_param("year"), None);
        assert_eq!(r.i64_param("id"), None);
        assert_eq!(r.str_param("path"), Some("/tmp/w"));
    }

    #[test]
    fn selecting_a_workspace_replaces_the_previous_one() {
        let mut state = AppState::default();
        assert!(state.conn().is_none());
        state.select_workspace(
            PathBuf::from("/a"),
            Connection::open_in_memory().expect("open"),
        );
        state.select_workspace(
            PathBuf::from("/b"),
            Connection::open_in_memory().expect("open"),
        );
        assert_eq!(state.workspace(), Some(Path::new("/b")));
        assert!(state.conn().is_some());
    }
}
