// src/navigation.rs
use std::sync::{Arc, RwLock};

use crate::app_log;

/// Where the caller currently "is", and how to send it elsewhere.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect(&self, path: &str);
}

pub fn is_login_path(path: &str) -> bool {
    path.contains("/login")
}

/// Shared current-path cell; clones observe the same location.
#[derive(Debug, Clone)]
pub struct Location {
    path: Arc<RwLock<String>>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Arc::new(RwLock::new(path.into())),
        }
    }

    pub fn set(&self, path: impl Into<String>) {
        *self.path.write().unwrap_or_else(|e| e.into_inner()) = path.into();
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for Location {
    fn current_path(&self) -> String {
        self.path.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn redirect(&self, path: &str) {
        app_log!(warn, "Redirecting to {}", path);
        self.set(path);
    }
}
