// src/role.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Jobseeker,
    Recruiter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Jobseeker => "jobseeker",
            Role::Recruiter => "recruiter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jobseeker" => Ok(Role::Jobseeker),
            "recruiter" => Ok(Role::Recruiter),
            other => anyhow::bail!("Unknown role: {}. Use jobseeker or recruiter", other),
        }
    }
}

/// The active role context shared by every request of a client.
///
/// Cloning yields another handle to the same cell. Starts unset and only
/// changes through [`RoleContext::set`]; nothing resets it implicitly.
#[derive(Debug, Clone, Default)]
pub struct RoleContext {
    inner: Arc<RwLock<Option<Role>>>,
}

impl RoleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, role: Option<Role>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = role;
    }

    pub fn get(&self) -> Option<Role> {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}
