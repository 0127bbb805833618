// SPDX-License-Identifier: GPL-3.0-only

//! Camera and microphone permission gate
//!
//! The platform permission subsystem lives outside this crate. The session
//! only needs to check a permission and, when it is still undetermined,
//! request it. Microphone access is requested lazily, the first time a
//! recording with audio is started.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Kind of protected resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Camera,
    Microphone,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 2] = [PermissionKind::Camera, PermissionKind::Microphone];

    pub fn display_name(&self) -> &'static str {
        match self {
            PermissionKind::Camera => "Camera",
            PermissionKind::Microphone => "Microphone",
        }
    }
}

/// Permission state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not determined yet, a request will prompt the user
    #[default]
    Prompt,
}

/// Caller-visible summary returned by `check_permissions`/`request_permissions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub camera: PermissionState,
    pub microphone: PermissionState,
}

/// Platform permission subsystem
pub trait PermissionProvider: Send + Sync {
    /// Current state without prompting
    fn check(&self, kind: PermissionKind) -> PermissionState;

    /// Prompt the user if needed and resolve with the resulting state
    fn request(&self, kind: PermissionKind) -> BoxFuture<'_, PermissionState>;
}

/// In-memory permission provider
///
/// Useful for headless hosts and tests. Undetermined permissions resolve to
/// the configured prompt outcome when requested.
pub struct MemoryPermissions {
    states: Mutex<HashMap<PermissionKind, PermissionState>>,
    prompt_outcome: PermissionState,
}

impl MemoryPermissions {
    /// Everything granted
    pub fn granted() -> Self {
        Self::with_states(PermissionState::Granted, PermissionState::Granted)
    }

    pub fn with_states(camera: PermissionState, microphone: PermissionState) -> Self {
        let states = HashMap::from([
            (PermissionKind::Camera, camera),
            (PermissionKind::Microphone, microphone),
        ]);
        Self {
            states: Mutex::new(states),
            prompt_outcome: PermissionState::Granted,
        }
    }

    /// Set what an undetermined permission resolves to when requested
    pub fn prompt_outcome(mut self, outcome: PermissionState) -> Self {
        self.prompt_outcome = outcome;
        self
    }

    pub fn set(&self, kind: PermissionKind, state: PermissionState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(kind, state);
    }
}

impl Default for MemoryPermissions {
    fn default() -> Self {
        Self::granted()
    }
}

impl PermissionProvider for MemoryPermissions {
    fn check(&self, kind: PermissionKind) -> PermissionState {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(&kind).copied().unwrap_or_default()
    }

    fn request(&self, kind: PermissionKind) -> BoxFuture<'_, PermissionState> {
        Box::pin(async move {
            let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
            let state = states.entry(kind).or_default();
            if *state == PermissionState::Prompt {
                *state = self.prompt_outcome;
                debug!(?kind, outcome = ?state, "Permission prompt resolved");
            }
            *state
        })
    }
}

/// Check, and request if undetermined
pub(crate) async fn ensure(provider: &dyn PermissionProvider, kind: PermissionKind) -> bool {
    match provider.check(kind) {
        PermissionState::Granted => true,
        PermissionState::Denied => false,
        PermissionState::Prompt => provider.request(kind).await == PermissionState::Granted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prompt_resolves_once() {
        let permissions = MemoryPermissions::with_states(
            PermissionState::Granted,
            PermissionState::Prompt,
        )
        .prompt_outcome(PermissionState::Denied);

        assert!(!ensure(&permissions, PermissionKind::Microphone).await);
        assert_eq!(
            permissions.check(PermissionKind::Microphone),
            PermissionState::Denied
        );
        assert!(ensure(&permissions, PermissionKind::Camera).await);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let status = PermissionStatus {
            camera: PermissionState::Granted,
            microphone: PermissionState::Prompt,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"camera":"granted","microphone":"prompt"}"#);
    }
}
