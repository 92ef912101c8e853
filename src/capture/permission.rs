use tracing::warn;

/// Microphone permission as observed for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Not yet probed
    Unknown,
    /// Device opened successfully at least once
    Granted,
    /// Device open failed; voice input unavailable until re-requested
    Denied,
}

/// Tracks whether the microphone has been requested this session.
///
/// The gate is asked once per session object: a denial is sticky and routes
/// the user to the typed fallback until `reset()` is called explicitly.
/// `mark_requested()` additionally guards auto-start so a re-created UI
/// cannot fire it twice.
#[derive(Debug)]
pub struct PermissionGate {
    state: PermissionState,
    requested: bool,
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionGate {
    pub fn new() -> Self {
        Self {
            state: PermissionState::Unknown,
            requested: false,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    /// Whether a request (or auto-start) has already fired
    pub fn requested(&self) -> bool {
        self.requested
    }

    /// Record that a request is about to fire; returns false if one already did
    pub fn mark_requested(&mut self) -> bool {
        if self.requested {
            return false;
        }
        self.requested = true;
        true
    }

    pub fn grant(&mut self) {
        self.requested = true;
        self.state = PermissionState::Granted;
    }

    pub fn deny(&mut self) {
        if self.state != PermissionState::Denied {
            warn!("Microphone permission denied; routing to typed fallback");
        }
        self.requested = true;
        self.state = PermissionState::Denied;
    }

    /// Explicit re-trigger: forget the denial and allow one more probe
    pub fn reset(&mut self) {
        self.state = PermissionState::Unknown;
        self.requested = false;
    }
}
