//! Compliance session state machine
//!
//! Phases run strictly in order and each one is gated by the previous step.
//! Tool, resource and prompt checks may complete in any order between
//! `CapabilitiesKnown` and `ErrorHandlingChecked`.

use super::mcp::ServerCapabilities;

/// Lifecycle states of one compliance session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Initialized,
    CapabilitiesKnown,
    /// At least one of tools/resources/prompts has been checked
    FeaturesChecked,
    ErrorHandlingChecked,
    Done,
    /// Handshake failed; dependent checks are skipped. Terminal.
    Aborted,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NotStarted => write!(f, "NotStarted"),
            SessionState::Initialized => write!(f, "Initialized"),
            SessionState::CapabilitiesKnown => write!(f, "CapabilitiesKnown"),
            SessionState::FeaturesChecked => write!(f, "FeaturesChecked"),
            SessionState::ErrorHandlingChecked => write!(f, "ErrorHandlingChecked"),
            SessionState::Done => write!(f, "Done"),
            SessionState::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Feature groups exercised after the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Tools,
    Resources,
    Prompts,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Tools, Feature::Resources, Feature::Prompts];

    /// Capability key advertised by the server for this feature
    pub fn capability(self) -> &'static str {
        match self {
            Feature::Tools => "tools",
            Feature::Resources => "resources",
            Feature::Prompts => "prompts",
        }
    }
}

/// Session context: state plus what the handshake told us
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    protocol_version: Option<String>,
    capabilities: Option<ServerCapabilities>,
    server_info: Option<(String, String)>,
    checked: Vec<Feature>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::NotStarted,
            protocol_version: None,
            capabilities: None,
            server_info: None,
            checked: Vec::new(),
        }
    }

    /// Whether the handshake completed, so the server may be driven further
    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, SessionState::NotStarted | SessionState::Aborted)
    }

    pub fn capabilities(&self) -> Option<&ServerCapabilities> {
        self.capabilities.as_ref()
    }

    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    pub fn server_info(&self) -> Option<(&str, &str)> {
        self.server_info
            .as_ref()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn transition_to(&mut self, new_state: SessionState) -> Result<(), StateTransitionError> {
        use SessionState::*;
        let valid = match (self.state, new_state) {
            (NotStarted, Initialized) => true,
            (Initialized, CapabilitiesKnown) => true,
            (CapabilitiesKnown, FeaturesChecked) => true,
            (FeaturesChecked, FeaturesChecked) => true,
            (CapabilitiesKnown | FeaturesChecked, ErrorHandlingChecked) => true,
            (ErrorHandlingChecked, Done) => true,
            (Done, _) | (Aborted, _) => false,
            (_, Aborted) => true,
            _ => false,
        };

        if valid {
            self.state = new_state;
            Ok(())
        } else {
            Err(StateTransitionError {
                from: self.state,
                to: new_state,
            })
        }
    }

    pub fn set_initialized(
        &mut self,
        protocol_version: String,
        server_name: String,
        server_version: String,
    ) -> Result<(), StateTransitionError> {
        self.transition_to(SessionState::Initialized)?;
        self.protocol_version = Some(protocol_version);
        self.server_info = Some((server_name, server_version));
        Ok(())
    }

    /// Capabilities are captured once and are read-only afterwards
    pub fn set_capabilities(
        &mut self,
        capabilities: ServerCapabilities,
    ) -> Result<(), StateTransitionError> {
        self.transition_to(SessionState::CapabilitiesKnown)?;
        self.capabilities = Some(capabilities);
        Ok(())
    }

    pub fn set_feature_checked(&mut self, feature: Feature) -> Result<(), StateTransitionError> {
        if self.checked.contains(&feature) {
            return Err(StateTransitionError {
                from: self.state,
                to: SessionState::FeaturesChecked,
            });
        }
        self.transition_to(SessionState::FeaturesChecked)?;
        self.checked.push(feature);
        Ok(())
    }

    pub fn set_error_handling_checked(&mut self) -> Result<(), StateTransitionError> {
        self.transition_to(SessionState::ErrorHandlingChecked)
    }

    pub fn finish(&mut self) -> Result<(), StateTransitionError> {
        self.transition_to(SessionState::Done)
    }

    pub fn abort(&mut self) {
        let _ = self.transition_to(SessionState::Aborted);
    }
}

/// Error when attempting an invalid state transition
#[derive(Debug, Clone)]
pub struct StateTransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

impl std::fmt::Display for StateTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid session transition from {} to {}",
            self.from, self.to
        )
    }
}

impl std::error::Error for StateTransitionError {}
