// Client configuration.
//
// `ClientConfig` says where to connect and who to be; the agent's own
// tunables are nested under `agent`. The binary loads it from a JSON file
// (`--config`) and then lets individual command-line flags override fields.
// Keys missing from the file keep their defaults.
//
// See also: `main.rs` for flag parsing, `blockbot_agent::config` for
// `AgentConfig`.

use std::path::{Path, PathBuf};

use blockbot_agent::AgentConfig;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Account password for the session service; also sent as the server
    /// password at login.
    pub password: Option<String>,
    /// Protocol revision announced at login.
    pub protocol: i32,
    /// JSON file backing the named-location store. In-memory if unset.
    pub locations_path: Option<PathBuf>,
    pub agent: AgentConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 25565,
            username: "blockbot".into(),
            password: None,
            protocol: 14,
            locations_path: None,
            agent: AgentConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        serde_json::from_str(json).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// `host:port` for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 25565);
        assert_eq!(config.protocol, 14);
        assert_eq!(config.address(), "localhost:25565");
        assert_eq!(config.agent, AgentConfig::default());
    }

    #[test]
    fn nested_agent_overrides() {
        let config = ClientConfig::from_json(
            r#"{ "host": "mc.example.net", "agent": { "tick_ms": 50 } }"#,
        )
        .unwrap();
        assert_eq!(config.host, "mc.example.net");
        assert_eq!(config.port, 25565);
        assert_eq!(config.agent.tick_ms, 50);
        assert_eq!(config.agent.reach, AgentConfig::default().reach);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(matches!(
            ClientConfig::from_json("{ port: }"),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ClientConfig::load(Path::new("/nonexistent/blockbot.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/blockbot.json"));
    }
}
