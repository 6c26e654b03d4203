//! Request decoding
//!
//! [`WireMessage`] mirrors the JSON the callers send; [`ProxyCommand`] is the
//! validated form the proxy acts on. Field names follow the callers' original
//! message layout so existing launchers only need to change their framing.

use crate::name::{normalize_name, validate_name};
use crate::request::{LaunchRequest, LogRedirect, PodType};
use crate::ENV_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command `{command}` requires field `{field}`")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    #[error("Invalid pod name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Environment variable {0:?} does not carry the {prefix} prefix", prefix = ENV_PREFIX)]
    ForeignEnv(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireParams {
    #[serde(default)]
    pub cmdline: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// One request exactly as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<WireParams>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envs: Option<BTreeMap<String, String>>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub pod_type: Option<String>,
}

/// Everything a caller can ask the proxy to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyCommand {
    Create(LaunchRequest),
    Delete(String),
    DeleteAll,
    ResolveContainerId(String),
}

impl ProxyCommand {
    /// Decode one frame's payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let message: WireMessage =
            serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Self::try_from(message)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&WireMessage::from(self))
    }

    /// The wire name of the command, also used as a metrics label.
    pub const fn verb(&self) -> &'static str {
        match self {
            ProxyCommand::Create(_) => "create",
            ProxyCommand::Delete(_) => "kill",
            ProxyCommand::DeleteAll => "killall",
            ProxyCommand::ResolveContainerId(_) => "get_mainid",
        }
    }
}

impl TryFrom<WireMessage> for ProxyCommand {
    type Error = DecodeError;

    fn try_from(message: WireMessage) -> Result<Self, Self::Error> {
        match message.command.as_str() {
            "create" => {
                let name = message.name.ok_or(DecodeError::MissingField {
                    command: "create",
                    field: "name",
                })?;
                let params = message.params.unwrap_or_default();
                let pod_type = PodType::from_wire(message.pod_type.as_deref());

                let mut request = LaunchRequest::new(
                    name,
                    params.cmdline,
                    message.envs.unwrap_or_default(),
                    pod_type,
                )?;

                // A redirect needs both streams or the sidecar has nowhere to write.
                match (params.stdout, params.stderr) {
                    (Some(stdout), Some(stderr)) => {
                        request = request.with_log_redirect(LogRedirect { stdout, stderr });
                    }
                    (Some(_), None) => {
                        return Err(DecodeError::MissingField {
                            command: "create",
                            field: "stderr",
                        })
                    }
                    (None, Some(_)) => {
                        return Err(DecodeError::MissingField {
                            command: "create",
                            field: "stdout",
                        })
                    }
                    (None, None) => {}
                }

                Ok(ProxyCommand::Create(request))
            }
            "kill" => {
                // Older launchers put the pod name in `type`.
                let raw = message
                    .name
                    .or(message.pod_type)
                    .ok_or(DecodeError::MissingField {
                        command: "kill",
                        field: "name",
                    })?;
                let name = normalize_name(&raw);
                validate_name(&name)?;
                Ok(ProxyCommand::Delete(name))
            }
            "killall" => Ok(ProxyCommand::DeleteAll),
            "get_mainid" => {
                let name = message.name.ok_or(DecodeError::MissingField {
                    command: "get_mainid",
                    field: "name",
                })?;
                validate_name(&name)?;
                Ok(ProxyCommand::ResolveContainerId(name))
            }
            other => Err(DecodeError::UnknownCommand(other.to_string())),
        }
    }
}

impl From<&ProxyCommand> for WireMessage {
    fn from(command: &ProxyCommand) -> Self {
        let verb = command.verb().to_string();
        match command {
            ProxyCommand::Create(request) => WireMessage {
                command: verb,
                name: Some(request.name().to_string()),
                params: Some(WireParams {
                    cmdline: request.command().to_vec(),
                    stdout: request.log_redirect().map(|r| r.stdout.clone()),
                    stderr: request.log_redirect().map(|r| r.stderr.clone()),
                }),
                envs: Some(request.environment().clone()),
                pod_type: Some(request.pod_type().as_str().to_string()),
            },
            ProxyCommand::Delete(name) | ProxyCommand::ResolveContainerId(name) => WireMessage {
                command: verb,
                name: Some(name.clone()),
                params: None,
                envs: None,
                pod_type: None,
            },
            ProxyCommand::DeleteAll => WireMessage {
                command: verb,
                name: None,
                params: None,
                envs: None,
                pod_type: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_create_worker() {
        let payload = br#"{
            "command": "create",
            "name": "worker-000042",
            "params": {"cmdline": ["default_worker.py", "--startup-token", "0"]},
            "envs": {"RAY_JOB_ID": "01000000"},
            "type": "worker"
        }"#;

        let ProxyCommand::Create(request) = ProxyCommand::decode(payload).unwrap() else {
            panic!("expected create");
        };
        assert_eq!(request.name(), "worker-000042");
        assert_eq!(request.pod_type(), PodType::Worker);
        assert_eq!(request.command().len(), 3);
        assert_eq!(request.environment()["RAY_JOB_ID"], "01000000");
        assert!(request.log_redirect().is_none());
    }

    #[test]
    fn test_decode_create_with_log_redirect() {
        let payload = br#"{
            "command": "create",
            "name": "raylet-1",
            "params": {"cmdline": ["raylet"], "stdout": "/tmp/ray/out.log", "stderr": "/tmp/ray/err.log"},
            "envs": null,
            "type": "raylet"
        }"#;

        let ProxyCommand::Create(request) = ProxyCommand::decode(payload).unwrap() else {
            panic!("expected create");
        };
        assert_eq!(request.pod_type(), PodType::Other);
        assert!(request.environment().is_empty());
        let redirect = request.log_redirect().unwrap();
        assert_eq!(redirect.stdout, "/tmp/ray/out.log");
        assert_eq!(redirect.stderr, "/tmp/ray/err.log");
    }

    #[test]
    fn test_decode_create_rejects_half_redirect() {
        let payload = br#"{
            "command": "create",
            "name": "raylet-1",
            "params": {"cmdline": ["raylet"], "stdout": "/tmp/ray/out.log"},
            "type": "raylet"
        }"#;
        assert_eq!(
            ProxyCommand::decode(payload),
            Err(DecodeError::MissingField {
                command: "create",
                field: "stderr"
            })
        );

        let payload = br#"{
            "command": "create",
            "name": "raylet-1",
            "params": {"cmdline": ["raylet"], "stderr": "/tmp/ray/err.log"},
            "type": "raylet"
        }"#;
        assert_eq!(
            ProxyCommand::decode(payload),
            Err(DecodeError::MissingField {
                command: "create",
                field: "stdout"
            })
        );
    }

    #[test]
    fn test_decode_kill_uses_type_fallback() {
        let payload = br#"{"command": "kill", "type": "worker_000042", "params": {}}"#;
        assert_eq!(
            ProxyCommand::decode(payload).unwrap(),
            ProxyCommand::Delete("worker-000042".to_string())
        );
    }

    #[test]
    fn test_decode_killall_and_get_mainid() {
        assert_eq!(
            ProxyCommand::decode(br#"{"command": "killall"}"#).unwrap(),
            ProxyCommand::DeleteAll
        );
        assert_eq!(
            ProxyCommand::decode(br#"{"command": "get_mainid", "name": "raylet-1"}"#).unwrap(),
            ProxyCommand::ResolveContainerId("raylet-1".to_string())
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            ProxyCommand::decode(b"{\"command\": \"create\""),
            Err(DecodeError::Malformed(_))
        ));
        assert_eq!(
            ProxyCommand::decode(br#"{"command": "reboot"}"#),
            Err(DecodeError::UnknownCommand("reboot".to_string()))
        );
        assert_eq!(
            ProxyCommand::decode(br#"{"command": "get_mainid"}"#),
            Err(DecodeError::MissingField {
                command: "get_mainid",
                field: "name"
            })
        );
    }

    #[test]
    fn test_encoded_create_decodes_to_same_command() {
        let mut env = BTreeMap::new();
        env.insert("RAY_NODE_IP".to_string(), "10.0.0.3".to_string());
        let request = LaunchRequest::new("worker-7", vec!["a.py".to_string()], env, PodType::Worker)
            .unwrap()
            .with_log_redirect(LogRedirect {
                stdout: "o".to_string(),
                stderr: "e".to_string(),
            });
        let command = ProxyCommand::Create(request);

        let bytes = command.encode().unwrap();
        assert_eq!(ProxyCommand::decode(&bytes).unwrap(), command);
    }
}
