//! Inbound command parsing
//!
//! Commands arrive as JSON objects `{ "type": ..., ...payload }`. The kind
//! must be known; payload fields are lenient and fall back to configured
//! defaults when absent or unusable.

use serde::Deserialize;
use serde_json::Value;

use crate::config::SensorConfig;
use crate::ducking::{intensity_to_fraction, DuckMode};
use crate::error::{Result, SensorError};
use crate::focus::FocusStyle;

/// A validated inbound command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Ping,
    PauseAudio,
    ResumeAudio,
    SetVolume { fraction: f32 },
    RestoreVolume,
    EnableFocus { style: FocusStyle },
    DisableFocus,
    SetFocusStyle { style: FocusStyle },
    MuteAudio,
    UnmuteAudio,
    Duck { mode: DuckMode, fraction: f32 },
    Restore,
}

/// Wire shape before payload defaults are applied
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum RawCommand {
    #[serde(alias = "DUCKIT_PING")]
    Ping,
    PauseAudio,
    ResumeAudio,
    SetVolume {
        #[serde(default)]
        value: Option<Value>,
    },
    RestoreVolume,
    EnableFocus {
        #[serde(default)]
        style: Option<Value>,
    },
    DisableFocus,
    SetFocusStyle {
        #[serde(default)]
        style: Option<Value>,
    },
    MuteAudio,
    UnmuteAudio,
    Duck {
        #[serde(default)]
        mode: Option<Value>,
        #[serde(default)]
        intensity: Option<Value>,
    },
    Restore,
}

impl Command {
    /// Parse a command object
    ///
    /// Unknown kinds and non-object input are `InvalidPayload`; the router
    /// drops them without acknowledgement.
    pub fn from_value(value: &Value, config: &SensorConfig) -> Result<Self> {
        if !value.is_object() {
            return Err(SensorError::InvalidPayload {
                field: "command".to_string(),
                reason: "expected a JSON object".to_string(),
            });
        }
        let raw = RawCommand::deserialize(value).map_err(|e| SensorError::InvalidPayload {
            field: "type".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_raw(raw, config))
    }

    /// Parse a command from JSON text
    pub fn from_json(json: &str, config: &SensorConfig) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value, config)
    }

    fn from_raw(raw: RawCommand, config: &SensorConfig) -> Self {
        match raw {
            RawCommand::Ping => Command::Ping,
            RawCommand::PauseAudio => Command::PauseAudio,
            RawCommand::ResumeAudio => Command::ResumeAudio,
            RawCommand::SetVolume { value } => Command::SetVolume {
                fraction: volume_fraction(value.as_ref(), config.default_volume_fraction),
            },
            RawCommand::RestoreVolume => Command::RestoreVolume,
            RawCommand::EnableFocus { style } => Command::EnableFocus {
                style: focus_style(style.as_ref(), config.default_focus_style),
            },
            RawCommand::DisableFocus => Command::DisableFocus,
            RawCommand::SetFocusStyle { style } => Command::SetFocusStyle {
                style: focus_style(style.as_ref(), config.default_focus_style),
            },
            RawCommand::MuteAudio => Command::MuteAudio,
            RawCommand::UnmuteAudio => Command::UnmuteAudio,
            RawCommand::Duck { mode, intensity } => {
                let mode = mode
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(DuckMode::from_name)
                    .unwrap_or(DuckMode::Volume);
                let intensity = intensity
                    .as_ref()
                    .and_then(Value::as_f64)
                    .map(|v| v as f32)
                    .filter(|v| v.is_finite())
                    .unwrap_or(config.default_intensity);
                Command::Duck {
                    mode,
                    fraction: intensity_to_fraction(intensity),
                }
            }
            RawCommand::Restore => Command::Restore,
        }
    }

    /// Wire name of the command kind
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::PauseAudio => "PAUSE_AUDIO",
            Command::ResumeAudio => "RESUME_AUDIO",
            Command::SetVolume { .. } => "SET_VOLUME",
            Command::RestoreVolume => "RESTORE_VOLUME",
            Command::EnableFocus { .. } => "ENABLE_FOCUS",
            Command::DisableFocus => "DISABLE_FOCUS",
            Command::SetFocusStyle { .. } => "SET_FOCUS_STYLE",
            Command::MuteAudio => "MUTE_AUDIO",
            Command::UnmuteAudio => "UNMUTE_AUDIO",
            Command::Duck { .. } => "DUCK",
            Command::Restore => "RESTORE",
        }
    }
}

/// A finite number in `[0, 1]` is used as is; anything else is `fallback`
fn volume_fraction(value: Option<&Value>, fallback: f32) -> f32 {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
        .map(|v| v as f32)
        .unwrap_or(fallback)
}

fn focus_style(value: Option<&Value>, fallback: FocusStyle) -> FocusStyle {
    match value.and_then(Value::as_str) {
        Some(name) if !name.is_empty() => FocusStyle::from_name(name),
        _ => fallback,
    }
}
