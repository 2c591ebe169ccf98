use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One segment of the Pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Focus,
    Short,
    Long,
}

impl Phase {
    pub fn is_break(self) -> bool {
        match self {
            Phase::Short | Phase::Long => true,
            Phase::Idle | Phase::Focus => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Focus => "focus",
            Phase::Short => "short",
            Phase::Long => "long",
        }
    }

    /// Human-readable label, also used as the history entry title.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Focus => "Focus",
            Phase::Short => "Short Break",
            Phase::Long => "Long Break",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Phase::Idle),
            "focus" => Ok(Phase::Focus),
            "short" => Ok(Phase::Short),
            "long" => Ok(Phase::Long),
            other => Err(ValidationError::InvalidValue {
                field: "phase".into(),
                message: format!("unknown phase '{other}'"),
            }),
        }
    }
}

/// User-facing timer settings. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroConfig {
    #[serde(default = "default_focus_min")]
    pub focus_min: f64,
    #[serde(default = "default_short_min")]
    pub short_min: f64,
    #[serde(default = "default_long_min")]
    pub long_min: f64,
    /// Take a long break after every N focus sessions.
    #[serde(default = "default_long_every")]
    pub long_every: u32,
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default)]
    pub enable_task: bool,
    #[serde(default = "default_true")]
    pub show_floating_timer: bool,
    #[serde(default = "default_true")]
    pub enable_break_notifications: bool,
}

fn default_focus_min() -> f64 {
    25.0
}
fn default_short_min() -> f64 {
    5.0
}
fn default_long_min() -> f64 {
    20.0
}
fn default_long_every() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            focus_min: default_focus_min(),
            short_min: default_short_min(),
            long_min: default_long_min(),
            long_every: default_long_every(),
            strict_mode: false,
            enable_task: false,
            show_floating_timer: true,
            enable_break_notifications: true,
        }
    }
}

impl PomodoroConfig {
    /// Configured minutes for a phase. Idle has none.
    pub fn minutes(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Idle => 0.0,
            Phase::Focus => self.focus_min,
            Phase::Short => self.short_min,
            Phase::Long => self.long_min,
        }
    }

    /// Phase duration in milliseconds, rounded. Zero means "no end time".
    pub fn duration_ms(&self, phase: Phase) -> i64 {
        let minutes = self.minutes(phase);
        if !minutes.is_finite() || minutes <= 0.0 {
            return 0;
        }
        (minutes * 60_000.0).round() as i64
    }

    /// Reject values the phase engine cannot work with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("focusMin", self.focus_min),
            ("shortMin", self.short_min),
            ("longMin", self.long_min),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: format!("must be a non-negative number of minutes, got {value}"),
                });
            }
        }
        if self.long_every < 2 {
            return Err(ValidationError::InvalidValue {
                field: "longEvery".into(),
                message: format!("must be at least 2, got {}", self.long_every),
            });
        }
        Ok(())
    }
}

/// The persisted timer singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroState {
    pub phase: Phase,
    pub running: bool,
    /// Completed focus sessions in the current long-break cycle.
    #[serde(default)]
    pub cycle_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<i64>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<i64>,
    #[serde(default)]
    pub pause_accum_ms: i64,
    #[serde(default)]
    pub config: PomodoroConfig,
}

impl Default for PomodoroState {
    fn default() -> Self {
        Self::idle(PomodoroConfig::default())
    }
}

impl PomodoroState {
    pub fn idle(config: PomodoroConfig) -> Self {
        Self {
            phase: Phase::Idle,
            running: false,
            cycle_count: 0,
            started_at: None,
            ends_at: None,
            paused: false,
            paused_at: None,
            pause_accum_ms: 0,
            config,
        }
    }

    /// End time for `phase` if it started at `now`.
    pub fn ends_at_for(&self, phase: Phase, now: i64) -> Option<i64> {
        match self.config.duration_ms(phase) {
            0 => None,
            dur => Some(now + dur),
        }
    }

    /// A phase is active when it is running and not idle.
    pub fn is_active(&self) -> bool {
        self.running && self.phase != Phase::Idle
    }

    /// Strict enforcement applies right now.
    pub fn should_enforce(&self) -> bool {
        self.config.strict_mode && self.phase.is_break()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_rounds_fractional_minutes() {
        let cfg = PomodoroConfig {
            focus_min: 0.5,
            short_min: 0.0001,
            ..PomodoroConfig::default()
        };
        assert_eq!(cfg.duration_ms(Phase::Focus), 30_000);
        assert_eq!(cfg.duration_ms(Phase::Short), 6);
        assert_eq!(cfg.duration_ms(Phase::Idle), 0);
    }

    #[test]
    fn zero_minutes_has_no_end() {
        let state = PomodoroState::idle(PomodoroConfig {
            short_min: 0.0,
            ..PomodoroConfig::default()
        });
        assert_eq!(state.ends_at_for(Phase::Short, 1_000), None);
        assert_eq!(state.ends_at_for(Phase::Focus, 0), Some(1_500_000));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = PomodoroConfig {
            long_every: 1,
            ..PomodoroConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PomodoroConfig {
            short_min: -1.0,
            ..PomodoroConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(PomodoroConfig::default().validate().is_ok());
    }

    #[test]
    fn state_json_uses_camel_case_keys() {
        let mut state = PomodoroState::default();
        state.phase = Phase::Focus;
        state.running = true;
        state.started_at = Some(0);
        state.ends_at = Some(1_500_000);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["phase"], "focus");
        assert_eq!(json["endsAt"], 1_500_000);
        assert_eq!(json["config"]["longEvery"], 4);
        assert!(json.get("pausedAt").is_none());
    }

    #[test]
    fn config_missing_fields_fall_back_to_defaults() {
        let cfg: PomodoroConfig =
            serde_json::from_str(r#"{"focusMin":50,"shortMin":10,"longMin":30,"longEvery":3}"#)
                .unwrap();
        assert_eq!(cfg.long_every, 3);
        assert!(!cfg.strict_mode);
        assert!(cfg.enable_break_notifications);
    }
}
