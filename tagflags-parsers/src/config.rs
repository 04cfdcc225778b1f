use crate::TagParseError;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tagflags_encoding::{Mode, PriorityCode};

/// Turn cost capacity used when `turn_costs=true` is given without `max_turn_costs`.
pub const DEFAULT_MAX_TURN_COSTS: u32 = 3;

/// Per-mode options in the compact `name|key=value|…` form,
/// e.g. `car|speed_bits=10|speed_factor=0.5`.
///
/// Unset options keep the mode's defaults (see [`ModeSettings`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModeConfig {
    pub mode: Option<Mode>,
    pub block_fords: Option<bool>,
    pub block_private: Option<bool>,
    pub speed_bits: Option<u32>,
    pub speed_factor: Option<f64>,
    pub priority_bits: Option<u32>,
    pub turn_costs: Option<bool>,
    pub max_turn_costs: Option<u32>,
}

impl ModeConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }
}

fn parse_option<T: FromStr>(key: &str, value: &str) -> Result<T, TagParseError> {
    value.parse().map_err(|_| TagParseError::InvalidConfig {
        reason: format!("{key}={value} has an invalid value"),
    })
}

impl FromStr for ModeConfig {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('|').map(str::trim);
        let mode = parts.next().unwrap_or_default().parse::<Mode>()?;
        let mut config = ModeConfig::new(mode);
        for part in parts.filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(TagParseError::InvalidConfig {
                    reason: format!("expected key=value, found {part:?}"),
                });
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "block_fords" => config.block_fords = Some(parse_option(key, value)?),
                "block_private" => config.block_private = Some(parse_option(key, value)?),
                "speed_bits" => config.speed_bits = Some(parse_option(key, value)?),
                "speed_factor" => config.speed_factor = Some(parse_option(key, value)?),
                "priority_bits" => config.priority_bits = Some(parse_option(key, value)?),
                "turn_costs" => config.turn_costs = Some(parse_option(key, value)?),
                "max_turn_costs" => config.max_turn_costs = Some(parse_option(key, value)?),
                other => {
                    return Err(TagParseError::InvalidConfig {
                        reason: format!("unknown option {other:?} for {mode}"),
                    });
                }
            }
        }
        Ok(config)
    }
}

impl Display for ModeConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(mode) = self.mode {
            write!(f, "{mode}")?;
        }
        let options: [(&str, Option<String>); 7] = [
            ("block_fords", self.block_fords.map(|v| v.to_string())),
            ("block_private", self.block_private.map(|v| v.to_string())),
            ("speed_bits", self.speed_bits.map(|v| v.to_string())),
            ("speed_factor", self.speed_factor.map(|v| v.to_string())),
            ("priority_bits", self.priority_bits.map(|v| v.to_string())),
            ("turn_costs", self.turn_costs.map(|v| v.to_string())),
            ("max_turn_costs", self.max_turn_costs.map(|v| v.to_string())),
        ];
        for (key, value) in options {
            if let Some(value) = value {
                write!(f, "|{key}={value}")?;
            }
        }
        Ok(())
    }
}

/// Startup configuration of the classifiers.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EncodingConfig {
    #[serde_as(as = "Vec<DisplayFromStr>")]
    pub modes: Vec<ModeConfig>,
    /// "Now" for the static conditional access verdict; the local clock when absent.
    #[serde(default)]
    pub reference_time: Option<NaiveDateTime>,
}

impl EncodingConfig {
    /// Parses a comma-separated list of mode configs (`car|turn_costs=true,bike`).
    ///
    /// # Errors
    ///
    /// Fails on unknown modes or options.
    pub fn from_modes(modes: &str) -> Result<Self, TagParseError> {
        Ok(Self {
            modes: modes
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::parse)
                .collect::<Result<_, _>>()?,
            reference_time: None,
        })
    }

    #[must_use]
    pub fn with_reference_time(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    pub fn reference_time_or_now(&self) -> NaiveDateTime {
        self.reference_time
            .unwrap_or_else(|| Local::now().naive_local())
    }
}

/// The fully resolved options of one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSettings {
    pub mode: Mode,
    pub block_fords: bool,
    pub block_private: bool,
    pub speed_bits: u32,
    pub speed_factor: f64,
    pub priority_bits: u32,
    /// The speed classifiers aim for; stored speeds are additionally capped by the field width.
    pub max_speed: f64,
    /// The turn cost capacity, when turn costs are enabled.
    pub max_turn_costs: Option<u32>,
}

impl ModeSettings {
    /// The built-in defaults of a mode.
    pub fn defaults(mode: Mode) -> Self {
        let (speed_bits, speed_factor, max_speed) = match mode {
            Mode::Car => (5, 5.0, 140.0),
            Mode::Motorcycle => (5, 5.0, 120.0),
            Mode::Bus => (5, 5.0, 100.0),
            Mode::Bike | Mode::MountainBike | Mode::RacingBike => (4, 2.0, 30.0),
            Mode::Foot | Mode::Hiking | Mode::Wheelchair => (4, 1.0, 15.0),
            Mode::Roads => (7, 2.0, 254.0),
        };
        Self {
            mode,
            block_fords: matches!(mode, Mode::Wheelchair),
            block_private: true,
            speed_bits,
            speed_factor,
            priority_bits: PriorityCode::STORAGE_BITS,
            max_speed,
            max_turn_costs: None,
        }
    }

    /// Applies the options of `config` on top of the defaults.
    ///
    /// # Errors
    ///
    /// Fails if `config` names no mode or has a non-positive speed factor.
    pub fn resolve(config: &ModeConfig) -> Result<Self, TagParseError> {
        let mode = config.mode.ok_or_else(|| TagParseError::InvalidConfig {
            reason: "mode config without a mode name".to_string(),
        })?;
        let defaults = Self::defaults(mode);
        let speed_factor = config.speed_factor.unwrap_or(defaults.speed_factor);
        if !(speed_factor.is_finite() && speed_factor > 0.0) {
            return Err(TagParseError::InvalidConfig {
                reason: format!("speed_factor of {mode} must be positive, found {speed_factor}"),
            });
        }
        let turn_costs = config
            .turn_costs
            .unwrap_or(config.max_turn_costs.is_some());
        Ok(Self {
            mode,
            block_fords: config.block_fords.unwrap_or(defaults.block_fords),
            block_private: config.block_private.unwrap_or(defaults.block_private),
            speed_bits: config.speed_bits.unwrap_or(defaults.speed_bits),
            speed_factor,
            priority_bits: config.priority_bits.unwrap_or(defaults.priority_bits),
            max_speed: defaults.max_speed,
            max_turn_costs: turn_costs
                .then(|| config.max_turn_costs.unwrap_or(DEFAULT_MAX_TURN_COSTS)),
        })
    }
}
