use enumset::EnumSetType;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Transportation modes with their own classifier and property namespace.
///
/// Sets of modes are stored as [`enumset::EnumSet<Mode>`] (12 bits are reserved on disk).
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[enumset(repr = "u16")]
pub enum Mode {
    Car,
    Bike,
    RacingBike,
    MountainBike,
    Foot,
    Hiking,
    Wheelchair,
    Motorcycle,
    Bus,
    Roads,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown transportation mode: {0}")]
pub struct UnknownModeError(pub String);

impl Mode {
    /// The namespace prefix used for this mode's properties.
    pub const fn name(self) -> &'static str {
        match self {
            Mode::Car => "car",
            Mode::Bike => "bike",
            Mode::RacingBike => "racingbike",
            Mode::MountainBike => "mtb",
            Mode::Foot => "foot",
            Mode::Hiking => "hike",
            Mode::Wheelchair => "wheelchair",
            Mode::Motorcycle => "motorcycle",
            Mode::Bus => "bus",
            Mode::Roads => "roads",
        }
    }

    /// Builds a namespaced property key, e.g. `bike.average_speed`.
    pub fn key(self, suffix: &str) -> String {
        format!("{}.{suffix}", self.name())
    }

    /// The namespace prefix including the separator (`bike.`).
    pub fn namespace(self) -> String {
        format!("{}.", self.name())
    }

    /// Whether this mode belongs to the bicycle family.
    pub const fn is_bike(self) -> bool {
        matches!(self, Mode::Bike | Mode::RacingBike | Mode::MountainBike)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "car" => Ok(Mode::Car),
            "bike" => Ok(Mode::Bike),
            "racingbike" => Ok(Mode::RacingBike),
            "mtb" => Ok(Mode::MountainBike),
            "foot" => Ok(Mode::Foot),
            "hike" => Ok(Mode::Hiking),
            "wheelchair" => Ok(Mode::Wheelchair),
            "motorcycle" => Ok(Mode::Motorcycle),
            "bus" => Ok(Mode::Bus),
            "roads" => Ok(Mode::Roads),
            other => Err(UnknownModeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Mode;
    use enumset::EnumSet;

    #[test]
    fn names_roundtrip_through_from_str() {
        for mode in EnumSet::<Mode>::all() {
            assert_eq!(mode.name().parse::<Mode>(), Ok(mode));
        }
        assert!("tram".parse::<Mode>().is_err());
    }

    #[test]
    fn fits_in_twelve_bits() {
        assert!(EnumSet::<Mode>::all().as_repr() < (1 << 12));
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(Mode::MountainBike.key("average_speed"), "mtb.average_speed");
        assert!(Mode::RacingBike.is_bike());
        assert!(!Mode::Foot.is_bike());
    }
}
