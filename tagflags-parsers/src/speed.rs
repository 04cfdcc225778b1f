use crate::osm::{ReaderWay, Tagged, split_values};
use tagflags_encoding::{BooleanProperty, DecimalProperty, Direction, EdgeRecord};

/// The speed stored for `maxspeed=none`.
pub const UNLIMITED_SIGN_SPEED: f64 = 150.0;

const MPH: f64 = 1.609_344;
const KNOTS: f64 = 1.852;

/// Converts a single speed value to km/h.
///
/// Understands plain numbers, `mph`, `knots`, `km/h` style units, `none`, `walk`
/// and country zone values such as `DE:urban`.
pub fn parse_speed(value: &str) -> Option<f64> {
    let value = value.trim();
    match value {
        "" => return None,
        "none" => return Some(UNLIMITED_SIGN_SPEED),
        "walk" => return Some(6.0),
        _ => {}
    }
    if let Some((_, zone)) = value.split_once(':') {
        return match zone {
            "rural" | "trunk" => Some(80.0),
            "urban" => Some(50.0),
            "living_street" | "walk" => Some(6.0),
            "motorway" => Some(UNLIMITED_SIGN_SPEED),
            _ => None,
        };
    }

    let (number, factor) = if let Some(number) = value.strip_suffix("mph") {
        (number, MPH)
    } else if let Some(number) = value.strip_suffix("knots") {
        (number, KNOTS)
    } else if let Some(number) = ["km/h", "kmh", "kph"]
        .iter()
        .find_map(|unit| value.strip_suffix(unit))
    {
        (number, 1.0)
    } else {
        (value, 1.0)
    };
    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|speed| speed.is_finite() && *speed > 0.0)
        .map(|speed| speed * factor)
}

/// Parses a `;`-list of speeds, taking the minimum. Unparsable entries are ignored.
pub fn parse_speed_list(value: &str) -> Option<f64> {
    split_values(value)
        .into_iter()
        .filter_map(parse_speed)
        .min_by(f64::total_cmp)
}

/// The signed max speed of a way for one direction (`maxspeed:forward` / `maxspeed:backward`
/// before `maxspeed`).
pub fn max_speed(way: &ReaderWay, direction: Direction) -> Option<f64> {
    let directional = match direction {
        Direction::Forward => "maxspeed:forward",
        Direction::Backward => "maxspeed:backward",
    };
    way.tag(directional)
        .and_then(parse_speed_list)
        .or_else(|| way.tag("maxspeed").and_then(parse_speed_list))
}

/// The lower of the two directional max speeds, if any is tagged.
pub fn max_speed_both(way: &ReaderWay) -> Option<f64> {
    Direction::BOTH
        .into_iter()
        .filter_map(|direction| max_speed(way, direction))
        .min_by(f64::total_cmp)
}

/// Parses a ferry `duration` in seconds.
///
/// Accepts ISO-8601 durations (`PT1H30M`), `HH:MM`, `HH:MM:SS` and plain minutes.
pub fn parse_duration(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Some(iso) = value.strip_prefix("PT").or_else(|| value.strip_prefix("pt")) {
        return parse_iso_time(iso);
    }
    let parts: Vec<f64> = value
        .split(':')
        .map(|part| part.trim().parse::<f64>().ok().filter(|n| *n >= 0.0))
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [minutes] => Some(minutes * 60.0),
        [hours, minutes] => Some(hours * 3600.0 + minutes * 60.0),
        [hours, minutes, seconds] => Some(hours * 3600.0 + minutes * 60.0 + seconds),
        _ => None,
    }
}

fn parse_iso_time(value: &str) -> Option<f64> {
    let mut seconds = 0.0;
    let mut number = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let n: f64 = number.parse().ok()?;
        number.clear();
        seconds += match c.to_ascii_uppercase() {
            'H' => n * 3600.0,
            'M' => n * 60.0,
            'S' => n,
            _ => return None,
        };
    }
    number.is_empty().then_some(seconds)
}

/// Derives ferry speeds from the trip duration and the length of the route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FerrySpeed {
    /// Used when the duration is unknown.
    pub unknown_speed: f64,
    /// Used for trips of up to an hour when only the duration is known.
    pub short_trip_speed: f64,
    /// Used for trips over an hour when only the duration is known.
    pub long_trip_speed: f64,
    /// Routes shorter than this (in meters) without a duration get the minimum speed.
    pub short_route: f64,
}

impl Default for FerrySpeed {
    fn default() -> Self {
        Self {
            unknown_speed: 5.0,
            short_trip_speed: 20.0,
            long_trip_speed: 30.0,
            short_route: 300.0,
        }
    }
}

impl FerrySpeed {
    /// The ferry speed in km/h, within `[min_speed, max_speed]`.
    ///
    /// `min_speed` is normally the smallest non-zero step of the speed field.
    pub fn speed(&self, way: &ReaderWay, min_speed: f64, max_speed: f64) -> f64 {
        let duration = way
            .tag("duration")
            .and_then(parse_duration)
            .filter(|d| *d > 0.0);
        let length = way.length();
        let speed = match (duration, length) {
            (Some(duration), Some(length)) => {
                // boarding and waiting take time as well
                length / 1000.0 / (duration / 3600.0) / 1.4
            }
            (Some(duration), None) if duration > 3600.0 => self.long_trip_speed,
            (Some(_), None) => self.short_trip_speed,
            (None, Some(length)) if length < self.short_route => min_speed,
            (None, _) => self.unknown_speed,
        };
        speed.clamp(min_speed, max_speed.max(min_speed))
    }
}

/// Stores a speed and opens the direction.
///
/// Values are capped to the field; a value that rounds to zero stores zero and
/// closes access in that direction only.
pub fn set_speed(
    speed: &DecimalProperty,
    access: &BooleanProperty,
    direction: Direction,
    record: &mut EdgeRecord,
    value: f64,
) {
    if value.is_nan() || value < speed.factor() / 2.0 {
        speed.set_clamped(direction, record, 0.0);
        access.set(direction, record, false);
    } else {
        speed.set_clamped(direction, record, value);
        access.set(direction, record, true);
    }
}

#[cfg(test)]
mod tests {
    use super::{FerrySpeed, max_speed, parse_duration, parse_speed, parse_speed_list, set_speed};
    use crate::osm::ReaderWay;
    use tagflags_encoding::{Direction, PropertySpec, RegistryBuilder};

    #[test]
    fn speed_units() {
        assert_eq!(parse_speed("50"), Some(50.0));
        assert_eq!(parse_speed("50 km/h"), Some(50.0));
        assert_eq!(parse_speed("50kph"), Some(50.0));
        assert_eq!(parse_speed("none"), Some(150.0));
        assert_eq!(parse_speed("walk"), Some(6.0));
        assert_eq!(parse_speed("DE:rural"), Some(80.0));
        assert_eq!(parse_speed("RO:trunk"), Some(80.0));
        assert_eq!(parse_speed("AT:urban"), Some(50.0));
        assert_eq!(parse_speed("DE:living_street"), Some(6.0));
        assert_eq!(parse_speed("signals"), None);
        assert_eq!(parse_speed("-5"), None);
        let mph = parse_speed("60 mph").expect("valid");
        assert!((mph - 96.56).abs() < 0.01);
        let knots = parse_speed("10 knots").expect("valid");
        assert!((knots - 18.52).abs() < 1e-9);
        assert_eq!(parse_speed_list("50;30;fast"), Some(30.0));
    }

    #[test]
    fn directional_max_speed() {
        let way = ReaderWay::new(1)
            .with_tag("maxspeed", "50")
            .with_tag("maxspeed:backward", "30");
        assert_eq!(max_speed(&way, Direction::Forward), Some(50.0));
        assert_eq!(max_speed(&way, Direction::Backward), Some(30.0));
        assert_eq!(max_speed(&ReaderWay::new(2), Direction::Forward), None);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("PT1H30M"), Some(5400.0));
        assert_eq!(parse_duration("PT45S"), Some(45.0));
        assert_eq!(parse_duration("01:30"), Some(5400.0));
        assert_eq!(parse_duration("1:00:30"), Some(3630.0));
        assert_eq!(parse_duration("45"), Some(2700.0));
        assert_eq!(parse_duration("PT1X"), None);
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn ferry_speeds() {
        let ferry = FerrySpeed::default();
        let mut way = ReaderWay::new(1).with_tag("route", "ferry");
        assert!((ferry.speed(&way, 2.0, 30.0) - 5.0).abs() < f64::EPSILON);

        way.set_tag("duration", "02:00");
        assert!((ferry.speed(&way, 2.0, 30.0) - 30.0).abs() < f64::EPSILON);
        way.set_tag("duration", "00:20");
        assert!((ferry.speed(&way, 2.0, 30.0) - 20.0).abs() < f64::EPSILON);

        // ~11.1 km in 30 minutes
        way.coordinates = vec![[10.0, 50.0], [10.0, 50.1]];
        way.set_tag("duration", "PT30M");
        let speed = ferry.speed(&way, 2.0, 140.0);
        assert!((speed - 11.12 * 2.0 / 1.4).abs() < 0.1, "{speed}");
        // capped by the mode
        assert!((ferry.speed(&way, 2.0, 10.0) - 10.0).abs() < f64::EPSILON);

        let short = ReaderWay {
            coordinates: vec![[10.0, 50.0], [10.0, 50.001]],
            ..ReaderWay::new(2)
        };
        assert!((ferry.speed(&short, 2.0, 30.0) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_speed_closes_only_that_direction() {
        let mut builder = RegistryBuilder::new();
        let access = builder
            .declare_boolean("car.access", true)
            .expect("declares");
        let speed = builder
            .declare_decimal(PropertySpec::decimal("car.average_speed", 5, 5.0, true))
            .expect("declares");
        let registry = builder.seal();
        let mut record = registry.create_record();

        set_speed(&speed, &access, Direction::Forward, &mut record, 60.0);
        set_speed(&speed, &access, Direction::Backward, &mut record, 60.0);
        assert!(access.get(Direction::Forward, &record));

        // just below half a step
        set_speed(&speed, &access, Direction::Forward, &mut record, 2.4);
        assert!(!access.get(Direction::Forward, &record));
        assert!(speed.get(Direction::Forward, &record).abs() < f64::EPSILON);
        assert!(access.get(Direction::Backward, &record));
        assert!((speed.get(Direction::Backward, &record) - 60.0).abs() < f64::EPSILON);

        // never above the storable max
        set_speed(&speed, &access, Direction::Forward, &mut record, 400.0);
        assert!((speed.get(Direction::Forward, &record) - 155.0).abs() < f64::EPSILON);
    }
}
