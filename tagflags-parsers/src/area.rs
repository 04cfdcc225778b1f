use crate::osm::{ReaderWay, Tagged};
use tagflags_encoding::EnumValue;
use tagflags_encoding::values::{Country, RoadClass, UrbanDensity};

/// Where a way is located, as far as the classifiers care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AreaInfo {
    pub country: Country,
    pub density: UrbanDensity,
}

/// Resolves the country and urban density of a way.
///
/// Spatial indexing of administrative areas is up to the implementation.
pub trait AreaLookup: Send + Sync {
    fn lookup(&self, way: &ReaderWay) -> AreaInfo;
}

/// Reads the `country` (ISO 3166-1 alpha-3) and `urban_density` tags that readers attach
/// to ways after their own spatial lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagAreaLookup;

impl AreaLookup for TagAreaLookup {
    fn lookup(&self, way: &ReaderWay) -> AreaInfo {
        AreaInfo {
            country: way.tag("country").and_then(Country::find).unwrap_or_default(),
            density: way
                .tag("urban_density")
                .and_then(UrbanDensity::find)
                .unwrap_or_default(),
        }
    }
}

/// Supplies the legal max speed (km/h) where no sign is tagged.
pub trait LegalSpeeds: Send + Sync {
    fn legal_max_speed(
        &self,
        country: Country,
        road_class: RoadClass,
        density: UrbanDensity,
    ) -> Option<f64>;
}

/// A small table of statutory limits for the countries in [`Country`].
///
/// Unrestricted motorways (Germany) have no legal max speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLegalSpeeds;

const MPH: f64 = 1.609_344;

impl LegalSpeeds for BuiltinLegalSpeeds {
    fn legal_max_speed(
        &self,
        country: Country,
        road_class: RoadClass,
        density: UrbanDensity,
    ) -> Option<f64> {
        let urban = density != UrbanDensity::Rural;
        if country == Country::Missing {
            return None;
        }
        let speed = match road_class {
            RoadClass::LivingStreet => {
                if country.uses_mph() {
                    return Some(15.0 * MPH);
                }
                return Some(if country == Country::Deu { 7.0 } else { 20.0 });
            }
            RoadClass::Motorway => match country {
                Country::Deu => return None,
                Country::Gbr => 70.0 * MPH,
                Country::Usa => 65.0 * MPH,
                Country::Can | Country::Bel | Country::Nld | Country::Esp | Country::Che => 120.0,
                Country::Pol => 140.0,
                _ => 130.0,
            },
            RoadClass::Trunk if !urban => match country {
                Country::Gbr => 70.0 * MPH,
                Country::Usa => 55.0 * MPH,
                Country::Pol | Country::Ita | Country::Cze => 110.0,
                _ => 100.0,
            },
            _ if urban => match country {
                Country::Gbr | Country::Usa => 30.0 * MPH,
                _ => 50.0,
            },
            _ => match country {
                Country::Gbr => 60.0 * MPH,
                Country::Usa => 55.0 * MPH,
                Country::Fra | Country::Esp | Country::Dnk | Country::Nld | Country::Che | Country::Can => {
                    80.0
                }
                Country::Ita => 90.0,
                _ => 100.0,
            },
        };
        Some(speed)
    }
}
