//! The rule chains of the individual transportation modes.

mod bike;
mod bus;
mod car;
mod foot;
mod motorcycle;
mod roads;
mod wheelchair;

pub use bike::BikeClassifier;
pub use bus::BusClassifier;
pub use car::CarClassifier;
pub use foot::FootClassifier;
pub use motorcycle::{MotorcycleClassifier, motorcycle_curvature};
pub use roads::RoadsClassifier;
pub use wheelchair::WheelchairClassifier;

use crate::TagParseError;
use crate::classifier::{ClassifierContext, ModeClassifier};
use crate::config::ModeSettings;
use tagflags_encoding::{Mode, RegistryBuilder};

/// Builds the classifier of `settings.mode`, declaring its properties in `builder`.
///
/// # Errors
///
/// Fails if the mode's properties cannot be declared, e.g. because the mode is already present.
pub fn classifier(
    builder: &mut RegistryBuilder,
    settings: &ModeSettings,
    context: &ClassifierContext,
) -> Result<Box<dyn ModeClassifier>, TagParseError> {
    Ok(match settings.mode {
        Mode::Car => Box::new(CarClassifier::new(builder, settings, context)?),
        Mode::Bike | Mode::MountainBike | Mode::RacingBike => {
            Box::new(BikeClassifier::new(builder, settings, context)?)
        }
        Mode::Foot | Mode::Hiking => Box::new(FootClassifier::new(builder, settings, context)?),
        Mode::Wheelchair => Box::new(WheelchairClassifier::new(builder, settings, context)?),
        Mode::Motorcycle => Box::new(MotorcycleClassifier::new(builder, settings, context)?),
        Mode::Bus => Box::new(BusClassifier::new(builder, settings, context)?),
        Mode::Roads => Box::new(RoadsClassifier::new(builder, settings, context)?),
    })
}

/// A Wednesday noon without holidays.
#[cfg(test)]
pub(crate) fn test_context() -> ClassifierContext {
    use chrono::NaiveDate;

    ClassifierContext::new(
        NaiveDate::from_ymd_opt(2021, 1, 6)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid time"),
    )
}

#[cfg(test)]
mod tests {
    use super::{classifier, test_context};
    use crate::TagParseError;
    use crate::config::ModeSettings;
    use enumset::EnumSet;
    use tagflags_encoding::{EncodingError, Mode, RegistryBuilder};

    #[test]
    fn every_mode_has_a_classifier() {
        let mut builder = RegistryBuilder::new();
        for mode in EnumSet::<Mode>::all() {
            let classifier = classifier(&mut builder, &ModeSettings::defaults(mode), &test_context())
                .expect("declares");
            assert_eq!(classifier.mode(), mode);
        }
        let registry = builder.seal();
        assert!(registry.contains("motorcycle.curvature"));
        assert!(!registry.contains("roads.priority"));
    }

    #[test]
    fn modes_are_declared_once() {
        let mut builder = RegistryBuilder::new();
        let settings = ModeSettings::defaults(Mode::Car);
        classifier(&mut builder, &settings, &test_context()).expect("declares");
        assert!(matches!(
            classifier(&mut builder, &settings, &test_context()),
            Err(TagParseError::Encoding(EncodingError::DuplicateName { .. }))
        ));
    }
}
