use std::collections::BTreeMap;
use tagflags_encoding::PriorityCode;

/// Collects priority opinions of rules with different weights.
///
/// The opinion with the highest weight wins; a later opinion with the same weight replaces
/// an earlier one. Multipliers are applied on top of the winner, and an explicit override
/// (such as a `class:bicycle` value) replaces everything.
#[derive(Debug, Clone)]
pub struct WeightedPriority {
    weights: BTreeMap<u32, PriorityCode>,
    multipliers: Vec<PriorityCode>,
    explicit: Option<PriorityCode>,
}

impl Default for WeightedPriority {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([(0, PriorityCode::Unchanged)]),
            multipliers: Vec::new(),
            explicit: None,
        }
    }
}

impl WeightedPriority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, weight: u32, code: PriorityCode) {
        self.weights.insert(weight, code);
    }

    /// Multiplies the final factor by `code`'s factor.
    pub fn multiply(&mut self, code: PriorityCode) {
        self.multipliers.push(code);
    }

    pub fn override_with(&mut self, code: PriorityCode) {
        self.explicit = Some(code);
    }

    /// The code of the heaviest opinion (ignoring multipliers and overrides).
    pub fn current(&self) -> PriorityCode {
        self.weights
            .last_key_value()
            .map(|(_, code)| *code)
            .unwrap_or_default()
    }

    /// The winning code, or the override.
    pub fn resolve(&self) -> PriorityCode {
        self.explicit.unwrap_or_else(|| self.current())
    }

    /// The factor to store.
    pub fn factor(&self) -> f64 {
        match self.explicit {
            Some(code) => PriorityCode::combine([code]),
            None => PriorityCode::combine(
                std::iter::once(self.current()).chain(self.multipliers.iter().copied()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WeightedPriority;
    use tagflags_encoding::PriorityCode;

    #[test]
    fn heaviest_opinion_wins() {
        let mut priority = WeightedPriority::new();
        assert_eq!(priority.resolve(), PriorityCode::Unchanged);
        priority.put(50, PriorityCode::Avoid);
        priority.put(40, PriorityCode::Prefer);
        assert_eq!(priority.resolve(), PriorityCode::Avoid);
        priority.put(50, PriorityCode::SlightAvoid);
        assert_eq!(priority.resolve(), PriorityCode::SlightAvoid);
        assert!((priority.factor() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn multipliers_and_overrides() {
        let mut priority = WeightedPriority::new();
        priority.put(100, PriorityCode::VeryNice);
        priority.multiply(PriorityCode::SlightAvoid);
        assert!((priority.factor() - 1.17).abs() < 1e-9);

        priority.override_with(PriorityCode::Avoid);
        assert_eq!(priority.resolve(), PriorityCode::Avoid);
        assert!((priority.factor() - 0.8).abs() < 1e-9);
    }
}
