use num_enum::IntoPrimitive;
use std::fmt::{Display, Formatter};

/// Ordered weighting codes steering route preference independently of speed.
///
/// Each code carries a multiplicative factor of `value / 10`, so [`PriorityCode::Unchanged`] is neutral.
/// [`PriorityCode::Exclude`] and [`PriorityCode::ReachDestination`] are terminal markers:
/// they are never produced by stepping with [`PriorityCode::better`] or [`PriorityCode::worse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PriorityCode {
    Exclude = 0,
    ReachDestination = 1,
    Worst = 3,
    Bad = 5,
    AvoidMore = 6,
    Avoid = 8,
    SlightAvoid = 9,
    #[default]
    Unchanged = 10,
    SlightPrefer = 11,
    Prefer = 12,
    VeryNice = 13,
    Best = 15,
}

/// Routable codes, worst to best.
const LADDER: [PriorityCode; 10] = [
    PriorityCode::Worst,
    PriorityCode::Bad,
    PriorityCode::AvoidMore,
    PriorityCode::Avoid,
    PriorityCode::SlightAvoid,
    PriorityCode::Unchanged,
    PriorityCode::SlightPrefer,
    PriorityCode::Prefer,
    PriorityCode::VeryNice,
    PriorityCode::Best,
];

impl PriorityCode {
    /// The bit width and quantum of the stored priority decimal (0.0 ..= 1.5 in steps of 0.1).
    pub const STORAGE_BITS: u32 = 4;
    pub const STORAGE_FACTOR: f64 = 0.1;

    #[inline]
    pub fn value(self) -> u8 {
        u8::from(self)
    }

    #[inline]
    pub fn factor(self) -> f64 {
        f64::from(self.value()) / 10.0
    }

    /// One step up the ladder (saturating at `Best`). Terminal markers are returned unchanged.
    #[must_use]
    pub fn better(self) -> Self {
        self.step(1)
    }

    /// One step down the ladder (saturating at `Worst`). Terminal markers are returned unchanged.
    #[must_use]
    pub fn worse(self) -> Self {
        self.step(-1)
    }

    fn step(self, delta: isize) -> Self {
        match LADDER.iter().position(|c| *c == self) {
            Some(i) => LADDER[i.saturating_add_signed(delta).min(LADDER.len() - 1)],
            None => self,
        }
    }

    /// Maps an explicit `class:bicycle`-style value (-3 ..= 3) onto a code.
    /// Anything else is neutral.
    pub fn from_class_value(value: i32) -> Self {
        match value {
            3 => PriorityCode::Best,
            2 => PriorityCode::VeryNice,
            1 => PriorityCode::Prefer,
            -1 => PriorityCode::SlightAvoid,
            -2 => PriorityCode::Avoid,
            -3 => PriorityCode::AvoidMore,
            _ => PriorityCode::Unchanged,
        }
    }

    /// Multiplies the factors of all codes.
    ///
    /// Any `Exclude` yields 0, otherwise any `ReachDestination` yields its own factor.
    /// Routable products saturate into `[Worst, Best]`,
    /// so heuristics alone can never make a way indistinguishable from excluded.
    /// An empty set is neutral.
    pub fn combine(codes: impl IntoIterator<Item = PriorityCode>) -> f64 {
        let mut product = 1.0;
        let mut reach_destination = false;
        for code in codes {
            match code {
                PriorityCode::Exclude => return 0.0,
                PriorityCode::ReachDestination => reach_destination = true,
                routable => product *= routable.factor(),
            }
        }
        if reach_destination {
            PriorityCode::ReachDestination.factor()
        } else {
            product.clamp(PriorityCode::Worst.factor(), PriorityCode::Best.factor())
        }
    }

    /// The code whose factor is closest to `factor`.
    pub fn nearest(factor: f64) -> Self {
        [PriorityCode::Exclude, PriorityCode::ReachDestination]
            .into_iter()
            .chain(LADDER)
            .min_by(|a, b| {
                (a.factor() - factor)
                    .abs()
                    .total_cmp(&(b.factor() - factor).abs())
            })
            .unwrap_or_default()
    }
}

impl Display for PriorityCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PriorityCode::Exclude => "EXCLUDE",
            PriorityCode::ReachDestination => "REACH_DESTINATION",
            PriorityCode::Worst => "WORST",
            PriorityCode::Bad => "BAD",
            PriorityCode::AvoidMore => "AVOID_MORE",
            PriorityCode::Avoid => "AVOID",
            PriorityCode::SlightAvoid => "SLIGHT_AVOID",
            PriorityCode::Unchanged => "UNCHANGED",
            PriorityCode::SlightPrefer => "SLIGHT_PREFER",
            PriorityCode::Prefer => "PREFER",
            PriorityCode::VeryNice => "VERY_NICE",
            PriorityCode::Best => "BEST",
        };
        f.write_str(name)
    }
}
