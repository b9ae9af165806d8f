//! Feature toggles
//!
//! Algorithm variants are selected through a plain `FeatureFlags` value owned
//! by the engine. Flipping a flag mid-run takes effect the next time a phase
//! asks for it.

use serde::{Deserialize, Serialize};

/// A single toggleable capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Per-step debug statistics
    Logging,
    /// Verlet integration
    Motion,
    /// Global force application (gravity + wind)
    Gravity,
    /// Spatial-hash broad phase with parallel narrow phase
    SpatialHash,
    /// Thermal exchange, cooling and floor heating
    SimulateFire,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Logging,
        Feature::Motion,
        Feature::Gravity,
        Feature::SpatialHash,
        Feature::SimulateFire,
    ];

    /// Bit used for this feature inside `FeatureFlags`
    #[inline]
    pub const fn bit(self) -> u32 {
        match self {
            Feature::Logging => 1 << 0,
            Feature::Motion => 1 << 1,
            Feature::Gravity => 1 << 2,
            Feature::SpatialHash => 1 << 3,
            Feature::SimulateFire => 1 << 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Logging => "logging",
            Feature::Motion => "motion",
            Feature::Gravity => "gravity",
            Feature::SpatialHash => "spatial_hash",
            Feature::SimulateFire => "simulate_fire",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "logging" => Some(Feature::Logging),
            "motion" => Some(Feature::Motion),
            "gravity" => Some(Feature::Gravity),
            "spatial_hash" | "spatial" => Some(Feature::SpatialHash),
            "simulate_fire" | "thermal" | "fire" => Some(Feature::SimulateFire),
            _ => None,
        }
    }
}

/// Bitmask of enabled features.
///
/// Serialized as a list of feature names so settings files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Feature>", into = "Vec<Feature>")]
pub struct FeatureFlags(u32);

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::empty()
            .with(Feature::Motion)
            .with(Feature::Gravity)
            .with(Feature::SpatialHash)
    }
}

impl FeatureFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Feature::ALL.iter().fold(Self::empty(), |flags, f| flags.with(*f))
    }

    /// Build from raw bits; unknown bits are dropped
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::all().0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Builder-style enable
    #[must_use]
    pub const fn with(self, feature: Feature) -> Self {
        Self(self.0 | feature.bit())
    }

    pub fn enable(&mut self, feature: Feature) {
        self.0 |= feature.bit();
    }

    pub fn disable(&mut self, feature: Feature) {
        self.0 &= !feature.bit();
    }

    pub fn toggle(&mut self, feature: Feature) {
        self.0 ^= feature.bit();
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        if enabled {
            self.enable(feature);
        } else {
            self.disable(feature);
        }
    }

    #[inline]
    pub const fn is_enabled(&self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// Enabled features in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(move |f| self.is_enabled(*f))
    }
}

impl From<Vec<Feature>> for FeatureFlags {
    fn from(features: Vec<Feature>) -> Self {
        features
            .into_iter()
            .fold(Self::empty(), |flags, f| flags.with(f))
    }
}

impl From<FeatureFlags> for Vec<Feature> {
    fn from(flags: FeatureFlags) -> Self {
        flags.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = FeatureFlags::default();
        assert!(flags.is_enabled(Feature::Motion));
        assert!(flags.is_enabled(Feature::Gravity));
        assert!(flags.is_enabled(Feature::SpatialHash));
        assert!(!flags.is_enabled(Feature::SimulateFire));
        assert!(!flags.is_enabled(Feature::Logging));
    }

    #[test]
    fn test_enable_disable_toggle() {
        let mut flags = FeatureFlags::empty();
        flags.enable(Feature::SimulateFire);
        assert!(flags.is_enabled(Feature::SimulateFire));
        flags.toggle(Feature::SimulateFire);
        assert!(!flags.is_enabled(Feature::SimulateFire));
        flags.set(Feature::Logging, true);
        assert_eq!(flags.bits(), 1);
        flags.disable(Feature::Logging);
        assert_eq!(flags, FeatureFlags::empty());
    }

    #[test]
    fn test_bits_match_switchboard_layout() {
        let flags = FeatureFlags::empty()
            .with(Feature::SpatialHash)
            .with(Feature::SimulateFire);
        assert_eq!(flags.bits(), 0b11000);
        assert_eq!(FeatureFlags::from_bits(0xFF), FeatureFlags::all());
    }

    #[test]
    fn test_serde_as_names() {
        let flags = FeatureFlags::empty()
            .with(Feature::Gravity)
            .with(Feature::SimulateFire);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["gravity","simulate_fire"]"#);
        let back: FeatureFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(Feature::from_str("Thermal"), Some(Feature::SimulateFire));
        assert_eq!(Feature::from_str("spatial"), Some(Feature::SpatialHash));
        assert_eq!(Feature::from_str("wobble"), None);
        for f in Feature::ALL {
            assert_eq!(Feature::from_str(f.as_str()), Some(f));
        }
    }
}
