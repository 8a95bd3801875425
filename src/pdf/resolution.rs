//! Resolution policy: quality tier + memory pressure → upscale factor

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rasterization quality preferred by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionTier {
    #[default]
    Low,
    Medium,
    High,
}

impl ResolutionTier {
    /// Integer factor applied to the page's intrinsic size
    #[must_use]
    pub const fn upscale_factor(self) -> u32 {
        match self {
            Self::Low => 2,
            Self::Medium => 3,
            Self::High => 4,
        }
    }

    /// One tier lower, floored at `Low`
    #[must_use]
    pub const fn downgrade(self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown resolution tier '{0}' (expected low, medium or high)")]
pub struct ParseTierError(String);

impl FromStr for ResolutionTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(ParseTierError(s.to_string())),
        }
    }
}

/// Coarse memory pressure level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryPressure {
    #[default]
    Normal,
    High,
}

/// Pick the tier to actually render at.
///
/// Under high pressure the preferred tier drops by one step.
#[must_use]
pub const fn resolve(preferred: ResolutionTier, pressure: MemoryPressure) -> ResolutionTier {
    match pressure {
        MemoryPressure::Normal => preferred,
        MemoryPressure::High => preferred.downgrade(),
    }
}
