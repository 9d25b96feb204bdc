//! Instruction-set tokens and host CPU capability checks.
//!
//! Engine builds are compiled for a named CPU feature level. The token given
//! at startup selects the build; [`ISA_TABLE`] maps every known token to the
//! CPU features the build needs, so adding a level means adding one row.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::AppError;

/// Individual CPU features an engine build may depend on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CpuFeature {
    /// AVX-512 Vector Neural Network Instructions.
    Avx512Vnni,
    /// AVX-512 Foundation.
    Avx512F,
    /// VEX-encoded (256-bit) VNNI.
    AvxVnni,
    /// Bit Manipulation Instruction Set 2.
    Bmi2,
    /// Advanced Vector Extensions 2.
    Avx2,
    /// SSE 4.1.
    Sse41,
    /// Population count.
    Popcnt,
}

impl Display for CpuFeature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Avx512Vnni => "avx512vnni",
            Self::Avx512F => "avx512f",
            Self::AvxVnni => "avxvnni",
            Self::Bmi2 => "bmi2",
            Self::Avx2 => "avx2",
            Self::Sse41 => "sse4.1",
            Self::Popcnt => "popcnt",
        };
        f.write_str(name)
    }
}

/// Named CPU feature levels that engine builds are published for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InstructionSet {
    /// `vnni512`
    Vnni512,
    /// `avx512`
    Avx512,
    /// `avx512f`
    Avx512F,
    /// `avxvnni`
    AvxVnni,
    /// `bmi2`
    Bmi2,
    /// `avx2`
    Avx2,
    /// `sse41-popcnt`
    Sse41Popcnt,
}

/// One row of the token lookup table.
#[derive(Debug)]
pub struct IsaEntry {
    /// Lowercase token as it appears in binary file names.
    pub token: &'static str,
    /// Enumerated level.
    pub isa: InstructionSet,
    /// Every feature the host must report for the build to run.
    pub requires: &'static [CpuFeature],
}

/// Token to required-feature table, ordered from most to least demanding.
pub const ISA_TABLE: &[IsaEntry] = &[
    IsaEntry {
        token: "vnni512",
        isa: InstructionSet::Vnni512,
        requires: &[CpuFeature::Avx512Vnni],
    },
    IsaEntry {
        token: "avx512",
        isa: InstructionSet::Avx512,
        requires: &[CpuFeature::Avx512F],
    },
    IsaEntry {
        token: "avx512f",
        isa: InstructionSet::Avx512F,
        requires: &[CpuFeature::Avx512F],
    },
    IsaEntry {
        token: "avxvnni",
        isa: InstructionSet::AvxVnni,
        requires: &[CpuFeature::AvxVnni],
    },
    IsaEntry {
        token: "bmi2",
        isa: InstructionSet::Bmi2,
        requires: &[CpuFeature::Bmi2],
    },
    IsaEntry {
        token: "avx2",
        isa: InstructionSet::Avx2,
        requires: &[CpuFeature::Avx2],
    },
    IsaEntry {
        token: "sse41-popcnt",
        isa: InstructionSet::Sse41Popcnt,
        requires: &[CpuFeature::Sse41, CpuFeature::Popcnt],
    },
];

/// Token used when none is configured.
pub const DEFAULT_ISA_TOKEN: &str = "bmi2";

impl InstructionSet {
    fn entry(self) -> Option<&'static IsaEntry> {
        ISA_TABLE.iter().find(|entry| entry.isa == self)
    }

    /// Canonical lowercase token.
    #[must_use]
    pub fn token(self) -> &'static str {
        self.entry().map_or("", |entry| entry.token)
    }

    /// CPU features a build for this level requires.
    #[must_use]
    pub fn required_features(self) -> &'static [CpuFeature] {
        self.entry().map_or(&[] as &[CpuFeature], |entry| entry.requires)
    }

    /// Whether `probe` reports every required feature.
    #[must_use]
    pub fn is_supported_by(self, probe: &dyn CpuProbe) -> bool {
        self.required_features().iter().all(|&f| probe.has(f))
    }
}

impl FromStr for InstructionSet {
    type Err = AppError;

    /// Case-insensitive token lookup.
    fn from_str(token: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = token.trim().to_ascii_lowercase();
        ISA_TABLE
            .iter()
            .find(|entry| entry.token == wanted)
            .map(|entry| entry.isa)
            .ok_or_else(|| AppError::Capability(format!("unknown instruction set: {token}")))
    }
}

impl Display for InstructionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Source of CPU feature information.
pub trait CpuProbe: Send + Sync {
    /// Whether the CPU supports `feature`.
    fn has(&self, feature: CpuFeature) -> bool;
}

/// Probe backed by runtime detection on the host CPU.
#[derive(Debug, Default, Copy, Clone)]
pub struct HostCpu;

impl CpuProbe for HostCpu {
    #[cfg(target_arch = "x86_64")]
    fn has(&self, feature: CpuFeature) -> bool {
        match feature {
            CpuFeature::Avx512Vnni => std::arch::is_x86_feature_detected!("avx512vnni"),
            CpuFeature::Avx512F => std::arch::is_x86_feature_detected!("avx512f"),
            CpuFeature::AvxVnni => std::arch::is_x86_feature_detected!("avxvnni"),
            CpuFeature::Bmi2 => std::arch::is_x86_feature_detected!("bmi2"),
            CpuFeature::Avx2 => std::arch::is_x86_feature_detected!("avx2"),
            CpuFeature::Sse41 => std::arch::is_x86_feature_detected!("sse4.1"),
            CpuFeature::Popcnt => std::arch::is_x86_feature_detected!("popcnt"),
        }
    }

    // Every feature in the table is x86-specific.
    #[cfg(not(target_arch = "x86_64"))]
    fn has(&self, _feature: CpuFeature) -> bool {
        false
    }
}

/// Probe that reports a fixed feature set.
#[derive(Debug, Default, Clone)]
pub struct FixedCpu {
    features: Vec<CpuFeature>,
}

impl FixedCpu {
    /// Probe reporting exactly `features`.
    #[must_use]
    pub fn new(features: &[CpuFeature]) -> Self {
        Self {
            features: features.to_vec(),
        }
    }
}

impl CpuProbe for FixedCpu {
    fn has(&self, feature: CpuFeature) -> bool {
        self.features.contains(&feature)
    }
}
