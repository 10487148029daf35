use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::SdoError;

/// One instrument/wavelength combination served by Helioviewer and the SDO feed.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub key: &'static str,
    pub source_id: u32,
    pub direct_code: &'static str,
    pub name: &'static str,
    pub wavelength: &'static str,
    pub description: &'static str,
}

pub static SOURCES: &[SourceDescriptor] = &[
    SourceDescriptor {
        key: "AIA_94",
        source_id: 13,
        direct_code: "0094",
        name: "AIA 94",
        wavelength: "94Å",
        description: "Hot flare plasma",
    },
    SourceDescriptor {
        key: "AIA_131",
        source_id: 14,
        direct_code: "0131",
        name: "AIA 131",
        wavelength: "131Å",
        description: "Flaring regions",
    },
    SourceDescriptor {
        key: "AIA_171",
        source_id: 15,
        direct_code: "0171",
        name: "AIA 171",
        wavelength: "171Å",
        description: "Quiet corona and coronal loops",
    },
    SourceDescriptor {
        key: "AIA_193",
        source_id: 16,
        direct_code: "0193",
        name: "AIA 193",
        wavelength: "193Å",
        description: "Hot plasma in active regions",
    },
    SourceDescriptor {
        key: "AIA_211",
        source_id: 17,
        direct_code: "0211",
        name: "AIA 211",
        wavelength: "211Å",
        description: "Active regions",
    },
    SourceDescriptor {
        key: "AIA_304",
        source_id: 18,
        direct_code: "0304",
        name: "AIA 304",
        wavelength: "304Å",
        description: "Chromosphere and prominence",
    },
    SourceDescriptor {
        key: "AIA_335",
        source_id: 19,
        direct_code: "0335",
        name: "AIA 335",
        wavelength: "335Å",
        description: "Active regions",
    },
    SourceDescriptor {
        key: "AIA_1600",
        source_id: 20,
        direct_code: "1600",
        name: "AIA 1600",
        wavelength: "1600Å",
        description: "Upper photosphere",
    },
    SourceDescriptor {
        key: "AIA_1700",
        source_id: 21,
        direct_code: "1700",
        name: "AIA 1700",
        wavelength: "1700Å",
        description: "Temperature minimum",
    },
    SourceDescriptor {
        key: "HMI_Continuum",
        source_id: 22,
        direct_code: "HMIIC",
        name: "HMI Continuum",
        wavelength: "Continuum",
        description: "Solar surface",
    },
    SourceDescriptor {
        key: "HMI_Magnetogram",
        source_id: 23,
        direct_code: "HMIB",
        name: "HMI Magnetogram",
        wavelength: "Magnetogram",
        description: "Magnetic field",
    },
];

/// A validated source key. Only constructible from an entry of [`SOURCES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceKey(&'static SourceDescriptor);

impl SourceKey {
    pub fn as_str(&self) -> &'static str {
        self.0.key
    }

    pub fn descriptor(&self) -> &'static SourceDescriptor {
        self.0
    }

    pub fn all() -> impl Iterator<Item = SourceKey> {
        SOURCES.iter().map(SourceKey)
    }

    pub fn parse_list(values: &[String]) -> Result<Vec<SourceKey>, SdoError> {
        values.iter().map(|value| value.parse()).collect()
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.key)
    }
}

impl FromStr for SourceKey {
    type Err = SdoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        SOURCES
            .iter()
            .find(|descriptor| descriptor.key.eq_ignore_ascii_case(trimmed))
            .map(SourceKey)
            .ok_or_else(|| SdoError::InvalidSource(value.to_string()))
    }
}

impl Serialize for SourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Pre-rendered latest image from the SDO feed.
    #[default]
    Direct,
    /// Closest Helioviewer image rendered as a tile.
    Tile,
    /// Helioviewer screenshot of a single layer.
    Screenshot,
}

impl FetchStrategy {
    pub fn extension(self) -> &'static str {
        match self {
            FetchStrategy::Direct => "jpg",
            FetchStrategy::Tile | FetchStrategy::Screenshot => "png",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Direct => write!(f, "direct"),
            FetchStrategy::Tile => write!(f, "tile"),
            FetchStrategy::Screenshot => write!(f, "screenshot"),
        }
    }
}

/// Named source batches for common observing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    Multiple,
    Comparison,
    ActiveRegion,
    SpaceWeather,
    Prominence,
}

impl Preset {
    pub fn all() -> [Preset; 5] {
        [
            Preset::Multiple,
            Preset::Comparison,
            Preset::ActiveRegion,
            Preset::SpaceWeather,
            Preset::Prominence,
        ]
    }

    pub fn source_keys(self) -> &'static [&'static str] {
        match self {
            Preset::Multiple => &["AIA_171", "AIA_193", "AIA_304", "HMI_Magnetogram"],
            Preset::Comparison => &[
                "AIA_171",
                "AIA_193",
                "AIA_304",
                "AIA_211",
                "HMI_Magnetogram",
                "HMI_Continuum",
            ],
            Preset::ActiveRegion => &[
                "AIA_94",
                "AIA_131",
                "AIA_193",
                "AIA_211",
                "HMI_Magnetogram",
            ],
            Preset::SpaceWeather => &["AIA_193", "HMI_Magnetogram"],
            Preset::Prominence => &["AIA_304", "AIA_171", "HMI_Continuum"],
        }
    }

    pub fn sources(self) -> Vec<SourceKey> {
        self.source_keys()
            .iter()
            .filter_map(|key| key.parse().ok())
            .collect()
    }

    pub fn default_output_dir(self) -> &'static str {
        match self {
            Preset::Multiple => "sdo_data",
            Preset::Comparison => "comparison_set",
            Preset::ActiveRegion => "active_regions",
            Preset::SpaceWeather => "space_weather",
            Preset::Prominence => "prominences",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Preset::Multiple => "Common wavelengths",
            Preset::Comparison => "Multi-wavelength comparison set",
            Preset::ActiveRegion => "Active region / flare observation set",
            Preset::SpaceWeather => "Space weather quick check",
            Preset::Prominence => "Prominence / filament monitoring set",
        }
    }

    pub fn hints(self) -> &'static [&'static str] {
        match self {
            Preset::Multiple => &[],
            Preset::Comparison => &[
                "multi-wavelength composite images",
                "temperature analysis",
                "active region identification",
                "prominence and filament studies",
            ],
            Preset::ActiveRegion => &[
                "solar flares: bright spots in 94Å and 131Å",
                "active region structure: 193Å, 211Å",
                "sunspot magnetic complexity: HMI Magnetogram",
            ],
            Preset::SpaceWeather => &[
                "dark regions in 193Å are coronal holes (fast solar wind)",
                "bright active regions indicate flare potential",
                "complex magnetograms mean higher flare risk",
            ],
            Preset::Prominence => &["304Å shows prominences on the solar limb best"],
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Multiple => "multiple",
            Preset::Comparison => "comparison",
            Preset::ActiveRegion => "active-region",
            Preset::SpaceWeather => "space-weather",
            Preset::Prominence => "prominence",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Preset {
    type Err = SdoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Preset::all()
            .into_iter()
            .find(|preset| preset.to_string().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| SdoError::InvalidPreset(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_source_key_normalizes_case() {
        let key: SourceKey = "aia_171".parse().unwrap();
        assert_eq!(key.as_str(), "AIA_171");
        assert_eq!(key.descriptor().source_id, 15);
    }

    #[test]
    fn parse_source_key_invalid() {
        let err = "AIA_9000".parse::<SourceKey>().unwrap_err();
        assert_matches!(err, SdoError::InvalidSource(_));
    }

    #[test]
    fn preset_sources_are_in_catalog() {
        for preset in Preset::all() {
            assert_eq!(preset.sources().len(), preset.source_keys().len());
        }
    }

    #[test]
    fn strategy_extensions() {
        assert_eq!(FetchStrategy::Direct.extension(), "jpg");
        assert_eq!(FetchStrategy::Tile.extension(), "png");
    }
}
