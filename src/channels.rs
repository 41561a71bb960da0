/// Channel registry for a comparison run.
///
/// Every series entering the pipeline is described here with an explicit
/// `ChannelKind`, its source instrument and (where meaningful) its height.
/// Downstream stages look channels up by kind / source / height instead of
/// inferring meaning from file or column names.
///
/// A registry is built fresh for each run and passed through the pipeline;
/// there is no process-wide channel state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AnalysisError, ChannelId, SensorSeries};

// ---------------------------------------------------------------------------
// Channel kinds
// ---------------------------------------------------------------------------

/// Physical quantity carried by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    WindSpeed,
    WindSpeedDispersion,
    DataAvailability,
    Cnr,
    VerticalWind,
    Temperature,
    InternalTemperature,
    Humidity,
    Pressure,
    WiperCount,
    BatteryVoltage,
}

impl ChannelKind {
    /// Whether the lidar reports this quantity once per measurement height.
    pub fn is_height_resolved(&self) -> bool {
        matches!(
            self,
            ChannelKind::WindSpeed
                | ChannelKind::WindSpeedDispersion
                | ChannelKind::DataAvailability
                | ChannelKind::Cnr
                | ChannelKind::VerticalWind
        )
    }

    /// Column header the lidar export uses for this quantity.
    ///
    /// Height-resolved kinds need `height_m`; kinds the lidar never reports
    /// return `None`.
    pub fn lidar_column(&self, height_m: Option<u32>) -> Option<String> {
        if self.is_height_resolved() {
            let h = height_m?;
            let suffix = match self {
                ChannelKind::WindSpeed => "Wind Speed (m/s)",
                ChannelKind::WindSpeedDispersion => "Wind Speed Dispersion (m/s)",
                ChannelKind::DataAvailability => "Data Availability (%)",
                ChannelKind::Cnr => "CNR (dB)",
                ChannelKind::VerticalWind => "Z-wind (m/s)",
                _ => return None,
            };
            return Some(format!("{}m {}", h, suffix));
        }
        let column = match self {
            ChannelKind::Temperature => "Ext Temp (°C)",
            ChannelKind::InternalTemperature => "Int Temp (°C)",
            ChannelKind::Humidity => "Rel Humidity (%)",
            ChannelKind::Pressure => "Pressure (hPa)",
            ChannelKind::WiperCount => "Wiper count",
            ChannelKind::BatteryVoltage => "Vbatt (V)",
            _ => return None,
        };
        Some(column.to_string())
    }
}

/// Instrument a channel comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    Lidar,
    /// A met mast installation, identified by name (e.g. `"mmv1"`).
    MetMast(String),
}

/// Metadata for one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub source: SourceKind,
    /// Measurement height in metres. `None` for station-level sensors such
    /// as a barometer shared by several logical heights.
    pub height_m: Option<u32>,
}

impl ChannelDescriptor {
    pub fn lidar(kind: ChannelKind, height_m: Option<u32>) -> Self {
        let id = match height_m {
            Some(h) => format!("lidar_{}m_{:?}", h, kind),
            None => format!("lidar_{:?}", kind),
        };
        ChannelDescriptor {
            id: ChannelId::new(id),
            kind,
            source: SourceKind::Lidar,
            height_m,
        }
    }

    pub fn mast(mast: &str, kind: ChannelKind, height_m: Option<u32>) -> Self {
        let id = match height_m {
            Some(h) => format!("{}_{}m_{:?}", mast, h, kind),
            None => format!("{}_{:?}", mast, kind),
        };
        ChannelDescriptor {
            id: ChannelId::new(id),
            kind,
            source: SourceKind::MetMast(mast.to_string()),
            height_m,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Descriptors and series for every channel taking part in one run.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    descriptors: BTreeMap<ChannelId, ChannelDescriptor>,
    series: BTreeMap<ChannelId, SensorSeries>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a series under its descriptor.
    ///
    /// The series must carry the descriptor's id, and the id must not be
    /// registered yet.
    pub fn register(
        &mut self,
        descriptor: ChannelDescriptor,
        series: SensorSeries,
    ) -> Result<(), AnalysisError> {
        if series.channel() != &descriptor.id {
            return Err(AnalysisError::Config(format!(
                "series '{}' registered under descriptor '{}'",
                series.channel(),
                descriptor.id
            )));
        }
        if self.contains(&descriptor.id) {
            return Err(AnalysisError::Config(format!(
                "channel '{}' registered twice",
                descriptor.id
            )));
        }
        let id = descriptor.id.clone();
        self.descriptors.insert(id.clone(), descriptor);
        self.series.insert(id, series);
        Ok(())
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.descriptors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor(&self, id: &ChannelId) -> Result<&ChannelDescriptor, AnalysisError> {
        self.descriptors
            .get(id)
            .ok_or_else(|| AnalysisError::UnknownChannel(id.to_string()))
    }

    pub fn series(&self, id: &ChannelId) -> Result<&SensorSeries, AnalysisError> {
        self.series
            .get(id)
            .ok_or_else(|| AnalysisError::UnknownChannel(id.to_string()))
    }

    /// Finds the channel with the given kind and source. When `height_m`
    /// is `Some`, the channel must be at that height.
    pub fn find(
        &self,
        kind: ChannelKind,
        source: &SourceKind,
        height_m: Option<u32>,
    ) -> Option<&ChannelDescriptor> {
        self.descriptors.values().find(|d| {
            d.kind == kind
                && &d.source == source
                && (height_m.is_none() || d.height_m == height_m)
        })
    }

    /// Like `find`, but a missing channel is a hard failure.
    pub fn require(
        &self,
        kind: ChannelKind,
        source: &SourceKind,
        height_m: Option<u32>,
    ) -> Result<&ChannelDescriptor, AnalysisError> {
        self.find(kind, source, height_m).ok_or_else(|| {
            let at = height_m.map(|h| format!(" at {}m", h)).unwrap_or_default();
            AnalysisError::MissingChannel {
                channel: format!("{:?}{}", kind, at),
                context: format!("registry for source {:?}", source),
            }
        })
    }

    /// All channels of one kind, in id order.
    pub fn of_kind(&self, kind: ChannelKind) -> Vec<&ChannelDescriptor> {
        self.descriptors.values().filter(|d| d.kind == kind).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
