//! Core Data Models
//!
//! This module defines the value types that flow through the usage tracking
//! pipeline, from a single interpreted command up to the snapshot pushed to
//! subscribers.
//!
//! ## Data Flow
//!
//! 1. **Interpretation**: [`MaterialDelta`] - material consumed by one motion command
//! 2. **Persistence**: [`LifetimeDelta`] - amounts added to the durable store in one write
//! 3. **Durable totals**: [`LifetimeStats`] - the single lifetime row
//! 4. **Output**: [`Snapshot`] - point-in-time view used for change detection and notification
//!
//! Material is measured in the extrusion axis unit (millimetres of filament
//! for common firmware). Time values are [`Duration`]s in memory and seconds
//! on disk and on the wire.

use serde::{Serialize, Serializer};
use std::ops::AddAssign;
use std::time::Duration;

/// Whether `E` words in motion commands are absolute positions or increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateMode {
    #[default]
    Unknown,
    Absolute,
    Relative,
}

/// Material consumed by a single command.
///
/// `first_layer` is either equal to `material` (command ran on the first
/// layer) or zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaterialDelta {
    pub material: f64,
    pub first_layer: f64,
}

impl MaterialDelta {
    pub fn new(material: f64, on_first_layer: bool) -> Self {
        Self {
            material,
            first_layer: if on_first_layer { material } else { 0.0 },
        }
    }

    pub fn is_zero(&self) -> bool {
        self.material == 0.0 && self.first_layer == 0.0
    }
}

impl AddAssign for MaterialDelta {
    fn add_assign(&mut self, rhs: Self) {
        self.material += rhs.material;
        self.first_layer += rhs.first_layer;
    }
}

/// Durable lifetime totals. Never reset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LifetimeStats {
    pub extruded_material: f64,
    pub extruded_material_first_layer: f64,
    #[serde(serialize_with = "serialize_secs")]
    pub time_at_temperature: Duration,
}

impl LifetimeStats {
    /// Totals as they will be once `delta` is persisted.
    pub fn with_delta(&self, delta: &LifetimeDelta) -> Self {
        Self {
            extruded_material: self.extruded_material + delta.material,
            extruded_material_first_layer: self.extruded_material_first_layer
                + delta.first_layer_material,
            time_at_temperature: self.time_at_temperature + delta.time_at_temperature,
        }
    }
}

/// Amounts added to [`LifetimeStats`] in one atomic store write.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LifetimeDelta {
    pub material: f64,
    pub first_layer_material: f64,
    pub time_at_temperature: Duration,
}

impl LifetimeDelta {
    pub fn is_empty(&self) -> bool {
        self.material == 0.0
            && self.first_layer_material == 0.0
            && self.time_at_temperature.is_zero()
    }
}

impl From<MaterialDelta> for LifetimeDelta {
    fn from(delta: MaterialDelta) -> Self {
        Self {
            material: delta.material,
            first_layer_material: delta.first_layer,
            time_at_temperature: Duration::ZERO,
        }
    }
}

impl AddAssign for LifetimeDelta {
    fn add_assign(&mut self, rhs: Self) {
        self.material += rhs.material;
        self.first_layer_material += rhs.first_layer_material;
        self.time_at_temperature += rhs.time_at_temperature;
    }
}

/// Point-in-time summary of session and lifetime metrics.
///
/// Compared by structural equality to decide whether a notification is due.
/// The serialized field names are the notification message fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Snapshot {
    pub extruded_material: f64,
    pub extruded_material_first_layer: f64,
    pub lifetime_extruded_material: f64,
    pub lifetime_extruded_material_first_layer: f64,
    #[serde(serialize_with = "serialize_secs")]
    pub time_at_temperature: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub lifetime_time_at_temperature: Duration,
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Convert stored seconds back into a [`Duration`], clamping garbage to zero.
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_delta_first_layer() {
        let delta = MaterialDelta::new(2.5, true);
        assert_eq!(delta.first_layer, 2.5);

        let delta = MaterialDelta::new(2.5, false);
        assert_eq!(delta.first_layer, 0.0);
        assert!(!delta.is_zero());
    }

    #[test]
    fn test_snapshot_serializes_seconds() {
        let snapshot = Snapshot {
            extruded_material: 12.0,
            time_at_temperature: Duration::from_millis(1500),
            lifetime_time_at_temperature: Duration::from_secs(90),
            ..Default::default()
        };

        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["extruded_material"], 12.0);
        assert_eq!(json["time_at_temperature"], 1.5);
        assert_eq!(json["lifetime_time_at_temperature"], 90.0);
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_duration_from_secs_rejects_garbage() {
        assert_eq!(duration_from_secs(-3.0), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(2.0), Duration::from_secs(2));
    }

    #[test]
    fn test_lifetime_delta_accumulates() {
        let mut total = LifetimeDelta::default();
        assert!(total.is_empty());

        total += LifetimeDelta::from(MaterialDelta::new(3.0, true));
        total += LifetimeDelta {
            time_at_temperature: Duration::from_secs(4),
            ..Default::default()
        };

        assert_eq!(total.material, 3.0);
        assert_eq!(total.first_layer_material, 3.0);
        assert_eq!(total.time_at_temperature, Duration::from_secs(4));
    }

    #[test]
    fn test_lifetime_with_delta() {
        let stats = LifetimeStats {
            extruded_material: 100.0,
            extruded_material_first_layer: 10.0,
            time_at_temperature: Duration::from_secs(60),
        };
        let delta = LifetimeDelta {
            material: 5.0,
            first_layer_material: 0.0,
            time_at_temperature: Duration::from_secs(30),
        };

        let credited = stats.with_delta(&delta);
        assert_eq!(credited.extruded_material, 105.0);
        assert_eq!(credited.extruded_material_first_layer, 10.0);
        assert_eq!(credited.time_at_temperature, Duration::from_secs(90));
        assert_eq!(stats.with_delta(&LifetimeDelta::default()), stats);
    }
}
