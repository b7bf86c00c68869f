//! Viewport — the visible map region, its bounding box, and its quantized key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of quantization steps per degree (4 decimal digits).
pub const QUANTIZATION_STEPS_PER_DEGREE: f64 = 10_000.0;

/// A map region given by its center and its full angular span.
///
/// `latitude_delta` / `longitude_delta` are the *full* span of the visible
/// region, not the half-span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

/// A `[west, south, east, north]` rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Viewport {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, latitude_delta: f64, longitude_delta: f64) -> Self {
        Self {
            latitude,
            longitude,
            latitude_delta,
            longitude_delta,
        }
    }

    /// Convert the region into its bounding box.
    ///
    /// No clamping to `[-180, 180]` / `[-90, 90]` is performed; a region
    /// straddling the anti-meridian yields `west < -180` or `east > 180`.
    #[must_use]
    pub fn to_bbox(&self) -> BoundingBox {
        BoundingBox {
            west: self.longitude - self.longitude_delta / 2.0,
            south: self.latitude - self.latitude_delta / 2.0,
            east: self.longitude + self.longitude_delta / 2.0,
            north: self.latitude + self.latitude_delta / 2.0,
        }
    }

    /// Round every component to the quantization grid.
    #[must_use]
    pub fn quantize(&self) -> ViewportKey {
        ViewportKey {
            latitude: quantize(self.latitude),
            longitude: quantize(self.longitude),
            latitude_delta: quantize(self.latitude_delta),
            longitude_delta: quantize(self.longitude_delta),
        }
    }
}

impl BoundingBox {
    /// The box as `[west, south, east, north]`.
    #[must_use]
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

/// A viewport snapped to the quantization grid, in integer grid steps.
///
/// Two viewports that differ by less than half a grid step in every
/// component share a key, so continuous gesture jitter does not defeat
/// caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewportKey {
    latitude: i64,
    longitude: i64,
    latitude_delta: i64,
    longitude_delta: i64,
}

impl ViewportKey {
    /// The grid-snapped viewport this key stands for.
    #[must_use]
    pub fn to_viewport(&self) -> Viewport {
        Viewport {
            latitude: dequantize(self.latitude),
            longitude: dequantize(self.longitude),
            latitude_delta: dequantize(self.latitude_delta),
            longitude_delta: dequantize(self.longitude_delta),
        }
    }
}

impl fmt::Display for ViewportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4},{:.4},{:.4},{:.4}",
            dequantize(self.latitude),
            dequantize(self.longitude),
            dequantize(self.latitude_delta),
            dequantize(self.longitude_delta)
        )
    }
}

#[allow(clippy::cast_possible_truncation)]
fn quantize(value: f64) -> i64 {
    (value * QUANTIZATION_STEPS_PER_DEGREE).round() as i64
}

#[allow(clippy::cast_precision_loss)]
fn dequantize(steps: i64) -> f64 {
    steps as f64 / QUANTIZATION_STEPS_PER_DEGREE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_compute_bbox_from_center_and_full_span() {
        let bbox = Viewport::new(37.0, -119.5, 10.0, 11.0).to_bbox();
        assert_eq!(bbox.to_array(), [-125.0, 32.0, -114.0, 42.0]);
    }

    #[test]
    fn should_keep_west_below_east_and_south_below_north_for_positive_spans() {
        let samples = [
            Viewport::new(0.0, 0.0, 0.001, 0.001),
            Viewport::new(-89.0, 179.9, 2.0, 0.5),
            Viewport::new(45.123_456, -73.987_654, 0.25, 0.35),
            Viewport::new(10.0, 170.0, 30.0, 40.0),
        ];
        for viewport in samples {
            let bbox = viewport.to_bbox();
            assert!(bbox.west < bbox.east, "{viewport:?}");
            assert!(bbox.south < bbox.north, "{viewport:?}");
        }
    }

    #[test]
    fn should_not_clamp_across_the_anti_meridian() {
        let bbox = Viewport::new(0.0, 175.0, 10.0, 20.0).to_bbox();
        assert_eq!(bbox.east, 185.0);
        assert_eq!(bbox.west, 165.0);
    }

    #[test]
    fn should_format_bbox_as_csv() {
        let bbox = Viewport::new(0.0, 0.0, 180.0, 360.0).to_bbox();
        assert_eq!(bbox.to_string(), "-180,-90,180,90");
    }

    #[test]
    fn should_share_key_when_viewports_differ_below_grid_resolution() {
        let a = Viewport::new(37.774_90, -122.419_40, 0.092_20, 0.042_10);
        let b = Viewport::new(37.774_91, -122.419_41, 0.092_21, 0.042_09);
        assert_eq!(a.quantize(), b.quantize());
    }

    #[test]
    fn should_split_keys_when_viewports_differ_above_grid_resolution() {
        let a = Viewport::new(37.7749, -122.4194, 0.0922, 0.0421);
        let b = Viewport::new(37.7751, -122.4194, 0.0922, 0.0421);
        assert_ne!(a.quantize(), b.quantize());
    }

    #[test]
    fn should_snap_viewport_to_grid() {
        let key = Viewport::new(37.774_93, -122.419_36, 0.1, 0.2).quantize();
        let snapped = key.to_viewport();
        assert!((snapped.latitude - 37.7749).abs() < 1e-9);
        assert!((snapped.longitude + 122.4194).abs() < 1e-9);
        assert_eq!(key.to_string(), "37.7749,-122.4194,0.1000,0.2000");
    }

    #[test]
    fn should_deserialize_camel_case_region() {
        let json = r#"{"latitude":1.5,"longitude":2.5,"latitudeDelta":0.5,"longitudeDelta":0.25}"#;
        let viewport: Viewport = serde_json::from_str(json).unwrap();
        assert_eq!(viewport, Viewport::new(1.5, 2.5, 0.5, 0.25));
    }
}
