use derivative::Derivative;
use serde_derive::{Deserialize, Serialize};

use crate::{
    errors::ConfigError,
    transform::{CalibratedBounds, Orientation},
};

/// Factory bounds, good enough for most U810 panels.
pub const TOUCH_MIN_X: i32 = 130;
pub const TOUCH_MIN_Y: i32 = 250;
pub const TOUCH_MAX_X: i32 = 3820;
pub const TOUCH_MAX_Y: i32 = 3920;

/// Parameters as persisted by the helper, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Derivative)]
#[derivative(Default)]
pub struct Params {
    pub orientation: i32,
    pub calibrate: bool,
    #[derivative(Default(value = "TOUCH_MIN_X"))]
    pub touch_min_x: i32,
    #[derivative(Default(value = "TOUCH_MIN_Y"))]
    pub touch_min_y: i32,
    #[derivative(Default(value = "TOUCH_MAX_X"))]
    pub touch_max_x: i32,
    #[derivative(Default(value = "TOUCH_MAX_Y"))]
    pub touch_max_y: i32,
    /// Log every decoded sample.
    pub print_position: bool,
    /// Bumped by the helper to request a tracker reset.
    pub calibration_reset: u32,
}

impl Params {
    pub fn device_config(&self) -> Result<DeviceConfig, ConfigError> {
        Ok(DeviceConfig {
            orientation: Orientation::try_from(self.orientation)?,
            bounds: CalibratedBounds::new(
                self.touch_min_x,
                self.touch_min_y,
                self.touch_max_x,
                self.touch_max_y,
            )?,
            calibrate: self.calibrate,
            print_position: self.print_position,
        })
    }

    /// Whether moving from `self` to `next` changes what an attached session
    /// was configured with.
    pub fn requires_reattach(&self, next: &Params) -> bool {
        self.orientation != next.orientation
            || self.calibrate != next.calibrate
            || self.print_position != next.print_position
            || (self.touch_min_x, self.touch_min_y, self.touch_max_x, self.touch_max_y)
                != (next.touch_min_x, next.touch_min_y, next.touch_max_x, next.touch_max_y)
    }
}

/// Validated per-session configuration, fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub orientation: Orientation,
    pub bounds: CalibratedBounds,
    pub calibrate: bool,
    pub print_position: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_factory_calibration() {
        let config = Params::default().device_config().unwrap();
        assert_eq!(config.orientation, Orientation::Normal);
        assert!(!config.calibrate);
        assert_eq!(
            config.bounds,
            CalibratedBounds::new(130, 250, 3820, 3920).unwrap()
        );
    }

    #[test]
    fn rejects_unknown_orientation() {
        let params = Params {
            orientation: 7,
            ..Default::default()
        };
        assert_eq!(params.device_config(), Err(ConfigError::Orientation(7)));
    }

    #[test]
    fn rejects_degenerate_bounds_before_transform() {
        let params = Params {
            touch_min_y: 500,
            touch_max_y: 500,
            ..Default::default()
        };
        assert!(matches!(
            params.device_config(),
            Err(ConfigError::DegenerateBounds { axis: 'y', .. })
        ));
    }

    #[test]
    fn reset_counter_alone_does_not_reattach() {
        let current = Params::default();
        let bumped = Params {
            calibration_reset: 3,
            ..current.clone()
        };
        assert!(!current.requires_reattach(&bumped));

        let rotated = Params {
            orientation: 3,
            ..current.clone()
        };
        assert!(current.requires_reattach(&rotated));
    }
}
