//! Control variables and the local mirror of image parameters.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Valid range for brightness, contrast, saturation and sharpness.
pub const PARAM_RANGE: RangeInclusive<i8> = -2..=2;
/// Valid range for the special effect index.
pub const EFFECT_RANGE: RangeInclusive<i8> = 0..=6;

/// Variables accepted by the camera's `/control` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlVar {
    /// Sensor resolution index.
    Framesize,
    /// JPEG quality; lower is better.
    Quality,
    /// Colour effect index.
    SpecialEffect,
    /// Brightness step.
    Brightness,
    /// Contrast step.
    Contrast,
    /// Saturation step.
    Saturation,
    /// Sharpness step.
    Sharpness,
}

impl ControlVar {
    /// Name used in the query string.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlVar::Framesize => "framesize",
            ControlVar::Quality => "quality",
            ControlVar::SpecialEffect => "special_effect",
            ControlVar::Brightness => "brightness",
            ControlVar::Contrast => "contrast",
            ControlVar::Saturation => "saturation",
            ControlVar::Sharpness => "sharpness",
        }
    }

    /// Accepted values for user-adjustable variables.
    pub fn range(self) -> Option<RangeInclusive<i8>> {
        match self {
            ControlVar::SpecialEffect => Some(EFFECT_RANGE),
            ControlVar::Brightness
            | ControlVar::Contrast
            | ControlVar::Saturation
            | ControlVar::Sharpness => Some(PARAM_RANGE),
            ControlVar::Framesize | ControlVar::Quality => None,
        }
    }
}

impl std::fmt::Display for ControlVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request path setting `var` to `value`.
pub fn control_path(var: ControlVar, value: i32) -> String {
    format!("/control?var={}&val={}", var.as_str(), value)
}

/// Resolution and JPEG quality applied together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeProfile {
    /// Camera framesize enum value.
    pub framesize: u8,
    /// Camera quality level.
    pub quality: u8,
}

/// The three camera configurations the device switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraProfiles {
    /// Low resolution, fast quality for the live feed.
    pub preview: ModeProfile,
    /// High resolution, best quality for snapshots.
    pub capture: ModeProfile,
    /// Medium resolution, best quality for timelapse sessions.
    pub timelapse: ModeProfile,
}

impl Default for CameraProfiles {
    fn default() -> Self {
        Self {
            preview: ModeProfile {
                framesize: 6,
                quality: 0,
            },
            capture: ModeProfile {
                framesize: 13,
                quality: 2,
            },
            timelapse: ModeProfile {
                framesize: 10,
                quality: 2,
            },
        }
    }
}

/// Rejected parameter changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// The variable is set only by mode switches.
    #[error("{var} does not accept user adjustments")]
    NotAdjustable {
        /// Variable named.
        var: ControlVar,
    },
    /// The value is outside the variable's range.
    #[error("{var} value {value} out of range")]
    OutOfRange {
        /// Variable named.
        var: ControlVar,
        /// Rejected value.
        value: i8,
    },
}

/// Step direction for a user adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// One step up.
    Increase,
    /// One step down.
    Decrease,
}

/// Local mirror of the camera's image parameters.
///
/// Updated only after the camera acknowledges a change, and only
/// authoritative until the next read-back from the camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParameterSet {
    /// Brightness, -2..=2.
    pub brightness: i8,
    /// Contrast, -2..=2.
    pub contrast: i8,
    /// Saturation, -2..=2.
    pub saturation: i8,
    /// Sharpness, -2..=2.
    pub sharpness: i8,
    /// Special effect index, 0..=6.
    pub effect: i8,
}

impl RemoteParameterSet {
    /// Current mirrored value of an adjustable variable.
    pub fn get(&self, var: ControlVar) -> Option<i8> {
        match var {
            ControlVar::Brightness => Some(self.brightness),
            ControlVar::Contrast => Some(self.contrast),
            ControlVar::Saturation => Some(self.saturation),
            ControlVar::Sharpness => Some(self.sharpness),
            ControlVar::SpecialEffect => Some(self.effect),
            ControlVar::Framesize | ControlVar::Quality => None,
        }
    }

    /// Checks `value` against the variable's range.
    pub fn validate(var: ControlVar, value: i8) -> Result<(), ParamError> {
        let range = var.range().ok_or(ParamError::NotAdjustable { var })?;
        if !range.contains(&value) {
            return Err(ParamError::OutOfRange { var, value });
        }
        Ok(())
    }

    /// Records an acknowledged value.
    pub fn set(&mut self, var: ControlVar, value: i8) -> Result<(), ParamError> {
        Self::validate(var, value)?;
        match var {
            ControlVar::Brightness => self.brightness = value,
            ControlVar::Contrast => self.contrast = value,
            ControlVar::Saturation => self.saturation = value,
            ControlVar::Sharpness => self.sharpness = value,
            ControlVar::SpecialEffect => self.effect = value,
            ControlVar::Framesize | ControlVar::Quality => {
                return Err(ParamError::NotAdjustable { var })
            }
        }
        Ok(())
    }

    /// Value one step away from the current one, or `None` at the bound.
    pub fn stepped(&self, var: ControlVar, step: Adjustment) -> Option<i8> {
        let current = self.get(var)?;
        let next = match step {
            Adjustment::Increase => current.checked_add(1)?,
            Adjustment::Decrease => current.checked_sub(1)?,
        };
        var.range()?.contains(&next).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_path() {
        assert_eq!(
            control_path(ControlVar::Framesize, 13),
            "/control?var=framesize&val=13"
        );
        assert_eq!(
            control_path(ControlVar::Brightness, -2),
            "/control?var=brightness&val=-2"
        );
    }

    #[test]
    fn test_stepping_stops_at_bounds() {
        let mut params = RemoteParameterSet::default();
        params.set(ControlVar::Contrast, 2).unwrap();
        assert_eq!(params.stepped(ControlVar::Contrast, Adjustment::Increase), None);
        assert_eq!(
            params.stepped(ControlVar::Contrast, Adjustment::Decrease),
            Some(1)
        );
        assert_eq!(params.stepped(ControlVar::SpecialEffect, Adjustment::Decrease), None);
    }

    #[test]
    fn test_range_validation() {
        let mut params = RemoteParameterSet::default();
        assert!(params.set(ControlVar::SpecialEffect, 6).is_ok());
        assert_eq!(
            params.set(ControlVar::SpecialEffect, 7),
            Err(ParamError::OutOfRange {
                var: ControlVar::SpecialEffect,
                value: 7
            })
        );
        assert_eq!(
            params.set(ControlVar::Sharpness, -3),
            Err(ParamError::OutOfRange {
                var: ControlVar::Sharpness,
                value: -3
            })
        );
        assert!(matches!(
            params.set(ControlVar::Quality, 1),
            Err(ParamError::NotAdjustable { .. })
        ));
    }
}
