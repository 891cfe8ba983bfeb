//! Exclusive owner of the remote camera endpoint.

use super::params::{
    control_path, Adjustment, CameraProfiles, ControlVar, ModeProfile, ParamError,
    RemoteParameterSet,
};
use super::transport::{CameraTransport, HttpResponse, TransportError};
use super::STREAM_PATH;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single request against the camera.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The camera answered with a status other than 200.
    #[error("{path} returned HTTP {status}")]
    Status {
        /// Request path.
        path: String,
        /// HTTP status received.
        status: u16,
    },
    /// The value was rejected before any request was sent.
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// A resolution or quality change the camera did not acknowledge.
#[derive(Debug, Error)]
#[error("failed to set {control} to {value}: {source}")]
pub struct ModeSwitchError {
    /// Variable being set.
    pub control: ControlVar,
    /// Value being set.
    pub value: i32,
    /// Underlying request failure.
    #[source]
    pub source: LinkError,
}

/// Named camera configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraMode {
    /// Live preview.
    Preview,
    /// High resolution still capture.
    Capture,
    /// Timelapse session capture.
    Timelapse,
}

/// What the device believes the camera is currently set to.
///
/// This is a local mirror. After a switch fails half way the camera may
/// hold a different resolution than [`CameraModeState::mode`] suggests,
/// which is why `mode` becomes `None` until a switch fully succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraModeState {
    framesize: Option<u8>,
    quality: Option<u8>,
    mode: Option<CameraMode>,
    switched: bool,
}

impl CameraModeState {
    /// Last acknowledged framesize.
    pub fn framesize(&self) -> Option<u8> {
        self.framesize
    }

    /// Last acknowledged quality.
    pub fn quality(&self) -> Option<u8> {
        self.quality
    }

    /// Profile fully applied by the last successful switch, or `None`
    /// while unknown or after a failed switch.
    pub fn mode(&self) -> Option<CameraMode> {
        self.mode
    }

    /// Returns true when the camera is known to be in preview mode.
    ///
    /// False after a capture whose restore step failed: the live feed then
    /// runs at capture resolution until a later switch succeeds.
    pub fn is_preview(&self) -> bool {
        self.mode == Some(CameraMode::Preview)
    }

    /// Returns true once any switch has been attempted and the camera is
    /// not known to be back in preview.
    pub fn restore_pending(&self) -> bool {
        self.switched && !self.is_preview()
    }
}

/// Camera transport plus the state that must change with it.
///
/// Exactly one of the live feed and a capture protocol may use the camera
/// at a time. The live body is owned here; capture code calls
/// [`CameraLink::stop_live`] before issuing its own requests.
pub struct CameraLink<T: CameraTransport> {
    transport: T,
    profiles: CameraProfiles,
    live: Option<T::Body>,
    mode: CameraModeState,
    params: RemoteParameterSet,
    restart_requested: bool,
    resolution_epoch: u64,
}

impl<T: CameraTransport> CameraLink<T> {
    /// Wraps a transport. No request is made until the first call.
    pub fn new(transport: T, profiles: CameraProfiles) -> Self {
        Self {
            transport,
            profiles,
            live: None,
            mode: CameraModeState::default(),
            params: RemoteParameterSet::default(),
            restart_requested: false,
            resolution_epoch: 0,
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Configured mode profiles.
    pub fn profiles(&self) -> &CameraProfiles {
        &self.profiles
    }

    /// Believed camera mode.
    pub fn mode_state(&self) -> &CameraModeState {
        &self.mode
    }

    /// Mirrored image parameters.
    pub fn params(&self) -> &RemoteParameterSet {
        &self.params
    }

    /// Incremented on every acknowledged framesize change. Cached frame
    /// dimensions are only valid for the epoch they were read in.
    pub fn resolution_epoch(&self) -> u64 {
        self.resolution_epoch
    }

    /// Returns true while the live feed connection is open.
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// The live feed body, if connected.
    pub fn live_mut(&mut self) -> Option<&mut T::Body> {
        self.live.as_mut()
    }

    /// Closes the live feed connection.
    pub fn stop_live(&mut self) {
        if self.live.take().is_some() {
            tracing::info!("Live feed stopped");
        }
    }

    /// Opens the live feed, closing any previous connection first.
    pub fn start_live(&mut self) -> Result<(), LinkError> {
        self.stop_live();
        self.restart_requested = false;

        let response = self.transport.get(STREAM_PATH)?;
        if !response.is_ok() {
            return Err(LinkError::Status {
                path: STREAM_PATH.to_string(),
                status: response.status,
            });
        }

        self.live = Some(response.body);
        self.resolution_epoch += 1;
        tracing::info!(
            framesize = ?self.mode.framesize,
            preview = self.mode.is_preview(),
            "Live feed started"
        );
        Ok(())
    }

    /// Asks the control loop to re-establish the live feed.
    pub fn request_restart(&mut self) {
        self.restart_requested = true;
    }

    /// Returns true if a live feed restart was requested.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Issues a GET and returns the response unchecked.
    pub fn get(&mut self, path: &str) -> Result<HttpResponse<T::Body>, LinkError> {
        tracing::debug!(path, "GET");
        Ok(self.transport.get(path)?)
    }

    /// Sets one control variable, requiring HTTP 200.
    pub fn send_control(&mut self, var: ControlVar, value: i32) -> Result<(), LinkError> {
        let path = control_path(var, value);
        let response = self.transport.get(&path)?;
        tracing::debug!(%var, value, status = response.status, "Control request");

        if !response.is_ok() {
            return Err(LinkError::Status {
                path,
                status: response.status,
            });
        }
        Ok(())
    }

    /// Applies a mode profile, framesize first, stopping at the first
    /// failure.
    pub fn switch_to(&mut self, mode: CameraMode) -> Result<(), ModeSwitchError> {
        let profile = self.profile(mode);
        self.mode.mode = None;
        self.mode.switched = true;
        self.apply_framesize(profile)?;
        self.apply_quality(profile)?;
        self.mode.mode = Some(mode);
        tracing::info!(?mode, framesize = profile.framesize, quality = profile.quality, "Camera mode switched");
        Ok(())
    }

    /// Applies the preview profile, attempting both calls even if the first
    /// fails. Returns the first failure.
    pub fn restore_preview(&mut self) -> Result<(), ModeSwitchError> {
        let profile = self.profiles.preview;
        self.mode.mode = None;
        self.mode.switched = true;
        let framesize = self.apply_framesize(profile);
        let quality = self.apply_quality(profile);

        match (framesize, quality) {
            (Ok(()), Ok(())) => {
                self.mode.mode = Some(CameraMode::Preview);
                tracing::info!("Camera restored to preview mode");
                Ok(())
            }
            (Err(e), _) | (Ok(()), Err(e)) => {
                tracing::warn!(error = %e, "Camera preview restore incomplete");
                Err(e)
            }
        }
    }

    /// Sets a user-adjustable parameter and mirrors it on success.
    pub fn set_parameter(&mut self, var: ControlVar, value: i8) -> Result<(), LinkError> {
        RemoteParameterSet::validate(var, value)?;
        self.send_control(var, i32::from(value))?;
        self.params.set(var, value)?;
        tracing::info!(%var, value, "Camera parameter set");
        Ok(())
    }

    /// Moves a parameter one step. Returns the new value, or `None` without
    /// contacting the camera when already at the bound.
    pub fn adjust(&mut self, var: ControlVar, step: Adjustment) -> Result<Option<i8>, LinkError> {
        match self.params.stepped(var, step) {
            Some(next) => {
                self.set_parameter(var, next)?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    fn profile(&self, mode: CameraMode) -> ModeProfile {
        match mode {
            CameraMode::Preview => self.profiles.preview,
            CameraMode::Capture => self.profiles.capture,
            CameraMode::Timelapse => self.profiles.timelapse,
        }
    }

    fn apply_framesize(&mut self, profile: ModeProfile) -> Result<(), ModeSwitchError> {
        let value = i32::from(profile.framesize);
        self.send_control(ControlVar::Framesize, value)
            .map_err(|source| ModeSwitchError {
                control: ControlVar::Framesize,
                value,
                source,
            })?;
        self.mode.framesize = Some(profile.framesize);
        self.resolution_epoch += 1;
        Ok(())
    }

    fn apply_quality(&mut self, profile: ModeProfile) -> Result<(), ModeSwitchError> {
        let value = i32::from(profile.quality);
        self.send_control(ControlVar::Quality, value)
            .map_err(|source| ModeSwitchError {
                control: ControlVar::Quality,
                value,
                source,
            })?;
        self.mode.quality = Some(profile.quality);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{MockReply, MockTransport};

    fn link() -> CameraLink<MockTransport> {
        CameraLink::new(MockTransport::new(), CameraProfiles::default())
    }

    #[test]
    fn test_switch_records_mode() {
        let mut link = link();
        link.switch_to(CameraMode::Capture).unwrap();

        assert_eq!(link.mode_state().mode(), Some(CameraMode::Capture));
        assert_eq!(link.mode_state().framesize(), Some(13));
        assert_eq!(link.mode_state().quality(), Some(2));
        assert_eq!(
            link.transport().requests(),
            &[
                "/control?var=framesize&val=13".to_string(),
                "/control?var=quality&val=2".to_string(),
            ]
        );
    }

    #[test]
    fn test_failed_quality_leaves_mode_unknown() {
        let mut link = link();
        link.transport_mut()
            .push("/control?var=quality&val=2", MockReply::status(500));

        let err = link.switch_to(CameraMode::Capture).unwrap_err();
        assert_eq!(err.control, ControlVar::Quality);
        assert_eq!(link.mode_state().mode(), None);
        assert_eq!(link.mode_state().framesize(), Some(13));
        assert!(!link.mode_state().is_preview());
        assert!(link.mode_state().restore_pending());
    }

    #[test]
    fn test_restore_attempts_both_calls() {
        let mut link = link();
        link.transport_mut()
            .push("/control?var=framesize&val=6", MockReply::status(503));

        assert!(link.restore_preview().is_err());
        assert_eq!(link.transport().count("/control?var=quality&val=0"), 1);
        assert_eq!(link.mode_state().quality(), Some(0));
        assert!(!link.mode_state().is_preview());
    }

    #[test]
    fn test_live_feed_lifecycle() {
        let mut link = link();
        link.request_restart();
        link.start_live().unwrap();
        assert!(link.is_live());
        assert!(!link.restart_requested());

        link.stop_live();
        assert!(!link.is_live());
    }

    #[test]
    fn test_live_feed_rejected_status() {
        let mut link = link();
        link.transport_mut().push("/stream", MockReply::status(404));
        assert!(matches!(
            link.start_live(),
            Err(LinkError::Status { status: 404, .. })
        ));
        assert!(!link.is_live());
    }

    #[test]
    fn test_adjust_at_bound_sends_nothing() {
        let mut link = link();
        assert_eq!(
            link.adjust(ControlVar::Brightness, Adjustment::Increase).unwrap(),
            Some(1)
        );
        assert_eq!(
            link.adjust(ControlVar::Brightness, Adjustment::Increase).unwrap(),
            Some(2)
        );
        assert_eq!(
            link.adjust(ControlVar::Brightness, Adjustment::Increase).unwrap(),
            None
        );
        assert_eq!(link.transport().count("/control?var=brightness"), 2);
        assert_eq!(link.params().brightness, 2);
    }

    #[test]
    fn test_rejected_parameter_not_mirrored() {
        let mut link = link();
        link.transport_mut()
            .push("/control?var=special_effect&val=3", MockReply::status(500));
        assert!(link.set_parameter(ControlVar::SpecialEffect, 3).is_err());
        assert_eq!(link.params().effect, 0);
    }
}
