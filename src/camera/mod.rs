//! Remote camera access.
//!
//! The camera is reached through its HTTP control surface. The transport
//! itself is a capability trait ([`CameraTransport`]) so the control loop
//! can run against a real HTTP client or a scripted mock. [`CameraLink`]
//! owns the transport together with the live feed connection and the local
//! mirror of the camera's mode and image parameters.

mod link;
mod mock;
mod params;
mod transport;

#[cfg(feature = "http")]
mod http;

pub use link::{CameraLink, CameraMode, CameraModeState, LinkError, ModeSwitchError};
pub use mock::{MockBody, MockReply, MockTransport};
pub use params::{
    control_path, Adjustment, CameraProfiles, ControlVar, ModeProfile, ParamError,
    RemoteParameterSet, EFFECT_RANGE, PARAM_RANGE,
};
pub use transport::{CameraTransport, HttpResponse, TransportError};

#[cfg(feature = "http")]
pub use http::{ReqwestTransport, ResponseBody};

/// Path of the single-image endpoint.
pub const CAPTURE_PATH: &str = "/capture";
/// Path of the raw concatenated-JPEG live endpoint.
pub const STREAM_PATH: &str = "/stream";
