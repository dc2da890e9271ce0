//! Ducking - automatic attenuation of background audio during events
//!
//! The first active event fades the background down to the configured
//! percentage; removing the last one fades it back to 100%. The mix path
//! reads the result through [`AttenuationSource`](crate::engine::AttenuationSource).

mod fade;
mod service;

pub use fade::FadePlan;
pub use service::*;
