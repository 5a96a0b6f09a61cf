//! Core module - Instance registry, lifecycle controller and settings

mod controller;
mod error;
mod geometry;
mod headers;
mod instance;
mod registry;
pub mod settings;

pub use controller::{Activation, LifecycleController};
pub use error::{CreationStep, LifecycleError};
pub use geometry::WindowGeometry;
pub use headers::with_isolation_headers;
pub use instance::{InstanceRecord, LifecycleState};
pub use registry::InstanceRegistry;
pub use settings::Settings;
