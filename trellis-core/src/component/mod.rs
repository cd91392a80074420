//! Components
//!
//! A component is a named factory registered with the engine. Elements whose
//! tag names a registered component are handed to the instance manager
//! instead of becoming plain elements.

mod factory;
mod instance;

pub use factory::{ApiMethod, Completion, ComponentOutput, Factory, Lifecycle, RenderFn};
pub use instance::{InstanceId, UpdateOutcome, LOCAL_ROOT};

pub(crate) use instance::InstanceManager;
