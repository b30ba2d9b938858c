pub mod collect;
pub mod config;
pub mod error;
pub mod geo_core;
pub mod geometric;
pub mod maps;
pub mod render;

pub use collect::paths::PathBundle;
pub use config::{Capabilities, RenderConfig};
pub use error::{ErrorKind, MapError, Result};
pub use geometric::mask::StateCode;
pub use maps::{MapDriver, MapKind, MapOutcome, MapRequest, RegionType};
