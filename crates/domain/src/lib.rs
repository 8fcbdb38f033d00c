pub mod entities;
pub mod ports;
pub mod value_objects;

pub use entities::*;
pub use ports::*;
pub use provisioner_errors::{NodeFailure, ProvisionError, ProvisionResult};
pub use value_objects::*;
