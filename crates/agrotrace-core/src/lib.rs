pub mod constants;
pub mod error;
pub mod types;
pub mod call;
pub mod participant;
pub mod registry;
pub mod product;

pub use constants::*;
pub use error::{AgroError, ErrorKind};
pub use types::*;
pub use call::*;
pub use participant::*;
pub use registry::*;
pub use product::*;
