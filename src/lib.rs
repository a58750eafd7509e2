mod backend;
mod decode;
mod errors;
mod lifecycle;
mod registry;
mod scopes;
mod settings;
pub mod utils;

pub use backend::*;
pub use decode::*;
pub use errors::*;
pub use lifecycle::*;
pub use registry::*;
pub use scopes::*;
pub use settings::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
