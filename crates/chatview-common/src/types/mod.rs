mod color;
mod status;

pub use color::*;
pub use status::*;
