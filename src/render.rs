pub mod gpu;
pub mod loader;
pub mod surface;
pub mod text;
