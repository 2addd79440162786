pub mod file_name;
pub mod image_format;

pub use file_name::*;
pub use image_format::*;
