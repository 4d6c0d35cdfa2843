//! Admins for categories and images.

mod category;
mod image;

pub use category::CategoryAdmin;
pub use image::ImageAdmin;
