pub mod image;
pub mod image_view;
