pub mod featured_image;
