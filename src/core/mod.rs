pub mod inference;
pub mod pattern;
pub mod pipeline;
pub mod video;
