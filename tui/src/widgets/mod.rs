//! Custom widgets

pub mod dots;
pub mod text_block;

pub use dots::{dots_frame, DOTS_STEP};
pub use text_block::{StyledLine, TextBlock, TextBlockState};
