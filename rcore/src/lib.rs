pub mod buf;
pub mod hash;
