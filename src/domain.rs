pub mod attributes;
pub mod handle;
pub mod icon;
pub mod link_input;
