// Marksync shared type definitions
// Each submodule defines types used across the crate.

pub mod bookmark;
pub mod errors;
pub mod identity;
pub mod notification;
pub mod settings;
pub mod view;
