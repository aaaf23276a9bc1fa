//! Reference peripheral devices built on the core framework.

pub mod keyboard;

pub use keyboard::{AgreementPolicy, KeyboardController};
