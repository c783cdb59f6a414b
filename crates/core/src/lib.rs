#![deny(warnings)]

pub mod config;
pub mod dialogue;
pub mod generate;
pub mod memory;
pub mod mood;
pub mod prompt;
pub mod skill;
pub mod util;
