//! Guided walkthrough of the memory bank client.
//!
//! Each [`Step`] exercises one area of the API and narrates what happened.
//! Steps run against the real service, or offline against an in-process bank.

mod demo;
mod report;
mod steps;

pub use demo::Demo;
pub use report::Narrator;
pub use steps::{Step, run};
