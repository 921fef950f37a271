pub mod generation;
pub mod tooling;
