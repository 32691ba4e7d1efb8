// Application layer and presentation for the hifz progress engine

pub mod application;
pub mod presentation;

pub use presentation::bootstrap::{build_runtime, AppPaths, AppRuntime};
pub use presentation::state::{EngineDeps, ProgressEngine};
