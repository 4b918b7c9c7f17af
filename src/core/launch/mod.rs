pub mod process;
pub mod runtime_bin;
pub mod signal;
pub mod task;
pub mod verdict;

pub use process::{ProcessProbe, SystemProcessProbe};
pub use runtime_bin::{ensure_profile_bin, RUNTIME_MARKER};
pub use signal::{write_launch_signal, LaunchSignal};
pub use task::{LaunchOrchestrator, LaunchOutcome, LaunchReport, LaunchRequest, LaunchTimings};
pub use verdict::{judge, LaunchSignals, LaunchVerdict};
