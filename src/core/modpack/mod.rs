// ─── Modpack ───
// Release resolution, install/update state machine, override preservation and
// the on-disk version marker.

pub mod extract;
pub mod install;
pub mod overrides;
pub mod progress;
pub mod release;
pub mod status;
pub mod version;

pub use install::{InstallController, InstallJob, InstallReport};
pub use progress::{InstallPhase, InstallState, InstallStatus, ProgressTracker};
pub use release::{GithubReleaseResolver, ReleaseDescriptor, ReleaseSource};
pub use status::{build_status, ModpackStatus};
pub use version::{compare_versions, normalize_version, VersionMarker};
