//! Constants shared across the crate.

use std::time::Duration;

/// Namespace of every label the engine writes on a container.
///
/// Labels under this prefix never take part in the configuration fingerprint.
pub const LABEL_PREFIX: &str = "io.stevedore.";

/// Label holding the owning project name.
pub const LABEL_PROJECT: &str = "io.stevedore.project";

/// Label holding the owning service name.
pub const LABEL_SERVICE: &str = "io.stevedore.service";

/// Label holding the 1-based instance number.
pub const LABEL_CONTAINER_NUMBER: &str = "io.stevedore.container-number";

/// Label holding the configuration fingerprint recorded at creation time.
pub const LABEL_CONFIG_HASH: &str = "io.stevedore.config-hash";

/// Default per-container timeout for stop and for reaching `running`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between status polls while waiting for a container to run.
pub const RUNNING_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default declaration file name.
pub const DEFAULT_PROJECT_FILE: &str = "stevedore.yaml";
