use crate::installer::config::default_concurrency;
use std::path::PathBuf;

/// Progress reporter trait for installer operations
/// Implementations forward updates to a console, UI or log.
pub trait ProgressReporter: Send + Sync {
    /// Start a new step with optional total steps
    fn start_step(&self, name: &str, total_steps: Option<u32>);

    /// Set a short status message
    fn set_message(&self, message: &str);

    /// Set a numeric step count for the current step (e.g. "3/12").
    /// `total` may be None when unknown.
    fn set_step_count(&self, current: u32, total: Option<u32>);

    /// Mark operation as complete
    fn done(&self, success: bool, message: Option<&str>);
}

/// A progress reporter that does nothing (silent).
/// Useful for background verification or tests.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_step(&self, _name: &str, _total_steps: Option<u32>) {}
    fn set_message(&self, _message: &str) {}
    fn set_step_count(&self, _current: u32, _total: Option<u32>) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
}

/// Installation specification
#[derive(Debug, Clone)]
pub struct InstallSpec {
    /// Root directory every resolved path is relative to
    pub root_dir: PathBuf,

    /// Number of files checked/downloaded at once
    pub concurrency: usize,

    /// If true, only check local files and report what would be installed
    pub dry_run: bool,

    /// If true, an existing file whose index entry is marked `preserve` is
    /// never touched, even when its hash differs
    pub respect_preserve: bool,
}

impl InstallSpec {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            concurrency: default_concurrency(),
            dry_run: false,
            respect_preserve: false,
        }
    }

    /// Absolute destination of a resolved relative path
    pub fn destination(&self, relative: &std::path::Path) -> PathBuf {
        self.root_dir.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn new_spec_defaults() {
        let spec = InstallSpec::new(PathBuf::from("/srv/mc"));
        assert!(!spec.dry_run);
        assert!(!spec.respect_preserve);
        assert!(spec.concurrency >= 1);
        assert_eq!(
            spec.destination(Path::new("mods/a.jar")),
            Path::new("/srv/mc").join("mods/a.jar")
        );
    }
}
