//! Version and build information
//!
//! `tutor-factory version` reports the build alongside what the binary
//! ships with: the bundled presets, the preset export format and the model
//! the current configuration talks to.

use std::fmt;

use crate::persona::PresetRegistry;
use crate::storage::presets::EXPORT_VERSION;

/// Build information embedded at compile time
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub name: &'static str,
    /// Git commit hash (short)
    pub git_hash: &'static str,
    /// "true", "false" or "unknown"
    git_dirty_str: &'static str,
    pub build_timestamp: &'static str,
    /// Target triple
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            name: env!("CARGO_PKG_NAME"),
            git_hash: env!("TUTOR_GIT_HASH"),
            git_dirty_str: env!("TUTOR_GIT_DIRTY"),
            build_timestamp: env!("TUTOR_BUILD_TIMESTAMP"),
            target: env!("TUTOR_TARGET"),
            profile: env!("TUTOR_PROFILE"),
            rustc_version: env!("TUTOR_RUSTC_VERSION"),
        }
    }

    pub fn git_dirty(&self) -> bool {
        self.git_dirty_str == "true"
    }

    /// Full version string (e.g., "0.1.0-abc1234")
    pub fn full_version(&self) -> String {
        if self.git_dirty() {
            format!("{}-{}-dirty", self.version, self.git_hash)
        } else {
            format!("{}-{}", self.version, self.git_hash)
        }
    }
}

/// Everything `tutor-factory version` prints.
#[derive(Debug, Clone)]
pub struct VersionReport {
    pub build: BuildInfo,
    /// Model named by the active configuration
    pub model: String,
    pub bundled_presets: Vec<&'static str>,
}

impl VersionReport {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            build: BuildInfo::current(),
            model: model.into(),
            bundled_presets: PresetRegistry::new().keys().collect(),
        }
    }
}

impl fmt::Display for VersionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let build = &self.build;
        writeln!(f, "{} {}", build.name, build.full_version())?;
        writeln!(f)?;
        writeln!(f, "Build Information:")?;
        writeln!(f, "  Version:    {}", build.version)?;
        writeln!(
            f,
            "  Git Hash:   {}{}",
            build.git_hash,
            if build.git_dirty() { " (dirty)" } else { "" }
        )?;
        writeln!(f, "  Built:      {}", build.build_timestamp)?;
        writeln!(f, "  Profile:    {}", build.profile)?;
        writeln!(f, "  Target:     {}", build.target)?;
        writeln!(f)?;
        writeln!(f, "Tutors:")?;
        writeln!(f, "  Model:          {}", self.model)?;
        writeln!(f, "  Preset format:  v{}", EXPORT_VERSION)?;
        writeln!(f, "  Bundled:        {}", self.bundled_presets.join(", "))?;
        writeln!(f)?;
        writeln!(f, "Compiler:")?;
        writeln!(f, "  {}", build.rustc_version)?;
        Ok(())
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

/// Print the version report for `model` to stdout
pub fn print_version(model: &str) {
    print!("{}", VersionReport::new(model));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_exists() {
        let info = build_info();
        assert_eq!(info.name, "tutor-factory");
        assert!(!info.version.is_empty());
    }

    #[test]
    fn test_full_version_format() {
        let info = build_info();
        let full = info.full_version();

        assert!(full.starts_with(info.version));
        assert!(full.contains(info.git_hash));
    }

    #[test]
    fn test_report_lists_model_and_presets() {
        let display = VersionReport::new("claude-test").to_string();

        assert!(display.contains("Git Hash:"));
        assert!(display.contains("Model:          claude-test"));
        assert!(display.contains("Preset format:  v1.0"));
        assert!(display.contains("physics-professor, chemistry-lab-assistant"));
        assert!(display.contains("Compiler:"));
    }
}
