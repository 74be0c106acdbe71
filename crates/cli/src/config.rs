use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use invsync_core::SyncProfile;

/// Return the default config directory path: ~/.config/invsync/
pub fn default_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("could not determine user config directory")?
        .join("invsync");
    Ok(config_dir)
}

/// Return the default profile path.
pub fn default_profile_path() -> Result<PathBuf> {
    Ok(default_config_dir()?.join("profile.yaml"))
}

/// Load the sync profile from `path`, or from the default location.
///
/// An explicit path must exist. A missing default file yields the default profile.
pub fn load_profile(path: Option<&Path>) -> Result<SyncProfile> {
    match path {
        Some(path) => read_profile(path),
        None => {
            let path = default_profile_path()?;
            if path.exists() {
                read_profile(&path)
            } else {
                debug!(?path, "Profile not found, using defaults");
                Ok(SyncProfile::default())
            }
        }
    }
}

fn read_profile(path: &Path) -> Result<SyncProfile> {
    debug!(?path, "Loading profile");
    SyncProfile::load(path).with_context(|| format!("failed to load profile: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_profile_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hosts:\n  site: hfm\n  location: \"7\"\nips:\n  prefix_length: 24").unwrap();

        let profile = load_profile(Some(file.path())).unwrap();
        assert_eq!(profile.hosts.site.as_deref(), Some("hfm"));
        assert_eq!(profile.hosts.location.as_deref(), Some("7"));
        assert_eq!(profile.ips.prefix_length, 24);
    }

    #[test]
    fn missing_explicit_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_profile(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(format!("{err:#}").contains("nope.yaml"));
    }

    #[test]
    fn unknown_formatter_fails_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "exports:\n  hosts:\n    Name:\n      field: name_label\n      formatter: shout"
        )
        .unwrap();
        let err = load_profile(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown formatter 'shout'"));
    }
}
