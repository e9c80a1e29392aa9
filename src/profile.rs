//! Profile persistence in the TOML configuration file
//!
//! Each top-level table of the configuration file is a profile:
//!
//! ```toml
//! [default]
//! device_name = "workstation"
//! secret_key = "sk_test_..."
//!
//! [rocket_rides]
//! device_name = "laptop"
//! secret_key = "rk_test_..."
//! ```
//!
//! Updates are merged into the existing document with `toml_edit`, so other
//! profiles, unrelated keys, comments and ordering survive untouched. The file
//! is not locked; concurrent writers from other processes are not detected.

use crate::device::default_device_name;
use crate::error::{ErrorCategory, ErrorKind, KeyprofileError, Result};
use crate::validate::validate_profile_name;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Table};
use tracing::{debug, info};

/// Profile used when none is named.
pub const DEFAULT_PROFILE: &str = "default";

/// Directory created under the config base.
pub const PRODUCT_DIR: &str = "keyprofile";

/// Name of the configuration file inside [`PRODUCT_DIR`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the platform config base directory.
pub const CONFIG_HOME_ENV: &str = "XDG_CONFIG_HOME";

const DEVICE_NAME_KEY: &str = "device_name";
const SECRET_KEY_KEY: &str = "secret_key";

/// Keys that belong inside a profile table and are never valid at top level.
const PROFILE_SCOPED_KEYS: [&str; 2] = [DEVICE_NAME_KEY, SECRET_KEY_KEY];

/// A profile as read back from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub device_name: Option<String>,
    pub secret_key: Option<String>,
}

/// Resolve the configuration file path from an optional override of the base directory.
///
/// An empty override counts as unset, like the XDG base directory rules.
pub fn config_path_from(config_home: Option<OsString>) -> Result<PathBuf> {
    let base = match config_home.filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir().ok_or_else(|| {
            KeyprofileError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Persistence,
                "unable to determine the user configuration directory",
            )
        })?,
    };
    Ok(base.join(PRODUCT_DIR).join(CONFIG_FILE_NAME))
}

/// Resolve the configuration file path from the process environment.
pub fn default_config_path() -> Result<PathBuf> {
    config_path_from(std::env::var_os(CONFIG_HOME_ENV))
}

/// Reads and updates profiles in one configuration file
///
/// A store is created per command invocation and holds nothing but the path;
/// every operation reads the file fresh.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store at the path derived from the environment.
    pub fn from_env() -> Result<Self> {
        let path = default_config_path()?;
        debug!(path = %path.display(), "resolved configuration file");
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set `device_name` and `secret_key` for `profile_name`, keeping
    /// everything else in the file as it was.
    ///
    /// When `device_name` is `None` the host name is used, or `"unknown"` if
    /// the host name is unavailable. Both values are trimmed before storing.
    pub fn configure(
        &self,
        profile_name: &str,
        api_key: &str,
        device_name: Option<&str>,
    ) -> Result<()> {
        validate_profile_name(profile_name)?;
        let config_dir = self.ensure_config_dir()?;

        let device_name = match device_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => default_device_name(),
        };

        let mut doc = self.load_document()?;
        merge_profile(&mut doc, profile_name, device_name.trim(), api_key.trim())?;
        let contents = doc.to_string();

        // Never replace the file with something that does not parse back.
        contents.parse::<DocumentMut>().map_err(|e| {
            KeyprofileError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Persistence,
                "merged configuration is not valid TOML",
                e,
            )
        })?;

        write_atomically(&config_dir, &self.path, contents.as_bytes())
            .map_err(|e| e.with_context(format!("failed to write {}", self.path.display())))?;
        info!(path = %self.path.display(), profile = profile_name, "configuration written");
        Ok(())
    }

    /// Read one profile back. Returns `None` if the file or profile does not exist.
    pub fn profile(&self, profile_name: &str) -> Result<Option<Profile>> {
        let doc = self.load_document()?;
        let Some(item) = doc.get(profile_name) else {
            return Ok(None);
        };
        let table = item.as_table_like().ok_or_else(|| not_a_table(profile_name))?;
        let field = |key: &str| {
            table
                .get(key)
                .and_then(Item::as_str)
                .map(str::to_string)
        };

        Ok(Some(Profile {
            name: profile_name.to_string(),
            device_name: field(DEVICE_NAME_KEY),
            secret_key: field(SECRET_KEY_KEY),
        }))
    }

    /// Parse the configuration file, treating a missing file as empty.
    pub fn load_document(&self) -> Result<DocumentMut> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no configuration file yet");
                return Ok(DocumentMut::new());
            }
            Err(e) => {
                return Err(persistence_error(
                    format!("failed to read from {}", self.path.display()),
                    e,
                ));
            }
        };

        contents.parse::<DocumentMut>().map_err(|e| {
            KeyprofileError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Persistence,
                format!(
                    "configuration file {} is not valid TOML; fix or remove it and try again",
                    self.path.display()
                ),
                e,
            )
        })
    }

    fn ensure_config_dir(&self) -> Result<PathBuf> {
        let dir = self.path.parent().ok_or_else(|| {
            KeyprofileError::with_kind(
                ErrorCategory::User,
                ErrorKind::Persistence,
                "configuration path has no parent directory",
            )
        })?;
        // A bare file name has an empty parent; it lives in the working directory.
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir.to_path_buf()
        };

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&dir).map_err(|e| {
            persistence_error(format!("failed to create directory {}", dir.display()), e)
        })?;
        Ok(dir)
    }
}

/// Merge one profile's fields into `doc`.
///
/// Only `[profile_name].device_name` and `[profile_name].secret_key` are
/// written. Other keys of the same profile, other profiles and unrelated
/// top-level entries keep their values and positions, so applying the same
/// update twice gives the same document as applying it once.
pub fn merge_profile(
    doc: &mut DocumentMut,
    profile_name: &str,
    device_name: &str,
    secret_key: &str,
) -> Result<()> {
    strip_scaffolding_keys(doc);

    let table = doc
        .entry(profile_name)
        .or_insert(Item::Table(Table::new()))
        .as_table_like_mut()
        .ok_or_else(|| not_a_table(profile_name))?;

    table.insert(DEVICE_NAME_KEY, toml_edit::value(device_name));
    table.insert(SECRET_KEY_KEY, toml_edit::value(secret_key));
    debug!(profile = profile_name, "merged profile fields");
    Ok(())
}

/// Remove profile-scoped keys that appear as bare top-level values.
///
/// Such keys are left behind when a profile's fields get flattened onto the
/// document root; they are meaningless there and would otherwise be written
/// back. Profile tables that happen to share those names are kept.
pub fn strip_scaffolding_keys(doc: &mut DocumentMut) -> Vec<String> {
    let stray: Vec<String> = doc
        .iter()
        .filter(|(key, item)| PROFILE_SCOPED_KEYS.contains(key) && item.is_value())
        .map(|(key, _)| key.to_string())
        .collect();

    for key in &stray {
        doc.remove(key);
        debug!(key = key.as_str(), "stripped stray top-level key");
    }
    stray
}

/// Write `contents` to `path` via a tempfile in `dir`, with owner-only permissions.
///
/// Either the old file or the complete new file exists afterwards, never a
/// partially written one.
fn write_atomically(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| persistence_error("failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| persistence_error("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| persistence_error("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| persistence_error("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| persistence_error("failed to set tempfile permissions", e))?;
    }

    temp_file.persist(path).map_err(|e| {
        persistence_error(
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn not_a_table(profile_name: &str) -> KeyprofileError {
    KeyprofileError::with_kind(
        ErrorCategory::User,
        ErrorKind::Persistence,
        format!(
            "configuration entry '{}' is not a table and cannot hold a profile",
            profile_name
        ),
    )
}

fn persistence_error(
    msg: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> KeyprofileError {
    KeyprofileError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::Persistence,
        msg,
        source,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    const KEY_A: &str = "sk_test_aaaaaaaaaaaaaaaa";
    const KEY_B: &str = "rk_test_bbbbbbbbbbbbbbbb";

    fn store_in(temp_dir: &TempDir) -> ProfileStore {
        ProfileStore::new(temp_dir.path().join("keyprofile").join("config.toml"))
    }

    #[test]
    fn test_config_path_from_override() {
        let path = config_path_from(Some(OsString::from("/tmp/xdg"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/xdg/keyprofile/config.toml"));
    }

    #[test]
    fn test_config_path_empty_override_is_ignored() {
        let path = config_path_from(Some(OsString::new())).unwrap();
        assert!(path.ends_with("keyprofile/config.toml"));
        assert_ne!(path, PathBuf::from("keyprofile/config.toml"));
    }

    #[test]
    fn test_configure_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store.configure("default", KEY_A, Some("laptop")).unwrap();

        let doc = store.load_document().unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(
            store.profile("default").unwrap(),
            Some(Profile {
                name: "default".to_string(),
                device_name: Some("laptop".to_string()),
                secret_key: Some(KEY_A.to_string()),
            })
        );
    }

    #[test]
    fn test_configure_trims_values() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store
            .configure("default", &format!("  {}\n", KEY_A), Some(" laptop \n"))
            .unwrap();

        let profile = store.profile("default").unwrap().unwrap();
        assert_eq!(profile.device_name.as_deref(), Some("laptop"));
        assert_eq!(profile.secret_key.as_deref(), Some(KEY_A));
    }

    #[test]
    fn test_configure_is_additive_across_profiles() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            "[a]\ndevice_name = \"x\"\nsecret_key = \"y\"\n",
        )
        .unwrap();

        store.configure("b", KEY_B, Some("desk")).unwrap();

        let a = store.profile("a").unwrap().unwrap();
        assert_eq!(a.device_name.as_deref(), Some("x"));
        assert_eq!(a.secret_key.as_deref(), Some("y"));
        let b = store.profile("b").unwrap().unwrap();
        assert_eq!(b.device_name.as_deref(), Some("desk"));
        assert_eq!(b.secret_key.as_deref(), Some(KEY_B));
    }

    #[test]
    fn test_configure_preserves_unrelated_content() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let original = "\
color = \"auto\"

# the main account
[default]
device_name = \"old\"
secret_key = \"sk_test_old_old_old\"
live_mode_api_key = \"sk_live_keep_me\"

[other]
device_name = \"x\"
secret_key = \"y\"
";
        fs::write(store.path(), original).unwrap();

        store.configure("default", KEY_A, Some("new")).unwrap();

        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.starts_with("color = \"auto\"\n"));
        assert!(written.contains("# the main account"));
        assert!(written.contains("live_mode_api_key = \"sk_live_keep_me\""));
        assert!(written.ends_with("[other]\ndevice_name = \"x\"\nsecret_key = \"y\"\n"));
        let profile = store.profile("default").unwrap().unwrap();
        assert_eq!(profile.device_name.as_deref(), Some("new"));
        assert_eq!(profile.secret_key.as_deref(), Some(KEY_A));
    }

    #[test]
    fn test_configure_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[a]\ndevice_name = \"x\"\nsecret_key = \"y\"\n").unwrap();

        store.configure("b", KEY_B, Some("desk")).unwrap();
        let once = fs::read_to_string(store.path()).unwrap();
        store.configure("b", KEY_B, Some("desk")).unwrap();
        let twice = fs::read_to_string(store.path()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_configure_defaults_device_name_to_host() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store.configure("default", KEY_A, None).unwrap();
        store.configure("blank", KEY_A, Some("   ")).unwrap();

        let expected = default_device_name();
        for name in ["default", "blank"] {
            let profile = store.profile(name).unwrap().unwrap();
            assert_eq!(profile.device_name.as_deref(), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_configure_rejects_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let corrupt = "[a\ndevice_name = ";
        fs::write(store.path(), corrupt).unwrap();

        let err = store
            .configure("default", KEY_A, Some("laptop"))
            .expect_err("expected decode failure");

        assert_eq!(err.kind, Some(ErrorKind::Persistence));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), corrupt);
    }

    #[test]
    fn test_configure_rejects_non_table_profile() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "default = 3\n").unwrap();

        let err = store
            .configure("default", KEY_A, Some("laptop"))
            .expect_err("expected non-table failure");

        assert_eq!(err.kind, Some(ErrorKind::Persistence));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "default = 3\n");
    }

    #[test]
    fn test_configure_rejects_empty_profile_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        let err = store.configure(" ", KEY_A, Some("laptop")).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Validation));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_configure_directory_creation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let store = ProfileStore::new(blocker.join("keyprofile").join("config.toml"));

        let err = store.configure("default", KEY_A, Some("laptop")).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Persistence));
    }

    #[test]
    fn test_merge_strips_scaffolding_keys() {
        let mut doc: DocumentMut = "secret_key = \"stray\"\ntheme = \"dark\"\n\n[a]\nsecret_key = \"y\"\n"
            .parse()
            .unwrap();

        merge_profile(&mut doc, "b", "desk", KEY_B).unwrap();

        assert!(doc.get("secret_key").is_none());
        assert_eq!(doc["theme"].as_str(), Some("dark"));
        assert_eq!(doc["a"]["secret_key"].as_str(), Some("y"));
        assert_eq!(doc["b"]["secret_key"].as_str(), Some(KEY_B));
    }

    #[test]
    fn test_strip_scaffolding_keeps_profile_tables() {
        let mut doc: DocumentMut = "device_name = \"stray\"\n\n[secret_key]\ndevice_name = \"x\"\n"
            .parse()
            .unwrap();

        let stripped = strip_scaffolding_keys(&mut doc);

        assert_eq!(stripped, vec!["device_name".to_string()]);
        assert!(doc.get("secret_key").is_some());
    }

    #[test]
    fn test_merge_into_inline_table_profile() {
        let mut doc: DocumentMut = "a = { device_name = \"x\", color = \"on\" }\n"
            .parse()
            .unwrap();

        merge_profile(&mut doc, "a", "desk", KEY_A).unwrap();

        assert_eq!(doc["a"]["device_name"].as_str(), Some("desk"));
        assert_eq!(doc["a"]["secret_key"].as_str(), Some(KEY_A));
        assert_eq!(doc["a"]["color"].as_str(), Some("on"));
    }

    #[test]
    fn test_profile_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert_eq!(store.profile("default").unwrap(), None);

        store.configure("default", KEY_A, Some("laptop")).unwrap();
        assert_eq!(store.profile("other").unwrap(), None);
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store.configure("default", KEY_A, Some("laptop")).unwrap();

        let file_mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        let dir_mode = fs::metadata(store.path().parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o077, 0);
    }
}
