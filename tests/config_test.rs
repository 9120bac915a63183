// tests/config_test.rs
use bumper::config::{load_config, Config, CredentialStore};
use bumper::release::Backend;
use bumper::BumpError;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let toml_content = r#"
gitlab_api_key = "glpat-secret"
remote = "upstream"

[branches]
trunk = "master"
development = "develop"

[files]
changelog = "docs/CHANGES.md"
"#;
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = load_config(Some(temp_file.path())).unwrap();
    assert_eq!(config.gitlab_api_key.as_deref(), Some("glpat-secret"));
    assert_eq!(config.remote, "upstream");
    assert_eq!(config.branches.trunk, "master");
    assert_eq!(config.branches.development, "develop");
    assert_eq!(config.branches.release_prefix, "release/");
    assert_eq!(config.files.changelog, "docs/CHANGES.md");
    assert_eq!(config.files.readme, "README.md");
    assert_eq!(config.path(), Some(temp_file.path()));
}

#[test]
fn test_load_missing_explicit_path_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bumper.toml");

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.branches, Config::default().branches);
    assert_eq!(config.path(), Some(path.as_path()));
}

#[test]
fn test_invalid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[branches\ntrunk = ").unwrap();
    temp_file.flush().unwrap();

    let result = load_config(Some(temp_file.path()));
    assert!(matches!(result, Err(BumpError::Config(_))));
}

#[test]
fn test_invalid_branch_settings_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(b"[branches]\ntrunk = \"dev\"\ndevelopment = \"dev\"\n")
        .unwrap();
    temp_file.flush().unwrap();

    assert!(matches!(
        load_config(Some(temp_file.path())),
        Err(BumpError::Config(_))
    ));
}

#[test]
fn test_credentials_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = load_config(Some(&path)).unwrap();
    assert_eq!(config.api_key(Backend::GitLab), None);

    config.store_api_key(Backend::GitLab, "glpat-new").unwrap();

    let reloaded = load_config(Some(&path)).unwrap();
    assert_eq!(reloaded.api_key(Backend::GitLab).as_deref(), Some("glpat-new"));
    assert_eq!(reloaded.api_key(Backend::GitHub), None);
    assert_eq!(reloaded.branches, config.branches);
}

#[cfg(target_os = "linux")]
mod default_location {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;

    struct XdgGuard(Option<String>);

    impl XdgGuard {
        fn set(path: &std::path::Path) -> Self {
            let previous = env::var("XDG_CONFIG_HOME").ok();
            env::set_var("XDG_CONFIG_HOME", path);
            XdgGuard(previous)
        }
    }

    impl Drop for XdgGuard {
        fn drop(&mut self) {
            match &self.0 {
                Some(value) => env::set_var("XDG_CONFIG_HOME", value),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_path_under_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = XdgGuard::set(dir.path());

        assert_eq!(
            bumper::config::default_path(),
            Some(dir.path().join("bumper").join("config.toml"))
        );
    }

    #[test]
    #[serial]
    fn test_load_from_default_location() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = XdgGuard::set(dir.path());

        fs::create_dir_all(dir.path().join("bumper")).unwrap();
        fs::write(
            dir.path().join("bumper").join("config.toml"),
            "github_token = \"ghp_123\"\n",
        )
        .unwrap();

        let config = load_config(None).unwrap();
        assert_eq!(config.api_key(Backend::GitHub).as_deref(), Some("ghp_123"));
    }

    #[test]
    #[serial]
    fn test_save_creates_private_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let _guard = XdgGuard::set(dir.path());

        let mut config = load_config(None).unwrap();
        config.store_api_key(Backend::GitLab, "glpat-xyz").unwrap();

        let config_dir = dir.path().join("bumper");
        let dir_mode = fs::metadata(&config_dir).unwrap().permissions().mode();
        let file_mode = fs::metadata(config_dir.join("config.toml"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }
}
