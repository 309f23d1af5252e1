use std::io::Write;

use anyhow::Result;
use illusory_config::{ConfigError, IllusoryConfig, Toggle};
use illusory_core::MemoryDocument;

#[test]
fn loads_options_from_toml_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"
[transition]
duration = "450ms"
easing = "linear"
z_index = 20
composite_only = true

[clone]
include_children = false
ignore_transparency = ["img", "video"]
preserve_data_attributes = ["data-testid"]
natural_to_clone_scale = 0.5

[demo]
scene = "list-to-detail"
"#
    )?;

    let config = IllusoryConfig::load_from_file(file.path())?;
    assert_eq!(config.demo.scene.as_deref(), Some("list-to-detail"));
    assert_eq!(
        config.clone.ignore_transparency,
        Toggle::Names(vec!["img".to_string(), "video".to_string()])
    );

    let doc = MemoryDocument::new();
    let settings = config.to_options().resolve(&*doc);
    assert_eq!(settings.timing.duration_ms, 450.0);
    assert_eq!(settings.timing.easing, "linear");
    assert_eq!(settings.z_index, 20);
    assert!(settings.composite_only);
    assert!(!settings.include_children);
    assert!(settings.ignore_transparency.ignores("VIDEO"));
    assert!(settings.preserve_data_attributes.keeps("data-testid"));
    assert!(!settings.preserve_data_attributes.keeps("data-id"));
    assert_eq!(settings.natural_to_clone_scale, 0.5);
    Ok(())
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = IllusoryConfig::load_from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn malformed_file_is_a_parse_error() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[transition]\nz_index = \"high\"")?;

    let err = IllusoryConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    Ok(())
}
