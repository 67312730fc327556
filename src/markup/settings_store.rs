use crate::markup::settings::MarkupSettings;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "courtside_markup.json";

pub fn settings_path_from_exe_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(SETTINGS_FILE_NAME))
}

pub fn resolve_settings_path() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    settings_path_from_exe_path(&exe_path)
}

pub fn load() -> Result<MarkupSettings> {
    load_from_path(&resolve_settings_path()?)
}

pub fn save(settings: &MarkupSettings) -> Result<PathBuf> {
    let path = resolve_settings_path()?;
    save_to_path(&path, settings)?;
    Ok(path)
}

pub fn load_from_path(path: &Path) -> Result<MarkupSettings> {
    if !path.exists() {
        return Ok(MarkupSettings::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read markup settings file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(MarkupSettings::default());
    }

    let mut loaded: MarkupSettings = serde_json::from_str(&content)
        .with_context(|| format!("deserialize markup settings file {}", path.display()))?;
    if loaded.sanitize() {
        tracing::warn!(path = %path.display(), "markup settings contained invalid values");
    }
    Ok(loaded)
}

pub fn save_to_path(path: &Path, settings: &MarkupSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create settings parent folder {}", parent.display()))?;
    }

    let mut sanitized = settings.clone();
    sanitized.sanitize();
    let json = serde_json::to_string_pretty(&sanitized).context("serialize markup settings")?;
    std::fs::write(path, json)
        .with_context(|| format!("write markup settings file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::model::Color;

    #[test]
    fn settings_path_is_resolved_next_to_executable() {
        let exe = Path::new("/tmp/courtside/bin/courtside-markup");
        let path = settings_path_from_exe_path(exe).expect("path");
        assert_eq!(path, Path::new("/tmp/courtside/bin").join(SETTINGS_FILE_NAME));
    }

    #[test]
    fn missing_and_empty_files_load_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        assert_eq!(
            load_from_path(&path).expect("missing"),
            MarkupSettings::default()
        );

        std::fs::write(&path, "  \n").expect("write empty");
        assert_eq!(
            load_from_path(&path).expect("empty"),
            MarkupSettings::default()
        );
    }

    #[test]
    fn roundtrip_keeps_values_and_sanitizes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let mut settings = MarkupSettings::default();
        settings.lock_duration_ms = 4_000;
        settings.default_color = Color::rgb(1, 2, 3);
        settings.default_stroke_width = 55;

        save_to_path(&path, &settings).expect("save settings");
        let loaded = load_from_path(&path).expect("load settings");

        assert_eq!(loaded.lock_duration_ms, 4_000);
        assert_eq!(loaded.default_color, Color::rgb(1, 2, 3));
        assert_eq!(loaded.default_stroke_width, 20);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{not json").expect("write");
        let err = load_from_path(&path).expect_err("malformed");
        assert!(format!("{err:#}").contains(SETTINGS_FILE_NAME));
    }
}
