use std::path::{Path, PathBuf};

const DEFAULT_ADB: &str = "adb";

/// Removes surrounding whitespace and one pair of matching quotes from a configured path.
pub fn unquote_path(value: &str) -> &str {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
}

/// Picks the adb program: configured path first, then the SDK's platform-tools, then `adb` on PATH.
pub fn resolve_adb_program(configured: &str) -> String {
    let configured = unquote_path(configured);
    if !configured.is_empty() {
        return configured.to_string();
    }
    sdk_adb_candidate()
        .filter(|candidate| candidate.is_file())
        .map(|candidate| candidate.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_ADB.to_string())
}

fn sdk_adb_candidate() -> Option<PathBuf> {
    let sdk_root = ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())?;
    let binary = if cfg!(windows) { "adb.exe" } else { "adb" };
    Some(PathBuf::from(sdk_root).join("platform-tools").join(binary))
}

/// Fails with a readable message when an explicit adb path cannot be used.
pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program == DEFAULT_ADB {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err(format!("ADB path {program} is a directory"));
    }
    if !path.exists() {
        return Err(format!("ADB executable not found at {program}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquotes_configured_paths() {
        assert_eq!(unquote_path("  \"/opt/platform-tools/adb\"  "), "/opt/platform-tools/adb");
        assert_eq!(unquote_path(" '/opt/platform-tools/adb' "), "/opt/platform-tools/adb");
        assert_eq!(unquote_path("\"/opt/adb'"), "\"/opt/adb'");
    }

    #[test]
    fn configured_path_wins() {
        assert_eq!(resolve_adb_program(" '/custom/adb' "), "/custom/adb");
    }

    #[test]
    fn rejects_missing_and_directory_paths() {
        let missing = validate_adb_program("/this/path/should/not/exist/adb").unwrap_err();
        assert!(missing.contains("not found"));

        let dir = tempfile::tempdir().expect("tempdir");
        let as_dir = validate_adb_program(&dir.path().to_string_lossy()).unwrap_err();
        assert!(as_dir.contains("directory"));

        assert!(validate_adb_program("adb").is_ok());
        assert!(validate_adb_program(" ").is_err());
    }
}
