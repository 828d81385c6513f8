//! Application labels and icons from freedesktop `.desktop` entries.

use super::{AppCatalog, AppIcon, AppInfo};
use directories::BaseDirs;
use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct DesktopEntry {
    name: Option<String>,
    icon: Option<String>,
    wm_class: Option<String>,
}

/// Looks up applications in the `applications/` directories of the XDG data
/// dirs. An application matches by file stem or by `StartupWMClass`, both
/// compared case-insensitively.
pub struct DesktopEntryCatalog {
    dirs: Vec<PathBuf>,
}

impl DesktopEntryCatalog {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn from_xdg() -> Self {
        let mut dirs = Vec::new();
        if let Some(base) = BaseDirs::new() {
            dirs.push(base.data_dir().join("applications"));
        }
        let data_dirs = env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIRS.to_string());
        dirs.extend(
            data_dirs
                .split(':')
                .filter(|d| !d.is_empty())
                .map(|d| Path::new(d).join("applications")),
        );
        Self::new(dirs)
    }

    fn find(&self, app_id: &str) -> Option<DesktopEntry> {
        for dir in &self.dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let stem_matches = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case(app_id));

                let Ok(raw) = fs::read_to_string(&path) else {
                    debug!("Skipping unreadable {}", path.display());
                    continue;
                };
                let parsed = parse_desktop_entry(&raw);
                let class_matches = parsed
                    .wm_class
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(app_id));

                if stem_matches || class_matches {
                    return Some(parsed);
                }
            }
        }
        None
    }
}

impl AppCatalog for DesktopEntryCatalog {
    fn app_info(&self, app_id: &str) -> AppInfo {
        let Some(entry) = self.find(app_id) else {
            return AppInfo::default();
        };
        let icon = entry.icon.map(|icon| {
            let path = PathBuf::from(&icon);
            if path.is_absolute() {
                AppIcon::Path(path)
            } else {
                AppIcon::Named(icon)
            }
        });
        AppInfo {
            label: entry.name,
            icon,
        }
    }
}

/// Untranslated keys of the `[Desktop Entry]` group only.
fn parse_desktop_entry(raw: &str) -> DesktopEntry {
    let mut entry = DesktopEntry::default();
    let mut in_main_group = false;

    for line in raw.lines().map(str::trim) {
        if line.starts_with('[') {
            in_main_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_group || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Name" => entry.name = Some(value.to_string()),
            "Icon" => entry.icon = Some(value.to_string()),
            "StartupWMClass" => entry.wm_class = Some(value.to_string()),
            _ => {}
        }
    }
    entry
}
