use crate::models::SortKey;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Nominal characters per page.
    pub page_size: usize,
    pub library_sort: SortKey,
    /// Encoding label used instead of detection, e.g. `"gbk"`.
    pub encoding: Option<String>,
    /// Database location; `<app data>/novels.db` when unset.
    pub database_file: Option<PathBuf>,
}

impl Settings {
    pub fn merge(&mut self, other: Self) {
        if other.page_size > 0 {
            self.page_size = other.page_size;
        }
        self.library_sort = other.library_sort;
        if other.encoding.is_some() {
            self.encoding = other.encoding;
        }
        if other.database_file.is_some() {
            self.database_file = other.database_file;
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            library_sort: SortKey::Recent,
            encoding: None,
            database_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.page_size, 1000);
        assert_eq!(settings.library_sort, SortKey::Recent);
        assert_eq!(settings.encoding, None);
        assert_eq!(settings.database_file, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"encoding": "gbk"}"#).unwrap();
        assert_eq!(settings.encoding.as_deref(), Some("gbk"));
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_merge_keeps_page_size_when_zero() {
        let mut settings = Settings::default();
        settings.merge(Settings {
            page_size: 0,
            library_sort: SortKey::Title,
            encoding: Some("gb18030".to_string()),
            database_file: None,
        });
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.library_sort, SortKey::Title);
        assert_eq!(settings.encoding.as_deref(), Some("gb18030"));
    }
}
