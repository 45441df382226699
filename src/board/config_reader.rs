use std::fs;
use std::path::{Path, PathBuf};

use lap_ranking::{BoardRules, DEFAULT_CLASSES};
use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::board::io_common::resolve_path;
use crate::board::*;

pub const DEFAULT_TITLE: &str = "🏆 Lap time board";
pub const DEFAULT_DATA_FILE: &str = "leaderboard.csv";
pub const DEFAULT_TITLE_FILE: &str = "title.txt";
pub const DEFAULT_BACKUP_FILE: &str = "leaderboard_backup.csv";
pub const DEFAULT_BONUS_FILE: &str = "bonus_times.csv";

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardConfig {
    pub title: Option<String>,
    #[serde(rename = "dataFile")]
    pub data_file: Option<String>,
    #[serde(rename = "titleFile")]
    pub title_file: Option<String>,
    #[serde(rename = "backupFile")]
    pub backup_file: Option<String>,
    #[serde(rename = "bonusFile")]
    pub bonus_file: Option<String>,
    pub classes: Option<Vec<String>>,
    #[serde(rename = "requireClass")]
    pub require_class: Option<bool>,
    #[serde(rename = "adminPassword")]
    pub admin_password: Option<String>,
}

/// The files of a board, resolved against the directory of the configuration.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BoardPaths {
    pub data: PathBuf,
    pub title: PathBuf,
    pub backup: PathBuf,
    pub bonus: PathBuf,
}

impl BoardConfig {
    pub fn default_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => DEFAULT_TITLE.to_string(),
        }
    }

    pub fn rules(&self) -> BoardResult<BoardRules> {
        let require_class = self.require_class.unwrap_or(true);
        let classes: Vec<String> = match &self.classes {
            Some(cs) => {
                let mut res: Vec<String> = Vec::new();
                for c in cs.iter().map(|c| c.trim()) {
                    if c.is_empty() {
                        whatever!("Empty class label in the configuration");
                    }
                    if !res.iter().any(|known| known == c) {
                        res.push(c.to_string());
                    }
                }
                res
            }
            None => DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
        };
        if require_class && classes.is_empty() {
            whatever!("requireClass is set but no class is configured");
        }
        Ok(BoardRules {
            classes,
            require_class,
        })
    }

    pub fn paths(&self, root: &Path) -> BoardPaths {
        let pick = |p: &Option<String>, default: &str| {
            resolve_path(root, p.as_deref().unwrap_or(default))
        };
        BoardPaths {
            data: pick(&self.data_file, DEFAULT_DATA_FILE),
            title: pick(&self.title_file, DEFAULT_TITLE_FILE),
            backup: pick(&self.backup_file, DEFAULT_BACKUP_FILE),
            bonus: pick(&self.bonus_file, DEFAULT_BONUS_FILE),
        }
    }

    /// Admin commands are open when no password is configured.
    pub fn check_admin(&self, password: Option<&str>) -> BoardResult<()> {
        match self.admin_password.as_deref() {
            None => Ok(()),
            Some(expected) => {
                ensure!(password == Some(expected), AdminRequiredSnafu {});
                Ok(())
            }
        }
    }
}

pub fn read_config(path: &str) -> BoardResult<BoardConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: BoardConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config: BoardConfig = serde_json::from_str(
            r#"{
                "title": "Winter series",
                "dataFile": "data/laps.csv",
                "bonusFile": "/srv/bonus.csv",
                "classes": ["Pro", "Rookie", "Pro"],
                "requireClass": true,
                "adminPassword": "pit"
            }"#,
        )
        .unwrap();
        assert_eq!(config.default_title(), "Winter series");
        let rules = config.rules().unwrap();
        assert_eq!(rules.classes, vec!["Pro", "Rookie"]);
        let paths = config.paths(Path::new("/events/cup"));
        assert_eq!(paths.data, PathBuf::from("/events/cup/data/laps.csv"));
        assert_eq!(paths.bonus, PathBuf::from("/srv/bonus.csv"));
        assert_eq!(paths.title, PathBuf::from("/events/cup/title.txt"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: BoardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.default_title(), DEFAULT_TITLE);
        assert_eq!(config.rules().unwrap(), BoardRules::default());
        assert!(config.check_admin(None).is_ok());
    }

    #[test]
    fn admin_password_is_checked() {
        let config = BoardConfig {
            admin_password: Some("pit".to_string()),
            ..BoardConfig::default()
        };
        assert!(config.check_admin(Some("pit")).is_ok());
        assert!(matches!(
            config.check_admin(Some("nope")),
            Err(BoardError::AdminRequired {})
        ));
        assert!(config.check_admin(None).is_err());
    }

    #[test]
    fn required_class_needs_classes() {
        let config = BoardConfig {
            classes: Some(vec![]),
            ..BoardConfig::default()
        };
        assert!(config.rules().is_err());
        let optional = BoardConfig {
            classes: Some(vec![]),
            require_class: Some(false),
            ..BoardConfig::default()
        };
        assert!(!optional.rules().unwrap().require_class);
    }
}
