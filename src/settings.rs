use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

/// How many and which words get replaced on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Upper bound on the number of words replaced per page.
    pub fn target_count(&self) -> usize {
        match self {
            Difficulty::Beginner => 15,
            Difficulty::Intermediate => 30,
            Difficulty::Advanced => 50,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(anyhow!(
                "unknown difficulty '{}' (expected beginner/intermediate/advanced)",
                other
            )),
        }
    }
}

/// The one persisted configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub is_enabled: bool,
    pub target_language: String,
    pub difficulty: Difficulty,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            target_language: "es".to_string(),
            difficulty: Difficulty::Beginner,
        }
    }
}

/// A partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub is_enabled: Option<bool>,
    pub target_language: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl UserSettings {
    pub fn merged(&self, patch: &SettingsPatch) -> UserSettings {
        let mut merged = self.clone();
        if let Some(enabled) = patch.is_enabled {
            merged.is_enabled = enabled;
        }
        if let Some(language) = patch.target_language.as_ref() {
            if !language.trim().is_empty() {
                merged.target_language = language.trim().to_lowercase();
            }
        }
        if let Some(difficulty) = patch.difficulty {
            merged.difficulty = difficulty;
        }
        merged
    }
}

/// Remote model configuration from the settings file, overridable by env.
#[derive(Debug, Clone, Default)]
pub struct ModelSettings {
    pub endpoint: Option<String>,
    pub name: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    user: Option<UserTable>,
    model: Option<ModelTable>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserTable {
    enabled: Option<bool>,
    target_language: Option<String>,
    difficulty: Option<Difficulty>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModelTable {
    endpoint: Option<String>,
    name: Option<String>,
    key: Option<String>,
}

/// File-backed store for the settings record.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Opens the store at `path`, or at the default home location. The
    /// shipped defaults are materialized on first use.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let home = home_dir()
                    .ok_or_else(|| anyhow!("HOME is not set; pass an explicit settings path"))?;
                home.join("settings.toml")
            }
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory: {}", parent.display())
            })?;
        }
        if !path.exists() {
            fs::write(&path, DEFAULT_SETTINGS_TOML)
                .with_context(|| format!("failed to write settings: {}", path.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings record, filling defaults for absent fields.
    /// Read or parse failures are logged and resolve to the defaults.
    pub fn get(&self) -> UserSettings {
        match self.read_file() {
            Ok(file) => settings_from_file(&file),
            Err(err) => {
                warn!("failed to read settings, using defaults: {}", err);
                UserSettings::default()
            }
        }
    }

    /// Merges `patch` into the stored record and persists the result.
    pub fn update(&self, patch: &SettingsPatch) -> Result<UserSettings> {
        let mut file = self.read_file().unwrap_or_else(|err| {
            warn!("failed to read settings, merging into defaults: {}", err);
            SettingsFile::default()
        });
        let merged = settings_from_file(&file).merged(patch);
        file.user = Some(UserTable {
            enabled: Some(merged.is_enabled),
            target_language: Some(merged.target_language.clone()),
            difficulty: Some(merged.difficulty),
        });
        self.write_file(&file)?;
        Ok(merged)
    }

    /// Restores the record to its defaults, keeping the model table.
    pub fn reset(&self) -> Result<UserSettings> {
        let mut file = self.read_file().unwrap_or_default();
        file.user = None;
        self.write_file(&file)?;
        Ok(UserSettings::default())
    }

    /// Removes the stored file entirely.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove settings: {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Model endpoint configuration; env vars win over the file.
    pub fn model_settings(&self) -> ModelSettings {
        let table = self
            .read_file()
            .ok()
            .and_then(|file| file.model)
            .unwrap_or_default();
        ModelSettings {
            endpoint: get_env("WORD_IMMERSION_MODEL_URL").or(table.endpoint),
            name: get_env("WORD_IMMERSION_MODEL_NAME").or(table.name),
            key: get_env("WORD_IMMERSION_MODEL_KEY").or(table.key),
        }
    }

    fn read_file(&self) -> Result<SettingsFile> {
        if !self.path.exists() {
            return Ok(SettingsFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read settings: {}", self.path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse settings: {}", self.path.display()))
    }

    fn write_file(&self, file: &SettingsFile) -> Result<()> {
        let content =
            toml::to_string_pretty(file).with_context(|| "failed to serialize settings")?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write settings: {}", self.path.display()))
    }
}

fn settings_from_file(file: &SettingsFile) -> UserSettings {
    let defaults = UserSettings::default();
    let Some(user) = file.user.as_ref() else {
        return defaults;
    };
    UserSettings {
        is_enabled: user.enabled.unwrap_or(defaults.is_enabled),
        target_language: user
            .target_language
            .as_ref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.trim().to_lowercase())
            .unwrap_or(defaults.target_language),
        difficulty: user.difficulty.unwrap_or(defaults.difficulty),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".word-immersion-rust"))
        }
    })
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
