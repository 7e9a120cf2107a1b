//! Monitor configuration.
//!
//! Loaded once from `config.json` and passed by reference. Every field has
//! a default so a partial file only overrides what it names. Geometry and
//! value checks run in [`MonitorConfig::validate`]; asset files are checked
//! separately because the diagnostic modes don't all need them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::monitor::actions::{default_action_script, is_known_key, ActionStep};
use crate::monitor::milestone::MilestonePolicy;
use crate::monitor::notify::NotificationConfig;
use crate::ocr::{NumericKind, ReadFormat};
use crate::vision::classifier::validate_priority;
use crate::vision::{GameState, Region, StateClassifier, StateProbe, Template};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// One state template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// File name under the asset directory.
    pub file: String,
    /// Minimum similarity (0.0-1.0).
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Where to look; whole screenshot when absent.
    #[serde(default)]
    pub search: Option<Region>,
}

fn default_threshold() -> f32 {
    0.8
}

impl TemplateConfig {
    fn new(file: &str, search: Region) -> Self {
        Self {
            file: file.to_string(),
            threshold: default_threshold(),
            search: Some(search),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub in_game: TemplateConfig,
    pub dialog: TemplateConfig,
    pub inventory: TemplateConfig,
    pub character_menu: TemplateConfig,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            in_game: TemplateConfig::new("ingame_needle.png", Region::centered(-470, 490, 100, 100)),
            dialog: TemplateConfig::new("dialog_needle.png", Region::centered(0, -100, 300, 300)),
            inventory: TemplateConfig::new("inventory_needle.png", Region::centered(305, 515, 100, 100)),
            character_menu: TemplateConfig::new(
                "character_needle.png",
                Region::centered(210, 515, 100, 100),
            ),
        }
    }
}

impl TemplatesConfig {
    pub fn get(&self, state: GameState) -> Option<&TemplateConfig> {
        match state {
            GameState::InGame => Some(&self.in_game),
            GameState::Dialog => Some(&self.dialog),
            GameState::Inventory => Some(&self.inventory),
            GameState::CharacterMenu => Some(&self.character_menu),
            GameState::Unknown => None,
        }
    }
}

/// Opens the menu that shows a value before reading it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevealConfig {
    pub key: String,
    /// State whose template confirms the menu is open.
    pub state: GameState,
    #[serde(default = "default_reveal_attempts")]
    pub max_attempts: u32,
    /// Pause after each tap.
    #[serde(default = "default_reveal_delay_ms")]
    pub delay_ms: u64,
    /// Random extra pause, up to this much.
    #[serde(default)]
    pub jitter_ms: u64,
}

fn default_reveal_attempts() -> u32 {
    10
}

fn default_reveal_delay_ms() -> u64 {
    2000
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingConfig {
    pub region: Region,
    /// Preprocessing and parsing; per-kind defaults when absent.
    #[serde(default)]
    pub format: Option<ReadFormat>,
    /// OCR tries per cycle. Later tries recapture.
    #[serde(default = "default_ocr_attempts")]
    pub attempts: u32,
    #[serde(default)]
    pub reveal: Option<RevealConfig>,
}

fn default_ocr_attempts() -> u32 {
    3
}

impl ReadingConfig {
    pub fn format(&self, kind: NumericKind) -> ReadFormat {
        self.format.clone().unwrap_or_else(|| ReadFormat::for_kind(kind))
    }

    fn level_default() -> Self {
        Self {
            region: Region::centered(555, -370, 200, 45),
            format: None,
            attempts: default_ocr_attempts(),
            reveal: Some(RevealConfig {
                key: "c".to_string(),
                state: GameState::CharacterMenu,
                max_attempts: default_reveal_attempts(),
                delay_ms: default_reveal_delay_ms(),
                jitter_ms: 500,
            }),
        }
    }

    fn zen_default() -> Self {
        Self {
            region: Region::centered(545, 309, 120, 30),
            format: None,
            attempts: default_ocr_attempts(),
            reveal: Some(RevealConfig {
                key: "i".to_string(),
                state: GameState::Inventory,
                max_attempts: default_reveal_attempts(),
                delay_ms: default_reveal_delay_ms(),
                jitter_ms: 500,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Substring of the game window title.
    pub title: String,
    pub focus_each_cycle: bool,
    /// Pause after focusing before capturing.
    pub settle_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "99B".to_string(),
            focus_each_cycle: true,
            settle_ms: 200,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra capture attempts after the first one fails.
    pub capture_max_retries: u32,
    pub backoff_ms: u64,
    pub capture_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            capture_max_retries: 3,
            backoff_ms: 1000,
            capture_timeout_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Sleep between cycles.
    pub interval_ms: u64,
    /// Random extra sleep, up to this much.
    pub jitter_ms: u64,
    /// Minimum time between level/zen checks. 0 reads every in-game cycle.
    pub read_interval_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            jitter_ms: 0,
            read_interval_ms: 180_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Pause before the first look at the screen.
    pub delay_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            delay_ms: 3000,
            max_attempts: 5,
            retry_delay_ms: 5000,
        }
    }
}

/// Scripts run when a cycle lands on a non-game state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub dialog: Vec<ActionStep>,
    pub inventory: Vec<ActionStep>,
    pub character_menu: Vec<ActionStep>,
}

impl RecoveryConfig {
    pub fn for_state(&self, state: GameState) -> &[ActionStep] {
        match state {
            GameState::Dialog => &self.dialog,
            GameState::Inventory => &self.inventory,
            GameState::CharacterMenu => &self.character_menu,
            GameState::InGame | GameState::Unknown => &[],
        }
    }

    fn all(&self) -> impl Iterator<Item = &ActionStep> {
        self.dialog
            .iter()
            .chain(&self.inventory)
            .chain(&self.character_menu)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub template: TemplateConfig,
    #[serde(default = "default_reward_key")]
    pub key: String,
    #[serde(default = "default_reward_repeat")]
    pub repeat: u32,
    #[serde(default = "default_reward_interval_ms")]
    pub interval_ms: u64,
}

fn default_reward_key() -> String {
    "space".to_string()
}

fn default_reward_repeat() -> u32 {
    4
}

fn default_reward_interval_ms() -> u64 {
    500
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            template: TemplateConfig::new("needle.png", Region::centered(0, 0, 800, 600)),
            key: default_reward_key(),
            repeat: default_reward_repeat(),
            interval_ms: default_reward_interval_ms(),
        }
    }
}

impl RewardConfig {
    pub fn script(&self) -> Vec<ActionStep> {
        vec![ActionStep::Press {
            key: self.key.clone(),
            repeat: self.repeat,
            interval_ms: self.interval_ms,
        }]
    }
}

/// Sound files under the asset directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundsConfig {
    pub start: Option<String>,
    pub reward: Option<String>,
}

impl Default for SoundsConfig {
    fn default() -> Self {
        Self {
            start: Some("sounds/start.mp3".to_string()),
            reward: Some("sounds/reward.mp3".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestonesConfig {
    pub level: MilestonePolicy,
    pub zen: MilestonePolicy,
}

impl Default for MilestonesConfig {
    fn default() -> Self {
        Self {
            level: MilestonePolicy::Every { step: 1 },
            zen: MilestonePolicy::Thresholds {
                values: vec![1_900_000_000],
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit Tesseract executable; searched for when absent.
    pub tesseract_path: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            timeout_ms: 10_000,
        }
    }
}

/// Screenshots used by the diagnostic modes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixturesConfig {
    pub level: PathBuf,
    pub zen: PathBuf,
    pub in_game: PathBuf,
    pub dialog: PathBuf,
    pub inventory: PathBuf,
    pub character_menu: PathBuf,
    pub classify: PathBuf,
    pub notification_image: PathBuf,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        let dir = Path::new("fixtures");
        Self {
            level: dir.join("screenshot_level.png"),
            zen: dir.join("screenshot_inventory.png"),
            in_game: dir.join("screenshot_level.png"),
            dialog: dir.join("screenshot_dialog.png"),
            inventory: dir.join("screenshot_inventory.png"),
            character_menu: dir.join("screenshot_level.png"),
            classify: dir.join("screenshot.png"),
            notification_image: dir.join("screenshot.png"),
        }
    }
}

impl FixturesConfig {
    pub fn for_state(&self, state: GameState) -> Option<&Path> {
        match state {
            GameState::InGame => Some(&self.in_game),
            GameState::Dialog => Some(&self.dialog),
            GameState::Inventory => Some(&self.inventory),
            GameState::CharacterMenu => Some(&self.character_menu),
            GameState::Unknown => None,
        }
    }
}

/// Complete monitor configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// trace, debug, info, warn, error or off
    pub log_level: String,
    pub notification: NotificationConfig,
    pub window: WindowConfig,
    /// Templates and sounds live here. Relative to the config file.
    pub assets_dir: PathBuf,
    pub templates: TemplatesConfig,
    /// First match wins.
    pub classifier_priority: Vec<GameState>,
    pub level: ReadingConfig,
    pub zen: ReadingConfig,
    pub retry: RetryConfig,
    /// Consecutive Unknown cycles (or unresolved readings) before escalating.
    pub health_check_threshold: u32,
    pub cycle: CycleConfig,
    pub startup: StartupConfig,
    /// Input script for in-game cycles.
    pub actions: Vec<ActionStep>,
    pub recovery: RecoveryConfig,
    pub reward: Option<RewardConfig>,
    pub sounds: SoundsConfig,
    pub milestones: MilestonesConfig,
    pub ocr: OcrConfig,
    pub fixtures: FixturesConfig,
    /// Directory relative paths resolve against. Set on load.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            notification: NotificationConfig::default(),
            window: WindowConfig::default(),
            assets_dir: PathBuf::from("assets"),
            templates: TemplatesConfig::default(),
            classifier_priority: GameState::DEFAULT_PRIORITY.to_vec(),
            level: ReadingConfig::level_default(),
            zen: ReadingConfig::zen_default(),
            retry: RetryConfig::default(),
            health_check_threshold: 3,
            cycle: CycleConfig::default(),
            startup: StartupConfig::default(),
            actions: default_action_script(),
            recovery: RecoveryConfig::default(),
            reward: Some(RewardConfig::default()),
            sounds: SoundsConfig::default(),
            milestones: MilestonesConfig::default(),
            ocr: OcrConfig::default(),
            fixtures: FixturesConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl MonitorConfig {
    /// Loads `path`. A missing file gives the defaults; a file that exists
    /// but can't be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = if path.exists() {
            let contents =
                fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
            let config: MonitorConfig = serde_json::from_str(&contents)
                .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
            info!("Config loaded from {}", path.display());
            config
        } else {
            info!("{} not found. Using default config.", path.display());
            MonitorConfig::default()
        };
        config.base_dir = base_dir;
        Ok(config)
    }

    /// Resolves a config-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Resolves a file name inside the asset directory.
    pub fn asset(&self, file: &str) -> PathBuf {
        self.resolve(&self.assets_dir).join(file)
    }

    pub fn reading(&self, kind: NumericKind) -> &ReadingConfig {
        match kind {
            NumericKind::Level => &self.level,
            NumericKind::Zen => &self.zen,
        }
    }

    /// Checks everything that doesn't need the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "log_level",
                format!("expected one of {}", LOG_LEVELS.join(", ")),
            ));
        }

        for state in GameState::CONCRETE {
            if let Some(template) = self.templates.get(state) {
                validate_template(&format!("templates.{}", state), template)?;
            }
        }
        validate_priority(&self.classifier_priority)?;

        for kind in [NumericKind::Level, NumericKind::Zen] {
            let reading = self.reading(kind);
            let field = format!("{}.region", kind);
            validate_region(&field, &reading.region)?;
            if reading.attempts == 0 {
                return Err(ConfigError::invalid(format!("{}.attempts", kind), "must be at least 1"));
            }
            if reading.format(kind).scale == 0 {
                return Err(ConfigError::invalid(format!("{}.format.scale", kind), "must be at least 1"));
            }
            if let Some(reveal) = &reading.reveal {
                validate_key(&format!("{}.reveal.key", kind), &reveal.key)?;
                if reveal.state == GameState::Unknown {
                    return Err(ConfigError::invalid(
                        format!("{}.reveal.state", kind),
                        "must be a state with a template",
                    ));
                }
                if reveal.max_attempts == 0 {
                    return Err(ConfigError::invalid(
                        format!("{}.reveal.max_attempts", kind),
                        "must be at least 1",
                    ));
                }
            }
        }

        validate_policy("milestones.level", &self.milestones.level)?;
        validate_policy("milestones.zen", &self.milestones.zen)?;

        if self.health_check_threshold == 0 {
            return Err(ConfigError::invalid("health_check_threshold", "must be at least 1"));
        }
        if self.startup.max_attempts == 0 {
            return Err(ConfigError::invalid("startup.max_attempts", "must be at least 1"));
        }

        for step in self.actions.iter().chain(self.recovery.all()) {
            if let Some(key) = step.key() {
                validate_key("actions", key)?;
            }
            if let ActionStep::Jitter { radius, .. } = step {
                if *radius < 0 {
                    return Err(ConfigError::invalid("actions", "jitter radius must not be negative"));
                }
            }
        }

        if let Some(reward) = &self.reward {
            validate_template("reward.template", &reward.template)?;
            validate_key("reward.key", &reward.key)?;
        }

        if let Some(region) = &self.notification.attachment_region {
            validate_region("notification.attachment_region", region)?;
        }
        Ok(())
    }

    /// Checks that every template and sound file exists.
    pub fn validate_assets(&self) -> Result<(), ConfigError> {
        let mut templates: Vec<&TemplateConfig> = GameState::CONCRETE
            .iter()
            .filter_map(|s| self.templates.get(*s))
            .collect();
        if let Some(reward) = &self.reward {
            templates.push(&reward.template);
        }
        for template in templates {
            require_file("template", self.asset(&template.file))?;
        }

        for sound in [&self.sounds.start, &self.sounds.reward].into_iter().flatten() {
            require_file("sound", self.asset(sound))?;
        }
        Ok(())
    }

    /// Loads the state templates and builds the classifier.
    pub fn load_classifier(&self) -> Result<StateClassifier, ConfigError> {
        let mut probes = Vec::with_capacity(GameState::CONCRETE.len());
        for state in GameState::CONCRETE {
            if let Some(t) = self.templates.get(state) {
                probes.push(StateProbe {
                    state,
                    template: Template::load(&state.to_string(), &self.asset(&t.file), t.threshold)?,
                    search: t.search,
                });
            }
        }
        StateClassifier::new(probes, &self.classifier_priority)
    }

    pub fn load_reward_probe(&self) -> Result<Option<StateProbe>, ConfigError> {
        let Some(reward) = &self.reward else {
            return Ok(None);
        };
        let template = Template::load(
            "reward",
            &self.asset(&reward.template.file),
            reward.template.threshold,
        )?;
        // The reward probe reuses the probe type; its state tag is unused.
        Ok(Some(StateProbe {
            state: GameState::InGame,
            template,
            search: reward.template.search,
        }))
    }
}

fn require_file(kind: &'static str, path: PathBuf) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingAsset { kind, path })
    }
}

fn validate_region(field: &str, region: &Region) -> Result<(), ConfigError> {
    region
        .validate()
        .map_err(|e| ConfigError::invalid(field, e.to_string()))
}

fn validate_template(field: &str, template: &TemplateConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&template.threshold) {
        return Err(ConfigError::invalid(
            format!("{}.threshold", field),
            format!("{} is outside 0.0-1.0", template.threshold),
        ));
    }
    if template.file.trim().is_empty() {
        return Err(ConfigError::invalid(format!("{}.file", field), "must not be empty"));
    }
    if let Some(search) = &template.search {
        validate_region(&format!("{}.search", field), search)?;
    }
    Ok(())
}

fn validate_policy(field: &str, policy: &MilestonePolicy) -> Result<(), ConfigError> {
    match policy {
        MilestonePolicy::Every { step: 0 } => Err(ConfigError::invalid(field, "step must be > 0")),
        MilestonePolicy::Thresholds { values } if values.is_empty() => {
            Err(ConfigError::invalid(field, "thresholds must not be empty"))
        }
        _ => Ok(()),
    }
}

fn validate_key(field: &str, key: &str) -> Result<(), ConfigError> {
    if is_known_key(key) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("unknown key \"{}\"", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.classifier_priority, GameState::DEFAULT_PRIORITY.to_vec());
        assert_eq!(config.retry.capture_max_retries, 3);
        assert_eq!(config.level.format(NumericKind::Level).max_value, 400);
        assert_eq!(config.zen.format(NumericKind::Zen).separator, Some(','));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.health_check_threshold, 3);
        assert_eq!(config.base_dir.as_path(), dir.path());
    }

    #[test]
    fn test_partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "notification": { "character_name": "Kael", "user_id": "42" },
                "retry": { "capture_max_retries": 5 },
                "milestones": { "zen": { "policy": "every", "step": 200 } },
                "classifier_priority": ["dialog", "character_menu", "inventory", "in_game"],
                "level": { "region": { "x": 10, "y": 20, "width": 30, "height": 40 } }
            }"#,
        )
        .unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.notification.character_name, "Kael");
        assert_eq!(config.notification.timeout_ms, 10_000);
        assert_eq!(config.retry.capture_max_retries, 5);
        assert_eq!(config.retry.backoff_ms, 1000);
        assert_eq!(config.milestones.zen, MilestonePolicy::Every { step: 200 });
        assert_eq!(config.classifier_priority[1], GameState::CharacterMenu);
        assert_eq!(config.level.region, Region::absolute(10, 20, 30, 40));
        assert_eq!(config.level.attempts, 3);
        assert!(config.level.reveal.is_none());
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(MonitorConfig::load(&path), Err(ConfigError::Parse(..))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MonitorConfig::default();
        config.zen.region.width = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.templates.dialog.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.milestones.zen = MilestonePolicy::Every { step: 0 };
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.classifier_priority.pop();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.actions.push(ActionStep::Tap { key: "hyper".to_string() });
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_jitter_radius() {
        let mut config = MonitorConfig::default();
        config.actions.push(ActionStep::Jitter { radius: 4, steps: 2 });
        config.validate().unwrap();

        config.recovery.inventory.push(ActionStep::Jitter { radius: i32::MIN, steps: 1 });
        match config.validate() {
            Err(ConfigError::Invalid { reason, .. }) => assert!(reason.contains("jitter"), "{}", reason),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_asset_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MonitorConfig::default();
        config.base_dir = dir.path().to_path_buf();

        match config.validate_assets() {
            Err(ConfigError::MissingAsset { kind, path }) => {
                assert_eq!(kind, "template");
                assert!(path.ends_with("ingame_needle.png"));
            }
            other => panic!("expected MissingAsset, got {:?}", other),
        }
    }

    #[test]
    fn test_load_classifier_from_assets() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        fs::create_dir_all(assets.join("sounds")).unwrap();

        let config = MonitorConfig {
            base_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        for (i, state) in GameState::CONCRETE.iter().enumerate() {
            let file = &config.templates.get(*state).unwrap().file;
            let img = ImageBuffer::from_fn(6, 6, |x, y| Luma([((x + y * 3 + i as u32 * 7) * 11) as u8]));
            img.save(assets.join(file)).unwrap();
        }
        ImageBuffer::from_pixel(6, 6, Luma([1u8]))
            .save(assets.join("needle.png"))
            .unwrap();
        fs::write(assets.join("sounds/start.mp3"), b"").unwrap();
        fs::write(assets.join("sounds/reward.mp3"), b"").unwrap();

        config.validate_assets().unwrap();
        let classifier = config.load_classifier().unwrap();
        assert_eq!(classifier.priority(), GameState::DEFAULT_PRIORITY.to_vec());
        assert!(config.load_reward_probe().unwrap().is_some());
    }
}
