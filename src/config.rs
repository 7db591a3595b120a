use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use supports_color::Stream;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub backend: BackendConfig,
    pub auth: AuthProviderConfig,
    pub display: DisplayConfig,
    pub performance: PerformanceConfig,
    pub search: SearchConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
    /// Store locations for the map view; risk is derived from loaded
    /// prediction rows, never stored here.
    pub stores: Vec<StoreLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub table_page_size: usize,
    pub results_page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthProviderConfig {
    pub base_url: String,
    /// Provider API key. Absent means the app runs without sign-in.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// predicted_sales above this is flagged high-risk
    pub high_risk_threshold: f64,
    /// predicted_sales above this (but below high) is flagged warn
    pub warn_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub event_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub history_limit: usize,
    pub enable_history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub color_mode: String,
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub primary: String,
    pub success: String,
    pub error: String,
    pub warning: String,
    pub dimmed: String,
    pub controls_bg: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub text_inverse: String,
    pub table_header: String,
    pub table_border: String,
    pub table_selected: String,
    pub modal_border: String,
    pub modal_border_active: String,
    pub modal_border_error: String,
    pub risk_high: String,
    pub risk_moderate: String,
    pub risk_low: String,
    pub risk_none: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreLocation {
    pub store_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

// Default implementations
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            backend: BackendConfig::default(),
            auth: AuthProviderConfig::default(),
            display: DisplayConfig::default(),
            performance: PerformanceConfig::default(),
            search: SearchConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
            stores: Vec::new(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".to_string(),
            timeout_secs: 30,
            table_page_size: 50,
            results_page_size: 1000,
        }
    }
}

impl Default for AuthProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://identitytoolkit.googleapis.com".to_string(),
            api_key: None,
            timeout_secs: 15,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: 100.0,
            warn_threshold: 50.0,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: 25,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            enable_history: true,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            color_mode: "auto".to_string(),
            colors: ColorConfig::default(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: "cyan".to_string(),
            success: "green".to_string(),
            error: "red".to_string(),
            warning: "yellow".to_string(),
            dimmed: "dark_gray".to_string(),
            controls_bg: "indexed(236)".to_string(),
            text_primary: "white".to_string(),
            text_secondary: "dark_gray".to_string(),
            text_inverse: "black".to_string(),
            table_header: "white".to_string(),
            table_border: "cyan".to_string(),
            table_selected: "reversed".to_string(),
            modal_border: "cyan".to_string(),
            modal_border_active: "yellow".to_string(),
            modal_border_error: "red".to_string(),
            risk_high: "red".to_string(),
            risk_moderate: "yellow".to_string(),
            risk_low: "green".to_string(),
            risk_none: "blue".to_string(),
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Ok(user_config) = Self::load_user_config(app_name) {
            config.merge(user_config);
        }

        config.validate()?;

        Ok(config)
    }

    /// Load user configuration from the platform config dir
    fn load_user_config(app_name: &str) -> Result<AppConfig> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from(&config_manager.config_path("config.toml"))
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.backend.merge(other.backend);
        self.auth.merge(other.auth);
        self.display.merge(other.display);
        self.performance.merge(other.performance);
        self.search.merge(other.search);
        self.theme.merge(other.theme);
        self.debug.merge(other.debug);
        if !other.stores.is_empty() {
            self.stores = other.stores;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.backend.base_url.is_empty() {
            return Err(eyre!("backend.base_url must not be empty"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(eyre!("backend.timeout_secs must be greater than 0"));
        }
        if self.backend.table_page_size == 0 || self.backend.results_page_size == 0 {
            return Err(eyre!("backend page sizes must be greater than 0"));
        }

        if self.performance.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }

        if self.display.warn_threshold > self.display.high_risk_threshold {
            return Err(eyre!(
                "display.warn_threshold ({}) must not exceed display.high_risk_threshold ({})",
                self.display.warn_threshold,
                self.display.high_risk_threshold
            ));
        }

        match self.theme.color_mode.as_str() {
            "light" | "dark" | "auto" => {}
            _ => {
                return Err(eyre!(
                    "Invalid color_mode: {}. Must be 'light', 'dark', or 'auto'",
                    self.theme.color_mode
                ))
            }
        }

        let parser = ColorParser::new();
        self.theme.colors.validate(&parser)?;

        Ok(())
    }
}

impl BackendConfig {
    pub fn merge(&mut self, other: Self) {
        let default = BackendConfig::default();
        if other.base_url != default.base_url {
            self.base_url = other.base_url;
        }
        if other.timeout_secs != default.timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
        if other.table_page_size != default.table_page_size {
            self.table_page_size = other.table_page_size;
        }
        if other.results_page_size != default.results_page_size {
            self.results_page_size = other.results_page_size;
        }
    }
}

impl AuthProviderConfig {
    pub fn merge(&mut self, other: Self) {
        let default = AuthProviderConfig::default();
        if other.base_url != default.base_url {
            self.base_url = other.base_url;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.timeout_secs != default.timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DisplayConfig::default();
        if other.high_risk_threshold != default.high_risk_threshold {
            self.high_risk_threshold = other.high_risk_threshold;
        }
        if other.warn_threshold != default.warn_threshold {
            self.warn_threshold = other.warn_threshold;
        }
    }
}

impl PerformanceConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PerformanceConfig::default();
        if other.event_poll_interval_ms != default.event_poll_interval_ms {
            self.event_poll_interval_ms = other.event_poll_interval_ms;
        }
    }
}

impl SearchConfig {
    pub fn merge(&mut self, other: Self) {
        let default = SearchConfig::default();
        if other.history_limit != default.history_limit {
            self.history_limit = other.history_limit;
        }
        if other.enable_history != default.enable_history {
            self.enable_history = other.enable_history;
        }
    }
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ThemeConfig::default();
        if other.color_mode != default.color_mode {
            self.color_mode = other.color_mode;
        }
        self.colors.merge(other.colors);
    }
}

impl ColorConfig {
    /// Validate all color strings can be parsed
    fn validate(&self, parser: &ColorParser) -> Result<()> {
        macro_rules! validate_color {
            ($field:expr, $name:expr) => {
                parser
                    .parse($field)
                    .map_err(|e| eyre!("Invalid color value for '{}': {}", $name, e))?;
            };
        }

        validate_color!(&self.primary, "primary");
        validate_color!(&self.success, "success");
        validate_color!(&self.error, "error");
        validate_color!(&self.warning, "warning");
        validate_color!(&self.dimmed, "dimmed");
        validate_color!(&self.controls_bg, "controls_bg");
        validate_color!(&self.text_primary, "text_primary");
        validate_color!(&self.text_secondary, "text_secondary");
        validate_color!(&self.text_inverse, "text_inverse");
        validate_color!(&self.table_header, "table_header");
        validate_color!(&self.table_border, "table_border");
        validate_color!(&self.table_selected, "table_selected");
        validate_color!(&self.modal_border, "modal_border");
        validate_color!(&self.modal_border_active, "modal_border_active");
        validate_color!(&self.modal_border_error, "modal_border_error");
        validate_color!(&self.risk_high, "risk_high");
        validate_color!(&self.risk_moderate, "risk_moderate");
        validate_color!(&self.risk_low, "risk_low");
        validate_color!(&self.risk_none, "risk_none");

        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();

        macro_rules! merge_color {
            ($field:ident) => {
                if other.$field != default.$field {
                    self.$field = other.$field;
                }
            };
        }

        merge_color!(primary);
        merge_color!(success);
        merge_color!(error);
        merge_color!(warning);
        merge_color!(dimmed);
        merge_color!(controls_bg);
        merge_color!(text_primary);
        merge_color!(text_secondary);
        merge_color!(text_inverse);
        merge_color!(table_header);
        merge_color!(table_border);
        merge_color!(table_selected);
        merge_color!(modal_border);
        merge_color!(modal_border_active);
        merge_color!(modal_border_error);
        merge_color!(risk_high);
        merge_color!(risk_moderate);
        merge_color!(risk_low);
        merge_color!(risk_none);
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.enabled {
            self.enabled = true;
        }
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorParser {
    /// Create a new ColorParser with automatic terminal capability detection
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse a color string (hex, indexed, or named) and convert to a color
    /// the current terminal can actually show
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();

        // Hex format: "#ff0000" (6-character hex)
        if trimmed.starts_with('#') && trimmed.len() == 7 {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.convert_rgb(r, g, b));
        }

        // Indexed colors: "indexed(236)" for the 256-color palette
        if trimmed.to_lowercase().starts_with("indexed(") && trimmed.ends_with(')') {
            let num_str = &trimmed[8..trimmed.len() - 1];
            let num = num_str.parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),

            "bright_black" | "bright black" => Ok(Color::Indexed(8)),
            "bright_red" | "bright red" => Ok(Color::Indexed(9)),
            "bright_green" | "bright green" => Ok(Color::Indexed(10)),
            "bright_yellow" | "bright yellow" => Ok(Color::Indexed(11)),
            "bright_blue" | "bright blue" => Ok(Color::Indexed(12)),
            "bright_magenta" | "bright magenta" => Ok(Color::Indexed(13)),
            "bright_cyan" | "bright cyan" => Ok(Color::Indexed(14)),
            "bright_white" | "bright white" => Ok(Color::Indexed(15)),

            "gray" | "grey" | "dark_gray" | "dark gray" | "dark_grey" | "dark grey" => {
                Ok(Color::Indexed(8))
            }
            "light_gray" | "light gray" | "light_grey" | "light grey" => Ok(Color::Indexed(7)),

            // Pass-throughs handled specially at render time
            "default" | "reset" | "reversed" => Ok(Color::Reset),

            _ => Err(eyre!(
                "Unknown color: '{}'. Use a name, indexed(n), or #rrggbb",
                trimmed
            )),
        }
    }

    fn convert_rgb(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let hex = &s[1..];
    let r = u8::from_str_radix(&hex[0..2], 16)
        .map_err(|_| eyre!("Invalid hex color: '{}'", s))?;
    let g = u8::from_str_radix(&hex[2..4], 16)
        .map_err(|_| eyre!("Invalid hex color: '{}'", s))?;
    let b = u8::from_str_radix(&hex[4..6], 16)
        .map_err(|_| eyre!("Invalid hex color: '{}'", s))?;
    Ok((r, g, b))
}

/// Map RGB onto the xterm 256-color palette (6x6x6 cube plus grayscale ramp).
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    // Grayscale ramp when all channels are close
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 10 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        if avg < 8 {
            return 16; // black corner of the cube
        }
        if avg > 238 {
            return 231; // white corner of the cube
        }
        return 232 + ((avg - 8) / 10) as u8;
    }

    let to_cube = |c: u8| -> u8 {
        if c < 48 {
            0
        } else if c < 115 {
            1
        } else {
            ((c as u16 - 35) / 40) as u8
        }
    };
    16 + 36 * to_cube(r) + 6 * to_cube(g) + to_cube(b)
}

/// Map RGB onto the 8 basic ANSI colors.
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let r_bright = r >= 128;
    let g_bright = g >= 128;
    let b_bright = b >= 128;

    // Check for grayscale
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }

    match (r_bright, g_bright, b_bright) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Theme containing parsed colors ready for use
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    /// Create a Theme from a ThemeConfig by parsing all color strings
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let mut colors = HashMap::new();

        macro_rules! insert_color {
            ($field:ident) => {
                colors.insert(
                    stringify!($field).to_string(),
                    parser.parse(&config.colors.$field)?,
                );
            };
        }

        insert_color!(primary);
        insert_color!(success);
        insert_color!(error);
        insert_color!(warning);
        insert_color!(dimmed);
        insert_color!(controls_bg);
        insert_color!(text_primary);
        insert_color!(text_secondary);
        insert_color!(text_inverse);
        insert_color!(table_header);
        insert_color!(table_border);
        insert_color!(table_selected);
        insert_color!(modal_border);
        insert_color!(modal_border_active);
        insert_color!(modal_border_error);
        insert_color!(risk_high);
        insert_color!(risk_moderate);
        insert_color!(risk_low);
        insert_color!(risk_none);

        Ok(Self { colors })
    }

    /// Get a color by name, returns Reset if not found
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }
}

// Default configuration template
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#ff0000").unwrap(), (255, 0, 0));
        assert_eq!(parse_hex("#00FF7f").unwrap(), (0, 255, 127));
        assert!(parse_hex("#zzzzzz").is_err());
    }

    #[test]
    fn test_rgb_to_256_grayscale_ramp() {
        assert_eq!(rgb_to_256_color(0, 0, 0), 16);
        assert_eq!(rgb_to_256_color(255, 255, 255), 231);
        let mid = rgb_to_256_color(128, 128, 128);
        assert!((232..=255).contains(&mid));
    }

    #[test]
    fn test_rgb_to_basic_ansi() {
        assert_eq!(rgb_to_basic_ansi(255, 0, 0), Color::Red);
        assert_eq!(rgb_to_basic_ansi(0, 200, 0), Color::Green);
        assert_eq!(rgb_to_basic_ansi(20, 20, 20), Color::Black);
        assert_eq!(rgb_to_basic_ansi(200, 200, 200), Color::White);
    }
}
