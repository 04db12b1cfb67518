//! Configuration loading and parsing.
//!
//! Parses `pocketview.toml` (or an override path provided by the binary).
//! Every field carries a default so a missing file, a missing section, or a
//! file that fails to parse all yield a usable configuration. Unknown fields
//! are ignored to allow forward evolution without immediate warnings.

use anyhow::Result;
use core_events::{LogicalAction, SourceKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "pocketview.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    #[serde(default = "DisplayConfig::default_width")]
    pub width: u32,
    #[serde(default = "DisplayConfig::default_height")]
    pub height: u32,
    /// Linux framebuffer device; headless output is used when absent or unusable.
    #[serde(default = "DisplayConfig::default_framebuffer")]
    pub framebuffer: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            framebuffer: Self::default_framebuffer(),
        }
    }
}

impl DisplayConfig {
    const fn default_width() -> u32 {
        320
    }
    const fn default_height() -> u32 {
        240
    }
    fn default_framebuffer() -> Option<PathBuf> {
        Some(PathBuf::from("/dev/fb1"))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    #[serde(default = "FrameConfig::default_tick_hz")]
    pub tick_hz: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            tick_hz: Self::default_tick_hz(),
        }
    }
}

impl FrameConfig {
    const fn default_tick_hz() -> u32 {
        30
    }
}

/// Keyboard key names per logical action. Names follow the normalized
/// `SignalId::Key` spelling (`"up"`, `"enter"`, `"esc"`, single characters).
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct KeyboardMapConfig {
    #[serde(default = "KeyboardMapConfig::default_up")]
    pub up: Vec<String>,
    #[serde(default = "KeyboardMapConfig::default_down")]
    pub down: Vec<String>,
    #[serde(default = "KeyboardMapConfig::default_left")]
    pub left: Vec<String>,
    #[serde(default = "KeyboardMapConfig::default_right")]
    pub right: Vec<String>,
    #[serde(default = "KeyboardMapConfig::default_confirm")]
    pub confirm: Vec<String>,
    #[serde(default = "KeyboardMapConfig::default_cancel")]
    pub cancel: Vec<String>,
    #[serde(default = "KeyboardMapConfig::default_menu")]
    pub menu: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KeyboardMapConfig {
    fn default() -> Self {
        Self {
            up: Self::default_up(),
            down: Self::default_down(),
            left: Self::default_left(),
            right: Self::default_right(),
            confirm: Self::default_confirm(),
            cancel: Self::default_cancel(),
            menu: Self::default_menu(),
        }
    }
}

impl KeyboardMapConfig {
    fn default_up() -> Vec<String> {
        names(&["up", "k"])
    }
    fn default_down() -> Vec<String> {
        names(&["down", "j"])
    }
    fn default_left() -> Vec<String> {
        names(&["left", "h"])
    }
    fn default_right() -> Vec<String> {
        names(&["right", "l"])
    }
    fn default_confirm() -> Vec<String> {
        names(&["enter", "space"])
    }
    fn default_cancel() -> Vec<String> {
        names(&["esc", "backspace"])
    }
    fn default_menu() -> Vec<String> {
        names(&["m", "tab"])
    }

    /// Flatten into `(key name, action)` pairs in a stable order.
    pub fn bindings(&self) -> Vec<(String, LogicalAction)> {
        let groups: [(&Vec<String>, LogicalAction); 7] = [
            (&self.up, LogicalAction::Up),
            (&self.down, LogicalAction::Down),
            (&self.left, LogicalAction::Left),
            (&self.right, LogicalAction::Right),
            (&self.confirm, LogicalAction::Confirm),
            (&self.cancel, LogicalAction::Cancel),
            (&self.menu, LogicalAction::Menu),
        ];
        groups
            .iter()
            .flat_map(|(keys, action)| keys.iter().map(move |k| (k.to_ascii_lowercase(), *action)))
            .collect()
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct KeyboardConfig {
    #[serde(default)]
    pub map: KeyboardMapConfig,
    /// Per-key debounce override in milliseconds.
    #[serde(default)]
    pub debounce: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PinConfig {
    pub pin: u32,
    pub action: LogicalAction,
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

impl PinConfig {
    fn new(pin: u32, action: LogicalAction) -> Self {
        Self {
            pin,
            action,
            debounce_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct GpioConfig {
    #[serde(default = "GpioConfig::default_root")]
    pub root: PathBuf,
    #[serde(default = "GpioConfig::default_active_low")]
    pub active_low: bool,
    #[serde(default = "GpioConfig::default_pins")]
    pub pins: Vec<PinConfig>,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            active_low: Self::default_active_low(),
            pins: Self::default_pins(),
        }
    }
}

impl GpioConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("/sys/class/gpio")
    }
    const fn default_active_low() -> bool {
        true
    }
    fn default_pins() -> Vec<PinConfig> {
        vec![
            PinConfig::new(17, LogicalAction::Up),
            PinConfig::new(22, LogicalAction::Down),
            PinConfig::new(27, LogicalAction::Left),
            PinConfig::new(23, LogicalAction::Right),
            PinConfig::new(5, LogicalAction::Confirm),
            PinConfig::new(6, LogicalAction::Cancel),
            PinConfig::new(16, LogicalAction::Menu),
        ]
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct InputConfig {
    /// Preferred active source. GPIO falls back to keyboard when unavailable.
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default = "InputConfig::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            debounce_ms: Self::default_debounce_ms(),
            keyboard: KeyboardConfig::default(),
            gpio: GpioConfig::default(),
        }
    }
}

impl InputConfig {
    const fn default_debounce_ms() -> u64 {
        100
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_text_capacity")]
    pub text_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            text_capacity: Self::default_text_capacity(),
        }
    }
}

impl CacheConfig {
    const fn default_text_capacity() -> usize {
        100
    }
}

/// What popping the bottom-most screen does.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PopLast {
    #[default]
    Ignore,
    Fatal,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct NavigationConfig {
    #[serde(default)]
    pub pop_last: PopLast,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ContentConfig {
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    #[serde(default)]
    pub assets: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

impl Config {
    /// Fixed tick cadence; a zero rate is treated as 1 Hz.
    pub fn tick_interval(&self) -> Duration {
        let hz = self.file.frame.tick_hz.max(1);
        Duration::from_nanos(1_000_000_000 / u64::from(hz))
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("pocketview").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_missing_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.file.display.width, 320);
        assert_eq!(cfg.file.display.height, 240);
        assert_eq!(cfg.file.input.debounce_ms, 100);
        assert_eq!(cfg.file.input.source, SourceKind::Keyboard);
        assert_eq!(cfg.file.cache.text_capacity, 100);
        assert_eq!(cfg.file.navigation.pop_last, PopLast::Ignore);
    }

    #[test]
    fn parses_sections_and_keeps_unlisted_defaults() {
        let tmp = write_config(
            "[display]\nwidth = 480\n\n[input]\nsource = \"gpio\"\ndebounce_ms = 60\n\n[navigation]\npop_last = \"fatal\"\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_some());
        assert_eq!(cfg.file.display.width, 480);
        assert_eq!(cfg.file.display.height, 240);
        assert_eq!(cfg.file.input.source, SourceKind::Gpio);
        assert_eq!(cfg.file.input.debounce_window(), Duration::from_millis(60));
        assert_eq!(cfg.file.navigation.pop_last, PopLast::Fatal);
        assert_eq!(cfg.file.input.gpio.pins.len(), 7);
    }

    #[test]
    fn parses_gpio_pins_with_overrides() {
        let tmp = write_config(
            "[input.gpio]\nactive_low = false\n\n[[input.gpio.pins]]\npin = 4\naction = \"confirm\"\ndebounce_ms = 250\n\n[[input.gpio.pins]]\npin = 12\naction = \"cancel\"\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let gpio = &cfg.file.input.gpio;
        assert!(!gpio.active_low);
        assert_eq!(gpio.root, PathBuf::from("/sys/class/gpio"));
        assert_eq!(gpio.pins.len(), 2);
        assert_eq!(gpio.pins[0].action, LogicalAction::Confirm);
        assert_eq!(gpio.pins[0].debounce_ms, Some(250));
        assert_eq!(gpio.pins[1].debounce_ms, None);
    }

    #[test]
    fn keyboard_bindings_flatten_and_lowercase() {
        let tmp = write_config(
            "[input.keyboard.map]\nconfirm = [\"Enter\", \"x\"]\n\n[input.keyboard.debounce]\nenter = 150\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let kb = &cfg.file.input.keyboard;
        let bindings = kb.map.bindings();
        assert!(bindings.contains(&("enter".to_string(), LogicalAction::Confirm)));
        assert!(bindings.contains(&("x".to_string(), LogicalAction::Confirm)));
        assert!(bindings.contains(&("up".to_string(), LogicalAction::Up)));
        assert_eq!(kb.debounce.get("enter"), Some(&150));
    }

    #[test]
    fn tick_interval_from_rate() {
        let mut cfg = Config::default();
        assert_eq!(cfg.tick_interval(), Duration::from_nanos(33_333_333));
        cfg.file.frame.tick_hz = 0;
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn parse_failure_falls_back_and_logs_config_target() {
        let tmp = write_config("[display\nwidth = = 3\n");
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || load_from(Some(tmp.path().to_path_buf())).unwrap());

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("config_parse_failed_using_defaults"));
        assert_eq!(cfg.file, ConfigFile::default());
    }
}
