//! Layered accordion configuration.
//!
//! Built-in defaults, overridden by the global config file
//! (`~/.config/concertina/config.toml`, `[accordion]` section), overridden by
//! per-instance declarative attributes. Attribute keys use `__`-delimited
//! paths for nested options and are parsed against an explicit schema;
//! unparsable values fall back to the raw string and warn, never fail.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How many items may be open at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Single,
    Multiple,
}

/// Which items start open after build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InitialOpen {
    #[default]
    None,
    First,
    All,
    /// 1-based position in the item list.
    Index(usize),
    /// Literal item id.
    Id(String),
}

impl InitialOpen {
    /// Interpret an attribute or flag value.
    pub fn from_attr(raw: &str) -> Self {
        match parse_attr(raw) {
            AttrValue::Bool(_) => InitialOpen::None,
            AttrValue::Int(n) if n > 0 => InitialOpen::Index(n as usize),
            AttrValue::Int(_) => InitialOpen::None,
            AttrValue::Str(s) => match s.as_str() {
                "" => InitialOpen::None,
                "first" => InitialOpen::First,
                "all" => InitialOpen::All,
                _ => InitialOpen::Id(s),
            },
        }
    }
}

impl<'de> Deserialize<'de> for InitialOpen {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            #[allow(dead_code)]
            Bool(bool),
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(_) => InitialOpen::None,
            Raw::Int(n) if n > 0 => InitialOpen::Index(n as usize),
            Raw::Int(_) => InitialOpen::None,
            Raw::Str(s) => InitialOpen::from_attr(&s),
        })
    }
}

/// Item count cap for collection sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLimit {
    Unlimited,
    Max(usize),
}

impl ItemLimit {
    pub fn as_option(self) -> Option<usize> {
        match self {
            ItemLimit::Unlimited => None,
            ItemLimit::Max(n) => Some(n),
        }
    }
}

impl<'de> Deserialize<'de> for ItemLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            #[allow(dead_code)]
            Bool(bool),
            Int(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(_) => ItemLimit::Unlimited,
            Raw::Int(n) => ItemLimit::Max(n as usize),
        })
    }
}

/// Expand/collapse indicator style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconStyle {
    Plus,
    Arrow,
    /// Escape hatch: an arbitrary style token exposed to the page's CSS.
    Custom(String),
}

impl IconStyle {
    pub fn from_token(token: &str) -> Self {
        match token {
            "plus" => IconStyle::Plus,
            "arrow" => IconStyle::Arrow,
            other => IconStyle::Custom(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            IconStyle::Plus => "plus",
            IconStyle::Arrow => "arrow",
            IconStyle::Custom(token) => token,
        }
    }
}

impl<'de> Deserialize<'de> for IconStyle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(IconStyle::from_token(&String::deserialize(deserializer)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconPlacement {
    Left,
    Right,
}

impl IconPlacement {
    pub fn as_str(self) -> &'static str {
        match self {
            IconPlacement::Left => "left",
            IconPlacement::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleAlignment {
    Left,
    Center,
    Right,
}

impl TitleAlignment {
    pub fn as_str(self) -> &'static str {
        match self {
            TitleAlignment::Left => "left",
            TitleAlignment::Center => "center",
            TitleAlignment::Right => "right",
        }
    }
}

/// Divider visibility around items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dividers {
    pub enabled: bool,
    pub show_first: bool,
    pub show_last: bool,
}

/// Fully-resolved instance configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mode: Mode,
    pub initial_open: InitialOpen,
    pub limit: ItemLimit,
    pub icon_style: IconStyle,
    pub icon_placement: IconPlacement,
    pub dividers: Dividers,
    pub url_sync: bool,
    pub title_alignment: TitleAlignment,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Single,
            initial_open: InitialOpen::None,
            limit: ItemLimit::Unlimited,
            icon_style: IconStyle::Plus,
            icon_placement: IconPlacement::Right,
            dividers: Dividers {
                enabled: true,
                show_first: true,
                show_last: true,
            },
            url_sync: false,
            title_alignment: TitleAlignment::Left,
        }
    }
}

impl Config {
    /// Resolve the layered configuration: defaults < global file < instance
    /// attributes.
    pub fn layered(global: Option<&ConfigOverlay>, instance: &ConfigOverlay) -> Self {
        let mut config = Config::default();
        if let Some(overlay) = global {
            overlay.apply(&mut config);
        }
        instance.apply(&mut config);
        config
    }
}

/// One layer of overrides; unset fields leave the lower layers alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigOverlay {
    pub mode: Option<Mode>,
    pub initial_open: Option<InitialOpen>,
    pub limit: Option<ItemLimit>,
    pub icon_style: Option<IconStyle>,
    pub icon_placement: Option<IconPlacement>,
    pub dividers: DividersOverlay,
    pub url_sync: Option<bool>,
    pub title_alignment: Option<TitleAlignment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DividersOverlay {
    pub enabled: Option<bool>,
    pub show_first: Option<bool>,
    pub show_last: Option<bool>,
}

impl ConfigOverlay {
    pub fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(initial) = &self.initial_open {
            config.initial_open = initial.clone();
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(style) = &self.icon_style {
            config.icon_style = style.clone();
        }
        if let Some(placement) = self.icon_placement {
            config.icon_placement = placement;
        }
        if let Some(enabled) = self.dividers.enabled {
            config.dividers.enabled = enabled;
        }
        if let Some(show_first) = self.dividers.show_first {
            config.dividers.show_first = show_first;
        }
        if let Some(show_last) = self.dividers.show_last {
            config.dividers.show_last = show_last;
        }
        if let Some(url_sync) = self.url_sync {
            config.url_sync = url_sync;
        }
        if let Some(alignment) = self.title_alignment {
            config.title_alignment = alignment;
        }
    }

    /// Parse instance attributes (`data-` prefix already stripped) against
    /// the option schema. `__` separates path segments for nested options.
    /// Unknown keys and unparsable values warn and are skipped; for the icon
    /// style the raw string itself is the custom-token escape hatch.
    pub fn from_attrs(attrs: &BTreeMap<String, String>) -> Self {
        let mut overlay = ConfigOverlay::default();
        for (key, raw) in attrs {
            let path: Vec<&str> = key.split("__").collect();
            overlay.apply_attr(&path, raw);
        }
        overlay
    }

    fn apply_attr(&mut self, path: &[&str], raw: &str) {
        match path {
            ["mode"] => match raw {
                "single" => self.mode = Some(Mode::Single),
                "multiple" => self.mode = Some(Mode::Multiple),
                other => tracing::warn!(value = other, "unrecognized mode, keeping lower layers"),
            },
            ["initial-open"] => self.initial_open = Some(InitialOpen::from_attr(raw)),
            ["limit"] => match parse_attr(raw) {
                AttrValue::Bool(_) => self.limit = Some(ItemLimit::Unlimited),
                AttrValue::Int(n) if n >= 0 => self.limit = Some(ItemLimit::Max(n as usize)),
                _ => tracing::warn!(value = raw, "unrecognized limit, keeping lower layers"),
            },
            ["icon-style"] => self.icon_style = Some(IconStyle::from_token(raw)),
            ["icon-placement"] => match raw {
                "left" => self.icon_placement = Some(IconPlacement::Left),
                "right" => self.icon_placement = Some(IconPlacement::Right),
                other => {
                    tracing::warn!(value = other, "unrecognized icon placement, keeping lower layers");
                }
            },
            ["dividers", "enabled"] => self.dividers.enabled = parse_bool_attr(raw),
            ["dividers", "show-first"] => self.dividers.show_first = parse_bool_attr(raw),
            ["dividers", "show-last"] => self.dividers.show_last = parse_bool_attr(raw),
            ["url-sync"] => self.url_sync = parse_bool_attr(raw),
            ["title-alignment"] => match raw {
                "left" => self.title_alignment = Some(TitleAlignment::Left),
                "center" => self.title_alignment = Some(TitleAlignment::Center),
                "right" => self.title_alignment = Some(TitleAlignment::Right),
                other => {
                    tracing::warn!(value = other, "unrecognized title alignment, keeping lower layers");
                }
            },
            _ => tracing::warn!(key = %path.join("__"), "unrecognized option attribute"),
        }
    }
}

fn parse_bool_attr(raw: &str) -> Option<bool> {
    match parse_attr(raw) {
        AttrValue::Bool(b) => Some(b),
        _ => {
            tracing::warn!(value = raw, "expected a boolean, keeping lower layers");
            None
        }
    }
}

/// A declarative attribute value coerced to its natural primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Shared string-to-primitive coercion for declarative attributes.
pub fn parse_attr(raw: &str) -> AttrValue {
    match raw.trim() {
        "true" => AttrValue::Bool(true),
        "false" => AttrValue::Bool(false),
        trimmed => match trimmed.parse::<i64>() {
            Ok(n) => AttrValue::Int(n),
            Err(_) => AttrValue::Str(trimmed.to_string()),
        },
    }
}

/// Load the global overlay from the user config directory, if present.
pub fn load_global_overlay() -> Option<ConfigOverlay> {
    let path = dirs::config_dir()?.join("concertina").join("config.toml");
    load_overlay_from_path(&path)
}

/// Load the `[accordion]` section of a config file.
pub fn load_overlay_from_path(path: &Path) -> Option<ConfigOverlay> {
    let contents = std::fs::read_to_string(path).ok()?;

    #[derive(Deserialize)]
    struct FullConfig {
        #[serde(default)]
        accordion: ConfigOverlay,
    }

    match toml::from_str::<FullConfig>(&contents) {
        Ok(full) => Some(full.accordion),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Single);
        assert_eq!(config.initial_open, InitialOpen::None);
        assert_eq!(config.limit, ItemLimit::Unlimited);
        assert!(!config.url_sync);
    }

    #[test]
    fn test_layer_precedence() {
        let global: ConfigOverlay = toml::from_str(
            r#"
            mode = "multiple"
            initial-open = "all"
            url-sync = true
            "#,
        )
        .unwrap();
        let instance = ConfigOverlay::from_attrs(&attrs(&[("mode", "single")]));

        let config = Config::layered(Some(&global), &instance);
        // Instance wins over global; untouched keys fall through.
        assert_eq!(config.mode, Mode::Single);
        assert_eq!(config.initial_open, InitialOpen::All);
        assert!(config.url_sync);
    }

    #[test]
    fn test_initial_open_variants() {
        assert_eq!(InitialOpen::from_attr("first"), InitialOpen::First);
        assert_eq!(InitialOpen::from_attr("all"), InitialOpen::All);
        assert_eq!(InitialOpen::from_attr("2"), InitialOpen::Index(2));
        assert_eq!(InitialOpen::from_attr("0"), InitialOpen::None);
        assert_eq!(InitialOpen::from_attr("false"), InitialOpen::None);
        assert_eq!(InitialOpen::from_attr(""), InitialOpen::None);
        assert_eq!(
            InitialOpen::from_attr("shipping"),
            InitialOpen::Id("shipping".to_string())
        );
    }

    #[test]
    fn test_nested_attr_paths() {
        let overlay = ConfigOverlay::from_attrs(&attrs(&[
            ("dividers__show-first", "false"),
            ("dividers__enabled", "true"),
            ("icon-placement", "left"),
        ]));
        assert_eq!(overlay.dividers.show_first, Some(false));
        assert_eq!(overlay.dividers.enabled, Some(true));
        assert_eq!(overlay.icon_placement, Some(IconPlacement::Left));
    }

    #[test]
    fn test_malformed_values_keep_lower_layers() {
        let overlay = ConfigOverlay::from_attrs(&attrs(&[
            ("mode", "sideways"),
            ("limit", "lots"),
            ("url-sync", "yep"),
        ]));
        let mut config = Config::default();
        overlay.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_custom_icon_token_is_the_raw_string() {
        let overlay = ConfigOverlay::from_attrs(&attrs(&[("icon-style", "chevron")]));
        assert_eq!(
            overlay.icon_style,
            Some(IconStyle::Custom("chevron".to_string()))
        );
    }

    #[test]
    fn test_limit_from_toml_accepts_false_and_int() {
        let unlimited: ConfigOverlay = toml::from_str("limit = false").unwrap();
        assert_eq!(unlimited.limit, Some(ItemLimit::Unlimited));
        let capped: ConfigOverlay = toml::from_str("limit = 3").unwrap();
        assert_eq!(capped.limit, Some(ItemLimit::Max(3)));
    }

    #[test]
    fn test_parse_attr_coercion() {
        assert_eq!(parse_attr("true"), AttrValue::Bool(true));
        assert_eq!(parse_attr("-3"), AttrValue::Int(-3));
        assert_eq!(parse_attr(" 42 "), AttrValue::Int(42));
        assert_eq!(parse_attr("plum"), AttrValue::Str("plum".to_string()));
    }

    #[test]
    fn test_overlay_from_section_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[accordion]\nmode = \"multiple\"\ninitial-open = 2\n",
        )
        .unwrap();

        let overlay = load_overlay_from_path(&path).unwrap();
        assert_eq!(overlay.mode, Some(Mode::Multiple));
        assert_eq!(overlay.initial_open, Some(InitialOpen::Index(2)));
    }
}
