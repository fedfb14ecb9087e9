//! Configuration descriptions: the qualifier tuple that keys every value.
//!
//! A [`ConfigDescription`] is a fixed-layout tuple of qualifiers (locale,
//! screen dimensions, orientation, night mode, density, platform level). It
//! has a total order used for deterministic output, a [`ConfigDescription::diff`]
//! operator returning the set of axes on which two descriptions disagree, and
//! a dominance test used by the split partitioner.
//!
//! Qualifier strings follow the resource directory syntax, dash-joined in
//! canonical axis order: `mcc310-mnc004-en-rUS-sw600dp-land-night-hdpi-v21`.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// The set of qualifier axes on which two configurations differ.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConfigAxis: u32 {
        /// Mobile country code.
        const MCC = 1 << 0;
        /// Mobile network code.
        const MNC = 1 << 1;
        /// Language and region.
        const LOCALE = 1 << 2;
        /// Smallest width in dp.
        const SMALLEST_WIDTH = 1 << 3;
        /// Available width in dp.
        const WIDTH = 1 << 4;
        /// Available height in dp.
        const HEIGHT = 1 << 5;
        /// Screen orientation.
        const ORIENTATION = 1 << 6;
        /// Night mode.
        const NIGHT = 1 << 7;
        /// Screen density.
        const DENSITY = 1 << 8;
        /// Platform API level.
        const SDK = 1 << 9;
    }
}

/// Screen orientation qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Orientation {
    /// Unspecified.
    #[default]
    Any,
    /// Portrait.
    Port,
    /// Landscape.
    Land,
}

/// Night mode qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum NightMode {
    /// Unspecified.
    #[default]
    Any,
    /// Explicitly not night.
    NotNight,
    /// Night.
    Night,
}

/// Density value representing `anydpi`.
pub const DENSITY_ANY: u16 = 0xfffe;
/// Density value representing `nodpi`.
pub const DENSITY_NONE: u16 = 0xffff;

const NAMED_DENSITIES: &[(&str, u16)] = &[
    ("ldpi", 120),
    ("mdpi", 160),
    ("tvdpi", 213),
    ("hdpi", 240),
    ("xhdpi", 320),
    ("xxhdpi", 480),
    ("xxxhdpi", 640),
    ("anydpi", DENSITY_ANY),
    ("nodpi", DENSITY_NONE),
];

/// A fixed-layout tuple of resource qualifiers.
///
/// The derived `Ord` compares fields in declaration order, which matches the
/// canonical qualifier precedence and gives the deterministic tie-breaking
/// the output stages rely on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConfigDescription {
    /// Mobile country code, 0 when unset.
    pub mcc: u16,
    /// Mobile network code, 0 when unset.
    pub mnc: u16,
    /// ISO-639-1 language, `[0, 0]` when unset.
    pub language: [u8; 2],
    /// ISO-3166-1 region, `[0, 0]` when unset.
    pub region: [u8; 2],
    /// Smallest screen width in dp, 0 when unset.
    pub smallest_width_dp: u16,
    /// Available screen width in dp, 0 when unset.
    pub width_dp: u16,
    /// Available screen height in dp, 0 when unset.
    pub height_dp: u16,
    /// Screen orientation.
    pub orientation: Orientation,
    /// Night mode.
    pub night: NightMode,
    /// Screen density in dpi, 0 when unset.
    pub density: u16,
    /// Minimum platform API level, 0 when unset.
    pub sdk_version: u16,
}

impl ConfigDescription {
    /// The default (unqualified) configuration.
    #[must_use]
    pub fn default_config() -> Self {
        ConfigDescription::default()
    }

    /// True when no qualifier is set.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == ConfigDescription::default()
    }

    /// Parse a dash-joined qualifier string in canonical axis order.
    ///
    /// The empty string parses to the default configuration. Returns `None`
    /// on unknown qualifiers, out-of-order qualifiers or repeated axes.
    #[must_use]
    pub fn parse(s: &str) -> Option<ConfigDescription> {
        let mut config = ConfigDescription::default();
        if s.is_empty() {
            return Some(config);
        }

        // Stages mirror field order; a token may only match the current stage
        // or a later one, which enforces canonical ordering.
        let mut stage = 0u8;
        for token in s.split('-') {
            let mut matched = false;
            for next in stage..=10 {
                if try_parse_qualifier(token, next, &mut config) {
                    stage = next + 1;
                    matched = true;
                    break;
                }
            }
            if !matched {
                return None;
            }
        }
        Some(config)
    }

    /// The set of axes on which `self` and `other` differ.
    #[must_use]
    pub fn diff(&self, other: &ConfigDescription) -> ConfigAxis {
        let mut axes = ConfigAxis::empty();
        if self.mcc != other.mcc {
            axes |= ConfigAxis::MCC;
        }
        if self.mnc != other.mnc {
            axes |= ConfigAxis::MNC;
        }
        if self.language != other.language || self.region != other.region {
            axes |= ConfigAxis::LOCALE;
        }
        if self.smallest_width_dp != other.smallest_width_dp {
            axes |= ConfigAxis::SMALLEST_WIDTH;
        }
        if self.width_dp != other.width_dp {
            axes |= ConfigAxis::WIDTH;
        }
        if self.height_dp != other.height_dp {
            axes |= ConfigAxis::HEIGHT;
        }
        if self.orientation != other.orientation {
            axes |= ConfigAxis::ORIENTATION;
        }
        if self.night != other.night {
            axes |= ConfigAxis::NIGHT;
        }
        if self.density != other.density {
            axes |= ConfigAxis::DENSITY;
        }
        if self.sdk_version != other.sdk_version {
            axes |= ConfigAxis::SDK;
        }
        axes
    }

    /// The axes this configuration sets relative to the default.
    #[must_use]
    pub fn defined_axes(&self) -> ConfigAxis {
        self.diff(&ConfigDescription::default())
    }

    /// Dominance test used by the split partitioner: `self` matches
    /// `constraint` when every axis the constraint sets is set to the same
    /// value in `self`.
    #[must_use]
    pub fn matches(&self, constraint: &ConfigDescription) -> bool {
        let constrained = constraint.defined_axes();
        self.diff(constraint).intersection(constrained).is_empty()
    }

    /// A copy with the platform-level qualifier stripped.
    #[must_use]
    pub fn without_sdk_version(&self) -> ConfigDescription {
        let mut copy = self.clone();
        copy.sdk_version = 0;
        copy
    }

    /// A copy at the given platform level.
    #[must_use]
    pub fn with_sdk_version(&self, sdk_version: u16) -> ConfigDescription {
        let mut copy = self.clone();
        copy.sdk_version = sdk_version;
        copy
    }

    fn locale_str(&self) -> Option<String> {
        if self.language == [0, 0] {
            return None;
        }
        let lang = std::str::from_utf8(&self.language).ok()?.to_string();
        if self.region == [0, 0] {
            Some(lang)
        } else {
            let region = std::str::from_utf8(&self.region).ok()?;
            Some(format!("{lang}-r{region}"))
        }
    }
}

fn try_parse_qualifier(token: &str, stage: u8, config: &mut ConfigDescription) -> bool {
    match stage {
        0 => {
            if let Some(rest) = token.strip_prefix("mcc") {
                if let Ok(v) = rest.parse::<u16>() {
                    if v != 0 {
                        config.mcc = v;
                        return true;
                    }
                }
            }
            false
        }
        1 => {
            if let Some(rest) = token.strip_prefix("mnc") {
                if let Ok(v) = rest.parse::<u16>() {
                    if v != 0 {
                        config.mnc = v;
                        return true;
                    }
                }
            }
            false
        }
        2 => {
            if token.len() == 2 && token.bytes().all(|b| b.is_ascii_lowercase()) {
                config.language = [token.as_bytes()[0], token.as_bytes()[1]];
                return true;
            }
            false
        }
        3 => {
            if let Some(rest) = token.strip_prefix('r') {
                if rest.len() == 2 && rest.bytes().all(|b| b.is_ascii_uppercase()) {
                    // A region is only valid after a language.
                    if config.language != [0, 0] {
                        config.region = [rest.as_bytes()[0], rest.as_bytes()[1]];
                        return true;
                    }
                }
            }
            false
        }
        4 => parse_dp(token, "sw", &mut config.smallest_width_dp),
        5 => parse_dp(token, "w", &mut config.width_dp),
        6 => parse_dp(token, "h", &mut config.height_dp),
        7 => match token {
            "port" => {
                config.orientation = Orientation::Port;
                true
            }
            "land" => {
                config.orientation = Orientation::Land;
                true
            }
            _ => false,
        },
        8 => match token {
            "night" => {
                config.night = NightMode::Night;
                true
            }
            "notnight" => {
                config.night = NightMode::NotNight;
                true
            }
            _ => false,
        },
        9 => {
            for &(name, dpi) in NAMED_DENSITIES {
                if token == name {
                    config.density = dpi;
                    return true;
                }
            }
            if let Some(rest) = token.strip_suffix("dpi") {
                if let Ok(v) = rest.parse::<u16>() {
                    if v != 0 {
                        config.density = v;
                        return true;
                    }
                }
            }
            false
        }
        10 => {
            if let Some(rest) = token.strip_prefix('v') {
                if let Ok(v) = rest.parse::<u16>() {
                    if v != 0 {
                        config.sdk_version = v;
                        return true;
                    }
                }
            }
            false
        }
        _ => false,
    }
}

fn parse_dp(token: &str, prefix: &str, out: &mut u16) -> bool {
    if let Some(rest) = token.strip_prefix(prefix) {
        if let Some(num) = rest.strip_suffix("dp") {
            if let Ok(v) = num.parse::<u16>() {
                if v != 0 {
                    *out = v;
                    return true;
                }
            }
        }
    }
    false
}

impl fmt::Display for ConfigDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if self.mcc != 0 {
            parts.push(format!("mcc{}", self.mcc));
        }
        if self.mnc != 0 {
            parts.push(format!("mnc{}", self.mnc));
        }
        if let Some(locale) = self.locale_str() {
            parts.push(locale);
        }
        if self.smallest_width_dp != 0 {
            parts.push(format!("sw{}dp", self.smallest_width_dp));
        }
        if self.width_dp != 0 {
            parts.push(format!("w{}dp", self.width_dp));
        }
        if self.height_dp != 0 {
            parts.push(format!("h{}dp", self.height_dp));
        }
        match self.orientation {
            Orientation::Any => {}
            Orientation::Port => parts.push("port".into()),
            Orientation::Land => parts.push("land".into()),
        }
        match self.night {
            NightMode::Any => {}
            NightMode::Night => parts.push("night".into()),
            NightMode::NotNight => parts.push("notnight".into()),
        }
        if self.density != 0 {
            let named = NAMED_DENSITIES
                .iter()
                .find(|&&(_, dpi)| dpi == self.density)
                .map(|&(name, _)| name.to_string());
            parts.push(named.unwrap_or_else(|| format!("{}dpi", self.density)));
        }
        if self.sdk_version != 0 {
            parts.push(format!("v{}", self.sdk_version));
        }
        write!(f, "{}", parts.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        for s in [
            "",
            "en",
            "en-rUS",
            "hdpi",
            "land-hdpi",
            "sw600dp-v13",
            "mcc310-mnc004-en-rUS-sw600dp-land-night-hdpi-v21",
            "440dpi",
            "anydpi",
        ] {
            let config = ConfigDescription::parse(s).unwrap();
            assert_eq!(config.to_string(), s, "round trip failed for '{s}'");
        }
    }

    #[test]
    fn rejects_unknown_and_out_of_order() {
        assert!(ConfigDescription::parse("widget").is_none());
        assert!(ConfigDescription::parse("v21-hdpi").is_none());
        assert!(ConfigDescription::parse("rUS").is_none());
        assert!(ConfigDescription::parse("en-en").is_none());
    }

    #[test]
    fn diff_reports_axes() {
        let a = ConfigDescription::parse("en-hdpi").unwrap();
        let b = ConfigDescription::parse("en-v21").unwrap();
        assert_eq!(a.diff(&b), ConfigAxis::DENSITY | ConfigAxis::SDK);
        assert_eq!(a.diff(&a), ConfigAxis::empty());
    }

    #[test]
    fn split_dominance() {
        let constraint = ConfigDescription::parse("hdpi").unwrap();
        assert!(ConfigDescription::parse("hdpi").unwrap().matches(&constraint));
        assert!(ConfigDescription::parse("en-hdpi")
            .unwrap()
            .matches(&constraint));
        assert!(!ConfigDescription::parse("xhdpi")
            .unwrap()
            .matches(&constraint));
        assert!(!ConfigDescription::default().matches(&constraint));

        // Everything matches the default constraint.
        let base = ConfigDescription::default();
        assert!(ConfigDescription::parse("en").unwrap().matches(&base));
    }

    #[test]
    fn ordering_is_total_and_deterministic() {
        let mut configs = vec![
            ConfigDescription::parse("v21").unwrap(),
            ConfigDescription::default(),
            ConfigDescription::parse("en").unwrap(),
            ConfigDescription::parse("hdpi").unwrap(),
        ];
        configs.sort();
        assert_eq!(configs[0], ConfigDescription::default());
    }

    #[test]
    fn sdk_strip() {
        let config = ConfigDescription::parse("hdpi-v4").unwrap();
        assert_eq!(config.without_sdk_version().to_string(), "hdpi");
    }
}
