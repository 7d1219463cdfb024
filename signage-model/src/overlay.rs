//! Clock overlay configuration
//!
//! The admin side stores overlay settings loosely: fields may be missing,
//! `null`, the wrong JSON type, or out of range. [`ClockOverlay`] is always
//! fully populated; every field that cannot be read falls back to its default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Corner of the screen the clock is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockPosition {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ClockPosition {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Some(Self::TopLeft),
            "top-right" => Some(Self::TopRight),
            "bottom-left" => Some(Self::BottomLeft),
            "bottom-right" => Some(Self::BottomRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ClockSize {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "sm" => Some(Self::Small),
            "medium" | "md" => Some(Self::Medium),
            "large" | "lg" => Some(Self::Large),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ClockFormat {
    #[serde(rename = "12h")]
    TwelveHour,
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
}

impl ClockFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "12h" | "12" => Some(Self::TwelveHour),
            "24h" | "24" => Some(Self::TwentyFourHour),
            _ => None,
        }
    }
}

/// Fully resolved clock overlay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClockOverlayPayload")]
pub struct ClockOverlay {
    pub enabled: bool,
    pub position: ClockPosition,
    pub size: ClockSize,
    pub format: ClockFormat,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f32,
    pub text_color: String,
    pub background_color: String,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl ClockOverlay {
    pub const DEFAULT_TEXT_COLOR: &'static str = "#ffffff";
    pub const DEFAULT_BACKGROUND_COLOR: &'static str = "#000000";
    pub const DEFAULT_OFFSET: i32 = 20;
}

impl Default for ClockOverlay {
    fn default() -> Self {
        Self {
            enabled: false,
            position: ClockPosition::default(),
            size: ClockSize::default(),
            format: ClockFormat::default(),
            opacity: 1.0,
            text_color: Self::DEFAULT_TEXT_COLOR.to_string(),
            background_color: Self::DEFAULT_BACKGROUND_COLOR.to_string(),
            offset_x: Self::DEFAULT_OFFSET,
            offset_y: Self::DEFAULT_OFFSET,
        }
    }
}

/// Loosely typed overlay settings as delivered on the wire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClockOverlayPayload {
    pub enabled: Option<Value>,
    pub position: Option<Value>,
    pub size: Option<Value>,
    pub format: Option<Value>,
    pub opacity: Option<Value>,
    pub text_color: Option<Value>,
    pub background_color: Option<Value>,
    pub offset_x: Option<Value>,
    pub offset_y: Option<Value>,
}

impl From<ClockOverlayPayload> for ClockOverlay {
    fn from(p: ClockOverlayPayload) -> Self {
        let defaults = ClockOverlay::default();

        Self {
            enabled: p.enabled.as_ref().and_then(as_bool).unwrap_or(defaults.enabled),
            position: p
                .position
                .as_ref()
                .and_then(Value::as_str)
                .and_then(ClockPosition::parse)
                .unwrap_or(defaults.position),
            size: p
                .size
                .as_ref()
                .and_then(Value::as_str)
                .and_then(ClockSize::parse)
                .unwrap_or(defaults.size),
            format: p
                .format
                .as_ref()
                .and_then(as_str_or_number)
                .as_deref()
                .and_then(ClockFormat::parse)
                .unwrap_or(defaults.format),
            opacity: p
                .opacity
                .as_ref()
                .and_then(as_f64)
                .filter(|o| (0.0..=1.0).contains(o))
                .map(|o| o as f32)
                .unwrap_or(defaults.opacity),
            text_color: p
                .text_color
                .as_ref()
                .and_then(Value::as_str)
                .filter(|c| is_hex_color(c))
                .map(str::to_ascii_lowercase)
                .unwrap_or(defaults.text_color),
            background_color: p
                .background_color
                .as_ref()
                .and_then(Value::as_str)
                .filter(|c| is_hex_color(c))
                .map(str::to_ascii_lowercase)
                .unwrap_or(defaults.background_color),
            offset_x: p.offset_x.as_ref().and_then(as_offset).unwrap_or(defaults.offset_x),
            offset_y: p.offset_y.as_ref().and_then(as_offset).unwrap_or(defaults.offset_y),
        }
    }
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" | "on" => Some(true),
            "false" | "0" | "off" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn as_str_or_number(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_offset(v: &Value) -> Option<i32> {
    as_f64(v)
        .filter(|f| f.abs() <= 10_000.0)
        .map(|f| f.round() as i32)
}

/// `#rgb` or `#rrggbb`
fn is_hex_color(s: &str) -> bool {
    let Some(hex) = s.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> ClockOverlay {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(parse(json!({})), ClockOverlay::default());
    }

    #[test]
    fn test_valid_values_kept() {
        let clock = parse(json!({
            "enabled": true,
            "position": "bottom_left",
            "size": "large",
            "format": "12h",
            "opacity": 0.5,
            "text_color": "#FFF",
            "background_color": "#102030",
            "offset_x": 5,
            "offset_y": "7"
        }));
        assert!(clock.enabled);
        assert_eq!(clock.position, ClockPosition::BottomLeft);
        assert_eq!(clock.size, ClockSize::Large);
        assert_eq!(clock.format, ClockFormat::TwelveHour);
        assert_eq!(clock.opacity, 0.5);
        assert_eq!(clock.text_color, "#fff");
        assert_eq!(clock.background_color, "#102030");
        assert_eq!((clock.offset_x, clock.offset_y), (5, 7));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let clock = parse(json!({
            "enabled": "maybe",
            "position": "center",
            "size": 3,
            "format": "36h",
            "opacity": 1.5,
            "text_color": "white",
            "background_color": "#12345",
            "offset_x": null,
            "offset_y": 1e9
        }));
        let defaults = ClockOverlay::default();
        assert_eq!(clock, defaults);
    }

    #[test]
    fn test_numeric_format_accepted() {
        assert_eq!(parse(json!({"format": 12})).format, ClockFormat::TwelveHour);
    }

    #[test]
    fn test_serialized_form_reads_back() {
        let clock = parse(json!({"enabled": true, "position": "top-left", "opacity": 0.25}));
        let text = serde_json::to_string(&clock).unwrap();
        let back: ClockOverlay = serde_json::from_str(&text).unwrap();
        assert_eq!(back, clock);
    }
}
