//! Color vectors and color tools.
//!
//! A [`ColorVector`] mirrors the `{X, Y, Z}` vector nodes of an export tree
//! (X = red, Y = green, Z = blue). Grouping never compares raw floats; it
//! compares the [`ColorKey`] produced by [`ColorVector::quantize`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Decimal digits kept by the default quantization key.
pub const DEFAULT_KEY_DECIMALS: u32 = 6;

/// Hue distance under which two colors count as similar by default.
pub const DEFAULT_HUE_TOLERANCE: f64 = 0.05;

const CHANNEL_FIELDS: [&str; 3] = ["X", "Y", "Z"];

/// Three finite float channels. Immutable by convention: edits replace the
/// whole value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ColorVector {
    r: f64,
    g: f64,
    b: f64,
}

impl ColorVector {
    /// Build a color, coercing non-finite channels to `0.0`.
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: finite_or_zero(r),
            g: finite_or_zero(g),
            b: finite_or_zero(b),
        }
    }

    /// Build a color, rejecting any non-finite channel.
    pub fn try_new(r: f64, g: f64, b: f64) -> Option<Self> {
        (r.is_finite() && g.is_finite() && b.is_finite()).then_some(Self { r, g, b })
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn channels(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    /// Read a color from an `{X, Y, Z}` node.
    ///
    /// Missing (or `null`) channels default to `0.0`. Numeric strings are
    /// accepted. Anything else makes the node malformed; the returned string
    /// says why.
    pub fn from_json(node: &Value) -> Result<Self, String> {
        let Value::Object(map) = node else {
            return Err(format!("expected an object, found {}", json_type_name(node)));
        };
        let [r, g, b] = CHANNEL_FIELDS.map(|field| read_channel(map, field));
        Ok(Self::new(r?, g?, b?))
    }

    /// Overwrite the `X`, `Y`, `Z` fields of `node` in place. Every other
    /// field of the node is left untouched.
    pub fn write_json(&self, node: &mut Value) -> Result<(), String> {
        let Value::Object(map) = node else {
            return Err(format!("expected an object, found {}", json_type_name(node)));
        };
        for (field, value) in CHANNEL_FIELDS.into_iter().zip(self.channels()) {
            map.insert(field.to_string(), Value::from(value));
        }
        Ok(())
    }

    /// Fresh `{X, Y, Z}` node for this color.
    pub fn to_json(&self) -> Value {
        let mut node = Value::Object(Map::new());
        // Writing into a fresh object cannot fail.
        let _ = self.write_json(&mut node);
        node
    }

    /// Grouping identity: every channel rounded to `decimals` digits.
    pub fn quantize(&self, decimals: u32) -> ColorKey {
        ColorKey {
            channels: self.channels().map(|c| quantize_channel(c, decimals)),
            decimals,
        }
    }

    /// Grouping identity with the default precision.
    pub fn key(&self) -> ColorKey {
        self.quantize(DEFAULT_KEY_DECIMALS)
    }

    /// 8-bit channels, rounded and clamped to `0..=255`.
    pub fn to_rgb8(&self) -> [u8; 3] {
        self.channels().map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8)
    }

    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        let [r, g, b] = rgb.map(|c| f64::from(c) / 255.0);
        Self { r, g, b }
    }

    /// `#RRGGBB`, upper case.
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.to_rgb8();
        format!("#{r:02X}{g:02X}{b:02X}")
    }

    /// Hue, saturation, value, each in `0.0..=1.0` for inputs in that range.
    pub fn to_hsv(&self) -> (f64, f64, f64) {
        let (r, g, b) = (self.r, self.g, self.b);
        let maxc = r.max(g).max(b);
        let minc = r.min(g).min(b);
        let v = maxc;
        if maxc == minc {
            return (0.0, 0.0, v);
        }
        let span = maxc - minc;
        let s = span / maxc;
        let rc = (maxc - r) / span;
        let gc = (maxc - g) / span;
        let bc = (maxc - b) / span;
        let h = if r == maxc {
            bc - gc
        } else if g == maxc {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };
        ((h / 6.0).rem_euclid(1.0), s, v)
    }

    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        if s == 0.0 {
            return Self::new(v, v, v);
        }
        let sector = (h * 6.0).floor();
        let f = h * 6.0 - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match (sector as i64).rem_euclid(6) {
            0 => Self::new(v, t, p),
            1 => Self::new(q, v, p),
            2 => Self::new(p, v, t),
            3 => Self::new(p, q, v),
            4 => Self::new(t, p, v),
            _ => Self::new(v, p, q),
        }
    }

    /// Circular hue distance in `0.0..=0.5`.
    pub fn hue_distance(&self, other: &ColorVector) -> f64 {
        let d = (self.to_hsv().0 - other.to_hsv().0).abs();
        d.min(1.0 - d)
    }

    /// Whether the two hues lie within `tolerance` of each other.
    pub fn is_similar(&self, other: &ColorVector, tolerance: f64) -> bool {
        self.hue_distance(other) <= tolerance
    }

    /// Coarse hue bucket used to summarize groups.
    pub fn family(&self) -> ColorFamily {
        let (h, s, v) = self.to_hsv();
        if v < 0.1 || s < 0.1 {
            return ColorFamily::Gray;
        }
        match h {
            h if !(0.05..=0.95).contains(&h) => ColorFamily::Red,
            h if h < 0.15 => ColorFamily::Orange,
            h if h < 0.30 => ColorFamily::Yellow,
            h if h < 0.45 => ColorFamily::Green,
            h if h < 0.60 => ColorFamily::Cyan,
            h if h < 0.75 => ColorFamily::Blue,
            h if h < 0.90 => ColorFamily::Violet,
            _ => ColorFamily::Magenta,
        }
    }
}

impl fmt::Display for ColorVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4}, {:.4})", self.r, self.g, self.b)
    }
}

/// Errors from [`ColorVector::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseColorError {
    #[error("invalid hex color `{0}` (expected #RRGGBB)")]
    Hex(String),

    #[error("invalid channel list `{0}` (expected r,g,b)")]
    Channels(String),
}

impl FromStr for ColorVector {
    type Err = ParseColorError;

    /// Accepts `#RRGGBB`, `RRGGBB`, or three comma-separated floats.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.contains(',') {
            let parts: Vec<f64> = trimmed
                .split(',')
                .map(|p| p.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|_| ParseColorError::Channels(s.to_string()))?;
            return match parts.as_slice() {
                [r, g, b] => Self::try_new(*r, *g, *b)
                    .ok_or_else(|| ParseColorError::Channels(s.to_string())),
                _ => Err(ParseColorError::Channels(s.to_string())),
            };
        }

        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseColorError::Hex(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParseColorError::Hex(s.to_string()))
        };
        Ok(Self::from_rgb8([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
    }
}

/// Quantized grouping identity. Two keys are equal only when they were
/// produced with the same precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorKey {
    channels: [i64; 3],
    decimals: u32,
}

impl ColorKey {
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// The rounded color this key stands for.
    pub fn to_color(&self) -> ColorVector {
        let scale = scale_for(self.decimals);
        let [r, g, b] = self.channels.map(|c| c as f64 / scale);
        ColorVector::new(r, g, b)
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = self.decimals as usize;
        let [r, g, b] = self.to_color().channels();
        write!(f, "{r:.precision$}_{g:.precision$}_{b:.precision$}")
    }
}

/// Coarse hue families, see [`ColorVector::family`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFamily {
    Gray,
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Violet,
    Magenta,
}

impl ColorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Cyan => "cyan",
            Self::Blue => "blue",
            Self::Violet => "violet",
            Self::Magenta => "magenta",
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn scale_for(decimals: u32) -> f64 {
    10f64.powi(decimals as i32)
}

fn quantize_channel(value: f64, decimals: u32) -> i64 {
    (value * scale_for(decimals)).round() as i64
}

fn read_channel(map: &Map<String, Value>, field: &str) -> Result<f64, String> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("field {field} is not a finite number")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("field {field} is not numeric: {s:?}")),
        Some(other) => Err(format!(
            "field {field} is not numeric: found {}",
            json_type_name(other)
        )),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
