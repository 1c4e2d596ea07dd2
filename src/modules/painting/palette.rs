use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Parses `#RRGGBB` (the leading `#` is optional) into RGB channels.
pub fn parse_hex_color(raw: &str) -> Option<[u8; 3]> {
    let hex = raw.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

pub fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteColor {
    pub hex: String,
    pub rgb: [u8; 3],
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PaletteEntry {
    Hex(String),
    Named(String, String),
}

/// The finite, ordered list of colors the game accepts.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<PaletteColor>,
}

impl Palette {
    pub fn new<I, S>(colors: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (S, Option<String>)>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<PaletteColor> = Vec::new();
        for (raw, name) in colors {
            let raw = raw.as_ref();
            let rgb = parse_hex_color(raw)
                .ok_or_else(|| format!("invalid_palette_color: {}", raw))?;
            if parsed.iter().any(|c| c.rgb == rgb) {
                continue;
            }
            parsed.push(PaletteColor {
                hex: to_hex(rgb),
                rgb,
                name,
            });
        }
        if parsed.is_empty() {
            return Err("palette_is_empty".to_string());
        }
        Ok(Self { colors: parsed })
    }

    /// Accepts a JSON array whose entries are either `"#RRGGBB"` or
    /// `["#RRGGBB", "name"]`.
    pub fn from_json(content: &str) -> Result<Self, String> {
        let entries: Vec<PaletteEntry> = serde_json::from_str(content)
            .map_err(|e| format!("failed_to_parse_palette: {}", e))?;
        Self::new(entries.into_iter().map(|entry| match entry {
            PaletteEntry::Hex(hex) => (hex, None),
            PaletteEntry::Named(hex, name) => (hex, Some(name)),
        }))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed_to_read_palette_file: {}: {}", path.display(), e))?;
        Self::from_json(&content)
    }

    pub fn colors(&self) -> &[PaletteColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Closest palette entry by squared Euclidean RGB distance. Ties go to
    /// the entry listed first.
    pub fn nearest(&self, rgb: [u8; 3]) -> &PaletteColor {
        let mut best = &self.colors[0];
        let mut best_distance = u32::MAX;
        for color in &self.colors {
            let distance = squared_distance(color.rgb, rgb);
            if distance < best_distance {
                best = color;
                best_distance = distance;
                if distance == 0 {
                    break;
                }
            }
        }
        best
    }
}

fn squared_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = i32::from(*x) - i32::from(*y);
            (d * d) as u32
        })
        .sum()
}
