//! Theme snapshot - colors read once from the host style system
//!
//! The renderer never reaches into global style state. The host resolves
//! its custom properties once and hands over a snapshot at construction.

/// Color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Rgb { r, g, b }
    }

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Rgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(...)` or `rgba(...)`.
    /// Alpha is dropped: shader base colors are opaque.
    pub fn parse(css: &str) -> Option<Rgb> {
        let value = css.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = value.to_ascii_lowercase();
        let body = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        parse_rgb_function(body)
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        Rgb::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    /// Padded to four floats for uniform layout
    pub fn to_vec4(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let nibble = |c: u8| (c as char).to_digit(16).map(|d| d as u8);
    let bytes = hex.as_bytes();
    match bytes.len() {
        3 => {
            let r = nibble(bytes[0])?;
            let g = nibble(bytes[1])?;
            let b = nibble(bytes[2])?;
            Some(Rgb::from_u8(r * 17, g * 17, b * 17))
        }
        6 | 8 => {
            let pair = |i: usize| Some(nibble(bytes[i])? * 16 + nibble(bytes[i + 1])?);
            Some(Rgb::from_u8(pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

fn parse_rgb_function(body: &str) -> Option<Rgb> {
    // Accept both "r, g, b[, a]" and "r g b[ / a]"
    let color_part = body.split('/').next()?;
    let channels: Vec<f32> = color_part
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .take(3)
        .map(|part| part.parse::<f32>().ok())
        .collect::<Option<Vec<_>>>()?;
    if channels.len() != 3 || channels.iter().any(|c| !c.is_finite()) {
        return None;
    }
    Some(Rgb::new(
        (channels[0] / 255.0).clamp(0.0, 1.0),
        (channels[1] / 255.0).clamp(0.0, 1.0),
        (channels[2] / 255.0).clamp(0.0, 1.0),
    ))
}

/// Host style property names and the values used when they are unset
pub const SURFACE_VAR: (&str, &str) = ("--bg-surface-1", "rgb(24, 24, 27)");
pub const ACCENT_PRIMARY_VAR: (&str, &str) = ("--accent-chat", "rgb(139, 92, 246)");
pub const ACCENT_SECONDARY_VAR: (&str, &str) = ("--accent-models", "rgb(6, 182, 212)");
pub const GLOW_VAR: (&str, &str) = ("--accent-chat-glow", "rgba(139, 92, 246, 0.25)");
pub const FOREGROUND_VAR: (&str, &str) = ("--text-primary", "rgb(250, 250, 250)");

/// How far the sclera is pulled from the foreground towards the surface
const SCLERA_SURFACE_MIX: f32 = 0.18;

/// Read-only theme colors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeSnapshot {
    pub surface: Rgb,
    pub accent_primary: Rgb,
    pub accent_secondary: Rgb,
    pub glow: Rgb,
    pub foreground: Rgb,
}

impl ThemeSnapshot {
    /// Resolve every color through `lookup`, falling back per color when a
    /// value is missing, blank or unparseable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |(name, fallback): (&str, &str)| {
            lookup(name)
                .filter(|raw| !raw.trim().is_empty())
                .and_then(|raw| Rgb::parse(&raw))
                .or_else(|| Rgb::parse(fallback))
                .unwrap_or(Rgb::new(0.0, 0.0, 0.0))
        };

        ThemeSnapshot {
            surface: resolve(SURFACE_VAR),
            accent_primary: resolve(ACCENT_PRIMARY_VAR),
            accent_secondary: resolve(ACCENT_SECONDARY_VAR),
            glow: resolve(GLOW_VAR),
            foreground: resolve(FOREGROUND_VAR),
        }
    }

    pub fn sclera(&self) -> Rgb {
        self.foreground.lerp(self.surface, SCLERA_SURFACE_MIX)
    }
}

impl Default for ThemeSnapshot {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
