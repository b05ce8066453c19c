use rand::Rng;

use crate::command::OpLevel;

/// What the rest of a room knows about one of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub nick: String,
    pub color: String,
    pub level: OpLevel,
}

impl Profile {
    pub fn new(creator: bool) -> Self {
        Self {
            nick: String::new(),
            color: happy_color(&mut rand::rng()),
            level: if creator { OpLevel::Admin } else { OpLevel::User },
        }
    }
}

/// A random saturated but light color, readable on a dark background.
pub fn happy_color(rng: &mut impl Rng) -> String {
    let hue: f64 = rng.random_range(0.0..360.0);
    let saturation: f64 = rng.random_range(0.45..0.75);
    let value: f64 = rng.random_range(0.85..1.0);

    let chroma = value * saturation;
    let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let (r, g, b) = match hue as u32 / 60 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;

    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}
