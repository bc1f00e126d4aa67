use image::Rgba;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const DEFAULT_PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEEAD", "#D4A5A5", "#9B59B6", "#3498DB",
    "#1ABC9C", "#F1C40F",
];

/// Chooses the outline/fill colour for each ward as it is drawn.
pub trait PalettePicker {
    fn pick(&mut self) -> String;
}

/// Uniform random choice from a fixed palette. Every redraw draws again.
pub struct RandomPalette {
    colors: Vec<String>,
    rng: StdRng,
}

impl RandomPalette {
    pub fn new(colors: Vec<String>) -> Self {
        Self {
            colors: non_empty(colors),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(colors: Vec<String>, seed: u64) -> Self {
        Self {
            colors: non_empty(colors),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PalettePicker for RandomPalette {
    fn pick(&mut self) -> String {
        self.colors
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_PALETTE[0].to_string())
    }
}

/// Walks the palette in order; deterministic stand-in for tests.
pub struct CyclingPalette {
    colors: Vec<String>,
    next: usize,
}

impl CyclingPalette {
    pub fn new(colors: Vec<String>) -> Self {
        Self {
            colors: non_empty(colors),
            next: 0,
        }
    }
}

impl PalettePicker for CyclingPalette {
    fn pick(&mut self) -> String {
        let color = self.colors[self.next % self.colors.len()].clone();
        self.next += 1;
        color
    }
}

fn non_empty(colors: Vec<String>) -> Vec<String> {
    if colors.is_empty() {
        DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
    } else {
        colors
    }
}

/// `#RRGGBB` to an opaque pixel. Malformed channels read as 0.
pub fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    Rgba([channel(0..2), channel(2..4), channel(4..6), 255])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Vec<String> {
        DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn random_picks_stay_in_palette() {
        let mut picker = RandomPalette::seeded(palette(), 7);
        for _ in 0..100 {
            assert!(DEFAULT_PALETTE.contains(&picker.pick().as_str()));
        }
    }

    #[test]
    fn seeded_pickers_repeat() {
        let mut a = RandomPalette::seeded(palette(), 42);
        let mut b = RandomPalette::seeded(palette(), 42);
        let xs: Vec<String> = (0..20).map(|_| a.pick()).collect();
        let ys: Vec<String> = (0..20).map(|_| b.pick()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn cycling_wraps_around() {
        let mut picker = CyclingPalette::new(vec!["#000000".into(), "#FFFFFF".into()]);
        assert_eq!(picker.pick(), "#000000");
        assert_eq!(picker.pick(), "#FFFFFF");
        assert_eq!(picker.pick(), "#000000");
    }

    #[test]
    fn empty_palette_uses_default() {
        let mut picker = CyclingPalette::new(Vec::new());
        assert_eq!(picker.pick(), DEFAULT_PALETTE[0]);
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(hex_to_rgba("#FF6B6B"), Rgba([255, 107, 107, 255]));
        assert_eq!(hex_to_rgba("1ABC9C"), Rgba([26, 188, 156, 255]));
        assert_eq!(hex_to_rgba("#zz"), Rgba([0, 0, 0, 255]));
    }
}
