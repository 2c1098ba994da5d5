//! Category colors and importance-tier sprites.

use crate::particle::ImportanceLevel;
use orrery_env::Rgb;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Color for categories the palette does not know.
pub const DEFAULT_COLOR: Rgb = Rgb::new(0.72, 0.72, 0.76);

/// Known taxonomy categories and their base colors.
const CATEGORY_COLORS: &[(&str, Rgb)] = &[
    ("Technology", Rgb::new(0.22, 0.56, 0.95)),
    ("Platform", Rgb::new(0.96, 0.62, 0.14)),
    ("Framework", Rgb::new(0.35, 0.80, 0.42)),
    ("Language", Rgb::new(0.91, 0.30, 0.33)),
    ("Tool", Rgb::new(0.66, 0.42, 0.93)),
    ("Standard", Rgb::new(0.18, 0.80, 0.80)),
    ("Application", Rgb::new(0.95, 0.85, 0.25)),
    ("Concept", Rgb::new(0.93, 0.45, 0.75)),
];

/// Palette settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteConfig {
    /// Give unknown categories a random (per-session) color instead of the default
    pub randomize_unknown: bool,

    /// How far the least important level is washed towards white
    pub max_fade: f32,

    /// Sprite images per tier: levels 1-2, 3-5, 6 and above
    pub tier_images: [String; 3],
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            randomize_unknown: false,
            max_fade: 0.55,
            tier_images: [
                "sprites/star_major.png".to_string(),
                "sprites/star_medium.png".to_string(),
                "sprites/star_minor.png".to_string(),
            ],
        }
    }
}

/// Resolves colors and sprite images for particles.
#[derive(Debug, Clone)]
pub struct Palette {
    config: PaletteConfig,
    session_seed: u64,
}

impl Palette {
    /// Creates a palette; `session_seed` drives random colors for unknown categories.
    pub fn new(config: PaletteConfig, session_seed: u64) -> Self {
        Self {
            config,
            session_seed,
        }
    }

    /// Base color of a category, before importance shading.
    pub fn category_color(&self, category: &str) -> Rgb {
        if let Some((_, color)) = CATEGORY_COLORS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category))
        {
            return *color;
        }
        if !self.config.randomize_unknown {
            return DEFAULT_COLOR;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.session_seed ^ fnv1a(category));
        Rgb::new(
            rng.gen_range(0.25..1.0),
            rng.gen_range(0.25..1.0),
            rng.gen_range(0.25..1.0),
        )
    }

    /// Final sprite color: less important levels are paler.
    pub fn color_for(&self, category: &str, level: ImportanceLevel) -> Rgb {
        let fade = level.rank_fraction() as f32 * self.config.max_fade;
        self.category_color(category).lighten(fade)
    }

    /// Billboard image for a level, unless the record names its own.
    pub fn sprite_for(&self, level: ImportanceLevel, image_file: Option<&str>) -> String {
        if let Some(image) = image_file.filter(|s| !s.trim().is_empty()) {
            return image.to_string();
        }
        let tier = match level.get() {
            1..=2 => 0,
            3..=5 => 1,
            _ => 2,
        };
        self.config.tier_images[tier].clone()
    }

    /// Returns true if the category has a fixed palette entry.
    pub fn is_known(category: &str) -> bool {
        CATEGORY_COLORS
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(category))
    }
}

/// FNV-1a hash, stable across platforms and releases.
fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}
