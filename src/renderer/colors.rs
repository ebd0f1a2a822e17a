//! Colors for game elements

use super::Color;

pub const GRID: Color = [0.078, 0.086, 0.110, 1.0];
pub const PLAYER: Color = [0.62, 0.89, 0.49, 1.0];
pub const LINK: Color = [0.28, 0.91, 1.0, 1.0];
pub const LINK_DISABLED: Color = [0.48, 0.48, 0.52, 1.0];
pub const ENEMY_NORMAL: Color = [1.0, 0.8, 0.2, 1.0];
pub const ENEMY_RANGED: Color = [1.0, 0.48, 0.33, 1.0];
pub const BOSS: Color = [0.70, 0.52, 1.0, 1.0];
pub const HIT_FLASH: Color = [1.0, 0.32, 0.32, 1.0];
pub const ENEMY_LABEL: Color = [0.043, 0.047, 0.063, 1.0];
pub const MISSILE: Color = [1.0, 1.0, 1.0, 1.0];
pub const MINE: Color = [1.0, 0.48, 0.33, 1.0];
pub const AOE: Color = [1.0, 0.48, 0.33, 0.35];
pub const ITEM_HEART: Color = [1.0, 0.23, 0.38, 1.0];
pub const ITEM_POWER: Color = [0.27, 0.83, 1.0, 1.0];
pub const TELEGRAPH: Color = [1.0, 1.0, 1.0, 0.5];
pub const BANNER: Color = [1.0, 1.0, 1.0, 0.98];
pub const DUST: Color = [1.0, 1.0, 1.0, 1.0];

/// Same color, alpha multiplied by `alpha`
pub fn with_alpha(color: Color, alpha: f32) -> Color {
    [color[0], color[1], color[2], color[3] * alpha.clamp(0.0, 1.0)]
}
