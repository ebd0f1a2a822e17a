//! Backend-agnostic drawing
//!
//! The simulation never touches a display surface. Draw hooks append
//! primitives to a [`DrawList`] which a host renderer replays each frame.
//! Sprites are looked up through an explicitly passed [`SpriteRegistry`];
//! anything without a resolved sprite is drawn as a filled circle.

pub mod colors;

use std::collections::HashMap;

use glam::Vec2;

use crate::stage::StagePack;

/// RGBA, 0..1
pub type Color = [f32; 4];

/// Handle to a loaded sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Circle {
        center: Vec2,
        radius: f32,
        color: Color,
    },
    Ring {
        center: Vec2,
        radius: f32,
        width: f32,
        color: Color,
        dashed: bool,
    },
    Line {
        from: Vec2,
        to: Vec2,
        width: f32,
        color: Color,
        dashed: bool,
    },
    Sprite {
        sprite: SpriteId,
        center: Vec2,
        radius: f32,
        alpha: f32,
    },
    Text {
        pos: Vec2,
        size: f32,
        text: String,
        color: Color,
    },
}

/// Primitives for one frame, in paint order
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    cmds: Vec<DrawCmd>,
}

impl DrawList {
    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    pub fn commands(&self) -> &[DrawCmd] {
        &self.cmds
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.cmds.push(DrawCmd::Circle {
            center,
            radius,
            color,
        });
    }

    pub fn ring(&mut self, center: Vec2, radius: f32, width: f32, color: Color) {
        self.cmds.push(DrawCmd::Ring {
            center,
            radius,
            width,
            color,
            dashed: false,
        });
    }

    pub fn dashed_ring(&mut self, center: Vec2, radius: f32, width: f32, color: Color) {
        self.cmds.push(DrawCmd::Ring {
            center,
            radius,
            width,
            color,
            dashed: true,
        });
    }

    pub fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        self.cmds.push(DrawCmd::Line {
            from,
            to,
            width,
            color,
            dashed: false,
        });
    }

    pub fn dashed_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        self.cmds.push(DrawCmd::Line {
            from,
            to,
            width,
            color,
            dashed: true,
        });
    }

    pub fn sprite(&mut self, sprite: SpriteId, center: Vec2, radius: f32, alpha: f32) {
        self.cmds.push(DrawCmd::Sprite {
            sprite,
            center,
            radius,
            alpha,
        });
    }

    pub fn text(&mut self, pos: Vec2, size: f32, text: String, color: Color) {
        self.cmds.push(DrawCmd::Text {
            pos,
            size,
            text,
            color,
        });
    }
}

/// Sprite keys the host has loaded
#[derive(Debug, Clone, Default)]
pub struct SpriteRegistry {
    by_key: HashMap<String, SpriteId>,
    keys: Vec<String>,
}

impl SpriteRegistry {
    /// Register `key`, returning its handle (existing keys keep theirs)
    pub fn register(&mut self, key: &str) -> SpriteId {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        let id = SpriteId(self.keys.len() as u32);
        self.keys.push(key.to_string());
        self.by_key.insert(key.to_string(), id);
        id
    }

    pub fn get(&self, key: &str) -> Option<SpriteId> {
        self.by_key.get(key).copied()
    }

    pub fn key(&self, id: SpriteId) -> Option<&str> {
        self.keys.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Register every monster sprite in `pack` for which `available` holds.
    /// Missing ones are logged and left to the circle fallback.
    pub fn for_pack(pack: &StagePack, available: impl Fn(&str) -> bool) -> Self {
        let mut registry = Self::default();
        let mut keys: Vec<&str> = pack
            .monsters
            .values()
            .filter_map(|m| m.sprite.as_deref())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            if available(key) {
                registry.register(key);
            } else {
                log::warn!("Sprite '{key}' not available, drawing placeholder circles");
            }
        }
        registry
    }
}
