//! Trail-following enemy formations
//!
//! Each column has a virtual lead point that steers on its own and records
//! where it has been. Members sit at fixed arc-length offsets behind the end
//! of that record, so the whole column traces the lead's exact path.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;

use super::enemy::{Command, Enemy};
use super::geom::Bounds;
use crate::consts::*;
use crate::renderer::{DrawList, SpriteRegistry};
use crate::{angle_of, from_angle, wrap_angle};

/// Points closer than this to the previous sample are not recorded
const MIN_TRAIL_STEP: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrailPoint {
    pos: Vec2,
    /// Cumulative arc length at this point
    dist: f32,
}

/// Recorded lead path with absolute cumulative arc length
#[derive(Debug, Clone)]
pub struct Trail {
    points: VecDeque<TrailPoint>,
}

impl Trail {
    /// A straight trail of `length` ending at `end`, laid out behind `heading`
    pub fn straight(end: Vec2, heading: f32, length: f32) -> Self {
        let start = end - from_angle(heading, length);
        let mut points = VecDeque::new();
        points.push_back(TrailPoint { pos: start, dist: 0.0 });
        points.push_back(TrailPoint {
            pos: end,
            dist: length,
        });
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Arc length from the oldest retained point to the end
    pub fn retained_length(&self) -> f32 {
        match (self.points.front(), self.points.back()) {
            (Some(first), Some(last)) => last.dist - first.dist,
            _ => 0.0,
        }
    }

    fn total(&self) -> f32 {
        self.points.back().map_or(0.0, |p| p.dist)
    }

    /// Record a new end point
    pub fn push(&mut self, pos: Vec2) {
        let Some(last) = self.points.back().copied() else {
            self.points.push_back(TrailPoint { pos, dist: 0.0 });
            return;
        };
        let step = last.pos.distance(pos);
        if step < MIN_TRAIL_STEP {
            return;
        }
        self.points.push_back(TrailPoint {
            pos,
            dist: last.dist + step,
        });
    }

    /// Drop old points while the remainder still covers `keep`
    pub fn prune(&mut self, keep: f32) {
        let total = self.total();
        while self.points.len() > 2 && total - self.points[1].dist > keep {
            self.points.pop_front();
        }
    }

    /// Position `back` arc-length units behind the end (clamped to the oldest point)
    pub fn sample(&self, back: f32) -> Vec2 {
        let Some(first) = self.points.front() else {
            return Vec2::ZERO;
        };
        let target = self.total() - back;
        if target <= first.dist {
            return first.pos;
        }
        let idx = self.points.partition_point(|p| p.dist < target);
        let Some(b) = self.points.get(idx) else {
            return self.points[self.points.len() - 1].pos;
        };
        let a = self.points[idx - 1];
        let span = b.dist - a.dist;
        if span <= 0.0 {
            return b.pos;
        }
        a.pos.lerp(b.pos, (target - a.dist) / span)
    }
}

/// Virtual column leader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadPoint {
    pub pos: Vec2,
    pub heading: f32,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub lead: LeadPoint,
    pub trail: Trail,
}

/// One or two trail-following columns of enemies
#[derive(Debug, Clone)]
pub struct EnemyGroup {
    /// Catalog group this was built from
    pub group_id: String,
    pub columns: Vec<Column>,
    /// Slot assignments are fixed; defeated members stay in place as holes
    pub members: Vec<Enemy>,
    pub speed: f32,
    pub spacing: f32,
    max_slot: usize,
}

impl EnemyGroup {
    /// Arrange `members` round-robin across `columns` behind `origin`, all
    /// heading along `heading`.
    pub fn new(
        group_id: impl Into<String>,
        mut members: Vec<Enemy>,
        columns: usize,
        origin: Vec2,
        heading: f32,
        speed: f32,
    ) -> Self {
        let columns = columns.clamp(1, 2);
        let max_radius = members
            .iter()
            .map(|m| m.radius)
            .reduce(f32::max)
            .unwrap_or(ENEMY_RADIUS);
        let spacing = FORMATION_SPACING_FACTOR * max_radius;
        let side_offset = FORMATION_SIDE_OFFSET_FACTOR * max_radius;
        for (i, member) in members.iter_mut().enumerate() {
            member.column = i % columns;
            member.slot = i / columns;
            member.heading = heading;
        }
        let max_slot = members.iter().map(|m| m.slot).max().unwrap_or(0);
        let tail = (max_slot + 1) as f32 * spacing + TRAIL_MARGIN;

        // Columns are separated once, here; samples are never offset again
        let side = from_angle(heading + std::f32::consts::FRAC_PI_2, 1.0);
        let columns = (0..columns)
            .map(|c| {
                let offset = if columns == 2 {
                    (c as f32 - 0.5) * side_offset
                } else {
                    0.0
                };
                let pos = origin + side * offset;
                Column {
                    lead: LeadPoint { pos, heading },
                    trail: Trail::straight(pos, heading, tail),
                }
            })
            .collect();

        let mut group = Self {
            group_id: group_id.into(),
            columns,
            members,
            speed,
            spacing,
            max_slot,
        };
        group.place_members();
        group
    }

    /// Arc length each column must keep behind its lead
    pub fn required_trail(&self) -> f32 {
        (self.max_slot + 1) as f32 * self.spacing + TRAIL_MARGIN
    }

    fn place_members(&mut self) {
        let spacing = self.spacing;
        for member in self.members.iter_mut().filter(|m| !m.is_dying()) {
            let trail = &self.columns[member.column].trail;
            let back = (member.slot + 1) as f32 * spacing;
            let pos = trail.sample(back);
            let ahead = trail.sample(back - 1.0);
            if ahead.distance_squared(pos) > 1e-8 {
                member.heading = angle_of(ahead - pos);
            }
            member.pos = pos;
        }
    }

    /// Steer the lead points, extend the trails and move members along them
    pub fn update(
        &mut self,
        now: f32,
        dt: f32,
        bounds: &Bounds,
        rng: &mut impl Rng,
        out: &mut Vec<Command>,
    ) {
        let keep = self.required_trail();
        let inner = bounds.inset(ENEMY_RADIUS);
        for column in &mut self.columns {
            let lead = &mut column.lead;
            lead.pos += from_angle(lead.heading, self.speed * dt);
            if inner.bounce_heading(&mut lead.pos, &mut lead.heading).any() {
                let jitter = rng.random_range(-BOUNCE_JITTER..BOUNCE_JITTER);
                lead.heading = wrap_angle(lead.heading + jitter);
            }
            column.trail.push(lead.pos);
            column.trail.prune(keep);
        }

        self.place_members();

        for member in &mut self.members {
            member.update(now, dt, bounds, rng, out);
        }
    }

    pub fn alive_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_alive()).count()
    }

    /// Alive, or still playing the death animation
    pub fn renderable_count(&self, now: f32) -> usize {
        self.members.iter().filter(|m| m.is_renderable(now)).count()
    }

    /// Every member has finished its death animation
    pub fn is_finished(&self, now: f32) -> bool {
        self.renderable_count(now) == 0
    }

    pub fn draw(&self, list: &mut DrawList, sprites: &SpriteRegistry, now: f32) {
        // Back to front so the head is drawn on top
        for member in self.members.iter().rev() {
            member.draw(list, sprites, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::enemy::EnemyKind;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn member(radius: f32) -> Enemy {
        Enemy::new("chick", Vec2::ZERO, radius, 3, EnemyKind::Ordinary, 0.0)
    }

    fn members(n: usize) -> Vec<Enemy> {
        (0..n).map(|_| member(ENEMY_RADIUS)).collect()
    }

    fn down_from_top(members: Vec<Enemy>, columns: usize) -> EnemyGroup {
        let origin = Vec2::new(270.0, -20.0);
        EnemyGroup::new("g", members, columns, origin, std::f32::consts::FRAC_PI_2, 180.0)
    }

    fn run(group: &mut EnemyGroup, frames: usize) {
        let bounds = Bounds::new(ARENA_WIDTH, ARENA_HEIGHT);
        let mut rng = Pcg32::seed_from_u64(11);
        let mut out = Vec::new();
        for frame in 0..frames {
            group.update(frame as f32 / 60.0, 1.0 / 60.0, &bounds, &mut rng, &mut out);
        }
    }

    #[test]
    fn test_trail_sample_interpolates() {
        let mut trail = Trail::straight(Vec2::new(10.0, 0.0), 0.0, 10.0);
        trail.push(Vec2::new(10.0, 10.0));
        assert!(trail.sample(0.0).distance(Vec2::new(10.0, 10.0)) < 1e-4);
        assert!(trail.sample(5.0).distance(Vec2::new(10.0, 5.0)) < 1e-4);
        assert!(trail.sample(15.0).distance(Vec2::new(5.0, 0.0)) < 1e-4);
        // Past the oldest point clamps
        assert_eq!(trail.sample(100.0), Vec2::ZERO);
    }

    #[test]
    fn test_trail_skips_near_duplicates() {
        let mut trail = Trail::straight(Vec2::ZERO, 0.0, 5.0);
        trail.push(Vec2::new(0.0, 0.00001));
        assert_eq!(trail.len(), 2);
    }

    #[test]
    fn test_trail_prune_keeps_required_length() {
        let mut trail = Trail::straight(Vec2::ZERO, 0.0, 1.0);
        for i in 1..=500 {
            trail.push(Vec2::new(i as f32, 0.0));
            trail.prune(50.0);
        }
        assert!(trail.len() < 60);
        assert!(trail.retained_length() >= 50.0);
    }

    #[test]
    fn test_columns_assigned_round_robin() {
        let group = down_from_top(members(5), 2);
        let slots: Vec<_> = group.members.iter().map(|m| (m.column, m.slot)).collect();
        assert_eq!(slots, vec![(0, 0), (1, 0), (0, 1), (1, 1), (0, 2)]);
        // Columns start side by side
        let gap = group.columns[0].lead.pos.distance(group.columns[1].lead.pos);
        assert!((gap - FORMATION_SIDE_OFFSET_FACTOR * ENEMY_RADIUS).abs() < 1e-3);
    }

    #[test]
    fn test_spacing_scales_with_largest_member() {
        let mut group = down_from_top(vec![member(ENEMY_RADIUS), member(ENEMY_RADIUS * 2.0)], 1);
        assert!((group.spacing - FORMATION_SPACING_FACTOR * ENEMY_RADIUS * 2.0).abs() < 1e-4);
        run(&mut group, 60);
        let (a, b) = (&group.members[0], &group.members[1]);
        assert!(a.pos.distance(b.pos) >= a.radius + b.radius);
    }

    #[test]
    fn test_members_strictly_ordered_from_spawn() {
        let mut group = down_from_top(members(10), 1);
        for step in 0..300 {
            run(&mut group, 1);
            for pair in group.members.windows(2) {
                let gap = pair[0].pos.distance(pair[1].pos);
                assert!(gap > 0.0, "members overlap at step {step}");
                assert!(gap <= group.spacing + 1e-3, "gap {gap} at step {step}");
            }
            for column in &group.columns {
                assert!(column.trail.retained_length() >= group.required_trail() - 1e-3);
            }
        }
    }

    #[test]
    fn test_dying_members_stay_put() {
        let mut group = EnemyGroup::new("g", members(3), 1, Vec2::new(270.0, 400.0), 0.0, 180.0);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut out = Vec::new();
        group.members[1].damage(3, 0.0, &mut rng, &mut out);
        let frozen = group.members[1].pos;
        run(&mut group, 10);
        assert_eq!(group.members[1].pos, frozen);
        assert_ne!(group.members[0].pos, frozen);
        assert_eq!(group.alive_count(), 2);
    }

    #[test]
    fn test_group_finishes_after_death_animation() {
        let mut group = EnemyGroup::new("g", members(4), 1, Vec2::new(270.0, 400.0), 0.0, 180.0);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut out = Vec::new();
        for member in &mut group.members {
            member.damage(3, 1.0, &mut rng, &mut out);
        }
        assert_eq!(group.renderable_count(1.2), 4);
        assert!(!group.is_finished(1.2));
        assert!(group.is_finished(1.0 + DEATH_DURATION));
    }
}
