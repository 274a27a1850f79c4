//! Target selector with a TTL grace window.
//!
//! Tracks one robot id across cycles. While the tracked id keeps
//! appearing, its TTL is refreshed; when it disappears, the TTL drains
//! by the frame time and the selector emits nothing until either the id
//! returns, the TTL expires and the best remaining group is acquired,
//! or everything is lost and the target clears.

use autoaim_common::types::Detection;

/// Result of one selection cycle.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Armors of the tracked group, empty while coasting on TTL.
    pub armors: Vec<Detection>,
    /// True when the selector acquired an id it was not tracking before
    /// this cycle (first acquisition or switch).
    pub acquired: bool,
}

/// Selector state machine.
#[derive(Debug)]
pub struct Selector {
    target: Option<i32>,
    ttl: f32,
    max_ttl: f32,
    initial_yaw: f32,
}

impl Selector {
    /// Create an idle selector with the given grace window [s].
    pub fn new(max_ttl: f32) -> Self {
        Self {
            target: None,
            ttl: 0.0,
            max_ttl,
            initial_yaw: 0.0,
        }
    }

    /// Currently tracked robot id.
    #[inline]
    pub fn target(&self) -> Option<i32> {
        self.target
    }

    /// Armor yaw observed when the current target was acquired [rad].
    #[inline]
    pub fn initial_yaw(&self) -> f32 {
        self.initial_yaw
    }

    /// Run one selection cycle over the grouped armors.
    ///
    /// `dt` is the time since the previous camera frame [s]. Groups must
    /// be non-empty and share one `class_id` each.
    pub fn select(&mut self, groups: &[Vec<Detection>], dt: f32) -> Selection {
        if groups.is_empty() {
            self.ttl -= dt;
            if self.ttl <= 0.0 {
                self.target = None;
            }
            return Selection::default();
        }

        match self.target {
            None => self.acquire(groups),
            Some(id) => {
                if let Some(group) = groups.iter().find(|g| g[0].class_id == id) {
                    self.ttl = self.max_ttl;
                    Selection {
                        armors: group.clone(),
                        acquired: false,
                    }
                } else if self.ttl - dt > 0.0 {
                    // Tracked id missing this frame: coast on the grace
                    // window and emit nothing.
                    self.ttl -= dt;
                    Selection::default()
                } else {
                    self.acquire(groups)
                }
            }
        }
    }

    /// Pick the group with the minimum mean armor distance.
    fn acquire(&mut self, groups: &[Vec<Detection>]) -> Selection {
        let best = groups
            .iter()
            .min_by(|a, b| {
                mean_distance(a)
                    .partial_cmp(&mean_distance(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("groups checked non-empty");

        let id = best[0].class_id;
        let acquired = self.target != Some(id);
        self.target = Some(id);
        self.ttl = self.max_ttl;
        self.initial_yaw = best[0].yaw_rad;

        Selection {
            armors: best.clone(),
            acquired,
        }
    }
}

fn mean_distance(group: &[Detection]) -> f32 {
    group.iter().map(|d| d.tvec.norm()).sum::<f32>() / group.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn armor(class_id: i32, z: f32) -> Detection {
        Detection {
            class_id,
            keypoints: [[0.0; 2]; 4],
            confidence: 0.9,
            tvec: Vector3::new(0.0, 0.0, z),
            yaw_rad: 0.0,
        }
    }

    #[test]
    fn acquires_nearest_group() {
        let mut sel = Selector::new(0.3);
        let groups = vec![vec![armor(3, 5.0)], vec![armor(7, 3.0)]];

        let selection = sel.select(&groups, 0.02);
        assert_eq!(sel.target(), Some(7));
        assert!(selection.acquired);
        assert_eq!(selection.armors.len(), 1);
        assert_eq!(selection.armors[0].class_id, 7);
    }

    #[test]
    fn reselection_of_same_id_is_not_acquisition() {
        let mut sel = Selector::new(0.3);
        let groups = vec![vec![armor(7, 3.0)]];
        assert!(sel.select(&groups, 0.02).acquired);
        assert!(!sel.select(&groups, 0.02).acquired);
    }

    #[test]
    fn grace_window_retains_id_through_empty_frames() {
        let mut sel = Selector::new(0.3);
        sel.select(&[vec![armor(7, 3.0)]], 0.02);

        for _ in 0..3 {
            let selection = sel.select(&[], 0.02);
            assert!(selection.armors.is_empty());
        }
        assert_eq!(sel.target(), Some(7));

        // Drain the rest of the window.
        for _ in 0..20 {
            sel.select(&[], 0.02);
        }
        assert_eq!(sel.target(), None);
    }

    #[test]
    fn switches_to_best_group_when_ttl_expires() {
        let mut sel = Selector::new(0.05);
        sel.select(&[vec![armor(7, 3.0)]], 0.02);

        // Id 7 gone, id 3 visible: coast until the TTL drains, then
        // acquire 3.
        let other = vec![vec![armor(3, 4.0)]];
        let first = sel.select(&other, 0.02);
        assert!(first.armors.is_empty());
        assert_eq!(sel.target(), Some(7));

        let second = sel.select(&other, 0.02);
        let third = sel.select(&other, 0.02);
        let reacquired = second.acquired || third.acquired;
        assert!(reacquired);
        assert_eq!(sel.target(), Some(3));
    }

    #[test]
    fn two_armor_group_uses_mean_distance() {
        let mut sel = Selector::new(0.3);
        // Group 5 has armors at 2 m and 10 m (mean 6); group 9 at 5 m.
        let groups = vec![
            vec![armor(5, 2.0), armor(5, 10.0)],
            vec![armor(9, 5.0)],
        ];
        sel.select(&groups, 0.02);
        assert_eq!(sel.target(), Some(9));
    }
}
