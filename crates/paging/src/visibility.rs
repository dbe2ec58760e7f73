use glam::{Vec2, Vec3};
use verdure_common::{ContentHandle, FadeWindow};

use crate::block::{Block, BlockCore};
use crate::detail::DetailLevel;
use crate::page::Page;

/// Visibility of one detail level for a block at planar distance `dist`.
///
/// `next` is the next-nearer level, if any. Returns the visibility flag and,
/// when fading is on, the fade window to apply (disabled if no transition is
/// in progress).
pub fn level_visibility(
    dist: f32,
    real_max: f32,
    level: &DetailLevel,
    next: Option<&DetailLevel>,
    fade_enabled: bool,
) -> (bool, Option<FadeWindow>) {
    let mut visible = level.contains(dist);
    if !fade_enabled {
        return (visible, None);
    }

    let min = dist - real_max;
    let max = dist + real_max;
    let mut window = FadeWindow::disabled();
    if max >= level.near_dist() && min < level.far_trans_dist() {
        if level.fades() && max >= level.far_dist() {
            visible = true;
            window = FadeWindow::new(level.far_dist(), level.far_trans_dist());
        } else if let Some(next) = next.filter(|n| n.fades() && min < n.far_trans_dist()) {
            visible = true;
            window = FadeWindow::new(next.far_trans_dist(), next.far_dist());
        }
    }
    (visible, Some(window))
}

/// Update every detail level of one block against the observer.
///
/// Levels are walked farthest first. Levels without content are skipped.
/// Returns how many levels ended up visible.
pub fn process_block<H: ContentHandle>(
    block: &mut BlockCore<H>,
    observer: Vec3,
    levels: &[DetailLevel],
    fade_enabled: bool,
) -> usize {
    if !block.has_nodes() {
        return 0;
    }
    let center = block.center();
    let dist = Vec2::new(center.x - observer.x, center.z - observer.z).length();

    let mut visible_levels = 0;
    for (l, level) in levels.iter().enumerate().rev() {
        if block.node(l).is_none_or(ContentHandle::is_empty) {
            continue;
        }
        let next = l.checked_sub(1).map(|n| &levels[n]);
        let (visible, window) = level_visibility(dist, block.real_max(), level, next, fade_enabled);
        if let Some(window) = window {
            block.set_fade(window, l);
        }
        block.set_visible(visible, l);
        if visible {
            visible_levels += 1;
        }
    }
    visible_levels
}

/// Run [`process_block`] over every block of a loaded page.
pub(crate) fn process_page<P: Page>(
    page: &mut P,
    observer: Vec3,
    levels: &[DetailLevel],
    fade_enabled: bool,
) -> usize {
    page.core_mut()
        .blocks_mut()
        .iter_mut()
        .map(|block| process_block(block.core_mut(), observer, levels, fade_enabled))
        .sum()
}

/// Hide every level of every block of a page.
pub(crate) fn hide_page<P: Page>(page: &mut P) {
    for block in page.core_mut().blocks_mut() {
        let core = block.core_mut();
        for level in 0..core.node_count() {
            core.set_visible(false, level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Recorder, RecordedHandle};

    fn levels() -> Vec<DetailLevel> {
        vec![
            DetailLevel::new(0.0, 100.0, 20.0),
            DetailLevel::new(100.0, 300.0, 0.0),
        ]
    }

    fn block_at(x: f32, recorder: &Recorder, count: usize) -> BlockCore<RecordedHandle> {
        let mut block = BlockCore::new(0, 0, Vec3::new(x, 0.0, 0.0), 2.0);
        block.set_nodes((0..count).map(|_| recorder.handle()).collect());
        block
    }

    #[test]
    fn plain_band_membership_without_fade() {
        let level = DetailLevel::new(100.0, 300.0, 0.0);
        assert_eq!(level_visibility(150.0, 5.0, &level, None, false), (true, None));
        assert_eq!(level_visibility(300.0, 5.0, &level, None, false), (false, None));
        assert_eq!(level_visibility(99.0, 5.0, &level, None, false), (false, None));
    }

    #[test]
    fn fade_out_keeps_level_visible_past_far_edge() {
        let level = DetailLevel::new(0.0, 100.0, 20.0);
        let (visible, window) = level_visibility(110.0, 1.0, &level, None, true);
        assert!(visible);
        assert_eq!(window, Some(FadeWindow::new(100.0, 120.0)));

        let (visible, window) = level_visibility(130.0, 1.0, &level, None, true);
        assert!(!visible);
        assert_eq!(window, Some(FadeWindow::disabled()));
    }

    #[test]
    fn farther_level_fades_in_over_nearer_transition() {
        let all = levels();
        let (visible, window) = level_visibility(95.0, 10.0, &all[1], Some(&all[0]), true);
        assert!(visible);
        assert_eq!(window, Some(FadeWindow::new(120.0, 100.0)));
    }

    #[test]
    fn ignores_vertical_distance() {
        let recorder = Recorder::default();
        let mut block = block_at(50.0, &recorder, 1);
        let only = [DetailLevel::new(0.0, 60.0, 0.0)];
        assert_eq!(process_block(&mut block, Vec3::new(0.0, 500.0, 0.0), &only, false), 1);
        assert!(block.is_visible(0));
    }

    #[test]
    fn empty_content_levels_are_skipped() {
        let recorder = Recorder::default();
        let mut block = block_at(50.0, &recorder, 2);
        if let Some(node) = block.node_mut(0) {
            node.empty = true;
        }
        let visible = process_block(&mut block, Vec3::ZERO, &levels(), false);
        assert_eq!(visible, 0);
        assert!(!block.is_visible(0));
        assert_eq!(recorder.attached(), 0);
    }

    #[test]
    fn blocks_without_content_are_skipped() {
        let mut block: BlockCore<RecordedHandle> = BlockCore::new(0, 0, Vec3::ZERO, 2.0);
        assert_eq!(process_block(&mut block, Vec3::ZERO, &levels(), true), 0);
    }

    #[test]
    fn switches_levels_as_observer_moves() {
        let recorder = Recorder::default();
        let mut block = block_at(0.0, &recorder, 2);
        let all = levels();

        process_block(&mut block, Vec3::new(50.0, 0.0, 0.0), &all, false);
        assert!(block.is_visible(0));
        assert!(!block.is_visible(1));

        process_block(&mut block, Vec3::new(200.0, 0.0, 0.0), &all, false);
        assert!(!block.is_visible(0));
        assert!(block.is_visible(1));
        assert_eq!(recorder.attached(), 1);

        process_block(&mut block, Vec3::new(400.0, 0.0, 0.0), &all, false);
        assert_eq!(recorder.attached(), 0);
    }

    #[test]
    fn fade_ratio_is_monotonic_through_fade_out_band() {
        let recorder = Recorder::default();
        let mut block = block_at(0.0, &recorder, 1);
        let only = [DetailLevel::new(0.0, 100.0, 20.0)];

        let mut last_alpha = -1.0;
        let mut dist = 119.5;
        while dist >= 100.0 {
            process_block(&mut block, Vec3::new(dist, 0.0, 0.0), &only, true);
            assert!(block.is_visible(0), "hidden at {dist}");
            let node = block.node(0).unwrap();
            assert!(node.fade.enabled);
            let alpha = node.fade.alpha(dist);
            assert!(alpha >= last_alpha, "alpha fell at {dist}");
            last_alpha = alpha;
            dist -= 0.5;
        }
        assert_eq!(recorder.attach_calls(), 1);
    }

    #[test]
    fn fade_window_is_disabled_when_not_transitioning() {
        let recorder = Recorder::default();
        let mut block = block_at(0.0, &recorder, 1);
        let only = [DetailLevel::new(0.0, 100.0, 20.0)];
        process_block(&mut block, Vec3::new(110.0, 0.0, 0.0), &only, true);
        assert!(block.node(0).unwrap().fade.enabled);

        process_block(&mut block, Vec3::new(10.0, 0.0, 0.0), &only, true);
        assert!(!block.node(0).unwrap().fade.enabled);
        assert!(block.is_visible(0));
    }
}
