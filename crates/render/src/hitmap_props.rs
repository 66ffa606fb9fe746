//! Stock policies for turning a command's markers into hitmap markers.
//!
//! Each policy copies the markers, swaps their colors for freshly assigned ID
//! colors and drops whatever an earlier pass of a stacked pick already found.

use crate::hitmap::{HitmapCallback, MouseEventObject};
use std::sync::Arc;
use worldview_common::{Color, Marker, MarkerRef};

/// Reserves hitmap IDs for an object and returns one color per ID.
pub type AssignNextColors<'a> = dyn FnMut(HitmapCallback) -> Vec<Color> + 'a;

fn is_excluded(excluded: &[MouseEventObject], object: &MarkerRef) -> bool {
    excluded.iter().any(|e| e.is(object))
}

fn single(
    marker: &MarkerRef,
    callback_object: MarkerRef,
    assign: &mut AssignNextColors<'_>,
    excluded: &[MouseEventObject],
) -> Option<MarkerRef> {
    if is_excluded(excluded, &callback_object) {
        return None;
    }
    let color = assign(HitmapCallback::Single(callback_object))
        .first()
        .copied()
        .unwrap_or(Color::BLACK);
    let mut hitmap = Marker::clone(marker);
    hitmap.color = Some(color);
    if !hitmap.colors.is_empty() && !hitmap.points.is_empty() {
        hitmap.colors = vec![color; hitmap.points.len()];
    }
    Some(Arc::new(hitmap))
}

/// One ID per marker; the whole marker is drawn in that ID's color.
pub fn non_instanced(
    markers: &[MarkerRef],
    assign: &mut AssignNextColors<'_>,
    excluded: &[MouseEventObject],
) -> Vec<MarkerRef> {
    markers
        .iter()
        .filter_map(|m| single(m, m.clone(), assign, excluded))
        .collect()
}

/// Like [`non_instanced`], but IDs resolve to each marker's
/// `original_marker` when it has one. Used by composites that decompose one
/// declared marker into several drawn ones.
pub fn with_original_marker(
    markers: &[MarkerRef],
    assign: &mut AssignNextColors<'_>,
    excluded: &[MouseEventObject],
) -> Vec<MarkerRef> {
    markers
        .iter()
        .filter_map(|m| {
            let callback = m.original_marker.clone().unwrap_or_else(|| m.clone());
            single(m, callback, assign, excluded)
        })
        .collect()
}

/// One ID per instance, where an instance is `points_per_instance`
/// consecutive points (a marker without points is a single instance).
///
/// Points of instances already picked are dropped. A marker whose exclusion
/// carries no instance index disappears entirely.
pub fn instanced(
    markers: &[MarkerRef],
    assign: &mut AssignNextColors<'_>,
    excluded: &[MouseEventObject],
    points_per_instance: usize,
) -> Vec<MarkerRef> {
    let per = points_per_instance.max(1);
    markers
        .iter()
        .filter_map(|marker| {
            let matched: Vec<&MouseEventObject> =
                excluded.iter().filter(|e| e.is(marker)).collect();
            let filtered: Vec<usize> = matched.iter().filter_map(|e| e.instance_index).collect();

            let count = marker.points.len().div_ceil(per).max(1);
            let id_colors = assign(HitmapCallback::Instanced {
                object: marker.clone(),
                count,
            });
            let start = id_colors.first().copied().unwrap_or(Color::BLACK);

            let mut hitmap = Marker::clone(marker);
            if hitmap.points.is_empty() {
                hitmap.color = Some(start);
                if !matched.is_empty() {
                    return None;
                }
                return Some(Arc::new(hitmap));
            }

            let colors: Vec<Color> = (0..hitmap.points.len())
                .map(|i| id_colors.get(i / per).copied().unwrap_or(Color::BLACK))
                .collect();
            if !filtered.is_empty() {
                let keep = |i: usize| !filtered.contains(&(i / per));
                hitmap.points = hitmap
                    .points
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| keep(*i))
                    .map(|(_, p)| *p)
                    .collect();
                hitmap.colors = colors
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| keep(*i))
                    .map(|(_, c)| c)
                    .collect();
            } else if !matched.is_empty() {
                return None;
            } else {
                hitmap.colors = colors;
            }
            Some(Arc::new(hitmap))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::InstanceId;
    use crate::hitmap::{HitmapObjectIdManager, int_to_rgb};
    use glam::Vec3;

    fn points(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn non_instanced_single_marker() {
        let mut ids = HitmapObjectIdManager::new();
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        let marker = Marker::new().with_color(red).shared();
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        let out = non_instanced(&[marker.clone()], &mut assign, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].color, Some(int_to_rgb(1)));
        // the declared marker is untouched
        assert_eq!(marker.color, Some(red));
    }

    #[test]
    fn non_instanced_overwrites_point_colors() {
        let mut ids = HitmapObjectIdManager::new();
        let mut marker = Marker::new().with_points(points(3));
        marker.colors = vec![Color::WHITE; 3];
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        let out = non_instanced(&[marker.shared()], &mut assign, &[]);
        assert_eq!(out[0].colors, vec![int_to_rgb(1); 3]);
    }

    #[test]
    fn non_instanced_skips_excluded() {
        let mut ids = HitmapObjectIdManager::new();
        let a = Marker::new().shared();
        let b = Marker::new().shared();
        let excluded = [MouseEventObject::new(a.clone(), None)];
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        let out = non_instanced(&[a, b], &mut assign, &excluded);
        assert_eq!(out.len(), 1);
        assert_eq!(ids.len(), 1);
        assert_eq!(out[0].color, Some(int_to_rgb(1)));
    }

    #[test]
    fn original_marker_receives_events() {
        let mut ids = HitmapObjectIdManager::new();
        let arrow = Marker::new().shared();
        let mut shaft = Marker::new();
        shaft.original_marker = Some(arrow.clone());
        let mut head = Marker::new();
        head.original_marker = Some(arrow.clone());
        {
            let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
            let out = with_original_marker(&[shaft.clone().shared(), head.clone().shared()], &mut assign, &[]);
            assert_eq!(out.len(), 2);
        }
        assert!(ids.get_object_by_id(1).unwrap().is(&arrow));
        assert!(ids.get_object_by_id(2).unwrap().is(&arrow));

        let excluded = [MouseEventObject::new(arrow, None)];
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        assert!(with_original_marker(&[shaft.shared(), head.shared()], &mut assign, &excluded).is_empty());
    }

    #[test]
    fn instances_beyond_the_id_space_stay_background() {
        let mut ids = HitmapObjectIdManager::with_max_id(2);
        let marker = Marker::new().with_points(points(3)).shared();
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        let out = instanced(&[marker], &mut assign, &[], 1);
        assert_eq!(out[0].colors, vec![int_to_rgb(1), int_to_rgb(2), Color::BLACK]);
    }

    #[test]
    fn instanced_without_points_is_one_instance() {
        let mut ids = HitmapObjectIdManager::new();
        let marker = Marker::new().shared();
        {
            let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
            let out = instanced(&[marker.clone()], &mut assign, &[], 1);
            assert_eq!(out[0].color, Some(int_to_rgb(1)));
        }
        assert_eq!(ids.get_object_by_id(1).unwrap().instance_index, Some(0));

        let excluded = [MouseEventObject::new(marker.clone(), Some(0))];
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        assert!(instanced(&[marker], &mut assign, &excluded, 1).is_empty());
    }

    #[test]
    fn instanced_colors_each_point() {
        let mut ids = HitmapObjectIdManager::new();
        let marker = Marker::new().with_points(points(3)).shared();
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        let out = instanced(&[marker], &mut assign, &[], 1);
        assert_eq!(out[0].colors, vec![int_to_rgb(1), int_to_rgb(2), int_to_rgb(3)]);
    }

    #[test]
    fn instanced_groups_points_per_instance() {
        let mut ids = HitmapObjectIdManager::new();
        let marker = Marker::new().with_points(points(6)).shared();
        {
            let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
            let out = instanced(&[marker.clone()], &mut assign, &[], 2);
            let c = [int_to_rgb(1), int_to_rgb(2), int_to_rgb(3)];
            assert_eq!(out[0].colors, vec![c[0], c[0], c[1], c[1], c[2], c[2]]);
        }
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn instanced_leftover_points_share_last_instance_rules() {
        let mut ids = HitmapObjectIdManager::new();
        let marker = Marker::new().with_points(points(5)).shared();
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        let out = instanced(&[marker], &mut assign, &[], 2);
        assert_eq!(out[0].colors.len(), 5);
        assert_eq!(out[0].colors[4], int_to_rgb(3));
    }

    #[test]
    fn instanced_drops_excluded_instances() {
        let mut ids = HitmapObjectIdManager::new();
        let marker = Marker::new().with_points(points(6)).shared();
        let excluded = [MouseEventObject::new(marker.clone(), Some(1))];
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        let out = instanced(&[marker], &mut assign, &excluded, 2);
        let p = points(6);
        assert_eq!(out[0].points, vec![p[0], p[1], p[4], p[5]]);
        assert_eq!(
            out[0].colors,
            vec![int_to_rgb(1), int_to_rgb(1), int_to_rgb(3), int_to_rgb(3)]
        );
    }

    #[test]
    fn instanced_whole_object_exclusion_removes_marker() {
        let mut ids = HitmapObjectIdManager::new();
        let marker = Marker::new().with_points(points(4)).shared();
        let excluded = [MouseEventObject::new(marker.clone(), None)];
        let mut assign = |cb| ids.assign_next_colors(InstanceId(1), cb);
        assert!(instanced(&[marker], &mut assign, &excluded, 1).is_empty());
    }
}
