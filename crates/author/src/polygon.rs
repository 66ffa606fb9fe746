use glam::{Vec2, Vec3};
use std::fmt;
use tracing::debug;
use worldview_camera::Ray;
use worldview_common::{Color, LinePrimitive, Marker, MarkerId, MarkerRef};
use worldview_input::{KeyEvent, MouseEvent};
use worldview_render::MouseEventObject;

const ACTIVE_COLOR: Color = Color::new(1.0, 0.2, 0.2, 1.0);
const INACTIVE_COLOR: Color = Color::new(0.5, 0.5, 0.5, 1.0);
const POINT_SIZE: f32 = 0.3;
const LINE_THICKNESS: f32 = 0.1;

/// Identity of a polygon or a polygon point. Drawn markers carry it as
/// their `MarkerId`, so picks resolve back to builder objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonPoint {
    pub id: ObjectId,
    pub point: Vec3,
}

/// Vertex list of a polygon. A closed polygon repeats its first point (same
/// id) at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub id: ObjectId,
    pub name: Option<String>,
    pub points: Vec<PolygonPoint>,
}

impl Polygon {
    /// Closed when two consecutive points coincide or the ends meet.
    pub fn is_closed(&self) -> bool {
        let same = |a: &PolygonPoint, b: &PolygonPoint| a.point == b.point;
        if self.points.windows(2).any(|w| same(&w[0], &w[1])) {
            return true;
        }
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => same(first, last),
            _ => false,
        }
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.points.iter().map(|p| p.point).collect()
    }

    /// Points without the closing repeat.
    fn unique_points(&self) -> Vec<PolygonPoint> {
        let mut seen: Vec<PolygonPoint> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            if !seen.iter().any(|s| s.id == p.id) {
                seen.push(*p);
            }
        }
        seen
    }
}

/// Markers that render the builder's polygons: one line strip per polygon
/// and one marker per vertex.
#[derive(Debug, Clone, Default)]
pub struct PolygonMarkers {
    pub lines: Vec<MarkerRef>,
    pub points: Vec<MarkerRef>,
}

fn distance_squared_to_segment(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    let ab = b - a;
    let len = ab.length_squared();
    if len == 0.0 {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

fn ground_point(ray: &Ray) -> Option<Vec3> {
    ray.plane_intersection(Vec3::ZERO, Vec3::Z)
}

fn object_id(object: &MouseEventObject) -> Option<ObjectId> {
    object.object.id.map(|MarkerId(id)| ObjectId(id))
}

/// Draws and edits polygons on the ground plane from picked mouse events.
///
/// Ctrl+click starts a polygon or adds a point to the active one, a plain
/// click while building closes it, dragging moves the selected point or
/// polygon, double-click deletes a point or inserts one on the nearest edge,
/// and Delete/Backspace removes the selection.
#[derive(Default)]
pub struct PolygonBuilder {
    polygons: Vec<Polygon>,
    active_polygon: Option<ObjectId>,
    active_point: Option<ObjectId>,
    mouse_down: bool,
    mouse_down_point: Option<Vec3>,
    next_id: u64,
    revision: u64,
    on_change: Option<Box<dyn FnMut()>>,
}

impl fmt::Debug for PolygonBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolygonBuilder")
            .field("polygons", &self.polygons)
            .field("active_polygon", &self.active_polygon)
            .field("active_point", &self.active_point)
            .field("mouse_down", &self.mouse_down)
            .field("revision", &self.revision)
            .finish()
    }
}

impl PolygonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every change to the polygons or the selection.
    pub fn set_on_change(&mut self, on_change: impl FnMut() + 'static) {
        self.on_change = Some(Box::new(on_change));
    }

    /// Bumped on every change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn active_polygon(&self) -> Option<&Polygon> {
        let id = self.active_polygon?;
        self.polygons.iter().find(|p| p.id == id)
    }

    pub fn active_point(&self) -> Option<PolygonPoint> {
        let id = self.active_point?;
        self.active_polygon()?
            .points
            .iter()
            .find(|p| p.id == id)
            .copied()
    }

    pub fn is_active_polygon_closed(&self) -> bool {
        self.active_polygon().is_some_and(Polygon::is_closed)
    }

    fn changed(&mut self) {
        self.revision += 1;
        if let Some(on_change) = self.on_change.as_mut() {
            on_change();
        }
    }

    fn allocate(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    fn new_point(&mut self, point: Vec3) -> PolygonPoint {
        PolygonPoint {
            id: self.allocate(),
            point,
        }
    }

    fn active_polygon_mut(&mut self) -> Option<&mut Polygon> {
        let id = self.active_polygon?;
        self.polygons.iter_mut().find(|p| p.id == id)
    }

    /// Add a polygon from outside points, closing it if needed. Fewer than
    /// three points are ignored. Clears the selection.
    pub fn add_polygon(&mut self, points: &[Vec3], name: Option<String>) -> Option<ObjectId> {
        if points.len() < 3 {
            return None;
        }
        self.select_object(None);
        let id = self.allocate();
        let mut polygon = Polygon {
            id,
            name,
            points: points.iter().map(|p| self.new_point(*p)).collect(),
        };
        if !polygon.is_closed() {
            polygon.points.push(polygon.points[0]);
        }
        self.polygons.push(polygon);
        self.changed();
        Some(id)
    }

    /// Add a point to the active polygon, or start a new polygon whose
    /// second, floating point follows the mouse.
    pub fn push_point(&mut self, point: Vec3) {
        let open = self.active_polygon().is_some_and(|p| !p.is_closed());
        if open {
            let new_point = self.new_point(point);
            if let Some(polygon) = self.active_polygon_mut() {
                polygon.points.push(new_point);
            }
            self.select_object(Some(new_point.id));
            return;
        }
        let id = self.allocate();
        let first = self.new_point(point);
        let floating = self.new_point(point);
        self.polygons.push(Polygon {
            id,
            name: None,
            points: vec![first, floating],
        });
        self.select_object(Some(floating.id));
    }

    pub fn update_active_point(&mut self, point: Vec3) {
        let Some(id) = self.active_point else {
            return;
        };
        if let Some(polygon) = self.active_polygon_mut() {
            for p in polygon.points.iter_mut().filter(|p| p.id == id) {
                p.point = point;
            }
        }
        self.changed();
    }

    /// Close the active polygon by repeating its first point. A two-point
    /// polygon is a single line and is deleted instead.
    pub fn close_active_polygon(&mut self) {
        let Some(polygon) = self.active_polygon_mut() else {
            return;
        };
        if polygon.points.len() == 2 {
            let id = polygon.id;
            self.delete_polygon(id);
        } else {
            let first = polygon.points[0];
            polygon.points.push(first);
        }
        self.changed();
    }

    pub fn delete_polygon(&mut self, id: ObjectId) {
        self.polygons.retain(|p| p.id != id);
        self.active_polygon = None;
    }

    /// Delete a point of the active polygon. Deleting the closing point
    /// re-closes on the next one; a polygon left with fewer than three
    /// distinct points is deleted.
    pub fn delete_point(&mut self, id: ObjectId) {
        let Some(polygon) = self.active_polygon_mut() else {
            return;
        };
        let before = polygon.points.len();
        polygon.points.retain(|p| p.id != id);
        if polygon.points.len() + 2 == before {
            if let Some(first) = polygon.points.first().copied() {
                polygon.points.push(first);
            }
        }
        let too_small = polygon.points.len() < 4;
        let polygon_id = polygon.id;
        self.active_point = None;
        if too_small {
            debug!(polygon = polygon_id.0, "polygon too small after point deletion; deleting it");
            self.delete_polygon(polygon_id);
        }
        self.changed();
    }

    /// Select a polygon, or a point together with its polygon. `None`
    /// clears the selection.
    pub fn select_object(&mut self, object: Option<ObjectId>) {
        self.active_polygon = None;
        self.active_point = None;
        if let Some(object) = object {
            for polygon in &self.polygons {
                if polygon.id == object {
                    self.active_polygon = Some(polygon.id);
                }
                if polygon.points.iter().any(|p| p.id == object) {
                    self.active_point = Some(object);
                    self.active_polygon = Some(polygon.id);
                }
            }
        }
        self.changed();
    }

    pub fn on_mouse_down(&mut self, event: &MouseEvent, ray: &Ray, objects: &[MouseEventObject]) {
        let Some(point) = ground_point(ray) else {
            return;
        };
        let first_click = !self.mouse_down;
        self.mouse_down = true;
        self.mouse_down_point = Some(point);
        let ctrl = event.modifiers.ctrl;

        if first_click && !ctrl {
            self.select_object(objects.first().and_then(object_id));
        } else if ctrl {
            self.push_point(point);
        } else {
            self.close_active_polygon();
        }
        self.changed();
    }

    /// Returns true while a polygon is selected: the camera should then
    /// leave the drag alone.
    pub fn on_mouse_move(&mut self, ray: &Ray) -> bool {
        let consumed = self.active_polygon.is_some();
        if !self.mouse_down || !consumed {
            return consumed;
        }
        let Some(point) = ground_point(ray) else {
            return consumed;
        };
        if self.active_point.is_some() {
            self.update_active_point(point);
        } else if let Some(last) = self.mouse_down_point {
            let delta = Vec3::new(point.x - last.x, point.y - last.y, 0.0);
            self.mouse_down_point = Some(point);
            if let Some(polygon) = self.active_polygon_mut() {
                let moved: Vec<ObjectId> = polygon.unique_points().iter().map(|p| p.id).collect();
                for id in moved {
                    // the closing point shares its id, so both copies move together
                    if let Some(p) = polygon.points.iter().find(|p| p.id == id).copied() {
                        let target = p.point + delta;
                        for q in polygon.points.iter_mut().filter(|q| q.id == id) {
                            q.point = target;
                        }
                    }
                }
            }
            self.changed();
        }
        consumed
    }

    pub fn on_mouse_up(&mut self, event: &MouseEvent) {
        if !event.modifiers.ctrl {
            self.mouse_down = false;
        }
    }

    pub fn on_double_click(&mut self, ray: &Ray, objects: &[MouseEventObject]) {
        let Some(first) = objects.first() else {
            return;
        };
        self.select_object(object_id(first));
        if let Some(id) = self.active_point {
            self.delete_point(id);
            return;
        }
        let Some(point) = ground_point(ray) else {
            return;
        };
        let p = point.truncate();
        let new_point = self.new_point(point);
        let Some(polygon) = self.active_polygon_mut() else {
            return;
        };
        let nearest = polygon
            .points
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let d = distance_squared_to_segment(w[0].point.truncate(), w[1].point.truncate(), p);
                (i, d)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((index, _)) = nearest {
            polygon.points.insert(index + 1, new_point);
            self.active_point = Some(new_point.id);
        }
        self.changed();
    }

    /// Delete/Backspace removes the active point, or the active polygon
    /// when no point is selected. Returns whether the key was used.
    pub fn on_key_down(&mut self, event: &KeyEvent) -> bool {
        let Some(polygon) = self.active_polygon else {
            return false;
        };
        match event.code.as_str() {
            "Delete" | "Backspace" => {
                match self.active_point {
                    Some(point) => self.delete_point(point),
                    None => self.delete_polygon(polygon),
                }
                self.changed();
                true
            }
            _ => false,
        }
    }

    /// Markers for drawing the polygons; their ids are builder object ids.
    pub fn markers(&self) -> PolygonMarkers {
        let mut out = PolygonMarkers::default();
        for polygon in &self.polygons {
            let polygon_active = self.active_polygon == Some(polygon.id);
            let color = if polygon_active { ACTIVE_COLOR } else { INACTIVE_COLOR };
            out.lines.push(
                Marker {
                    primitive: LinePrimitive::LineStrip,
                    ..Marker::new()
                        .with_id(polygon.id.0)
                        .with_points(polygon.positions())
                        .with_scale(Vec3::splat(LINE_THICKNESS))
                        .with_color(color)
                }
                .shared(),
            );
            for point in polygon.unique_points() {
                let point_color = if self.active_point == Some(point.id) {
                    ACTIVE_COLOR
                } else {
                    color
                };
                out.points.push(
                    Marker::at(point.point)
                        .with_id(point.id.0)
                        .with_scale(Vec3::splat(POINT_SIZE))
                        .with_color(point_color)
                        .shared(),
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use worldview_input::{Modifiers, MouseButton, MouseEventKind};

    const MAG: f32 = 10.0;

    fn square(builder: &mut PolygonBuilder) -> ObjectId {
        builder
            .add_polygon(
                &[
                    Vec3::new(MAG, MAG, 0.0),
                    Vec3::new(MAG, -MAG, 0.0),
                    Vec3::new(-MAG, -MAG, 0.0),
                    Vec3::new(-MAG, MAG, 0.0),
                ],
                None,
            )
            .unwrap()
    }

    /// A ray straight down onto `point` of the ground plane.
    fn ray_to(x: f32, y: f32) -> Ray {
        let point = Vec3::new(x, y, 0.0);
        Ray::new(point + Vec3::Z * 10.0, Vec3::NEG_Z, point)
    }

    fn click(ctrl: bool) -> MouseEvent {
        let modifiers = if ctrl { Modifiers::ctrl() } else { Modifiers::NONE };
        MouseEvent::new(MouseEventKind::MouseDown, MouseButton::Left, 0.0, 0.0).with_modifiers(modifiers)
    }

    fn picked(id: ObjectId) -> Vec<MouseEventObject> {
        vec![MouseEventObject::new(Marker::new().with_id(id.0).shared(), None)]
    }

    fn positions(builder: &PolygonBuilder) -> Vec<Vec3> {
        builder.polygons()[0].positions()
    }

    #[test]
    fn removes_a_point() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        b.select_object(Some(id));
        assert_eq!(b.active_polygon().unwrap().id, id);
        let second = b.polygons()[0].points[1].id;
        b.delete_point(second);
        assert_eq!(
            positions(&b),
            vec![
                Vec3::new(MAG, MAG, 0.0),
                Vec3::new(-MAG, -MAG, 0.0),
                Vec3::new(-MAG, MAG, 0.0),
                Vec3::new(MAG, MAG, 0.0),
            ]
        );
    }

    #[test]
    fn removing_the_overlap_point_recloses() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        b.select_object(Some(id));
        let first = b.polygons()[0].points[0].id;
        b.delete_point(first);
        assert_eq!(
            positions(&b),
            vec![
                Vec3::new(MAG, -MAG, 0.0),
                Vec3::new(-MAG, -MAG, 0.0),
                Vec3::new(-MAG, MAG, 0.0),
                Vec3::new(MAG, -MAG, 0.0),
            ]
        );
    }

    #[test]
    fn two_point_polygon_is_deleted() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        b.select_object(Some(id));
        let first = b.polygons()[0].points[0].id;
        b.delete_point(first);
        let next = b.polygons()[0].points[0].id;
        b.delete_point(next);
        assert!(b.polygons().is_empty());
        assert!(b.active_point().is_none());
        assert!(b.active_polygon().is_none());
    }

    #[test]
    fn double_clicks_delete_points() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        b.select_object(Some(id));
        let first = b.polygons()[0].points[0].id;
        b.on_double_click(&ray_to(MAG, MAG), &picked(first));
        let next = b.polygons()[0].points[0].id;
        b.on_double_click(&ray_to(MAG, MAG), &picked(next));
        b.on_mouse_down(&click(false), &ray_to(1.0, 1.0), &[]);
        assert!(b.polygons().is_empty());
        assert!(b.active_polygon().is_none());
    }

    #[test]
    fn double_click_on_polygon_inserts_on_nearest_edge() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        // near the right edge, between points 0 and 1
        b.on_double_click(&ray_to(MAG + 0.5, 0.0), &picked(id));
        let polygon = &b.polygons()[0];
        assert_eq!(polygon.points.len(), 6);
        assert_eq!(polygon.points[1].point, Vec3::new(MAG + 0.5, 0.0, 0.0));
        assert_eq!(b.active_point().unwrap().id, polygon.points[1].id);
    }

    #[test]
    fn builds_with_mouse() {
        let mut b = PolygonBuilder::new();
        b.on_mouse_down(&click(true), &ray_to(1.0, 1.0), &[]);
        b.on_mouse_move(&ray_to(1.0, -1.0));
        b.on_mouse_down(&click(true), &ray_to(1.0, -1.0), &[]);
        b.on_mouse_move(&ray_to(-1.0, -1.0));
        b.on_mouse_down(&click(false), &ray_to(-1.0, -1.0), &[]);
        b.on_mouse_up(&click(true));
        assert_eq!(b.polygons().len(), 1);
        assert_eq!(
            positions(&b),
            vec![
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ]
        );
        assert!(b.is_active_polygon_closed());
    }

    #[test]
    fn drag_moves_selected_polygon() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        b.on_mouse_down(&click(false), &ray_to(0.0, 0.0), &picked(id));
        assert!(b.on_mouse_move(&ray_to(2.0, 1.0)));
        let moved = positions(&b);
        assert_eq!(moved[0], Vec3::new(MAG + 2.0, MAG + 1.0, 0.0));
        assert_eq!(moved[4], moved[0]);
        assert_eq!(moved[2], Vec3::new(-MAG + 2.0, -MAG + 1.0, 0.0));
    }

    #[test]
    fn move_without_selection_is_left_to_the_camera() {
        let mut b = PolygonBuilder::new();
        square(&mut b);
        b.on_mouse_down(&click(false), &ray_to(0.0, 0.0), &[]);
        assert!(!b.on_mouse_move(&ray_to(2.0, 1.0)));
        assert_eq!(positions(&b)[0], Vec3::new(MAG, MAG, 0.0));
    }

    #[test]
    fn adds_external_polygons() {
        let mut b = PolygonBuilder::new();
        assert!(b.add_polygon(&[Vec3::ZERO, Vec3::ONE], None).is_none());
        b.add_polygon(&[Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0), Vec3::new(-1.0, -1.0, 0.0)], None);
        b.add_polygon(
            &[
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(-1.0, -1.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            Some("foo".into()),
        );
        assert_eq!(b.polygons().len(), 2);
        assert_eq!(b.polygons()[0].points.len(), 4);
        assert_eq!(b.polygons()[0].points[3].point, Vec3::ZERO);
        assert_eq!(b.polygons()[1].name.as_deref(), Some("foo"));
        assert_eq!(b.polygons()[1].points.len(), 4);
    }

    #[test]
    fn delete_key_removes_selection() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        assert!(!b.on_key_down(&KeyEvent::new("Delete")));
        b.select_object(Some(id));
        assert!(!b.on_key_down(&KeyEvent::new("KeyA")));
        assert!(b.on_key_down(&KeyEvent::new("Backspace")));
        assert!(b.polygons().is_empty());
    }

    #[test]
    fn changes_are_reported() {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let mut b = PolygonBuilder::new();
        b.set_on_change(move || seen.set(seen.get() + 1));
        square(&mut b);
        assert!(count.get() > 0);
        assert_eq!(count.get() as u64, b.revision());
    }

    #[test]
    fn markers_carry_object_ids() {
        let mut b = PolygonBuilder::new();
        let id = square(&mut b);
        b.select_object(Some(id));
        let markers = b.markers();
        assert_eq!(markers.lines.len(), 1);
        assert_eq!(markers.lines[0].id, Some(MarkerId(id.0)));
        assert_eq!(markers.lines[0].color, Some(ACTIVE_COLOR));
        assert_eq!(markers.points.len(), 4);
    }
}
