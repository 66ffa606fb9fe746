use crate::config::WorldviewConfig;
use crate::element::{ClickInfo, Element, MouseHandler, MouseHandlers, Propagation};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use worldview_camera::{CameraState, CameraStore, PartialCameraState};
use worldview_commands::Text;
use worldview_common::Dimensions;
use worldview_input::{
    CameraListener, ClickTracker, KeyEvent, KeyOutcome, MouseButton, MouseEvent, MouseEventKind,
    WheelEvent,
};
use worldview_render::{
    DrawInput, Gpu, HitmapHit, InstanceId, MouseEventObject, PaintCallbackId, WorldviewContext,
    WorldviewError,
};
use worldview_tools::StatsReport;

struct Mounted {
    key: String,
    instance: InstanceId,
    handlers: MouseHandlers,
}

/// A mouse event that reached the handlers, with what they were given.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub kind: MouseEventKind,
    pub info: ClickInfo,
    /// A handler stopped propagation, so the camera ignored the event.
    pub stopped: bool,
}

/// Declarative scene host over a [`WorldviewContext`].
///
/// The application declares its [`Element`]s with [`render`](Self::render)
/// whenever they change, forwards input events, and calls
/// [`frame`](Self::frame) once per display frame. Pointer events are
/// picked through the hitmap and dispatched to the global handler first,
/// then to the handler of each element owning a picked object.
///
/// The camera is uncontrolled unless `camera_state` is configured. An
/// uncontrolled camera repaints by itself as input moves it. A controlled
/// camera reports changes to the handler set with
/// [`set_on_camera_state_change`](Self::set_on_camera_state_change) and only
/// moves when the application calls [`set_camera_state`](Self::set_camera_state).
/// Without that handler a controlled camera is fixed and ignores input.
pub struct Worldview<G: Gpu> {
    ctx: WorldviewContext<G>,
    config: WorldviewConfig,
    listener: CameraListener,
    clicks: ClickTracker,
    elements: Vec<Mounted>,
    global: MouseHandlers,
    has_camera_handler: bool,
    text_callbacks: Vec<PaintCallbackId>,
}

impl<G: Gpu> Worldview<G> {
    pub fn new(config: WorldviewConfig, dimension: Dimensions) -> Self {
        config.validate(false);
        let store = CameraStore::from_partial(&config.initial_camera_state());
        let mut ctx = WorldviewContext::new(dimension, config.background, store);
        if config.camera_state.is_none() {
            let dirty = ctx.dirty_flag();
            ctx.camera_store_mut().set_handler(move |_| dirty.mark());
        }
        let mut listener = CameraListener::new(config.key_map.clone(), config.shift_keys);
        listener.set_rect(dimension);
        Self {
            ctx,
            config,
            listener,
            clicks: ClickTracker::new(),
            elements: Vec::new(),
            global: MouseHandlers::new(),
            has_camera_handler: false,
            text_callbacks: Vec::new(),
        }
    }

    /// Hand over the backend and paint the first frame.
    pub fn initialize(&mut self, gpu: G) -> Result<(), WorldviewError> {
        self.ctx.initialize(gpu)?;
        self.ctx.paint();
        info!(elements = self.elements.len(), "worldview ready");
        Ok(())
    }

    pub fn destroy(&mut self) {
        self.ctx.destroy();
    }

    pub fn config(&self) -> &WorldviewConfig {
        &self.config
    }

    pub fn context(&self) -> &WorldviewContext<G> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut WorldviewContext<G> {
        &mut self.ctx
    }

    pub fn is_controlled(&self) -> bool {
        self.config.camera_state.is_some()
    }

    /// A controlled camera nobody listens to: input leaves it alone.
    pub fn is_fixed_camera(&self) -> bool {
        self.is_controlled() && !self.has_camera_handler
    }

    pub fn camera_state(&self) -> CameraState {
        *self.ctx.camera_store().state()
    }

    /// Called with the new state whenever input moves the camera. An
    /// uncontrolled camera still repaints by itself.
    pub fn set_on_camera_state_change(&mut self, mut handler: impl FnMut(&CameraState) + 'static) {
        self.has_camera_handler = true;
        if self.is_controlled() {
            self.ctx.camera_store_mut().set_handler(handler);
        } else {
            let dirty = self.ctx.dirty_flag();
            self.ctx.camera_store_mut().set_handler(move |state| {
                handler(state);
                dirty.mark();
            });
        }
    }

    /// Mirror an application-owned camera state and repaint.
    pub fn set_camera_state(&mut self, state: &PartialCameraState) {
        if !self.is_controlled() {
            warn!("set_camera_state on an uncontrolled camera; input will keep moving it");
        }
        self.ctx.camera_store_mut().set_camera_state(state);
        self.ctx.on_dirty();
    }

    pub fn set_dimension(&mut self, dimension: Dimensions) {
        self.ctx.set_dimension(dimension);
        self.listener.set_rect(dimension);
        self.ctx.on_dirty();
    }

    /// Canvas size in physical pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        let scale = self.config.effective_resolution_scale();
        let d = self.ctx.dimension();
        (
            (d.width * scale).round().max(1.0) as u32,
            (d.height * scale).round().max(1.0) as u32,
        )
    }

    /// Handler for every picked `kind` event, whichever element owns the
    /// objects. Runs before element handlers.
    pub fn set_global_handler(
        &mut self,
        kind: MouseEventKind,
        handler: impl Fn(&MouseEvent, &ClickInfo, &mut Propagation) + 'static,
    ) {
        self.global.set(kind, handler);
    }

    pub fn remove_global_handler(&mut self, kind: MouseEventKind) {
        self.global.remove(kind);
    }

    /// Reconcile the declared elements with what is mounted: new keys
    /// mount, known keys update in place, missing keys unmount.
    pub fn render(&mut self, elements: Vec<Element>) -> Result<(), WorldviewError> {
        for element in &elements {
            self.ctx.on_mount(element.command.as_ref())?;
        }
        let mut previous = std::mem::take(&mut self.elements);
        let mut next: Vec<Mounted> = Vec::with_capacity(elements.len());
        for element in elements {
            if next.iter().any(|m| m.key == element.key) {
                warn!(key = %element.key, "duplicate element key; later declaration ignored");
                continue;
            }
            let instance = match previous.iter().position(|m| m.key == element.key) {
                Some(index) => previous.swap_remove(index).instance,
                None => {
                    debug!(key = %element.key, command = element.command.definition().label, "mount");
                    self.ctx.create_instance()
                }
            };
            let input = DrawInput {
                instance,
                command: element.command,
                markers: element.markers,
                layer_index: element.layer_index,
            };
            self.ctx.register_draw_call(input.clone());
            self.ctx.register_hitmap_call(input);
            next.push(Mounted {
                key: element.key,
                instance,
                handlers: element.handlers,
            });
        }
        for gone in previous {
            debug!(key = %gone.key, "unmount");
            self.ctx.on_unmount(gone.instance);
        }
        self.elements = next;
        self.ctx.on_dirty();
        Ok(())
    }

    /// Lay out `text`'s labels after every paint.
    pub fn attach_text(&mut self, text: &Rc<Text>) -> PaintCallbackId {
        let id = text.attach(&mut self.ctx);
        self.text_callbacks.push(id);
        id
    }

    pub fn detach_text(&mut self, id: PaintCallbackId) {
        self.ctx.unregister_paint_callback(id);
        self.text_callbacks.retain(|c| *c != id);
    }

    pub fn detach_all_text(&mut self) {
        for id in std::mem::take(&mut self.text_callbacks) {
            self.ctx.unregister_paint_callback(id);
        }
    }

    /// Feed a pointer event to the handlers and the camera.
    ///
    /// A mouseup close enough to its mousedown also dispatches a click.
    /// Only the left button is dispatched to handlers; every button drives
    /// the camera. Returns the events the handlers saw.
    pub async fn handle_mouse(&mut self, event: &MouseEvent) -> Result<Vec<Dispatched>, WorldviewError> {
        let dimension = self.ctx.dimension();
        let x = event.client_x - dimension.left;
        let y = event.client_y - dimension.top;
        let mut kinds = vec![event.kind];
        match event.kind {
            MouseEventKind::MouseDown => self.clicks.press(x, y),
            MouseEventKind::MouseUp => {
                if self.clicks.release(x, y) {
                    kinds.push(MouseEventKind::Click);
                }
            }
            _ => {}
        }

        let mut dispatched = Vec::new();
        if event.button == MouseButton::Left {
            for kind in kinds {
                if let Some(d) = self.dispatch(kind, event, x, y).await? {
                    dispatched.push(d);
                }
            }
        }

        let stopped = dispatched.first().is_some_and(|d| d.stopped);
        if !self.is_fixed_camera() {
            match event.kind {
                MouseEventKind::MouseDown if !stopped => self.listener.on_mouse_down(event),
                MouseEventKind::MouseMove if !stopped => {
                    self.listener.on_mouse_move(event, self.ctx.camera_store_mut());
                }
                MouseEventKind::MouseUp => self.listener.on_mouse_up(event),
                _ => {}
            }
        }
        Ok(dispatched)
    }

    async fn dispatch(
        &mut self,
        kind: MouseEventKind,
        event: &MouseEvent,
        x: f32,
        y: f32,
    ) -> Result<Option<Dispatched>, WorldviewError> {
        let Some(ray) = self.ctx.raycast(x, y) else {
            debug!(?kind, "pointer event before initialization ignored");
            return Ok(None);
        };
        let event = MouseEvent { kind, ..*event };
        let mut propagation = Propagation::default();

        if self.config.hitmap_disabled_for(kind) {
            let info = ClickInfo {
                ray,
                objects: Vec::new(),
            };
            if let Some(handler) = self.global.get(kind) {
                invoke(handler, &event, &info, &mut propagation);
            }
            return Ok(Some(Dispatched {
                kind,
                info,
                stopped: propagation.is_stopped(),
            }));
        }

        let hits = self
            .ctx
            .read_hitmap(
                x,
                y,
                self.config.enable_stacked_object_events,
                self.config.max_stacked_object_count,
            )
            .await?;
        let info = ClickInfo {
            ray,
            objects: hits.iter().map(|(object, _)| object.clone()).collect(),
        };
        if let Some(handler) = self.global.get(kind) {
            invoke(handler, &event, &info, &mut propagation);
        }
        if !propagation.is_stopped() {
            for (instance, objects) in group_by_instance(&hits) {
                let Some(mounted) = self.elements.iter().find(|m| m.instance == instance) else {
                    continue;
                };
                let Some(handler) = mounted.handlers.get(kind) else {
                    continue;
                };
                let own = ClickInfo { ray, objects };
                invoke(handler, &event, &own, &mut propagation);
                if propagation.is_stopped() {
                    break;
                }
            }
        }
        Ok(Some(Dispatched {
            kind,
            info,
            stopped: propagation.is_stopped(),
        }))
    }

    /// A mouseup seen by the window, possibly outside the canvas.
    pub fn window_mouse_up(&mut self, inside: bool) {
        self.listener.on_window_mouse_up(inside);
        if !inside {
            self.clicks.cancel();
        }
    }

    pub fn key_down(&mut self, event: &KeyEvent) -> KeyOutcome {
        if self.is_fixed_camera() {
            return KeyOutcome::Ignored;
        }
        self.listener.on_key_down(event)
    }

    pub fn key_up(&mut self, event: &KeyEvent) {
        self.listener.on_key_up(event);
    }

    pub fn wheel(&mut self, event: &WheelEvent) -> bool {
        if self.is_fixed_camera() {
            return false;
        }
        self.listener.on_wheel(event, self.ctx.camera_store_mut())
    }

    /// Focus left the canvas: release every held key and button.
    pub fn blur(&mut self) {
        self.listener.on_blur();
        self.listener.on_window_mouse_up(false);
        self.clicks.cancel();
    }

    /// Whether the host should keep requesting frames.
    pub fn wants_frame(&self) -> bool {
        self.listener.is_animating() || self.ctx.is_paint_pending()
    }

    /// Advance held-key motion and run a due paint. Returns whether a
    /// paint ran.
    pub fn frame(&mut self, timestamp_ms: f64, now: Instant) -> bool {
        if self.listener.is_animating() {
            self.listener.on_frame(timestamp_ms, self.ctx.camera_store_mut());
        }
        self.ctx.tick(now)
    }

    pub fn paint(&mut self) {
        self.ctx.paint();
    }

    /// Debug counters as text when `show_debug` is set.
    pub fn debug_report(&self) -> Result<Option<String>, WorldviewError> {
        if !self.config.show_debug {
            return Ok(None);
        }
        let stats = self.ctx.debug_stats()?;
        Ok(Some(StatsReport::new(&stats).to_string()))
    }
}

impl<G: Gpu> std::fmt::Debug for Worldview<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worldview")
            .field("ctx", &self.ctx)
            .field("elements", &self.elements.iter().map(|m| &m.key).collect::<Vec<_>>())
            .field("controlled", &self.is_controlled())
            .finish()
    }
}

fn invoke(handler: &MouseHandler, event: &MouseEvent, info: &ClickInfo, propagation: &mut Propagation) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(event, info, propagation)));
    if result.is_err() {
        error!(kind = ?event.kind, "mouse handler panicked; continuing with the next handler");
    }
}

/// Hits grouped by owning instance, in order of each instance's nearest hit.
fn group_by_instance(hits: &[HitmapHit]) -> Vec<(InstanceId, Vec<MouseEventObject>)> {
    let mut groups: Vec<(InstanceId, Vec<MouseEventObject>)> = Vec::new();
    for (object, instance) in hits {
        match groups.iter_mut().find(|(i, _)| i == instance) {
            Some((_, objects)) => objects.push(object.clone()),
            None => groups.push((*instance, vec![object.clone()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::f32::consts::{FRAC_PI_2, PI};
    use std::sync::Arc;
    use std::time::Duration;
    use worldview_common::{Marker, MarkerRef};
    use worldview_commands::Cubes;
    use worldview_input::Modifiers;
    use worldview_render::HeadlessGpu;

    fn looking_down_y() -> PartialCameraState {
        PartialCameraState {
            phi: Some(FRAC_PI_2),
            theta_offset: Some(PI),
            ..Default::default()
        }
    }

    fn host(config: WorldviewConfig) -> Worldview<HeadlessGpu> {
        let mut wv = Worldview::new(config, Dimensions::new(300.0, 300.0));
        wv.initialize(HeadlessGpu::new()).unwrap();
        wv
    }

    fn uncontrolled() -> WorldviewConfig {
        WorldviewConfig {
            default_camera_state: Some(looking_down_y()),
            ..Default::default()
        }
    }

    fn cube(y: f32) -> MarkerRef {
        Marker::at(Vec3::new(0.0, y, 0.0)).with_scale(Vec3::ONE).shared()
    }

    fn mouse(kind: MouseEventKind, x: f32, y: f32) -> MouseEvent {
        MouseEvent::new(kind, MouseButton::Left, x, y)
    }

    fn click_at(wv: &mut Worldview<HeadlessGpu>, x: f32, y: f32) -> Vec<Dispatched> {
        let mut all = pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseDown, x, y))).unwrap();
        all.extend(pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseUp, x, y))).unwrap());
        all
    }

    fn kinds(dispatched: &[Dispatched]) -> Vec<MouseEventKind> {
        dispatched.iter().map(|d| d.kind).collect()
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn logger(log: &Log, name: &'static str) -> impl Fn(&MouseEvent, &ClickInfo, &mut Propagation) + 'static {
        let log = log.clone();
        move |_, info, _| log.borrow_mut().push(format!("{name}:{}", info.objects.len()))
    }

    #[test]
    fn center_click_picks_the_cube() {
        let mut wv = host(uncontrolled());
        let target = cube(0.0);
        wv.render(vec![Element::new("cubes", Rc::new(Cubes)).with_markers(vec![target.clone()])])
            .unwrap();
        let dispatched = click_at(&mut wv, 150.0, 150.0);
        assert_eq!(
            kinds(&dispatched),
            vec![MouseEventKind::MouseDown, MouseEventKind::MouseUp, MouseEventKind::Click]
        );
        let click = &dispatched[2].info;
        assert!((click.ray.origin - Vec3::new(0.0, 75.0, 0.0)).length() < 1e-2);
        assert!((click.ray.dir - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-3);
        assert_eq!(click.objects.len(), 1);
        assert!(Arc::ptr_eq(&click.objects[0].object, &target));
    }

    #[test]
    fn stacked_cubes_are_reported_front_to_back() {
        let mut wv = host(WorldviewConfig {
            enable_stacked_object_events: true,
            ..uncontrolled()
        });
        let (near, far) = (cube(0.0), cube(-5.0));
        wv.render(vec![
            Element::new("cubes", Rc::new(Cubes)).with_markers(vec![far.clone(), near.clone()]),
        ])
        .unwrap();
        let dispatched = click_at(&mut wv, 150.0, 150.0);
        let objects = &dispatched.last().unwrap().info.objects;
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].object.pose.position, near.pose.position);
        assert_eq!(objects[1].object.pose.position, far.pose.position);
    }

    #[test]
    fn miss_reports_no_objects() {
        let mut wv = host(uncontrolled());
        wv.render(vec![Element::new("cubes", Rc::new(Cubes)).with_markers(vec![cube(0.0)])])
            .unwrap();
        let dispatched = click_at(&mut wv, 10.0, 10.0);
        assert_eq!(dispatched.len(), 3);
        assert!(dispatched[2].info.objects.is_empty());
    }

    #[test]
    fn global_handler_runs_before_element_handlers() {
        let log: Log = Rc::default();
        let mut wv = host(WorldviewConfig {
            enable_stacked_object_events: true,
            ..uncontrolled()
        });
        wv.set_global_handler(MouseEventKind::Click, logger(&log, "global"));
        wv.render(vec![
            Element::new("near", Rc::new(Cubes))
                .with_markers(vec![cube(0.0)])
                .on(MouseEventKind::Click, logger(&log, "near")),
            Element::new("far", Rc::new(Cubes))
                .with_markers(vec![cube(-5.0), cube(-10.0)])
                .on(MouseEventKind::Click, logger(&log, "far")),
        ])
        .unwrap();
        click_at(&mut wv, 150.0, 150.0);
        assert_eq!(*log.borrow(), vec!["global:3", "near:1", "far:2"]);
    }

    #[test]
    fn stop_propagation_skips_later_handlers() {
        let log: Log = Rc::default();
        let mut wv = host(WorldviewConfig {
            enable_stacked_object_events: true,
            ..uncontrolled()
        });
        wv.set_global_handler(MouseEventKind::Click, logger(&log, "global"));
        let near_log = log.clone();
        wv.render(vec![
            Element::new("near", Rc::new(Cubes))
                .with_markers(vec![cube(0.0)])
                .on(MouseEventKind::Click, move |_, _, propagation| {
                    near_log.borrow_mut().push("near".into());
                    propagation.stop_propagation();
                }),
            Element::new("far", Rc::new(Cubes))
                .with_markers(vec![cube(-5.0)])
                .on(MouseEventKind::Click, logger(&log, "far")),
        ])
        .unwrap();
        let dispatched = click_at(&mut wv, 150.0, 150.0);
        assert_eq!(*log.borrow(), vec!["global:2", "near"]);
        assert!(dispatched.last().unwrap().stopped);
    }

    #[test]
    fn panicking_handler_does_not_break_dispatch() {
        let log: Log = Rc::default();
        let mut wv = host(uncontrolled());
        wv.set_global_handler(MouseEventKind::Click, |_, _, _| panic!("handler bug"));
        wv.render(vec![
            Element::new("cubes", Rc::new(Cubes))
                .with_markers(vec![cube(0.0)])
                .on(MouseEventKind::Click, logger(&log, "cubes")),
        ])
        .unwrap();
        click_at(&mut wv, 150.0, 150.0);
        click_at(&mut wv, 150.0, 150.0);
        assert_eq!(*log.borrow(), vec!["cubes:1", "cubes:1"]);
    }

    #[test]
    fn mouse_move_skips_the_hitmap_by_default() {
        let log: Log = Rc::default();
        let mut wv = host(uncontrolled());
        wv.set_global_handler(MouseEventKind::MouseMove, logger(&log, "move"));
        wv.render(vec![Element::new("cubes", Rc::new(Cubes)).with_markers(vec![cube(0.0)])])
            .unwrap();
        let dispatched =
            pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseMove, 150.0, 150.0))).unwrap();
        assert_eq!(dispatched.len(), 1);
        assert!(dispatched[0].info.objects.is_empty());
        assert_eq!(*log.borrow(), vec!["move:0"]);

        wv.config.disable_hitmap_for_events.clear();
        let dispatched =
            pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseMove, 150.0, 150.0))).unwrap();
        assert_eq!(dispatched[0].info.objects.len(), 1);
    }

    #[test]
    fn drag_is_not_a_click_and_pans_the_camera() {
        let mut wv = host(uncontrolled());
        let before = wv.camera_state();
        pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseDown, 150.0, 150.0))).unwrap();
        pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseMove, 200.0, 150.0))).unwrap();
        let up = pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseUp, 200.0, 150.0))).unwrap();
        assert_eq!(kinds(&up), vec![MouseEventKind::MouseUp]);
        assert_ne!(wv.camera_state().target_offset, before.target_offset);
    }

    #[test]
    fn camera_input_schedules_a_debounced_paint() {
        let mut wv = host(uncontrolled());
        let paints = wv.context().counters().paints;
        let now = Instant::now() + Duration::from_secs(1);
        wv.frame(0.0, now);
        assert!(wv.wheel(&WheelEvent::new(0.0, 10.0)));
        assert!(wv.wants_frame());
        assert!(!wv.frame(16.0, now));
        assert!(wv.frame(32.0, now + Duration::from_millis(20)));
        assert_eq!(wv.context().counters().paints, paints + 1);
    }

    #[test]
    fn fixed_camera_ignores_input() {
        let mut wv = host(WorldviewConfig {
            camera_state: Some(looking_down_y()),
            ..Default::default()
        });
        assert!(wv.is_fixed_camera());
        let before = wv.camera_state();
        assert!(!wv.wheel(&WheelEvent::new(0.0, 10.0)));
        assert_eq!(wv.key_down(&KeyEvent::new("KeyW")), KeyOutcome::Ignored);
        pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseDown, 150.0, 150.0))).unwrap();
        pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseMove, 250.0, 150.0))).unwrap();
        assert_eq!(wv.camera_state(), before);
    }

    #[test]
    fn controlled_camera_reports_changes() {
        let seen: Rc<RefCell<Vec<CameraState>>> = Rc::default();
        let sink = seen.clone();
        let mut wv = host(WorldviewConfig {
            camera_state: Some(looking_down_y()),
            ..Default::default()
        });
        wv.set_on_camera_state_change(move |state| sink.borrow_mut().push(*state));
        assert!(!wv.is_fixed_camera());
        assert!(wv.wheel(&WheelEvent::new(0.0, 10.0)));
        assert_eq!(seen.borrow().len(), 1);

        let reported = seen.borrow()[0];
        wv.set_camera_state(&reported.into());
        assert_eq!(wv.camera_state(), reported);
    }

    #[test]
    fn propagation_stop_on_mouse_down_keeps_the_camera_still() {
        let mut wv = host(WorldviewConfig {
            disable_hitmap_for_events: vec![MouseEventKind::MouseDown, MouseEventKind::MouseMove],
            ..uncontrolled()
        });
        wv.set_global_handler(MouseEventKind::MouseDown, |_, _, p| p.stop_propagation());
        let before = wv.camera_state();
        pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseDown, 150.0, 150.0))).unwrap();
        pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseMove, 250.0, 150.0))).unwrap();
        assert_eq!(wv.camera_state(), before);
    }

    #[test]
    fn other_buttons_only_drive_the_camera() {
        let mut wv = host(uncontrolled());
        let down = MouseEvent::new(MouseEventKind::MouseDown, MouseButton::Right, 150.0, 150.0);
        assert!(pollster::block_on(wv.handle_mouse(&down)).unwrap().is_empty());
        let before = wv.camera_state();
        let drag = MouseEvent::new(MouseEventKind::MouseMove, MouseButton::Right, 200.0, 150.0)
            .with_modifiers(Modifiers::NONE);
        pollster::block_on(wv.handle_mouse(&drag)).unwrap();
        assert_ne!(wv.camera_state().theta_offset, before.theta_offset);
    }

    #[test]
    fn render_reconciles_by_key() {
        let mut wv = host(uncontrolled());
        let cubes = || Element::new("cubes", Rc::new(Cubes)).with_markers(vec![cube(0.0)]);
        wv.render(vec![cubes(), Element::new("more", Rc::new(Cubes))]).unwrap();
        assert_eq!(wv.context().debug_stats().unwrap().draw_calls, 2);
        let first = wv.elements[0].instance;

        wv.render(vec![cubes(), cubes()]).unwrap();
        assert_eq!(wv.context().debug_stats().unwrap().draw_calls, 1);
        assert_eq!(wv.elements[0].instance, first);

        wv.render(Vec::new()).unwrap();
        let stats = wv.context().debug_stats().unwrap();
        assert_eq!((stats.draw_calls, stats.hitmap_calls), (0, 0));
        assert!(click_at(&mut wv, 150.0, 150.0)[2].info.objects.is_empty());
    }

    #[test]
    fn canvas_offset_is_subtracted() {
        let mut wv = host(uncontrolled());
        wv.set_dimension(Dimensions {
            left: 100.0,
            top: 50.0,
            ..Dimensions::new(300.0, 300.0)
        });
        wv.render(vec![Element::new("cubes", Rc::new(Cubes)).with_markers(vec![cube(0.0)])])
            .unwrap();
        assert_eq!(click_at(&mut wv, 250.0, 200.0)[2].info.objects.len(), 1);
    }

    #[test]
    fn debug_report_follows_config() {
        let wv = host(uncontrolled());
        assert!(wv.debug_report().unwrap().is_none());
        let wv = host(WorldviewConfig {
            show_debug: true,
            ..uncontrolled()
        });
        assert!(wv.debug_report().unwrap().unwrap().contains("paints"));
    }

    #[test]
    fn surface_size_applies_resolution_scale() {
        let wv: Worldview<HeadlessGpu> = Worldview::new(
            WorldviewConfig {
                resolution_scale: 2.0,
                ..Default::default()
            },
            Dimensions::new(300.0, 200.0),
        );
        assert_eq!(wv.surface_size(), (600, 400));
    }

    #[test]
    fn events_before_initialize_are_ignored() {
        let mut wv: Worldview<HeadlessGpu> = Worldview::new(uncontrolled(), Dimensions::new(300.0, 300.0));
        let dispatched =
            pollster::block_on(wv.handle_mouse(&mouse(MouseEventKind::MouseDown, 150.0, 150.0))).unwrap();
        assert!(dispatched.is_empty());
    }
}
