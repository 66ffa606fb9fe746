use crate::command::InstanceId;
use worldview_common::{Color, MarkerRef};

/// Object ID encoded into the RGB channels of the hitmap. `0` means nothing.
pub type ObjectHitmapId = u32;

/// Largest ID that fits in 24 bits of color.
pub const MAX_OBJECT_ID: ObjectHitmapId = (1 << 24) - 1;

/// Color a hitmap pixel takes for `id`: R, G, B hold the high, middle and low
/// bytes, alpha is always opaque.
pub fn int_to_rgb(id: ObjectHitmapId) -> Color {
    let r = ((id >> 16) & 0xff) as f32 / 255.0;
    let g = ((id >> 8) & 0xff) as f32 / 255.0;
    let b = (id & 0xff) as f32 / 255.0;
    Color::new(r, g, b, 1.0)
}

/// Inverse of [`int_to_rgb`]; channels are rounded back to whole bytes.
pub fn get_id_from_color(color: Color) -> ObjectHitmapId {
    let byte = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u32;
    (byte(color.r) << 16) | (byte(color.g) << 8) | byte(color.b)
}

/// ID stored in an RGBA8 pixel read back from the hitmap.
pub fn get_id_from_pixel(pixel: &[u8]) -> ObjectHitmapId {
    match pixel {
        [r, g, b, ..] => ((*r as u32) << 16) | ((*g as u32) << 8) | *b as u32,
        _ => 0,
    }
}

/// What a block of freshly assigned IDs resolves to.
#[derive(Debug, Clone)]
pub enum HitmapCallback {
    /// One ID for the whole object.
    Single(MarkerRef),
    /// `count` consecutive IDs, one per instance of the object.
    Instanced { object: MarkerRef, count: usize },
}

/// A picked object, plus the instance that was hit when it was drawn instanced.
#[derive(Debug, Clone)]
pub struct MouseEventObject {
    pub object: MarkerRef,
    pub instance_index: Option<usize>,
}

impl MouseEventObject {
    pub fn new(object: MarkerRef, instance_index: Option<usize>) -> Self {
        Self {
            object,
            instance_index,
        }
    }

    /// Whether this names `object` (by identity, not by value).
    pub fn is(&self, object: &MarkerRef) -> bool {
        std::sync::Arc::ptr_eq(&self.object, object)
    }
}

/// Objects compare by identity and instance index.
impl PartialEq for MouseEventObject {
    fn eq(&self, other: &Self) -> bool {
        self.is(&other.object) && self.instance_index == other.instance_index
    }
}

#[derive(Debug, Clone)]
struct Entry {
    object: MouseEventObject,
    owner: InstanceId,
}

/// Hands out contiguous blocks of hitmap IDs and maps them back to objects.
///
/// IDs start at 1 and are only valid until the next [`reset`](Self::reset);
/// every hitmap pass starts from scratch. Once the ID space is used up no
/// further IDs are handed out, so an ID never names two objects.
#[derive(Debug)]
pub struct HitmapObjectIdManager {
    entries: Vec<Entry>,
    max_id: ObjectHitmapId,
}

impl Default for HitmapObjectIdManager {
    fn default() -> Self {
        Self::with_max_id(MAX_OBJECT_ID)
    }
}

impl HitmapObjectIdManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager that stops at `max_id` instead of [`MAX_OBJECT_ID`].
    pub fn with_max_id(max_id: ObjectHitmapId) -> Self {
        Self {
            entries: Vec::new(),
            max_id: max_id.min(MAX_OBJECT_ID),
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Number of IDs handed out since the last reset.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reserve IDs for `callback` on behalf of the draw call `owner` and
    /// return their colors, one per ID.
    pub fn assign_next_colors(&mut self, owner: InstanceId, callback: HitmapCallback) -> Vec<Color> {
        self.assign_next_ids(owner, callback)
            .into_iter()
            .map(int_to_rgb)
            .collect()
    }

    /// Reserve IDs for `callback` on behalf of the draw call `owner`.
    ///
    /// Returns fewer IDs than requested (possibly none) when the ID space runs
    /// out; the objects or instances left without an ID are not pickable.
    pub fn assign_next_ids(
        &mut self,
        owner: InstanceId,
        callback: HitmapCallback,
    ) -> Vec<ObjectHitmapId> {
        let requested = match &callback {
            HitmapCallback::Single(_) => 1,
            HitmapCallback::Instanced { count, .. } => *count,
        };
        let available = (self.max_id as usize).saturating_sub(self.entries.len());
        let granted = requested.min(available);
        if granted < requested {
            tracing::error!(
                requested,
                granted,
                assigned = self.entries.len(),
                "hitmap id space exhausted; extra objects will not be pickable"
            );
        }
        let first = self.entries.len() as ObjectHitmapId + 1;
        match callback {
            HitmapCallback::Single(object) => self.entries.extend(
                (0..granted).map(|_| Entry {
                    object: MouseEventObject::new(object.clone(), None),
                    owner,
                }),
            ),
            HitmapCallback::Instanced { object, .. } => {
                self.entries.extend((0..granted).map(|i| Entry {
                    object: MouseEventObject::new(object.clone(), Some(i)),
                    owner,
                }))
            }
        }
        (0..granted as ObjectHitmapId).map(|i| first + i).collect()
    }

    pub fn get_object_by_id(&self, id: ObjectHitmapId) -> Option<MouseEventObject> {
        self.entry(id).map(|e| e.object.clone())
    }

    /// Draw call that registered `id`.
    pub fn get_owner(&self, id: ObjectHitmapId) -> Option<InstanceId> {
        self.entry(id).map(|e| e.owner)
    }

    fn entry(&self, id: ObjectHitmapId) -> Option<&Entry> {
        if id == 0 {
            return None;
        }
        self.entries.get(id as usize - 1)
    }
}
