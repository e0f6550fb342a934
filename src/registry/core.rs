use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Callback receiving the new stuck state of one tracked element.
pub type StuckCallback = Rc<dyn Fn(bool)>;

static NEXT_OWNER_SEED: AtomicU64 = AtomicU64::new(0);

/// Identifies one tracked element and both of its sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id in the familiar `8-4-4-4-12` hex layout. Unique within the
    /// process; not reproducible across runs.
    pub fn generate() -> Self {
        let seed = NEXT_OWNER_SEED.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut hasher = blake3::Hasher::new();
        hasher.update(&seed.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        hasher.update(&nanos.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        let hex = hex.as_str();

        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Maps owner ids to their stuck callbacks. Clones share the same map.
///
/// At most one callback is stored per id; a second registration is refused
/// instead of replacing the first.
#[derive(Clone, Default)]
pub struct ObservationRegistry {
    entries: Rc<RefCell<HashMap<OwnerId, StuckCallback>>>,
}

impl ObservationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: OwnerId, callback: StuckCallback) -> bool {
        use std::collections::hash_map::Entry;

        match self.entries.borrow_mut().entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(callback);
                true
            }
        }
    }

    pub fn remove(&self, id: &OwnerId) -> bool {
        self.entries.borrow_mut().remove(id).is_some()
    }

    pub fn contains(&self, id: &OwnerId) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn lookup(&self, id: &OwnerId) -> Option<StuckCallback> {
        self.entries.borrow().get(id).map(Rc::clone)
    }

    /// Invoke the callback registered for `id`, if any.
    ///
    /// The map borrow is released before the callback runs, so the callback
    /// may register or remove entries (including its own).
    pub fn dispatch(&self, id: &OwnerId, stuck: bool) -> bool {
        let Some(callback) = self.lookup(id) else {
            return false;
        };
        callback(stuck);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for ObservationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationRegistry")
            .field("entries", &self.len())
            .finish()
    }
}
