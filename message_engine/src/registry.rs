//! Extension registry and memoized per-type descriptors.
//!
//! The registry is process-wide state keyed by message full name. Each
//! registration appends a constructor callback and bumps the type's
//! generation. A `DescriptorCell` rebuilds its descriptor only when it
//! was built against another registry or at a generation that is behind,
//! so repeated `descriptor()` calls return the same `Arc`.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::descriptor::MessageDescriptor;
use crate::error::ProtoError;
use crate::field::FieldDescriptor;

/// Constructor callback producing one extension field.
pub type ExtensionCtor = Arc<dyn Fn() -> FieldDescriptor + Send + Sync>;

#[derive(Default)]
struct TypeExtensions {
    generation: u64,
    ctors: Vec<ExtensionCtor>,
    numbers: BTreeSet<u32>,
}

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Extension constructors per message type, in registration order.
pub struct ExtensionRegistry {
    id: u64,
    types: RwLock<HashMap<String, TypeExtensions>>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            types: RwLock::default(),
        }
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of this registry; unique within the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The process-wide registry used by generated types.
    pub fn global() -> &'static ExtensionRegistry {
        static GLOBAL: OnceLock<ExtensionRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ExtensionRegistry::new)
    }

    /// Append an extension constructor for `type_name`.
    ///
    /// The callback runs once here to check that its number does not
    /// collide with earlier extensions of the same type; after that it is
    /// only evaluated when the descriptor is rebuilt. Returns the type's
    /// new generation.
    pub fn register<F>(&self, type_name: &str, ctor: F) -> Result<u64, ProtoError>
    where
        F: Fn() -> FieldDescriptor + Send + Sync + 'static,
    {
        let number = ctor().number();
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        let entry = types.entry(type_name.to_string()).or_default();
        if !entry.numbers.insert(number) {
            return Err(ProtoError::DuplicateFieldNumber {
                message: type_name.to_string(),
                number,
            });
        }
        entry.ctors.push(Arc::new(ctor));
        entry.generation += 1;
        log::debug!(
            "registered extension field {} for {} (generation {})",
            number,
            type_name,
            entry.generation
        );
        Ok(entry.generation)
    }

    /// Number of registrations seen for `type_name`; 0 if none.
    pub fn generation(&self, type_name: &str) -> u64 {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types.get(type_name).map(|t| t.generation).unwrap_or(0)
    }

    /// Generation and constructors of `type_name`, read atomically.
    pub fn snapshot(&self, type_name: &str) -> (u64, Vec<ExtensionCtor>) {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        match types.get(type_name) {
            Some(t) => (t.generation, t.ctors.clone()),
            None => (0, Vec::new()),
        }
    }

    pub fn extension_count(&self, type_name: &str) -> usize {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types.get(type_name).map(|t| t.ctors.len()).unwrap_or(0)
    }
}

/// Build `base`, then append every extension in registration order.
///
/// Extensions that collide with a base field are skipped with a warning;
/// `GeneratedMessage::register_extension` rejects them before they get
/// here.
pub fn build_with_extensions(
    base: fn() -> MessageDescriptor,
    ctors: &[ExtensionCtor],
) -> MessageDescriptor {
    let mut descriptor = base();
    for ctor in ctors {
        if let Err(err) = descriptor.add_field(ctor(), true) {
            log::warn!("skipping extension for {}: {}", descriptor.full_name(), err);
        }
    }
    descriptor
}

struct Built {
    registry: u64,
    generation: u64,
    descriptor: Arc<MessageDescriptor>,
}

impl Built {
    fn current_for(&self, registry: u64, generation: u64) -> Option<Arc<MessageDescriptor>> {
        (self.registry == registry && self.generation >= generation)
            .then(|| Arc::clone(&self.descriptor))
    }
}

/// Memoized descriptor of one generated type.
///
/// The memo is keyed by the registry it was built against; resolving
/// against a different registry rebuilds.
pub struct DescriptorCell {
    full_name: &'static str,
    base: fn() -> MessageDescriptor,
    slot: RwLock<Option<Built>>,
}

impl DescriptorCell {
    pub const fn new(full_name: &'static str, base: fn() -> MessageDescriptor) -> Self {
        Self {
            full_name,
            base,
            slot: RwLock::new(None),
        }
    }

    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// Current descriptor, resolved against the global registry.
    pub fn get(&self) -> Arc<MessageDescriptor> {
        self.get_in(ExtensionRegistry::global())
    }

    /// Current descriptor, resolved against `registry`.
    ///
    /// Builds outside the lock; if another thread published first, its
    /// descriptor wins and ours is dropped.
    pub fn get_in(&self, registry: &ExtensionRegistry) -> Arc<MessageDescriptor> {
        let wanted = registry.generation(self.full_name);
        {
            let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = slot.as_ref().and_then(|b| b.current_for(registry.id, wanted)) {
                return hit;
            }
        }

        let (generation, ctors) = registry.snapshot(self.full_name);
        let built = Arc::new(build_with_extensions(self.base, &ctors));

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = slot.as_ref().and_then(|b| b.current_for(registry.id, generation)) {
            return hit;
        }
        log::debug!(
            "built descriptor {} at generation {} ({} fields, fingerprint {})",
            self.full_name,
            generation,
            built.len(),
            built.fingerprint()
        );
        *slot = Some(Built {
            registry: registry.id,
            generation,
            descriptor: Arc::clone(&built),
        });
        built
    }
}
