//! Intrusively reference-counted objects.
//!
//! Every entity in a scene graph implements [`Object`] and embeds an
//! [`ObjectBase`] carrying its atomic reference count. Objects are only ever
//! reached through [`Ref`], whose clone acquires and whose drop releases a
//! reference. Because the count lives inside the object, a plain `&self`
//! borrow can be upgraded back into an owning handle, which is how interface
//! casts (`Ref<dyn Object>` to `Ref<dyn Shape<V>>`) are implemented.
//!
//! There is no cycle collector. Owning edges point from parents to children;
//! edges pointing back up the graph use [`BackRef`] and never keep anything
//! alive.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicI32, AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::properties::Properties;
use crate::traverse::TraversalCallback;
use crate::variant::{Variant, VariantId};

/// Process-unique identity of an object, independent of its scene id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State shared by every object: reference count, identity and variant tag.
pub struct ObjectBase {
    ref_count: AtomicI32,
    object_id: ObjectId,
    id: Option<String>,
    variant: Option<VariantId>,
}

impl ObjectBase {
    /// Base for an object built from `props`; takes over its `"id"` entry.
    pub fn new(props: &Properties) -> Self {
        Self::with_id(props.id().map(str::to_owned), None)
    }

    /// Like [`ObjectBase::new`], tagged with the variant `V`.
    pub fn for_variant<V: Variant>(props: &Properties) -> Self {
        Self::with_id(props.id().map(str::to_owned), Some(V::ID))
    }

    /// Base for an object created programmatically without properties.
    pub fn anonymous() -> Self {
        Self::with_id(None, None)
    }

    pub fn with_id(id: Option<String>, variant: Option<VariantId>) -> Self {
        Self {
            ref_count: AtomicI32::new(0),
            object_id: ObjectId::next(),
            id,
            variant,
        }
    }

    pub fn ref_count(&self) -> i32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn variant(&self) -> Option<VariantId> {
        self.variant
    }

    fn inc_ref(&self) {
        self.ref_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the count and return the value it had before.
    fn dec_ref(&self) -> i32 {
        let previous = self.ref_count.fetch_sub(1, Ordering::Release);
        if previous <= 0 {
            log::error!(
                "reference count of object {} ({:?}) dropped below zero: double release",
                self.object_id,
                self.id
            );
            std::process::abort();
        }
        previous
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBase")
            .field("object_id", &self.object_id)
            .field("id", &self.id)
            .field("variant", &self.variant)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Base trait of every plugin and scene-graph entity.
///
/// Implementations normally generate the identity methods with
/// [`impl_object!`](crate::impl_object) and override the hooks they need.
pub trait Object: Send + Sync + 'static {
    fn base(&self) -> &ObjectBase;

    /// Registered class name, e.g. `"sphere"`.
    fn class_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Return a boxed `Ref<I>` for the interface whose `TypeId` is `iface`,
    /// or `None` if this object does not implement it.
    fn query_interface(&self, _iface: TypeId) -> Option<Box<dyn Any>> {
        None
    }

    /// Objects this one stands in for. An empty list means the object itself
    /// is the construction result.
    fn expand(&self) -> Vec<Ref<dyn Object>> {
        Vec::new()
    }

    /// Publish tunable parameters and child objects.
    fn traverse(&self, _callback: &mut dyn TraversalCallback) {}

    /// Called after parameters published by `traverse` were edited.
    fn parameters_changed(&self, _keys: &[String]) {}

    fn id(&self) -> Option<&str> {
        self.base().id()
    }

    fn object_id(&self) -> ObjectId {
        self.base().object_id()
    }

    fn variant(&self) -> Option<VariantId> {
        self.base().variant()
    }
}

/// Implement the identity methods of [`Object`] inside an `impl Object` block.
///
/// The implementing type must have a field named `base` of type
/// [`ObjectBase`]. Every listed interface type, and `dyn Object` itself,
/// becomes reachable through [`Ref::cast`].
///
/// ```ignore
/// impl<V: Variant> Object for Sphere<V> {
///     impl_object!("sphere", dyn Shape<V>);
/// }
/// ```
#[macro_export]
macro_rules! impl_object {
    ($name:expr $(, $iface:ty)* $(,)?) => {
        fn base(&self) -> &$crate::object::ObjectBase {
            &self.base
        }

        fn class_name(&self) -> &'static str {
            $name
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn query_interface(
            &self,
            iface: ::std::any::TypeId,
        ) -> ::std::option::Option<::std::boxed::Box<dyn ::std::any::Any>> {
            if iface == ::std::any::TypeId::of::<dyn $crate::object::Object>() {
                let ptr: ::std::ptr::NonNull<dyn $crate::object::Object> =
                    ::std::ptr::NonNull::<Self>::from(self);
                // SAFETY: `ptr` comes from a live borrow of `self`.
                let handle = unsafe { $crate::object::Ref::from_borrowed(ptr) };
                return handle.map(|handle| {
                    ::std::boxed::Box::new(handle) as ::std::boxed::Box<dyn ::std::any::Any>
                });
            }
            $(
                if iface == ::std::any::TypeId::of::<$iface>() {
                    let ptr: ::std::ptr::NonNull<$iface> = ::std::ptr::NonNull::<Self>::from(self);
                    // SAFETY: `ptr` comes from a live borrow of `self`.
                    let handle = unsafe { $crate::object::Ref::from_borrowed(ptr) };
                    return handle.map(|handle| {
                        ::std::boxed::Box::new(handle) as ::std::boxed::Box<dyn ::std::any::Any>
                    });
                }
            )*
            let _ = iface;
            ::std::option::Option::None
        }
    };
}

/// Owning handle to a reference-counted object.
pub struct Ref<T: ?Sized + Object> {
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

// SAFETY: `Object` requires `Send + Sync` and the count is atomic.
unsafe impl<T: ?Sized + Object> Send for Ref<T> {}
unsafe impl<T: ?Sized + Object> Sync for Ref<T> {}

impl<T: Object> Ref<T> {
    /// Move `value` to the heap and take the first reference to it.
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: freshly allocated and uniquely owned.
        unsafe { ptr.as_ref() }.base().inc_ref();
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Erase the concrete type.
    pub fn into_object(this: Self) -> Ref<dyn Object> {
        let ptr: NonNull<dyn Object> = Self::into_raw(this);
        Ref {
            ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Object> Ref<T> {
    /// Upgrade a borrowed object into a new owning handle.
    ///
    /// Returns `None` if the object is not managed by any `Ref` (count 0),
    /// e.g. a value living on the stack.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object for the duration of the call.
    pub unsafe fn from_borrowed(ptr: NonNull<T>) -> Option<Self> {
        let base = ptr.as_ref().base();
        if base.ref_count() <= 0 {
            return None;
        }
        base.inc_ref();
        Some(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    pub fn ref_count(this: &Self) -> i32 {
        this.base().ref_count()
    }

    /// True if both handles point at the same object.
    pub fn ptr_eq<U: ?Sized + Object>(this: &Self, other: &Ref<U>) -> bool {
        this.ptr.as_ptr() as *const () == other.ptr.as_ptr() as *const ()
    }

    /// Give up the handle without releasing its reference.
    pub fn into_raw(this: Self) -> NonNull<T> {
        let ptr = this.ptr;
        std::mem::forget(this);
        ptr
    }

    /// Adopt a reference previously leaked with [`Ref::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_raw` and its reference must not have been
    /// adopted already.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Release this reference without ever freeing the object, even if the
    /// count reaches zero.
    ///
    /// Teardown code that must control the order in which a graph with known
    /// dangling back pointers is freed uses this to drop the count first and
    /// free the memory later with `Box::from_raw` on the returned pointer.
    ///
    /// # Safety
    ///
    /// If the count reached zero the caller owns the allocation and must free
    /// it exactly once; otherwise the object stays alive through the other
    /// handles and the returned pointer must not be freed.
    pub unsafe fn release_no_dealloc(this: Self) -> NonNull<T> {
        let ptr = Self::into_raw(this);
        ptr.as_ref().base().dec_ref();
        ptr
    }

    /// Look up an interface implemented by the object.
    pub fn cast<I: ?Sized + Object>(this: &Self) -> Option<Ref<I>> {
        let boxed = (**this).query_interface(TypeId::of::<I>())?;
        boxed.downcast::<Ref<I>>().ok().map(|handle| *handle)
    }

    /// Erase an interface handle back to `Ref<dyn Object>`.
    ///
    /// Succeeds for every type whose identity methods come from
    /// [`impl_object!`](crate::impl_object).
    pub fn as_object(this: &Self) -> Option<Ref<dyn Object>> {
        Self::cast::<dyn Object>(this)
    }
}

impl Ref<dyn Object> {
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Recover the concrete type, or give the handle back unchanged.
    pub fn downcast<T: Object>(self) -> Result<Ref<T>, Ref<dyn Object>> {
        if self.is::<T>() {
            let ptr = Self::into_raw(self).cast::<T>();
            // SAFETY: the type check above guarantees the pointee is a `T`,
            // and the reference is transferred from `self`.
            Ok(unsafe { Ref::from_raw(ptr) })
        } else {
            Err(self)
        }
    }
}

impl<T: ?Sized + Object> Clone for Ref<T> {
    fn clone(&self) -> Self {
        self.base().inc_ref();
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Object> Drop for Ref<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference, so the object is alive.
        let previous = unsafe { self.ptr.as_ref() }.base().dec_ref();
        if previous == 1 {
            atomic::fence(Ordering::Acquire);
            // SAFETY: the count hit zero, no other handle exists.
            drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        }
    }
}

impl<T: ?Sized + Object> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the object outlives every handle.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized + Object> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("class", &self.class_name())
            .field("id", &self.id())
            .field("object_id", &self.object_id())
            .field("ref_count", &Self::ref_count(self))
            .finish()
    }
}

/// Non-owning link from a child back to the object that owns it.
///
/// Stores the owner's [`ObjectId`] and the child's slot index inside the
/// owner. It is set once, never keeps the owner alive and is only used to
/// navigate from a handle the caller already holds.
#[derive(Debug, Default)]
pub struct BackRef {
    target: OnceLock<(ObjectId, usize)>,
}

impl BackRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point at `owner`. Returns false if the link was already set.
    pub fn set(&self, owner: ObjectId, slot: usize) -> bool {
        self.target.set((owner, slot)).is_ok()
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.target.get().map(|(owner, _)| *owner)
    }

    pub fn slot(&self) -> Option<usize> {
        self.target.get().map(|(_, slot)| *slot)
    }

    pub fn is_set(&self) -> bool {
        self.target.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    trait Named: Object {
        fn name(&self) -> &str;
    }

    struct Probe {
        base: ObjectBase,
        label: String,
        drops: Arc<AtomicUsize>,
    }

    impl Probe {
        fn new(label: &str, drops: &Arc<AtomicUsize>) -> Self {
            Self {
                base: ObjectBase::with_id(Some(label.to_string()), None),
                label: label.to_string(),
                drops: Arc::clone(drops),
            }
        }
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Object for Probe {
        impl_object!("probe", dyn Named);
    }

    impl Named for Probe {
        fn name(&self) -> &str {
            &self.label
        }
    }

    struct Plain {
        base: ObjectBase,
    }

    impl Object for Plain {
        impl_object!("plain");
    }

    #[test]
    fn test_count_starts_at_zero_and_tracks_handles() {
        let drops = Arc::new(AtomicUsize::new(0));
        let probe = Probe::new("p", &drops);
        assert_eq!(probe.base.ref_count(), 0);

        let a = Ref::new(probe);
        assert_eq!(Ref::ref_count(&a), 1);
        let b = a.clone();
        assert_eq!(Ref::ref_count(&a), 2);
        assert!(Ref::ptr_eq(&a, &b));

        drop(b);
        assert_eq!(Ref::ref_count(&a), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_acquire_release_destroys_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let root = Ref::new(Probe::new("shared", &drops));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let handle = root.clone();
                scope.spawn(move || {
                    for _ in 0..1000 {
                        let extra = handle.clone();
                        drop(extra);
                    }
                });
            }
        });
        (0..10_000).into_par_iter().for_each(|_| {
            let _extra = root.clone();
        });

        assert_eq!(Ref::ref_count(&root), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(root);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_erase_and_downcast() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = Ref::into_object(Ref::new(Probe::new("p", &drops)));
        assert_eq!(object.class_name(), "probe");
        assert_eq!(object.id(), Some("p"));
        assert!(object.is::<Probe>());
        assert!(object.downcast_ref::<Plain>().is_none());

        let object = object.downcast::<Plain>().unwrap_err();
        let probe = object.downcast::<Probe>().unwrap();
        assert_eq!(probe.label, "p");
        assert_eq!(Ref::ref_count(&probe), 1);
    }

    #[test]
    fn test_cast_to_interface_shares_the_object() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = Ref::into_object(Ref::new(Probe::new("light", &drops)));

        let named = Ref::cast::<dyn Named>(&object).unwrap();
        assert_eq!(named.name(), "light");
        assert!(Ref::ptr_eq(&named, &object));
        assert_eq!(Ref::ref_count(&object), 2);

        let erased = Ref::as_object(&named).unwrap();
        assert!(Ref::ptr_eq(&erased, &object));
        assert_eq!(Ref::ref_count(&object), 3);
        drop(erased);

        let plain = Ref::into_object(Ref::new(Plain {
            base: ObjectBase::anonymous(),
        }));
        assert!(Ref::cast::<dyn Named>(&plain).is_none());

        drop(object);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(named);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unmanaged_object_cannot_be_upgraded() {
        let drops = Arc::new(AtomicUsize::new(0));
        let probe = Probe::new("stack", &drops);
        assert!(probe.query_interface(TypeId::of::<dyn Named>()).is_none());
    }

    #[test]
    fn test_raw_round_trip_and_release_without_dealloc() {
        let drops = Arc::new(AtomicUsize::new(0));
        let probe = Ref::new(Probe::new("raw", &drops));
        let ptr = Ref::into_raw(probe);
        let probe = unsafe { Ref::from_raw(ptr) };
        assert_eq!(Ref::ref_count(&probe), 1);

        let ptr = unsafe { Ref::release_no_dealloc(probe) };
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(unsafe { ptr.as_ref() }.base.ref_count(), 0);
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_back_ref_is_set_once() {
        let link = BackRef::new();
        assert!(!link.is_set());
        let owner = ObjectId::next();
        assert!(link.set(owner, 3));
        assert!(!link.set(ObjectId::next(), 0));
        assert_eq!(link.owner(), Some(owner));
        assert_eq!(link.slot(), Some(3));
    }
}
