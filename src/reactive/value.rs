//! Reactive value wrappers.
//!
//! A [`Value`] is either a plain static value or a [`Prop`]: a getter with an
//! optional write-back setter. Consumers read through [`Value::collapse`] and
//! never care which kind they hold. Reads inside a tracking context subscribe
//! to whatever the getter touches.

use std::fmt;
use std::rc::Rc;

use spark_signals::Signal;

// =============================================================================
// Prop
// =============================================================================

/// Getter with an optional setter.
pub struct Prop<T> {
    get: Rc<dyn Fn() -> T>,
    set: Option<Rc<dyn Fn(T)>>,
}

impl<T> Clone for Prop<T> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<T: 'static> Prop<T> {
    /// Read-only prop.
    pub fn getter(get: impl Fn() -> T + 'static) -> Self {
        Self {
            get: Rc::new(get),
            set: None,
        }
    }

    /// Read/write prop.
    pub fn binding(get: impl Fn() -> T + 'static, set: impl Fn(T) + 'static) -> Self {
        Self {
            get: Rc::new(get),
            set: Some(Rc::new(set)),
        }
    }

    pub fn get(&self) -> T {
        (self.get)()
    }

    /// Write through the setter.
    ///
    /// Returns `false` (and logs) when the prop is read-only; the write is
    /// dropped.
    pub fn set(&self, value: T) -> bool {
        match &self.set {
            Some(set) => {
                set(value);
                true
            }
            None => {
                tracing::warn!("write to a read-only reactive value ignored");
                false
            }
        }
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.get) as *const () as usize
    }
}

impl<T> fmt::Debug for Prop<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prop")
            .field("writable", &self.set.is_some())
            .finish()
    }
}

/// Two-way binding to a signal.
impl<T: Clone + PartialEq + 'static> From<Signal<T>> for Prop<T> {
    fn from(signal: Signal<T>) -> Self {
        let reader = signal.clone();
        Prop::binding(move || reader.get(), move |v| {
            signal.set(v);
        })
    }
}

// =============================================================================
// Value
// =============================================================================

/// Static or reactive value.
#[derive(Clone, Debug)]
pub enum Value<T: 'static> {
    Static(T),
    Dynamic(Prop<T>),
}

impl<T: Clone + 'static> Value<T> {
    /// Current value; tracked when read inside an effect or derived.
    pub fn collapse(&self) -> T {
        match self {
            Value::Static(v) => v.clone(),
            Value::Dynamic(p) => p.get(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Value::Dynamic(_))
    }

    /// Write through a dynamic value's setter. Static values and read-only
    /// props refuse the write.
    pub fn set(&self, value: T) -> bool {
        match self {
            Value::Static(_) => false,
            Value::Dynamic(p) => p.set(value),
        }
    }
}

/// Free-function form of [`Value::collapse`].
pub fn collapse<T: Clone + 'static>(value: &Value<T>) -> T {
    value.collapse()
}

impl<T: Clone + Default + 'static> Default for Value<T> {
    fn default() -> Self {
        Value::Static(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Value::Static(value)
    }
}

impl<T: Clone + PartialEq + 'static> From<Signal<T>> for Value<T> {
    fn from(signal: Signal<T>) -> Self {
        Value::Dynamic(signal.into())
    }
}

impl<T: Clone + PartialEq + 'static> From<Prop<T>> for Value<T> {
    fn from(prop: Prop<T>) -> Self {
        Value::Dynamic(prop)
    }
}

// =============================================================================
// Tests
// =============================================================================
