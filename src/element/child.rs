//! Child inputs accepted by descriptors and components.

use std::fmt;
use std::rc::Rc;

use spark_signals::Signal;

use super::Descriptor;
use crate::dom::Node;
use crate::reactive::Value;
use crate::types::AttrValue;

/// Item callback of a `for` descriptor: item value and reactive index.
pub type EachFn = Rc<dyn Fn(AttrValue, Value<usize>) -> Child>;

/// One child slot.
#[derive(Clone, Default)]
pub enum Child {
    #[default]
    Empty,
    Text(Rc<str>),
    Node(Node),
    Descriptor(Descriptor),
    List(Vec<Child>),
    /// Re-read on every pipeline pass.
    Dynamic(Rc<dyn Fn() -> Child>),
    /// Only valid as the single child of `for`.
    Each(EachFn),
}

impl Child {
    pub fn text(text: impl Into<String>) -> Self {
        Child::Text(Rc::from(text.into()))
    }

    pub fn dynamic(f: impl Fn() -> Child + 'static) -> Self {
        Child::Dynamic(Rc::new(f))
    }

    pub fn each(f: impl Fn(AttrValue, Value<usize>) -> Child + 'static) -> Self {
        Child::Each(Rc::new(f))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Child::Empty)
    }
}

impl PartialEq for Child {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Child::Empty, Child::Empty) => true,
            (Child::Text(a), Child::Text(b)) => a == b,
            (Child::Node(a), Child::Node(b)) => a == b,
            (Child::Descriptor(a), Child::Descriptor(b)) => a == b,
            (Child::List(a), Child::List(b)) => a == b,
            (Child::Dynamic(a), Child::Dynamic(b)) => Rc::ptr_eq(a, b),
            (Child::Each(a), Child::Each(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Empty => write!(f, "Empty"),
            Child::Text(t) => write!(f, "Text({:?})", t),
            Child::Node(n) => write!(f, "{:?}", n),
            Child::Descriptor(d) => write!(f, "{:?}", d),
            Child::List(items) => f.debug_list().entries(items).finish(),
            Child::Dynamic(_) => write!(f, "Dynamic"),
            Child::Each(_) => write!(f, "Each"),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Child::text(s)
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Child::text(s)
    }
}

macro_rules! child_from_num {
    ($($t:ty),*) => {
        $(impl From<$t> for Child {
            fn from(n: $t) -> Self {
                Child::from(AttrValue::from(n))
            }
        })*
    };
}

child_from_num!(i32, i64, u32, u64, usize, f64);

impl From<Descriptor> for Child {
    fn from(d: Descriptor) -> Self {
        Child::Descriptor(d)
    }
}

impl From<Node> for Child {
    fn from(n: Node) -> Self {
        Child::Node(n)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

/// Attribute values render as text, nodes or lists; dynamic values stay
/// dynamic.
impl From<AttrValue> for Child {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Null | AttrValue::Bool(_) => Child::Empty,
            AttrValue::Num(_) | AttrValue::Str(_) => Child::text(value.to_text()),
            AttrValue::List(items) => Child::List(items.iter().cloned().map(Child::from).collect()),
            AttrValue::Node(n) => Child::Node(n),
            AttrValue::Ref(r) => r.get().map_or(Child::Empty, Child::Node),
            AttrValue::Dynamic(prop) => Child::dynamic(move || Child::from(prop.get())),
            other => {
                tracing::warn!(found = other.type_name(), "value is not renderable as a child");
                Child::Empty
            }
        }
    }
}

/// A signal child renders its current value and follows changes.
impl<T> From<Signal<T>> for Child
where
    T: Clone + PartialEq + Into<AttrValue> + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Child::dynamic(move || {
            let value: AttrValue = signal.get().into();
            Child::from(value)
        })
    }
}
