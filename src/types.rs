//! Core types - attribute values, item keys, callbacks and ids.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use spark_signals::Signal;

use crate::dom::{Event, Listener, Node, NodeRef};
use crate::element::Component;
use crate::reactive::Prop;

// =============================================================================
// Cleanup & Callbacks
// =============================================================================

/// Cleanup function registered with the ownership graph.
pub type Cleanup = Box<dyn FnOnce()>;

/// Mount (`use`) hook. Runs as its own effect once the node exists; may
/// return a cleanup that runs before the next run and on unlink.
pub type Hook = Rc<dyn Fn(&Node) -> Option<Cleanup>>;

/// Ordered attribute bag - one layer of an attribute set.
pub type AttrMap = IndexMap<String, AttrValue>;

// =============================================================================
// Ids
// =============================================================================

/// Identity of a descriptor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub(crate) u64);

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Allocate a process-unique id (descriptors and node lists share the counter).
pub(crate) fn next_id() -> u64 {
    NEXT_ID.with(|n| {
        let id = n.get();
        n.set(id + 1);
        id
    })
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

// =============================================================================
// Item Key
// =============================================================================

/// Identity of a list item: value identity for primitives, pointer identity
/// for everything shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Null,
    Bool(bool),
    /// `f64` bit pattern.
    Num(u64),
    Str(Rc<str>),
    Ptr(usize),
}

// =============================================================================
// Attribute Value
// =============================================================================

/// A value carried by an attribute, a prop, a scope entry or a list item.
#[derive(Clone)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    List(Rc<Vec<AttrValue>>),
    Map(Rc<AttrMap>),
    Node(Node),
    /// `this` capture slot.
    Ref(NodeRef),
    /// Event handler (`on:<event>`).
    Handler(Listener),
    /// Mount hook (`use`, `use:<name>`).
    Hook(Hook),
    Component(Component),
    /// Reactive wrapper; read with [`AttrValue::collapse`].
    Dynamic(Prop<AttrValue>),
}

impl AttrValue {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Read-only reactive value.
    pub fn getter(get: impl Fn() -> AttrValue + 'static) -> Self {
        AttrValue::Dynamic(Prop::getter(get))
    }

    /// Reactive value with write-back.
    pub fn binding(
        get: impl Fn() -> AttrValue + 'static,
        set: impl Fn(AttrValue) + 'static,
    ) -> Self {
        AttrValue::Dynamic(Prop::binding(get, set))
    }

    pub fn handler(f: impl Fn(&Event) + 'static) -> Self {
        AttrValue::Handler(Rc::new(f))
    }

    pub fn hook(f: impl Fn(&Node) -> Option<Cleanup> + 'static) -> Self {
        AttrValue::Hook(Rc::new(f))
    }

    pub fn list<T: Into<AttrValue>>(items: impl IntoIterator<Item = T>) -> Self {
        AttrValue::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn map(map: AttrMap) -> Self {
        AttrValue::Map(Rc::new(map))
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve reactive wrappers (recursively) to a plain value.
    ///
    /// Inside a tracking context this subscribes to every wrapper read.
    pub fn collapse(&self) -> AttrValue {
        match self {
            AttrValue::Dynamic(prop) => prop.get().collapse(),
            other => other.clone(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, AttrValue::Dynamic(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Script-style truthiness of the collapsed value.
    pub fn is_truthy(&self) -> bool {
        match self.collapse() {
            AttrValue::Null => false,
            AttrValue::Bool(b) => b,
            AttrValue::Num(n) => n != 0.0 && !n.is_nan(),
            AttrValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&AttrMap> {
        match self {
            AttrValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::Bool(_) => "bool",
            AttrValue::Num(_) => "number",
            AttrValue::Str(_) => "string",
            AttrValue::List(_) => "list",
            AttrValue::Map(_) => "map",
            AttrValue::Node(_) => "node",
            AttrValue::Ref(_) => "ref",
            AttrValue::Handler(_) => "handler",
            AttrValue::Hook(_) => "hook",
            AttrValue::Component(_) => "component",
            AttrValue::Dynamic(_) => "dynamic",
        }
    }

    /// DOM attribute text for the collapsed value. `None` means the
    /// attribute should be absent.
    pub fn to_attr_string(&self) -> Option<String> {
        match self.collapse() {
            AttrValue::Null | AttrValue::Bool(false) => None,
            AttrValue::Bool(true) => Some(String::new()),
            AttrValue::Num(n) => Some(format_num(n)),
            AttrValue::Str(s) => Some(s.to_string()),
            AttrValue::List(items) => Some(
                items
                    .iter()
                    .filter_map(AttrValue::to_attr_string)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        }
    }

    /// Text node data for the collapsed value.
    pub fn to_text(&self) -> String {
        match self.collapse() {
            AttrValue::Num(n) => format_num(n),
            AttrValue::Str(s) => s.to_string(),
            AttrValue::List(items) => items.iter().map(AttrValue::to_text).collect(),
            _ => String::new(),
        }
    }

    /// List-item identity.
    pub fn key(&self) -> ItemKey {
        match self {
            AttrValue::Null => ItemKey::Null,
            AttrValue::Bool(b) => ItemKey::Bool(*b),
            AttrValue::Num(n) => ItemKey::Num(n.to_bits()),
            AttrValue::Str(s) => ItemKey::Str(s.clone()),
            AttrValue::List(l) => ItemKey::Ptr(Rc::as_ptr(l) as usize),
            AttrValue::Map(m) => ItemKey::Ptr(Rc::as_ptr(m) as usize),
            AttrValue::Node(n) => ItemKey::Ptr(n.key()),
            AttrValue::Ref(r) => ItemKey::Ptr(r.key()),
            AttrValue::Handler(h) => ItemKey::Ptr(Rc::as_ptr(h) as *const () as usize),
            AttrValue::Hook(h) => ItemKey::Ptr(Rc::as_ptr(h) as *const () as usize),
            AttrValue::Component(c) => ItemKey::Ptr(c.key()),
            AttrValue::Dynamic(p) => ItemKey::Ptr(p.key()),
        }
    }
}

fn format_num(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        use AttrValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Num(a), Num(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (List(a), List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Map(a), Map(b)) => Rc::ptr_eq(a, b) || a == b,
            (Node(a), Node(b)) => a == b,
            (Ref(a), Ref(b)) => a.ptr_eq(b),
            _ => self.key() == other.key() && self.type_name() == other.type_name(),
        }
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => write!(f, "null"),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Num(n) => write!(f, "{}", format_num(*n)),
            AttrValue::Str(s) => write!(f, "{:?}", s),
            AttrValue::List(l) => f.debug_list().entries(l.iter()).finish(),
            AttrValue::Map(m) => f.debug_map().entries(m.iter()).finish(),
            AttrValue::Node(n) => write!(f, "{:?}", n),
            AttrValue::Ref(r) => write!(f, "{:?}", r),
            AttrValue::Component(c) => write!(f, "<{}/>", c.name()),
            other => write!(f, "<{}>", other.type_name()),
        }
    }
}

impl Default for AttrValue {
    fn default() -> Self {
        AttrValue::Null
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(Rc::from(s))
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(Rc::from(s))
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

macro_rules! attr_from_num {
    ($($t:ty),*) => {
        $(impl From<$t> for AttrValue {
            fn from(n: $t) -> Self {
                AttrValue::Num(n as f64)
            }
        })*
    };
}

attr_from_num!(i32, i64, u32, u64, usize, f32, f64);

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::list(items)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttrValue::Null, Into::into)
    }
}

impl From<AttrMap> for AttrValue {
    fn from(map: AttrMap) -> Self {
        AttrValue::map(map)
    }
}

impl From<Node> for AttrValue {
    fn from(node: Node) -> Self {
        AttrValue::Node(node)
    }
}

impl From<NodeRef> for AttrValue {
    fn from(r: NodeRef) -> Self {
        AttrValue::Ref(r)
    }
}

impl From<Component> for AttrValue {
    fn from(c: Component) -> Self {
        AttrValue::Component(c)
    }
}

impl From<Prop<AttrValue>> for AttrValue {
    fn from(prop: Prop<AttrValue>) -> Self {
        AttrValue::Dynamic(prop)
    }
}

/// A signal becomes a read-only reactive attribute value.
impl<T> From<Signal<T>> for AttrValue
where
    T: Clone + PartialEq + Into<AttrValue> + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        AttrValue::getter(move || signal.get().into())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use spark_signals::signal;

    #[test]
    fn test_truthiness() {
        assert!(!AttrValue::Null.is_truthy());
        assert!(!AttrValue::from(false).is_truthy());
        assert!(!AttrValue::from(0).is_truthy());
        assert!(!AttrValue::Num(f64::NAN).is_truthy());
        assert!(!AttrValue::from("").is_truthy());
        assert!(AttrValue::from("x").is_truthy());
        assert!(AttrValue::list(Vec::<AttrValue>::new()).is_truthy());
        assert!(AttrValue::getter(|| true.into()).is_truthy());
    }

    #[test]
    fn test_attr_strings() {
        assert_eq!(AttrValue::from(true).to_attr_string(), Some(String::new()));
        assert_eq!(AttrValue::from(false).to_attr_string(), None);
        assert_eq!(AttrValue::from(3).to_attr_string(), Some("3".into()));
        assert_eq!(AttrValue::from(1.5).to_attr_string(), Some("1.5".into()));
        assert_eq!(
            AttrValue::from(vec!["a", "", "b"]).to_attr_string(),
            Some("a b".into())
        );
    }

    #[test]
    fn test_keys_primitive_by_value_shared_by_pointer() {
        assert_eq!(AttrValue::from(1).key(), AttrValue::from(1).key());
        assert_eq!(AttrValue::from("a").key(), AttrValue::from("a").key());

        let m1 = AttrValue::map(AttrMap::new());
        let m2 = AttrValue::map(AttrMap::new());
        assert_eq!(m1.key(), m1.clone().key());
        assert_ne!(m1.key(), m2.key(), "distinct objects have distinct keys");
    }

    #[test]
    fn test_signal_collapses_reactively() {
        let count = signal(1);
        let value = AttrValue::from(count.clone());
        assert_eq!(value.collapse(), AttrValue::Num(1.0));
        count.set(2);
        assert_eq!(value.collapse(), AttrValue::Num(2.0));
    }
}
