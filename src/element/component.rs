//! Components - named render functions over props and scope.

use std::fmt;
use std::rc::Rc;

use super::Child;
use crate::attrs::Attrs;
use crate::error::Result;
use crate::scope::Scope;
use crate::types::AttrValue;

/// Component render function.
pub type ComponentFn = Rc<dyn Fn(&Props, &Scope) -> Result<Child>>;

/// A user-defined component.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: ComponentFn,
}

/// Define a component.
///
/// ```ignore
/// let greeting = component("Greeting", |props, _scope| {
///     let name = props.value("name");
///     Ok(make("p", props! {}, vec![format!("Hello {}", name.to_text()).into()]).into())
/// });
/// ```
pub fn component(
    name: impl Into<String>,
    render: impl Fn(&Props, &Scope) -> Result<Child> + 'static,
) -> Component {
    Component {
        name: Rc::from(name.into()),
        render: Rc::new(render),
    }
}

impl Component {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> Rc<str> {
        self.name.clone()
    }

    pub(crate) fn call(&self, props: &Props, scope: &Scope) -> Result<Child> {
        (self.render)(props, scope)
    }

    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.render) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

// =============================================================================
// Props
// =============================================================================

/// What a component receives: its attribute set and its children.
#[derive(Clone, Default)]
pub struct Props {
    attrs: Attrs,
    children: Rc<Vec<Child>>,
}

impl Props {
    pub fn new(attrs: Attrs, children: Vec<Child>) -> Self {
        Self {
            attrs,
            children: Rc::new(children),
        }
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Resolve a prop (layered lookup with category merge).
    pub fn get(&self, key: &str) -> Result<Option<AttrValue>> {
        self.attrs.get(key)
    }

    /// Resolve a prop, `Null` when missing or unresolvable.
    pub fn value(&self, key: &str) -> AttrValue {
        match self.attrs.get(key) {
            Ok(v) => v.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(%err, key, "prop lookup failed");
                AttrValue::Null
            }
        }
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Children as a single child, for passing through.
    pub fn children_child(&self) -> Child {
        Child::List((*self.children).clone())
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("keys", &self.attrs.keys())
            .field("children", &self.children.len())
            .finish()
    }
}
