//! Layered attribute sets.
//!
//! An [`Attrs`] is an ordered list of layers. Each layer is a static map or a
//! reactive getter returning a map. Lookup scans layers from last to first
//! and the first layer defining a key wins, so later layers override earlier
//! ones. Reading a reactive layer inside an effect or derived subscribes to
//! it.
//!
//! Keys of the form `prefix:name` belong to a category. A category is read
//! as a whole with [`Attrs::get_category`]. When a plain key and a category
//! of the same name both exist, [`Attrs::get`] deep-merges them.
//!
//! # Masking
//!
//! [`Attrs::get_single`] with `non_reactive` set freezes a key: later reads
//! return the frozen value and the key is no longer applied as a DOM
//! attribute. Structural keys (`if`, `this`, ...) are consumed this way.

mod class;
mod meta;
mod style;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{RenderError, Result};
use crate::types::{AttrMap, AttrValue};

pub use class::push_class;
pub use meta::{Meta, MetaFlags};
pub use style::{parse_style, serialize_style, StyleMap};

/// Keys consumed by the engine rather than written to the DOM.
pub const STRUCTURAL_KEYS: &[&str] = &["this", "if", "condition", "else", "use", "when"];

/// Categories the engine interprets. Other `a:b` keys are plain attributes
/// (`xlink:href` and friends).
pub const CATEGORIES: &[&str] = &["when", "use", "on", "class", "style"];

/// Split `prefix:name`.
pub fn split_category(key: &str) -> Option<(&str, &str)> {
    key.split_once(':').filter(|(p, n)| !p.is_empty() && !n.is_empty())
}

fn is_engine_key(key: &str) -> bool {
    if STRUCTURAL_KEYS.contains(&key) || key == "class" || key == "style" {
        return true;
    }
    matches!(split_category(key), Some((prefix, _)) if CATEGORIES.contains(&prefix))
}

// =============================================================================
// Layer
// =============================================================================

/// One layer of an attribute set.
#[derive(Clone)]
pub enum Layer {
    Static(Rc<AttrMap>),
    Reactive(Rc<dyn Fn() -> AttrMap>),
}

impl Layer {
    pub fn reactive(f: impl Fn() -> AttrMap + 'static) -> Self {
        Layer::Reactive(Rc::new(f))
    }

    /// Run `f` against the layer's current map.
    fn with_map<R>(&self, f: impl FnOnce(&AttrMap) -> R) -> R {
        match self {
            Layer::Static(map) => f(map),
            Layer::Reactive(get) => f(&get()),
        }
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Layer::Reactive(_))
    }
}

impl From<AttrMap> for Layer {
    fn from(map: AttrMap) -> Self {
        Layer::Static(Rc::new(map))
    }
}

// =============================================================================
// Attrs
// =============================================================================

/// Ordered, layered attribute set. Clones share layers and mask.
#[derive(Clone, Default)]
pub struct Attrs {
    layers: Rc<Vec<Layer>>,
    mask: Rc<RefCell<IndexMap<String, Option<AttrValue>>>>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a static layer.
    pub fn layer(self, map: AttrMap) -> Self {
        self.push(Layer::from(map))
    }

    /// Append a reactive layer.
    pub fn reactive_layer(self, f: impl Fn() -> AttrMap + 'static) -> Self {
        self.push(Layer::reactive(f))
    }

    fn push(self, layer: Layer) -> Self {
        let mut layers = (*self.layers).clone();
        layers.push(layer);
        Attrs {
            layers: Rc::new(layers),
            mask: Rc::new(RefCell::new(self.mask.borrow().clone())),
        }
    }

    /// Same layers with `keys` masked out (resolving to nothing).
    pub fn without(&self, keys: &[&str]) -> Attrs {
        let mut mask = self.mask.borrow().clone();
        for key in keys {
            mask.insert(key.to_string(), None);
        }
        Attrs {
            layers: self.layers.clone(),
            mask: Rc::new(RefCell::new(mask)),
        }
    }

    /// Layers of `self` followed by the layers of `other`. The mask starts
    /// empty.
    pub fn merge(&self, other: &Attrs) -> Attrs {
        let mut layers = (*self.layers).clone();
        layers.extend(other.layers.iter().cloned());
        Attrs {
            layers: Rc::new(layers),
            mask: Rc::default(),
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Value of a plain key from the last layer defining it.
    fn lookup(&self, key: &str) -> Option<AttrValue> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.with_map(|map| map.get(key).cloned()))
    }

    /// Resolve `key`, deep-merging a same-named category into it.
    ///
    /// Fails with [`RenderError::InvalidAttributeType`] when both exist and
    /// the plain value is not a map.
    pub fn get(&self, key: &str) -> Result<Option<AttrValue>> {
        if let Some(frozen) = self.mask.borrow().get(key) {
            return Ok(frozen.clone());
        }

        let plain = self.lookup(key);
        if split_category(key).is_some() {
            return Ok(plain);
        }
        let category = self.get_category(key);
        if category.is_empty() {
            return Ok(plain);
        }

        match plain.as_ref().map(AttrValue::collapse) {
            None | Some(AttrValue::Null) => Ok(Some(AttrValue::map(category))),
            Some(AttrValue::Map(base)) => {
                let mut merged = (*base).clone();
                deep_merge(&mut merged, &category);
                Ok(Some(AttrValue::map(merged)))
            }
            Some(other) => Err(RenderError::InvalidAttributeType {
                key: key.to_string(),
                found: other.type_name(),
            }),
        }
    }

    /// Like [`get`](Self::get). With `non_reactive` the resolved value is
    /// frozen under `key` and the key stops being a DOM attribute.
    pub fn get_single(&self, key: &str, non_reactive: bool) -> Result<Option<AttrValue>> {
        let value = self.get(key)?;
        if non_reactive {
            self.mask
                .borrow_mut()
                .entry(key.to_string())
                .or_insert_with(|| value.clone());
        }
        Ok(value)
    }

    pub fn is_masked(&self, key: &str) -> bool {
        self.mask.borrow().contains_key(key)
    }

    /// All `prefix:name` entries as `name → value`. Later layers override.
    pub fn get_category(&self, prefix: &str) -> AttrMap {
        let mut out = AttrMap::new();
        for layer in self.layers.iter() {
            layer.with_map(|map| {
                for (k, v) in map {
                    if let Some((p, name)) = split_category(k) {
                        if p == prefix {
                            out.insert(name.to_string(), v.clone());
                        }
                    }
                }
            });
        }
        let mask = self.mask.borrow();
        for (name, value) in out.iter_mut() {
            if let Some(Some(frozen)) = mask.get(&format!("{}:{}", prefix, name)) {
                *value = frozen.clone();
            }
        }
        out
    }

    /// Keys written to the DOM as plain attributes, in first-appearance
    /// order. Structural keys, engine categories, `class`, `style` and masked
    /// keys are excluded.
    pub fn plain_keys(&self) -> Vec<String> {
        let masked: Vec<String> = self.mask.borrow().keys().cloned().collect();
        let mut keys: Vec<String> = Vec::new();
        for layer in self.layers.iter() {
            layer.with_map(|map| {
                for k in map.keys() {
                    if !is_engine_key(k) && !masked.contains(k) && !keys.contains(k) {
                        keys.push(k.clone());
                    }
                }
            });
        }
        keys
    }

    /// Every key across all layers, for diagnostics.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for layer in self.layers.iter() {
            layer.with_map(|map| {
                for k in map.keys() {
                    if !keys.contains(k) {
                        keys.push(k.clone());
                    }
                }
            });
        }
        keys
    }

    /// Visit layers in order with their current maps.
    pub(crate) fn for_each_layer(&self, mut f: impl FnMut(&AttrMap)) {
        for layer in self.layers.iter() {
            layer.with_map(&mut f);
        }
    }
}

/// Recursive map merge; `from` wins except where both sides hold maps.
pub fn deep_merge(into: &mut AttrMap, from: &AttrMap) {
    for (k, v) in from {
        match (into.get_mut(k), v) {
            (Some(AttrValue::Map(existing)), AttrValue::Map(incoming)) => {
                let mut merged = (**existing).clone();
                deep_merge(&mut merged, incoming);
                *existing = Rc::new(merged);
            }
            _ => {
                into.insert(k.clone(), v.clone());
            }
        }
    }
}

impl From<AttrMap> for Attrs {
    fn from(map: AttrMap) -> Self {
        Attrs::new().layer(map)
    }
}

impl From<Vec<AttrMap>> for Attrs {
    fn from(maps: Vec<AttrMap>) -> Self {
        maps.into_iter().fold(Attrs::new(), Attrs::layer)
    }
}

impl fmt::Debug for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attrs")
            .field("layers", &self.layers.len())
            .field("masked", &self.mask.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use spark_signals::signal;

    #[test]
    fn test_later_layer_wins() {
        let attrs = Attrs::new()
            .layer(props! { "class" => "a", "title" => "t" })
            .layer(props! { "class" => "b", "when:x" => true });

        assert_eq!(attrs.get("class").unwrap(), Some("b".into()));
        assert_eq!(attrs.get("title").unwrap(), Some("t".into()));
        assert_eq!(attrs.get("missing").unwrap(), None);
    }

    #[test]
    fn test_category_merges_into_plain_map() {
        let attrs = Attrs::new()
            .layer(props! { "data" => props! { "a" => 1, "nested" => props! { "x" => 1 } } })
            .layer(props! { "data:b" => 2, "data:nested" => props! { "y" => 2 } });

        let data = attrs.get("data").unwrap().unwrap();
        let map = data.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&AttrValue::from(1)));
        assert_eq!(map.get("b"), Some(&AttrValue::from(2)));
        let nested = map.get("nested").unwrap().as_map().unwrap();
        assert_eq!(nested.len(), 2, "nested maps are merged, not replaced");
    }

    #[test]
    fn test_category_without_plain_key() {
        let attrs = Attrs::from(props! { "when:a" => true, "when:b" => false });
        let when = attrs.get("when").unwrap().unwrap();
        assert_eq!(when.as_map().unwrap().len(), 2);
    }

    #[test]
    fn test_plain_non_map_with_category_is_an_error() {
        let attrs = Attrs::from(props! { "when" => "yes", "when:a" => true });
        let err = attrs.get("when").unwrap_err();
        assert_eq!(
            err,
            RenderError::InvalidAttributeType {
                key: "when".into(),
                found: "string"
            }
        );
    }

    #[test]
    fn test_get_category_later_layer_overrides() {
        let attrs = Attrs::new()
            .layer(props! { "on:click" => 1, "on:input" => 2 })
            .layer(props! { "on:click" => 3 });
        let on = attrs.get_category("on");
        assert_eq!(on.get("click"), Some(&AttrValue::from(3)));
        assert_eq!(on.get("input"), Some(&AttrValue::from(2)));
    }

    #[test]
    fn test_mask_freezes_and_hides_key() {
        let flag = signal(1);
        let f = flag.clone();
        let attrs = Attrs::new()
            .layer(props! { "id" => "x" })
            .reactive_layer(move || props! { "data-n" => f.get() });

        assert_eq!(attrs.plain_keys(), vec!["id", "data-n"]);
        let frozen = attrs.get_single("data-n", true).unwrap();
        assert_eq!(frozen, Some(AttrValue::from(1)));

        flag.set(2);
        assert_eq!(attrs.get("data-n").unwrap(), Some(AttrValue::from(1)));
        assert_eq!(attrs.plain_keys(), vec!["id"]);
    }

    #[test]
    fn test_plain_keys_skip_engine_keys() {
        let attrs = Attrs::from(props! {
            "id" => "a",
            "if" => true,
            "class" => "c",
            "class:on" => true,
            "style" => "color: red",
            "on:click" => 1,
            "xlink:href" => "#icon",
        });
        assert_eq!(attrs.plain_keys(), vec!["id", "xlink:href"]);
    }

    #[test]
    fn test_reactive_layer_is_read_on_demand() {
        let title = signal(String::from("one"));
        let t = title.clone();
        let attrs = Attrs::new().reactive_layer(move || props! { "title" => t.get() });

        assert_eq!(attrs.get("title").unwrap(), Some("one".into()));
        title.set("two".into());
        assert_eq!(attrs.get("title").unwrap(), Some("two".into()));
    }
}
