//! Class merging. Contributions from every layer add up; nothing overrides.

use super::{split_category, Attrs};
use crate::types::AttrValue;

/// Append the class names in `value` to `out`, skipping duplicates.
///
/// Strings split on whitespace, lists recurse, and maps contribute each key
/// whose value is truthy.
pub fn push_class(value: &AttrValue, out: &mut Vec<String>) {
    match value.collapse() {
        AttrValue::Str(s) => {
            for name in s.split_whitespace() {
                if !out.iter().any(|c| c == name) {
                    out.push(name.to_string());
                }
            }
        }
        AttrValue::Num(_) => {
            if let Some(s) = value.to_attr_string() {
                push_class(&AttrValue::from(s), out);
            }
        }
        AttrValue::List(items) => items.iter().for_each(|v| push_class(v, out)),
        AttrValue::Map(map) => {
            for (name, on) in map.iter() {
                if on.is_truthy() {
                    push_class(&AttrValue::from(name.as_str()), out);
                }
            }
        }
        _ => {}
    }
}

impl Attrs {
    /// Class names from all layers in layer order: each layer's `class`
    /// first, then its truthy `class:name` entries.
    pub fn class_list(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.for_each_layer(|map| {
            if let Some(v) = map.get("class") {
                push_class(v, &mut out);
            }
            for (k, v) in map {
                if let Some(("class", name)) = split_category(k) {
                    if v.is_truthy() {
                        push_class(&AttrValue::from(name), &mut out);
                    }
                }
            }
        });
        out
    }

    /// Space-joined [`class_list`](Self::class_list).
    pub fn merge_classes(&self) -> String {
        self.class_list().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use spark_signals::signal;

    #[test]
    fn test_classes_are_additive() {
        let attrs = Attrs::new()
            .layer(props! { "class" => "a b" })
            .layer(props! { "class" => vec!["c", "a"], "class:d" => true, "class:e" => false });

        assert_eq!(attrs.merge_classes(), "a b c d");
    }

    #[test]
    fn test_map_form_and_reactive_toggle() {
        let active = signal(false);
        let a = active.clone();
        let attrs = Attrs::from(props! {
            "class" => props! {
                "item" => true,
                "active" => AttrValue::getter(move || a.get().into()),
            },
        });

        assert_eq!(attrs.merge_classes(), "item");
        active.set(true);
        assert_eq!(attrs.merge_classes(), "item active");
    }
}
