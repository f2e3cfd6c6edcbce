//! Style merging. Later contributions override earlier ones per property.

use indexmap::IndexMap;

use super::{split_category, Attrs};
use crate::types::AttrValue;

/// Property → value, in first-declaration order.
pub type StyleMap = IndexMap<String, String>;

/// Parse `a: b; c: d` declarations.
pub fn parse_style(text: &str) -> StyleMap {
    text.split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(p, v)| (p.trim().to_string(), v.trim().to_string()))
        .filter(|(p, v)| !p.is_empty() && !v.is_empty())
        .collect()
}

pub fn serialize_style(style: &StyleMap) -> String {
    style
        .iter()
        .map(|(p, v)| format!("{}: {}", p, v))
        .collect::<Vec<_>>()
        .join("; ")
}

fn apply(style: &mut StyleMap, property: &str, value: &AttrValue) {
    match value.to_attr_string() {
        Some(v) if !v.is_empty() => {
            style.insert(property.to_string(), v);
        }
        _ => {
            style.shift_remove(property);
        }
    }
}

fn push_style(value: &AttrValue, style: &mut StyleMap) {
    match value.collapse() {
        AttrValue::Str(s) => style.extend(parse_style(&s)),
        AttrValue::Map(map) => {
            for (p, v) in map.iter() {
                apply(style, p, v);
            }
        }
        AttrValue::List(items) => items.iter().for_each(|v| push_style(v, style)),
        _ => {}
    }
}

impl Attrs {
    /// Merged style across layers: each layer's `style` then its
    /// `style:property` entries. A null or `false` value drops the property.
    pub fn merge_styles(&self) -> StyleMap {
        let mut style = StyleMap::new();
        self.for_each_layer(|map| {
            if let Some(v) = map.get("style") {
                push_style(v, &mut style);
            }
            for (k, v) in map {
                if let Some(("style", property)) = split_category(k) {
                    apply(&mut style, property, v);
                }
            }
        });
        style
    }

    pub fn style_text(&self) -> String {
        serialize_style(&self.merge_styles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;

    #[test]
    fn test_parse_and_serialize() {
        let style = parse_style(" color: red ;margin:0; ; bad ");
        assert_eq!(style.len(), 2);
        assert_eq!(serialize_style(&style), "color: red; margin: 0");
    }

    #[test]
    fn test_later_layers_override_per_property() {
        let attrs = Attrs::new()
            .layer(props! { "style" => "color: red; margin: 0" })
            .layer(props! { "style" => props! { "color" => "blue" }, "style:padding" => "1px" })
            .layer(props! { "style:margin" => AttrValue::Null });

        assert_eq!(attrs.style_text(), "color: blue; padding: 1px");
    }
}
