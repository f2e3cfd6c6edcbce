//! Structural metadata extracted from an attribute set.
//!
//! `this`, `if`/`condition`, `else`, `when`/`when:*` and `use`/`use:*` are
//! read once, masked, and carried on the descriptor.

use bitflags::bitflags;

use super::Attrs;
use crate::error::Result;
use crate::types::{AttrMap, AttrValue, Hook};

bitflags! {
    /// Which structural keys were present.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MetaFlags: u8 {
        const THIS      = 1 << 0;
        const CONDITION = 1 << 1;
        const ELSE      = 1 << 2;
        const WHEN      = 1 << 3;
        const MOUNT     = 1 << 4;
    }
}

/// Structural metadata of a descriptor.
#[derive(Clone, Default)]
pub struct Meta {
    pub flags: MetaFlags,
    /// `this` capture target: a [`NodeRef`](crate::NodeRef) or a writable
    /// dynamic value.
    pub this: Option<AttrValue>,
    pub condition: Option<AttrValue>,
    /// Guards from `when` and `when:*`; all must hold.
    pub when: AttrMap,
    /// Mount hooks in declaration order.
    pub mount: Vec<Hook>,
}

impl Meta {
    pub fn is_conditional(&self) -> bool {
        self.flags.intersects(MetaFlags::CONDITION | MetaFlags::WHEN)
    }

    pub fn is_else(&self) -> bool {
        self.flags.contains(MetaFlags::ELSE)
    }

    /// Evaluate the guard. Tracked when called inside a derived.
    pub fn passes(&self) -> bool {
        let condition = self.condition.as_ref().is_none_or(AttrValue::is_truthy);
        condition && self.when.values().all(AttrValue::is_truthy)
    }
}

impl std::fmt::Debug for Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meta")
            .field("flags", &self.flags)
            .field("when", &self.when.keys().collect::<Vec<_>>())
            .field("mount", &self.mount.len())
            .finish()
    }
}

impl Attrs {
    /// Read and mask all structural keys.
    pub fn extract_meta(&self) -> Result<Meta> {
        let mut meta = Meta::default();

        if let Some(this) = self.get_single("this", true)? {
            meta.flags |= MetaFlags::THIS;
            meta.this = Some(this);
        }

        let condition = self.get_single("if", true)?;
        let alias = self.get_single("condition", true)?;
        if let Some(c) = condition.or(alias) {
            meta.flags |= MetaFlags::CONDITION;
            meta.condition = Some(c);
        }

        if let Some(e) = self.get_single("else", true)? {
            if !matches!(e, AttrValue::Bool(false)) {
                meta.flags |= MetaFlags::ELSE;
            }
        }

        if let Some(when) = self.get_single("when", true)? {
            match when.as_map() {
                Some(map) => meta.when = map.clone(),
                None => {
                    meta.when.insert("when".into(), when);
                }
            }
            if !meta.when.is_empty() {
                meta.flags |= MetaFlags::WHEN;
            }
        }

        meta.mount = self.mount_hooks();
        if !meta.mount.is_empty() {
            meta.flags |= MetaFlags::MOUNT;
        }

        Ok(meta)
    }

    /// `use` (a hook, list or map of hooks) followed by `use:*` entries.
    fn mount_hooks(&self) -> Vec<Hook> {
        let mut hooks = Vec::new();
        if self.is_masked("use") {
            return hooks;
        }
        if let Some(plain) = self.lookup("use") {
            collect_hooks(&plain, &mut hooks);
        }
        self.mask_key("use");
        for value in self.get_category("use").values() {
            collect_hooks(value, &mut hooks);
        }
        hooks
    }

    fn mask_key(&self, key: &str) {
        self.mask.borrow_mut().entry(key.to_string()).or_insert(None);
    }
}

fn collect_hooks(value: &AttrValue, out: &mut Vec<Hook>) {
    match value {
        AttrValue::Hook(h) => out.push(h.clone()),
        AttrValue::List(items) => items.iter().for_each(|v| collect_hooks(v, out)),
        AttrValue::Map(map) => map.values().for_each(|v| collect_hooks(v, out)),
        AttrValue::Null => {}
        other => tracing::warn!(found = other.type_name(), "ignoring non-hook `use` entry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::NodeRef;
    use spark_signals::signal;

    #[test]
    fn test_extract_flags() {
        let attrs = Attrs::from(props! {
            "id" => "x",
            "this" => NodeRef::new(),
            "if" => true,
            "when:ready" => true,
            "use" => AttrValue::hook(|_| None),
            "use:focus" => AttrValue::hook(|_| None),
        });
        let meta = attrs.extract_meta().unwrap();

        assert_eq!(
            meta.flags,
            MetaFlags::THIS | MetaFlags::CONDITION | MetaFlags::WHEN | MetaFlags::MOUNT
        );
        assert_eq!(meta.mount.len(), 2);
        assert!(meta.passes());
        assert_eq!(attrs.plain_keys(), vec!["id"], "structural keys are masked");
    }

    #[test]
    fn test_when_guards_all_must_hold() {
        let ready = signal(true);
        let r = ready.clone();
        let attrs = Attrs::from(props! {
            "when:ready" => AttrValue::getter(move || r.get().into()),
            "when:always" => true,
        });
        let meta = attrs.extract_meta().unwrap();

        assert!(meta.is_conditional());
        assert!(meta.passes());
        ready.set(false);
        assert!(!meta.passes());
    }

    #[test]
    fn test_else_false_is_not_else() {
        let meta = Attrs::from(props! { "else" => false }).extract_meta().unwrap();
        assert!(!meta.is_else());
        let meta = Attrs::from(props! { "else" => true }).extract_meta().unwrap();
        assert!(meta.is_else());
        assert!(!meta.is_conditional());
    }

    #[test]
    fn test_condition_alias() {
        let meta = Attrs::from(props! { "condition" => false }).extract_meta().unwrap();
        assert!(meta.flags.contains(MetaFlags::CONDITION));
        assert!(!meta.passes());
    }
}
