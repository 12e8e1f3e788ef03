//! Logging targets and object-tree diagnostics.
//!
//! The kernel instruments itself with the `tracing` crate; install any
//! subscriber (e.g. `tracing_subscriber::fmt::init()`) to see its output.
//! The [`targets`] constants filter logs by subsystem.

use std::fmt::Write as _;

use crate::object::{object_registry, ObjectId};

/// Target names for log filtering, one per subsystem.
pub mod targets {
    /// Meta-object registry.
    pub const META: &str = "signet_core::meta";
    /// Object model and delivery.
    pub const OBJECT: &str = "signet_core::object";
    /// Connection table and emission.
    pub const CONNECTION: &str = "signet_core::connection";
    /// Application loop and posted events.
    pub const EVENT_LOOP: &str = "signet_core::event_loop";
    /// Timer registration and firing.
    pub const TIMER: &str = "signet_core::timer";
    /// Dispatcher drivers.
    pub const DISPATCHER: &str = "signet_core::dispatcher";
}

/// Format an object subtree for debugging: one line per object with its
/// id, display name and type, indented by depth.
pub fn dump_object_tree(root: ObjectId) -> String {
    let mut out = String::new();
    dump_recursive(root, 0, &mut out);
    out
}

fn dump_recursive(id: ObjectId, depth: usize, out: &mut String) {
    let registry = object_registry();
    let name = registry.object_name(id).unwrap_or_default();
    let display = if name.is_empty() { "(unnamed)" } else { &name };
    let type_name = registry.type_name(id).unwrap_or("<destroyed>");
    let _ = writeln!(out, "{}[{id:?}] {display} ({type_name})", "  ".repeat(depth));
    for child in registry.children(id) {
        dump_recursive(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaObject;
    use crate::object::{base_meta, set_parent, track, Object, ObjectBase};
    use std::sync::{Arc, OnceLock};

    struct Node {
        base: ObjectBase,
    }

    impl Node {
        fn new(name: &str) -> Arc<Self> {
            let node = track(Self {
                base: ObjectBase::new::<Self>(),
            });
            node.base.set_name(name);
            node
        }

        fn meta() -> &'static MetaObject {
            static META: OnceLock<MetaObject> = OnceLock::new();
            META.get_or_init(|| MetaObject::builder("Node").parent(base_meta()).build())
        }
    }

    impl Object for Node {
        fn object_id(&self) -> ObjectId {
            self.base.id()
        }

        fn meta_object(&self) -> &'static MetaObject {
            Self::meta()
        }
    }

    #[test]
    fn test_dump_tree() {
        let root = Node::new("root");
        let child = Node::new("leaf");
        set_parent(child.clone(), Some(root.object_id())).unwrap();

        let dump = dump_object_tree(root.object_id());
        assert!(dump.contains("root"));
        assert!(dump.contains("  ")); // the child is indented
        assert!(dump.contains("leaf"));
    }
}
