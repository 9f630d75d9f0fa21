//! Node registry and factory.
//!
//! The registry is the node supply interface: each entry pairs a descriptor
//! with a factory producing a [`CompiledNode`] for a given sample rate. Built-in
//! nodes are registered by [`NodeRegistry::new`]; hosts add their own with
//! [`NodeRegistry::register`].
//!
//! ```rust
//! use gammou_core::{CompiledNode, NodeCategory, NodeRegistry};
//!
//! let registry = NodeRegistry::new();
//! let osc = registry.create("sine", 48000.0).unwrap();
//! assert_eq!(osc.output_count(), 1);
//!
//! for descriptor in registry.in_category(NodeCategory::Math) {
//!     println!("{}: {}", descriptor.name, descriptor.description);
//! }
//! ```

use std::sync::Arc;

use crate::node::CompiledNode;
use crate::nodes::{Constant, Envelope, Gain, Identity, Multiply, SinOscillator, Sum};

/// Category of node for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Signal generators (oscillators, constants).
    Source,
    /// Arithmetic on signals.
    Math,
    /// Envelopes and control shaping.
    Control,
    /// Pass-through and routing helpers.
    Routing,
}

impl NodeCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            NodeCategory::Source => "Source",
            NodeCategory::Math => "Math",
            NodeCategory::Control => "Control",
            NodeCategory::Routing => "Routing",
        }
    }
}

/// Factory function type for creating nodes at a sample rate.
pub type NodeFactory = fn(f32) -> Arc<dyn CompiledNode>;

/// Describes a node type in the registry.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category for organization.
    pub category: NodeCategory,
    /// Factory producing a fresh node.
    pub create: NodeFactory,
}

/// Registry of available node types.
pub struct NodeRegistry {
    entries: Vec<NodeDescriptor>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// Creates a registry with every built-in node registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// Creates a registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn register_builtins(&mut self) {
        self.register(NodeDescriptor {
            id: "sine",
            name: "Sine",
            description: "Sine oscillator with frequency and phase inputs",
            category: NodeCategory::Source,
            create: |sr| Arc::new(SinOscillator::new(sr)),
        });
        self.register(NodeDescriptor {
            id: "constant",
            name: "Constant",
            description: "Outputs 1.0",
            category: NodeCategory::Source,
            create: |_| Arc::new(Constant::new(1.0)),
        });
        self.register(NodeDescriptor {
            id: "gain",
            name: "Gain",
            description: "Halves its input",
            category: NodeCategory::Math,
            create: |_| Arc::new(Gain::new(0.5)),
        });
        self.register(NodeDescriptor {
            id: "sum",
            name: "Sum",
            description: "Adds two inputs",
            category: NodeCategory::Math,
            create: |_| Arc::new(Sum::new(2)),
        });
        self.register(NodeDescriptor {
            id: "multiply",
            name: "Multiply",
            description: "Multiplies two inputs",
            category: NodeCategory::Math,
            create: |_| Arc::new(Multiply),
        });
        self.register(NodeDescriptor {
            id: "envelope",
            name: "Envelope",
            description: "Attack/release follower of a gate (10 ms / 200 ms)",
            category: NodeCategory::Control,
            create: |sr| Arc::new(Envelope::new(sr, 0.01, 0.2)),
        });
        self.register(NodeDescriptor {
            id: "identity",
            name: "Identity",
            description: "Passes one signal through unchanged",
            category: NodeCategory::Routing,
            create: |_| Arc::new(Identity::new(1)),
        });
    }

    /// Adds a node type. An existing entry with the same id is replaced.
    pub fn register(&mut self, descriptor: NodeDescriptor) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == descriptor.id) {
            *existing = descriptor;
        } else {
            self.entries.push(descriptor);
        }
    }

    /// Creates a node by id.
    pub fn create(&self, id: &str, sample_rate: f32) -> Option<Arc<dyn CompiledNode>> {
        self.descriptor(id).map(|d| (d.create)(sample_rate))
    }

    /// Returns the descriptor for an id.
    pub fn descriptor(&self, id: &str) -> Option<&NodeDescriptor> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// All registered node types, in registration order.
    pub fn all(&self) -> &[NodeDescriptor] {
        &self.entries
    }

    /// Node types in one category.
    pub fn in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeDescriptor> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Number of registered node types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
