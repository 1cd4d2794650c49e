//! Scene nodes and the compile recursion
//!
//! A compile pass walks the tree depth first. Each node gets `enter` before
//! its children and `exit` after them, both with the same
//! [`CompileContext`], which is where nodes push and pop traversal state.

mod morph;
mod projection;

pub use morph::MorphGeometryNode;
pub use projection::{Optics, ProjectionFrame, ProjectionNode, ProjectionTransform};

use std::fmt;

use crate::traversal::CompileContext;
use crate::CoreResult;

/// Identifier of a scene node, chosen by the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A node taking part in compile passes
pub trait SceneNode {
    /// Node id
    fn id(&self) -> NodeId;

    /// Called before the node's children are compiled
    fn enter(&mut self, ctx: &mut CompileContext<'_>) -> CoreResult<()>;

    /// Called after the node's children are compiled
    fn exit(&mut self, _ctx: &mut CompileContext<'_>) -> CoreResult<()> {
        Ok(())
    }

    /// Child nodes, compiled in order
    fn children_mut(&mut self) -> &mut [Box<dyn SceneNode>] {
        &mut []
    }
}

/// Compile a subtree
///
/// Stops at the first error; whatever the subtree pushed stays on the stacks
/// and has to be unwound by the caller.
pub fn compile_node(node: &mut dyn SceneNode, ctx: &mut CompileContext<'_>) -> CoreResult<()> {
    node.enter(ctx)?;
    for child in node.children_mut() {
        compile_node(child.as_mut(), ctx)?;
    }
    node.exit(ctx)
}

/// Plain grouping node without state of its own
#[derive(Default)]
pub struct Group {
    id: NodeId,
    children: Vec<Box<dyn SceneNode>>,
}

impl Group {
    /// Create an empty group
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            children: Vec::new(),
        }
    }

    /// Add a child (builder pattern)
    pub fn with_child(mut self, child: Box<dyn SceneNode>) -> Self {
        self.children.push(child);
        self
    }

    /// Add a child
    pub fn push_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }
}

impl SceneNode for Group {
    fn id(&self) -> NodeId {
        self.id
    }

    fn enter(&mut self, _ctx: &mut CompileContext<'_>) -> CoreResult<()> {
        Ok(())
    }

    fn children_mut(&mut self) -> &mut [Box<dyn SceneNode>] {
        &mut self.children
    }
}

/// Leaf that issues a draw with whatever state encloses it
#[derive(Debug, Clone)]
pub struct DrawNode {
    id: NodeId,
    draws: u64,
}

impl DrawNode {
    /// Create a draw node
    pub fn new(id: NodeId) -> Self {
        Self { id, draws: 0 }
    }

    /// Number of draws issued so far
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl SceneNode for DrawNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn enter(&mut self, ctx: &mut CompileContext<'_>) -> CoreResult<()> {
        ctx.draw(self.id)?;
        self.draws += 1;
        Ok(())
    }
}
