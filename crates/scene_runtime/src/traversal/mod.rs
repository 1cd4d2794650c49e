//! Traversal state stacks
//!
//! During a depth-first compile pass, nodes push their contribution on entry
//! and pop it on exit, so descendants (and draws) see the nearest enclosing
//! node's state at the top of the stack. One [`TraversalStack`] exists per
//! state category and per surface.
//!
//! Push and pop must pair up strictly. Depth is zero at the start and end of
//! every pass; anything else is a bug in a node and panics.

mod context;

pub use context::CompileContext;

/// LIFO stack of frames for one state category
#[derive(Debug, Clone)]
pub struct TraversalStack<F> {
    name: &'static str,
    frames: Vec<F>,
    passes: u64,
}

impl<F> TraversalStack<F> {
    /// Create an empty stack; `name` identifies it in panics and logs
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, 0)
    }

    /// Create an empty stack with room for `capacity` frames
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            frames: Vec::with_capacity(capacity),
            passes: 0,
        }
    }

    /// Stack name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enter a node's scope
    pub fn push(&mut self, frame: F) {
        self.frames.push(frame);
    }

    /// Leave the innermost scope
    ///
    /// # Panics
    /// Panics if the stack is empty: a pop without a matching push.
    pub fn pop(&mut self) -> F {
        match self.frames.pop() {
            Some(frame) => frame,
            None => panic!("{} stack: pop without matching push", self.name),
        }
    }

    /// Innermost frame, if any
    pub fn top(&self) -> Option<&F> {
        self.frames.last()
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no scope is open
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of compile passes started on this stack
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Start a compile pass
    ///
    /// # Panics
    /// Panics if frames are left over from the previous pass.
    pub fn begin_pass(&mut self) {
        assert!(
            self.frames.is_empty(),
            "{} stack: {} unmatched push(es) left at start of compile pass",
            self.name,
            self.frames.len()
        );
        self.passes += 1;
    }

    /// Check the stack is balanced at the end of a compile pass
    ///
    /// # Panics
    /// Panics if any push was not popped.
    pub fn end_pass(&self) {
        assert!(
            self.frames.is_empty(),
            "{} stack: {} unmatched push(es) at end of compile pass",
            self.name,
            self.frames.len()
        );
    }

    /// Drop every open frame after a pass was aborted by an error
    ///
    /// Returns how many frames were discarded.
    pub fn unwind(&mut self) -> usize {
        let open = self.frames.len();
        if open > 0 {
            log::warn!("{} stack: discarding {} frame(s) from an aborted pass", self.name, open);
        }
        self.frames.clear();
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_push_pop_restores_enclosing_frame() {
        let mut stack = TraversalStack::new("test");
        stack.begin_pass();

        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.top(), Some(&3));
        assert_eq!(stack.pop(), 3);
        assert_eq!(stack.top(), Some(&2));
        assert_eq!(stack.pop(), 2);
        assert_eq!(stack.top(), Some(&1));
        assert_eq!(stack.pop(), 1);
        assert_eq!(stack.top(), None);
        assert_eq!(stack.depth(), 0);

        stack.end_pass();
        stack.begin_pass();
        assert_eq!(stack.passes(), 2);
    }

    #[test]
    #[should_panic(expected = "pop without matching push")]
    fn test_pop_on_empty_stack_panics() {
        let mut stack: TraversalStack<u32> = TraversalStack::new("morph");
        stack.pop();
    }

    #[test]
    #[should_panic(expected = "unmatched push(es) at end of compile pass")]
    fn test_unbalanced_pass_panics() {
        let mut stack = TraversalStack::new("projection");
        stack.begin_pass();
        stack.push("left open");
        stack.end_pass();
    }

    #[test]
    #[should_panic(expected = "left at start of compile pass")]
    fn test_begin_pass_with_open_frames_panics() {
        let mut stack = TraversalStack::new("projection");
        stack.push(7);
        stack.begin_pass();
    }

    #[test]
    fn test_unwind_discards_open_frames() {
        let mut stack = TraversalStack::with_capacity("morph", 4);
        stack.push(1);
        stack.push(2);
        assert_eq!(stack.unwind(), 2);
        assert!(stack.is_empty());
        stack.begin_pass();
    }
}
