// SPDX-License-Identifier: MIT
//
// The component contract.
//
// A component is anything that can turn a width into lines. The runtime
// never looks inside one; it asks for lines, forwards input to whichever
// component holds focus, and tells components to drop their caches when
// something global changed (a resize, a cell-size report).
//
// Components live behind `Rc<RefCell<…>>` because the tree, the focus
// manager and the overlay stack all hold references to the same widget.
// Identity is pointer identity of the allocation.

use std::cell::RefCell;
use std::rc::Rc;

/// A self-rendering widget.
pub trait Component {
    /// Render to lines no wider than `width` visible columns.
    ///
    /// May embed one [`CURSOR_MARKER`](panda_term::ansi::CURSOR_MARKER)
    /// where the hardware cursor should sit.
    fn render(&mut self, width: usize) -> Vec<String>;

    /// Receive one complete input sequence while focused.
    fn handle_input(&mut self, _data: &str) {}

    /// Whether Kitty key-release events should be delivered.
    fn wants_key_release(&self) -> bool {
        false
    }

    /// Drop any cached render output.
    fn invalidate(&mut self) {}

    /// The focus capability, for components that have one.
    fn as_focusable_mut(&mut self) -> Option<&mut dyn Focusable> {
        None
    }
}

/// A component that tracks whether it holds focus.
pub trait Focusable {
    fn set_focused(&mut self, focused: bool);
    fn is_focused(&self) -> bool;
}

/// Shared handle to a component.
pub type ComponentRef = Rc<RefCell<dyn Component>>;

/// Wrap a component for sharing.
pub fn component<C: Component + 'static>(c: C) -> ComponentRef {
    Rc::new(RefCell::new(c))
}

/// Whether two handles point at the same component.
#[inline]
#[must_use]
pub fn same_component(a: &ComponentRef, b: &ComponentRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

// ─── Container ───────────────────────────────────────────────────────────────

/// An ordered list of children rendered top to bottom.
#[derive(Default)]
pub struct Container {
    children: Vec<ComponentRef>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child.
    pub fn add_child(&mut self, child: ComponentRef) {
        self.children.push(child);
    }

    /// Remove a child by identity. Returns whether it was present.
    pub fn remove_child(&mut self, child: &ComponentRef) -> bool {
        let before = self.children.len();
        self.children.retain(|c| !same_component(c, child));
        self.children.len() != before
    }

    /// Insert a child at `index`, clamped to the end.
    pub fn insert_child_at(&mut self, index: usize, child: ComponentRef) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    /// The children in render order.
    #[must_use]
    pub fn children(&self) -> &[ComponentRef] {
        &self.children
    }

    /// Remove every child.
    pub fn clear(&mut self) {
        self.children.clear();
    }
}

impl Component for Container {
    fn render(&mut self, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for child in &self.children {
            lines.extend(child.borrow_mut().render(width));
        }
        lines
    }

    fn invalidate(&mut self) {
        for child in &self.children {
            child.borrow_mut().invalidate();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Label {
        text: &'static str,
        invalidated: usize,
    }

    impl Label {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                invalidated: 0,
            }
        }
    }

    impl Component for Label {
        fn render(&mut self, width: usize) -> Vec<String> {
            vec![self.text.chars().take(width).collect()]
        }

        fn invalidate(&mut self) {
            self.invalidated += 1;
        }
    }

    #[test]
    fn container_concatenates_children() {
        let mut c = Container::new();
        c.add_child(component(Label::new("one")));
        c.add_child(component(Label::new("two")));
        assert_eq!(c.render(80), vec!["one", "two"]);
        assert_eq!(c.render(2), vec!["on", "tw"]);
    }

    #[test]
    fn insert_and_remove_by_identity() {
        let a = component(Label::new("a"));
        let b = component(Label::new("b"));
        let z = component(Label::new("z"));
        let mut c = Container::new();
        c.add_child(a.clone());
        c.add_child(b.clone());
        c.insert_child_at(0, z.clone());
        assert_eq!(c.render(10), vec!["z", "a", "b"]);

        assert!(c.remove_child(&a));
        assert!(!c.remove_child(&a));
        assert_eq!(c.render(10), vec!["z", "b"]);

        c.insert_child_at(99, a);
        assert_eq!(c.render(10), vec!["z", "b", "a"]);
        assert!(same_component(&c.children()[0], &z));
    }

    #[test]
    fn invalidate_fans_out() {
        let label = Rc::new(RefCell::new(Label::new("x")));
        let mut c = Container::new();
        c.add_child(label.clone());
        c.add_child(label.clone());
        c.invalidate();
        assert_eq!(label.borrow().invalidated, 2);
    }

    #[test]
    fn identity_distinguishes_equal_content() {
        let a = component(Label::new("same"));
        let b = component(Label::new("same"));
        assert!(same_component(&a, &a.clone()));
        assert!(!same_component(&a, &b));
    }

    #[test]
    fn defaults() {
        let mut label = Label::new("x");
        assert!(!label.wants_key_release());
        assert!(label.as_focusable_mut().is_none());
        label.handle_input("a");
    }
}
