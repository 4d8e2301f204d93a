// SPDX-License-Identifier: MIT
//
// Focus tracking.
//
// At most one component holds focus. Moving focus tells the old holder it
// lost focus and the new one it gained it, for components that expose the
// `Focusable` capability. A component already borrowed (it is running its
// own `handle_input` and hid itself, say) cannot be told right away; its
// notification waits in a queue until the runtime calls `flush_pending`.

use crate::component::{ComponentRef, same_component};

#[derive(Default)]
pub struct FocusManager {
    focused: Option<ComponentRef>,
    /// Notifications for components that were busy, oldest first.
    pending: Vec<(ComponentRef, bool)>,
}

impl FocusManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The focused component, if any.
    #[must_use]
    pub fn focused(&self) -> Option<ComponentRef> {
        self.focused.clone()
    }

    /// Whether `component` holds focus.
    #[must_use]
    pub fn is_focused(&self, component: &ComponentRef) -> bool {
        self.focused
            .as_ref()
            .is_some_and(|f| same_component(f, component))
    }

    /// Move focus to `target` (or clear it).
    pub fn set_focus(&mut self, target: Option<ComponentRef>) {
        let unchanged = match (&self.focused, &target) {
            (Some(a), Some(b)) => same_component(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        if let Some(old) = self.focused.take() {
            self.notify(old, false);
        }
        if let Some(new) = &target {
            self.notify(new.clone(), true);
        }
        tracing::trace!(target: "input.keys", focused = target.is_some(), "focus_changed");
        self.focused = target;
    }

    /// Deliver queued notifications to components that are free again.
    pub fn flush_pending(&mut self) {
        for (component, focused) in std::mem::take(&mut self.pending) {
            self.notify(component, focused);
        }
    }

    /// Whether any notification is still queued.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn notify(&mut self, component: ComponentRef, focused: bool) {
        // A newer notification supersedes a queued one.
        self.pending.retain(|(c, _)| !same_component(c, &component));
        if let Ok(mut c) = component.try_borrow_mut() {
            if let Some(f) = c.as_focusable_mut() {
                f.set_focused(focused);
            }
            return;
        }
        tracing::trace!(target: "input.keys", focused, "focus_notify_deferred");
        self.pending.push((component, focused));
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
