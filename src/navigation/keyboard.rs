use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::trace;

use super::geometry::{self, Direction};
use super::shortcuts::{default_bindings, KeyChord, NavAction, ShortcutRegistry};
use crate::controller::ViewportController;
use crate::models::ItemId;

/// The scrollable element hosting the viewport.
///
/// Scroll events caused by `scroll_to` are expected to reach the controller
/// through the host's usual `handle_scroll` wiring.
pub trait ScrollContainer {
    fn scroll_top(&self) -> f64;
    fn viewport_height(&self) -> f64;
    fn scroll_to(&self, scroll_top: f64);
}

/// Callback type for focus changes
pub type FocusChangedCallback = Box<dyn Fn(Option<ItemId>)>;

/// Callback type for selection changes, with the selection in item order
pub type SelectionChangedCallback = Box<dyn Fn(&[ItemId])>;

/// Callback type for open requests
pub type OpenCallback = Box<dyn Fn(ItemId)>;

#[derive(Debug, Default)]
struct NavState {
    order: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    focused: Option<ItemId>,
    selected: HashSet<ItemId>,
}

impl NavState {
    fn selected_in_order(&self) -> Vec<ItemId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.selected.contains(id))
            .collect()
    }
}

/// Focus, selection and open over the virtual item set.
///
/// Movement is geometric over the controller's visible positions, falling
/// back to item order when the focused item is off screen or nothing lies in
/// the requested direction.
pub struct KeyboardNavigator {
    controller: Rc<ViewportController>,
    scroller: Rc<dyn ScrollContainer>,
    state: Rc<RefCell<NavState>>,
    on_focus_changed: RefCell<Option<FocusChangedCallback>>,
    on_selection_changed: RefCell<Option<SelectionChangedCallback>>,
    on_open: RefCell<Option<OpenCallback>>,
}

impl KeyboardNavigator {
    pub fn new(controller: Rc<ViewportController>, scroller: Rc<dyn ScrollContainer>) -> Self {
        Self {
            controller,
            scroller,
            state: Rc::new(RefCell::new(NavState::default())),
            on_focus_changed: RefCell::new(None),
            on_selection_changed: RefCell::new(None),
            on_open: RefCell::new(None),
        }
    }

    /// Sets the full item order (the same list given to the controller).
    ///
    /// Focus and selection survive for ids still present.
    pub fn set_items(&self, order: Vec<ItemId>) {
        let mut state = self.state.borrow_mut();
        state.index = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        state.order = order;

        let focus_lost = state.focused.is_some_and(|id| !state.index.contains_key(&id));
        if focus_lost {
            state.focused = None;
        }
        let before = state.selected.len();
        let index = &state.index;
        let retained: HashSet<ItemId> = state
            .selected
            .iter()
            .copied()
            .filter(|id| index.contains_key(id))
            .collect();
        state.selected = retained;
        let selection = (state.selected.len() != before).then(|| state.selected_in_order());
        drop(state); // Release borrow before callback

        if focus_lost {
            self.notify_focus(None);
        }
        if let Some(selection) = selection {
            self.notify_selection(&selection);
        }
    }

    pub fn focused(&self) -> Option<ItemId> {
        self.state.borrow().focused
    }

    /// Selected ids in item order.
    pub fn selected(&self) -> Vec<ItemId> {
        self.state.borrow().selected_in_order()
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.state.borrow().selected.contains(&id)
    }

    pub fn has_items(&self) -> bool {
        !self.state.borrow().order.is_empty()
    }

    /// Registers the default bindings, active only while there are items.
    pub fn register_shortcuts(&self, registry: &mut ShortcutRegistry) {
        for (label, chord, action) in default_bindings() {
            let state = Rc::clone(&self.state);
            registry.register(label, chord, action, Rc::new(move || !state.borrow().order.is_empty()));
        }
    }

    /// Dispatches `chord` through `registry` and performs the action.
    /// Returns true if a shortcut matched.
    pub async fn handle_key(&self, registry: &ShortcutRegistry, chord: KeyChord) -> bool {
        match registry.dispatch(&chord) {
            Some(action) => {
                self.perform(action).await;
                true
            }
            None => false,
        }
    }

    pub async fn perform(&self, action: NavAction) {
        match action {
            NavAction::Move(direction) => {
                self.move_focus(direction).await;
            }
            NavAction::Home => {
                self.home().await;
            }
            NavAction::End => {
                self.end().await;
            }
            NavAction::ToggleSelect { multi } => {
                self.toggle_select(multi);
            }
            NavAction::Open => {
                self.open();
            }
        }
    }

    /// Moves focus one step in `direction`. Returns the newly focused id, or
    /// `None` if focus did not move.
    pub async fn move_focus(&self, direction: Direction) -> Option<ItemId> {
        let (current, current_index, len) = {
            let state = self.state.borrow();
            let first = *state.order.first()?;
            match state.focused {
                Some(id) => (id, state.index.get(&id).copied(), state.order.len()),
                None => {
                    drop(state);
                    return self.focus(first).await.then_some(first);
                }
            }
        };

        let epsilon = self.controller.tuning().navigation_epsilon;
        let geometric = self.controller.visible_items().with(|visible| {
            let pos = visible.iter().find(|pos| pos.id == current)?;
            geometry::nearest_in_direction(pos, visible, direction, epsilon)
        });

        let target = match geometric {
            Some(id) => Some(id),
            None => current_index
                .and_then(|index| geometry::linear_neighbor(len, index, direction))
                .and_then(|index| self.state.borrow().order.get(index).copied()),
        };

        trace!(?direction, from = current, to = ?target, "Focus move");
        let target = target?;
        self.focus(target).await.then_some(target)
    }

    pub async fn home(&self) -> Option<ItemId> {
        let first = self.state.borrow().order.first().copied()?;
        self.focus(first).await.then_some(first)
    }

    pub async fn end(&self) -> Option<ItemId> {
        let last = self.state.borrow().order.last().copied()?;
        self.focus(last).await.then_some(last)
    }

    /// Focuses `id` and scrolls it into view. Returns false for unknown ids.
    pub async fn focus(&self, id: ItemId) -> bool {
        let changed = {
            let mut state = self.state.borrow_mut();
            if !state.index.contains_key(&id) {
                return false;
            }
            state.focused.replace(id) != Some(id)
        };
        if changed {
            self.notify_focus(Some(id));
        }
        self.scroll_into_view(id).await;
        true
    }

    /// Toggles the focused item's selection. Without `multi`, the selection
    /// becomes just the focused item (or empty if it was the only one).
    pub fn toggle_select(&self, multi: bool) -> bool {
        let selection = {
            let mut state = self.state.borrow_mut();
            let Some(id) = state.focused else {
                return false;
            };
            if multi {
                if !state.selected.remove(&id) {
                    state.selected.insert(id);
                }
            } else if state.selected.len() == 1 && state.selected.contains(&id) {
                state.selected.clear();
            } else {
                state.selected.clear();
                state.selected.insert(id);
            }
            state.selected_in_order()
        };
        self.notify_selection(&selection);
        true
    }

    pub fn clear_selection(&self) {
        let had_selection = {
            let mut state = self.state.borrow_mut();
            let had = !state.selected.is_empty();
            state.selected.clear();
            had
        };
        if had_selection {
            self.notify_selection(&[]);
        }
    }

    /// Requests opening the focused item.
    pub fn open(&self) -> bool {
        let Some(id) = self.focused() else {
            return false;
        };
        if let Some(ref callback) = *self.on_open.borrow() {
            callback(id);
        }
        true
    }

    /// Scrolls the container so `id` is visible.
    ///
    /// Uses the item's position when the controller knows it, otherwise an
    /// estimate from the average item height.
    pub async fn scroll_into_view(&self, id: ItemId) {
        let scroll_top = self.scroller.scroll_top();
        let viewport_height = self.scroller.viewport_height();

        if let Some(pos) = self.controller.get_item_position(id).await {
            let margin = self.controller.tuning().scroll_margin;
            if let Some(target) =
                geometry::scroll_into_view(&pos, scroll_top, viewport_height, margin)
            {
                self.scroller.scroll_to(target);
            }
            return;
        }

        let (index, count) = {
            let state = self.state.borrow();
            match state.index.get(&id) {
                Some(&index) => (index, state.order.len()),
                None => return,
            }
        };
        let total_height = self.controller.total_height().get();
        let target = geometry::estimate_offset(index, count, total_height);
        trace!(id, target, "Scrolling to estimated offset");
        self.scroller.scroll_to(target);
    }

    /// Connect callback for focus changes
    pub fn connect_focus_changed<F>(&self, callback: F)
    where
        F: Fn(Option<ItemId>) + 'static,
    {
        *self.on_focus_changed.borrow_mut() = Some(Box::new(callback));
    }

    /// Connect callback for selection changes
    pub fn connect_selection_changed<F>(&self, callback: F)
    where
        F: Fn(&[ItemId]) + 'static,
    {
        *self.on_selection_changed.borrow_mut() = Some(Box::new(callback));
    }

    /// Connect callback for open requests
    pub fn connect_open<F>(&self, callback: F)
    where
        F: Fn(ItemId) + 'static,
    {
        *self.on_open.borrow_mut() = Some(Box::new(callback));
    }

    fn notify_focus(&self, id: Option<ItemId>) {
        if let Some(ref callback) = *self.on_focus_changed.borrow() {
            callback(id);
        }
    }

    fn notify_selection(&self, selection: &[ItemId]) {
        if let Some(ref callback) = *self.on_selection_changed.borrow() {
            callback(selection);
        }
    }
}
