// Shortcut dispatch for viewport navigation
//
// Default bindings:
// - Arrow keys / hjkl: Move focus
// - Home / End: First / last item
// - Space: Toggle selection (Ctrl or Meta + Space adds to the selection)
// - Enter: Open focused item

use std::fmt;
use std::rc::Rc;

use super::geometry::Direction;

/// Keys the navigation layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Enter,
    Space,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };
}

/// A key plus modifiers. Character keys are stored lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: Key) -> Self {
        Self::with_modifiers(key, Modifiers::NONE)
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        let key = match key {
            Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
            other => other,
        };
        Self { key, modifiers }
    }
}

impl From<Key> for KeyChord {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

/// Navigation actions a shortcut can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Move(Direction),
    Home,
    End,
    /// With `multi`, the focused item is added to or removed from the
    /// selection; otherwise it replaces the selection.
    ToggleSelect { multi: bool },
    Open,
}

/// Predicate deciding whether a shortcut is currently active.
pub type ActivePredicate = Rc<dyn Fn() -> bool>;

pub struct Shortcut {
    pub label: String,
    pub chord: KeyChord,
    pub action: NavAction,
    when: ActivePredicate,
}

impl Shortcut {
    pub fn is_active(&self) -> bool {
        (self.when)()
    }
}

impl fmt::Debug for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortcut")
            .field("label", &self.label)
            .field("chord", &self.chord)
            .field("action", &self.action)
            .field("when", &"<closure>")
            .finish()
    }
}

/// Ordered set of shortcuts; the first active match wins.
#[derive(Debug, Default)]
pub struct ShortcutRegistry {
    shortcuts: Vec<Shortcut>,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        label: impl Into<String>,
        chord: KeyChord,
        action: NavAction,
        when: ActivePredicate,
    ) {
        self.shortcuts.push(Shortcut {
            label: label.into(),
            chord,
            action,
            when,
        });
    }

    /// Removes every shortcut with `label`. Returns how many were removed.
    pub fn unregister(&mut self, label: &str) -> usize {
        let before = self.shortcuts.len();
        self.shortcuts.retain(|s| s.label != label);
        before - self.shortcuts.len()
    }

    pub fn dispatch(&self, chord: &KeyChord) -> Option<NavAction> {
        self.shortcuts
            .iter()
            .find(|s| s.chord == *chord && s.is_active())
            .map(|s| s.action)
    }

    pub fn shortcuts(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    pub fn len(&self) -> usize {
        self.shortcuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }
}

/// The navigation key map.
pub fn default_bindings() -> Vec<(&'static str, KeyChord, NavAction)> {
    let mut bindings = Vec::new();

    let moves = [
        (Key::Up, Key::Char('k'), Direction::Up),
        (Key::Down, Key::Char('j'), Direction::Down),
        (Key::Left, Key::Char('h'), Direction::Left),
        (Key::Right, Key::Char('l'), Direction::Right),
    ];
    for (arrow, vim, direction) in moves {
        bindings.push(("nav.move", KeyChord::new(arrow), NavAction::Move(direction)));
        bindings.push(("nav.move", KeyChord::new(vim), NavAction::Move(direction)));
    }

    bindings.push(("nav.home", KeyChord::new(Key::Home), NavAction::Home));
    bindings.push(("nav.end", KeyChord::new(Key::End), NavAction::End));
    bindings.push((
        "nav.select",
        KeyChord::new(Key::Space),
        NavAction::ToggleSelect { multi: false },
    ));
    for modifiers in [Modifiers::CTRL, Modifiers::META] {
        bindings.push((
            "nav.select",
            KeyChord::with_modifiers(Key::Space, modifiers),
            NavAction::ToggleSelect { multi: true },
        ));
    }
    bindings.push(("nav.open", KeyChord::new(Key::Enter), NavAction::Open));

    bindings
}
