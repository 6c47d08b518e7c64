#![forbid(unsafe_code)]

//! Key presses that scroll.

use apz_core::event::{KeyCode, KeyboardInput, Modifiers};
use apz_core::geometry::Axis;

/// How far a key scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollUnit {
    Line,
    Page,
    /// To the start or end of the content.
    Whole,
}

/// A scroll requested by the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardScrollAction {
    pub axis: Axis,
    pub unit: ScrollUnit,
    /// Toward the end of the content (right, down).
    pub forward: bool,
}

impl KeyboardScrollAction {
    /// Action for a key press, or `None` when the key does not scroll.
    ///
    /// Presses with Ctrl, Alt or Super are shortcuts and never scroll.
    #[must_use]
    pub fn for_input(input: &KeyboardInput) -> Option<Self> {
        if input
            .modifiers
            .intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::SUPER)
        {
            return None;
        }
        let shift = input.modifiers.contains(Modifiers::SHIFT);
        let (axis, unit, forward) = match input.code {
            KeyCode::Up => (Axis::Y, ScrollUnit::Line, false),
            KeyCode::Down => (Axis::Y, ScrollUnit::Line, true),
            KeyCode::Left => (Axis::X, ScrollUnit::Line, false),
            KeyCode::Right => (Axis::X, ScrollUnit::Line, true),
            KeyCode::PageUp => (Axis::Y, ScrollUnit::Page, false),
            KeyCode::PageDown => (Axis::Y, ScrollUnit::Page, true),
            KeyCode::Space => (Axis::Y, ScrollUnit::Page, !shift),
            KeyCode::Home => (Axis::Y, ScrollUnit::Whole, false),
            KeyCode::End => (Axis::Y, ScrollUnit::Whole, true),
            KeyCode::Char(_) | KeyCode::Other(_) => return None,
        };
        Some(Self {
            axis,
            unit,
            forward,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_time::Instant;

    #[test]
    fn arrows_and_pages_map_to_actions() {
        let now = Instant::now();
        let down = KeyboardScrollAction::for_input(&KeyboardInput::new(KeyCode::Down, now));
        assert_eq!(
            down,
            Some(KeyboardScrollAction {
                axis: Axis::Y,
                unit: ScrollUnit::Line,
                forward: true
            })
        );
        let space_up = KeyboardScrollAction::for_input(
            &KeyboardInput::new(KeyCode::Space, now).with_modifiers(Modifiers::SHIFT),
        );
        assert_eq!(space_up.map(|a| (a.unit, a.forward)), Some((ScrollUnit::Page, false)));
    }

    #[test]
    fn shortcuts_and_text_do_not_scroll() {
        let now = Instant::now();
        assert!(KeyboardScrollAction::for_input(
            &KeyboardInput::new(KeyCode::Down, now).with_modifiers(Modifiers::CTRL)
        )
        .is_none());
        assert!(KeyboardScrollAction::for_input(&KeyboardInput::new(KeyCode::Char('a'), now)).is_none());
    }
}
