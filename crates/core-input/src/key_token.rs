use core_events::{RawSignal, SignalId, Transition};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers,
};
use std::time::Instant;

/// Result of translating a terminal key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyTranslation {
    Signal(RawSignal),
    /// Ctrl-C: never mapped to an action, raises the shutdown flag instead.
    Interrupt,
    Ignored,
}

/// Map a crossterm key event into a raw signal stamped with `at`.
///
/// Auto-repeat is reported as a press; debounce throttles it like any other
/// re-trigger of the same key.
pub(crate) fn translate_key_event(event: &CKeyEvent, at: Instant) -> KeyTranslation {
    if event.modifiers.contains(CKeyModifiers::CONTROL)
        && matches!(event.code, CKeyCode::Char('c') | CKeyCode::Char('C'))
    {
        return KeyTranslation::Interrupt;
    }
    let Some(name) = key_name(&event.code) else {
        return KeyTranslation::Ignored;
    };
    let transition = match event.kind {
        CKeyEventKind::Press | CKeyEventKind::Repeat => Transition::Press,
        CKeyEventKind::Release => Transition::Release,
    };
    KeyTranslation::Signal(RawSignal::new(SignalId::Key(name), transition, at))
}

/// Normalized key name used by keyboard mappings.
pub(crate) fn key_name(code: &CKeyCode) -> Option<String> {
    let name = match code {
        CKeyCode::Char(' ') => "space".to_string(),
        CKeyCode::Char(c) => c.to_lowercase().collect(),
        CKeyCode::Enter => "enter".to_string(),
        CKeyCode::Esc => "esc".to_string(),
        CKeyCode::Backspace => "backspace".to_string(),
        CKeyCode::Tab | CKeyCode::BackTab => "tab".to_string(),
        CKeyCode::Up => "up".to_string(),
        CKeyCode::Down => "down".to_string(),
        CKeyCode::Left => "left".to_string(),
        CKeyCode::Right => "right".to_string(),
        CKeyCode::Home => "home".to_string(),
        CKeyCode::End => "end".to_string(),
        CKeyCode::PageUp => "pageup".to_string(),
        CKeyCode::PageDown => "pagedown".to_string(),
        CKeyCode::Delete => "delete".to_string(),
        CKeyCode::F(n) => format!("f{n}"),
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: CKeyCode, mods: CKeyModifiers, kind: CKeyEventKind) -> CKeyEvent {
        CKeyEvent::new_with_kind(code, mods, kind)
    }

    #[test]
    fn named_and_char_keys_normalize() {
        assert_eq!(key_name(&CKeyCode::Enter).as_deref(), Some("enter"));
        assert_eq!(key_name(&CKeyCode::Char('K')).as_deref(), Some("k"));
        assert_eq!(key_name(&CKeyCode::Char(' ')).as_deref(), Some("space"));
        assert_eq!(key_name(&CKeyCode::F(5)).as_deref(), Some("f5"));
        assert_eq!(key_name(&CKeyCode::CapsLock), None);
    }

    #[test]
    fn repeat_is_press_and_release_is_release() {
        let at = Instant::now();
        let repeat = key(CKeyCode::Down, CKeyModifiers::NONE, CKeyEventKind::Repeat);
        let release = key(CKeyCode::Down, CKeyModifiers::NONE, CKeyEventKind::Release);
        assert_eq!(
            translate_key_event(&repeat, at),
            KeyTranslation::Signal(RawSignal::press(SignalId::key("down"), at))
        );
        assert_eq!(
            translate_key_event(&release, at),
            KeyTranslation::Signal(RawSignal::release(SignalId::key("down"), at))
        );
    }

    #[test]
    fn ctrl_c_is_interrupt() {
        let ev = key(CKeyCode::Char('c'), CKeyModifiers::CONTROL, CKeyEventKind::Press);
        assert_eq!(translate_key_event(&ev, Instant::now()), KeyTranslation::Interrupt);
    }
}
