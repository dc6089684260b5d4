use crate::core::notify::Notifier;

pub(crate) const TAB_SWITCH_WARNING: &str =
    "Warning: Tab switching detected! Stay focused on the exam.";
pub(crate) const FOCUS_LOST_WARNING: &str =
    "Warning: Window lost focus! Please stay on the exam page.";
pub(crate) const BLOCKED_ACTION_WARNING: &str = "This action is not allowed during the exam!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Key {
    Char(char),
    Function(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyChord {
    pub(crate) ctrl: bool,
    pub(crate) shift: bool,
    pub(crate) key: Key,
}

impl KeyChord {
    pub(crate) fn ctrl(letter: char) -> Self {
        Self { ctrl: true, shift: false, key: Key::Char(letter) }
    }

    /// Maps a C0 control byte (`0x01..=0x1a`) back to the Ctrl+letter that
    /// produced it. Tab, line feed and carriage return are ordinary input.
    pub(crate) fn from_control_char(value: char) -> Option<Self> {
        match value {
            '\t' | '\n' | '\r' => None,
            '\u{1}'..='\u{1a}' => {
                let letter = char::from(b'a' + (value as u8) - 1);
                Some(Self::ctrl(letter))
            }
            _ => None,
        }
    }

    /// Decodes the parameters and final byte of a CSI key report: `24~` style
    /// function keys and `codepoint;modifiers u` keyboard-protocol keys. The
    /// modifier field is 1 plus a bitmask of shift (1), alt (2) and ctrl (4).
    pub(crate) fn from_csi(params: &str, final_byte: char) -> Option<Self> {
        let mut fields = params.split(';');
        let code = fields.next()?.split(':').next()?.parse::<u32>().ok()?;
        let modifiers = match fields.next() {
            Some(raw) => raw.split(':').next()?.parse::<u32>().ok()?,
            None => 1,
        };
        let bits = modifiers.saturating_sub(1);

        let key = match final_byte {
            '~' => Key::Function(function_number(code)?),
            'u' => Key::Char(char::from_u32(code)?.to_ascii_lowercase()),
            _ => return None,
        };
        Some(Self { ctrl: bits & 4 != 0, shift: bits & 1 != 0, key })
    }

    pub(crate) fn is_blocked(&self) -> bool {
        match (self.ctrl, self.shift, self.key) {
            (_, _, Key::Function(12)) => true,
            (true, true, Key::Char(letter)) => {
                matches!(letter.to_ascii_lowercase(), 'i' | 'j' | 'c')
            }
            (true, false, Key::Char(letter)) => {
                matches!(letter.to_ascii_lowercase(), 'c' | 'a' | 'v' | 'x' | 'p' | 's' | 'u')
            }
            _ => false,
        }
    }
}

fn function_number(code: u32) -> Option<u8> {
    let number = match code {
        11..=15 => code - 10,
        17..=21 => code - 11,
        23 | 24 => code - 12,
        _ => return None,
    };
    u8::try_from(number).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnvironmentEvent {
    VisibilityHidden,
    FocusLost,
    Shortcut(KeyChord),
    ContextMenu,
}

/// Watches the exam environment while attached and only ever warns. It never
/// pauses the countdown, ends the attempt, or reports anything to the server.
#[derive(Debug)]
pub(crate) struct AdvisoryMonitor {
    notifier: Notifier,
    attached: bool,
    warnings: u32,
}

impl AdvisoryMonitor {
    pub(crate) fn new(notifier: Notifier) -> Self {
        Self { notifier, attached: false, warnings: 0 }
    }

    pub(crate) fn attach(&mut self) {
        if !self.attached {
            self.attached = true;
            tracing::debug!("Advisory monitor attached");
        }
    }

    pub(crate) fn detach(&mut self) {
        if self.attached {
            self.attached = false;
            tracing::debug!(warnings = self.warnings, "Advisory monitor detached");
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn warnings(&self) -> u32 {
        self.warnings
    }

    /// Returns the warning shown for `event`, if any.
    pub(crate) fn observe(&mut self, event: EnvironmentEvent) -> Option<&'static str> {
        if !self.attached {
            return None;
        }

        let warning = match event {
            EnvironmentEvent::VisibilityHidden => Some(TAB_SWITCH_WARNING),
            EnvironmentEvent::FocusLost => Some(FOCUS_LOST_WARNING),
            EnvironmentEvent::Shortcut(chord) if chord.is_blocked() => Some(BLOCKED_ACTION_WARNING),
            EnvironmentEvent::Shortcut(_) | EnvironmentEvent::ContextMenu => None,
        }?;

        self.warnings += 1;
        tracing::info!(?event, warnings = self.warnings, "Exam integrity warning");
        if matches!(event, EnvironmentEvent::Shortcut(_)) {
            self.notifier.error(warning);
        } else {
            self.notifier.warning(warning);
        }
        Some(warning)
    }
}

impl Drop for AdvisoryMonitor {
    fn drop(&mut self) {
        self.detach();
    }
}
