use serde::{Deserialize, Serialize};

/// How a hidden tab is handled. Both behaviours exist in deployed exam flows, so
/// the choice is made per deployment rather than merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TabSwitchPolicy {
    /// Submit on the first hide.
    Immediate,
    /// Warn for the first `tolerated` hides, submit on the next one.
    WarnThenSubmit { tolerated: u32 },
}

impl TabSwitchPolicy {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::WarnThenSubmit { .. } => "warn",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct KeyChord {
    pub(crate) key: String,
    #[serde(default, alias = "ctrlKey")]
    pub(crate) ctrl: bool,
    #[serde(default, alias = "shiftKey")]
    pub(crate) shift: bool,
    #[serde(default, alias = "altKey")]
    pub(crate) alt: bool,
    #[serde(default, alias = "metaKey")]
    pub(crate) meta: bool,
}

/// Environment signals reported by the exam client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum IntegritySignal {
    FullscreenEntered,
    FullscreenExited,
    FullscreenUnsupported,
    VisibilityHidden,
    KeyPressed(KeyChord),
    ContextMenu,
    Copy,
    Cut,
    Paste,
    BackNavigation,
}

impl IntegritySignal {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::FullscreenEntered => "fullscreen_entered",
            Self::FullscreenExited => "fullscreen_exited",
            Self::FullscreenUnsupported => "fullscreen_unsupported",
            Self::VisibilityHidden => "visibility_hidden",
            Self::KeyPressed(_) => "key_pressed",
            Self::ContextMenu => "context_menu",
            Self::Copy => "copy",
            Self::Cut => "cut",
            Self::Paste => "paste",
            Self::BackNavigation => "back_navigation",
        }
    }
}

/// Conditions that end the exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Violation {
    FullscreenExit,
    TabSwitch,
    EscapeKey,
    ReloadShortcut,
    DevtoolsShortcut,
}

impl Violation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::FullscreenExit => "fullscreen_exit",
            Self::TabSwitch => "tab_switch",
            Self::EscapeKey => "escape_key",
            Self::ReloadShortcut => "reload_shortcut",
            Self::DevtoolsShortcut => "devtools_shortcut",
        }
    }
}

/// Actions blocked on the client without ending the exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Suppression {
    ContextMenu,
    Clipboard,
    BackNavigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub(crate) enum Verdict {
    Ignored,
    Suppressed { action: Suppression },
    Warned { tab_switches: u32, remaining: u32 },
    Terminate { violation: Violation },
}

impl Verdict {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Suppressed { .. } => "suppressed",
            Self::Warned { .. } => "warned",
            Self::Terminate { .. } => "terminate",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct IntegrityMonitor {
    policy: TabSwitchPolicy,
    active: bool,
    fullscreen_engaged: bool,
    fullscreen_supported: bool,
    tab_switches: u32,
    warnings: u32,
}

impl IntegrityMonitor {
    pub(crate) fn new(policy: TabSwitchPolicy) -> Self {
        Self {
            policy,
            active: true,
            fullscreen_engaged: false,
            fullscreen_supported: true,
            tab_switches: 0,
            warnings: 0,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn tab_switches(&self) -> u32 {
        self.tab_switches
    }

    pub(crate) fn warnings(&self) -> u32 {
        self.warnings
    }

    pub(crate) fn stop(&mut self) {
        self.active = false;
    }

    /// Classifies a signal. A terminating verdict stops the monitor; once stopped
    /// every signal is ignored.
    pub(crate) fn observe(&mut self, signal: &IntegritySignal) -> Verdict {
        if !self.active {
            return Verdict::Ignored;
        }

        let verdict = match signal {
            IntegritySignal::FullscreenEntered => {
                if self.fullscreen_supported {
                    self.fullscreen_engaged = true;
                }
                Verdict::Ignored
            }
            IntegritySignal::FullscreenUnsupported => {
                self.fullscreen_supported = false;
                self.fullscreen_engaged = false;
                Verdict::Ignored
            }
            IntegritySignal::FullscreenExited => {
                if self.fullscreen_engaged {
                    Verdict::Terminate { violation: Violation::FullscreenExit }
                } else {
                    Verdict::Ignored
                }
            }
            IntegritySignal::VisibilityHidden => self.on_tab_switch(),
            IntegritySignal::KeyPressed(chord) => match classify_key(chord) {
                Some(violation) => Verdict::Terminate { violation },
                None => Verdict::Ignored,
            },
            IntegritySignal::ContextMenu => {
                Verdict::Suppressed { action: Suppression::ContextMenu }
            }
            IntegritySignal::Copy | IntegritySignal::Cut | IntegritySignal::Paste => {
                Verdict::Suppressed { action: Suppression::Clipboard }
            }
            IntegritySignal::BackNavigation => {
                Verdict::Suppressed { action: Suppression::BackNavigation }
            }
        };

        match verdict {
            Verdict::Terminate { .. } => self.stop(),
            Verdict::Suppressed { .. } | Verdict::Warned { .. } => self.warnings += 1,
            Verdict::Ignored => {}
        }

        verdict
    }

    fn on_tab_switch(&mut self) -> Verdict {
        self.tab_switches += 1;
        match self.policy {
            TabSwitchPolicy::Immediate => Verdict::Terminate { violation: Violation::TabSwitch },
            TabSwitchPolicy::WarnThenSubmit { tolerated } if self.tab_switches > tolerated => {
                Verdict::Terminate { violation: Violation::TabSwitch }
            }
            TabSwitchPolicy::WarnThenSubmit { tolerated } => Verdict::Warned {
                tab_switches: self.tab_switches,
                remaining: tolerated - self.tab_switches,
            },
        }
    }
}

fn classify_key(chord: &KeyChord) -> Option<Violation> {
    let key = chord.key.to_ascii_lowercase();
    let command = chord.ctrl || chord.meta;

    match key.as_str() {
        "escape" | "esc" => Some(Violation::EscapeKey),
        "f5" => Some(Violation::ReloadShortcut),
        "r" if command => Some(Violation::ReloadShortcut),
        "f12" => Some(Violation::DevtoolsShortcut),
        "i" | "j" | "c" if (chord.ctrl && chord.shift) || (chord.meta && chord.alt) => {
            Some(Violation::DevtoolsShortcut)
        }
        "u" if command => Some(Violation::DevtoolsShortcut),
        _ => None,
    }
}
