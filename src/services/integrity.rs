//! Classification of client-reported environment signals into exam-integrity
//! violations.
//!
//! Detection is best-effort: the signals originate in the trainee's browser
//! and a determined trainee can suppress them before they reach this service.
//! A violation here is a deterrent that ends the attempt with a fully scored
//! submission; it is not a security boundary.

use serde::{Deserialize, Serialize};

/// Outer-vs-inner window delta (px) above which docked devtools are assumed.
pub(crate) const DEVTOOLS_DELTA_THRESHOLD_PX: i32 = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ViolationReason {
    VisibilityChange,
    ScreenshotAttempt,
    DevtoolsAccess,
    ContextMenu,
    DevtoolsResizeHeuristic,
}

impl ViolationReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::VisibilityChange => "visibility_change",
            Self::ScreenshotAttempt => "screenshot_attempt",
            Self::DevtoolsAccess => "devtools_access",
            Self::ContextMenu => "context_menu",
            Self::DevtoolsResizeHeuristic => "devtools_resize_heuristic",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum IntegritySignal {
    VisibilityHidden,
    KeyCombo {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        alt: bool,
    },
    ContextMenu,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct WindowMetrics {
    pub(crate) outer_width: i32,
    pub(crate) inner_width: i32,
    pub(crate) outer_height: i32,
    pub(crate) inner_height: i32,
}

/// Maps a discrete signal to a violation, or `None` for benign input.
pub(crate) fn classify_signal(signal: &IntegritySignal) -> Option<ViolationReason> {
    match signal {
        IntegritySignal::VisibilityHidden => Some(ViolationReason::VisibilityChange),
        IntegritySignal::ContextMenu => Some(ViolationReason::ContextMenu),
        IntegritySignal::KeyCombo { key, ctrl, shift, alt: _ } => {
            classify_key_combo(key, *ctrl, *shift)
        }
    }
}

fn classify_key_combo(key: &str, ctrl: bool, shift: bool) -> Option<ViolationReason> {
    // Alt+PrintScreen and plain PrintScreen both read as the PrintScreen key.
    if key.eq_ignore_ascii_case("PrintScreen") {
        return Some(ViolationReason::ScreenshotAttempt);
    }

    if key.eq_ignore_ascii_case("F12") {
        return Some(ViolationReason::DevtoolsAccess);
    }

    if ctrl && shift {
        let devtools_combo = key.eq_ignore_ascii_case("I")
            || key.eq_ignore_ascii_case("C")
            || key.eq_ignore_ascii_case("J");
        if devtools_combo {
            return Some(ViolationReason::DevtoolsAccess);
        }
    }

    if ctrl && !shift && key.eq_ignore_ascii_case("U") {
        return Some(ViolationReason::DevtoolsAccess);
    }

    None
}

/// The 1 Hz heartbeat heuristic: docked devtools shrink the inner viewport
/// relative to the outer window.
pub(crate) fn evaluate_window_metrics(metrics: &WindowMetrics) -> Option<ViolationReason> {
    let width_delta = metrics.outer_width - metrics.inner_width;
    let height_delta = metrics.outer_height - metrics.inner_height;

    if width_delta > DEVTOOLS_DELTA_THRESHOLD_PX || height_delta > DEVTOOLS_DELTA_THRESHOLD_PX {
        Some(ViolationReason::DevtoolsResizeHeuristic)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo(key: &str, ctrl: bool, shift: bool, alt: bool) -> IntegritySignal {
        IntegritySignal::KeyCombo { key: key.to_string(), ctrl, shift, alt }
    }

    #[test]
    fn visibility_and_context_menu_are_violations() {
        assert_eq!(
            classify_signal(&IntegritySignal::VisibilityHidden),
            Some(ViolationReason::VisibilityChange)
        );
        assert_eq!(
            classify_signal(&IntegritySignal::ContextMenu),
            Some(ViolationReason::ContextMenu)
        );
    }

    #[test]
    fn print_screen_is_a_screenshot_attempt_with_and_without_alt() {
        assert_eq!(
            classify_signal(&combo("PrintScreen", false, false, false)),
            Some(ViolationReason::ScreenshotAttempt)
        );
        assert_eq!(
            classify_signal(&combo("PrintScreen", false, false, true)),
            Some(ViolationReason::ScreenshotAttempt)
        );
    }

    #[test]
    fn devtools_key_combos_are_detected() {
        assert_eq!(
            classify_signal(&combo("F12", false, false, false)),
            Some(ViolationReason::DevtoolsAccess)
        );
        for key in ["I", "C", "J"] {
            assert_eq!(
                classify_signal(&combo(key, true, true, false)),
                Some(ViolationReason::DevtoolsAccess),
                "Ctrl+Shift+{key}"
            );
        }
        assert_eq!(
            classify_signal(&combo("u", true, false, false)),
            Some(ViolationReason::DevtoolsAccess)
        );
    }

    #[test]
    fn ordinary_typing_is_benign() {
        assert_eq!(classify_signal(&combo("a", false, false, false)), None);
        assert_eq!(classify_signal(&combo("C", true, false, false)), None);
        assert_eq!(classify_signal(&combo("Enter", false, true, false)), None);
    }

    #[test]
    fn window_delta_beyond_threshold_trips_heuristic() {
        let benign = WindowMetrics {
            outer_width: 1920,
            inner_width: 1904,
            outer_height: 1080,
            inner_height: 975,
        };
        assert_eq!(evaluate_window_metrics(&benign), None);

        let docked = WindowMetrics {
            outer_width: 1920,
            inner_width: 1500,
            outer_height: 1080,
            inner_height: 1040,
        };
        assert_eq!(
            evaluate_window_metrics(&docked),
            Some(ViolationReason::DevtoolsResizeHeuristic)
        );
    }

    #[test]
    fn delta_exactly_at_threshold_is_benign() {
        let metrics = WindowMetrics {
            outer_width: 1000,
            inner_width: 1000 - DEVTOOLS_DELTA_THRESHOLD_PX,
            outer_height: 800,
            inner_height: 800,
        };
        assert_eq!(evaluate_window_metrics(&metrics), None);
    }
}
