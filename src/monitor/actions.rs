//! Scripted input sequences.
//!
//! A script is a list of steps run in order. A failing step ends the
//! script for this cycle; stop requests are honoured between steps and
//! inside waits, never halfway through an input.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::InputError;
use crate::monitor::state::StopSignal;
use crate::platform::InputInjector;

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionStep {
    Click {
        #[serde(default = "one")]
        count: u32,
        #[serde(default)]
        interval_ms: u64,
    },
    RightClick {
        #[serde(default = "one")]
        count: u32,
        #[serde(default)]
        interval_ms: u64,
    },
    MoveTo {
        x: i32,
        y: i32,
    },
    MoveBy {
        dx: i32,
        dy: i32,
    },
    Tap {
        key: String,
    },
    /// Taps `key` `repeat` times, `interval_ms` apart.
    Press {
        key: String,
        #[serde(default = "one")]
        repeat: u32,
        #[serde(default)]
        interval_ms: u64,
    },
    Hold {
        key: String,
        duration_ms: u64,
    },
    Wait {
        ms: u64,
    },
    /// `steps` random relative moves of at most `radius` pixels per axis.
    Jitter {
        radius: i32,
        #[serde(default = "one")]
        steps: u32,
    },
}

impl ActionStep {
    /// Key named by this step, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ActionStep::Tap { key } | ActionStep::Press { key, .. } | ActionStep::Hold { key, .. } => {
                Some(key.as_str())
            }
            _ => None,
        }
    }
}

/// Right-click farming then the Q/W skill pair.
pub fn default_action_script() -> Vec<ActionStep> {
    vec![
        ActionStep::RightClick {
            count: 24,
            interval_ms: 250,
        },
        ActionStep::Tap {
            key: "q".to_string(),
        },
        ActionStep::Wait { ms: 750 },
        ActionStep::Tap {
            key: "w".to_string(),
        },
    ]
}

const NAMED_KEYS: [&str; 16] = [
    "space", "enter", "escape", "esc", "tab", "backspace", "shift", "ctrl", "alt", "up", "down",
    "left", "right", "home", "end", "delete",
];

/// Key names the input backends understand.
pub fn is_known_key(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    let single_char = name.len() == 1
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let function_key = name
        .strip_prefix('f')
        .and_then(|n| n.parse::<u8>().ok())
        .is_some_and(|n| (1..=12).contains(&n));
    single_char || function_key || NAMED_KEYS.contains(&name.as_str())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptOutcome {
    Completed,
    Stopped,
}

/// Runs `steps` against `input`.
pub fn run_script(
    name: &str,
    steps: &[ActionStep],
    input: &dyn InputInjector,
    stop: &StopSignal,
) -> Result<ScriptOutcome, InputError> {
    if steps.is_empty() {
        return Ok(ScriptOutcome::Completed);
    }
    info!("Running {} script ({} steps)", name, steps.len());

    for step in steps {
        if stop.is_stopped() {
            return Ok(ScriptOutcome::Stopped);
        }
        debug!("{} step: {:?}", name, step);
        let stopped = match step {
            ActionStep::Click { count, interval_ms } => {
                repeat(*count, *interval_ms, stop, || input.click())?
            }
            ActionStep::RightClick { count, interval_ms } => {
                repeat(*count, *interval_ms, stop, || input.right_click())?
            }
            ActionStep::MoveTo { x, y } => {
                input.move_to(*x, *y)?;
                false
            }
            ActionStep::MoveBy { dx, dy } => {
                input.move_by(*dx, *dy)?;
                false
            }
            ActionStep::Tap { key } => {
                input.tap(key)?;
                false
            }
            ActionStep::Press {
                key,
                repeat: times,
                interval_ms,
            } => repeat(*times, *interval_ms, stop, || input.tap(key))?,
            ActionStep::Hold { key, duration_ms } => {
                input.hold(key, Duration::from_millis(*duration_ms))?;
                false
            }
            ActionStep::Wait { ms } => stop.wait(Duration::from_millis(*ms)),
            ActionStep::Jitter { radius, steps } => {
                let radius = radius.checked_abs().unwrap_or(i32::MAX);
                let mut rng = rand::thread_rng();
                for _ in 0..*steps {
                    let dx = rng.gen_range(-radius..=radius);
                    let dy = rng.gen_range(-radius..=radius);
                    input.move_by(dx, dy)?;
                }
                false
            }
        };
        if stopped {
            return Ok(ScriptOutcome::Stopped);
        }
    }
    Ok(ScriptOutcome::Completed)
}

/// Calls `action` `count` times with `interval_ms` between calls.
/// Returns `true` if stopped during a pause.
fn repeat(
    count: u32,
    interval_ms: u64,
    stop: &StopSignal,
    mut action: impl FnMut() -> Result<(), InputError>,
) -> Result<bool, InputError> {
    for i in 0..count {
        action()?;
        if i + 1 < count && stop.wait(Duration::from_millis(interval_ms)) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl Recorder {
        fn log(&self, call: String) -> Result<(), InputError> {
            if self.fail_on.is_some_and(|f| call.starts_with(f)) {
                return Err(InputError::Failed(call));
            }
            self.calls.borrow_mut().push(call);
            Ok(())
        }
    }

    impl InputInjector for Recorder {
        fn move_to(&self, x: i32, y: i32) -> Result<(), InputError> {
            self.log(format!("move_to {} {}", x, y))
        }
        fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
            assert!(dx.abs() <= 5 && dy.abs() <= 5);
            self.log("move_by".to_string())
        }
        fn click(&self) -> Result<(), InputError> {
            self.log("click".to_string())
        }
        fn right_click(&self) -> Result<(), InputError> {
            self.log("right_click".to_string())
        }
        fn key_down(&self, key: &str) -> Result<(), InputError> {
            self.log(format!("down {}", key))
        }
        fn key_up(&self, key: &str) -> Result<(), InputError> {
            self.log(format!("up {}", key))
        }
    }

    #[test]
    fn test_default_script_shape() {
        let input = Recorder::default();
        let steps: Vec<ActionStep> = default_action_script()
            .into_iter()
            .map(|s| match s {
                ActionStep::RightClick { count, .. } => ActionStep::RightClick { count, interval_ms: 0 },
                ActionStep::Wait { .. } => ActionStep::Wait { ms: 0 },
                other => other,
            })
            .collect();

        let outcome = run_script("action", &steps, &input, &StopSignal::new()).unwrap();
        assert_eq!(outcome, ScriptOutcome::Completed);

        let calls = input.calls.borrow();
        assert_eq!(calls.iter().filter(|c| *c == "right_click").count(), 24);
        assert_eq!(&calls[24..], ["down q", "up q", "down w", "up w"]);
    }

    #[test]
    fn test_failure_aborts_rest_of_script() {
        let input = Recorder {
            fail_on: Some("down q"),
            ..Default::default()
        };
        let steps = vec![
            ActionStep::Click { count: 1, interval_ms: 0 },
            ActionStep::Tap { key: "q".to_string() },
            ActionStep::Tap { key: "w".to_string() },
        ];
        assert!(run_script("action", &steps, &input, &StopSignal::new()).is_err());
        assert_eq!(*input.calls.borrow(), vec!["click".to_string()]);
    }

    #[test]
    fn test_stop_before_start() {
        let input = Recorder::default();
        let stop = StopSignal::new();
        stop.stop();
        let outcome = run_script("action", &default_action_script(), &input, &stop).unwrap();
        assert_eq!(outcome, ScriptOutcome::Stopped);
        assert!(input.calls.borrow().is_empty());
    }

    #[test]
    fn test_press_repeat_and_jitter() {
        let input = Recorder::default();
        let steps = vec![
            ActionStep::Press { key: "space".to_string(), repeat: 3, interval_ms: 0 },
            ActionStep::Jitter { radius: 5, steps: 2 },
            ActionStep::MoveTo { x: 10, y: 20 },
        ];
        run_script("reward", &steps, &input, &StopSignal::new()).unwrap();
        let calls = input.calls.borrow();
        assert_eq!(calls.iter().filter(|c| *c == "down space").count(), 3);
        assert_eq!(calls.iter().filter(|c| *c == "move_by").count(), 2);
        assert_eq!(calls.last().map(String::as_str), Some("move_to 10 20"));
    }

    #[test]
    fn test_jitter_with_negative_radius_stays_in_bounds() {
        let input = Recorder::default();
        let steps = vec![ActionStep::Jitter { radius: -3, steps: 4 }];
        let outcome = run_script("action", &steps, &input, &StopSignal::new()).unwrap();
        assert_eq!(outcome, ScriptOutcome::Completed);
        assert_eq!(input.calls.borrow().len(), 4);
    }

    #[test]
    fn test_parse_script_json() {
        let json = r#"[
            {"action": "right_click", "count": 3, "interval_ms": 100},
            {"action": "tap", "key": "q"},
            {"action": "wait", "ms": 750},
            {"action": "hold", "key": "shift", "duration_ms": 200}
        ]"#;
        let steps: Vec<ActionStep> = serde_json::from_str(json).unwrap();
        assert_eq!(steps[0], ActionStep::RightClick { count: 3, interval_ms: 100 });
        assert_eq!(steps[3].key(), Some("shift"));
    }

    #[test]
    fn test_known_keys() {
        for key in ["q", "W", "7", "space", "Escape", "f5", "f12"] {
            assert!(is_known_key(key), "{}", key);
        }
        for key in ["", "qq", "f13", "f0", "hyper", "!"] {
            assert!(!is_known_key(key), "{}", key);
        }
    }
}
