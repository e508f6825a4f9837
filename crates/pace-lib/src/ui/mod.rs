//! User-facing output.
//!
//! Everything the user sees goes through here: status lines with glyphs,
//! error banners, and the per-task colors used by the prefixed writers.
//! Diagnostics for developers use `tracing` instead and never this module.

mod prefixed;

use std::sync::{Arc, Mutex};

use console::Style;
use lazy_static::lazy_static;
pub use prefixed::PrefixedWriter;

lazy_static! {
    pub static ref GREY: Style = Style::new().dim();
    pub static ref CYAN: Style = Style::new().cyan();
    pub static ref BLUE: Style = Style::new().blue();
    pub static ref GREEN: Style = Style::new().green();
    pub static ref YELLOW: Style = Style::new().yellow();
    pub static ref RED: Style = Style::new().red();
    static ref TASK_COLORS: Vec<Style> = vec![
        Style::new().cyan(),
        Style::new().magenta(),
        Style::new().green(),
        Style::new().yellow(),
        Style::new().blue(),
    ];
}

/// Helper struct to apply any necessary formatting to UI output
#[derive(Debug, Clone, Copy)]
pub struct UI {
    should_strip_ansi: bool,
}

impl UI {
    pub fn new(should_strip_ansi: bool) -> Self {
        Self { should_strip_ansi }
    }

    /// Infer the color choice from whether stdout is a tty.
    pub fn infer() -> Self {
        Self {
            should_strip_ansi: !atty::is(atty::Stream::Stdout),
        }
    }

    fn apply(&self, style: &Style, s: &str) -> String {
        if self.should_strip_ansi {
            s.to_string()
        } else {
            style.apply_to(s).to_string()
        }
    }

    fn timestamp(&self) -> String {
        self.apply(&GREY, &chrono::Local::now().format("%H:%M:%S").to_string())
    }

    pub fn info(&self, msg: &str) {
        println!("{} {}", self.timestamp(), self.apply(&CYAN, msg));
    }

    pub fn task(&self, msg: &str) {
        println!("{} {} {}", self.timestamp(), self.apply(&BLUE, "▶"), msg);
    }

    pub fn success(&self, msg: &str) {
        println!("{} {} {}", self.timestamp(), self.apply(&GREEN, "✓"), msg);
    }

    pub fn warning(&self, msg: &str) {
        println!("{} {} {}", self.timestamp(), self.apply(&YELLOW, "⚠"), msg);
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {} {}", self.timestamp(), self.apply(&RED, "✗"), msg);
    }
}

/// Hands out a stable color per task name, round-robin over a small palette,
/// so interleaved output from parallel tasks stays readable.
#[derive(Clone, Default)]
pub struct ColorSelector {
    assigned: Arc<Mutex<Vec<String>>>,
}

impl ColorSelector {
    pub fn color_for(&self, name: &str) -> Style {
        let mut assigned = self.assigned.lock().expect("color selector poisoned");
        let index = match assigned.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                assigned.push(name.to_string());
                assigned.len() - 1
            }
        };
        TASK_COLORS[index % TASK_COLORS.len()].clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ui_strips_ansi() {
        let ui = UI::new(true);
        assert_eq!(ui.apply(&RED, "boom"), "boom");
    }

    #[test]
    fn test_ui_applies_style() {
        let ui = UI::new(false);
        let forced = Style::new().red().force_styling(true);
        assert_eq!(ui.apply(&forced, "boom"), "\u{1b}[31mboom\u{1b}[0m");
    }

    #[test]
    fn test_color_selector_is_stable_per_name() {
        let selector = ColorSelector::default();
        let first = selector.color_for("build");
        let again = selector.color_for("build");
        assert_eq!(format!("{first:?}"), format!("{again:?}"));
    }

    #[test]
    fn test_color_selector_rotates() {
        let selector = ColorSelector::default();
        let a = selector.color_for("a");
        let b = selector.color_for("b");
        assert_ne!(format!("{a:?}"), format!("{b:?}"));
    }
}
