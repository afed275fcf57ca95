use std::env;

use color_eyre::owo_colors::OwoColorize;
use pyship_core::CommandStatus;

pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(force_no_color: bool, is_tty: bool) -> Self {
        let env_no_color = env::var_os("NO_COLOR").is_some();
        Self {
            enabled: !(force_no_color || env_no_color) && is_tty,
        }
    }

    pub fn status(&self, status: CommandStatus, text: &str) -> String {
        let (symbol, tone) = match status {
            CommandStatus::Ok => ("✔", Tone::Green),
            CommandStatus::UserError => ("✗", Tone::Yellow),
            CommandStatus::Failure => ("✖", Tone::Red),
        };
        self.paint(&format!("{symbol} {text}"), tone, true)
    }

    pub fn info(&self, text: &str) -> String {
        self.paint(text, Tone::Blue, false)
    }

    /// One line of the release step table.
    pub fn step(&self, status: &str, step: &str, message: &str) -> String {
        let (symbol, tone) = match status {
            "ok" => ("✔", Tone::Green),
            "failed" => ("✖", Tone::Red),
            "skipped" => ("–", Tone::Yellow),
            _ => ("·", Tone::Dim),
        };
        let label = format!("{symbol} {step:<8}");
        let label = self.paint(&label, tone, false);
        if message.is_empty() {
            format!("  {label}")
        } else {
            format!("  {label} {message}")
        }
    }

    fn paint(&self, text: &str, tone: Tone, bold: bool) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match (tone, bold) {
            (Tone::Green, true) => text.green().bold().to_string(),
            (Tone::Green, false) => text.green().to_string(),
            (Tone::Yellow, true) => text.yellow().bold().to_string(),
            (Tone::Yellow, false) => text.yellow().to_string(),
            (Tone::Red, true) => text.red().bold().to_string(),
            (Tone::Red, false) => text.red().to_string(),
            (Tone::Blue, true) => text.cyan().bold().to_string(),
            (Tone::Blue, false) => text.cyan().to_string(),
            (Tone::Dim, _) => text.dimmed().to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Green,
    Yellow,
    Red,
    Blue,
    Dim,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_without_tty() {
        let style = Style::new(false, false);
        assert_eq!(style.status(CommandStatus::Ok, "done"), "✔ done");
        assert_eq!(style.step("not_run", "publish", ""), "  · publish ");
        assert_eq!(
            style.step("failed", "sdist", "invalid version"),
            "  ✖ sdist    invalid version"
        );
    }
}
