//! Keystrokes into the shared notes window, via `xdotool`.

use anyhow::{bail, Context};
use shared::domain::ScrollDirection;
use tokio::process::Command;

const XDOTOOL: &str = "xdotool";

/// Scrolls the window whose title matches a regex, then hands focus back.
#[derive(Debug, Clone)]
pub struct NotesScroller {
    window_pattern: String,
}

impl NotesScroller {
    pub fn new(window_pattern: impl Into<String>) -> Self {
        Self {
            window_pattern: window_pattern.into(),
        }
    }

    pub async fn scroll(&self, direction: ScrollDirection) -> anyhow::Result<()> {
        let focused = Command::new(XDOTOOL)
            .arg("getwindowfocus")
            .output()
            .await
            .context("failed to run xdotool getwindowfocus")?;
        let focused = String::from_utf8_lossy(&focused.stdout).trim().to_string();

        let status = Command::new(XDOTOOL)
            .args(self.key_args(direction, &focused))
            .status()
            .await
            .context("failed to run xdotool")?;
        if !status.success() {
            bail!(
                "xdotool found no window matching '{}' ({status})",
                self.window_pattern
            );
        }
        tracing::debug!(key = direction.key_name(), "notes window scrolled");
        Ok(())
    }

    fn key_args(&self, direction: ScrollDirection, refocus: &str) -> Vec<String> {
        let mut args = vec![
            "search".to_string(),
            "--name".to_string(),
            self.window_pattern.clone(),
            "windowfocus".to_string(),
            "key".to_string(),
            direction.key_name().to_string(),
        ];
        if !refocus.is_empty() {
            args.push("windowfocus".to_string());
            args.push(refocus.to_string());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_the_key_then_restores_focus() {
        let scroller = NotesScroller::new("^Collaborative document.*Private");
        assert_eq!(
            scroller.key_args(ScrollDirection::Down, "41943047"),
            [
                "search",
                "--name",
                "^Collaborative document.*Private",
                "windowfocus",
                "key",
                "Down",
                "windowfocus",
                "41943047",
            ]
        );
        assert_eq!(scroller.key_args(ScrollDirection::Up, "").last().map(String::as_str), Some("Up"));
    }
}
