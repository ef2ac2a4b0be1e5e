// src/serve/browser.rs

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{info, warn};

/// Open `url` in every named browser. Failures are logged and otherwise
/// ignored; a missing browser never fails the server.
pub fn launch_browsers(browsers: &[String], url: &str) {
    for browser in browsers {
        match launch(browser, url) {
            Ok(()) => info!(browser = %browser, url, "opened browser"),
            Err(err) => warn!(browser = %browser, error = %format!("{err:#}"), "could not open browser"),
        }
    }
}

fn launch(browser: &str, url: &str) -> Result<()> {
    let (program, args) = browser_command(browser, url);
    Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawning {program}"))?;
    Ok(())
}

/// Program and arguments that open `url` in `browser` on this platform.
/// `default` uses the system handler.
pub fn browser_command(browser: &str, url: &str) -> (String, Vec<String>) {
    let name = browser.trim().to_ascii_lowercase();

    if cfg!(windows) {
        let mut args = vec!["/C".to_string(), "start".to_string(), String::new()];
        match name.as_str() {
            "default" => {}
            "chrome" | "google-chrome" => args.push("chrome".to_string()),
            other => args.push(other.to_string()),
        }
        args.push(url.to_string());
        ("cmd".to_string(), args)
    } else if cfg!(target_os = "macos") {
        let app = match name.as_str() {
            "default" => None,
            "chrome" | "google-chrome" => Some("Google Chrome"),
            "firefox" => Some("Firefox"),
            "safari" => Some("Safari"),
            _ => Some(browser.trim()),
        };
        let mut args = Vec::new();
        if let Some(app) = app {
            args.push("-a".to_string());
            args.push(app.to_string());
        }
        args.push(url.to_string());
        ("open".to_string(), args)
    } else {
        let program = match name.as_str() {
            "default" => "xdg-open",
            "chrome" | "google-chrome" => "google-chrome",
            "chromium" => "chromium",
            "firefox" => "firefox",
            _ => browser.trim(),
        };
        (program.to_string(), vec![url.to_string()])
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn linux_commands() {
        let url = "http://127.0.0.1:3000/";
        assert_eq!(browser_command("chrome", url), ("google-chrome".to_string(), vec![url.to_string()]));
        assert_eq!(browser_command("default", url).0, "xdg-open");
        assert_eq!(browser_command("iexplore", url).0, "iexplore");
    }

    #[tokio::test]
    async fn missing_browser_is_only_a_warning() {
        launch_browsers(&["definitely-not-a-browser-binary".to_string()], "http://127.0.0.1:1/");
    }
}
