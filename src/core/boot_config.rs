//! Editing of the Raspberry Pi boot configuration (`/boot/firmware/config.txt`).
//!
//! The file is line based: `key=value` directives, `#` comments and
//! `[filter]` headers (`[pi4]`, `[cm4]`, `[all]`) that scope the directives
//! following them. Edits keep every untouched line byte-for-byte, including
//! its own line terminator.

use crate::utils::error::{PicamError, Result};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_BOOT_CONFIG: &str = "/boot/firmware/config.txt";
pub const DEFAULT_OVERLAY: &str = "ov5647";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayStatus {
    /// Active for every board (top level or under `[all]`).
    Present,
    /// Active only under a board filter such as `[pi4]`.
    PresentUnderFilter { section: String },
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayChange {
    AlreadyPresent,
    Appended,
    Removed,
    NotPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Rendered text; the file on disk is untouched.
    DryRun(String),
    Written { backup: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
    /// `"\n"`, `"\r\n"`, or empty for a final line without terminator.
    ending: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    lines: Vec<Line>,
}

/// Scope a line belongs to: `None` before the first header.
fn is_unfiltered(section: Option<&str>) -> bool {
    matches!(section, None | Some("all"))
}

fn section_header(line: &str) -> Option<String> {
    let trimmed = line.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(|name| name.trim().to_ascii_lowercase())
}

/// Key and value of an active directive; an inline `# comment` is not part of the value.
fn directive(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    trimmed.split_once('=').map(|(key, value)| {
        let value = value.split_once('#').map_or(value, |(v, _)| v);
        (key.trim(), value.trim())
    })
}

/// `dtoverlay=ov5647,rotation=180` names the `ov5647` overlay.
fn is_overlay_line(line: &str, name: &str) -> bool {
    match directive(line) {
        Some(("dtoverlay", value)) => value.split(',').next().map(str::trim) == Some(name),
        _ => false,
    }
}

/// Swaps the value token after `=`, keeping surrounding spacing and any
/// trailing comment. `None` when the value is already `wanted`.
fn replace_value(text: &str, wanted: &str) -> Option<String> {
    let eq = text.find('=')?;
    let after = &text[eq + 1..];
    let lead = after.len() - after.trim_start().len();
    let rest = &after[lead..];
    let token_len = rest
        .find(|c: char| c.is_whitespace() || c == '#')
        .unwrap_or(rest.len());

    if &rest[..token_len] == wanted {
        return None;
    }
    Some(format!(
        "{}{}{}",
        &text[..eq + 1 + lead],
        wanted,
        &rest[token_len..]
    ))
}

/// Copies `path` to a backup name that does not exist yet. Never overwrites
/// an earlier backup, so the very first one always holds the original file.
fn create_backup(path: &Path) -> io::Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f").to_string();
    let mut attempt = 0u32;
    loop {
        let candidate = if attempt == 0 {
            PathBuf::from(format!("{}.{}.bak", path.display(), stamp))
        } else {
            PathBuf::from(format!("{}.{}-{}.bak", path.display(), stamp, attempt))
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut backup) => {
                let mut original = File::open(path)?;
                io::copy(&mut original, &mut backup)?;
                backup.sync_all()?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

impl BootConfig {
    pub fn parse(text: &str) -> Self {
        let lines = text
            .split_inclusive('\n')
            .map(|chunk| {
                if let Some(text) = chunk.strip_suffix("\r\n") {
                    Line {
                        text: text.to_string(),
                        ending: "\r\n",
                    }
                } else if let Some(text) = chunk.strip_suffix('\n') {
                    Line {
                        text: text.to_string(),
                        ending: "\n",
                    }
                } else {
                    Line {
                        text: chunk.to_string(),
                        ending: "",
                    }
                }
            })
            .collect();
        Self { lines }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PicamError::BootConfigError {
            path: path.display().to_string(),
            message: format!("cannot read: {}", e),
        })?;
        Ok(Self::parse(&text))
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.text.as_str())
    }

    /// Terminator for lines picam adds: the one closest to the end of the file.
    fn default_ending(&self) -> &'static str {
        self.lines
            .iter()
            .rev()
            .map(|line| line.ending)
            .find(|ending| !ending.is_empty())
            .unwrap_or("\n")
    }

    fn push_line(&mut self, text: String) {
        let ending = self.default_ending();
        if let Some(last) = self.lines.last_mut() {
            if last.ending.is_empty() {
                last.ending = ending;
            }
        }
        self.lines.push(Line { text, ending });
    }

    /// Iterate lines together with the filter section they sit in.
    fn scoped_lines(&self) -> impl Iterator<Item = (usize, Option<String>, &str)> {
        let mut section: Option<String> = None;
        self.lines.iter().enumerate().map(move |(idx, line)| {
            if let Some(header) = section_header(&line.text) {
                section = Some(header);
            }
            (idx, section.clone(), line.text.as_str())
        })
    }

    fn trailing_section(&self) -> Option<String> {
        self.lines
            .iter()
            .rev()
            .find_map(|line| section_header(&line.text))
    }

    /// Appends `line` so that it applies to every board.
    fn push_unfiltered(&mut self, line: String) {
        if !is_unfiltered(self.trailing_section().as_deref()) {
            self.push_line("[all]".to_string());
        }
        self.push_line(line);
    }

    pub fn overlay_status(&self, name: &str) -> OverlayStatus {
        let mut filtered = None;
        for (_, section, line) in self.scoped_lines() {
            if !is_overlay_line(line, name) {
                continue;
            }
            if is_unfiltered(section.as_deref()) {
                return OverlayStatus::Present;
            }
            if filtered.is_none() {
                filtered = section;
            }
        }

        match filtered {
            Some(section) => OverlayStatus::PresentUnderFilter { section },
            None => OverlayStatus::Absent,
        }
    }

    pub fn ensure_overlay(&mut self, name: &str) -> OverlayChange {
        if self.overlay_status(name) == OverlayStatus::Present {
            return OverlayChange::AlreadyPresent;
        }
        self.push_unfiltered(format!("dtoverlay={}", name));
        OverlayChange::Appended
    }

    /// Comments out every active line for the overlay, in any section.
    pub fn remove_overlay(&mut self, name: &str) -> OverlayChange {
        let mut removed = false;
        for line in self.lines.iter_mut() {
            if is_overlay_line(&line.text, name) {
                line.text = format!("#{}", line.text);
                removed = true;
            }
        }
        if removed {
            OverlayChange::Removed
        } else {
            OverlayChange::NotPresent
        }
    }

    pub fn camera_auto_detect(&self) -> Option<bool> {
        self.scoped_lines()
            .filter(|(_, section, _)| is_unfiltered(section.as_deref()))
            .filter_map(|(_, _, line)| match directive(line) {
                Some(("camera_auto_detect", value)) => Some(value == "1"),
                _ => None,
            })
            .last()
    }

    /// Returns `true` when the text changed. A manually listed sensor overlay
    /// only takes effect with auto-detection off.
    pub fn set_camera_auto_detect(&mut self, enabled: bool) -> bool {
        let wanted = if enabled { "1" } else { "0" };
        let targets: Vec<usize> = self
            .scoped_lines()
            .filter(|(_, section, line)| {
                is_unfiltered(section.as_deref())
                    && matches!(directive(line), Some(("camera_auto_detect", _)))
            })
            .map(|(idx, _, _)| idx)
            .collect();

        if targets.is_empty() {
            self.push_unfiltered(format!("camera_auto_detect={}", wanted));
            return true;
        }

        let mut changed = false;
        for idx in targets {
            if let Some(text) = replace_value(&self.lines[idx].text, wanted) {
                self.lines[idx].text = text;
                changed = true;
            }
        }
        changed
    }

    pub fn render(&self) -> String {
        let fallback = self.default_ending();
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(if line.ending.is_empty() {
                fallback
            } else {
                line.ending
            });
        }
        out
    }

    /// Copies the current file to `<path>.<timestamp>.bak`, then writes the
    /// new content. Returns the backup path when a previous file existed.
    pub fn write_with_backup<P: AsRef<Path>>(&self, path: P) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        let boot_error = |action: &str, e: io::Error| PicamError::BootConfigError {
            path: path.display().to_string(),
            message: format!("cannot {}: {}", action, e),
        };

        let backup = if path.exists() {
            let backup = create_backup(path).map_err(|e| boot_error("back up", e))?;
            tracing::info!("💾 Backed up {} to {}", path.display(), backup.display());
            Some(backup)
        } else {
            None
        };

        fs::write(path, self.render()).map_err(|e| boot_error("write", e))?;
        Ok(backup)
    }

    pub fn commit<P: AsRef<Path>>(&self, path: P, dry_run: bool) -> Result<WriteOutcome> {
        if dry_run {
            tracing::info!(
                "🔍 DRY RUN MODE - {} is not modified",
                path.as_ref().display()
            );
            return Ok(WriteOutcome::DryRun(self.render()));
        }
        let backup = self.write_with_backup(path)?;
        Ok(WriteOutcome::Written { backup })
    }
}

/// `overlay enable`: add the overlay for every board and, unless told
/// otherwise, turn camera auto-detection off. Returns `true` when the
/// config needs writing.
pub fn apply_enable(config: &mut BootConfig, overlay: &str, keep_auto_detect: bool) -> bool {
    if let OverlayStatus::PresentUnderFilter { section } = config.overlay_status(overlay) {
        tracing::warn!(
            "dtoverlay={} found only under [{}]; adding it for all boards",
            overlay,
            section
        );
    }

    let overlay_changed = config.ensure_overlay(overlay) == OverlayChange::Appended;
    let detect_changed = !keep_auto_detect && config.set_camera_auto_detect(false);
    overlay_changed || detect_changed
}

/// `overlay disable`: returns `true` when the config needs writing.
pub fn apply_disable(config: &mut BootConfig, overlay: &str) -> bool {
    config.remove_overlay(overlay) == OverlayChange::Removed
}
