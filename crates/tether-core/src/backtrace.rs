//! Backtrace capture.
//!
//! [`Backtrace::capture`] records the current call stack, independently of
//! `RUST_BACKTRACE`, and parses it into at most [`MAX_FRAMES`] structured
//! [`Frame`]s. Resolving file and line information is the expensive part, so
//! it is opt-in.
//!
//! The standard library renders a captured backtrace as:
//!
//! ```text
//!    0: tether::main
//!              at ./crates/tether/src/main.rs:42:5
//!    1: core::ops::function::FnOnce::call_once
//! ```
//!
//! [`Backtrace::parse`] understands that format, which also makes it usable on
//! backtraces copied out of panic messages.

use std::backtrace::{Backtrace as StdBacktrace, BacktraceStatus};
use std::fmt;

use crate::demangle::SymbolName;

/// The maximal number of frames a [`Backtrace`] keeps.
pub const MAX_FRAMES: usize = 25;

/// Printed for any piece of frame information that is not known.
pub const UNKNOWN: &str = "(unknown)";

/// Frames belonging to the capture machinery itself start with these.
const CAPTURE_PREFIXES: [&str; 3] = ["std::backtrace", "std::backtrace_rs", "tether_core::backtrace::"];

/// Source code location of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Absolute or workspace-relative path.
    pub file: String,
    /// Line number, if known.
    pub line: Option<u32>,
    /// Column number, if known.
    pub column: Option<u32>,
}

impl SourceLocation
{
    /// Parse `file:line:column`, `file:line` or a bare file.
    fn parse(text: &str) -> Self
    {
        let mut parts = text.rsplitn(3, ':');
        let last = parts.next().unwrap_or_default();
        let middle = parts.next();
        let rest = parts.next();

        match (rest, middle.and_then(|m| m.parse().ok()), last.parse().ok()) {
            (Some(file), Some(line), Some(column)) => Self {
                file: file.to_string(),
                line: Some(line),
                column: Some(column),
            },
            (_, _, Some(line)) if middle.is_some() => Self {
                file: text[..text.len() - last.len() - 1].to_string(),
                line: Some(line),
                column: None,
            },
            _ => Self {
                file: text.to_string(),
                line: None,
                column: None,
            },
        }
    }
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// One entry of a [`Backtrace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame
{
    /// Position in the trace, innermost call first.
    pub index: usize,
    /// Function running in this frame.
    pub function: SymbolName,
    /// Only filled when locations were resolved.
    pub location: Option<SourceLocation>,
}

impl fmt::Display for Frame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{:<2} {}", self.index, self.function)?;
        match &self.location {
            Some(location) => write!(f, " at {location}"),
            None => write!(f, " at {UNKNOWN}"),
        }
    }
}

/// A parsed call stack.
#[derive(Debug, Clone, Default)]
pub struct Backtrace
{
    frames: Vec<Frame>,
    resolves_locations: bool,
    executable: Option<String>,
}

impl Backtrace
{
    /// Capture the call stack at the current position.
    ///
    /// With `resolve_locations` set, each frame also carries its source file
    /// and line. Frames of the capture machinery are dropped. If the platform
    /// cannot capture backtraces the result has no frames.
    #[must_use]
    pub fn capture(resolve_locations: bool) -> Self
    {
        let raw = StdBacktrace::force_capture();
        let text = match raw.status() {
            BacktraceStatus::Captured => raw.to_string(),
            status => {
                tracing::debug!(?status, "backtrace unavailable");
                String::new()
            }
        };

        let mut frames = parse_frames(&text, resolve_locations);
        let own = frames
            .iter()
            .take_while(|frame| {
                let name = frame.function.display_name();
                CAPTURE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
            })
            .count();
        frames.drain(..own);
        frames.truncate(MAX_FRAMES);
        for (index, frame) in frames.iter_mut().enumerate() {
            frame.index = index;
        }
        tracing::debug!(frames = frames.len(), resolve_locations, "captured backtrace");

        let executable = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()));

        Self {
            frames,
            resolves_locations: resolve_locations,
            executable,
        }
    }

    /// Parse a backtrace rendered by the standard library.
    ///
    /// ```rust
    /// use tether_core::backtrace::Backtrace;
    ///
    /// let text = "   0: app::run\n             at ./src/main.rs:10:5\n   1: main\n";
    /// let trace = Backtrace::parse(text, true);
    /// assert_eq!(trace.frames().len(), 2);
    /// assert_eq!(trace.frames()[0].location.as_ref().unwrap().line, Some(10));
    /// ```
    #[must_use]
    pub fn parse(text: &str, resolve_locations: bool) -> Self
    {
        let mut frames = parse_frames(text, resolve_locations);
        frames.truncate(MAX_FRAMES);
        Self {
            frames,
            resolves_locations: resolve_locations,
            executable: None,
        }
    }

    /// The parsed frames, innermost call first.
    pub fn frames(&self) -> &[Frame]
    {
        &self.frames
    }

    /// Whether file and line information was requested.
    pub fn resolves_locations(&self) -> bool
    {
        self.resolves_locations
    }

    /// File name of the running executable, for captured backtraces.
    pub fn executable(&self) -> Option<&str>
    {
        self.executable.as_deref()
    }

    pub fn is_empty(&self) -> bool
    {
        self.frames.is_empty()
    }
}

impl fmt::Display for Backtrace
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        writeln!(f, "Backtrace of {}:", self.executable.as_deref().unwrap_or(UNKNOWN))?;
        for frame in &self.frames {
            writeln!(f, "  {frame}")?;
        }
        Ok(())
    }
}

fn parse_frames(text: &str, resolve_locations: bool) -> Vec<Frame>
{
    let mut frames: Vec<Frame> = Vec::new();

    for line in text.lines() {
        let line = line.trim();

        if let Some(location) = line.strip_prefix("at ") {
            if resolve_locations {
                if let Some(frame) = frames.last_mut() {
                    frame.location = Some(SourceLocation::parse(location));
                }
            }
            continue;
        }

        let Some((index, function)) = line.split_once(": ") else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        frames.push(Frame {
            index: frames.len(),
            function: SymbolName::parse(function.trim()),
            location: None,
        });
    }

    frames
}

#[cfg(test)]
mod tests
{
    use super::*;

    const SAMPLE: &str = "\
   0: std::backtrace::Backtrace::force_capture
             at /rustc/abc/library/std/src/backtrace.rs:312:13
   1: tether_core::backtrace::Backtrace::capture
             at ./crates/tether-core/src/backtrace.rs:120:19
   2: bank::audit
             at ./src/bank.rs:41:5
   3: _ZN3foo3barE
   4: main
             at ./src/main.rs:7
";

    #[test]
    fn test_parse_frames_with_locations()
    {
        let trace = Backtrace::parse(SAMPLE, true);
        let frames = trace.frames();
        assert_eq!(frames.len(), 5);
        assert!(trace.resolves_locations());

        assert_eq!(frames[2].index, 2);
        assert_eq!(frames[2].function.display_name(), "bank::audit");
        assert_eq!(
            frames[2].location,
            Some(SourceLocation {
                file: "./src/bank.rs".to_string(),
                line: Some(41),
                column: Some(5),
            })
        );

        assert_eq!(frames[3].function.display_name(), "foo::bar");
        assert_eq!(frames[3].location, None);

        let main = frames[4].location.as_ref().unwrap();
        assert_eq!(main.file, "./src/main.rs");
        assert_eq!(main.line, Some(7));
        assert_eq!(main.column, None);
    }

    #[test]
    fn test_parse_frames_without_locations()
    {
        let trace = Backtrace::parse(SAMPLE, false);
        assert!(!trace.resolves_locations());
        assert!(trace.frames().iter().all(|frame| frame.location.is_none()));
    }

    #[test]
    fn test_parse_ignores_noise()
    {
        let trace = Backtrace::parse("stack backtrace:\nnote: something\n  x: not a frame\n", true);
        assert!(trace.is_empty());
    }

    #[test]
    fn test_parse_caps_frames()
    {
        let text: String = (0..MAX_FRAMES + 10).map(|i| format!("  {i}: f{i}\n")).collect();
        let trace = Backtrace::parse(&text, false);
        assert_eq!(trace.frames().len(), MAX_FRAMES);
    }

    #[test]
    fn test_source_location_bare_file()
    {
        let location = SourceLocation::parse("/lib/libc.so.6");
        assert_eq!(location.file, "/lib/libc.so.6");
        assert_eq!(location.line, None);
        assert_eq!(location.to_string(), "/lib/libc.so.6");
    }

    #[test]
    fn test_display_marks_unknown_locations()
    {
        let trace = Backtrace::parse("   0: main\n", false);
        let rendered = trace.to_string();
        assert!(rendered.starts_with("Backtrace of (unknown):"));
        assert!(rendered.contains("#0  main at (unknown)"));
    }

    #[test]
    fn test_capture_drops_own_frames()
    {
        let trace = Backtrace::capture(false);
        assert!(trace.frames().len() <= MAX_FRAMES);
        if let Some(first) = trace.frames().first() {
            assert_eq!(first.index, 0);
            assert!(!first.function.display_name().starts_with("tether_core::backtrace::"));
        }
    }
}
