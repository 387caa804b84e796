//! Color-aware diagnostic formatter
//!
//! Writes the same layout as `Diagnostic::to_human_string` with optional
//! terminal colors. Respects NO_COLOR and auto-detects terminal capabilities.

use crate::diagnostic::{Diagnostic, Severity};
use peek_config::ColorSetting;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Color mode for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Always use colors
    Always,
    /// Never use colors
    Never,
    /// Auto-detect terminal capabilities
    Auto,
}

impl ColorMode {
    /// Resolve to a termcolor ColorChoice
    pub fn to_color_choice(self) -> ColorChoice {
        // Always respect NO_COLOR (https://no-color.org)
        if std::env::var("NO_COLOR").is_ok() {
            return ColorChoice::Never;
        }
        match self {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto => ColorChoice::Auto,
        }
    }
}

impl From<ColorSetting> for ColorMode {
    fn from(setting: ColorSetting) -> Self {
        match setting {
            ColorSetting::Auto => ColorMode::Auto,
            ColorSetting::Always => ColorMode::Always,
            ColorSetting::Never => ColorMode::Never,
        }
    }
}

/// Diagnostic formatter with color support
pub struct DiagnosticFormatter {
    color_mode: ColorMode,
}

impl DiagnosticFormatter {
    /// Create a new formatter with the given color mode
    pub fn new(color_mode: ColorMode) -> Self {
        Self { color_mode }
    }

    /// Create a formatter that auto-detects color support
    pub fn auto() -> Self {
        Self::new(ColorMode::Auto)
    }

    /// Create a plain (no color) formatter
    pub fn plain() -> Self {
        Self::new(ColorMode::Never)
    }

    /// Format a diagnostic to a string (without colors)
    pub fn format_to_string(&self, diag: &Diagnostic) -> String {
        diag.to_human_string()
    }

    /// Write a diagnostic with colors to stderr
    pub fn emit(&self, diag: &Diagnostic) {
        let mut stream = StandardStream::stderr(self.color_mode.to_color_choice());
        if let Err(e) = self.write_diagnostic(&mut stream, diag) {
            tracing::warn!("failed to write diagnostic: {}", e);
        }
    }

    /// Write all diagnostics to stderr
    pub fn emit_all(&self, diagnostics: &[Diagnostic]) {
        for diag in diagnostics {
            self.emit(diag);
        }
    }

    /// Write a diagnostic and its notes to a WriteColor sink
    pub fn write_diagnostic(
        &self,
        w: &mut impl WriteColor,
        diag: &Diagnostic,
    ) -> std::io::Result<()> {
        self.write_block(w, diag)?;
        for note in &diag.notes {
            self.write_block(w, note)?;
        }
        Ok(())
    }

    fn write_block(&self, w: &mut impl WriteColor, diag: &Diagnostic) -> std::io::Result<()> {
        if !diag.location.hidden {
            w.set_color(ColorSpec::new().set_bold(true))?;
            write!(
                w,
                "{}:{}:{}: ",
                diag.location.owner, diag.location.line, diag.location.column
            )?;
            w.reset()?;
        }

        w.set_color(ColorSpec::new().set_fg(Some(severity_color(diag.severity))).set_bold(true))?;
        write!(w, "{}", diag.severity)?;
        w.reset()?;

        w.set_color(ColorSpec::new().set_bold(true))?;
        write!(w, ": {}", diag.message)?;
        w.reset()?;
        writeln!(w)?;

        if diag.location.hidden {
            return Ok(());
        }

        if let Some(snippet) = &diag.snippet {
            w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
            write!(w, "{:>5} | ", diag.location.line)?;
            w.reset()?;
            writeln!(w, "{}", snippet)?;

            w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
            write!(w, "{:>5} | ", "")?;
            w.reset()?;

            w.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
            write!(w, "{}", diag.marker_line())?;
            w.reset()?;
            writeln!(w)?;
        }

        Ok(())
    }

    /// Format a diagnostic to a buffer (for testing)
    pub fn format_to_buffer(&self, diag: &Diagnostic) -> Vec<u8> {
        let mut buf = termcolor::Buffer::no_color();
        if let Err(e) = self.write_diagnostic(&mut buf, diag) {
            tracing::warn!("failed to format diagnostic: {}", e);
        }
        buf.into_inner()
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Magenta,
        Severity::Note => Color::Black,
    }
}

impl Default for DiagnosticFormatter {
    fn default() -> Self {
        Self::auto()
    }
}
