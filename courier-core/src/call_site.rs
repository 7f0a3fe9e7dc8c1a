//! Call-site markers attached to logs and errors.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

/// Where a call was issued from.
///
/// Captured with `#[track_caller]` by the engine entry points, or supplied
/// explicitly when a label reads better than a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    label: Option<Cow<'static, str>>,
    file: &'static str,
    line: u32,
    column: u32,
}

impl CallSite {
    /// The location of the caller of the function this is invoked from.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    /// Build from a source location.
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            label: None,
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    /// A marker identified only by a label.
    pub fn labeled(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: Some(label.into()),
            file: "",
            line: 0,
            column: 0,
        }
    }

    /// Attach a label to this marker.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label, if one was given.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Source file, empty for label-only markers.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Source line, zero for label-only markers.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Source column, zero for label-only markers.
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.label, self.file.is_empty()) {
            (Some(label), true) => write!(f, "{label}"),
            (Some(label), false) => {
                write!(f, "{label} @ {}:{}:{}", self.file, self.line, self.column)
            }
            (None, _) => write!(f, "{}:{}:{}", self.file, self.line, self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_points_here() {
        let site = CallSite::caller();
        assert!(site.file().ends_with("call_site.rs"));
        assert!(site.line() > 0);
        assert!(site.label().is_none());
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(CallSite::labeled("users.list").to_string(), "users.list");

        let site = CallSite::caller().with_label("login");
        let rendered = site.to_string();
        assert!(rendered.starts_with("login @ "));
        assert!(rendered.contains("call_site.rs:"));
    }
}
