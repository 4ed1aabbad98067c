//! Call-site metadata for capture calls.

/// Where a capture call was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureLocation {
    pub file_path: String,
    pub line_number: u32,
    pub function_name: Option<String>,
}

impl CaptureLocation {
    pub fn new(file_path: impl Into<String>, line_number: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
            function_name: None,
        }
    }

    pub fn with_function(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }
}

/// Build a [`CaptureLocation`] for the invoking line.
///
/// ```
/// let here = codewatch_agent::capture_location!("checkout");
/// assert_eq!(here.function_name.as_deref(), Some("checkout"));
/// assert!(here.file_path.ends_with(".rs"));
/// ```
#[macro_export]
macro_rules! capture_location {
    () => {
        $crate::capture::CaptureLocation::new(file!(), line!())
    };
    ($function:expr) => {
        $crate::capture::CaptureLocation::new(file!(), line!()).with_function($function)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_records_this_file() {
        let loc = crate::capture_location!();
        assert_eq!(loc.file_path, file!());
        assert!(loc.line_number > 0);
        assert_eq!(loc.function_name, None);
    }

    #[test]
    fn test_with_function() {
        let loc = CaptureLocation::new("src/a.rs", 3).with_function("handler");
        assert_eq!(loc.function_name.as_deref(), Some("handler"));
    }
}
