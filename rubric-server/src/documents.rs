//! Placeholder planning documents.

use std::fmt;

/// The documents the service can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    LessonPlan,
    Assessment,
    Rubric,
}

impl DocumentKind {
    /// File stem of the generated document.
    pub fn stem(self) -> &'static str {
        match self {
            Self::LessonPlan => "lesson_plan",
            Self::Assessment => "assessment",
            Self::Rubric => "rubric",
        }
    }

    fn header(self) -> &'static str {
        match self {
            Self::LessonPlan => "Lesson plan placeholder",
            Self::Assessment => "Assessment placeholder",
            Self::Rubric => "Rubric placeholder",
        }
    }

    /// File name for the given extension, e.g. `rubric.txt`.
    pub fn file_name(self, filetype: &str) -> String {
        format!("{}.{}", self.stem(), filetype)
    }

    /// Render the document body.
    ///
    /// Only the lesson plan includes the conversation log.
    pub fn render(self, summary: &str, conversation: &[String]) -> String {
        let mut body = format!("{}\n", self.header());

        match self {
            Self::LessonPlan => {
                if !summary.is_empty() {
                    body.push_str(&format!("Background summary:\n{summary}\n\n"));
                }
                body.push_str(&conversation.join("\n"));
            }
            Self::Assessment | Self::Rubric => {
                if !summary.is_empty() {
                    body.push_str(&format!("Background summary:\n{summary}\n"));
                }
            }
        }

        body
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}
