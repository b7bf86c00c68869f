//! Line-oriented commands read from stdin.

use chrono::NaiveDate;
use geosync_domain::category;
use geosync_domain::filter::FilterState;
use geosync_domain::query::{EventStatus, UnknownStatus};
use geosync_domain::viewport::Viewport;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `viewport <lat> <lon> <dlat> <dlon>`
    Viewport(Viewport),
    /// `viewport on|off`
    ViewportOnly(bool),
    /// `categories <a,b,...>` (no argument clears the selection)
    Categories(Vec<String>),
    /// `range <start> <end>`
    Range { start: NaiveDate, end: NaiveDate },
    /// `status <open|closed|all>`
    Status(EventStatus),
    Refetch,
    Quit,
}

/// What the driver should do with the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Filters(FilterState),
    Viewport(Viewport),
    Refetch,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{command}: expected {expected}")]
    Usage {
        command: &'static str,
        expected: &'static str,
    },
    #[error("invalid number {value:?}")]
    Number {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("invalid date {value:?}, expected YYYY-MM-DD")]
    Date {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error(transparent)]
    Status(#[from] UnknownStatus),
}

/// Parse one input line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns a [`CommandError`] describing the first problem found.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (name, args.as_slice()) {
        ("viewport", ["on"]) => Command::ViewportOnly(true),
        ("viewport", ["off"]) => Command::ViewportOnly(false),
        ("viewport", [lat, lon, dlat, dlon]) => Command::Viewport(Viewport::new(
            number(lat)?,
            number(lon)?,
            number(dlat)?,
            number(dlon)?,
        )),
        ("viewport", _) => {
            return Err(CommandError::Usage {
                command: "viewport",
                expected: "<lat> <lon> <dlat> <dlon> | on | off",
            });
        }
        ("categories", list) => Command::Categories(
            list.iter()
                .flat_map(|arg| arg.split(','))
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(ToString::to_string)
                .collect(),
        ),
        ("range", [start, end]) => Command::Range {
            start: date(start)?,
            end: date(end)?,
        },
        ("range", _) => {
            return Err(CommandError::Usage {
                command: "range",
                expected: "<start> <end>",
            });
        }
        ("status", [status]) => Command::Status(status.parse()?),
        ("status", _) => {
            return Err(CommandError::Usage {
                command: "status",
                expected: "open | closed | all",
            });
        }
        ("refetch", []) => Command::Refetch,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(CommandError::Unknown(line.trim().to_string())),
    };
    Ok(Some(command))
}

impl Command {
    /// Resolve the command against the current filter selection.
    #[must_use]
    pub fn resolve(self, filters: &FilterState) -> Action {
        let mut next = filters.clone();
        match self {
            Self::Viewport(viewport) => return Action::Viewport(viewport),
            Self::Refetch => return Action::Refetch,
            Self::Quit => return Action::Quit,
            Self::ViewportOnly(enabled) => next.viewport_only = enabled,
            Self::Categories(categories) => {
                for id in categories.iter().filter(|id| category::label(id).is_none()) {
                    tracing::warn!(category = %id, "unknown category, sending as is");
                }
                next.categories = categories;
            }
            Self::Range { start, end } => {
                next.start = start;
                next.end = end;
            }
            Self::Status(status) => next.status = status,
        }
        Action::Filters(next)
    }
}

fn number(value: &str) -> Result<f64, CommandError> {
    value.parse().map_err(|source| CommandError::Number {
        value: value.to_string(),
        source,
    })
}

fn date(value: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| CommandError::Date {
        value: value.to_string(),
        source,
    })
}
