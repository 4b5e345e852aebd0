use clap::ValueEnum;
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed medication groups and their source files, in display order.
pub const GROUP_FILES: [(&str, &str); 5] = [
    ("Levadopa", "levadopa_events.csv"),
    ("DA", "da_events.csv"),
    ("MAOB", "maob_events.csv"),
    ("Other", "other_events.csv"),
    ("No Med", "nomed_events.csv"),
];

/// One keystroke timing record. All durations are in milliseconds; a value
/// that failed to parse at ingestion is carried as NaN and excluded by the
/// aggregator, never dropped here.
#[derive(Clone, Debug, PartialEq)]
pub struct TypingEvent {
    pub hand: String,
    pub hold: f64,
    pub direction: String,
    pub latency: f64,
    pub flight: f64,
}

/// Metric selectable for the box-plot view. Replay always uses hold + flight
/// regardless of this selection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum Metric {
    Hold,
    Latency,
}

impl Metric {
    pub fn extract(&self, event: &TypingEvent) -> f64 {
        match self {
            Metric::Hold => event.hold,
            Metric::Latency => event.latency,
        }
    }

    pub fn toggled(&self) -> Metric {
        match self {
            Metric::Hold => Metric::Latency,
            Metric::Latency => Metric::Hold,
        }
    }
}

/// All events for one group, in source ingestion order. That order is the
/// replay sequence.
#[derive(Debug, Clone)]
pub struct GroupEvents {
    pub name: String,
    pub events: Vec<TypingEvent>,
}

/// Immutable in-memory store, partitioned by group.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    groups: Vec<GroupEvents>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed record in {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Hand")]
    hand: String,
    #[serde(rename = "Hold")]
    hold: String,
    #[serde(rename = "Direction")]
    direction: String,
    #[serde(rename = "Latency")]
    latency: String,
    #[serde(rename = "Flight")]
    flight: String,
}

/// Numeric cells are free-form strings in the source files; anything that
/// does not parse becomes NaN, matching the numeric coercion of the data
/// export this tool reads.
fn parse_ms(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

impl From<RawRow> for TypingEvent {
    fn from(row: RawRow) -> Self {
        TypingEvent {
            hand: row.hand,
            hold: parse_ms(&row.hold),
            direction: row.direction,
            latency: parse_ms(&row.latency),
            flight: parse_ms(&row.flight),
        }
    }
}

impl EventStore {
    pub fn from_groups(groups: Vec<GroupEvents>) -> Self {
        Self { groups }
    }

    /// Load the fixed group set from a data directory. Every group file must
    /// exist and parse; per-cell numeric garbage is not an error here.
    pub fn load_dir(dir: &Path) -> Result<Self, IngestError> {
        let mut groups = Vec::with_capacity(GROUP_FILES.len());

        for (name, file) in GROUP_FILES {
            let path = dir.join(file);
            let events = load_group_file(&path)?;
            groups.push(GroupEvents {
                name: name.to_string(),
                events,
            });
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[GroupEvents] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&GroupEvents> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn load_group_file(path: &Path) -> Result<Vec<TypingEvent>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::Reader::from_reader(file);
    let mut events = Vec::new();

    for row in reader.deserialize::<RawRow>() {
        let row = row.map_err(|source| IngestError::Record {
            path: path.to_path_buf(),
            source,
        })?;
        events.push(TypingEvent::from(row));
    }

    Ok(events)
}
