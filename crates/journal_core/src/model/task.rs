use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys the named task fields own on the wire; never taken from `extra`.
const RESERVED_KEYS: [&str; 8] = [
    "userId",
    "title",
    "description",
    "type",
    "completed",
    "dates",
    "scheduledDates",
    "timesByDate",
];

/// The stored `type`. Values this build does not know are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    #[default]
    Single,
    Recurring,
    Dated,
    Other(String),
}

impl TaskKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Single => "single",
            Self::Recurring => "recurring",
            Self::Dated => "dated",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for TaskKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "single" => Self::Single,
            "recurring" => Self::Recurring,
            "dated" => Self::Dated,
            _ => Self::Other(raw),
        }
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// One calendar-date instance of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Occurrence {
    pub fn on(date: &str) -> Self {
        Self {
            date: date.to_string(),
            start_time: None,
            end_time: None,
            completed: false,
        }
    }

    pub fn with_times(date: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            date: date.to_string(),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            completed: false,
        }
    }
}

/// Legacy per-date slot, keyed by date under `timesByDate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Schedule {
    #[default]
    Unscheduled,
    Dates(Vec<String>),
    Occurrences(Vec<Occurrence>),
}

impl Schedule {
    /// Builds the schedule from the three wire fields.
    ///
    /// `scheduledDates` wins over everything else. A `timesByDate` map is only
    /// read when no occurrences exist, and is converted into occurrences in
    /// ascending date order.
    pub fn from_wire(
        dates: Option<Vec<String>>,
        scheduled_dates: Option<Vec<Occurrence>>,
        times_by_date: Option<BTreeMap<String, TimeSlot>>,
    ) -> Self {
        if let Some(occurrences) = scheduled_dates.filter(|entries| !entries.is_empty()) {
            return Self::Occurrences(occurrences);
        }

        if let Some(slots) = times_by_date.filter(|slots| !slots.is_empty()) {
            let occurrences = slots
                .into_iter()
                .map(|(date, slot)| Occurrence {
                    date,
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    completed: slot.completed,
                })
                .collect();
            return Self::Occurrences(occurrences);
        }

        match dates {
            Some(dates) if !dates.is_empty() => Self::Dates(dates),
            _ => Self::Unscheduled,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Unscheduled => true,
            Self::Dates(dates) => dates.is_empty(),
            Self::Occurrences(occurrences) => occurrences.is_empty(),
        }
    }

    pub fn includes(&self, date: &str) -> bool {
        match self {
            Self::Unscheduled => false,
            Self::Dates(dates) => dates.iter().any(|value| value == date),
            Self::Occurrences(occurrences) => occurrences.iter().any(|entry| entry.date == date),
        }
    }

    /// Returns the schedule with `date` filtered out, or `None` when there is
    /// no instance shape to remove from.
    pub fn without_instance(&self, date: &str) -> Option<Schedule> {
        match self {
            Self::Unscheduled => None,
            Self::Dates(dates) => Some(Self::Dates(
                dates.iter().filter(|value| *value != date).cloned().collect(),
            )),
            Self::Occurrences(occurrences) => Some(Self::Occurrences(
                occurrences
                    .iter()
                    .filter(|entry| entry.date != date)
                    .cloned()
                    .collect(),
            )),
        }
    }

    /// Flips the completion flag of the occurrence on `date`. Returns whether
    /// an occurrence matched.
    pub fn toggle_instance(&mut self, date: &str) -> bool {
        match self {
            Self::Occurrences(occurrences) => {
                match occurrences.iter_mut().find(|entry| entry.date == date) {
                    Some(entry) => {
                        entry.completed = !entry.completed;
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn into_wire(self) -> (Option<Vec<String>>, Option<Vec<Occurrence>>) {
        match self {
            Self::Unscheduled => (None, None),
            Self::Dates(dates) => (Some(dates), None),
            Self::Occurrences(occurrences) => (None, Some(occurrences)),
        }
    }
}

/// The user-editable part of a task; also the body of an add or a full update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub completed: bool,
    pub schedule: Schedule,
    /// Plain `dates` stored next to occurrences on the same record; written
    /// back unchanged.
    pub carried_dates: Vec<String>,
    pub extra: Map<String, Value>,
}

impl TaskFields {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Every plain date the stored record carries, whichever shape holds it.
    pub fn plain_dates(&self) -> &[String] {
        match &self.schedule {
            Schedule::Dates(dates) => dates,
            _ => &self.carried_dates,
        }
    }

    pub fn is_on(&self, date: &str) -> bool {
        self.schedule.includes(date) || self.carried_dates.iter().any(|value| value == date)
    }
}

pub type NewTask = TaskFields;

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub fields: TaskFields,
}

impl Task {
    pub fn local(fields: TaskFields) -> Self {
        Self {
            id: None,
            user_id: None,
            fields,
        }
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    pub fn to_document(&self) -> TaskDocument {
        TaskDocument::from_fields(&self.fields, self.user_id.as_deref())
    }
}

/// Stored shape of a task, as found in remote documents and the local blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_dates: Option<Vec<Occurrence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times_by_date: Option<BTreeMap<String, TimeSlot>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskDocument {
    pub fn from_fields(fields: &TaskFields, user_id: Option<&str>) -> Self {
        let (mut dates, scheduled_dates) = fields.schedule.clone().into_wire();
        if scheduled_dates.is_some() && !fields.carried_dates.is_empty() {
            dates = Some(fields.carried_dates.clone());
        }

        let mut extra = fields.extra.clone();
        for key in RESERVED_KEYS {
            extra.remove(key);
        }

        Self {
            user_id: user_id.map(str::to_string),
            title: fields.title.clone(),
            description: fields.description.clone(),
            kind: fields.kind.clone(),
            completed: fields.completed,
            dates,
            scheduled_dates,
            times_by_date: None,
            extra,
        }
    }

    /// Converts into the in-memory model; legacy `timesByDate` is migrated
    /// here and dropped.
    pub fn into_task(self, id: Option<String>) -> Task {
        let plain = self.dates.clone().unwrap_or_default();
        let schedule = Schedule::from_wire(self.dates, self.scheduled_dates, self.times_by_date);
        let carried_dates = match schedule {
            Schedule::Occurrences(_) => plain,
            _ => Vec::new(),
        };
        Task {
            id,
            user_id: self.user_id,
            fields: TaskFields {
                title: self.title,
                description: self.description,
                kind: self.kind,
                completed: self.completed,
                schedule,
                carried_dates,
                extra: self.extra,
            },
        }
    }
}
