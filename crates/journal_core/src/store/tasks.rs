use super::mirror::{RecordMirror, StoredRecord};
use super::{StoreFailure, TASKS_COLLECTION, document_fields, validate_id};
use crate::error::AppError;
use crate::model::{NewTask, Task, TaskDocument, TaskFields};
use crate::remote::{AuthProvider, Document, DocumentStore};
use crate::session::SessionResolver;
use serde_json::Value;
use std::sync::Arc;

impl StoredRecord for Task {
    const KIND: &'static str = "task";
    const COLLECTION: &'static str = TASKS_COLLECTION;
    const LOAD_ACTION: &'static str = "load tasks";

    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn owner(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn decode(document: Document) -> Result<Self, serde_json::Error> {
        let stored: TaskDocument = serde_json::from_value(Value::Object(document.fields))?;
        Ok(stored.into_task(Some(document.id)))
    }
}

pub struct TaskStore<S, A> {
    mirror: RecordMirror<S, A, Task>,
}

impl<S: DocumentStore, A: AuthProvider> TaskStore<S, A> {
    pub fn new(remote: Arc<S>, session: SessionResolver<A>) -> Self {
        Self {
            mirror: RecordMirror::new(remote, session),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.mirror.records
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.mirror.find(id)
    }

    pub fn error(&self) -> Option<&StoreFailure> {
        self.mirror.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.mirror.is_loading
    }

    /// Tasks without plain `dates`. Occurrence-scheduled tasks count as
    /// unplanned here unless the record also carries plain dates.
    pub fn unplanned_tasks_count(&self) -> usize {
        self.tasks()
            .iter()
            .filter(|task| task.fields.plain_dates().is_empty())
            .count()
    }

    /// Tasks with a date entry or an occurrence on `date`.
    pub fn tasks_on(&self, date: &str) -> Vec<&Task> {
        self.tasks()
            .iter()
            .filter(|task| task.fields.is_on(date))
            .collect()
    }

    pub async fn load_tasks(&mut self) {
        self.mirror.error = None;
        self.mirror.reload().await;
    }

    /// Appends the task once the remote store has accepted it. Returns the
    /// assigned identifier.
    pub async fn add_task(&mut self, task: NewTask) -> Option<String> {
        self.mirror.error = None;
        match self.try_add(task).await {
            Ok(id) => Some(id),
            Err(err) => {
                self.mirror.recover("add task", err).await;
                None
            }
        }
    }

    /// Replaces the stored task with `fields`, then reloads.
    pub async fn update_task(&mut self, id: &str, fields: TaskFields) {
        self.mirror.error = None;
        if let Err(err) = self.try_update(id, fields).await {
            self.mirror.recover("update task", err).await;
        }
    }

    pub async fn delete_task(&mut self, id: &str) {
        self.mirror.error = None;
        if let Err(err) = self.try_delete(id).await {
            self.mirror.recover("delete task", err).await;
        }
    }

    /// Removes the occurrence on `date`; a task left with no occurrences is
    /// deleted. Unlike the other actions the failure is also returned.
    pub async fn delete_task_instance(&mut self, id: &str, date: &str) -> Result<(), AppError> {
        self.mirror.error = None;
        match self.try_delete_instance(id, date).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.mirror
                    .recover("delete task instance", err.clone())
                    .await;
                Err(err)
            }
        }
    }

    pub async fn toggle_task_completion(&mut self, id: &str) {
        self.mirror.error = None;
        let fields = match self.known_fields(id) {
            Ok(mut fields) => {
                fields.completed = !fields.completed;
                fields
            }
            Err(err) => {
                self.mirror.record("toggle task", err);
                return;
            }
        };
        self.update_task(id, fields).await;
    }

    /// Flips the completion flag of one occurrence. Plain `dates` carry no
    /// flag, so tasks scheduled that way are left alone.
    pub async fn toggle_task_instance_completion(&mut self, id: &str, date: &str) {
        self.mirror.error = None;
        let mut fields = match self.known_fields(id) {
            Ok(fields) => fields,
            Err(err) => {
                self.mirror.record("toggle task instance", err);
                return;
            }
        };
        if !fields.schedule.toggle_instance(date) {
            tracing::debug!(task_id = id, date, "no occurrence to toggle");
            return;
        }
        self.update_task(id, fields).await;
    }

    fn known_fields(&self, id: &str) -> Result<TaskFields, AppError> {
        let id = validate_id(id, Task::KIND)?;
        self.task(id)
            .map(|task| task.fields.clone())
            .ok_or_else(|| RecordMirror::<S, A, Task>::not_found(id))
    }

    async fn try_add(&mut self, fields: NewTask) -> Result<String, AppError> {
        let user = self.mirror.session.wait_for_user().await?;
        let document = TaskDocument::from_fields(&fields, Some(&user.uid));
        let id = self
            .mirror
            .remote
            .add(TASKS_COLLECTION, document_fields(&document)?)
            .await?;
        tracing::debug!(task_id = %id, "task added");

        self.mirror.records.push(Task {
            id: Some(id.clone()),
            user_id: Some(user.uid),
            fields,
        });
        Ok(id)
    }

    async fn try_update(&mut self, id: &str, fields: TaskFields) -> Result<(), AppError> {
        let id = validate_id(id, Task::KIND)?;
        let user = self.mirror.session.wait_for_user().await?;
        self.mirror.ensure_owned(id, &user.uid).await?;

        let document = TaskDocument::from_fields(&fields, Some(&user.uid));
        self.mirror
            .remote
            .update(TASKS_COLLECTION, id, document_fields(&document)?)
            .await?;
        tracing::debug!(task_id = id, "task updated");

        if let Some(index) = self.mirror.position(id) {
            self.mirror.records[index] = Task {
                id: Some(id.to_string()),
                user_id: Some(user.uid),
                fields,
            };
        }
        self.mirror.reload().await;
        Ok(())
    }

    async fn try_delete(&mut self, id: &str) -> Result<(), AppError> {
        let id = validate_id(id, Task::KIND)?;
        let user = self.mirror.session.wait_for_user().await?;
        self.mirror.ensure_owned(id, &user.uid).await?;

        self.mirror.remote.delete(TASKS_COLLECTION, id).await?;
        tracing::debug!(task_id = id, "task deleted");

        if let Some(index) = self.mirror.position(id) {
            self.mirror.records.remove(index);
        }
        Ok(())
    }

    async fn try_delete_instance(&mut self, id: &str, date: &str) -> Result<(), AppError> {
        let id = validate_id(id, Task::KIND)?;
        let mut fields = self.known_fields(id)?;

        let Some(schedule) = fields.schedule.without_instance(date) else {
            tracing::debug!(task_id = id, date, "task has no instances to delete");
            return Ok(());
        };

        if schedule.is_empty() {
            return self.try_delete(id).await;
        }

        fields.schedule = schedule;
        self.try_update(id, fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::TaskStore;
    use crate::model::{Occurrence, Schedule, TaskFields, TaskKind};
    use crate::remote::memory::MemoryDocumentStore;
    use crate::remote::{LocalAuth, User};
    use crate::session::SessionResolver;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    type Store = TaskStore<MemoryDocumentStore, LocalAuth>;

    fn store_for(uid: &str) -> (Store, Arc<MemoryDocumentStore>) {
        let remote = Arc::new(MemoryDocumentStore::new());
        let auth = Arc::new(LocalAuth::signed_in(User::new(uid)));
        let session = SessionResolver::new(auth, Some(Duration::from_secs(5)));
        (TaskStore::new(Arc::clone(&remote), session), remote)
    }

    fn occurrences(dates: &[&str]) -> Schedule {
        Schedule::Occurrences(dates.iter().map(|date| Occurrence::on(date)).collect())
    }

    #[tokio::test]
    async fn load_only_returns_session_users_tasks() {
        let (mut store, remote) = store_for("alice");
        remote
            .seed("tasks", json!({ "userId": "alice", "title": "mine" }))
            .await
            .unwrap();
        remote
            .seed("tasks", json!({ "userId": "bob", "title": "theirs" }))
            .await
            .unwrap();

        store.load_tasks().await;

        assert!(store.error().is_none());
        assert!(!store.is_loading());
        assert_eq!(store.tasks().len(), 1);
        assert!(
            store
                .tasks()
                .iter()
                .all(|task| task.user_id.as_deref() == Some("alice"))
        );
    }

    #[tokio::test]
    async fn add_then_load_yields_one_new_record() {
        let (mut store, _remote) = store_for("alice");
        let mut fields = TaskFields::titled("write report");
        fields.kind = TaskKind::Dated;
        fields.schedule = Schedule::Dates(vec!["2024-03-01".to_string()]);

        let id = store.add_task(fields.clone()).await.unwrap();
        store.load_tasks().await;

        assert_eq!(store.tasks().len(), 1);
        let task = &store.tasks()[0];
        assert_eq!(task.id.as_deref(), Some(id.as_str()));
        assert_eq!(task.user_id.as_deref(), Some("alice"));
        assert_eq!(task.fields, fields);
    }

    #[tokio::test]
    async fn load_migrates_times_by_date() {
        let (mut store, remote) = store_for("alice");
        remote
            .seed(
                "tasks",
                json!({
                    "userId": "alice",
                    "title": "gym",
                    "type": "recurring",
                    "timesByDate": {
                        "2024-01-01": { "startTime": "09:00", "endTime": "10:00" }
                    }
                }),
            )
            .await
            .unwrap();

        store.load_tasks().await;

        assert_eq!(
            store.tasks()[0].fields.schedule,
            Schedule::Occurrences(vec![Occurrence::with_times("2024-01-01", "09:00", "10:00")])
        );
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let (mut store, remote) = store_for("alice");
        remote
            .seed("tasks", json!({ "userId": "alice", "title": 42 }))
            .await
            .unwrap();
        remote
            .seed("tasks", json!({ "userId": "alice", "title": "ok" }))
            .await
            .unwrap();

        store.load_tasks().await;

        assert!(store.error().is_none());
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].fields.title, "ok");
    }

    #[tokio::test]
    async fn deleting_last_occurrence_deletes_task() {
        let (mut store, remote) = store_for("alice");
        let mut fields = TaskFields::titled("dentist");
        fields.schedule = occurrences(&["2024-01-01"]);
        let id = store.add_task(fields).await.unwrap();

        store.delete_task_instance(&id, "2024-01-01").await.unwrap();

        assert!(store.tasks().is_empty());
        assert!(remote.get("tasks", &id).await.is_none());
    }

    #[tokio::test]
    async fn deleting_one_of_two_occurrences_keeps_the_other() {
        let (mut store, remote) = store_for("alice");
        let mut fields = TaskFields::titled("standup");
        fields.schedule = occurrences(&["2024-01-01", "2024-01-02"]);
        let id = store.add_task(fields).await.unwrap();

        store.delete_task_instance(&id, "2024-01-01").await.unwrap();

        assert_eq!(store.task(&id).unwrap().fields.schedule, occurrences(&["2024-01-02"]));
        let stored = remote.get("tasks", &id).await.unwrap();
        assert_eq!(stored.fields["scheduledDates"].as_array().unwrap().len(), 1);
        assert_eq!(stored.fields["scheduledDates"][0]["date"], "2024-01-02");
    }

    #[tokio::test]
    async fn deleting_plain_date_instance() {
        let (mut store, _remote) = store_for("alice");
        let mut fields = TaskFields::titled("water plants");
        fields.schedule = Schedule::Dates(vec!["2024-01-01".to_string(), "2024-01-08".to_string()]);
        let id = store.add_task(fields).await.unwrap();

        store.delete_task_instance(&id, "2024-01-08").await.unwrap();
        assert_eq!(
            store.task(&id).unwrap().fields.schedule,
            Schedule::Dates(vec!["2024-01-01".to_string()])
        );

        store.delete_task_instance(&id, "2024-01-01").await.unwrap();
        assert!(store.task(&id).is_none());
    }

    #[tokio::test]
    async fn deleting_instance_of_unscheduled_task_is_noop() {
        let (mut store, remote) = store_for("alice");
        let id = store.add_task(TaskFields::titled("someday")).await.unwrap();
        let writes = remote.write_count();

        store.delete_task_instance(&id, "2024-01-01").await.unwrap();

        assert_eq!(remote.write_count(), writes);
        assert!(store.task(&id).is_some());
    }

    #[tokio::test]
    async fn delete_instance_failure_is_returned_and_recorded() {
        let (mut store, remote) = store_for("alice");
        let mut fields = TaskFields::titled("call mom");
        fields.schedule = occurrences(&["2024-01-01", "2024-01-02"]);
        let id = store.add_task(fields).await.unwrap();
        remote.set_reject_writes(true);

        let err = store.delete_task_instance(&id, "2024-01-01").await.unwrap_err();

        assert_eq!(err.code(), "remote_failed");
        assert_eq!(store.error().unwrap().action, "delete task instance");
        assert_eq!(store.task(&id).unwrap().fields.schedule, occurrences(&["2024-01-01", "2024-01-02"]));
    }

    #[tokio::test]
    async fn delete_instance_of_unknown_task_fails() {
        let (mut store, _remote) = store_for("alice");

        let err = store.delete_task_instance("doc-404", "2024-01-01").await.unwrap_err();

        assert_eq!(err.code(), "not_found");
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn update_with_blank_id_writes_nothing() {
        let (mut store, remote) = store_for("alice");
        store.add_task(TaskFields::titled("keep")).await.unwrap();
        let writes = remote.write_count();

        store.update_task("", TaskFields::titled("changed")).await;

        assert_eq!(remote.write_count(), writes);
        assert_eq!(store.error().unwrap().code(), "invalid_argument");
        assert_eq!(store.tasks()[0].fields.title, "keep");
    }

    #[tokio::test]
    async fn update_replaces_record_and_reloads() {
        let (mut store, remote) = store_for("alice");
        let id = store.add_task(TaskFields::titled("draft")).await.unwrap();

        store.update_task(&id, TaskFields::titled("final")).await;

        assert!(store.error().is_none());
        assert_eq!(store.task(&id).unwrap().fields.title, "final");
        let stored = remote.get("tasks", &id).await.unwrap();
        assert_eq!(stored.fields["title"], "final");
        assert_eq!(stored.fields["userId"], "alice");
    }

    #[tokio::test]
    async fn failed_add_keeps_error_after_reload() {
        let (mut store, remote) = store_for("alice");
        remote.set_reject_writes(true);

        let id = store.add_task(TaskFields::titled("lost")).await;

        assert!(id.is_none());
        assert!(store.tasks().is_empty());
        let failure = store.error().unwrap();
        assert_eq!(failure.action, "add task");
        assert_eq!(failure.code(), "remote_failed");
    }

    #[tokio::test]
    async fn failed_load_leaves_tasks_empty() {
        let (mut store, remote) = store_for("alice");
        store.add_task(TaskFields::titled("cached")).await.unwrap();
        remote.set_reject_reads(true);

        store.load_tasks().await;

        assert!(store.tasks().is_empty());
        assert_eq!(store.error().unwrap().action, "load tasks");
    }

    #[tokio::test]
    async fn load_without_user_records_not_authenticated() {
        let remote = Arc::new(MemoryDocumentStore::new());
        let auth = Arc::new(LocalAuth::signed_out());
        let mut store = TaskStore::new(remote, SessionResolver::new(auth, None));

        store.load_tasks().await;

        assert!(store.tasks().is_empty());
        assert_eq!(store.error().unwrap().code(), "not_authenticated");
    }

    #[tokio::test]
    async fn toggle_completion_round_trips() {
        let (mut store, _remote) = store_for("alice");
        let id = store.add_task(TaskFields::titled("ship")).await.unwrap();

        store.toggle_task_completion(&id).await;
        assert!(store.task(&id).unwrap().fields.completed);

        store.toggle_task_completion(&id).await;
        assert!(!store.task(&id).unwrap().fields.completed);
    }

    #[tokio::test]
    async fn toggle_instance_flips_only_matching_occurrence() {
        let (mut store, _remote) = store_for("alice");
        let mut fields = TaskFields::titled("yoga");
        fields.schedule = occurrences(&["2024-01-01", "2024-01-02"]);
        let id = store.add_task(fields).await.unwrap();

        store.toggle_task_instance_completion(&id, "2024-01-02").await;

        match &store.task(&id).unwrap().fields.schedule {
            Schedule::Occurrences(entries) => {
                assert!(!entries[0].completed);
                assert!(entries[1].completed);
            }
            other => panic!("unexpected schedule: {other:?}"),
        }
    }

    #[tokio::test]
    async fn toggle_unknown_task_records_not_found() {
        let (mut store, remote) = store_for("alice");

        store.toggle_task_completion("doc-9").await;

        assert_eq!(store.error().unwrap().code(), "not_found");
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn unplanned_count_ignores_occurrence_schedules() {
        let (mut store, _remote) = store_for("alice");
        store.add_task(TaskFields::titled("loose")).await.unwrap();

        let mut dated = TaskFields::titled("dated");
        dated.schedule = Schedule::Dates(vec!["2024-01-01".to_string()]);
        store.add_task(dated).await.unwrap();

        let mut scheduled = TaskFields::titled("scheduled");
        scheduled.schedule = occurrences(&["2024-01-01"]);
        store.add_task(scheduled).await.unwrap();

        assert_eq!(store.unplanned_tasks_count(), 2);
        assert_eq!(store.tasks_on("2024-01-01").len(), 2);
    }

    #[tokio::test]
    async fn foreign_task_cannot_be_updated_or_deleted() {
        let (mut store, remote) = store_for("alice");
        let foreign = remote
            .seed("tasks", json!({ "userId": "bob", "title": "theirs" }))
            .await
            .unwrap();
        store.load_tasks().await;
        let writes = remote.write_count();

        store.update_task(&foreign, TaskFields::titled("hijacked")).await;
        assert_eq!(store.error().unwrap().code(), "not_found");

        store.delete_task(&foreign).await;
        assert_eq!(store.error().unwrap().code(), "not_found");

        assert_eq!(remote.write_count(), writes);
        let stored = remote.get("tasks", &foreign).await.unwrap();
        assert_eq!(stored.fields["title"], "theirs");
        assert_eq!(stored.fields["userId"], "bob");
    }

    #[tokio::test]
    async fn update_reaches_own_task_missing_from_memory() {
        let (mut store, remote) = store_for("alice");
        let id = remote
            .seed("tasks", json!({ "userId": "alice", "title": "elsewhere" }))
            .await
            .unwrap();

        store.update_task(&id, TaskFields::titled("here")).await;

        assert!(store.error().is_none());
        assert_eq!(store.task(&id).unwrap().fields.title, "here");
    }

    #[tokio::test]
    async fn dates_stored_next_to_occurrences_count_as_planned() {
        let (mut store, remote) = store_for("alice");
        let id = remote
            .seed(
                "tasks",
                json!({
                    "userId": "alice",
                    "title": "both",
                    "dates": ["2024-02-02"],
                    "scheduledDates": [{ "date": "2024-02-01" }]
                }),
            )
            .await
            .unwrap();

        store.load_tasks().await;
        assert_eq!(store.unplanned_tasks_count(), 0);
        assert_eq!(store.tasks_on("2024-02-02").len(), 1);

        store.toggle_task_completion(&id).await;

        let stored = remote.get("tasks", &id).await.unwrap();
        assert_eq!(stored.fields["completed"], true);
        assert_eq!(stored.fields["dates"][0], "2024-02-02");
        assert_eq!(stored.fields["scheduledDates"][0]["date"], "2024-02-01");
    }

    #[tokio::test]
    async fn unknown_type_loads_and_is_written_back() {
        let (mut store, remote) = store_for("alice");
        let id = remote
            .seed(
                "tasks",
                json!({ "userId": "alice", "title": "plan", "type": "multi-date" }),
            )
            .await
            .unwrap();

        store.load_tasks().await;
        assert_eq!(
            store.task(&id).unwrap().fields.kind,
            TaskKind::Other("multi-date".to_string())
        );

        store.toggle_task_completion(&id).await;

        let stored = remote.get("tasks", &id).await.unwrap();
        assert_eq!(stored.fields["type"], "multi-date");
    }

    #[tokio::test]
    async fn toggles_with_blank_id_report_invalid_argument() {
        let (mut store, remote) = store_for("alice");

        store.toggle_task_completion("  ").await;
        assert_eq!(store.error().unwrap().code(), "invalid_argument");

        store.toggle_task_instance_completion("", "2024-01-01").await;
        assert_eq!(store.error().unwrap().code(), "invalid_argument");

        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn delete_removes_from_memory_and_remote() {
        let (mut store, remote) = store_for("alice");
        let id = store.add_task(TaskFields::titled("old")).await.unwrap();

        store.delete_task(&id).await;

        assert!(store.tasks().is_empty());
        assert!(remote.get("tasks", &id).await.is_none());
    }
}
