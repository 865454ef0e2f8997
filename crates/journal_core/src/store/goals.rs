use super::mirror::{RecordMirror, StoredRecord};
use super::{GOALS_COLLECTION, StoreFailure, document_fields, validate_id};
use crate::error::AppError;
use crate::model::goal::normalize_deadline;
use crate::model::{Goal, GoalDocument, GoalFields, NewGoal};
use crate::remote::{AuthProvider, Document, DocumentStore};
use crate::session::SessionResolver;
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

impl StoredRecord for Goal {
    const KIND: &'static str = "goal";
    const COLLECTION: &'static str = GOALS_COLLECTION;
    const LOAD_ACTION: &'static str = "load goals";

    fn record_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn owner(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn decode(document: Document) -> Result<Self, serde_json::Error> {
        let stored: GoalDocument = serde_json::from_value(Value::Object(document.fields))?;
        Ok(stored.into_goal(document.id))
    }
}

pub struct GoalStore<S, A> {
    mirror: RecordMirror<S, A, Goal>,
}

impl<S: DocumentStore, A: AuthProvider> GoalStore<S, A> {
    pub fn new(remote: Arc<S>, session: SessionResolver<A>) -> Self {
        Self {
            mirror: RecordMirror::new(remote, session),
        }
    }

    pub fn goals(&self) -> &[Goal] {
        &self.mirror.records
    }

    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.mirror.find(id)
    }

    pub fn error(&self) -> Option<&StoreFailure> {
        self.mirror.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.mirror.is_loading
    }

    pub fn active_goals_count(&self) -> usize {
        self.goals()
            .iter()
            .filter(|goal| !goal.fields.completed)
            .count()
    }

    pub async fn load_goals(&mut self) {
        self.mirror.error = None;
        self.mirror.reload().await;
    }

    /// Stores a new, uncompleted goal stamped with the creation time.
    pub async fn add_goal(&mut self, goal: NewGoal) -> Option<String> {
        self.mirror.error = None;
        match self.try_add(goal).await {
            Ok(id) => Some(id),
            Err(err) => {
                self.mirror.recover("add goal", err).await;
                None
            }
        }
    }

    pub async fn update_goal(&mut self, id: &str, fields: GoalFields) {
        self.mirror.error = None;
        if let Err(err) = self.try_update(id, fields).await {
            self.mirror.recover("update goal", err).await;
        }
    }

    pub async fn delete_goal(&mut self, id: &str) {
        self.mirror.error = None;
        if let Err(err) = self.try_delete(id).await {
            self.mirror.recover("delete goal", err).await;
        }
    }

    pub async fn toggle_goal_completion(&mut self, id: &str) {
        self.mirror.error = None;
        let found = validate_id(id, Goal::KIND).and_then(|id| {
            self.goal(id)
                .map(|goal| goal.fields.clone())
                .ok_or_else(|| RecordMirror::<S, A, Goal>::not_found(id))
        });
        let fields = match found {
            Ok(mut fields) => {
                fields.completed = !fields.completed;
                fields
            }
            Err(err) => {
                self.mirror.record("toggle goal", err);
                return;
            }
        };
        self.update_goal(id, fields).await;
    }

    async fn try_add(&mut self, goal: NewGoal) -> Result<String, AppError> {
        let user = self.mirror.session.wait_for_user().await?;
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        let fields = GoalFields {
            title: goal.title,
            description: goal.description,
            completed: false,
            deadline: normalize_deadline(goal.deadline),
            extra: Default::default(),
        };
        let document = GoalDocument::from_fields(&fields, Some(&user.uid), Some(&created_at));
        let id = self
            .mirror
            .remote
            .add(GOALS_COLLECTION, document_fields(&document)?)
            .await?;
        tracing::debug!(goal_id = %id, "goal added");

        self.mirror.records.push(Goal {
            id: id.clone(),
            user_id: Some(user.uid),
            created_at: Some(created_at),
            fields,
        });
        Ok(id)
    }

    async fn try_update(&mut self, id: &str, mut fields: GoalFields) -> Result<(), AppError> {
        let id = validate_id(id, Goal::KIND)?;
        let user = self.mirror.session.wait_for_user().await?;
        self.mirror.ensure_owned(id, &user.uid).await?;

        fields.deadline = normalize_deadline(fields.deadline);
        let created_at = self.goal(id).and_then(|goal| goal.created_at.clone());
        let document = GoalDocument::from_fields(&fields, Some(&user.uid), created_at.as_deref());
        self.mirror
            .remote
            .update(GOALS_COLLECTION, id, document_fields(&document)?)
            .await?;
        tracing::debug!(goal_id = id, "goal updated");

        if let Some(index) = self.mirror.position(id) {
            self.mirror.records[index] = Goal {
                id: id.to_string(),
                user_id: Some(user.uid),
                created_at,
                fields,
            };
        }
        self.mirror.reload().await;
        Ok(())
    }

    async fn try_delete(&mut self, id: &str) -> Result<(), AppError> {
        let id = validate_id(id, Goal::KIND)?;
        let user = self.mirror.session.wait_for_user().await?;
        self.mirror.ensure_owned(id, &user.uid).await?;

        self.mirror.remote.delete(GOALS_COLLECTION, id).await?;
        tracing::debug!(goal_id = id, "goal deleted");

        if let Some(index) = self.mirror.position(id) {
            self.mirror.records.remove(index);
        }
        Ok(())
    }
}
