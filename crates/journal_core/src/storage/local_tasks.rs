//! Task list kept entirely in key/value storage.
//!
//! The whole list is serialized under one key after every change. Tasks have
//! no identifiers here and are addressed by position.

use super::key_value::KeyValueStorage;
use crate::error::AppError;
use crate::model::{NewTask, Task, TaskDocument, TaskFields};

pub const TASKS_KEY: &str = "tasks";

pub struct LocalTaskStore<K> {
    storage: K,
    tasks: Vec<Task>,
}

impl<K: KeyValueStorage> LocalTaskStore<K> {
    pub fn new(storage: K) -> Self {
        Self {
            storage,
            tasks: Vec::new(),
        }
    }

    pub fn storage(&self) -> &K {
        &self.storage
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn unplanned_tasks_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.fields.plain_dates().is_empty())
            .count()
    }

    /// Reads the saved list, migrating legacy `timesByDate` schedules. A
    /// missing key leaves the current list untouched.
    pub fn load_tasks(&mut self) -> Result<(), AppError> {
        let Some(saved) = self.storage.get_item(TASKS_KEY)? else {
            return Ok(());
        };

        let documents: Vec<TaskDocument> = serde_json::from_str(&saved)?;
        self.tasks = documents
            .into_iter()
            .map(|document| document.into_task(None))
            .collect();
        tracing::info!(count = self.tasks.len(), "local tasks loaded");
        Ok(())
    }

    pub fn save_tasks(&mut self) -> Result<(), AppError> {
        let documents: Vec<TaskDocument> = self.tasks.iter().map(Task::to_document).collect();
        let content = serde_json::to_string(&documents)?;
        self.storage.set_item(TASKS_KEY, &content)
    }

    pub fn add_task(&mut self, task: NewTask) -> Result<usize, AppError> {
        self.tasks.push(Task::local(task));
        self.save_tasks()?;
        Ok(self.tasks.len() - 1)
    }

    pub fn update_task(&mut self, index: usize, fields: TaskFields) -> Result<(), AppError> {
        self.task_mut(index)?.fields = fields;
        self.save_tasks()
    }

    pub fn delete_task(&mut self, index: usize) -> Result<Task, AppError> {
        self.task_mut(index)?;
        let removed = self.tasks.remove(index);
        self.save_tasks()?;
        Ok(removed)
    }

    pub fn toggle_task_completion(&mut self, index: usize) -> Result<(), AppError> {
        let task = self.task_mut(index)?;
        task.fields.completed = !task.fields.completed;
        self.save_tasks()
    }

    /// Returns whether an occurrence on `date` was found and saved.
    pub fn toggle_task_instance_completion(
        &mut self,
        index: usize,
        date: &str,
    ) -> Result<bool, AppError> {
        if !self.task_mut(index)?.fields.schedule.toggle_instance(date) {
            return Ok(false);
        }
        self.save_tasks()?;
        Ok(true)
    }

    fn task_mut(&mut self, index: usize) -> Result<&mut Task, AppError> {
        let len = self.tasks.len();
        self.tasks
            .get_mut(index)
            .ok_or_else(|| AppError::invalid_argument(format!("task index {index} out of range ({len} tasks)")))
    }
}
