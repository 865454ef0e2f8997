//! Application context: the stores and their shared collaborators, built once
//! at startup and handed to the front-end.

use crate::config::Config;
use crate::remote::{AuthProvider, DocumentStore};
use crate::session::SessionResolver;
use crate::store::{GoalStore, TaskStore};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub unplanned_tasks: usize,
    pub active_goals: usize,
}

pub struct AppContext<S, A> {
    pub tasks: TaskStore<S, A>,
    pub goals: GoalStore<S, A>,
}

impl<S: DocumentStore, A: AuthProvider> AppContext<S, A> {
    pub fn new(remote: Arc<S>, auth: Arc<A>, config: &Config) -> Self {
        let session = SessionResolver::new(auth, config.session_timeout());
        Self {
            tasks: TaskStore::new(Arc::clone(&remote), session.clone()),
            goals: GoalStore::new(remote, session),
        }
    }

    /// Loads both stores.
    pub async fn init(&mut self) {
        self.tasks.load_tasks().await;
        self.goals.load_goals().await;
    }

    pub fn summary(&self) -> Summary {
        Summary {
            unplanned_tasks: self.tasks.unplanned_tasks_count(),
            active_goals: self.goals.active_goals_count(),
        }
    }
}
