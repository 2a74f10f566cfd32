use super::{required_text, text_param};
use concierge_core::{ActionFault, ActionOutput, OperationAction, Parameters};
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub due: Option<String>,
    pub notes: Option<String>,
    pub completed: bool,
}

/// In-memory task list, in creation order.
#[derive(Debug, Default)]
pub struct TaskBoard {
    tasks: RwLock<Vec<Task>>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Task>> {
        self.tasks.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Task>> {
        self.tasks.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, title: String, due: Option<String>, notes: Option<String>) -> Task {
        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let task = Task {
            id,
            title,
            due,
            notes,
            completed: false,
        };
        self.write().push(task.clone());
        task
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read().clone()
    }

    pub fn complete(&self, id: &str) -> bool {
        match self.write().iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.completed = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut tasks = self.write();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        tasks.len() != before
    }
}

pub struct CreateTask {
    board: Arc<TaskBoard>,
}

impl CreateTask {
    pub fn new(board: Arc<TaskBoard>) -> Self {
        Self { board }
    }
}

#[async_trait::async_trait]
impl OperationAction for CreateTask {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let title = required_text(parameters, "title")?;
        if title.trim().is_empty() {
            return Ok(ActionOutput::failed("Task title is empty"));
        }
        let task = self.board.add(
            title,
            text_param(parameters, "due"),
            text_param(parameters, "notes"),
        );
        Ok(ActionOutput::ok(format!("Task created: {} (id {})", task.title, task.id)))
    }
}

pub struct ListTasks {
    board: Arc<TaskBoard>,
}

impl ListTasks {
    pub fn new(board: Arc<TaskBoard>) -> Self {
        Self { board }
    }
}

#[async_trait::async_trait]
impl OperationAction for ListTasks {
    async fn invoke(&self, _parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let tasks = self.board.tasks();
        if tasks.is_empty() {
            return Ok(ActionOutput::ok("No tasks."));
        }
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                let mark = if t.completed { "x" } else { " " };
                match &t.due {
                    Some(due) => format!("[{}] {} {} (due {})", mark, t.id, t.title, due),
                    None => format!("[{}] {} {}", mark, t.id, t.title),
                }
            })
            .collect();
        Ok(ActionOutput::ok(lines.join("; ")))
    }
}

pub struct MarkTaskComplete {
    board: Arc<TaskBoard>,
}

impl MarkTaskComplete {
    pub fn new(board: Arc<TaskBoard>) -> Self {
        Self { board }
    }
}

#[async_trait::async_trait]
impl OperationAction for MarkTaskComplete {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let id = required_text(parameters, "task_id")?;
        Ok(if self.board.complete(&id) {
            ActionOutput::ok(format!("Task {} marked complete", id))
        } else {
            ActionOutput::failed(format!("Task not found: {}", id))
        })
    }
}

pub struct DeleteTask {
    board: Arc<TaskBoard>,
}

impl DeleteTask {
    pub fn new(board: Arc<TaskBoard>) -> Self {
        Self { board }
    }
}

#[async_trait::async_trait]
impl OperationAction for DeleteTask {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let id = required_text(parameters, "task_id")?;
        Ok(if self.board.remove(&id) {
            ActionOutput::ok(format!("Task {} deleted", id))
        } else {
            ActionOutput::failed(format!("Task not found: {}", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let board = Arc::new(TaskBoard::new());
        let out = CreateTask::new(board.clone())
            .invoke(&params(&[("title", "Buy milk"), ("due", "friday")]))
            .await
            .unwrap();
        assert!(out.succeeded);
        assert!(out.message.starts_with("Task created: Buy milk (id "));
        let id = board.tasks()[0].id.clone();

        let listed = ListTasks::new(board.clone()).invoke(&Parameters::new()).await.unwrap();
        assert_eq!(listed.message, format!("[ ] {} Buy milk (due friday)", id));

        let done = MarkTaskComplete::new(board.clone())
            .invoke(&params(&[("task_id", id.as_str())]))
            .await
            .unwrap();
        assert!(done.succeeded);
        assert!(board.tasks()[0].completed);

        let deleted = DeleteTask::new(board.clone())
            .invoke(&params(&[("task_id", id.as_str())]))
            .await
            .unwrap();
        assert!(deleted.succeeded);
        assert_eq!(
            ListTasks::new(board).invoke(&Parameters::new()).await.unwrap().message,
            "No tasks."
        );
    }

    #[tokio::test]
    async fn test_unknown_task_id_is_a_failed_outcome() {
        let out = MarkTaskComplete::new(Arc::new(TaskBoard::new()))
            .invoke(&params(&[("task_id", "nope")]))
            .await
            .unwrap();
        assert!(!out.succeeded);
        assert_eq!(out.message, "Task not found: nope");
    }
}
