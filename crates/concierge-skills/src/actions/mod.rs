//! Built-in actions bound to catalog operation names.

mod email;
mod files;
mod tasks;
mod text;

pub use email::{OutgoingEmail, Outbox, SendEmail};
pub use files::{CreateFile, ListFiles, ReadFile, Sandbox};
pub use tasks::{CreateTask, DeleteTask, ListTasks, MarkTaskComplete, Task, TaskBoard};
pub use text::GenerateText;

use crate::model_router::ModelRouter;
use concierge_core::{ActionFault, ActionTable, Parameters};
use std::sync::Arc;

/// Shared state behind the built-in actions.
#[derive(Clone)]
pub struct BuiltinServices {
    pub tasks: Arc<TaskBoard>,
    pub sandbox: Arc<Sandbox>,
    pub outbox: Arc<Outbox>,
    pub router: Arc<ModelRouter>,
}

/// Binds every built-in action under its operation name.
pub fn builtin_actions(services: &BuiltinServices) -> ActionTable {
    ActionTable::new()
        .bind("create_task", Arc::new(CreateTask::new(Arc::clone(&services.tasks))))
        .bind("list_tasks", Arc::new(ListTasks::new(Arc::clone(&services.tasks))))
        .bind(
            "mark_task_complete",
            Arc::new(MarkTaskComplete::new(Arc::clone(&services.tasks))),
        )
        .bind("delete_task", Arc::new(DeleteTask::new(Arc::clone(&services.tasks))))
        .bind("create_file", Arc::new(CreateFile::new(Arc::clone(&services.sandbox))))
        .bind("read_file", Arc::new(ReadFile::new(Arc::clone(&services.sandbox))))
        .bind("list_files", Arc::new(ListFiles::new(Arc::clone(&services.sandbox))))
        .bind("send_email", Arc::new(SendEmail::new(Arc::clone(&services.outbox))))
        .bind("generate_text", Arc::new(GenerateText::new(Arc::clone(&services.router))))
}

/// String value of a parameter; non-string scalars are rendered as JSON.
fn text_param(parameters: &Parameters, key: &str) -> Option<String> {
    match parameters.get(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn required_text(parameters: &Parameters, key: &str) -> Result<String, ActionFault> {
    text_param(parameters, key).ok_or_else(|| format!("parameter '{}' has no value", key).into())
}
