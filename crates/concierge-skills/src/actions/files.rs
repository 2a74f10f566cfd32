use super::{required_text, text_param};
use concierge_core::{ActionFault, ActionOutput, OperationAction, Parameters};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Directory the file actions are confined to.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins a relative path onto the root. `None` for absolute paths or any `..`.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(relative.trim()).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }
}

fn escapes(path: &str) -> ActionOutput {
    ActionOutput::failed(format!("Path escapes the sandbox: {}", path))
}

pub struct CreateFile {
    sandbox: Arc<Sandbox>,
}

impl CreateFile {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait::async_trait]
impl OperationAction for CreateFile {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let path = required_text(parameters, "path")?;
        let content = text_param(parameters, "content").unwrap_or_default();
        let Some(target) = self.sandbox.resolve(&path) else {
            return Ok(escapes(&path));
        };
        if target == self.sandbox.root() {
            return Ok(ActionOutput::failed("A file name is required"));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content.as_bytes()).await?;
        tracing::debug!(target: "concierge::actions", path = %target.display(), "File written");
        Ok(ActionOutput::ok(format!("File created: {} ({} bytes)", path, content.len())))
    }
}

pub struct ReadFile {
    sandbox: Arc<Sandbox>,
}

impl ReadFile {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait::async_trait]
impl OperationAction for ReadFile {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let path = required_text(parameters, "path")?;
        let Some(target) = self.sandbox.resolve(&path) else {
            return Ok(escapes(&path));
        };
        match tokio::fs::read_to_string(&target).await {
            Ok(content) => Ok(ActionOutput::ok(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(ActionOutput::failed(format!("File not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct ListFiles {
    sandbox: Arc<Sandbox>,
}

impl ListFiles {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait::async_trait]
impl OperationAction for ListFiles {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let path = text_param(parameters, "path").unwrap_or_else(|| ".".to_string());
        let Some(target) = self.sandbox.resolve(&path) else {
            return Ok(escapes(&path));
        };
        let mut dir = match tokio::fs::read_dir(&target).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ActionOutput::failed(format!("Directory not found: {}", path)));
            }
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(ActionOutput::ok(if names.is_empty() {
            "No files.".to_string()
        } else {
            names.join(", ")
        }))
    }
}
