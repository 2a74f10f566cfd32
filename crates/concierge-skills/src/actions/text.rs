use super::required_text;
use crate::model_router::ModelRouter;
use concierge_core::{ActionFault, ActionOutput, OperationAction, Parameters};
use std::sync::Arc;

/// `generate_text{prompt}` through the model router.
pub struct GenerateText {
    router: Arc<ModelRouter>,
}

impl GenerateText {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }
}

#[async_trait::async_trait]
impl OperationAction for GenerateText {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let prompt = required_text(parameters, "prompt")?;
        let text = self.router.generate(&prompt).await?;
        Ok(ActionOutput::ok(text))
    }
}
