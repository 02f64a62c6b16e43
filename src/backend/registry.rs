use crate::agents::ModelCandidate;

/// Source of the models the host can currently execute.
pub trait ModelRegistry: Send + Sync {
    fn list_available(&self) -> Vec<ModelCandidate>;
}

/// A fixed model list.
#[derive(Debug, Clone, Default)]
pub struct StaticModelRegistry {
    models: Vec<ModelCandidate>,
}

impl StaticModelRegistry {
    pub fn new(models: Vec<ModelCandidate>) -> Self {
        Self { models }
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn list_available(&self) -> Vec<ModelCandidate> {
        self.models.clone()
    }
}
