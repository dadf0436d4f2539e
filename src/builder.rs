use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    Config, Engine, Result,
    inference::{HttpInferenceClient, InferenceClient},
};

/// Builder for an [`Engine`].
///
/// Lets embedders supply their own tokio runtime, configuration, or
/// inference client before the engine is constructed.
pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    inference: Option<Arc<dyn InferenceClient>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            rt: None,
            inference: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Substitute the inference client agent nodes call.
    pub fn inference_client(
        mut self,
        client: Arc<dyn InferenceClient>,
    ) -> Self {
        self.inference = Some(client);
        self
    }

    pub fn build(&self) -> Result<Engine> {
        let runtime = match &self.rt {
            Some(rt) => rt.clone(),
            None => Arc::new(
                Builder::new_multi_thread()
                    .worker_threads(self.config.async_worker_thread_number.into())
                    .enable_all()
                    .build()
                    .unwrap(),
            ),
        };
        let inference = match &self.inference {
            Some(client) => client.clone(),
            None => Arc::new(HttpInferenceClient::new(self.config.inference.clone())),
        };

        Ok(Engine::new(self.config.clone(), runtime, inference))
    }
}
