use std::{fs, path::Path};

use serde::Deserialize;

/// Default ceiling on outer loop sweeps per run.
pub const DEFAULT_MAX_LOOP_ITERATIONS: u32 = 1000;
/// Default ceiling on total node executions per run.
pub const DEFAULT_MAX_GLOBAL_EXECUTIONS: u32 = 1000;
/// Default ceiling on executions of a single node per run.
pub const DEFAULT_NODE_EXECUTIONS: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// safety limits applied to every run
    #[serde(default)]
    pub limits: LimitsConfig,
    /// inference service endpoints
    #[serde(default)]
    pub inference: InferenceConfig,
    /// directory export functions write into
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    /// number of async worker threads, range [1, 32768), defaults to 16
    #[serde(default = "default_worker_threads")]
    pub async_worker_thread_number: u16,
}

/// Safety ceilings protecting against runaway loops.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LimitsConfig {
    /// maximum outer stage sweeps per run before a graceful stop
    pub max_loop_iterations: u32,
    /// maximum total node executions per run before a fatal abort
    pub max_global_executions: u32,
    /// per-node execution ceiling used when a node declares none
    pub default_node_executions: u32,
}

/// Endpoints and options for the external inference/data services.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InferenceConfig {
    /// chat completion endpoint for agent nodes
    pub completion_url: String,
    /// web search endpoint for the web_search function
    pub search_url: String,
    /// scrape endpoint for the web_scrape function
    pub scrape_url: String,
    /// proxy endpoint for the api_call function
    pub api_proxy_url: String,
    /// request completions as a server-sent-event stream
    pub stream: bool,
    /// request timeout in milliseconds
    pub timeout: u64,
    /// optional bearer token sent to every endpoint
    pub api_key: Option<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            max_global_executions: DEFAULT_MAX_GLOBAL_EXECUTIONS,
            default_node_executions: DEFAULT_NODE_EXECUTIONS,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            completion_url: "http://127.0.0.1:8710/v1/completion".to_string(),
            search_url: "http://127.0.0.1:8710/v1/search".to_string(),
            scrape_url: "http://127.0.0.1:8710/v1/scrape".to_string(),
            api_proxy_url: "http://127.0.0.1:8710/v1/proxy".to_string(),
            stream: false,
            timeout: 120_000,
            api_key: None,
        }
    }
}

fn default_export_dir() -> String {
    "exports".to_string()
}

fn default_worker_threads() -> u16 {
    16
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            inference: InferenceConfig::default(),
            export_dir: default_export_dir(),
            async_worker_thread_number: default_worker_threads(),
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Self {
        let data = fs::read_to_string(path.as_ref()).expect(&format!("failed to load config file {:?}", path.as_ref()));

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Self {
        let config = toml::from_str::<Config>(toml_str).expect("failed to parse the toml str");
        config
    }
}
