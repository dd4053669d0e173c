pub mod completion;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod secrets;
pub mod store;

pub use completion::{AzureOpenAiProvider, CompletionProvider, MockCompletionProvider, ProviderError};
pub use database::MongoDb;
pub use memory::InMemoryDesignStore;
pub use metrics::{get_metrics, init_metrics, record_design_operation};
pub use secrets::{
    EnvSecretStore, KeyVaultSecretStore, ManagedIdentity, SecretError, SecretStore,
};
pub use store::{DesignStore, MongoDesignStore, StoreError};
