pub mod provider;
pub mod read_only;

pub use provider::ProviderClient;
pub use read_only::ReadOnlyProvider;
