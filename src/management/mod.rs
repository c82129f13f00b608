mod auth;
pub mod store;

pub use auth::TokenManager;
pub use store::CredentialStore;
pub use store::FileCredentialStore;
pub use store::KeyringCredentialStore;
pub use store::MemoryCredentialStore;
pub use store::REFRESH_TOKEN_KEY;
