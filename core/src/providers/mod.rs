pub mod factory;
pub mod openrouter;

pub use factory::create_provider;
pub use openrouter::OpenRouterProvider;
