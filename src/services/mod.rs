// Marksync services
// Services provide supporting functionality: settings, logging and the local identity provider.

pub mod local_identity;
pub mod logging;
pub mod settings_engine;
