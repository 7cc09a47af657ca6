pub mod credentials;
pub mod failure;
pub mod identity_resolver;
pub mod principal;
pub mod rules;
pub mod token_codec;

pub use failure::AuthFailure;
pub use identity_resolver::IdentityResolver;
pub use principal::{Principal, require_roles};
pub use rules::{Decision, RuleSet};
pub use token_codec::{TokenCodec, TokenKeys, TokenPayload};
