//! Token acquisition against an OAuth2 authority: silently from the cache
//! or a refresh token, and interactively with the device authorization
//! grant.

mod acquirer;
pub use acquirer::{AcquireError, DeviceFlowOutcome, MissReason, SilentOutcome, TokenAcquirer};

mod claims;
pub use claims::{ClaimsError, IdTokenClaims};

mod provider;
pub use provider::{
    DeviceAuthorization, DeviceCodeMessage, DevicePollError, IdTokenFields, IdentityProvider,
    ProviderError, ProviderTokenResponse, TokenRequestError,
};
