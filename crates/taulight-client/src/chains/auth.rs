//! Login, registration and token login.

use taulight_core::ChainError;
use taulight_proto::payloads::auth::{
    LogPasswd, LoginResponse, Registration, TokenLogin, TokenResponse,
};

use super::catalog_chain;

catalog_chain!(
    /// Nickname/password login.
    LoginChain,
    "login"
);

catalog_chain!(
    /// Account registration.
    RegistrationChain,
    "register"
);

catalog_chain!(
    /// Login with a previously issued token.
    TokenChain,
    "token"
);

impl LoginChain {
    /// Log in and return the session token.
    pub async fn login(
        &self,
        nickname: &str,
        password: &str,
        device: &str,
    ) -> Result<String, ChainError> {
        let request = LogPasswd {
            nickname: nickname.to_string(),
            password: password.to_string(),
            device: device.to_string(),
        };
        let reply: TokenResponse = self.0.call(request).await?;
        Ok(reply.token)
    }
}

impl RegistrationChain {
    /// Register a new account and return its token.
    pub async fn register(
        &self,
        nickname: &str,
        password: &str,
        device: &str,
    ) -> Result<String, ChainError> {
        let request = Registration {
            nickname: nickname.to_string(),
            password: password.to_string(),
            device: device.to_string(),
        };
        let reply: TokenResponse = self.0.call(request).await?;
        Ok(reply.token)
    }
}

impl TokenChain {
    /// Log in with `token`; returns the nickname it belongs to.
    pub async fn login(&self, token: &str) -> Result<String, ChainError> {
        let reply: LoginResponse = self.0.call(TokenLogin { token: token.to_string() }).await?;
        Ok(reply.nickname)
    }
}
