//! Registered-claim checks applied after the signature is verified.
//!
//! Nothing is checked unless the deployment asks for it. The checks run inside
//! `jsonwebtoken`; a `ClaimPolicy` only decides which ones are switched on.

use jsonwebtoken::{Algorithm, Validation};

/// Which registered claims to enforce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// Enforce `exp` (required) and `nbf` (if present).
    pub validate_expiry: bool,
    /// Clock skew tolerated by the time checks, in seconds.
    pub leeway_secs: u64,
    /// Required `iss` value.
    pub issuer: Option<String>,
    /// Audience that `aud` must contain.
    pub audience: Option<String>,
}

impl ClaimPolicy {
    /// Enforce `exp`/`nbf` with `leeway_secs` of tolerance.
    #[must_use]
    pub const fn with_expiry(mut self, leeway_secs: u64) -> Self {
        self.validate_expiry = true;
        self.leeway_secs = leeway_secs;
        self
    }

    /// Require `iss` to equal `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require `aud` to contain `audience`.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// The `jsonwebtoken` validation for `algorithm` under this policy.
    ///
    /// Only `algorithm` is accepted. A configured claim is also required to
    /// be present.
    pub(crate) fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.leeway = self.leeway_secs;

        validation.validate_exp = self.validate_expiry;
        validation.validate_nbf = self.validate_expiry;
        if self.validate_expiry {
            validation.required_spec_claims.insert("exp".to_string());
        }

        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            validation.required_spec_claims.insert("iss".to_string());
        }

        // jsonwebtoken rejects any token carrying `aud` when audience
        // validation is on without an expected audience.
        validation.validate_aud = self.audience.is_some();
        if let Some(audience) = &self.audience {
            validation.set_audience(&[audience]);
            validation.required_spec_claims.insert("aud".to_string());
        }

        validation
    }
}
