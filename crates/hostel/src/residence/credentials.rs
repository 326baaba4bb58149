use super::domain::NewIdentity;
use super::forms::IdentityDraft;

pub const DEFAULT_HASH_COST: u32 = bcrypt::DEFAULT_COST;

/// Password hashing policy applied when identities are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    hash_cost: u32,
}

impl CredentialPolicy {
    pub fn new(hash_cost: u32) -> Self {
        Self { hash_cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, self.hash_cost)
    }

    pub fn verify(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Replace the clear-text password of a validated draft with its hash.
    pub(crate) fn seal(
        &self,
        draft: IdentityDraft,
        is_staff: bool,
    ) -> Result<NewIdentity, bcrypt::BcryptError> {
        let password_hash = self.hash(&draft.password)?;
        Ok(NewIdentity {
            username: draft.username,
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            password_hash,
            is_staff,
        })
    }
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_COST)
    }
}
