use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AuthTokenValue(pub String);

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        AuthTokenValue(random_alphanumeric(64))
    }
}

/// A session token handed out at login and presented on every request.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AuthToken {
    pub user_id: String,
    pub created: i64,
    pub last_used: Option<i64>,
    pub value: AuthTokenValue,
}

/// Provisioned out of band by `cli-auth`; users log in with it.
/// High-entropy and machine-generated, never a human-chosen password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct AccessKey(pub String);

impl AccessKey {
    pub fn generate() -> AccessKey {
        AccessKey(random_alphanumeric(32))
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
