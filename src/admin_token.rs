/// Placeholder admin key used when none is configured. Anyone who has read
/// the docs knows it; startup warns while it is active.
pub const INSECURE_DEFAULT_ADMIN_KEY: &str = "changeme";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminGate {
    secret: String,
}

impl AdminGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// True for the placeholder key and for an empty key, which can never
    /// authorize anything.
    pub fn is_insecure_default(&self) -> bool {
        self.secret.is_empty() || self.secret == INSECURE_DEFAULT_ADMIN_KEY
    }

    pub fn authorize(&self, provided: Option<&str>) -> bool {
        let Some(key) = provided else {
            return false;
        };
        if key.is_empty() || self.secret.is_empty() {
            return false;
        }
        key == self.secret
    }
}
