/// Authenticated caller for a request.
///
/// Inserted by the auth middleware; only present on guarded routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    email: String,
}

impl CallerContext {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}
