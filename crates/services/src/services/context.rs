/// Identity of the user a call acts on behalf of.
///
/// Every storage and service call takes one of these explicitly; there is no
/// process-wide "current user".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserContext {
    pub user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}
