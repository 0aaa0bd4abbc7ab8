use warden_core::UserId;

/// Authenticated-identity context for a request.
///
/// Attached by the auth middleware on successful verification; absent on
/// exempt and passthrough paths. RBAC and handlers read it, never write it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AuthContext {
    user_id: UserId,
}

impl AuthContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
