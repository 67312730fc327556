#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionLifecycle {
    #[default]
    Inactive,
    Active,
    Locked,
}

impl SessionLifecycle {
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

pub fn can_transition(from: SessionLifecycle, to: SessionLifecycle) -> bool {
    matches!(
        (from, to),
        (SessionLifecycle::Inactive, SessionLifecycle::Active)
            | (SessionLifecycle::Active, SessionLifecycle::Locked)
            | (SessionLifecycle::Locked, SessionLifecycle::Active)
            | (SessionLifecycle::Active, SessionLifecycle::Inactive)
            | (SessionLifecycle::Locked, SessionLifecycle::Inactive)
    ) || from == to
}
