/// Role ids carried in tokens issued by the identity collaborator. The
/// numeric mapping is part of that collaborator's contract.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Staff = 3,
    System = 4,
    Integration = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Staff),
            4 => Some(Role::System),
            5 => Some(Role::Integration),
            _ => None,
        }
    }

    /// Payroll runs, entry edits and period lifecycle transitions.
    pub fn manages_payroll(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr | Role::System)
    }
}
