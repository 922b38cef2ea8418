use crate::air_quality::MachineId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub id: MachineId,

    pub name: String,

    pub organization_id: String,
}

impl Machine {
    pub fn new(
        id: impl Into<MachineId>,
        name: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            organization_id: organization_id.into(),
        }
    }
}
