// phase.rs - Frame phase tags
//
// A frame runs its phases in declaration order. The repository only accepts
// writes while the current phase is writable; Export is read-only.

/// Frame phase the repository is currently executing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Input,
    BeforeSync,
    Simulation,
    PostSimulation,
    Export,
}

impl Phase {
    /// Every phase, in frame order.
    pub const ALL: [Phase; 5] = [
        Phase::Input,
        Phase::BeforeSync,
        Phase::Simulation,
        Phase::PostSimulation,
        Phase::Export,
    ];

    /// Whether component writes and structural mutation are allowed.
    pub fn writable(self) -> bool {
        !matches!(self, Phase::Export)
    }
}
