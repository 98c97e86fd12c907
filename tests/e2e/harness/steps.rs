use super::assertions::{Assertion, ErrorMatch};

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Session life cycle
    Load {
        name: String,
    },
    LoadFails {
        name: String,
        expected: ErrorMatch,
    },
    Save,
    SaveAs {
        name: String,
    },
    SaveFails {
        expected: ErrorMatch,
    },
    Close,

    // Editing the open workspace
    WriteFile {
        path: String,
        content: Vec<u8>,
    },
    RemoveFile {
        path: String,
    },

    // User answers
    AnswerRecovery {
        restore: bool,
    },

    // Other processes
    OpenElsewhere {
        name: String,
    },
    CloseElsewhere,

    // Startup sweep
    Scan,
    LeaveGarbage {
        name: String,
    },

    // Failure simulation
    Crash,
    Restart,
    CorruptStore {
        name: String,
    },
    BreakWorkspace,

    // Bookkeeping
    RememberArchive {
        name: String,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
