//! Backend commands queued from the UI to the backend worker.

pub enum BackendCommand {
    Connect,
    Mint {
        /// Captured doodle payload as a PNG data URL; the backend passes it
        /// straight through to the contract write.
        doodle: Option<String>,
    },
    RefreshCount,
    Shutdown,
}
