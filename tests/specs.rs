//! Workspace-level integration tests: the `taskforge` CLI's command surface,
//! exercised as a real subprocess against a tempdir-scoped store snapshot.
//! Scheduler/heartbeat properties (§8) live as inline tests in
//! `taskforge-engine` — these cover the layer unit tests can't: the
//! compiled binary's argument parsing and its wiring to `taskforge-storage`.

mod prelude;

mod cli {
    mod help;
    mod project;
    mod task;
}
