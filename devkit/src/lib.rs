/*!
# wanwatch DevKit - Test doubles and utilities

Library used by the agent's integration tests:
- Scripted prober and recording rebooter for the escalation loop
- Reachability check that fails chosen targets
- Stub HTTP server standing in for the OPNsense API and probe endpoints
- Timeline of probes and reboots with paused-clock timestamps
*/

pub mod doubles;
pub mod http_stub;
pub mod test_utils;

pub use doubles::{RecordingRebooter, ScriptedCheck, ScriptedProber};
pub use http_stub::{CapturedRequest, StubHttpServer};
pub use test_utils::{Event, TestHarness, Timeline};
