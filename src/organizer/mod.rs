//! Interactive reorganization
//!
//! ## Layout
//!
//! ```text
//! driver.rs     Reorganizer: backup → hints → per-file loop → RunSummary
//!   ├─ backup.rs    BackupStager: root items → backup folder, or resume
//!   ├─ decision.rs  pure per-file state machine (state, input) → (state, effect)
//!   ├─ hints.rs     FolderHintSet handed to every classification call
//!   ├─ prompt.rs    Prompter seam (terminal, scripted in tests)
//!   └─ display.rs   text blocks for headers, suggestions and the menu
//! ```

pub mod backup;
pub mod decision;
pub mod display;
pub mod driver;
pub mod hints;
pub mod prompt;

pub use backup::{BackupStager, SilentProgress, StageMode, StageProgress, StageResult};
pub use decision::{DecisionOutcome, SkipReason};
pub use driver::{OrganizeOptions, Reorganizer, RunOutcome, RunSummary};
pub use hints::FolderHintSet;
pub use prompt::{Prompter, TerminalPrompter};
