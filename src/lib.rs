pub mod archive;
pub mod block;
pub mod index;
pub mod recovery;
pub mod v3;
pub mod v6;

pub use archive::{load, validate, Format, LoadError, LoadOptions, RunFile, Validation};
pub use block::{ChromEntry, ChromGroup, Curve, DataBlock, EventCurve};
pub use index::EntryMap;
pub use recovery::{EntryIssue, IssueKind, LoadReport};
pub use v3::{InjectionSelector, Res3File};
pub use v6::{ContainerEntry, Uni6File};
