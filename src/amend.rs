//! Amendment of existing documents.
//!
//! A [`ChangeSet`] is parsed from a change description and applied to a base
//! document by an [`Amender`]. Conflicts are either reported or resolved in
//! favour of the incoming change, depending on the [`ConflictPolicy`].

mod changeset;
pub use changeset::{Change, ChangeSet, Operation, Payload, Target};

mod engine;
pub use engine::{
    AmendError, AmendOptions, Amender, AmendmentResult, Conflict, ConflictPolicy, ConflictReason,
    Merge, apply,
};
