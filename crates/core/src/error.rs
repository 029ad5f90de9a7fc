//! Engine error type shared across resolver, controller, and rewriter.
//!
//! Errors are per-unit: a failed generation pass or expression rewrite
//! reports its error and is excluded from the final merge. Only model
//! document parsing (facet-interchange) can fail a whole run.

use thiserror::Error;

/// All errors raised by the projection engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A rename-map key does not match any member of the source entity.
    #[error("entity '{entity}': rename source '{member}' does not match any member")]
    UnresolvableMember { entity: String, member: String },

    /// An excluded-member name does not match any member of the source entity.
    #[error("entity '{entity}': excluded member '{member}' does not match any member")]
    UnknownExcludedMember { entity: String, member: String },

    /// Two source members map to the same final target name.
    #[error(
        "entity '{entity}': members '{first_source}' and '{second_source}' both map to target name '{target}'"
    )]
    DuplicateTargetName {
        entity: String,
        target: String,
        first_source: String,
        second_source: String,
    },

    /// The same entity name was declared twice while building the schema.
    #[error("duplicate entity '{entity}' in schema model")]
    DuplicateEntity { entity: String },

    /// A member or navigation name is declared twice within one entity.
    #[error("entity '{entity}': duplicate member name '{member}'")]
    DuplicateMemberName { entity: String, member: String },

    /// A member access on the source type has no corresponding target member.
    #[error("member '{member}' of '{source_type}' has no corresponding member on '{target_type}'")]
    UnmappableProperty {
        member: String,
        source_type: String,
        target_type: String,
    },

    /// A call target cannot be found on the rewritten receiver type, by
    /// exact signature or by name/arity.
    #[error("method '{method}' called on '{receiver_type}' cannot be resolved on '{target_type}'")]
    UnresolvableMethod {
        method: String,
        receiver_type: String,
        target_type: String,
    },

    /// A projection rule names an entity absent from the schema model.
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    /// A recognized configuration option carries an invalid value.
    #[error("invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// The unit's cancellation token was signalled mid-walk.
    #[error("generation pass cancelled")]
    Cancelled,
}
