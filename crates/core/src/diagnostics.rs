//! Diagnostics collector threaded through each generation pass.
//!
//! Every diagnostic carries a stable code, a severity, and positional
//! template arguments; consumers own formatting and exit-code mapping.
//! Collectors are explicit values merged at the fan-in barrier -- there
//! is no process-wide sink.

use serde::Serialize;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Stable diagnostic codes raised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DiagnosticCode {
    /// args: entity, member -- rename source absent from the entity.
    UnresolvableMember,
    /// args: entity, member -- excluded name absent from the entity.
    UnknownExcludedMember,
    /// args: entity, target, first source, second source.
    DuplicateTargetName,
    /// args: projection name -- a second graph claimed the same name.
    DuplicateProjectionName,
    /// args: member, source type, target type.
    UnmappableProperty,
    /// args: method, receiver type, target type.
    UnresolvableMethod,
    /// args: original path, entity, configured limit, truncated path.
    ChainDepthExceeded,
    /// args: entity, navigation, configured limit.
    DepthCapOmitted,
    /// args: entity, navigation, target entity.
    CycleOmitted,
    /// args: entity, navigation, target entity.
    UnresolvedNavigationTarget,
    /// args: entity, segment, path.
    UnknownNavigation,
    /// args: entity.
    MissingKeyTuple,
    /// args: entity -- a chain anchors on an entity absent from the
    /// schema model.
    UnknownChainEntity,
    /// args: unit label, error text -- a per-unit pass failed and was
    /// excluded from the merge.
    GenerationFailed,
}

impl DiagnosticCode {
    /// Stable short code for consumers.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticCode::UnresolvableMember => "FCT101",
            DiagnosticCode::UnknownExcludedMember => "FCT102",
            DiagnosticCode::DuplicateTargetName => "FCT103",
            DiagnosticCode::DuplicateProjectionName => "FCT104",
            DiagnosticCode::UnmappableProperty => "FCT201",
            DiagnosticCode::UnresolvableMethod => "FCT202",
            DiagnosticCode::ChainDepthExceeded => "FCT301",
            DiagnosticCode::DepthCapOmitted => "FCT302",
            DiagnosticCode::CycleOmitted => "FCT303",
            DiagnosticCode::UnresolvedNavigationTarget => "FCT401",
            DiagnosticCode::UnknownNavigation => "FCT402",
            DiagnosticCode::MissingKeyTuple => "FCT403",
            DiagnosticCode::UnknownChainEntity => "FCT404",
            DiagnosticCode::GenerationFailed => "FCT501",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::UnresolvableMember
            | DiagnosticCode::UnknownExcludedMember
            | DiagnosticCode::DuplicateTargetName
            | DiagnosticCode::DuplicateProjectionName
            | DiagnosticCode::UnmappableProperty
            | DiagnosticCode::UnresolvableMethod
            | DiagnosticCode::GenerationFailed => Severity::Error,
            DiagnosticCode::ChainDepthExceeded
            | DiagnosticCode::DepthCapOmitted
            | DiagnosticCode::CycleOmitted
            | DiagnosticCode::UnknownNavigation
            | DiagnosticCode::MissingKeyTuple => Severity::Warning,
            DiagnosticCode::UnresolvedNavigationTarget | DiagnosticCode::UnknownChainEntity => {
                Severity::Info
            }
        }
    }

    /// Message template with positional `{n}` placeholders.
    pub fn template(&self) -> &'static str {
        match self {
            DiagnosticCode::UnresolvableMember => {
                "entity '{0}': rename source '{1}' does not match any member"
            }
            DiagnosticCode::UnknownExcludedMember => {
                "entity '{0}': excluded member '{1}' does not match any member"
            }
            DiagnosticCode::DuplicateTargetName => {
                "entity '{0}': target name '{1}' produced by both '{2}' and '{3}'"
            }
            DiagnosticCode::DuplicateProjectionName => {
                "projection name '{0}' generated more than once; later graph skipped"
            }
            DiagnosticCode::UnmappableProperty => {
                "member '{0}' of '{1}' has no corresponding member on '{2}'"
            }
            DiagnosticCode::UnresolvableMethod => {
                "method '{0}' called on '{1}' cannot be resolved on '{2}'"
            }
            DiagnosticCode::ChainDepthExceeded => {
                "navigation path '{0}' on entity '{1}' exceeds chain depth {2}; truncated to '{3}'"
            }
            DiagnosticCode::DepthCapOmitted => {
                "entity '{0}': navigation '{1}' omitted at configured depth {2}"
            }
            DiagnosticCode::CycleOmitted => {
                "entity '{0}': navigation '{1}' re-enters '{2}' with no cycle-breaking variant; omitted"
            }
            DiagnosticCode::UnresolvedNavigationTarget => {
                "entity '{0}': navigation '{1}' targets unknown entity '{2}'; treated as opaque"
            }
            DiagnosticCode::UnknownNavigation => {
                "entity '{0}' has no navigation '{1}' (path '{2}')"
            }
            DiagnosticCode::MissingKeyTuple => {
                "entity '{0}' participates in chain discovery but declares no key tuple"
            }
            DiagnosticCode::UnknownChainEntity => {
                "entity '{0}' is not present in the schema model; chain validation skipped"
            }
            DiagnosticCode::GenerationFailed => "generation pass for '{0}' failed: {1}",
        }
    }
}

/// A single diagnostic raised by a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub args: Vec<String>,
    pub entity: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, args: Vec<String>) -> Diagnostic {
        Diagnostic {
            severity: code.severity(),
            code,
            args,
            entity: None,
            details: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Diagnostic {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Diagnostic {
        self.details = Some(details);
        self
    }

    /// Render the message template with this diagnostic's arguments.
    pub fn message(&self) -> String {
        let mut out = self.code.template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            out = out.replace(&format!("{{{}}}", i), arg);
        }
        out
    }
}

/// An explicit, mergeable collection of diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics { items: Vec::new() }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Fan-in merge. Associative and commutative up to ordering; callers
    /// that need a canonical order sort afterwards.
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Deterministic order for reporting: code, then arguments.
    pub fn sort(&mut self) {
        self.items
            .sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.args.cmp(&b.args)));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.items.iter().map(|d| d.severity).max()
    }

    pub fn count_of(&self, code: DiagnosticCode) -> usize {
        self.items.iter().filter(|d| d.code == code).count()
    }
}
