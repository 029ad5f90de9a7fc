//! facet-analyze: Navigation-chain discovery.
//!
//! Statically recovers the relational navigation paths a corpus of call
//! sites actually dereferences, so that only needed paths are
//! materialized. The scanner recognizes the canonical
//! open-select-terminate pattern, merges per-entity path sets across the
//! corpus, caps path depth with truncation diagnostics, and validates
//! retained paths against the schema model when one is available.

pub mod corpus;
pub mod discovery;
pub mod report;

pub use corpus::{
    anchor_entity, chain_segment, is_terminal, CallSite, ChainUse, ANCHOR_METHOD, CHAIN_PREFIX,
    TERMINAL_METHODS,
};
pub use discovery::{cap_paths, merge_uses, scan_call_site, validate_chains};
pub use report::DiscoveryReport;

use facet_core::{CancelToken, EngineError, EngineOptions, SchemaModel};

/// Run chain discovery over a corpus.
///
/// Scans every unit, merges chain uses into the per-entity path map,
/// applies the depth cap, and validates against `schema` when present
/// (absence disables validation, it does not fail). The only error is
/// cooperative cancellation; the abandoned run produces no output.
pub fn discover(
    corpus: &[CallSite],
    schema: Option<&SchemaModel>,
    options: &EngineOptions,
    cancel: &CancelToken,
) -> Result<DiscoveryReport, EngineError> {
    let mut uses = Vec::new();
    for site in corpus {
        uses.extend(scan_call_site(site, cancel)?);
    }

    let mut report = DiscoveryReport::new();
    report.call_sites_scanned = corpus.len();
    report.chain_uses = uses.len();
    report.chains = merge_uses(uses);
    cap_paths(&mut report.chains, options.max_chain_depth, &mut report.diagnostics);
    if let Some(schema) = schema {
        validate_chains(&report.chains, schema, &mut report.diagnostics);
    }
    report.diagnostics.sort();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_core::{Expr, TypeRef};

    fn facet_site(entity: &str, segments: &[&str], terminal: &str) -> CallSite {
        let anchor = Expr::Call {
            receiver: Some(Box::new(Expr::static_call("query", vec![]))),
            method: "Facet".to_string(),
            type_args: vec![TypeRef::Named(entity.to_string())],
            args: vec![],
        };
        let chained = segments.iter().fold(anchor, |receiver, segment| {
            Expr::call(receiver, format!("With{}", segment), vec![])
        });
        CallSite::new("query.rs", Expr::call(chained, terminal, vec![]))
    }

    #[test]
    fn test_discover_merges_across_sites() {
        let corpus = vec![
            facet_site("Order", &["Customer", "Lines"], "ToListAsync"),
            facet_site("Order", &["Customer"], "ToListAsync"),
        ];
        let report = discover(
            &corpus,
            None,
            &EngineOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.call_sites_scanned, 2);
        assert_eq!(report.chain_uses, 2);
        assert_eq!(
            report.chains["Order"],
            std::collections::BTreeSet::from([
                "Customer".to_string(),
                "Customer/Lines".to_string()
            ])
        );
    }

    #[test]
    fn test_discover_without_schema_skips_validation() {
        let corpus = vec![facet_site("Ghost", &["Nothing"], "First")];
        let report = discover(
            &corpus,
            None,
            &EngineOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_discover_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        let corpus = vec![facet_site("Order", &[], "First")];
        let err = discover(&corpus, None, &EngineOptions::default(), &token).unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }
}
