//! Phases of a price-list reconciliation and the report they produce.

use domain::PriceList;
use serde::Serialize;

/// One step of a reconciliation.
///
/// Phases run strictly in [`Phase::ORDER`]. Only `Validate` is read-only;
/// a failure there leaves both the remote platform and the local store
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Check settings, pricing, partnerships and remote catalog status.
    Validate,
    /// Compare desired products with persisted products.
    ProductDiff,
    /// Unpublish removed products, then publish added ones.
    ProductApply,
    /// Reload the remote to local product id mapping.
    IdentityRemap,
    /// Compare desired variants with persisted variants.
    VariantDiff,
    /// Write variant changes in one local transaction.
    VariantApply,
    /// Write settings and retailer links in one local transaction.
    SettingsApply,
}

impl Phase {
    /// Execution order of the pipeline.
    pub const ORDER: [Phase; 7] = [
        Phase::Validate,
        Phase::ProductDiff,
        Phase::ProductApply,
        Phase::IdentityRemap,
        Phase::VariantDiff,
        Phase::VariantApply,
        Phase::SettingsApply,
    ];

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Validate => "Validate",
            Phase::ProductDiff => "ProductDiff",
            Phase::ProductApply => "ProductApply",
            Phase::IdentityRemap => "IdentityRemap",
            Phase::VariantDiff => "VariantDiff",
            Phase::VariantApply => "VariantApply",
            Phase::SettingsApply => "SettingsApply",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Number of rows each kind of change touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileCounts {
    pub products_added: usize,
    pub products_removed: usize,
    pub variants_added: usize,
    pub variants_updated: usize,
    pub variants_removed: usize,
    pub retailers_attached: usize,
    pub retailers_detached: usize,
}

impl ReconcileCounts {
    /// Returns true if the run changed no product, variant or retailer link.
    pub fn is_noop(&self) -> bool {
        *self == ReconcileCounts::default()
    }
}

/// What a reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Phases that ran to completion, in execution order.
    pub phases: Vec<Phase>,
    pub counts: ReconcileCounts,
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The price list as persisted after the run.
    pub price_list: PriceList,
    pub report: ReconcileReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_puts_products_before_variants() {
        let position = |phase| Phase::ORDER.iter().position(|p| *p == phase).unwrap();

        assert_eq!(position(Phase::Validate), 0);
        assert!(position(Phase::ProductApply) < position(Phase::IdentityRemap));
        assert!(position(Phase::IdentityRemap) < position(Phase::VariantDiff));
        assert!(position(Phase::VariantApply) < position(Phase::SettingsApply));
    }

    #[test]
    fn test_default_counts_are_noop() {
        assert!(ReconcileCounts::default().is_noop());
        let counts = ReconcileCounts {
            variants_updated: 1,
            ..Default::default()
        };
        assert!(!counts.is_noop());
    }
}
