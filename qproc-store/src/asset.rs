//! Local asset metadata collaborator
//!
//! The store needs two facts about an asset that the backend already shipped
//! with the asset itself: whether processing features are activated, and
//! which question paths are processing-enabled. Applications hold this in
//! their asset cache; the store only sees this trait.

use qproc_common::types::QuestionPath;

/// Read-only view of locally cached asset metadata
pub trait AssetSource: Send + Sync {
    /// Whether the asset already has processing features activated
    fn is_processing_activated(&self, asset_uid: &str) -> bool;

    /// Processing-enabled questions of the asset, in survey order
    ///
    /// Empty when the asset is unknown or has no processing-enabled
    /// questions.
    fn processing_questions(&self, asset_uid: &str) -> Vec<QuestionPath>;
}
