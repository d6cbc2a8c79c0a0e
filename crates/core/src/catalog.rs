//! Reference catalog of INA-CBG diagnosis templates.
//!
//! The catalog is the curated local database consulted before any generative lookup. It is
//! an ordered list rather than a map: codes are expected to be unique but nothing enforces
//! it, and lookups must pick the *first* template with a given code so that results stay
//! deterministic when staff have entered a duplicate.
//!
//! All maintenance operations are copy-on-write. They borrow the current catalog and return
//! a new one; callers replace the stored collection with the result.

use crate::{ClaimError, ClaimResult, Severity};
use klaim_types::{DiagnosisCode, NonEmptyText};
use serde::{Deserialize, Serialize};

/// One curated diagnosis template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTemplate {
    pub code: DiagnosisCode,
    pub description: NonEmptyText,
    #[serde(default)]
    pub severity: Severity,
    /// Standard claim tariff in the smallest monetary unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tariff: Option<u64>,
    #[serde(default)]
    pub required_documents: Vec<String>,
}

impl ReferenceTemplate {
    /// Returns the tariff only when it is set and positive.
    pub fn claimable_tariff(&self) -> Option<u64> {
        self.tariff.filter(|amount| *amount > 0)
    }
}

/// A duplicated code in the catalog.
///
/// This is a latent, non-fatal condition. [`ReferenceCatalog::lookup`] keeps working and
/// returns the template at the first position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogInconsistency {
    pub code: DiagnosisCode,
    /// Catalog positions holding this code, in catalog order.
    pub positions: Vec<usize>,
}

/// Ordered collection of [`ReferenceTemplate`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceCatalog {
    templates: Vec<ReferenceTemplate>,
}

impl ReferenceCatalog {
    pub fn new(templates: Vec<ReferenceTemplate>) -> Self {
        let catalog = Self { templates };
        for inconsistency in catalog.duplicate_codes() {
            tracing::warn!(
                "reference catalog holds duplicate code {} at positions {:?}; first match wins",
                inconsistency.code,
                inconsistency.positions
            );
        }
        catalog
    }

    /// Finds the first template whose code equals `code`.
    pub fn lookup(&self, code: &DiagnosisCode) -> Option<&ReferenceTemplate> {
        self.templates.iter().find(|t| &t.code == code)
    }

    pub fn templates(&self) -> &[ReferenceTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn into_templates(self) -> Vec<ReferenceTemplate> {
        self.templates
    }

    /// Returns a catalog with `template` appended.
    ///
    /// Appending an existing code does not shadow the earlier entry.
    pub fn with_template(&self, template: ReferenceTemplate) -> Self {
        let mut templates = self.templates.clone();
        templates.push(template);
        Self::new(templates)
    }

    /// Returns a catalog with all of `templates` appended, in order.
    pub fn with_templates(&self, templates: impl IntoIterator<Item = ReferenceTemplate>) -> Self {
        let mut merged = self.templates.clone();
        merged.extend(templates);
        Self::new(merged)
    }

    /// Returns a catalog where the first template with `code` is replaced by `template`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::TemplateNotFound`] if no template has `code`.
    pub fn with_template_replaced(
        &self,
        code: &DiagnosisCode,
        template: ReferenceTemplate,
    ) -> ClaimResult<Self> {
        let position = self
            .templates
            .iter()
            .position(|t| &t.code == code)
            .ok_or_else(|| ClaimError::TemplateNotFound(code.to_string()))?;

        let mut templates = self.templates.clone();
        templates[position] = template;
        Ok(Self::new(templates))
    }

    /// Returns a catalog without any template carrying `code`.
    pub fn without_code(&self, code: &DiagnosisCode) -> Self {
        Self {
            templates: self
                .templates
                .iter()
                .filter(|t| &t.code != code)
                .cloned()
                .collect(),
        }
    }

    /// Reports every code that appears more than once.
    pub fn duplicate_codes(&self) -> Vec<CatalogInconsistency> {
        let mut found: Vec<CatalogInconsistency> = Vec::new();
        for (position, template) in self.templates.iter().enumerate() {
            match found.iter_mut().find(|i| i.code == template.code) {
                Some(existing) => existing.positions.push(position),
                None => found.push(CatalogInconsistency {
                    code: template.code.clone(),
                    positions: vec![position],
                }),
            }
        }
        found.retain(|i| i.positions.len() > 1);
        found
    }

    /// A small catalog of common INA-CBG diagnoses for demos and first runs.
    pub fn sample() -> Self {
        fn template(
            code: &str,
            description: &str,
            severity: Severity,
            tariff: u64,
            documents: &[&str],
        ) -> Option<ReferenceTemplate> {
            Some(ReferenceTemplate {
                code: DiagnosisCode::parse(code).ok()?,
                description: NonEmptyText::new(description).ok()?,
                severity,
                tariff: Some(tariff),
                required_documents: documents.iter().map(|d| d.to_string()).collect(),
            })
        }

        let common = ["SEP", "Resume Medis", "Billing Rincian"];
        Self::new(
            [
                template(
                    "J45.9",
                    "Asthma, unspecified",
                    Severity::I,
                    2_114_700,
                    &[common[0], common[1], common[2], "Hasil Spirometri"],
                ),
                template(
                    "I10",
                    "Essential (primary) hypertension",
                    Severity::I,
                    1_857_300,
                    &[common[0], common[1], common[2], "Hasil EKG"],
                ),
                template(
                    "A09",
                    "Diarrhoea and gastroenteritis of presumed infectious origin",
                    Severity::I,
                    2_352_600,
                    &[common[0], common[1], common[2], "Hasil Lab Darah Rutin"],
                ),
                template(
                    "J18.9",
                    "Pneumonia, unspecified",
                    Severity::II,
                    4_685_200,
                    &[
                        common[0],
                        common[1],
                        common[2],
                        "Hasil Rontgen Thorax",
                        "Hasil Lab Darah Rutin",
                    ],
                ),
                template(
                    "E11.9",
                    "Type 2 diabetes mellitus without complications",
                    Severity::I,
                    2_907_900,
                    &[common[0], common[1], common[2], "Hasil Gula Darah", "Hasil HbA1c"],
                ),
            ]
            .into_iter()
            .flatten()
            .collect(),
        )
    }
}

impl FromIterator<ReferenceTemplate> for ReferenceCatalog {
    fn from_iter<I: IntoIterator<Item = ReferenceTemplate>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn template(code: &str, description: &str, tariff: Option<u64>) -> ReferenceTemplate {
        ReferenceTemplate {
            code: DiagnosisCode::parse(code).unwrap(),
            description: NonEmptyText::new(description).unwrap(),
            severity: Severity::II,
            tariff,
            required_documents: vec!["SEP".into(), "Resume Medis".into()],
        }
    }

    fn code(s: &str) -> DiagnosisCode {
        DiagnosisCode::parse(s).unwrap()
    }

    #[test]
    fn test_lookup_is_exact_on_normalised_code() {
        let catalog = ReferenceCatalog::new(vec![template("J45.9", "Asthma", Some(2_114_700))]);

        assert!(catalog.lookup(&code(" j45.9")).is_some());
        assert!(catalog.lookup(&code("J45")).is_none());
    }

    #[test]
    fn test_lookup_picks_first_duplicate() {
        let catalog = ReferenceCatalog::new(vec![
            template("I10", "First", Some(1)),
            template("A09", "Other", None),
            template("I10", "Second", Some(2)),
        ]);

        let found = catalog.lookup(&code("I10")).expect("I10 should be found");
        assert_eq!(found.description.as_str(), "First");

        let duplicates = catalog.duplicate_codes();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].code, code("I10"));
        assert_eq!(duplicates[0].positions, vec![0, 2]);
    }

    #[test]
    fn test_with_template_does_not_touch_original() {
        let original = ReferenceCatalog::new(vec![template("I10", "Hypertension", None)]);
        let extended = original.with_template(template("A09", "Diarrhoea", Some(10)));

        assert_eq!(original.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.templates()[1].code, code("A09"));
    }

    #[test]
    fn test_with_template_replaced_replaces_first_match_only() {
        let catalog = ReferenceCatalog::new(vec![
            template("I10", "First", Some(1)),
            template("I10", "Second", Some(2)),
        ]);

        let updated = catalog
            .with_template_replaced(&code("I10"), template("I10", "Edited", Some(3)))
            .expect("replace should succeed");
        assert_eq!(updated.templates()[0].description.as_str(), "Edited");
        assert_eq!(updated.templates()[1].description.as_str(), "Second");

        let err = catalog
            .with_template_replaced(&code("Z00"), template("Z00", "Missing", None))
            .expect_err("replace of unknown code should fail");
        assert!(matches!(err, ClaimError::TemplateNotFound(_)));
    }

    #[test]
    fn test_without_code_removes_every_duplicate() {
        let catalog = ReferenceCatalog::new(vec![
            template("I10", "First", Some(1)),
            template("A09", "Diarrhoea", None),
            template("I10", "Second", Some(2)),
        ]);

        let trimmed = catalog.without_code(&code("i10"));
        assert_eq!(trimmed.len(), 1);
        assert!(trimmed.lookup(&code("I10")).is_none());
    }

    #[test]
    fn test_claimable_tariff_ignores_zero() {
        assert_eq!(template("I10", "x", Some(0)).claimable_tariff(), None);
        assert_eq!(template("I10", "x", None).claimable_tariff(), None);
        assert_eq!(template("I10", "x", Some(5)).claimable_tariff(), Some(5));
    }

    #[test]
    fn test_sample_catalog_has_asthma_tariff() {
        let catalog = ReferenceCatalog::sample();
        let asthma = catalog.lookup(&code("J45.9")).expect("sample should hold J45.9");
        assert_eq!(asthma.tariff, Some(2_114_700));
        assert!(catalog.duplicate_codes().is_empty());
    }
}
