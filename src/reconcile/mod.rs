//! Device-category reconciliation
//!
//! Compares each managed Windows device's category against the department
//! of its primary user and corrects mismatches. The decision for a device
//! is computed by the pure [`classify`] function; the [`Reconciler`] wires
//! it to the Graph API and isolates per-device failures so one bad device
//! never aborts a run.

use crate::error::Result;
use crate::graph::GraphClient;
use crate::graph::devices::{self, DeviceCategory, ManagedDevice};
use crate::graph::users::{self, UserProfile};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Immutable name-to-id map over the tenant's category catalog
///
/// Keys are the raw display names. Matching is verbatim: a department that
/// differs from a category name in case, spacing, or punctuation does not
/// match.
pub struct CategoryCatalog {
    by_name: HashMap<String, String>,
}

impl CategoryCatalog {
    pub fn from_categories(categories: Vec<DeviceCategory>) -> Self {
        let by_name = categories
            .into_iter()
            .map(|c| (c.display_name, c.id))
            .collect();
        Self { by_name }
    }

    /// Fetch the complete catalog; failure here is fatal to the run since
    /// a partial catalog would produce false "no matching category" skips
    pub async fn fetch(client: &GraphClient) -> Result<Self> {
        let categories = devices::list_categories(client).await?;
        Ok(Self::from_categories(categories))
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Run options for the reconciler
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Compute and log decisions without issuing mutating calls
    pub simulate: bool,

    /// Category labels treated as "no category set"
    pub unassigned_labels: Vec<String>,

    /// Operating system family the device enumeration is filtered to
    pub os: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            simulate: false,
            unassigned_labels: crate::config::DEFAULT_UNASSIGNED_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            os: "Windows".to_string(),
        }
    }
}

/// Terminal decision for one device, before any mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoPrimaryUser,
    NoDepartment,
    NoMatchingCategory { department: String },
    AlreadyCorrect,
    UpdateRequired { category_id: String, category_name: String },
}

/// Decide what to do with a device given its primary user's profile
///
/// Pure: no I/O, no clock. `current_label` is the device's recorded
/// category; `user` is `None` when the device has no primary user.
pub fn classify(
    current_label: Option<&str>,
    user: Option<&UserProfile>,
    catalog: &CategoryCatalog,
    unassigned_labels: &[String],
) -> Decision {
    let Some(user) = user else {
        return Decision::NoPrimaryUser;
    };

    let department = match user.department.as_deref() {
        Some(d) if !d.is_empty() => d,
        _ => return Decision::NoDepartment,
    };

    let Some(category_id) = catalog.lookup(department) else {
        return Decision::NoMatchingCategory {
            department: department.to_string(),
        };
    };

    let has_category = match current_label {
        None | Some("") => false,
        Some(label) => !unassigned_labels.iter().any(|l| l == label),
    };

    if has_category && current_label == Some(department) {
        Decision::AlreadyCorrect
    } else {
        Decision::UpdateRequired {
            category_id: category_id.to_string(),
            category_name: department.to_string(),
        }
    }
}

/// Why a device was skipped; folded into one counter but logged distinctly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoPrimaryUser,
    NoDepartment,
    NoMatchingCategory { department: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPrimaryUser => write!(f, "no primary user"),
            SkipReason::NoDepartment => write!(f, "no department"),
            // department is quoted verbatim so naming drift is visible
            SkipReason::NoMatchingCategory { department } => {
                write!(f, "department '{}' has no matching category", department)
            }
        }
    }
}

/// Terminal outcome for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Updated { category_name: String, simulated: bool },
    AlreadyCorrect,
    Skipped(SkipReason),
    Errored(String),
}

/// Counters for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub already_correct: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errored: usize,
    pub simulate: bool,
}

impl RunSummary {
    pub fn new(simulate: bool) -> Self {
        Self {
            total: 0,
            already_correct: 0,
            updated: 0,
            skipped: 0,
            errored: 0,
            simulate,
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Updated { .. } => self.updated += 1,
            Outcome::AlreadyCorrect => self.already_correct += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Errored(_) => self.errored += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} devices: {} updated{}, {} already correct, {} skipped, {} errored",
            self.total,
            self.updated,
            if self.simulate { " (simulated)" } else { "" },
            self.already_correct,
            self.skipped,
            self.errored
        )
    }
}

/// Sequential reconciliation engine
///
/// One run: fetch the full category catalog and device list (both fatal on
/// failure), then process each device exactly once in the order the API
/// returned them.
pub struct Reconciler<'a> {
    client: &'a GraphClient,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a GraphClient, options: ReconcileOptions) -> Self {
        Self { client, options }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        if self.options.simulate {
            tracing::info!("[SIMULATION] Simulation mode: no changes will be made");
        }

        let catalog = CategoryCatalog::fetch(self.client).await?;
        if catalog.is_empty() {
            tracing::warn!("Category catalog is empty; every device with a department will skip");
        }

        let devices = devices::list_devices_by_os(self.client, &self.options.os).await?;
        tracing::info!(
            "Reconciling {} {} devices against {} categories",
            devices.len(),
            self.options.os,
            catalog.len()
        );

        let mut summary = RunSummary::new(self.options.simulate);

        for device in &devices {
            let outcome = self.process_device(device, &catalog).await;
            self.log_outcome(device, &outcome);
            summary.record(&outcome);
        }

        if self.options.simulate {
            tracing::info!(
                "[SIMULATION] Run complete; {} update(s) were simulated, none applied",
                summary.updated
            );
        }
        tracing::info!("Run summary: {}", summary);

        Ok(summary)
    }

    /// Process one device to a terminal outcome. Never returns an error:
    /// failures in the per-device lookups or the update call become
    /// `Outcome::Errored` so the run continues with the next device.
    async fn process_device(&self, device: &ManagedDevice, catalog: &CategoryCatalog) -> Outcome {
        let decision = match self.evaluate(device, catalog).await {
            Ok(decision) => decision,
            Err(e) => return Outcome::Errored(e.to_string()),
        };

        match decision {
            Decision::NoPrimaryUser => Outcome::Skipped(SkipReason::NoPrimaryUser),
            Decision::NoDepartment => Outcome::Skipped(SkipReason::NoDepartment),
            Decision::NoMatchingCategory { department } => {
                Outcome::Skipped(SkipReason::NoMatchingCategory { department })
            }
            Decision::AlreadyCorrect => Outcome::AlreadyCorrect,
            Decision::UpdateRequired {
                category_id,
                category_name,
            } => {
                if self.options.simulate {
                    return Outcome::Updated {
                        category_name,
                        simulated: true,
                    };
                }

                match devices::assign_category(self.client, &device.id, &category_id).await {
                    Ok(()) => Outcome::Updated {
                        category_name,
                        simulated: false,
                    },
                    Err(e) => Outcome::Errored(e.to_string()),
                }
            }
        }
    }

    async fn evaluate(&self, device: &ManagedDevice, catalog: &CategoryCatalog) -> Result<Decision> {
        let user = devices::primary_user(self.client, &device.id).await?;

        let profile = match &user {
            Some(user) => Some(users::get_profile(self.client, &user.id).await?),
            None => None,
        };

        Ok(classify(
            device.device_category_display_name.as_deref(),
            profile.as_ref(),
            catalog,
            &self.options.unassigned_labels,
        ))
    }

    fn log_outcome(&self, device: &ManagedDevice, outcome: &Outcome) {
        let name = &device.device_name;
        match outcome {
            Outcome::Updated {
                category_name,
                simulated: true,
            } => {
                tracing::info!(
                    "[SIMULATION] Would set category '{}' on device '{}' (currently '{}')",
                    category_name,
                    name,
                    device.device_category_display_name.as_deref().unwrap_or("")
                );
            }
            Outcome::Updated {
                category_name,
                simulated: false,
            } => {
                tracing::info!("Updated device '{}' to category '{}'", name, category_name);
            }
            Outcome::AlreadyCorrect => {
                tracing::info!("Device '{}' already correctly categorized", name);
            }
            Outcome::Skipped(reason @ SkipReason::NoMatchingCategory { .. }) => {
                tracing::warn!("Skipped device '{}': {}", name, reason);
            }
            Outcome::Skipped(reason) => {
                tracing::info!("Skipped device '{}': {}", name, reason);
            }
            Outcome::Errored(detail) => {
                tracing::error!("Failed to process device '{}': {}", name, detail);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[(&str, &str)]) -> CategoryCatalog {
        CategoryCatalog::from_categories(
            names
                .iter()
                .map(|(name, id)| DeviceCategory {
                    id: id.to_string(),
                    display_name: name.to_string(),
                    description: None,
                })
                .collect(),
        )
    }

    fn user(department: Option<&str>) -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            display_name: Some("Test User".to_string()),
            department: department.map(String::from),
        }
    }

    fn labels() -> Vec<String> {
        vec!["Unassigned".to_string(), "Unknown".to_string()]
    }

    #[test]
    fn test_no_primary_user_skips() {
        let cat = catalog(&[("Sales", "1")]);
        let decision = classify(Some("Sales"), None, &cat, &labels());
        assert_eq!(decision, Decision::NoPrimaryUser);
    }

    #[test]
    fn test_missing_or_empty_department_skips() {
        let cat = catalog(&[("Sales", "1")]);
        assert_eq!(
            classify(None, Some(&user(None)), &cat, &labels()),
            Decision::NoDepartment
        );
        assert_eq!(
            classify(None, Some(&user(Some(""))), &cat, &labels()),
            Decision::NoDepartment
        );
    }

    #[test]
    fn test_department_without_category_skips() {
        let cat = catalog(&[("Sales", "1")]);
        let decision = classify(None, Some(&user(Some("Engineering"))), &cat, &labels());
        assert_eq!(
            decision,
            Decision::NoMatchingCategory {
                department: "Engineering".to_string()
            }
        );
    }

    #[test]
    fn test_match_is_exact_no_normalization() {
        let cat = catalog(&[("Sales", "1")]);

        // trailing space does not match
        assert_eq!(
            classify(None, Some(&user(Some("Sales "))), &cat, &labels()),
            Decision::NoMatchingCategory {
                department: "Sales ".to_string()
            }
        );
        // case difference does not match
        assert_eq!(
            classify(None, Some(&user(Some("sales"))), &cat, &labels()),
            Decision::NoMatchingCategory {
                department: "sales".to_string()
            }
        );
    }

    #[test]
    fn test_already_correct_when_labels_equal() {
        let cat = catalog(&[("Sales", "1")]);
        let decision = classify(Some("Sales"), Some(&user(Some("Sales"))), &cat, &labels());
        assert_eq!(decision, Decision::AlreadyCorrect);
    }

    #[test]
    fn test_update_required_for_empty_sentinel_or_different_label() {
        let cat = catalog(&[("Engineering", "42")]);
        let expected = Decision::UpdateRequired {
            category_id: "42".to_string(),
            category_name: "Engineering".to_string(),
        };

        for current in [None, Some(""), Some("Unassigned"), Some("Unknown"), Some("Sales")] {
            let decision = classify(current, Some(&user(Some("Engineering"))), &cat, &labels());
            assert_eq!(decision, expected, "current label {:?}", current);
        }
    }

    #[test]
    fn test_sentinel_labels_are_configurable() {
        let cat = catalog(&[("Vertrieb", "7")]);
        let localized = vec!["Nicht zugewiesen".to_string()];

        let decision = classify(
            Some("Nicht zugewiesen"),
            Some(&user(Some("Vertrieb"))),
            &cat,
            &localized,
        );
        assert_eq!(
            decision,
            Decision::UpdateRequired {
                category_id: "7".to_string(),
                category_name: "Vertrieb".to_string(),
            }
        );

        // once overridden, "Unknown" is an ordinary mismatched label
        let decision = classify(Some("Unknown"), Some(&user(Some("Vertrieb"))), &cat, &localized);
        assert_eq!(
            decision,
            Decision::UpdateRequired {
                category_id: "7".to_string(),
                category_name: "Vertrieb".to_string(),
            }
        );
    }

    #[test]
    fn test_catalog_lookup_is_verbatim() {
        let cat = catalog(&[("R&D / Platform", "9")]);
        assert_eq!(cat.lookup("R&D / Platform"), Some("9"));
        assert_eq!(cat.lookup("R&D/Platform"), None);
        assert_eq!(cat.lookup("r&d / platform"), None);
    }

    #[test]
    fn test_summary_accounting() {
        let mut summary = RunSummary::new(false);
        summary.record(&Outcome::Updated {
            category_name: "Sales".to_string(),
            simulated: false,
        });
        summary.record(&Outcome::AlreadyCorrect);
        summary.record(&Outcome::Skipped(SkipReason::NoPrimaryUser));
        summary.record(&Outcome::Skipped(SkipReason::NoMatchingCategory {
            department: "Sales ".to_string(),
        }));
        summary.record(&Outcome::Errored("boom".to_string()));

        assert_eq!(summary.total, 5);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.already_correct, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.errored, 1);
    }
}
