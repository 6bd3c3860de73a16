//! Outlet configuration.
//!
//! Everything an operation needs beyond the persisted graph: the business
//! timezone (sequence numbers reset per local day), the interstate flag, the
//! dine-in service-charge rule and document number prefixes. The config is
//! passed into every manager constructor — there is no process-wide state.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared::models::TaxComponentRate;

/// How the service-charge amount is derived from the taxable amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "basis", content = "value")]
pub enum ChargeBasis {
    Percentage(f64),
    Flat(f64),
}

/// Whether the service charge is itself taxed, and with which components.
///
/// Which tax group applies to the charge is outlet-configuration-dependent,
/// so it is carried as data here rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "treatment")]
pub enum ChargeTaxTreatment {
    #[default]
    Exempt,
    Taxed {
        components: Vec<TaxComponentRate>,
    },
}

/// Outlet service-charge rule, applied to dine-in bills only and never to
/// split invoices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceChargeRule {
    pub basis: ChargeBasis,
    #[serde(default)]
    pub tax: ChargeTaxTreatment,
}

/// Per-outlet engine configuration.
#[derive(Debug, Clone)]
pub struct OutletConfig {
    pub outlet_id: String,
    /// Business timezone; order/ticket sequences reset at local midnight.
    pub timezone: Tz,
    /// Interstate supply collapses split tax components into a single IGST
    /// line at the summed rate.
    pub interstate: bool,
    pub service_charge: Option<ServiceChargeRule>,
    pub order_prefix: String,
    pub invoice_prefix: String,
}

impl Default for OutletConfig {
    fn default() -> Self {
        Self {
            outlet_id: "main".to_string(),
            timezone: chrono_tz::Asia::Kolkata,
            interstate: false,
            service_charge: None,
            order_prefix: "ORD".to_string(),
            invoice_prefix: "INV".to_string(),
        }
    }
}

impl OutletConfig {
    pub fn new(outlet_id: impl Into<String>) -> Self {
        Self {
            outlet_id: outlet_id.into(),
            ..Default::default()
        }
    }

    /// Override the service-charge rule (common in tests).
    pub fn with_service_charge(mut self, rule: ServiceChargeRule) -> Self {
        self.service_charge = Some(rule);
        self
    }

    pub fn with_interstate(mut self, interstate: bool) -> Self {
        self.interstate = interstate;
        self
    }
}
