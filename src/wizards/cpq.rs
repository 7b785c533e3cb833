//! Configure-price-quote wizard for recurring accounting services.
//!
//! Amounts are in fils (1/100 AED) per month.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::validate::{check_email, optional_text, required, required_text};
use super::{Wizard, WizardKind};
use crate::wizard::{
    FieldError, StepData, StepId, StepPayload, WizardDefinition, WizardError, WizardStep,
};

pub const CLIENT: StepId = 1;
pub const SERVICES: StepId = 2;
pub const VOLUME: StepId = 3;
pub const PAYROLL_PLAN: StepId = 4;
pub const TERMS: StepId = 5;
pub const REVIEW: StepId = 6;

pub const MAX_DISCOUNT_PERCENT: u8 = 30;
const DEFAULT_VALID_DAYS: u16 = 30;

const BOOKKEEPING_BASE: i64 = 1_500_00;
const BOOKKEEPING_INCLUDED_TRANSACTIONS: u32 = 100;
const BOOKKEEPING_PER_EXTRA_TRANSACTION: i64 = 5_00;
const BOOKKEEPING_PER_EXTRA_BANK_ACCOUNT: i64 = 100_00;
const VAT_FILING: i64 = 750_00;
const CORPORATE_TAX: i64 = 500_00;
const AUDIT_SUPPORT: i64 = 1_000_00;
const PAYROLL_MINIMUM: i64 = 300_00;
const WPS_PER_EMPLOYEE: i64 = 5_00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Mainland,
    FreeZone,
    Offshore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCode {
    Bookkeeping,
    VatFiling,
    CorporateTax,
    Payroll,
    AuditSupport,
}

impl ServiceCode {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceCode::Bookkeeping => "Bookkeeping",
            ServiceCode::VatFiling => "VAT return filing",
            ServiceCode::CorporateTax => "Corporate tax compliance",
            ServiceCode::Payroll => "Payroll processing",
            ServiceCode::AuditSupport => "Audit support",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollPlan {
    Standard,
    Premium,
}

impl PayrollPlan {
    fn per_employee(self) -> i64 {
        match self {
            PayrollPlan::Standard => 25_00,
            PayrollPlan::Premium => 40_00,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Annual,
}

impl BillingCycle {
    pub fn months(self) -> i64 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Quarterly => 3,
            BillingCycle::Annual => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteClient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePicker {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceCode>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_transactions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_accounts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PayrollPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wps_processing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteTerms {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<BillingCycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_days: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Per-step records of the quote wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum QuoteStep {
    Client(QuoteClient),
    Services(ServicePicker),
    Volume(VolumeInputs),
    PayrollPlan(PayrollOptions),
    Terms(QuoteTerms),
    Review(QuoteReview),
}

impl StepPayload for QuoteStep {
    fn step_id(&self) -> StepId {
        match self {
            QuoteStep::Client(_) => CLIENT,
            QuoteStep::Services(_) => SERVICES,
            QuoteStep::Volume(_) => VOLUME,
            QuoteStep::PayrollPlan(_) => PAYROLL_PLAN,
            QuoteStep::Terms(_) => TERMS,
            QuoteStep::Review(_) => REVIEW,
        }
    }
}

fn selected_services(data: &StepData<QuoteStep>) -> Vec<ServiceCode> {
    match data.get(&SERVICES) {
        Some(QuoteStep::Services(picker)) => {
            let mut services = picker.services.clone();
            services.sort();
            services.dedup();
            services
        }
        _ => Vec::new(),
    }
}

fn payroll_not_selected(data: &StepData<QuoteStep>) -> bool {
    !selected_services(data).contains(&ServiceCode::Payroll)
}

fn check_client(step: &QuoteStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let QuoteStep::Client(c) = step {
        check_email("contact_email", c.contact_email.as_deref(), &mut errors);
    }
    errors
}

fn check_terms(step: &QuoteStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let QuoteStep::Terms(t) = step {
        if t.discount_percent.is_some_and(|d| d > MAX_DISCOUNT_PERCENT) {
            errors.push(FieldError::new(
                "discount_percent",
                format!("cannot exceed {MAX_DISCOUNT_PERCENT}%"),
            ));
        }
        if t.valid_days == Some(0) {
            errors.push(FieldError::new("valid_days", "must be at least one day"));
        }
    }
    errors
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub service: ServiceCode,
    pub description: String,
    pub monthly_fils: i64,
}

/// Priced quote produced by the wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub company_name: String,
    pub contact_email: String,
    pub entity_type: Option<EntityType>,
    pub lines: Vec<QuoteLine>,
    pub subtotal_fils: i64,
    pub discount_percent: u8,
    pub discount_fils: i64,
    pub monthly_total_fils: i64,
    pub billing_cycle: BillingCycle,
    pub invoice_amount_fils: i64,
    pub issued_on: NaiveDate,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
}

fn price_lines(
    services: &[ServiceCode],
    volume: &VolumeInputs,
    payroll: &PayrollOptions,
    errors: &mut Vec<FieldError>,
) -> Vec<QuoteLine> {
    let mut lines = Vec::with_capacity(services.len());
    for service in services {
        let (monthly_fils, description) = match service {
            ServiceCode::Bookkeeping => {
                let transactions = volume.monthly_transactions.unwrap_or(0);
                let extra_tx = transactions.saturating_sub(BOOKKEEPING_INCLUDED_TRANSACTIONS);
                let extra_accounts = volume.bank_accounts.unwrap_or(1).saturating_sub(1);
                (
                    BOOKKEEPING_BASE
                        + i64::from(extra_tx) * BOOKKEEPING_PER_EXTRA_TRANSACTION
                        + i64::from(extra_accounts) * BOOKKEEPING_PER_EXTRA_BANK_ACCOUNT,
                    format!(
                        "{} ({transactions} transactions/month, {} bank accounts)",
                        service.label(),
                        extra_accounts + 1
                    ),
                )
            }
            ServiceCode::VatFiling => (VAT_FILING, service.label().to_string()),
            ServiceCode::CorporateTax => (CORPORATE_TAX, service.label().to_string()),
            ServiceCode::AuditSupport => (AUDIT_SUPPORT, service.label().to_string()),
            ServiceCode::Payroll => {
                let Some(employees) =
                    required(volume.employee_count.as_ref(), "volume.employee_count", errors)
                else {
                    continue;
                };
                let Some(plan) = required(payroll.plan.as_ref(), "payroll_plan.plan", errors) else {
                    continue;
                };
                let mut per_employee = plan.per_employee();
                if payroll.wps_processing == Some(true) {
                    per_employee += WPS_PER_EMPLOYEE;
                }
                (
                    (i64::from(employees) * per_employee).max(PAYROLL_MINIMUM),
                    format!("{} ({employees} employees, {plan:?} plan)", service.label()),
                )
            }
        };
        lines.push(QuoteLine {
            service: *service,
            description,
            monthly_fils,
        });
    }
    lines
}

pub struct QuoteWizard;

impl Wizard for QuoteWizard {
    type Step = QuoteStep;
    type Output = Quote;

    const KIND: WizardKind = WizardKind::Cpq;

    fn definition() -> Result<WizardDefinition<QuoteStep>, WizardError> {
        WizardDefinition::new(
            "cpq",
            vec![
                WizardStep::new(CLIENT, "client", "Client")
                    .require(&["company_name", "contact_email"])
                    .check(check_client),
                WizardStep::new(SERVICES, "services", "Services").require(&["services"]),
                WizardStep::new(VOLUME, "volume", "Volume"),
                WizardStep::new(PAYROLL_PLAN, "payroll_plan", "Payroll plan")
                    .require(&["plan"])
                    .skip_when(payroll_not_selected),
                WizardStep::new(TERMS, "terms", "Terms")
                    .require(&["billing_cycle"])
                    .check(check_terms),
                WizardStep::new(REVIEW, "review", "Review"),
            ],
        )
    }

    fn finalize(data: &StepData<QuoteStep>) -> Result<Quote, Vec<FieldError>> {
        let mut errors = Vec::new();

        let client = match data.get(&CLIENT) {
            Some(QuoteStep::Client(c)) => c.clone(),
            _ => QuoteClient::default(),
        };
        let company_name = required_text(client.company_name.as_ref(), "client.company_name", &mut errors);
        let contact_email =
            required_text(client.contact_email.as_ref(), "client.contact_email", &mut errors);
        check_email("client.contact_email", client.contact_email.as_deref(), &mut errors);

        let services = selected_services(data);
        if services.is_empty() {
            errors.push(FieldError::required("services.services"));
        }
        let volume = match data.get(&VOLUME) {
            Some(QuoteStep::Volume(v)) => v.clone(),
            _ => VolumeInputs::default(),
        };
        let payroll = match data.get(&PAYROLL_PLAN) {
            Some(QuoteStep::PayrollPlan(p)) => p.clone(),
            _ => PayrollOptions::default(),
        };
        let terms = match data.get(&TERMS) {
            Some(QuoteStep::Terms(t)) => t.clone(),
            _ => QuoteTerms::default(),
        };
        let billing_cycle = required(terms.billing_cycle.as_ref(), "terms.billing_cycle", &mut errors)
            .unwrap_or(BillingCycle::Monthly);
        let discount_percent = terms.discount_percent.unwrap_or(0);
        if discount_percent > MAX_DISCOUNT_PERCENT {
            errors.push(FieldError::new(
                "terms.discount_percent",
                format!("cannot exceed {MAX_DISCOUNT_PERCENT}%"),
            ));
        }

        let lines = price_lines(&services, &volume, &payroll, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        let subtotal_fils: i64 = lines.iter().map(|l| l.monthly_fils).sum();
        let discount_fils = subtotal_fils * i64::from(discount_percent) / 100;
        let monthly_total_fils = subtotal_fils - discount_fils;
        let issued_on = Utc::now().date_naive();
        let valid_days = terms.valid_days.unwrap_or(DEFAULT_VALID_DAYS).max(1);
        let notes = match data.get(&REVIEW) {
            Some(QuoteStep::Review(r)) => optional_text(r.notes.clone()),
            _ => None,
        };

        Ok(Quote {
            company_name,
            contact_email,
            entity_type: client.entity_type,
            lines,
            subtotal_fils,
            discount_percent,
            discount_fils,
            monthly_total_fils,
            billing_cycle,
            invoice_amount_fils: monthly_total_fils * billing_cycle.months(),
            issued_on,
            valid_until: issued_on + Duration::days(i64::from(valid_days)),
            notes,
        })
    }
}
