//! Client onboarding wizard.
//!
//! Collects company, contact and workforce details plus the services the
//! client signs up for. The payroll setup step is only shown when the client
//! has employees.

use serde::{Deserialize, Serialize};

use super::validate::{check_email, check_trn, optional_text, required, required_text};
use super::{Wizard, WizardKind};
use crate::wizard::{
    FieldError, StepData, StepId, StepPayload, WizardDefinition, WizardError, WizardStep,
};

pub const COMPANY: StepId = 1;
pub const CONTACT: StepId = 2;
pub const WORKFORCE: StepId = 3;
pub const PAYROLL: StepId = 4;
pub const SERVICES: StepId = 5;
pub const REVIEW: StepId = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayFrequency {
    Monthly,
    SemiMonthly,
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_license_no: Option<String>,
    /// Emirate or free zone of registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_trn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Workforce {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_frequency: Option<PayFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wps_registered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollSetup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    /// Ministry of Labour establishment id, needed for WPS files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mol_establishment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_day: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookkeeping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_filing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corporate_tax: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payroll_processing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_support: Option<bool>,
}

impl ServiceSelection {
    pub fn selected(&self) -> Vec<&'static str> {
        [
            ("bookkeeping", self.bookkeeping),
            ("vat_filing", self.vat_filing),
            ("corporate_tax", self.corporate_tax),
            ("payroll_processing", self.payroll_processing),
            ("audit_support", self.audit_support),
        ]
        .into_iter()
        .filter(|(_, on)| *on == Some(true))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewNotes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Per-step records of the onboarding wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum OnboardingStep {
    Company(CompanyDetails),
    Contact(PrimaryContact),
    Workforce(Workforce),
    Payroll(PayrollSetup),
    Services(ServiceSelection),
    Review(ReviewNotes),
}

impl StepPayload for OnboardingStep {
    fn step_id(&self) -> StepId {
        match self {
            OnboardingStep::Company(_) => COMPANY,
            OnboardingStep::Contact(_) => CONTACT,
            OnboardingStep::Workforce(_) => WORKFORCE,
            OnboardingStep::Payroll(_) => PAYROLL,
            OnboardingStep::Services(_) => SERVICES,
            OnboardingStep::Review(_) => REVIEW,
        }
    }
}

fn company(data: &StepData<OnboardingStep>) -> Option<&CompanyDetails> {
    match data.get(&COMPANY) {
        Some(OnboardingStep::Company(c)) => Some(c),
        _ => None,
    }
}

fn contact(data: &StepData<OnboardingStep>) -> Option<&PrimaryContact> {
    match data.get(&CONTACT) {
        Some(OnboardingStep::Contact(c)) => Some(c),
        _ => None,
    }
}

fn workforce(data: &StepData<OnboardingStep>) -> Option<&Workforce> {
    match data.get(&WORKFORCE) {
        Some(OnboardingStep::Workforce(w)) => Some(w),
        _ => None,
    }
}

fn payroll(data: &StepData<OnboardingStep>) -> Option<&PayrollSetup> {
    match data.get(&PAYROLL) {
        Some(OnboardingStep::Payroll(p)) => Some(p),
        _ => None,
    }
}

fn services(data: &StepData<OnboardingStep>) -> Option<&ServiceSelection> {
    match data.get(&SERVICES) {
        Some(OnboardingStep::Services(s)) => Some(s),
        _ => None,
    }
}

/// No employees means there is no payroll to set up
fn has_no_employees(data: &StepData<OnboardingStep>) -> bool {
    workforce(data).and_then(|w| w.employee_count) == Some(0)
}

fn check_company(step: &OnboardingStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let OnboardingStep::Company(c) = step {
        check_trn("vat_trn", c.vat_trn.as_deref(), &mut errors);
    }
    errors
}

fn check_contact(step: &OnboardingStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let OnboardingStep::Contact(c) = step {
        check_email("email", c.email.as_deref(), &mut errors);
    }
    errors
}

fn check_payroll(step: &OnboardingStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let OnboardingStep::Payroll(p) = step {
        if let Some(day) = p.pay_day {
            if !(1..=28).contains(&day) {
                errors.push(FieldError::new("pay_day", "must be between 1 and 28"));
            }
        }
    }
    errors
}

fn check_services(step: &OnboardingStep) -> Vec<FieldError> {
    match step {
        OnboardingStep::Services(s) if s.selected().is_empty() => {
            vec![FieldError::new("services", "select at least one service")]
        }
        _ => Vec::new(),
    }
}

/// Payroll details of an onboarded client with employees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollProfile {
    pub bank_name: String,
    pub mol_establishment_id: Option<String>,
    pub pay_day: Option<u8>,
    pub pay_frequency: PayFrequency,
    pub wps_registered: bool,
}

/// Record created when onboarding completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub legal_name: String,
    pub trade_license_no: String,
    pub jurisdiction: Option<String>,
    pub industry: Option<String>,
    pub vat_trn: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub employee_count: u32,
    pub payroll: Option<PayrollProfile>,
    pub services: Vec<String>,
    pub notes: Option<String>,
}

pub struct OnboardingWizard;

impl Wizard for OnboardingWizard {
    type Step = OnboardingStep;
    type Output = ClientProfile;

    const KIND: WizardKind = WizardKind::Onboarding;

    fn definition() -> Result<WizardDefinition<OnboardingStep>, WizardError> {
        WizardDefinition::new(
            "onboarding",
            vec![
                WizardStep::new(COMPANY, "company", "Company details")
                    .require(&["legal_name", "trade_license_no"])
                    .check(check_company),
                WizardStep::new(CONTACT, "contact", "Primary contact")
                    .require(&["full_name", "email"])
                    .check(check_contact),
                WizardStep::new(WORKFORCE, "workforce", "Workforce").require(&["employee_count"]),
                WizardStep::new(PAYROLL, "payroll", "Payroll setup")
                    .require(&["bank_name"])
                    .check(check_payroll)
                    .skip_when(has_no_employees),
                WizardStep::new(SERVICES, "services", "Services").check(check_services),
                WizardStep::new(REVIEW, "review", "Review"),
            ],
        )
    }

    fn finalize(data: &StepData<OnboardingStep>) -> Result<ClientProfile, Vec<FieldError>> {
        let mut errors = Vec::new();

        let company = company(data).cloned().unwrap_or_default();
        let legal_name = required_text(company.legal_name.as_ref(), "company.legal_name", &mut errors);
        let trade_license_no = required_text(
            company.trade_license_no.as_ref(),
            "company.trade_license_no",
            &mut errors,
        );
        check_trn("company.vat_trn", company.vat_trn.as_deref(), &mut errors);

        let contact = contact(data).cloned().unwrap_or_default();
        let contact_name = required_text(contact.full_name.as_ref(), "contact.full_name", &mut errors);
        let contact_email = required_text(contact.email.as_ref(), "contact.email", &mut errors);
        check_email("contact.email", contact.email.as_deref(), &mut errors);

        let workforce = workforce(data).cloned().unwrap_or_default();
        let employee_count = required(
            workforce.employee_count.as_ref(),
            "workforce.employee_count",
            &mut errors,
        )
        .unwrap_or(0);

        let payroll = if employee_count > 0 {
            let setup = payroll(data).cloned().unwrap_or_default();
            let bank_name = required_text(setup.bank_name.as_ref(), "payroll.bank_name", &mut errors);
            Some(PayrollProfile {
                bank_name,
                mol_establishment_id: optional_text(setup.mol_establishment_id),
                pay_day: setup.pay_day,
                pay_frequency: workforce.pay_frequency.unwrap_or(PayFrequency::Monthly),
                wps_registered: workforce.wps_registered.unwrap_or(false),
            })
        } else {
            None
        };

        let services: Vec<String> = services(data)
            .map(|s| s.selected().into_iter().map(String::from).collect())
            .unwrap_or_default();
        if services.is_empty() {
            errors.push(FieldError::new("services", "select at least one service"));
        }
        if payroll.is_none() && services.iter().any(|s| s == "payroll_processing") {
            errors.push(FieldError::new(
                "services.payroll_processing",
                "requires at least one employee",
            ));
        }

        let notes = match data.get(&REVIEW) {
            Some(OnboardingStep::Review(r)) => optional_text(r.notes.clone()),
            _ => None,
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(ClientProfile {
            legal_name,
            trade_license_no,
            jurisdiction: optional_text(company.jurisdiction),
            industry: optional_text(company.industry),
            vat_trn: optional_text(company.vat_trn),
            contact_name,
            contact_email,
            contact_phone: optional_text(contact.phone),
            employee_count,
            payroll,
            services,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::wizard::{Navigation, WizardController};

    fn controller() -> WizardController<OnboardingStep> {
        WizardController::new(Arc::new(OnboardingWizard::definition().unwrap())).unwrap()
    }

    fn fill_company_and_contact(wizard: &mut WizardController<OnboardingStep>) {
        wizard
            .update_step_data(OnboardingStep::Company(CompanyDetails {
                legal_name: Some("Falcon Trading LLC".into()),
                trade_license_no: Some("DED-778812".into()),
                ..Default::default()
            }))
            .unwrap();
        assert!(wizard.go_next().moved());
        wizard
            .update_step_data(OnboardingStep::Contact(PrimaryContact {
                full_name: Some("Mariam Haddad".into()),
                email: Some("mariam@falcon.ae".into()),
                phone: None,
            }))
            .unwrap();
        assert!(wizard.go_next().moved());
    }

    #[test]
    fn test_zero_employees_skips_payroll_setup() {
        let mut wizard = controller();
        fill_company_and_contact(&mut wizard);
        wizard
            .update_step_data(OnboardingStep::Workforce(Workforce {
                employee_count: Some(0),
                ..Default::default()
            }))
            .unwrap();

        assert_eq!(
            wizard.go_next(),
            Navigation::Moved {
                from: WORKFORCE,
                to: SERVICES
            }
        );
        assert!(wizard.is_skipped(PAYROLL));
    }

    #[test]
    fn test_invalid_email_blocks_contact_step() {
        let mut wizard = controller();
        wizard.go_to_step(CONTACT);
        wizard
            .update_step_data(OnboardingStep::Contact(PrimaryContact {
                full_name: Some("Omar".into()),
                email: Some("omar-at-example".into()),
                phone: None,
            }))
            .unwrap();

        match wizard.go_next() {
            Navigation::Blocked { errors } => {
                assert_eq!(errors[0].field, "email");
            }
            other => panic!("expected blocked, got {other:?}"),
        }
    }

    #[test]
    fn test_clearing_bad_trn_unblocks_company_step() {
        let mut wizard = controller();
        wizard
            .update_step_data(OnboardingStep::Company(CompanyDetails {
                legal_name: Some("Falcon Trading LLC".into()),
                trade_license_no: Some("DED-778812".into()),
                vat_trn: Some("12345".into()),
                ..Default::default()
            }))
            .unwrap();
        assert!(matches!(wizard.go_next(), Navigation::Blocked { .. }));

        wizard
            .update_step_data(OnboardingStep::Company(CompanyDetails {
                vat_trn: Some(String::new()),
                ..Default::default()
            }))
            .unwrap();
        assert!(wizard.go_next().moved());
    }

    #[test]
    fn test_finalize_builds_profile_without_payroll() {
        let mut data = StepData::new();
        data.insert(
            COMPANY,
            OnboardingStep::Company(CompanyDetails {
                legal_name: Some("Falcon Trading LLC".into()),
                trade_license_no: Some("DED-778812".into()),
                vat_trn: Some("100234567800003".into()),
                ..Default::default()
            }),
        );
        data.insert(
            CONTACT,
            OnboardingStep::Contact(PrimaryContact {
                full_name: Some("Mariam Haddad".into()),
                email: Some("mariam@falcon.ae".into()),
                phone: Some("+971 4 000 0000".into()),
            }),
        );
        data.insert(
            WORKFORCE,
            OnboardingStep::Workforce(Workforce {
                employee_count: Some(0),
                ..Default::default()
            }),
        );
        data.insert(
            SERVICES,
            OnboardingStep::Services(ServiceSelection {
                bookkeeping: Some(true),
                vat_filing: Some(true),
                ..Default::default()
            }),
        );

        let profile = OnboardingWizard::finalize(&data).unwrap();
        assert_eq!(profile.legal_name, "Falcon Trading LLC");
        assert_eq!(profile.payroll, None);
        assert_eq!(profile.services, vec!["bookkeeping", "vat_filing"]);
    }

    #[test]
    fn test_finalize_reports_missing_fields() {
        let errors = OnboardingWizard::finalize(&StepData::new()).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"company.legal_name"));
        assert!(fields.contains(&"contact.email"));
        assert!(fields.contains(&"workforce.employee_count"));
        assert!(fields.contains(&"services"));
    }

    #[test]
    fn test_finalize_requires_bank_when_employees_present() {
        let mut data = StepData::new();
        data.insert(
            WORKFORCE,
            OnboardingStep::Workforce(Workforce {
                employee_count: Some(12),
                ..Default::default()
            }),
        );
        let errors = OnboardingWizard::finalize(&data).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "payroll.bank_name"));
    }
}
