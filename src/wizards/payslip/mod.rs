//! Monthly payslip generation wizard.
//!
//! The user picks a pay period, lists the employees on the run, enters
//! one-off adjustments and chooses how the payslips are delivered. The email
//! template step only appears when payslips are emailed. Finalizing produces a
//! [`PayslipBatch`] with each employee's net pay; the [`PayslipDispatcher`]
//! turns that batch into documents and outgoing mail once it is submitted.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::validate::{check_email, optional_text, required};
use super::{Wizard, WizardKind};
use crate::wizard::{
    FieldError, StepData, StepId, StepPayload, WizardDefinition, WizardError, WizardStep,
};

pub mod delivery;

pub use delivery::{
    DocumentGenerator, Mailer, OutboxMailer, OutgoingEmail, PayslipDispatcher, TextPayslipRenderer,
};

pub const PERIOD: StepId = 1;
pub const EMPLOYEES: StepId = 2;
pub const ADJUSTMENTS: StepId = 3;
pub const DELIVERY: StepId = 4;
pub const EMAIL: StepId = 5;
pub const CONFIRM: StepId = 6;

/// Largest amount a single pay line or adjustment may carry (AED 100 million)
pub const MAX_AMOUNT_FILS: i64 = 10_000_000_000;

/// Employee ids end up in document file names
static EMPLOYEE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,32}$").expect("valid employee id regex"));

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayPeriod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeLine {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub basic_fils: i64,
    #[serde(default)]
    pub allowances_fils: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeRoster {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub employees: Vec<EmployeeLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Bonus,
    Overtime,
    Deduction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub employee_id: String,
    pub kind: AdjustmentKind,
    pub amount_fils: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentList {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Adjustment>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_email: Option<bool>,
    /// Write a payslip document per employee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_documents: Option<bool>,
}

/// Handlebars templates for the payslip email; unset parts use configured defaults
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfirmation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PayslipStep {
    Period(PayPeriod),
    Employees(EmployeeRoster),
    Adjustments(AdjustmentList),
    Delivery(DeliveryOptions),
    Email(EmailTemplate),
    Confirm(RunConfirmation),
}

impl StepPayload for PayslipStep {
    fn step_id(&self) -> StepId {
        match self {
            PayslipStep::Period(_) => PERIOD,
            PayslipStep::Employees(_) => EMPLOYEES,
            PayslipStep::Adjustments(_) => ADJUSTMENTS,
            PayslipStep::Delivery(_) => DELIVERY,
            PayslipStep::Email(_) => EMAIL,
            PayslipStep::Confirm(_) => CONFIRM,
        }
    }
}

fn delivery(data: &StepData<PayslipStep>) -> Option<&DeliveryOptions> {
    match data.get(&DELIVERY) {
        Some(PayslipStep::Delivery(d)) => Some(d),
        _ => None,
    }
}

fn not_emailing(data: &StepData<PayslipStep>) -> bool {
    delivery(data).and_then(|d| d.send_email) != Some(true)
}

fn check_period(step: &PayslipStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let PayslipStep::Period(p) = step {
        if p.year.is_some_and(|y| !(2000..=2100).contains(&y)) {
            errors.push(FieldError::new("year", "must be between 2000 and 2100"));
        }
        if p.month.is_some_and(|m| !(1..=12).contains(&m)) {
            errors.push(FieldError::new("month", "must be between 1 and 12"));
        }
    }
    errors
}

fn check_roster(step: &PayslipStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let PayslipStep::Employees(roster) = step else {
        return errors;
    };
    let mut seen = HashSet::new();
    for (i, employee) in roster.employees.iter().enumerate() {
        let field = |name: &str| format!("employees[{i}].{name}");
        if !EMPLOYEE_ID_RE.is_match(&employee.id) {
            errors.push(FieldError::new(
                field("id"),
                "must be 1-32 letters, digits, '-' or '_'",
            ));
        } else if !seen.insert(employee.id.as_str()) {
            errors.push(FieldError::new(field("id"), "is listed twice"));
        }
        if employee.name.trim().is_empty() {
            errors.push(FieldError::required(field("name")));
        }
        for (name, amount) in [
            ("basic_fils", employee.basic_fils),
            ("allowances_fils", employee.allowances_fils),
        ] {
            if amount < 0 {
                errors.push(FieldError::new(field(name), "cannot be negative"));
            } else if amount > MAX_AMOUNT_FILS {
                errors.push(FieldError::new(field(name), "amount too large"));
            }
        }
        check_email(&field("email"), employee.email.as_deref(), &mut errors);
    }
    errors
}

fn check_adjustments(step: &PayslipStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let PayslipStep::Adjustments(list) = step {
        for (i, item) in list.items.iter().enumerate() {
            if let Some(message) = adjustment_amount_error(item.amount_fils) {
                errors.push(FieldError::new(format!("items[{i}].amount_fils"), message));
            }
        }
    }
    errors
}

fn adjustment_amount_error(amount_fils: i64) -> Option<&'static str> {
    if amount_fils <= 0 {
        Some("must be positive")
    } else if amount_fils > MAX_AMOUNT_FILS {
        Some("amount too large")
    } else {
        None
    }
}

/// Sum of fils amounts, `None` on overflow
fn checked_sum(amounts: impl IntoIterator<Item = i64>) -> Option<i64> {
    amounts
        .into_iter()
        .try_fold(0i64, |total, amount| total.checked_add(amount))
}

fn check_email_template(step: &PayslipStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let PayslipStep::Email(t) = step {
        for (field, source) in [("subject", &t.subject), ("body", &t.body)] {
            if let Some(source) = source {
                if let Err(e) = handlebars::Template::compile(source) {
                    errors.push(FieldError::new(field, format!("invalid template: {e}")));
                }
            }
        }
        check_email("reply_to", t.reply_to.as_deref(), &mut errors);
    }
    errors
}

/// One employee's computed payslip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payslip {
    pub employee_id: String,
    pub name: String,
    pub email: Option<String>,
    pub basic_fils: i64,
    pub allowances_fils: i64,
    pub bonus_fils: i64,
    pub overtime_fils: i64,
    pub deductions_fils: i64,
    pub gross_fils: i64,
    pub net_fils: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub send_email: bool,
    pub generate_documents: bool,
}

/// Output of the payslip wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayslipBatch {
    /// `YYYY-MM`
    pub period: String,
    pub slips: Vec<Payslip>,
    pub total_gross_fils: i64,
    pub total_deductions_fils: i64,
    pub total_net_fils: i64,
    pub delivery: DeliveryPlan,
    /// Present only when emailing
    pub email: Option<EmailTemplate>,
    pub note: Option<String>,
}

#[derive(Default)]
struct Totals {
    bonus: i64,
    overtime: i64,
    deductions: i64,
}

/// Format fils as `AED 1,234.50`
pub fn format_aed(fils: i64) -> String {
    let sign = if fils < 0 { "-" } else { "" };
    let abs = fils.unsigned_abs();
    let whole = (abs / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}AED {grouped}.{:02}", abs % 100)
}

pub struct PayslipWizard;

impl Wizard for PayslipWizard {
    type Step = PayslipStep;
    type Output = PayslipBatch;

    const KIND: WizardKind = WizardKind::Payslip;

    fn definition() -> Result<WizardDefinition<PayslipStep>, WizardError> {
        WizardDefinition::new(
            "payslip",
            vec![
                WizardStep::new(PERIOD, "period", "Pay period")
                    .require(&["year", "month"])
                    .check(check_period),
                WizardStep::new(EMPLOYEES, "employees", "Employees")
                    .require(&["employees"])
                    .check(check_roster),
                WizardStep::new(ADJUSTMENTS, "adjustments", "Adjustments")
                    .check(check_adjustments),
                WizardStep::new(DELIVERY, "delivery", "Delivery").require(&["send_email"]),
                WizardStep::new(EMAIL, "email", "Email template")
                    .check(check_email_template)
                    .skip_when(not_emailing),
                WizardStep::new(CONFIRM, "confirm", "Confirm"),
            ],
        )
    }

    fn finalize(data: &StepData<PayslipStep>) -> Result<PayslipBatch, Vec<FieldError>> {
        let mut errors = Vec::new();

        let period = match data.get(&PERIOD) {
            Some(PayslipStep::Period(p)) => p.clone(),
            _ => PayPeriod::default(),
        };
        let year = required(period.year.as_ref(), "period.year", &mut errors);
        let month = required(period.month.as_ref(), "period.month", &mut errors);

        let employees = match data.get(&EMPLOYEES) {
            Some(step @ PayslipStep::Employees(roster)) => {
                errors.extend(check_roster(step));
                roster.employees.clone()
            }
            _ => Vec::new(),
        };
        if employees.is_empty() {
            errors.push(FieldError::required("employees.employees"));
        }

        let mut adjustments: BTreeMap<&str, Totals> = BTreeMap::new();
        if let Some(PayslipStep::Adjustments(list)) = data.get(&ADJUSTMENTS) {
            for (i, item) in list.items.iter().enumerate() {
                if !employees.iter().any(|e| e.id == item.employee_id) {
                    errors.push(FieldError::new(
                        format!("adjustments.items[{i}].employee_id"),
                        format!("'{}' is not on this run", item.employee_id),
                    ));
                    continue;
                }
                if let Some(message) = adjustment_amount_error(item.amount_fils) {
                    errors.push(FieldError::new(
                        format!("adjustments.items[{i}].amount_fils"),
                        message,
                    ));
                    continue;
                }
                let totals = adjustments.entry(item.employee_id.as_str()).or_default();
                let slot = match item.kind {
                    AdjustmentKind::Bonus => &mut totals.bonus,
                    AdjustmentKind::Overtime => &mut totals.overtime,
                    AdjustmentKind::Deduction => &mut totals.deductions,
                };
                match slot.checked_add(item.amount_fils) {
                    Some(sum) => *slot = sum,
                    None => errors.push(FieldError::new(
                        format!("adjustments.items[{i}].amount_fils"),
                        "amount too large",
                    )),
                }
            }
        }

        let options = delivery(data).cloned().unwrap_or_default();
        let send_email = options.send_email.unwrap_or(false);
        let plan = DeliveryPlan {
            send_email,
            generate_documents: options.generate_documents.unwrap_or(true),
        };

        let mut slips = Vec::with_capacity(employees.len());
        for employee in &employees {
            let totals = adjustments.get(employee.id.as_str());
            let bonus_fils = totals.map_or(0, |t| t.bonus);
            let overtime_fils = totals.map_or(0, |t| t.overtime);
            let deductions_fils = totals.map_or(0, |t| t.deductions);
            let pay = checked_sum([
                employee.basic_fils,
                employee.allowances_fils,
                bonus_fils,
                overtime_fils,
            ])
            .and_then(|gross| Some((gross, gross.checked_sub(deductions_fils)?)));
            let Some((gross_fils, net_fils)) = pay else {
                errors.push(FieldError::new(
                    format!("employees.{}", employee.id),
                    "amount too large",
                ));
                continue;
            };
            if net_fils < 0 {
                errors.push(FieldError::new(
                    format!("employees.{}", employee.id),
                    "deductions exceed gross pay",
                ));
            }
            let email = optional_text(employee.email.clone());
            if send_email && email.is_none() {
                errors.push(FieldError::new(
                    format!("employees.{}.email", employee.id),
                    "is required when emailing payslips",
                ));
            }
            slips.push(Payslip {
                employee_id: employee.id.clone(),
                name: employee.name.trim().to_string(),
                email,
                basic_fils: employee.basic_fils,
                allowances_fils: employee.allowances_fils,
                bonus_fils,
                overtime_fils,
                deductions_fils,
                gross_fils,
                net_fils,
            });
        }

        let email = if send_email {
            match data.get(&EMAIL) {
                Some(step @ PayslipStep::Email(template)) => {
                    errors.extend(check_email_template(step));
                    Some(EmailTemplate {
                        subject: optional_text(template.subject.clone()),
                        body: optional_text(template.body.clone()),
                        reply_to: optional_text(template.reply_to.clone()),
                    })
                }
                _ => Some(EmailTemplate::default()),
            }
        } else {
            None
        };

        let note = match data.get(&CONFIRM) {
            Some(PayslipStep::Confirm(c)) => c
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
            _ => None,
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        let (Some(year), Some(month)) = (year, month) else {
            return Err(vec![FieldError::required("period")]);
        };
        let totals = (
            checked_sum(slips.iter().map(|s| s.gross_fils)),
            checked_sum(slips.iter().map(|s| s.deductions_fils)),
            checked_sum(slips.iter().map(|s| s.net_fils)),
        );
        let (Some(total_gross_fils), Some(total_deductions_fils), Some(total_net_fils)) = totals
        else {
            return Err(vec![FieldError::new("employees", "amount too large")]);
        };

        Ok(PayslipBatch {
            period: format!("{year:04}-{month:02}"),
            total_gross_fils,
            total_deductions_fils,
            total_net_fils,
            slips,
            delivery: plan,
            email,
            note,
        })
    }
}
