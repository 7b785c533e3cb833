//! Payslip documents and email hand-off after a payslip run is submitted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{format_aed, Payslip, PayslipBatch};
use crate::config::Config;
use crate::drafts::file::write_atomic;
use crate::submit::{CompletionHook, Submission, SubmissionReceipt};
use crate::wizards::WizardKind;

/// Renders one employee's payslip document
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Write the document and return where it was stored
    async fn generate(&self, batch: &PayslipBatch, slip: &Payslip) -> Result<PathBuf>;
}

/// Outbound mail collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &OutgoingEmail) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PathBuf>,
}

/// Plain-text payslips written to `<dir>/<period>/<employee id>.txt`
#[derive(Debug, Clone)]
pub struct TextPayslipRenderer {
    dir: PathBuf,
}

impl TextPayslipRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn render_text(batch: &PayslipBatch, slip: &Payslip) -> String {
    let rows = [
        ("Basic salary", slip.basic_fils),
        ("Allowances", slip.allowances_fils),
        ("Bonus", slip.bonus_fils),
        ("Overtime", slip.overtime_fils),
        ("Deductions", -slip.deductions_fils),
    ];
    let mut out = format!(
        "PAYSLIP {}\n{} ({})\n\n",
        batch.period, slip.name, slip.employee_id
    );
    for (label, fils) in rows.iter().filter(|(_, fils)| *fils != 0) {
        out.push_str(&format!("{label:<16}{:>20}\n", format_aed(*fils)));
    }
    out.push_str(&format!("{:-<36}\n", ""));
    out.push_str(&format!("{:<16}{:>20}\n", "Gross pay", format_aed(slip.gross_fils)));
    out.push_str(&format!("{:<16}{:>20}\n", "Net pay", format_aed(slip.net_fils)));
    out
}

#[async_trait]
impl DocumentGenerator for TextPayslipRenderer {
    async fn generate(&self, batch: &PayslipBatch, slip: &Payslip) -> Result<PathBuf> {
        let path = self
            .dir
            .join(&batch.period)
            .join(format!("{}.txt", slip.employee_id));
        write_atomic(&path, render_text(batch, slip).as_bytes())
            .await
            .with_context(|| format!("Failed to write payslip {}", path.display()))?;
        Ok(path)
    }
}

/// Drops each message as a JSON file into an outbox directory for a relay to pick up
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, message: &OutgoingEmail) -> Result<()> {
        let path = self
            .dir
            .join(format!("{}.json", uuid::Uuid::new_v4()));
        let contents = serde_json::to_vec_pretty(message)?;
        write_atomic(&path, &contents)
            .await
            .with_context(|| format!("Failed to queue mail for {}", message.to))?;
        Ok(())
    }
}

/// Completion hook producing documents and payslip emails for a submitted run
pub struct PayslipDispatcher {
    documents: Arc<dyn DocumentGenerator>,
    mailer: Arc<dyn Mailer>,
    from_address: String,
    default_subject: String,
    default_body: String,
    templates: Handlebars<'static>,
}

impl PayslipDispatcher {
    pub fn new(
        documents: Arc<dyn DocumentGenerator>,
        mailer: Arc<dyn Mailer>,
        from_address: impl Into<String>,
    ) -> Self {
        let defaults = crate::config::PayslipConfig::default();
        let mut templates = Handlebars::new();
        // Plain-text mail: don't escape HTML entities
        templates.register_escape_fn(handlebars::no_escape);
        Self {
            documents,
            mailer,
            from_address: from_address.into(),
            default_subject: defaults.default_subject,
            default_body: defaults.default_body,
            templates,
        }
    }

    /// Text documents under the payslips directory, mail to the outbox
    pub fn from_config(config: &Config) -> Self {
        let mut dispatcher = Self::new(
            Arc::new(TextPayslipRenderer::new(config.payslips_path())),
            Arc::new(OutboxMailer::new(config.outbox_path())),
            config.payslip.from_address.clone(),
        );
        dispatcher.default_subject = config.payslip.default_subject.clone();
        dispatcher.default_body = config.payslip.default_body.clone();
        dispatcher
    }

    fn compose(
        &self,
        batch: &PayslipBatch,
        slip: &Payslip,
        attachment: Option<PathBuf>,
    ) -> Result<Option<OutgoingEmail>> {
        let Some(to) = slip.email.clone() else {
            return Ok(None);
        };
        let template = batch.email.clone().unwrap_or_default();
        let context = json!({
            "period": batch.period,
            "employee": { "id": slip.employee_id, "name": slip.name, "email": to },
            "net_pay": format_aed(slip.net_fils),
            "gross_pay": format_aed(slip.gross_fils),
        });
        let subject = self
            .templates
            .render_template(
                template.subject.as_deref().unwrap_or(&self.default_subject),
                &context,
            )
            .context("Failed to render email subject")?;
        let body = self
            .templates
            .render_template(template.body.as_deref().unwrap_or(&self.default_body), &context)
            .context("Failed to render email body")?;

        Ok(Some(OutgoingEmail {
            to,
            from: self.from_address.clone(),
            reply_to: template.reply_to,
            subject: subject.trim().to_string(),
            body,
            attachments: attachment.into_iter().collect(),
        }))
    }
}

#[async_trait]
impl CompletionHook for PayslipDispatcher {
    fn name(&self) -> &str {
        "payslip-dispatch"
    }

    fn handles(&self, kind: WizardKind) -> bool {
        kind == WizardKind::Payslip
    }

    async fn on_complete(
        &self,
        submission: &Submission,
        receipt: &SubmissionReceipt,
    ) -> Result<()> {
        let batch: PayslipBatch = serde_json::from_value(submission.payload.clone())
            .context("Submission payload is not a payslip batch")?;

        let mut documents = 0usize;
        let mut sent = 0usize;
        let mut failed = Vec::new();
        for slip in &batch.slips {
            let attachment = if batch.delivery.generate_documents {
                match self.documents.generate(&batch, slip).await {
                    Ok(path) => {
                        documents += 1;
                        Some(path)
                    }
                    Err(e) => {
                        tracing::warn!(employee = %slip.employee_id, error = %e, "payslip document failed");
                        failed.push(slip.employee_id.clone());
                        continue;
                    }
                }
            } else {
                None
            };

            if !batch.delivery.send_email {
                continue;
            }
            let result = match self.compose(&batch, slip, attachment) {
                Ok(Some(message)) => self.mailer.send(&message).await,
                Ok(None) => Err(anyhow::anyhow!("no email address")),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        employee = %slip.employee_id,
                        mailer = self.mailer.name(),
                        error = %e,
                        "payslip email failed"
                    );
                    failed.push(slip.employee_id.clone());
                }
            }
        }

        tracing::info!(
            receipt = %receipt.id,
            period = %batch.period,
            documents,
            sent,
            failed = failed.len(),
            "payslip run dispatched"
        );
        if !failed.is_empty() {
            anyhow::bail!("payslip delivery failed for: {}", failed.join(", "));
        }
        Ok(())
    }
}
