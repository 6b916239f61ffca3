//! Text rendering for summaries, moderation cards and notices.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::channel::{ModerationButton, ModerationRequest};
use super::domain::{
    ApplicationFields, ApplicationId, ApplicationStatus, RecentApplication, Submitter,
};
use super::machine::{CompletedApplication, FormDraft};
use super::moderation::ModerationAction;
use super::validators::title_case;

const MISSING: &str = "—";

const RECENTLY_EMPLOYED_NOTE: &str =
    "🚨 ATTENTION: the candidate worked with us less than 40 days ago!";
const UNDERAGE_NOTE: &str = "🚨 ATTENTION: the candidate is under 18!";

fn or_missing(value: Option<&str>) -> &str {
    value.unwrap_or(MISSING)
}

/// Confirmation screen listing everything collected so far.
pub fn render_summary(draft: &FormDraft) -> String {
    let mut lines = vec!["📋 Please check your details:".to_string(), String::new()];
    lines.push(format!(
        "▫️ Citizenship: {}",
        or_missing(draft.citizenship.as_deref())
    ));
    lines.push(format!(
        "▫️ Full name: {}",
        or_missing(draft.full_name.as_deref())
    ));
    lines.push(format!(
        "▫️ Worked with us before: {}",
        or_missing(draft.prior_employment.map(|value| value.label()))
    ));
    if let Some(period) = draft.employment_period {
        lines.push(format!("▫️ Previous employment ended: {}", period.label()));
    }
    lines.push(format!("▫️ Phone: {}", or_missing(draft.phone.as_deref())));
    lines.push(format!("▫️ City: {}", or_missing(draft.city.as_deref())));
    lines.push(format!(
        "▫️ Age: {}",
        draft
            .age
            .map(|age| age.to_string())
            .unwrap_or_else(|| MISSING.to_string())
    ));
    lines.push(format!(
        "▫️ Self-employed: {}",
        or_missing(draft.self_employment.map(|value| value.label()))
    ));
    if let Some(choice) = draft.registration {
        lines.push(format!("▫️ Registration: {}", choice.label()));
    }
    lines.push(format!(
        "▫️ Transport: {}",
        or_missing(draft.transport.map(|value| value.label()))
    ));
    lines.push(String::new());
    lines.push("Is everything correct?".to_string());
    lines.join("\n")
}

/// Card sent to the moderator once an application is stored.
pub fn moderation_request(
    id: ApplicationId,
    submitter: &Submitter,
    application: &CompletedApplication,
) -> ModerationRequest {
    let fields: &ApplicationFields = &application.fields;
    let mut text = String::new();
    let _ = writeln!(text, "🔔 New application {id}\n");
    let _ = writeln!(
        text,
        "👤 User: {} (ID: {})",
        submitter.handle(),
        submitter.user_id
    );
    let _ = writeln!(text, "▫️ Age: {}", fields.age);
    let _ = writeln!(text, "▫️ Citizenship: {}", fields.citizenship);
    let _ = writeln!(text, "▫️ Full name: {}", fields.full_name);
    let _ = writeln!(text, "▫️ Phone: {}", fields.phone);
    let _ = writeln!(text, "▫️ City: {}", fields.city);
    let _ = writeln!(text, "▫️ Self-employed: {}", fields.self_employment.label());
    if let Some(choice) = fields.registration {
        let _ = writeln!(text, "▫️ Registration: {}", choice.label());
    }
    let _ = writeln!(text, "▫️ Transport: {}", fields.transport.label());

    if application.advisories.recently_employed {
        let _ = write!(text, "\n{RECENTLY_EMPLOYED_NOTE}");
    }
    if application.advisories.underage {
        let _ = write!(text, "\n{UNDERAGE_NOTE}");
    }

    ModerationRequest {
        application_id: id,
        text: text.trim_end().to_string(),
        buttons: vec![
            ModerationButton {
                label: "✅ Approve",
                callback: ModerationAction::Approve.callback_data(id),
            },
            ModerationButton {
                label: "❌ Reject",
                callback: ModerationAction::Reject.callback_data(id),
            },
        ],
    }
}

/// Moderator card text after a decision.
pub fn finalized_card(text: &str, status: ApplicationStatus) -> String {
    format!(
        "{text}\n\n🟢 Status: {}",
        status.label().to_ascii_uppercase()
    )
}

/// Message sent to the applicant once a decision is recorded.
pub fn decision_notice(status: ApplicationStatus, full_name: &str) -> String {
    match status {
        ApplicationStatus::Approved => format!(
            "🎉 {full_name}, your application has been approved! We will contact you shortly."
        ),
        ApplicationStatus::Rejected => {
            format!("😞 {full_name}, unfortunately your application has been rejected.")
        }
        ApplicationStatus::New => format!("{full_name}, your application is being reviewed."),
    }
}

pub fn moderation_receipt(id: ApplicationId, status: ApplicationStatus) -> String {
    format!("✅ Application {id} {}", status.label())
}

pub fn not_found_notice(id: ApplicationId) -> String {
    format!("⚠️ Application {id} not found")
}

pub fn already_processed_notice(id: ApplicationId) -> String {
    format!("⚠️ Application {id} has already been processed")
}

/// Status counts plus the most recent undecided applications.
pub fn render_stats(
    counts: &BTreeMap<ApplicationStatus, u64>,
    recent: &[RecentApplication],
) -> String {
    let mut text = String::from("📊 Application statistics\n\n");
    for status in ApplicationStatus::ordered() {
        let count = counts.get(&status).copied().unwrap_or(0);
        let _ = writeln!(text, "• {}: {count}", title_case(status.label()));
    }
    text.push_str("\n⏳ Latest applications:\n");
    if recent.is_empty() {
        text.push_str("none");
    }
    for entry in recent {
        let _ = writeln!(
            text,
            "{} - {} ({})",
            entry.id,
            entry.city,
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    text.trim_end().to_string()
}
