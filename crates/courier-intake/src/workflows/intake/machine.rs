//! Conversation state machine.
//!
//! [`Session::step`] is a pure transition: it consumes the session and one reply and
//! returns the next session (or a terminal outcome) together with the messages to deliver.
//! Delivery and persistence are performed by [`super::service::IntakeService`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::catalog::{
    self, EditableField, FormState, RegionAnswer, BACK_CHOICE, CONFIRM_CHOICE,
    DOMESTIC_CHOICE, DOMESTIC_CITIZENSHIP, EDIT_CHOICE, REGIONAL_CHOICE, SKIP_CHOICE,
};
use super::channel::OutboundMessage;
use super::domain::{
    Advisories, ApplicationFields, EmploymentPeriod, FieldViolation, PriorEmployment,
    RegistrationChoice, SelfEmployment, Transport,
};
use super::summary::render_summary;
use super::validators::{self, Rejection};

pub const INCOMPLETE_FORM_MESSAGE: &str =
    "❌ Error: not all details are filled in! Please start over with /start.";
const CONFIRMATION_REJECTION: Rejection = Rejection("Use the buttons below 👇");
const EDIT_FIELD_REJECTION: Rejection = Rejection("Please choose a field from the list.");

/// What happens after a field is changed from the edit menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// Continue with the edited field's normal successor, re-walking the rest of the form.
    #[default]
    Rewalk,
    /// Jump straight back to the confirmation summary.
    ReturnToSummary,
}

impl EditPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rewalk" => Some(Self::Rewalk),
            "summary" | "return_to_summary" => Some(Self::ReturnToSummary),
            _ => None,
        }
    }
}

/// Answers accumulated during one pass through the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    pub citizenship: Option<String>,
    pub full_name: Option<String>,
    pub prior_employment: Option<PriorEmployment>,
    pub employment_period: Option<EmploymentPeriod>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub age: Option<u8>,
    pub self_employment: Option<SelfEmployment>,
    pub registration: Option<RegistrationChoice>,
    pub transport: Option<Transport>,
}

impl FormDraft {
    /// Re-check the required fields and clamp dependent answers to their parents.
    ///
    /// A dependent value left over from an earlier parent answer is dropped; a dependent
    /// value the parent answer requires but that is absent fails completion.
    pub fn complete(&self) -> Result<ApplicationFields, FieldViolation> {
        let prior_employment = self
            .prior_employment
            .ok_or(FieldViolation::Missing("prior_employment"))?;
        let employment_period = match prior_employment {
            PriorEmployment::Yes => Some(
                self.employment_period
                    .ok_or(FieldViolation::Missing("employment_period"))?,
            ),
            PriorEmployment::No => None,
        };

        let self_employment = self
            .self_employment
            .ok_or(FieldViolation::Missing("self_employment"))?;
        let registration = match self_employment {
            SelfEmployment::NotRegistered => Some(
                self.registration
                    .ok_or(FieldViolation::Missing("registration"))?,
            ),
            SelfEmployment::Registered => None,
        };

        let fields = ApplicationFields {
            full_name: required_text(&self.full_name, "full_name")?,
            citizenship: required_text(&self.citizenship, "citizenship")?,
            prior_employment,
            employment_period,
            phone: required_text(&self.phone, "phone")?,
            city: required_text(&self.city, "city")?,
            age: self.age.ok_or(FieldViolation::Missing("age"))?,
            self_employment,
            registration,
            transport: self.transport.ok_or(FieldViolation::Missing("transport"))?,
        };
        fields.ensure_complete()?;
        Ok(fields)
    }
}

fn required_text(value: &Option<String>, field: &'static str) -> Result<String, FieldViolation> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(FieldViolation::Missing(field))
}

/// Validated answers plus the advisory notes, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedApplication {
    pub fields: ApplicationFields,
    pub advisories: Advisories,
}

/// Result of feeding one reply to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The session stays alive, possibly in a new state.
    Continue {
        session: Session,
        effects: Vec<OutboundMessage>,
    },
    /// The applicant confirmed a complete form; the session ends once it is stored.
    Submit(CompletedApplication),
    /// The session ends without storing anything.
    Abort { effects: Vec<OutboundMessage> },
}

enum Accepted {
    Advance {
        next: FormState,
        notices: Vec<OutboundMessage>,
    },
    Confirm,
}

impl Accepted {
    fn to(next: FormState) -> Self {
        Accepted::Advance {
            next,
            notices: Vec::new(),
        }
    }
}

/// One applicant's in-progress pass through the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: FormState,
    draft: FormDraft,
    editing: Option<EditableField>,
    advisories: Advisories,
}

impl Session {
    /// Fresh session positioned at the first question, with its prompt.
    pub fn start() -> (Self, OutboundMessage) {
        let session = Self {
            state: FormState::Citizenship,
            draft: FormDraft::default(),
            editing: None,
            advisories: Advisories::default(),
        };
        let prompt = session.current_prompt();
        (session, prompt)
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn editing(&self) -> Option<EditableField> {
        self.editing
    }

    pub fn advisories(&self) -> Advisories {
        self.advisories
    }

    /// Prompt for the current state, as it would be shown on entering it.
    pub fn current_prompt(&self) -> OutboundMessage {
        let choices = self.state.choices();
        match self.state {
            FormState::Confirmation => OutboundMessage::prompt(render_summary(&self.draft), choices),
            state if self.editing.map(EditableField::state) == Some(state) => {
                let label = self.editing.map(EditableField::label).unwrap_or_default();
                OutboundMessage::prompt(format!("✏️ Enter a new value for “{label}”:"), choices)
            }
            state => OutboundMessage::prompt(state.prompt(), choices),
        }
    }

    /// Apply one reply. Validation failures keep the session in place and re-prompt.
    pub fn step(mut self, reply: &str, policy: EditPolicy) -> Transition {
        let from = self.state;
        match self.accept(reply) {
            Ok(Accepted::Advance { next, notices }) => {
                let next = self.route_after_edit(from, next, policy);
                debug!(?from, to = ?next, "form transition");
                self.enter(next);
                let mut effects = notices;
                effects.push(self.current_prompt());
                Transition::Continue {
                    session: self,
                    effects,
                }
            }
            Ok(Accepted::Confirm) => match self.draft.complete() {
                Ok(fields) => Transition::Submit(CompletedApplication {
                    fields,
                    advisories: self.advisories,
                }),
                Err(violation) => {
                    warn!(%violation, "confirmed form failed completeness check");
                    Transition::Abort {
                        effects: vec![OutboundMessage::text(INCOMPLETE_FORM_MESSAGE)],
                    }
                }
            },
            Err(rejection) => {
                debug!(state = ?from, "reply rejected by validator");
                let effects = vec![OutboundMessage::prompt(
                    rejection.message(),
                    from.choices(),
                )];
                Transition::Continue {
                    session: self,
                    effects,
                }
            }
        }
    }

    fn enter(&mut self, next: FormState) {
        if next == FormState::Confirmation {
            self.editing = None;
        }
        self.state = next;
    }

    fn route_after_edit(&self, from: FormState, next: FormState, policy: EditPolicy) -> FormState {
        let edited_here = self.editing.map(EditableField::state) == Some(from);
        match policy {
            EditPolicy::ReturnToSummary if edited_here => FormState::Confirmation,
            _ => next,
        }
    }

    fn accept(&mut self, reply: &str) -> Result<Accepted, Rejection> {
        match self.state {
            FormState::Citizenship => match reply {
                DOMESTIC_CHOICE => {
                    self.draft.citizenship = Some(DOMESTIC_CITIZENSHIP.to_string());
                    Ok(Accepted::to(FormState::FullName))
                }
                REGIONAL_CHOICE => Ok(Accepted::to(FormState::CitizenshipRegion)),
                _ => Err(validators::CHOICE_REJECTION),
            },
            FormState::CitizenshipRegion => {
                match validators::choice(reply, RegionAnswer::from_label)? {
                    RegionAnswer::Country(label) => {
                        self.draft.citizenship = Some(label.to_string());
                        Ok(Accepted::to(FormState::FullName))
                    }
                    RegionAnswer::OtherCountry => Ok(Accepted::to(FormState::CitizenshipOther)),
                    RegionAnswer::Skip => {
                        self.draft.citizenship = Some(catalog::foreign_citizenship(None));
                        Ok(Accepted::to(FormState::FullName))
                    }
                }
            }
            FormState::CitizenshipOther => {
                let citizenship = if reply.trim() == SKIP_CHOICE {
                    catalog::foreign_citizenship(None)
                } else {
                    let country = validators::country(reply)?;
                    catalog::foreign_citizenship(Some(country.as_str()))
                };
                self.draft.citizenship = Some(citizenship);
                Ok(Accepted::to(FormState::FullName))
            }
            FormState::FullName => {
                self.draft.full_name = Some(validators::full_name(reply)?);
                Ok(Accepted::to(FormState::PriorEmployment))
            }
            FormState::PriorEmployment => {
                let answer = validators::choice(reply, PriorEmployment::from_label)?;
                self.draft.prior_employment = Some(answer);
                match answer {
                    PriorEmployment::Yes => Ok(Accepted::to(FormState::EmploymentPeriod)),
                    PriorEmployment::No => {
                        self.draft.employment_period = None;
                        self.advisories.recently_employed = false;
                        Ok(Accepted::to(FormState::Phone))
                    }
                }
            }
            FormState::EmploymentPeriod => {
                let period = validators::choice(reply, EmploymentPeriod::from_label)?;
                self.draft.employment_period = Some(period);
                self.advisories.recently_employed = period == EmploymentPeriod::Recent;
                Ok(Accepted::to(FormState::Phone))
            }
            FormState::Phone => {
                self.draft.phone = Some(validators::phone(reply)?);
                Ok(Accepted::to(FormState::City))
            }
            FormState::City => {
                self.draft.city = Some(validators::city(reply)?);
                Ok(Accepted::to(FormState::Age))
            }
            FormState::Age => {
                let answer = validators::age(reply)?;
                self.draft.age = Some(answer.age);
                self.advisories.underage = answer.underage;
                Ok(Accepted::to(FormState::SelfEmployment))
            }
            FormState::SelfEmployment => {
                let status = validators::choice(reply, SelfEmployment::from_label)?;
                self.draft.self_employment = Some(status);
                self.draft.registration = None;
                match status {
                    SelfEmployment::Registered => Ok(Accepted::to(FormState::Transport)),
                    SelfEmployment::NotRegistered => {
                        Ok(Accepted::to(FormState::RegistrationChoice))
                    }
                }
            }
            FormState::RegistrationChoice => {
                let choice = validators::choice(reply, RegistrationChoice::from_label)?;
                self.draft.registration = Some(choice);
                let notices = match choice {
                    RegistrationChoice::RegisterNow => vec![OutboundMessage::text(
                        catalog::SELF_EMPLOYMENT_INSTRUCTIONS,
                    )
                    .with_link("📲 Download the app", catalog::SELF_EMPLOYMENT_APP_URL)],
                    RegistrationChoice::AtOffice => Vec::new(),
                };
                Ok(Accepted::Advance {
                    next: FormState::Transport,
                    notices,
                })
            }
            FormState::Transport => {
                self.draft.transport = Some(validators::choice(reply, Transport::from_label)?);
                Ok(Accepted::to(FormState::Confirmation))
            }
            FormState::Confirmation => match reply {
                CONFIRM_CHOICE => Ok(Accepted::Confirm),
                EDIT_CHOICE => Ok(Accepted::to(FormState::EditField)),
                _ => Err(CONFIRMATION_REJECTION),
            },
            FormState::EditField => {
                if reply == BACK_CHOICE {
                    return Ok(Accepted::to(FormState::Confirmation));
                }
                let field = EditableField::from_label(reply).ok_or(EDIT_FIELD_REJECTION)?;
                self.editing = Some(field);
                Ok(Accepted::to(field.state()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(session: Session, replies: &[&str], policy: EditPolicy) -> Session {
        replies.iter().fold(session, |session, reply| {
            match session.step(reply, policy) {
                Transition::Continue { session, .. } => session,
                other => panic!("unexpected terminal transition on {reply:?}: {other:?}"),
            }
        })
    }

    #[test]
    fn start_prompts_for_citizenship_with_menu() {
        let (session, prompt) = Session::start();
        assert_eq!(session.state(), FormState::Citizenship);
        assert_eq!(prompt.choices, Some(catalog::CITIZENSHIP_CHOICES));
    }

    #[test]
    fn invalid_reply_is_a_self_loop() {
        let (session, _) = Session::start();
        let before = session.clone();
        match session.step("Mars", EditPolicy::Rewalk) {
            Transition::Continue { session, effects } => {
                assert_eq!(session, before);
                assert_eq!(effects.len(), 1);
                assert_eq!(effects[0].text, validators::CHOICE_REJECTION.message());
                assert_eq!(effects[0].choices, Some(catalog::CITIZENSHIP_CHOICES));
            }
            other => panic!("expected continue, got {other:?}"),
        }
    }

    #[test]
    fn regional_branch_records_selected_country() {
        let (session, _) = Session::start();
        let session = walk(session, &[REGIONAL_CHOICE, "🇰🇿 Kazakhstan"], EditPolicy::Rewalk);
        assert_eq!(session.state(), FormState::FullName);
        assert_eq!(session.draft().citizenship.as_deref(), Some("🇰🇿 Kazakhstan"));
    }

    #[test]
    fn other_country_branch_records_label_or_sentinel() {
        let (session, _) = Session::start();
        let other = walk(
            session.clone(),
            &[REGIONAL_CHOICE, catalog::OTHER_COUNTRY_CHOICE, "  Serbia "],
            EditPolicy::Rewalk,
        );
        assert_eq!(other.draft().citizenship.as_deref(), Some("🌍 Serbia"));

        let skipped = walk(
            session,
            &[REGIONAL_CHOICE, catalog::OTHER_COUNTRY_CHOICE, SKIP_CHOICE],
            EditPolicy::Rewalk,
        );
        assert_eq!(skipped.draft().citizenship.as_deref(), Some("🌍 Not specified"));
        assert_eq!(skipped.state(), FormState::FullName);
    }

    #[test]
    fn short_employment_gap_sets_advisory() {
        let (session, _) = Session::start();
        let session = walk(
            session,
            &[
                DOMESTIC_CHOICE,
                "Ivanov Ivan",
                PriorEmployment::Yes.label(),
                EmploymentPeriod::Recent.label(),
            ],
            EditPolicy::Rewalk,
        );
        assert_eq!(session.state(), FormState::Phone);
        assert!(session.advisories().recently_employed);
    }

    #[test]
    fn register_now_emits_instructions_before_transport_prompt() {
        let (session, _) = Session::start();
        let session = walk(
            session,
            &[
                DOMESTIC_CHOICE,
                "Ivanov Ivan",
                PriorEmployment::No.label(),
                "89123456789",
                "Kazan",
                "30",
                SelfEmployment::NotRegistered.label(),
            ],
            EditPolicy::Rewalk,
        );

        match session.step(RegistrationChoice::RegisterNow.label(), EditPolicy::Rewalk) {
            Transition::Continue { session, effects } => {
                assert_eq!(session.state(), FormState::Transport);
                assert_eq!(effects.len(), 2);
                let link = effects[0].link.as_ref().expect("instruction link");
                assert_eq!(link.url, catalog::SELF_EMPLOYMENT_APP_URL);
                assert_eq!(effects[1].choices, Some(catalog::TRANSPORT_CHOICES));
            }
            other => panic!("expected continue, got {other:?}"),
        }
    }

    #[test]
    fn changing_self_employment_clears_registration() {
        let draft_session = {
            let (session, _) = Session::start();
            walk(
                session,
                &[
                    DOMESTIC_CHOICE,
                    "Ivanov Ivan",
                    PriorEmployment::No.label(),
                    "89123456789",
                    "Kazan",
                    "30",
                    SelfEmployment::NotRegistered.label(),
                    RegistrationChoice::AtOffice.label(),
                ],
                EditPolicy::Rewalk,
            )
        };
        assert!(draft_session.draft().registration.is_some());

        let mut session = draft_session;
        session.state = FormState::SelfEmployment;
        let session = walk(session, &[SelfEmployment::Registered.label()], EditPolicy::Rewalk);
        assert_eq!(session.draft().registration, None);
        assert_eq!(session.state(), FormState::Transport);
    }

    #[test]
    fn completion_clamps_stale_dependents() {
        let draft = FormDraft {
            citizenship: Some("🇷🇺 Russia".to_string()),
            full_name: Some("Ivanov Ivan".to_string()),
            prior_employment: Some(PriorEmployment::No),
            employment_period: Some(EmploymentPeriod::Recent),
            phone: Some("+7 (912) 345-67-89".to_string()),
            city: Some("Kazan".to_string()),
            age: Some(30),
            self_employment: Some(SelfEmployment::Registered),
            registration: Some(RegistrationChoice::RegisterNow),
            transport: Some(Transport::Car),
        };
        let fields = draft.complete().expect("complete draft");
        assert_eq!(fields.employment_period, None);
        assert_eq!(fields.registration, None);

        let missing = FormDraft {
            phone: None,
            ..draft
        };
        assert_eq!(missing.complete(), Err(FieldViolation::Missing("phone")));
    }

    #[test]
    fn confirming_incomplete_form_aborts() {
        let session = Session {
            state: FormState::Confirmation,
            draft: FormDraft::default(),
            editing: None,
            advisories: Advisories::default(),
        };
        match session.step(CONFIRM_CHOICE, EditPolicy::Rewalk) {
            Transition::Abort { effects } => {
                assert_eq!(effects[0].text, INCOMPLETE_FORM_MESSAGE);
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn edit_policy_parses_known_values() {
        assert_eq!(EditPolicy::parse("Rewalk"), Some(EditPolicy::Rewalk));
        assert_eq!(EditPolicy::parse("summary"), Some(EditPolicy::ReturnToSummary));
        assert_eq!(EditPolicy::parse("sideways"), None);
    }
}
