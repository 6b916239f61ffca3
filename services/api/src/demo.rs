use crate::infra::{build_dispatcher, open_store, AppDispatcher, OutboxChannel, OutboxEntry};
use clap::Args;
use courier_intake::config::AppConfig;
use courier_intake::error::AppError;
use courier_intake::workflows::intake::store::bounded;
use courier_intake::workflows::intake::summary::render_stats;
use courier_intake::workflows::intake::{
    DispatchOutcome, EditPolicy, IntakeSettings, MemoryApplicationStore, OutboundMessage,
    Submitter, UserId,
};
use std::sync::Arc;

const DEMO_MODERATOR: UserId = UserId(1);
const DEMO_APPLICANT: UserId = UserId(42);

const FORM_REPLIES: [&str; 8] = [
    "🇷🇺 Russian Federation",
    "Ivanov Ivan Ivanovich",
    "❌ No",
    "8 912 345 67 89",
    "moscow",
    "25",
    "✅ Yes",
    "🚗 Car",
];

#[derive(Args, Debug)]
pub(crate) struct StatsArgs {
    /// Number of undecided applications to list
    #[arg(long, default_value_t = 5)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Edit flow to demonstrate: `rewalk` or `summary`
    #[arg(long, value_parser = parse_edit_policy, default_value = "rewalk")]
    pub(crate) edit_policy: EditPolicy,
    /// Reject the application instead of approving it
    #[arg(long)]
    pub(crate) reject: bool,
}

fn parse_edit_policy(value: &str) -> Result<EditPolicy, String> {
    EditPolicy::parse(value).ok_or_else(|| format!("unknown edit policy `{value}`"))
}

pub(crate) async fn run_stats(args: StatsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = open_store(&config.storage).await?;
    let timeout = config.storage.timeout;

    let counts = bounded(timeout, store.counts_by_status()).await?;
    let recent = bounded(timeout, store.recent_new(args.limit)).await?;

    println!("{}", render_stats(&counts, &recent));
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let outbox = Arc::new(OutboxChannel::default());
    let settings = IntakeSettings {
        edit_policy: args.edit_policy,
        ..IntakeSettings::default()
    };
    let dispatcher = build_dispatcher(
        DEMO_MODERATOR,
        settings,
        Arc::new(MemoryApplicationStore::new()),
        outbox.clone(),
    );

    let applicant = Submitter::new(DEMO_APPLICANT, Some("demo_courier".to_string()));
    let moderator = Submitter::new(DEMO_MODERATOR, None);

    println!("Courier intake demo (edit policy: {:?})", args.edit_policy);
    println!("==========================================");

    for line in applicant_script(args.edit_policy) {
        say(&dispatcher, &outbox, &applicant, line).await;
    }

    println!();
    println!("Moderator inbox");
    println!("---------------");
    let queued = outbox.drain(DEMO_MODERATOR);
    print_entries(&queued);

    let decision = queued.iter().find_map(|entry| match entry {
        OutboxEntry::ModerationRequest(request) => {
            let index = usize::from(args.reject);
            request.buttons.get(index).map(|button| button.callback.clone())
        }
        _ => None,
    });
    let Some(decision) = decision else {
        println!("No application reached the moderator.");
        return Ok(());
    };

    println!();
    println!("moderator [button]> {decision}");
    let outcome = dispatcher.handle_callback(&moderator, &decision).await;
    print_outcome(&outcome);
    print_entries(&outbox.drain(DEMO_MODERATOR));

    println!();
    println!("Applicant inbox");
    println!("---------------");
    print_entries(&outbox.drain(DEMO_APPLICANT));

    println!();
    let repeat = if args.reject { "/approve 1" } else { "/reject 1" };
    say(&dispatcher, &outbox, &moderator, repeat).await;
    say(&dispatcher, &outbox, &moderator, "/stats").await;

    Ok(())
}

fn applicant_script(policy: EditPolicy) -> Vec<&'static str> {
    let mut script = vec!["/start"];
    script.extend(FORM_REPLIES);
    script.extend(["✏️ Edit", "City", "Kazan"]);
    if policy == EditPolicy::Rewalk {
        script.extend(&FORM_REPLIES[5..]);
    }
    script.push("✅ Confirm");
    script
}

async fn say(dispatcher: &AppDispatcher, outbox: &OutboxChannel, who: &Submitter, text: &str) {
    let role = if who.user_id == DEMO_MODERATOR {
        "moderator"
    } else {
        "applicant"
    };
    println!("{role}> {text}");
    let outcome = dispatcher.handle_text(who, text).await;
    print_outcome(&outcome);
    print_entries(&outbox.drain(who.user_id));
}

fn print_outcome(outcome: &DispatchOutcome) {
    println!("    ({outcome:?})");
}

fn print_entries(entries: &[OutboxEntry]) {
    for entry in entries {
        match entry {
            OutboxEntry::Message(message) => print_message(message),
            OutboxEntry::ModerationRequest(request) => {
                println!("  card {}:", request.application_id);
                print_block(&request.text);
                let buttons: Vec<_> = request
                    .buttons
                    .iter()
                    .map(|button| format!("[{}]", button.label))
                    .collect();
                println!("    {}", buttons.join(" "));
            }
            OutboxEntry::CardUpdate {
                application_id,
                text,
            } => {
                println!("  card {application_id} updated:");
                print_block(text);
            }
        }
    }
}

fn print_message(message: &OutboundMessage) {
    print_block(&message.text);
    if let Some(choices) = message.choices {
        for row in choices.rows() {
            let labels: Vec<_> = row.iter().map(|label| format!("[{label}]")).collect();
            println!("    {}", labels.join(" "));
        }
    }
    if let Some(link) = &message.link {
        println!("    ({}: {})", link.title, link.url);
    }
}

fn print_block(text: &str) {
    for line in text.lines() {
        println!("  | {line}");
    }
}
