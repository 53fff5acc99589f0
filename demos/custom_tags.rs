use warden::{Effect, Guard, Inquiry, MemoryStorage, Policy, RegexChecker, Result, Storage};

fn main() -> Result<()> {
    // elements delimited with '=' instead of the default '<' and '>'
    let policy = Policy::builder("1")
        .description("Subjects starting with F, G or H may read the archive")
        .effect(Effect::Allow)
        .subjects([r"=[FGH]+[\w]+="])
        .actions(["read"])
        .resources(["archive"])
        .build()?;

    let storage = MemoryStorage::new();
    storage.add(policy)?;

    // delimiter tags are checker-side configuration
    let checker = RegexChecker::new().with_tags('=', '=');
    let guard = Guard::new(storage, checker);

    for subject in ["Fred", "George", "Max"] {
        let inquiry = Inquiry::new(subject, "read", "archive");
        println!(
            "{} -> {}",
            subject,
            if guard.is_allowed(&inquiry) {
                "allowed"
            } else {
                "denied"
            }
        );
    }

    Ok(())
}
