use serde_json::json;
use warden::{
    Effect, Element, Guard, Inquiry, MemoryStorage, Policy, Result, Rule, RulesChecker, Storage,
};

fn main() -> Result<()> {
    let policy = Policy::builder("1")
        .description("Known collaborators with enough stars may fork or clone")
        .effect(Effect::Allow)
        .subjects([Element::object([
            ("name", Rule::Any.into()),
            ("stars", Rule::and([Rule::greater(50), Rule::less(999)]).into()),
        ])])
        .actions([Rule::eq("fork"), Rule::eq("clone")])
        .resources([Rule::StartsWith {
            val: "repos/Google".into(),
            ci: true,
        }])
        .context([("referer", Rule::eq("https://github.com"))])
        .build()?;

    let storage = MemoryStorage::new();
    storage.add(policy)?;

    let guard = Guard::new(storage, RulesChecker);

    let inquiry = Inquiry::new(
        json!({"name": "larry", "stars": 80}),
        "fork",
        "repos/google/tensorflow",
    )
    .with_context([("referer", "https://github.com")]);

    if guard.is_allowed(&inquiry) {
        println!("Allowed");
    } else {
        println!("Denied");
    }

    Ok(())
}
