use warden::{Guard, Inquiry, MemoryStorage, Policy, RegexChecker, Result, Storage};

fn main() -> Result<()> {
    let json = r#"{
        "uid": "1",
        "description": "Readers named like John Miller may read any book",
        "effect": "allow",
        "subjects": ["<[\\w]+ M[\\w]+>"],
        "actions": ["<read|get>"],
        "resources": ["library:books:<.+>"],
        "context": {
            "ip": {
                "type": "warden.rules.net.CIDR",
                "contents": {"cidr": "192.168.2.0/24"}
            }
        }
    }"#;

    let policy = Policy::from_json(json)?;
    println!("Canonical form: {}", policy.to_json()?);

    let storage = MemoryStorage::new();
    storage.add(policy)?;

    let guard = Guard::new(storage, RegexChecker::new());

    let inquiry = Inquiry::new("John Miller", "read", "library:books:001")
        .with_context([("ip", "192.168.2.17")]);

    match guard.is_allowed(&inquiry) {
        true => println!("Allowed"),
        false => println!("Denied"),
    };

    Ok(())
}
